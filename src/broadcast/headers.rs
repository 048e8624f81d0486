//! Outbound header construction for per-cache requests.
//!
//! [`build_forwarded_headers`] clones the inbound headers (when
//! forwarding is enabled), strips hop-by-hop and body framing headers,
//! drops the group selector and `Accept-Encoding`, rewrites `Host` to the
//! cache's authority, and stamps `X-Correlation-Id`.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const CORRELATION_ID: &str = "x-correlation-id";

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
        // no body is replayed, and caches must answer uncompressed
        "content-length",
        "content-type",
        "accept-encoding",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

pub struct ForwardOptions<'a> {
    pub forward: bool,
    pub group_header: &'a HeaderName,
    pub correlation_id: &'a str,
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    cache_address: &str,
    options: &ForwardOptions<'_>,
) -> HeaderMap {
    let mut headers = if options.forward {
        original.clone()
    } else {
        HeaderMap::new()
    };

    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(options.group_header);

    // Rewrite Host
    headers.remove(http::header::HOST);
    if let Ok(url) = url::Url::parse(cache_address) {
        if let Some(host) = url.host_str() {
            let host_value = url
                .port()
                .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
            if let Ok(val) = HeaderValue::from_str(&host_value) {
                headers.insert(http::header::HOST, val);
            }
        }
    }

    if let Ok(val) = HeaderValue::from_str(options.correlation_id) {
        headers.insert(CORRELATION_ID, val);
    }

    headers
}
