//! Per-cache HTTP client pool.
//!
//! [`ClientPool`] keeps one keep-alive hyper client per cache name. Every
//! read and every replacement goes through the same exclusive lock, so a
//! worker re-warming a cache after a failure never races a sibling
//! worker fetching that cache's client.
//!
//! Clients carry no compression support and send no `Accept-Encoding`:
//! caches answer with raw payloads and the body is discarded anyway.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::uri::InvalidUri;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use parking_lot::Mutex;

use crate::dispatch::{DispatchTarget, Transport};
use crate::error::BroadcasterError;
use crate::registry::Destination;

pub type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Empty<Bytes>>;

#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    /// Connect timeout, and the bound on one whole request/response exchange.
    pub timeout: Duration,
    /// TCP keep-alive and idle connection lifetime.
    pub keep_alive: Duration,
    pub max_idle_per_host: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(120),
            max_idle_per_host: 100,
        }
    }
}

/// Install `ring` as the process-wide rustls provider.
///
/// When multiple rustls crypto providers are compiled in, rustls cannot
/// auto-detect which one to use. Safe to call more than once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

pub struct ClientPool {
    settings: ClientSettings,
    clients: Mutex<HashMap<String, HttpClient>>,
}

impl ClientPool {
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        install_crypto_provider();
        Self {
            settings,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Create, or replace, the pooled client for `destination`.
    pub fn warm(&self, destination: &Destination) -> Result<(), BroadcasterError> {
        check_address(destination)?;
        let client = self.build_client();
        self.clients.lock().insert(destination.name.clone(), client);
        tracing::debug!(destination = %destination.name, "pooled client warmed");
        Ok(())
    }

    /// Warm every destination, stopping at the first failure.
    pub fn warm_all(&self, destinations: &[Destination]) -> Result<(), BroadcasterError> {
        for destination in destinations {
            self.warm(destination)?;
        }
        Ok(())
    }

    /// Drop clients for caches not in `destinations`.
    pub fn retain(&self, destinations: &[Destination]) {
        let keep: HashSet<&str> = destinations.iter().map(|d| d.name.as_str()).collect();
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|name, _| keep.contains(name.as_str()));
        let evicted = before - clients.len();
        if evicted > 0 {
            tracing::debug!(evicted, "pooled clients for removed caches dropped");
        }
    }

    /// Fetch the client for a cache. Clients are cheap handles onto a shared pool.
    pub fn get(&self, name: &str) -> Result<HttpClient, BroadcasterError> {
        self.clients
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| BroadcasterError::ClientNotWarmed(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.clients.lock().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build_client(&self) -> HttpClient {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_keepalive(Some(self.settings.keep_alive));
        http.set_connect_timeout(Some(self.settings.timeout));

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(self.settings.max_idle_per_host)
            .pool_idle_timeout(self.settings.keep_alive)
            .build(https)
    }
}

fn check_address(destination: &Destination) -> Result<(), BroadcasterError> {
    let warmup_error = |message: String| BroadcasterError::ClientWarmup {
        destination: destination.name.clone(),
        message,
    };

    let uri: Uri = destination
        .address
        .parse()
        .map_err(|e: InvalidUri| warmup_error(e.to_string()))?;

    match (uri.scheme_str(), uri.authority()) {
        (Some("http" | "https"), Some(_)) => Ok(()),
        (Some(other), Some(_)) => Err(warmup_error(format!("unsupported scheme '{other}'"))),
        _ => Err(warmup_error(format!(
            "'{}' is not an absolute http(s) address",
            destination.address
        ))),
    }
}

#[async_trait]
impl Transport for ClientPool {
    async fn send(&self, target: &DispatchTarget) -> Result<StatusCode, BroadcasterError> {
        let client = self.get(&target.destination.name).inspect_err(|e| {
            tracing::error!(error = %e, "dispatch to a cache that was never warmed");
        })?;
        let transport_error = |source: Box<dyn std::error::Error + Send + Sync>| {
            BroadcasterError::DispatchTransport {
                destination: target.destination.name.clone(),
                source,
            }
        };

        let mut builder = Request::builder()
            .method(target.method.clone())
            .uri(target.url());
        for (name, value) in &target.headers {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(Empty::new())
            .map_err(|e| transport_error(Box::new(e)))?;

        let exchange = async {
            let response: Response<Incoming> = client
                .request(request)
                .await
                .map_err(|e| transport_error(Box::new(e)))?;
            let status = response.status();

            // Drain and drop the body so the connection can go back to the pool
            let mut body = response.into_body();
            while let Some(frame) = body.frame().await {
                frame.map_err(|e| transport_error(Box::new(e)))?;
            }
            Ok::<_, BroadcasterError>(status)
        };

        tokio::time::timeout(self.settings.timeout, exchange)
            .await
            .map_err(|_| {
                transport_error(
                    format!(
                        "request timed out after {}ms",
                        self.settings.timeout.as_millis()
                    )
                    .into(),
                )
            })?
    }

    fn rewarm(&self, destination: &Destination) -> Result<(), BroadcasterError> {
        self.warm(destination)
    }
}
