//! End-to-end broadcast tests against stub caches on loopback.

mod common;

use std::collections::HashMap;

use axum::http::StatusCode;
use broadcaster::broadcast::BroadcastSettings;

use common::{group, purge, unreachable_address, StubCache, TestBroadcaster};

async fn report(resp: reqwest::Response) -> HashMap<String, u16> {
    resp.json().await.unwrap()
}

#[tokio::test]
async fn group_request_reaches_every_cache_in_group() {
    let a = StubCache::start(StatusCode::OK).await;
    let b = StubCache::start(StatusCode::OK).await;
    let c = StubCache::start(StatusCode::OK).await;
    let other = StubCache::start(StatusCode::OK).await;

    let app = TestBroadcaster::start(
        vec![
            group(
                "europe",
                &[("c1", a.address.as_str()), ("c2", b.address.as_str()), ("c3", c.address.as_str())],
            ),
            group("america", &[("c4", other.address.as_str())]),
        ],
        BroadcastSettings::default(),
    )
    .await;

    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("X-Group", "europe")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/json");
    let body = report(resp).await;
    assert_eq!(body.len(), 3);
    assert!(body.values().all(|status| *status == 200));
    assert_eq!(a.hits() + b.hits() + c.hits(), 3);
    assert_eq!(other.hits(), 0);
}

#[tokio::test]
async fn unknown_group_is_404_without_dispatch() {
    let a = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![group("europe", &[("c1", a.address.as_str())])],
        BroadcastSettings::default(),
    )
    .await;

    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("X-Group", "bogus")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "Group not found.");
    assert_eq!(a.hits(), 0);
}

#[tokio::test]
async fn group_without_caches_is_204() {
    let app = TestBroadcaster::start(vec![group("staging", &[])], BroadcastSettings::default()).await;

    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("X-Group", "staging")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 204);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_group_header_targets_all_groups() {
    let a = StubCache::start(StatusCode::OK).await;
    let b = StubCache::start(StatusCode::OK).await;
    let c = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![
            group("europe", &[("c1", a.address.as_str()), ("c2", b.address.as_str())]),
            group("america", &[("c3", c.address.as_str())]),
        ],
        BroadcastSettings::default(),
    )
    .await;

    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = report(resp).await;
    assert_eq!(body.len(), 3);
    assert_eq!((a.hits(), b.hits(), c.hits()), (1, 1, 1));
}

#[tokio::test]
async fn group_header_is_matched_case_insensitively() {
    let a = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![group("europe", &[("c1", a.address.as_str())])],
        BroadcastSettings::default(),
    )
    .await;

    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("x-GROUP", "europe")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(a.hits(), 1);
}

#[tokio::test]
async fn enforce_replies_with_first_non_ok_status() {
    let ok = StubCache::start(StatusCode::OK).await;
    let missing = StubCache::start(StatusCode::NOT_FOUND).await;
    let busy = StubCache::start(StatusCode::SERVICE_UNAVAILABLE).await;
    let groups = vec![group(
        "europe",
        &[
            ("c1", ok.address.as_str()),
            ("c2", missing.address.as_str()),
            ("c3", busy.address.as_str()),
        ],
    )];

    let app = TestBroadcaster::start(
        groups.clone(),
        BroadcastSettings {
            enforce: true,
            ..BroadcastSettings::default()
        },
    )
    .await;
    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("X-Group", "europe")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body = report(resp).await;
    assert_eq!(body["c1"], 200);
    assert_eq!(body["c2"], 404);
    assert_eq!(body["c3"], 503);

    let relaxed = TestBroadcaster::start(groups, BroadcastSettings::default()).await;
    let resp = reqwest::Client::new()
        .request(purge(), relaxed.url("/"))
        .header("X-Group", "europe")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(report(resp).await["c3"], 503);
}

#[tokio::test]
async fn unreachable_cache_reports_500() {
    let ok = StubCache::start(StatusCode::OK).await;
    let dead = unreachable_address().await;
    let app = TestBroadcaster::start(
        vec![group("europe", &[("up", ok.address.as_str()), ("down", dead.as_str())])],
        BroadcastSettings::default(),
    )
    .await;

    let resp = reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("X-Group", "europe")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = report(resp).await;
    assert_eq!(body["up"], 200);
    assert_eq!(body["down"], 500);
}

#[tokio::test]
async fn method_path_and_headers_are_replayed() {
    let cache = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![group("europe", &[("c1", cache.address.as_str())])],
        BroadcastSettings::default(),
    )
    .await;

    reqwest::Client::new()
        .request(purge(), app.url("/articles/42?x=1"))
        .header("X-Group", "europe")
        .header("X-Ban-Url", "^/articles/.*")
        .header("X-Correlation-Id", "abc-123")
        .send()
        .await
        .unwrap();

    let seen = cache.seen();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.method.as_str(), "PURGE");
    assert_eq!(request.path, "/articles/42");
    assert_eq!(request.headers["x-ban-url"], "^/articles/.*");
    assert_eq!(request.headers["x-correlation-id"], "abc-123");
    assert!(request.headers.get("x-group").is_none());
    let expected_host = cache.address.trim_start_matches("http://");
    assert_eq!(request.headers["host"], expected_host);
}

#[tokio::test]
async fn headers_are_not_replayed_when_disabled() {
    let cache = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![group("europe", &[("c1", cache.address.as_str())])],
        BroadcastSettings {
            forward_headers: false,
            ..BroadcastSettings::default()
        },
    )
    .await;

    reqwest::Client::new()
        .request(purge(), app.url("/"))
        .header("X-Ban-Url", "^/articles/.*")
        .send()
        .await
        .unwrap();

    let seen = cache.seen();
    assert!(seen[0].headers.get("x-ban-url").is_none());
    assert!(seen[0].headers.get("x-correlation-id").is_some());
}

#[tokio::test]
async fn repeated_requests_return_the_same_shape() {
    let a = StubCache::start(StatusCode::OK).await;
    let b = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![group("europe", &[("c1", a.address.as_str()), ("c2", b.address.as_str())])],
        BroadcastSettings::default(),
    )
    .await;

    let client = reqwest::Client::new();
    let mut bodies = Vec::new();
    for _ in 0..3 {
        let resp = client
            .request(purge(), app.url("/"))
            .header("X-Group", "europe")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        bodies.push(report(resp).await);
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(a.hits(), 3);
    assert_eq!(b.hits(), 3);
}

#[tokio::test]
async fn non_utf8_group_header_is_404_without_dispatch() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let eu = StubCache::start(StatusCode::OK).await;
    let us = StubCache::start(StatusCode::OK).await;
    let app = TestBroadcaster::start(
        vec![
            group("europe", &[("c1", eu.address.as_str())]),
            group("america", &[("c2", us.address.as_str())]),
        ],
        BroadcastSettings::default(),
    )
    .await;

    // Latin-1 bytes, as a legacy client would send them
    let mut stream = tokio::net::TcpStream::connect(app.addr).await.unwrap();
    stream
        .write_all(b"PURGE / HTTP/1.1\r\nHost: broadcaster\r\nX-Group: caf\xE9\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();

    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    assert_eq!((eu.hits(), us.hits()), (0, 0));
}
