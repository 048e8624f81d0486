//! Stub caches and an in-process broadcaster for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;

use broadcaster::broadcast::{BroadcastSettings, Broadcaster};
use broadcaster::config::model::{CacheConfig, Config, GroupConfig};
use broadcaster::config::ConfigVersion;
use broadcaster::dispatch::{Transport, WorkerPool, WorkerSettings};
use broadcaster::pool::{ClientPool, ClientSettings};
use broadcaster::registry::{Registry, RegistrySnapshot};
use broadcaster::server;

/// What a stub cache saw for one request.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

/// A cache that answers every request with a fixed status.
#[derive(Clone)]
pub struct StubCache {
    pub address: String,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Seen>>>,
    status: StatusCode,
}

impl StubCache {
    pub async fn start(status: StatusCode) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stub = Self {
            address: format!("http://{addr}"),
            hits: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            status,
        };

        let router = Router::new()
            .fallback(answer)
            .with_state(stub.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        stub
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }
}

async fn answer(
    State(stub): State<StubCache>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    stub.seen.lock().push(Seen {
        method,
        path: uri.path().to_string(),
        headers,
    });
    stub.status
}

/// An address nothing listens on.
pub async fn unreachable_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn group(name: &str, caches: &[(&str, &str)]) -> GroupConfig {
    GroupConfig {
        name: name.into(),
        caches: caches
            .iter()
            .map(|(name, address)| CacheConfig {
                name: (*name).into(),
                address: (*address).into(),
            })
            .collect(),
    }
}

pub struct TestBroadcaster {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub pool: Arc<ClientPool>,
    pub workers: Arc<WorkerPool>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestBroadcaster {
    pub async fn start(groups: Vec<GroupConfig>, settings: BroadcastSettings) -> Self {
        let snapshot = RegistrySnapshot::from_config(
            Config { groups },
            ConfigVersion::Hash("test-hash".into()),
            "test",
        );

        let pool = Arc::new(ClientPool::new(ClientSettings {
            timeout: Duration::from_secs(2),
            ..ClientSettings::default()
        }));
        pool.warm_all(snapshot.destinations()).unwrap();

        let registry = Arc::new(Registry::new(snapshot));
        let transport: Arc<dyn Transport> = pool.clone();
        let workers = Arc::new(WorkerPool::spawn(
            WorkerSettings {
                workers: 4,
                queue_capacity: 64,
                retries: 1,
            },
            transport,
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            Arc::clone(&workers),
            settings,
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = server::build_router(broadcaster);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            registry,
            pool,
            workers,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestBroadcaster {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn purge() -> reqwest::Method {
    reqwest::Method::from_bytes(b"PURGE").unwrap()
}
