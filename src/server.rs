//! Axum router construction and the inbound listener.
//!
//! [`build_router`] sends every request, whatever its method or path, to
//! the broadcast handler. [`serve`] runs the router on a plaintext
//! listener through `axum::serve`, or on a TLS listener through
//! `tokio-rustls` and hyper-util's auto connection builder. Both stop
//! accepting when the shutdown future resolves and drain open
//! connections before returning.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::broadcast::handler::broadcast_handler;
use crate::broadcast::Broadcaster;
use crate::error::BroadcasterError;

#[derive(Debug, Clone)]
pub enum ListenerConfig {
    Plain {
        addr: SocketAddr,
    },
    Tls {
        addr: SocketAddr,
        cert: PathBuf,
        key: PathBuf,
    },
}

impl ListenerConfig {
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        match self {
            Self::Plain { addr } | Self::Tls { addr, .. } => *addr,
        }
    }

    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls { .. })
    }
}

pub fn build_router(broadcaster: Arc<Broadcaster>) -> Router {
    Router::new()
        .fallback(broadcast_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(broadcaster)
}

/// Bind per `config` and serve `router` until `shutdown` resolves.
///
/// TLS material is loaded before binding, so a bad certificate or key
/// fails fast without ever accepting a connection.
pub async fn serve<F>(
    config: &ListenerConfig,
    router: Router,
    shutdown: F,
) -> Result<(), BroadcasterError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match config {
        ListenerConfig::Plain { addr } => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(addr = %addr, "listening (http)");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await?;
        }
        ListenerConfig::Tls { addr, cert, key } => {
            let tls = load_tls_config(cert, key)?;
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(addr = %addr, "listening (https)");
            serve_tls(listener, TlsAcceptor::from(tls), router, shutdown).await;
        }
    }
    Ok(())
}

async fn serve_tls<F>(listener: TcpListener, acceptor: TlsAcceptor, router: Router, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        let watcher = graceful.watcher();

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(tls_stream), service);
            if let Err(e) = watcher.watch(conn).await {
                tracing::debug!(peer = %peer, error = %e, "connection closed with error");
            }
        });
    }

    drop(listener);
    graceful.shutdown().await;
}

/// Read a PEM certificate chain and private key into a rustls server config.
pub fn load_tls_config(
    cert: &Path,
    key: &Path,
) -> Result<Arc<rustls::ServerConfig>, BroadcasterError> {
    crate::pool::install_crypto_provider();

    let tls_error = |path: &Path, message: String| BroadcasterError::Tls {
        path: path.to_path_buf(),
        message,
    };

    let cert_file = std::fs::File::open(cert).map_err(|e| tls_error(cert, e.to_string()))?;
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(cert, e.to_string()))?;
    if certs.is_empty() {
        return Err(tls_error(cert, "no certificates found".into()));
    }

    let key_file = std::fs::File::open(key).map_err(|e| tls_error(key, e.to_string()))?;
    let private_key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_file))
        .map_err(|e| tls_error(key, e.to_string()))?
        .ok_or_else(|| tls_error(key, "no private key found".into()))?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|e| tls_error(key, e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
