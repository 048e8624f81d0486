//! Reload and shutdown events, and how the running broadcaster reacts.
//!
//! The core only sees [`Lifecycle`] events. [`signal_events`] is the
//! default producer: SIGHUP becomes [`Lifecycle::Reload`], Ctrl+C and
//! SIGTERM become [`Lifecycle::Shutdown`]. [`supervise`] consumes the
//! events; a reload that fails at any step ends supervision with the
//! error instead of leaving a half-applied configuration.

use tokio::sync::mpsc;

use crate::config::ConfigSource;
use crate::error::BroadcasterError;
use crate::pool::ClientPool;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Reload,
    Shutdown,
}

/// Re-load the registry, warming a client for every cache it names before
/// the new snapshot is published, then drop clients for removed caches.
pub async fn reload(
    registry: &Registry,
    pool: &ClientPool,
    source: &dyn ConfigSource,
) -> Result<(), BroadcasterError> {
    let snapshot = registry
        .reload(source, |fresh| {
            tracing::info!(caches = fresh.destinations().len(), "warming up connections");
            pool.warm_all(fresh.destinations())
        })
        .await?;
    pool.retain(snapshot.destinations());
    Ok(())
}

/// React to events until shutdown is requested or a reload fails.
pub async fn supervise(
    mut events: mpsc::Receiver<Lifecycle>,
    registry: &Registry,
    pool: &ClientPool,
    source: &dyn ConfigSource,
) -> Result<(), BroadcasterError> {
    while let Some(event) = events.recv().await {
        match event {
            Lifecycle::Reload => {
                tracing::info!(source = source.name(), "reload requested");
                if let Err(e) = reload(registry, pool, source).await {
                    tracing::error!(error = %e, "reload failed, shutting down");
                    return Err(e);
                }
            }
            Lifecycle::Shutdown => {
                tracing::info!("shutdown requested");
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Translate OS signals into [`Lifecycle`] events.
#[must_use]
pub fn signal_events() -> mpsc::Receiver<Lifecycle> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(forward_signals(tx));
    rx
}

async fn forward_signals(tx: mpsc::Sender<Lifecycle>) {
    let mut hangup = Hangup::install();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                let _ = tx.send(Lifecycle::Shutdown).await;
                return;
            }
            () = hangup.recv() => {
                tracing::info!("received SIGHUP");
                if tx.send(Lifecycle::Reload).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(unix)]
struct Hangup(Option<tokio::signal::unix::Signal>);

#[cfg(unix)]
impl Hangup {
    fn install() -> Self {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
            Ok(signal) => Self(Some(signal)),
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGHUP handler, reload disabled");
                Self(None)
            }
        }
    }

    async fn recv(&mut self) {
        if let Some(signal) = self.0.as_mut() {
            if signal.recv().await.is_some() {
                return;
            }
            self.0 = None;
        }
        std::future::pending::<()>().await;
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    const fn install() -> Self {
        Self
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
