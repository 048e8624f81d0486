//! `broadcaster run`: start the broadcaster.
//!
//! Loads the cache registry, warms one pooled client per cache, starts
//! the dispatch workers, and serves until a shutdown event or a failed
//! reload. Reload events re-read the config file and re-warm clients.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::{BroadcastSettings, Broadcaster};
use crate::cli::RunArgs;
use crate::config::sources::{create_file_source, AUTO_DETECT_CANDIDATES};
use crate::config::ConfigSource;
use crate::dispatch::{Transport, WorkerPool, WorkerSettings};
use crate::error::BroadcasterError;
use crate::lifecycle;
use crate::logging;
use crate::pool::{ClientPool, ClientSettings};
use crate::registry::{self, Registry};
use crate::server::{self, ListenerConfig};

pub async fn execute(args: RunArgs) -> Result<(), BroadcasterError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let source = resolve_config_source(args.config.as_deref()).await?;

    tracing::info!(source = source.name(), "loading caches configuration");
    let snapshot = registry::load(source.as_ref()).await?;

    let pool = Arc::new(ClientPool::new(ClientSettings {
        timeout: Duration::from_millis(args.timeout),
        keep_alive: Duration::from_secs(args.keep_alive),
        max_idle_per_host: args.max_idle_per_host,
    }));
    tracing::info!(caches = snapshot.destinations().len(), "warming up connections");
    pool.warm_all(snapshot.destinations())?;

    let group_count = snapshot.group_count();
    let cache_count = snapshot.destinations().len();
    let version = snapshot.version.short().to_string();
    let registry = Arc::new(Registry::new(snapshot));

    let transport: Arc<dyn Transport> = pool.clone();
    let workers = Arc::new(WorkerPool::spawn(
        WorkerSettings {
            workers: usize::from(args.workers),
            queue_capacity: args.queue_capacity,
            retries: args.retries,
        },
        transport,
    ));

    let broadcaster = Arc::new(Broadcaster::new(
        Arc::clone(&registry),
        Arc::clone(&workers),
        BroadcastSettings {
            enforce: args.enforce,
            forward_headers: args.forward_headers,
            group_header: args.group_header.clone(),
        },
    ));

    let listener = listener_config(&args)?;
    let router = server::build_router(broadcaster);

    // Supervision ends on a shutdown event or a failed reload; either way the listener drains
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let events = lifecycle::signal_events();
    let supervisor = {
        let registry = Arc::clone(&registry);
        let pool = Arc::clone(&pool);
        tokio::spawn(async move {
            let result = lifecycle::supervise(events, &registry, &pool, source.as_ref()).await;
            let _ = stop_tx.send(true);
            result
        })
    };

    tracing::info!(
        addr = %listener.addr(),
        tls = listener.is_tls(),
        groups = group_count,
        caches = cache_count,
        version = %version,
        workers = args.workers,
        retries = args.retries,
        enforce = args.enforce,
        "broadcaster started"
    );

    let shutdown = async move {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    };
    let served = server::serve(&listener, router, shutdown).await;

    workers.shutdown().await;
    served?;

    match supervisor.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "lifecycle supervisor failed"),
    }

    tracing::info!("broadcaster stopped");
    Ok(())
}

/// TLS when both certificate and key are given, plaintext otherwise.
pub fn listener_config(args: &RunArgs) -> Result<ListenerConfig, BroadcasterError> {
    match (&args.crt, &args.key) {
        (Some(cert), Some(key)) => Ok(ListenerConfig::Tls {
            addr: format!("{}:{}", args.host, args.https_port).parse::<SocketAddr>()?,
            cert: cert.clone(),
            key: key.clone(),
        }),
        _ => Ok(ListenerConfig::Plain {
            addr: format!("{}:{}", args.host, args.port).parse::<SocketAddr>()?,
        }),
    }
}

async fn resolve_config_source(
    explicit: Option<&Path>,
) -> Result<Box<dyn ConfigSource>, BroadcasterError> {
    if let Some(path) = explicit {
        return create_file_source(path);
    }

    // Auto-detect in current directory
    for name in AUTO_DETECT_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path);
        }
    }

    Err(BroadcasterError::NoConfigSource {
        hint: "Provide --config <file>.\n  \
               Run 'broadcaster init' to create a config file."
            .into(),
    })
}
