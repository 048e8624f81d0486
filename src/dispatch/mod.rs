//! Outbound dispatch: jobs, the worker pool, and the transport seam.
//!
//! A broadcast turns into one [`Job`] per cache. Jobs are pushed onto a
//! single bounded queue drained by a fixed set of long-lived workers
//! ([`WorkerPool`]). Each worker runs one job at a time through a
//! [`Transport`], retrying transport failures after re-warming the
//! cache's client, and completes the job's one-shot result slot exactly
//! once.

pub mod job;
pub mod worker;

use async_trait::async_trait;
use http::StatusCode;

use crate::error::BroadcasterError;
use crate::registry::Destination;

pub use job::{DispatchTarget, Job, JobHandle, JobOutcome};
pub use worker::{execute, WorkerPool, WorkerSettings};

/// How a worker reaches a cache.
///
/// [`ClientPool`](crate::pool::ClientPool) is the production
/// implementation; tests substitute scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one attempt and return the cache's status code.
    async fn send(&self, target: &DispatchTarget) -> Result<StatusCode, BroadcasterError>;

    /// Replace the connection state for `destination` before a retry.
    fn rewarm(&self, destination: &Destination) -> Result<(), BroadcasterError>;
}
