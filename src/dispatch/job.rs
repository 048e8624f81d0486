use http::{HeaderMap, Method, StatusCode};
use tokio::sync::oneshot;

use crate::error::BroadcasterError;
use crate::registry::Destination;

/// What a finished job reports: the cache's status or why it could not be reached.
pub type JobOutcome = Result<StatusCode, BroadcasterError>;

/// A private copy of a destination plus the request to replay against it.
///
/// Each job owns its target, so concurrent jobs for the same cache never
/// share per-dispatch state.
#[derive(Debug, Clone)]
pub struct DispatchTarget {
    pub destination: Destination,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl DispatchTarget {
    /// Cache base address joined with the request path.
    #[must_use]
    pub fn url(&self) -> String {
        let base = self.destination.address.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{base}{}", self.path)
        } else {
            format!("{base}/{}", self.path)
        }
    }
}

/// Worker side of a job.
#[derive(Debug)]
pub struct Job {
    pub target: DispatchTarget,
    reply: oneshot::Sender<JobOutcome>,
}

/// Coordinator side of a job: a single-use result slot.
#[derive(Debug)]
pub struct JobHandle {
    destination: String,
    result: oneshot::Receiver<JobOutcome>,
}

impl Job {
    #[must_use]
    pub fn new(target: DispatchTarget) -> (Self, JobHandle) {
        let (reply, result) = oneshot::channel();
        let handle = JobHandle {
            destination: target.destination.name.clone(),
            result,
        };
        (Self { target, reply }, handle)
    }

    /// Deliver the outcome. Consumes the job, so it can only happen once.
    pub fn complete(self, outcome: JobOutcome) {
        if self.reply.send(outcome).is_err() {
            tracing::debug!(
                destination = %self.target.destination.name,
                "job result dropped, broadcast no longer waiting"
            );
        }
    }
}

impl JobHandle {
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Wait for the job's outcome. A job dropped before completing reads as
    /// [`BroadcasterError::QueueClosed`].
    pub async fn outcome(self) -> JobOutcome {
        self.result
            .await
            .unwrap_or(Err(BroadcasterError::QueueClosed))
    }
}
