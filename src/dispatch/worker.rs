use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::job::{DispatchTarget, Job, JobOutcome};
use super::Transport;
use crate::error::BroadcasterError;

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Extra attempts after the first transport failure.
    pub retries: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 8192,
            retries: 1,
        }
    }
}

/// Fixed set of dispatch workers sharing one bounded job queue.
pub struct WorkerPool {
    queue: Sender<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `settings.workers` workers (at least one) on the current runtime.
    #[must_use]
    pub fn spawn(settings: WorkerSettings, transport: Arc<dyn Transport>) -> Self {
        let (queue, jobs) = async_channel::bounded(settings.queue_capacity.max(1));
        let count = settings.workers.max(1);

        let workers = (0..count)
            .map(|id| {
                let jobs = jobs.clone();
                let transport = Arc::clone(&transport);
                tokio::spawn(run_worker(id, jobs, transport, settings.retries))
            })
            .collect();

        tracing::debug!(
            workers = count,
            queue_capacity = settings.queue_capacity,
            retries = settings.retries,
            "dispatch workers started"
        );

        Self {
            queue,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue a job, waiting for room when the queue is full.
    pub async fn submit(&self, job: Job) -> Result<(), BroadcasterError> {
        match self.queue.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    capacity = self.queue.capacity().unwrap_or_default(),
                    "dispatch queue full, waiting for a free slot"
                );
                self.queue
                    .send(job)
                    .await
                    .map_err(|_| BroadcasterError::QueueClosed)
            }
            Err(TrySendError::Closed(_)) => Err(BroadcasterError::QueueClosed),
        }
    }

    /// Stop accepting jobs, let workers drain what is queued, and wait for them.
    pub async fn shutdown(&self) {
        self.queue.close();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "dispatch worker panicked");
            }
        }
        tracing::debug!("dispatch workers stopped");
    }
}

async fn run_worker(
    id: usize,
    jobs: Receiver<Job>,
    transport: Arc<dyn Transport>,
    retries: u32,
) {
    while let Ok(job) = jobs.recv().await {
        let outcome = execute(transport.as_ref(), &job.target, retries).await;
        job.complete(outcome);
    }
    tracing::trace!(worker = id, "dispatch worker exiting");
}

/// Run one job: up to `retries + 1` attempts, re-warming between attempts.
///
/// Retries are immediate. A failed re-warm ends the job with that error
/// rather than trying again with a client known to be bad.
pub async fn execute(transport: &dyn Transport, target: &DispatchTarget, retries: u32) -> JobOutcome {
    let mut attempt: u32 = 0;
    loop {
        let error = match transport.send(target).await {
            Ok(status) => return Ok(status),
            Err(e) => e,
        };

        if attempt >= retries {
            return Err(error);
        }
        attempt += 1;

        tracing::warn!(
            destination = %target.destination.name,
            attempt,
            retries,
            error = %error,
            "request to cache failed, re-warming client and retrying"
        );

        if let Err(warm_error) = transport.rewarm(&target.destination) {
            tracing::error!(
                destination = %target.destination.name,
                error = %warm_error,
                "re-warming client failed, giving up"
            );
            return Err(warm_error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use http::{HeaderMap, Method, StatusCode};

    use super::*;
    use crate::registry::Destination;

    /// Fails the first `failures` sends, then answers 200.
    struct Flaky {
        failures: u32,
        sends: AtomicU32,
        rewarms: AtomicU32,
        rewarm_fails: bool,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                sends: AtomicU32::new(0),
                rewarms: AtomicU32::new(0),
                rewarm_fails: false,
            }
        }
    }

    #[async_trait]
    impl Transport for Flaky {
        async fn send(&self, target: &DispatchTarget) -> Result<StatusCode, BroadcasterError> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(BroadcasterError::DispatchTransport {
                    destination: target.destination.name.clone(),
                    source: "connection refused".into(),
                })
            } else {
                Ok(StatusCode::OK)
            }
        }

        fn rewarm(&self, destination: &Destination) -> Result<(), BroadcasterError> {
            self.rewarms.fetch_add(1, Ordering::SeqCst);
            if self.rewarm_fails {
                Err(BroadcasterError::ClientWarmup {
                    destination: destination.name.clone(),
                    message: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn target() -> DispatchTarget {
        DispatchTarget {
            destination: Destination {
                name: "c1".into(),
                address: "http://c1:80".into(),
            },
            method: Method::from_bytes(b"PURGE").unwrap(),
            path: "/".into(),
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn first_attempt_success_does_not_rewarm() {
        let transport = Flaky::new(0);
        let outcome = execute(&transport, &target(), 1).await;
        assert_eq!(outcome.unwrap(), StatusCode::OK);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
        assert_eq!(transport.rewarms.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_on_final_attempt_is_success() {
        let transport = Flaky::new(3);
        let outcome = execute(&transport, &target(), 3).await;
        assert_eq!(outcome.unwrap(), StatusCode::OK);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 4);
        assert_eq!(transport.rewarms.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_failure_too_many_is_failure() {
        let transport = Flaky::new(4);
        let outcome = execute(&transport, &target(), 3).await;
        assert!(matches!(
            outcome,
            Err(BroadcasterError::DispatchTransport { .. })
        ));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let transport = Flaky::new(1);
        assert!(execute(&transport, &target(), 0).await.is_err());
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_rewarm_aborts_retries() {
        let mut transport = Flaky::new(1);
        transport.rewarm_fails = true;
        let outcome = execute(&transport, &target(), 5).await;
        assert!(matches!(outcome, Err(BroadcasterError::ClientWarmup { .. })));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
        assert_eq!(transport.rewarms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pool_completes_every_submitted_job() {
        let pool = WorkerPool::spawn(
            WorkerSettings {
                workers: 3,
                queue_capacity: 2,
                retries: 1,
            },
            Arc::new(Flaky::new(0)),
        );

        let mut handles = Vec::new();
        for _ in 0..10 {
            let (job, handle) = Job::new(target());
            pool.submit(job).await.unwrap();
            handles.push(handle);
        }
        for handle in handles {
            assert_eq!(handle.outcome().await.unwrap(), StatusCode::OK);
        }

        pool.shutdown().await;
        let (job, _handle) = Job::new(target());
        assert!(matches!(
            pool.submit(job).await,
            Err(BroadcasterError::QueueClosed)
        ));
    }
}
