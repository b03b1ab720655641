//! Queue workers: each pulls one job at a time and runs it to completion.
//! Multiple workers tolerate each other through the queue's conditional
//! claim; a crashed worker's job comes back via redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pedibot_db::repositories::JobQueue;

use crate::orchestrator::MessagePipeline;

pub struct Worker {
    id: String,
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<MessagePipeline>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: String,
        queue: Arc<dyn JobQueue>,
        pipeline: Arc<MessagePipeline>,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { id, queue, pipeline, poll_interval, shutdown }
    }

    pub async fn run(mut self) {
        info!(event_name = "worker.started", worker_id = %self.id, "queue worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.queue.claim_next(&self.id).await {
                Ok(Some(job)) => {
                    match self.pipeline.process(&job).await {
                        Ok(outcome) => {
                            if let Err(ack_error) = self.queue.complete(&job.id).await {
                                error!(
                                    event_name = "worker.ack_failed",
                                    worker_id = %self.id,
                                    correlation_id = %job.id.0,
                                    error = %ack_error,
                                    "job processed but completion ack failed; redelivery will dedup"
                                );
                            }
                            info!(
                                event_name = "worker.job_done",
                                worker_id = %self.id,
                                correlation_id = %job.id.0,
                                disposition = outcome.disposition.as_str(),
                                "job completed"
                            );
                        }
                        Err(process_error) => {
                            error!(
                                event_name = "worker.job_failed",
                                worker_id = %self.id,
                                correlation_id = %job.id.0,
                                error = %process_error,
                                "job failed; queueing for redelivery"
                            );
                            if let Err(fail_error) =
                                self.queue.fail(&job.id, &process_error.to_string()).await
                            {
                                error!(
                                    event_name = "worker.fail_mark_failed",
                                    worker_id = %self.id,
                                    correlation_id = %job.id.0,
                                    error = %fail_error,
                                    "could not record job failure"
                                );
                            }
                        }
                    }
                }
                Ok(None) => self.idle().await,
                Err(claim_error) => {
                    warn!(
                        event_name = "worker.claim_failed",
                        worker_id = %self.id,
                        error = %claim_error,
                        "queue claim failed; backing off"
                    );
                    self.idle().await;
                }
            }
        }

        info!(event_name = "worker.stopped", worker_id = %self.id, "queue worker stopped");
    }

    async fn idle(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}

/// Periodically returns expired claims to the queue so jobs from crashed
/// workers get redelivered. Safe to run beside the workers: reprocessing is
/// deduplicated downstream.
pub fn spawn_reaper(
    queue: Arc<dyn JobQueue>,
    lease: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::seconds(120));
        loop {
            if *shutdown.borrow() {
                break;
            }
            match queue.requeue_stale(lease).await {
                Ok(0) => {}
                Ok(requeued) => {
                    warn!(
                        event_name = "worker.stale_jobs_requeued",
                        requeued,
                        "returned expired claims to the queue"
                    );
                }
                Err(reap_error) => {
                    warn!(
                        event_name = "worker.reap_failed",
                        error = %reap_error,
                        "could not requeue stale jobs"
                    );
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    })
}

pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub fn spawn_workers(
    count: u32,
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<MessagePipeline>,
    poll_interval: Duration,
) -> WorkerPool {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = (0..count.max(1))
        .map(|index| {
            let worker = Worker::new(
                format!("worker-{index}"),
                Arc::clone(&queue),
                Arc::clone(&pipeline),
                poll_interval,
                shutdown_rx.clone(),
            );
            tokio::spawn(worker.run())
        })
        .collect();

    WorkerPool { shutdown: shutdown_tx, handles }
}

impl WorkerPool {
    /// A receiver on the pool's shutdown flag, for companion tasks (the
    /// reaper) that should stop with the workers.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Flips the shutdown flag and waits for every worker to finish its
    /// in-flight job.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
