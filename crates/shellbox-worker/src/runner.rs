//! Worker runner — main loop that claims tasks and executes them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, trace, warn};

use shellbox_core::config::worker::WorkerConfig;

use crate::executor::{TaskError, TaskExecutor};
use crate::queue::DbTaskQueue;

/// Main worker runner that polls the queue and executes claimed tasks.
#[derive(Debug)]
pub struct WorkerRunner {
    queue: Arc<DbTaskQueue>,
    executor: Arc<TaskExecutor>,
    config: WorkerConfig,
    worker_id: String,
    queues: Vec<String>,
}

impl WorkerRunner {
    /// Create a new worker runner.
    pub fn new(
        queue: Arc<DbTaskQueue>,
        executor: Arc<TaskExecutor>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            executor,
            config,
            worker_id,
            queues: vec!["cluster".to_string(), "default".to_string()],
        }
    }

    /// Set the queues to poll, in priority order.
    pub fn with_queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    /// Run until the cancel signal flips; drains in-flight tasks on exit.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            poll_interval = self.config.poll_interval_seconds,
            queues = ?self.queues,
            "Worker started"
        );

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                _ = self.poll_and_execute(&semaphore) => {
                    tokio::select! {
                        _ = cancel.changed() => {
                            if *cancel.borrow() {
                                info!(worker_id = %self.worker_id, "Worker shutting down");
                                break;
                            }
                        }
                        _ = time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.worker_id, "Waiting for in-flight tasks...");
        let max_permits = self.config.concurrency as u32;
        let _ = tokio::time::timeout(
            Duration::from_secs(30),
            semaphore.acquire_many(max_permits),
        )
        .await;

        info!(worker_id = %self.worker_id, "Worker shut down");
    }

    /// Claim one task and execute it on a free slot, if any.
    async fn poll_and_execute(&self, semaphore: &Arc<tokio::sync::Semaphore>) {
        let permit = match Arc::clone(semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                trace!("All worker slots occupied");
                return;
            }
        };

        let queue_refs: Vec<&str> = self.queues.iter().map(|s| s.as_str()).collect();

        match self.queue.claim(&queue_refs).await {
            Ok(Some(task)) => {
                let queue = Arc::clone(&self.queue);
                let executor = Arc::clone(&self.executor);

                tokio::spawn(async move {
                    let _permit = permit;

                    let task_id = task.id;
                    let attempts = task.attempts;
                    let max_attempts = task.max_attempts;

                    match executor.execute(&task).await {
                        Ok(()) => {
                            if let Err(e) = queue.complete(task_id).await {
                                error!(%task_id, %e, "Failed to mark task completed");
                            }
                        }
                        Err(TaskError::Transient(msg)) => {
                            warn!(%task_id, %msg, "Task failed (transient)");
                            let outcome = if attempts < max_attempts {
                                queue.retry(task_id, &msg).await
                            } else {
                                queue.fail(task_id, &msg).await
                            };
                            if let Err(e) = outcome {
                                error!(%task_id, %e, "Failed to record task outcome");
                            }
                        }
                        Err(TaskError::Permanent(msg)) => {
                            error!(%task_id, %msg, "Task failed permanently");
                            if let Err(e) = queue.fail(task_id, &msg).await {
                                error!(%task_id, %e, "Failed to mark task failed");
                            }
                        }
                        Err(TaskError::Internal(err)) => {
                            let msg = err.to_string();
                            error!(%task_id, %msg, "Task internal error");
                            if let Err(e) = queue.fail(task_id, &msg).await {
                                error!(%task_id, %e, "Failed to mark task failed");
                            }
                        }
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                trace!("No tasks available");
            }
            Err(e) => {
                drop(permit);
                error!(%e, "Failed to claim task");
            }
        }
    }
}
