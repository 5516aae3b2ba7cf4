//! Batch reconciler.
//!
//! Turns a list of work items into one [`BatchOutcome`]. Items fan out to a
//! fixed pool of [`ItemWorker`]s over a bounded MPMC channel and come back on
//! an index-stamped result channel:
//!
//! ```text
//! feeder → ItemWorker × worker_size (MPMC) → Terminator (restores input order)
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::key_mapper::map_source_url;
use crate::prober::{AccessibilityProber, Fetcher, ReqwestFetcher};
use crate::stage::Stage;
use crate::storage::{self, Storage};
use crate::terminator::Terminator;
use crate::types::error::{S3batchError, is_cancelled_error};
use crate::types::token::BatchCancellationToken;
use crate::types::{
    BatchOutcome, IndexedOutcome, ItemTask, Job, Operation, OutcomeRecord, ReconcileStatistics,
    WorkItem,
};
use crate::worker::ItemWorker;

const JOB_QUEUE_SIZE: usize = 1000;

/// Drives one delete or upload batch.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// # use s3batch_rs::{BatchReconciler, Config, create_batch_cancellation_token};
/// # let config: Config = todo!();
/// let cancellation_token = create_batch_cancellation_token();
/// let mut reconciler = BatchReconciler::new(config.clone(), cancellation_token).await?;
/// reconciler.check_connectivity().await?;
///
/// let items = BatchReconciler::load_work_items(&config.input_file).await?;
/// let outcome = reconciler.run(items).await?;
/// println!("{} succeeded, {} failed", outcome.success.len(), outcome.failure.len());
/// # Ok(())
/// # }
/// ```
pub struct BatchReconciler {
    config: Config,
    target: Storage,
    fetcher: Fetcher,
    cancellation_token: BatchCancellationToken,
    stats_sender: Sender<ReconcileStatistics>,
    stats_receiver: Receiver<ReconcileStatistics>,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    ready: bool,
}

impl BatchReconciler {
    /// Create a reconciler backed by S3 and a real HTTP prober.
    pub async fn new(config: Config, cancellation_token: BatchCancellationToken) -> Result<Self> {
        let has_warning = Arc::new(AtomicBool::new(false));
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let target = storage::create_storage(
            config.clone(),
            cancellation_token.clone(),
            stats_sender.clone(),
            has_warning.clone(),
        )
        .await;

        let fetcher = Box::new(ReqwestFetcher::new(Duration::from_millis(
            config.probe_config.timeout_milliseconds,
        ))?);

        Ok(Self::from_parts(
            config,
            target,
            fetcher,
            cancellation_token,
            (stats_sender, stats_receiver),
            has_warning,
        ))
    }

    /// Create a reconciler over caller-supplied storage and HTTP backends.
    ///
    /// Statistics the storage itself emits go to its own sender; the
    /// reconciler's stats channel carries the per-item statistics.
    pub fn with_components(
        config: Config,
        target: Storage,
        fetcher: Fetcher,
        cancellation_token: BatchCancellationToken,
    ) -> Self {
        Self::from_parts(
            config,
            target,
            fetcher,
            cancellation_token,
            async_channel::unbounded(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn from_parts(
        config: Config,
        target: Storage,
        fetcher: Fetcher,
        cancellation_token: BatchCancellationToken,
        (stats_sender, stats_receiver): (Sender<ReconcileStatistics>, Receiver<ReconcileStatistics>),
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            target,
            fetcher,
            cancellation_token,
            stats_sender,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            has_warning,
            errors: Arc::new(Mutex::new(VecDeque::new())),
            ready: true,
        }
    }

    /// Confirm the bucket is reachable before any item is processed.
    pub async fn check_connectivity(&self) -> Result<()> {
        self.target.head_bucket().await?;
        info!(bucket = self.target.bucket(), "connectivity check passed.");
        Ok(())
    }

    /// Read an input list file into work items.
    pub async fn load_work_items(path: &Path) -> Result<Vec<WorkItem>> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow!(S3batchError::InputRead(format!("{}: {e}", path.display())))
        })?;

        let items = WorkItem::from_lines(&text);
        info!(path = %path.display(), count = items.len(), "input list loaded.");
        Ok(items)
    }

    /// Run the configured operation over `items`.
    ///
    /// Item failures end up in the returned outcome. The run itself fails on
    /// a mapping error (before any object is touched), on cancellation, and
    /// when a worker fails or panics.
    pub async fn run(&mut self, items: Vec<WorkItem>) -> Result<BatchOutcome> {
        assert!(self.ready, "BatchReconciler::run() called more than once");
        self.ready = false;

        let operation = self.config.operation;
        info!(operation = %operation, count = items.len(), "batch has started.");

        let result = match self.build_jobs(operation, items) {
            Ok(jobs) => self.execute(jobs).await,
            Err(e) => Err(e),
        };

        self.shutdown();

        if let Ok(outcome) = &result {
            info!(
                operation = %operation,
                success = outcome.success.len(),
                failure = outcome.failure.len(),
                "batch has been completed."
            );
        }

        result
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// True once any item has failed.
    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    pub fn get_stats_receiver(&self) -> Receiver<ReconcileStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats channel so that a progress reporter can finish.
    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }

    // Every source URL is mapped up front so that one malformed URL stops the
    // run before anything is deleted.
    fn build_jobs(&self, operation: Operation, items: Vec<WorkItem>) -> Result<Vec<Job>> {
        match operation {
            Operation::Delete => {
                let origin = self.config.endpoints.origin();
                let delimiter = self.config.endpoints.delimiter();

                items
                    .into_iter()
                    .map(|item| -> Result<Job> {
                        let mapped = map_source_url(
                            &item.line,
                            &origin,
                            &delimiter,
                            &self.config.host_suffixes,
                        )?;
                        debug!(url = item.line, key = mapped.key, "source URL mapped.");

                        Ok(Job {
                            index: item.index,
                            task: ItemTask::Delete(mapped),
                        })
                    })
                    .collect()
            }
            Operation::Upload => Ok(items
                .into_iter()
                .map(|item| Job {
                    index: item.index,
                    task: ItemTask::Upload(item.line),
                })
                .collect()),
        }
    }

    async fn execute(&self, jobs: Vec<Job>) -> Result<BatchOutcome> {
        let job_receiver = self.feed(jobs);
        let (results, worker_handles) = self.spawn_workers(job_receiver);
        let terminator_handle = self.terminate(results);

        // Worker failures are recorded by the wrapper tasks, which can finish
        // after the result channel has closed.
        for worker_handle in worker_handles {
            if let Err(e) = worker_handle.await {
                self.has_panic.store(true, Ordering::SeqCst);
                error!("item worker wrapper panicked: {}", e);
                self.record_error(anyhow!("item worker wrapper panicked: {}", e));
            }
        }

        let outcomes = match terminator_handle.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.has_panic.store(true, Ordering::SeqCst);
                error!("terminator task panicked: {}", e);
                self.record_error(anyhow!("terminator task panicked: {}", e));
                Vec::new()
            }
        };

        if let Some(e) = self.take_first_error() {
            return Err(e);
        }
        if self.cancellation_token.is_cancelled() {
            info!("batch has been cancelled.");
            return Err(anyhow!(S3batchError::Cancelled));
        }

        Ok(BatchOutcome::from_records(outcomes))
    }

    fn feed(&self, jobs: Vec<Job>) -> Receiver<Job> {
        let (sender, receiver) = async_channel::bounded::<Job>(JOB_QUEUE_SIZE);
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            for job in jobs {
                tokio::select! {
                    result = sender.send(job) => {
                        if result.is_err() {
                            break;
                        }
                    },
                    _ = cancellation_token.cancelled() => {
                        debug!("feeder has been cancelled.");
                        break;
                    }
                }
            }
        });

        receiver
    }

    fn spawn_workers(
        &self,
        job_receiver: Receiver<Job>,
    ) -> (Receiver<IndexedOutcome>, Vec<JoinHandle<()>>) {
        let (sender, next_stage_receiver) = async_channel::bounded(JOB_QUEUE_SIZE);
        let mut worker_handles = Vec::with_capacity(self.config.worker_size.max(1) as usize);

        for worker_index in 0..self.config.worker_size.max(1) {
            let stage = Stage::new(
                self.config.clone(),
                dyn_clone::clone_box(&*self.target),
                AccessibilityProber::new(
                    dyn_clone::clone_box(&*self.fetcher),
                    self.config.probe_config.retries,
                    Duration::from_millis(self.config.probe_config.delay_milliseconds),
                ),
                job_receiver.clone(),
                sender.clone(),
                self.stats_sender.clone(),
                self.cancellation_token.clone(),
                self.has_warning.clone(),
            );
            let worker = ItemWorker::new(stage, worker_index);

            let has_error = self.has_error.clone();
            let has_panic = self.has_panic.clone();
            let error_list = self.errors.clone();
            let cancellation_token = self.cancellation_token.clone();

            worker_handles.push(tokio::spawn(async move {
                let join_result = tokio::spawn(async move { worker.run().await }).await;

                match join_result {
                    Ok(Ok(())) => {
                        debug!(worker_index, "item worker completed successfully.");
                    }
                    Ok(Err(e)) => {
                        if is_cancelled_error(&e) {
                            info!(worker_index, "item worker cancelled.");
                        } else {
                            cancellation_token.cancel();
                            has_error.store(true, Ordering::SeqCst);
                            error!(worker_index, "item worker failed: {}", e);
                            error_list.lock().unwrap().push_back(e);
                        }
                    }
                    Err(e) => {
                        cancellation_token.cancel();
                        has_error.store(true, Ordering::SeqCst);
                        has_panic.store(true, Ordering::SeqCst);
                        error!(worker_index, "item worker task panicked: {}", e);
                        error_list
                            .lock()
                            .unwrap()
                            .push_back(anyhow!("item worker panicked: {}", e));
                    }
                }
            }));
        }

        // The result channel closes once every worker has finished.
        drop(sender);

        (next_stage_receiver, worker_handles)
    }

    fn terminate(&self, results: Receiver<IndexedOutcome>) -> JoinHandle<Vec<OutcomeRecord>> {
        let terminator = Terminator::new(results);
        tokio::spawn(async move { terminator.terminate().await })
    }

    fn record_error(&self, error: anyhow::Error) {
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }

    fn take_first_error(&self) -> Option<anyhow::Error> {
        if !self.has_error() {
            return None;
        }
        self.errors.lock().unwrap().pop_front()
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }
}
