//! Per-item worker of the batch reconciler.
//!
//! Every worker pulls [`Job`]s from the shared MPMC channel, runs the delete
//! or upload flow for the item, and sends an index-stamped outcome back.

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::eraser::ObjectEraser;
use crate::key_mapper::create_access_url;
use crate::resolver::{Resolution, ResourceResolver};
use crate::stage::{SendResult, Stage};
use crate::types::{
    IndexedOutcome, ItemTask, Job, MappedKey, OutcomeRecord, ReconcileStatistics,
};
use crate::uploader::ObjectUploader;

pub const REASON_URL_NOT_ACCESSIBLE: &str = "URL not accessible";
pub const REASON_URL_INVALID: &str = "URL invalid";

pub struct ItemWorker {
    worker_index: u16,
    base: Stage,
    eraser: ObjectEraser,
    uploader: ObjectUploader,
    resolver: ResourceResolver,
}

impl ItemWorker {
    pub fn new(base: Stage, worker_index: u16) -> Self {
        let eraser = ObjectEraser::new(dyn_clone::clone_box(&*base.target));
        let uploader = ObjectUploader::new(dyn_clone::clone_box(&*base.target));
        let resolver = ResourceResolver::new(base.config.resource_dir.clone());

        Self {
            worker_index,
            base,
            eraser,
            uploader,
            resolver,
        }
    }

    pub async fn run(&self) -> Result<()> {
        debug!(worker_index = self.worker_index, "item worker started.");
        self.receive_and_process().await
    }

    async fn receive_and_process(&self) -> Result<()> {
        loop {
            tokio::select! {
                recv_result = self.base.receiver.recv() => {
                    match recv_result {
                        Ok(job) => {
                            let outcome = self.process(job).await;
                            if self.base.send(outcome).await? == SendResult::Closed {
                                debug!(worker_index = self.worker_index, "result channel closed.");
                                return Ok(());
                            }
                        },
                        Err(_) if self.base.receiver.is_closed() => {
                            debug!(worker_index = self.worker_index, "item worker has been completed.");
                            break;
                        }
                        Err(e) => {
                            error!(worker_index = self.worker_index, error = %e, "unexpected channel error.");
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "item worker has been cancelled.");
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn process(&self, job: Job) -> IndexedOutcome {
        let (key, outcome) = match job.task {
            ItemTask::Delete(mapped) => (mapped.key.clone(), self.delete(mapped).await),
            ItemTask::Upload(key) => {
                let outcome = self.upload(&key).await;
                (key, outcome)
            }
        };

        let stats = if outcome.is_success() {
            ReconcileStatistics::ItemSuccess { key }
        } else {
            self.base.set_warning();
            ReconcileStatistics::ItemFailure { key }
        };
        self.base.send_stats(stats).await;

        IndexedOutcome {
            index: job.index,
            outcome,
        }
    }

    /// Probe the public URL, then erase every version of the key.
    async fn delete(&self, mapped: MappedKey) -> OutcomeRecord {
        if !self.base.prober.probe(&mapped.url).await {
            warn!(
                worker_index = self.worker_index,
                key = mapped.key,
                url = mapped.url,
                "{REASON_URL_NOT_ACCESSIBLE}."
            );
            return OutcomeRecord::failure(mapped.key, mapped.url, REASON_URL_NOT_ACCESSIBLE);
        }

        match self.eraser.erase(&mapped.key).await {
            Ok(_) => OutcomeRecord::success(mapped.key, mapped.url),
            Err(e) => {
                warn!(
                    worker_index = self.worker_index,
                    key = mapped.key,
                    "erase failed: {e:#}"
                );
                OutcomeRecord::failure(mapped.key, mapped.url, format!("{e:#}"))
            }
        }
    }

    /// Resolve the local resource, upload it, then confirm the access URL serves it.
    async fn upload(&self, key: &str) -> OutcomeRecord {
        let item = match self.resolver.resolve(key) {
            Resolution::Found(item) => item,
            Resolution::Missing(failure) => {
                warn!(
                    worker_index = self.worker_index,
                    key = key,
                    path = failure.path(),
                    "resource not found."
                );
                return failure;
            }
        };

        let uploaded = self.uploader.upload(&item).await;
        if !uploaded.is_success() {
            return uploaded;
        }

        let access_url = create_access_url(&item.key, &self.base.config.endpoints);
        if !self.base.prober.probe(&access_url).await {
            warn!(
                worker_index = self.worker_index,
                key = key,
                url = access_url,
                "{REASON_URL_INVALID}."
            );
            return OutcomeRecord::failure(item.file_name(), access_url, REASON_URL_INVALID);
        }

        OutcomeRecord::success(item.file_name(), access_url)
    }
}
