//! Shared integration test infrastructure for s3batch-rs.
//!
//! `InMemoryBucket` and `StatusMap` stand in for S3 and the public HTTP
//! endpoint so that whole batches run offline through the public API.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use s3batch_rs::config::{Config, ProbeConfig};
use s3batch_rs::key_mapper::PublicEndpoints;
use s3batch_rs::prober::HttpFetcher;
use s3batch_rs::storage::StorageTrait;
use s3batch_rs::types::{ObjectMetadata, ObjectVersionRef};
use s3batch_rs::{
    BatchOutcome, BatchReconciler, Operation, ReconcileStatistics, S3batchError, WorkItem,
    create_batch_cancellation_token,
};

#[cfg(e2e_test)]
pub mod e2e;

pub const BUCKET: &str = "test-bucket";
pub const REGION: &str = "ap-northeast-1";
pub const BUCKET_ORIGIN: &str = "https://test-bucket.s3.ap-northeast-1.amazonaws.com";

/// Upper bound for any single batch in these tests.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
struct BucketState {
    // key -> (version id, is delete marker)
    objects: BTreeMap<String, Vec<(String, bool)>>,
    uploads: Vec<(String, ObjectMetadata, Vec<u8>)>,
    next_version: u64,
}

/// A versioned bucket held in memory.
#[derive(Clone)]
pub struct InMemoryBucket {
    state: Arc<Mutex<BucketState>>,
    stats_sender: Sender<ReconcileStatistics>,
}

impl InMemoryBucket {
    pub fn new() -> Self {
        let (stats_sender, _) = async_channel::unbounded();
        Self {
            state: Arc::new(Mutex::new(BucketState::default())),
            stats_sender,
        }
    }

    /// Add one live version of `key`.
    pub fn put(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version_id = format!("v{}", state.next_version);
        state
            .objects
            .entry(key.to_string())
            .or_default()
            .push((version_id, false));
    }

    /// Add a delete marker on top of `key`.
    pub fn mark_deleted(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version_id = format!("dm{}", state.next_version);
        state
            .objects
            .entry(key.to_string())
            .or_default()
            .push((version_id, true));
    }

    /// Number of versions and delete markers left under `key`.
    pub fn version_count(&self, key: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.objects.get(key).map_or(0, Vec::len)
    }

    pub fn uploads(&self) -> Vec<(String, ObjectMetadata, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }
}

#[async_trait]
impl StorageTrait for InMemoryBucket {
    fn bucket(&self) -> &str {
        BUCKET
    }

    async fn head_bucket(&self) -> Result<()> {
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        let state = self.state.lock().unwrap();
        let live = state
            .objects
            .get(key)
            .and_then(|versions| versions.last())
            .is_some_and(|(_, is_marker)| !is_marker);
        if live {
            Ok(HeadObjectOutput::builder().build())
        } else {
            Err(anyhow!(S3batchError::ObjectNotFound(key.to_string())))
        }
    }

    async fn list_object_versions(&self, key: &str) -> Result<Vec<ObjectVersionRef>> {
        let state = self.state.lock().unwrap();
        let mut versions: Vec<ObjectVersionRef> = state
            .objects
            .get(key)
            .into_iter()
            .flatten()
            .map(|(version_id, is_delete_marker)| ObjectVersionRef {
                key: key.to_string(),
                version_id: version_id.clone(),
                is_delete_marker: *is_delete_marker,
            })
            .collect();
        versions.sort_by_key(|version| version.is_delete_marker);
        Ok(versions)
    }

    async fn delete_object(
        &self,
        key: &str,
        version_id: Option<String>,
    ) -> Result<DeleteObjectOutput> {
        let mut state = self.state.lock().unwrap();
        if let Some(versions) = state.objects.get_mut(key) {
            versions.retain(|(id, _)| Some(id) != version_id.as_ref());
            if versions.is_empty() {
                state.objects.remove(key);
            }
        }
        Ok(DeleteObjectOutput::builder().build())
    }

    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<PutObjectOutput> {
        let body = tokio::fs::read(local_path).await?;
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version_id = format!("v{}", state.next_version);
        state
            .objects
            .entry(key.to_string())
            .or_default()
            .push((version_id, false));
        state
            .uploads
            .push((key.to_string(), metadata.clone(), body));
        Ok(PutObjectOutput::builder().build())
    }

    async fn send_stats(&self, stats: ReconcileStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    fn set_warning(&self) {}
}

/// Answers GETs from a fixed url -> status table. Unknown URLs get 404.
#[derive(Clone, Default)]
pub struct StatusMap {
    statuses: Arc<Mutex<HashMap<String, u16>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StatusMap {
    pub fn with(self, url: &str, status: u16) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetcher for StatusMap {
    async fn get_status(&self, url: &str) -> Result<u16> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(404))
    }
}

/// A staging config for `operation` with no probe delay.
pub fn test_config(operation: Operation, resource_dir: &Path) -> Config {
    Config {
        operation,
        endpoints: PublicEndpoints::new(BUCKET, REGION, None, "staging"),
        resource_dir: resource_dir.to_path_buf(),
        probe_config: ProbeConfig {
            retries: 1,
            delay_milliseconds: 0,
            ..ProbeConfig::default()
        },
        ..Config::for_bucket(BUCKET, REGION)
    }
}

/// Run one batch over `lines` against the given bucket and HTTP table.
pub async fn run_batch(
    config: Config,
    bucket: &InMemoryBucket,
    statuses: &StatusMap,
    lines: &str,
) -> Result<BatchOutcome> {
    let mut reconciler = BatchReconciler::with_components(
        config,
        Box::new(bucket.clone()),
        Box::new(statuses.clone()),
        create_batch_cancellation_token(),
    );

    tokio::time::timeout(BATCH_TIMEOUT, reconciler.run(WorkItem::from_lines(lines)))
        .await
        .map_err(|_| anyhow!("batch timed out"))?
}
