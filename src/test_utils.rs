//! Shared test utilities for the s3batch library crate.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;

use crate::config::{ClientConfig, Config};
use crate::key_mapper::PublicEndpoints;
use crate::storage::StorageTrait;
use crate::types::error::S3batchError;
use crate::types::{AccessKeys, ObjectMetadata, ObjectVersionRef, ReconcileStatistics, S3Credentials};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// A [`Config`] for bucket `test-bucket` in `region` (staging), with static
/// dummy credentials so that building a client never consults the environment.
pub(crate) fn make_test_config() -> Config {
    Config {
        endpoints: PublicEndpoints::new("test-bucket", "region", None, "staging"),
        worker_size: 4,
        client_config: ClientConfig {
            credential: S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: "test".to_string(),
                    secret_access_key: "test".to_string(),
                    session_token: None,
                },
            },
            region: Some("us-east-1".to_string()),
            ..ClientConfig::default()
        },
        ..Config::default()
    }
}

#[derive(Default)]
struct MockState {
    // key -> (version id, is delete marker), oldest first
    versions: BTreeMap<String, Vec<(String, bool)>>,
    deleted: Vec<(String, String)>,
    uploaded: Vec<(String, PathBuf, ObjectMetadata)>,
    failing_version_ids: HashSet<String>,
    failing_upload_keys: HashSet<String>,
    head_bucket_error: Option<S3batchError>,
    head_object_calls: usize,
}

/// In-memory versioned bucket.
#[derive(Clone)]
pub(crate) struct MockStorage {
    state: Arc<Mutex<MockState>>,
    stats_sender: Sender<ReconcileStatistics>,
    stats_receiver: Receiver<ReconcileStatistics>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            stats_sender,
            stats_receiver,
        }
    }

    pub(crate) fn put_versions(&self, key: &str, version_ids: &[&str], marker_ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let entry = state.versions.entry(key.to_string()).or_default();
        entry.extend(version_ids.iter().map(|id| (id.to_string(), false)));
        entry.extend(marker_ids.iter().map(|id| (id.to_string(), true)));
    }

    pub(crate) fn fail_delete_of(&self, version_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_version_ids.insert(version_id.to_string());
    }

    pub(crate) fn fail_upload_of(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_upload_keys.insert(key.to_string());
    }

    pub(crate) fn fail_head_bucket(&self, error: S3batchError) {
        self.state.lock().unwrap().head_bucket_error = Some(error);
    }

    pub(crate) fn exists(&self, key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .versions
            .get(key)
            .is_some_and(|versions| versions.iter().any(|(_, is_marker)| !is_marker))
    }

    pub(crate) fn deleted(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub(crate) fn uploaded(&self) -> Vec<(String, PathBuf, ObjectMetadata)> {
        self.state.lock().unwrap().uploaded.clone()
    }

    pub(crate) fn head_object_calls(&self) -> usize {
        self.state.lock().unwrap().head_object_calls
    }

    pub(crate) fn stats_receiver(&self) -> Receiver<ReconcileStatistics> {
        self.stats_receiver.clone()
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn head_bucket(&self) -> Result<()> {
        match self.state.lock().unwrap().head_bucket_error.take() {
            Some(e) => Err(anyhow!(e)),
            None => Ok(()),
        }
    }

    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        self.state.lock().unwrap().head_object_calls += 1;
        if self.exists(key) {
            Ok(HeadObjectOutput::builder().build())
        } else {
            Err(anyhow!(S3batchError::ObjectNotFound(key.to_string())))
        }
    }

    async fn list_object_versions(&self, key: &str) -> Result<Vec<ObjectVersionRef>> {
        let state = self.state.lock().unwrap();
        let entries = state.versions.get(key).cloned().unwrap_or_default();
        let (versions, markers): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|(_, is_marker)| !is_marker);

        Ok(versions
            .into_iter()
            .chain(markers)
            .map(|(version_id, is_delete_marker)| ObjectVersionRef {
                key: key.to_string(),
                version_id,
                is_delete_marker,
            })
            .collect())
    }

    async fn delete_object(
        &self,
        key: &str,
        version_id: Option<String>,
    ) -> Result<DeleteObjectOutput> {
        let mut state = self.state.lock().unwrap();
        let version_id = version_id.unwrap_or_default();
        if state.failing_version_ids.contains(&version_id) {
            return Err(anyhow!("simulated DeleteObject failure"));
        }

        if let Some(versions) = state.versions.get_mut(key) {
            versions.retain(|(id, _)| *id != version_id);
            if versions.is_empty() {
                state.versions.remove(key);
            }
        }
        state.deleted.push((key.to_string(), version_id));

        Ok(DeleteObjectOutput::builder().build())
    }

    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<PutObjectOutput> {
        let mut state = self.state.lock().unwrap();
        if state.failing_upload_keys.contains(key) {
            return Err(anyhow!("simulated PutObject failure"));
        }

        state.uploaded.push((
            key.to_string(),
            local_path.to_path_buf(),
            metadata.clone(),
        ));
        let version_id = format!("uploaded-{}", state.uploaded.len());
        state
            .versions
            .entry(key.to_string())
            .or_default()
            .push((version_id, false));

        Ok(PutObjectOutput::builder().build())
    }

    async fn send_stats(&self, stats: ReconcileStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    fn set_warning(&self) {}
}
