use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use aws_sdk_s3::types::ObjectCannedAcl;
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Which batch flow a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Operation {
    /// Delete every object (all versions and delete markers) named by a list of public URLs.
    Delete,
    /// Upload local resources named by a list of storage keys.
    Upload,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Delete => write!(f, "delete"),
            Operation::Upload => write!(f, "upload"),
        }
    }
}

/// One line of an input list, stamped with its zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub line: String,
}

impl WorkItem {
    pub fn new(index: usize, line: impl Into<String>) -> Self {
        Self {
            index,
            line: line.into(),
        }
    }

    /// Build work items from raw list text. Lines are trimmed and blank lines skipped;
    /// indices count only the retained lines.
    pub fn from_lines(text: &str) -> Vec<WorkItem> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| WorkItem::new(index, line))
            .collect()
    }
}

/// Storage key derived from a source URL, together with the rewritten
/// bucket-native URL it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedKey {
    pub key: String,
    pub url: String,
}

/// Per-item result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeRecord {
    Success {
        name: String,
        path: String,
    },
    Failure {
        name: String,
        path: String,
        reason: String,
    },
}

impl OutcomeRecord {
    pub fn success(name: impl Into<String>, path: impl Into<String>) -> Self {
        OutcomeRecord::Success {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn failure(
        name: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        OutcomeRecord::Failure {
            name: name.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OutcomeRecord::Success { name, .. } | OutcomeRecord::Failure { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            OutcomeRecord::Success { path, .. } | OutcomeRecord::Failure { path, .. } => path,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            OutcomeRecord::Success { .. } => None,
            OutcomeRecord::Failure { reason, .. } => Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeRecord::Success { .. })
    }
}

/// The two disjoint, input-ordered outcome lists of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success: Vec<OutcomeRecord>,
    pub failure: Vec<OutcomeRecord>,
}

impl BatchOutcome {
    /// Split records (already in input order) into the success and failure lists.
    pub fn from_records(records: impl IntoIterator<Item = OutcomeRecord>) -> Self {
        let (success, failure) = records.into_iter().partition(OutcomeRecord::is_success);
        Self { success, failure }
    }

    pub fn total(&self) -> usize {
        self.success.len() + self.failure.len()
    }

    pub fn has_failure(&self) -> bool {
        !self.failure.is_empty()
    }
}

/// What a worker has to do for one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemTask {
    /// Probe the public URL, then erase the key.
    Delete(MappedKey),
    /// Resolve the local resource for the key, upload it, then probe its access URL.
    Upload(String),
}

/// An [`ItemTask`] stamped with the input index it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    pub task: ItemTask,
}

/// A worker result stamped with the input index it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedOutcome {
    pub index: usize,
    pub outcome: OutcomeRecord,
}

/// Object metadata attached on upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub acl: ObjectCannedAcl,
}

impl ObjectMetadata {
    pub fn public_read(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            acl: ObjectCannedAcl::PublicRead,
        }
    }
}

/// A confirmed local resource ready to be uploaded under `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadItem {
    pub key: String,
    pub local_path: PathBuf,
    pub metadata: ObjectMetadata,
}

impl UploadItem {
    /// Final path segment of the key, used as the report name.
    pub fn file_name(&self) -> String {
        file_name_of(&self.key)
    }
}

/// Final path segment of a key or path, or the input itself when it has none.
pub fn file_name_of(key: &str) -> String {
    Path::new(key)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| key.to_string())
}

/// A single version (or delete marker) of an object in a versioned bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersionRef {
    pub key: String,
    pub version_id: String,
    pub is_delete_marker: bool,
}

/// Statistics sent through the stats channel while a batch runs.
#[derive(Debug, PartialEq)]
pub enum ReconcileStatistics {
    ItemSuccess { key: String },
    ItemFailure { key: String },
    VersionDeleted { key: String, version_id: String },
    UploadBytes(u64),
}

/// AWS configuration file locations.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// Where the storage client takes its credentials from.
#[derive(Debug, Clone, Default)]
pub enum S3Credentials {
    Profile(String),
    Credentials {
        access_keys: AccessKeys,
    },
    #[default]
    FromEnvironment,
}

/// AWS access key pair. Secrets are cleared from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
