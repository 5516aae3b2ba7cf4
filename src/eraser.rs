use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::storage::Storage;
use crate::types::ReconcileStatistics;

/// What an erase removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EraseReport {
    pub deleted_versions: usize,
    pub deleted_delete_markers: usize,
}

/// Permanently removes an object: every version and every delete marker.
#[derive(Clone)]
pub struct ObjectEraser {
    target: Storage,
}

impl ObjectEraser {
    pub fn new(target: Storage) -> Self {
        Self { target }
    }

    /// Erase `key`.
    ///
    /// Fails with `S3batchError::ObjectNotFound` when the key has no current
    /// object, so erasing an already erased key fails the same way every time.
    /// Deletions are not rolled back: if one fails, versions deleted before it
    /// stay deleted and the error propagates.
    pub async fn erase(&self, key: &str) -> Result<EraseReport> {
        self.target.head_object(key).await?;

        let versions = self
            .target
            .list_object_versions(key)
            .await
            .with_context(|| format!("failed to list versions of {key}."))?;

        let mut report = EraseReport::default();
        for version in versions {
            self.target
                .delete_object(key, Some(version.version_id.clone()))
                .await
                .with_context(|| {
                    format!("failed to delete version {} of {key}.", version.version_id)
                })?;

            debug!(
                key = key,
                version_id = version.version_id,
                is_delete_marker = version.is_delete_marker,
                "version deleted."
            );

            if version.is_delete_marker {
                report.deleted_delete_markers += 1;
            } else {
                report.deleted_versions += 1;
            }

            self.target
                .send_stats(ReconcileStatistics::VersionDeleted {
                    key: key.to_string(),
                    version_id: version.version_id,
                })
                .await;
        }

        info!(
            key = key,
            deleted_versions = report.deleted_versions,
            deleted_delete_markers = report.deleted_delete_markers,
            "object erased."
        );

        Ok(report)
    }
}
