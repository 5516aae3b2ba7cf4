use tracing::{info, warn};

use crate::storage::Storage;
use crate::types::{OutcomeRecord, ReconcileStatistics, UploadItem};

pub const NO_PATH: &str = "-";

#[derive(Clone)]
pub struct ObjectUploader {
    target: Storage,
}

impl ObjectUploader {
    pub fn new(target: Storage) -> Self {
        Self { target }
    }

    /// Upload one resolved item.
    ///
    /// Success carries the key as its path. Any storage or file error becomes
    /// a failure whose reason holds the error text; the object is not read
    /// back afterwards.
    pub async fn upload(&self, item: &UploadItem) -> OutcomeRecord {
        let file_name = item.file_name();

        match self
            .target
            .put_object(&item.key, &item.local_path, &item.metadata)
            .await
        {
            Ok(_) => {
                info!(
                    key = item.key,
                    content_type = item.metadata.content_type,
                    "object uploaded."
                );

                if let Ok(metadata) = tokio::fs::metadata(&item.local_path).await {
                    self.target
                        .send_stats(ReconcileStatistics::UploadBytes(metadata.len()))
                        .await;
                }

                OutcomeRecord::success(file_name, item.key.clone())
            }
            Err(e) => {
                warn!(key = item.key, "upload failed: {e:#}");
                OutcomeRecord::failure(file_name, NO_PATH, format!("upload failed: {e:#}"))
            }
        }
    }
}
