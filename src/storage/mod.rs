use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;

use crate::config::{ClientConfig, Config};
use crate::types::token::BatchCancellationToken;
use crate::types::{ObjectMetadata, ObjectVersionRef, ReconcileStatistics};

pub mod s3;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

#[async_trait]
pub trait StorageFactory {
    #[allow(clippy::too_many_arguments)]
    async fn create(
        config: Config,
        bucket: String,
        cancellation_token: BatchCancellationToken,
        stats_sender: Sender<ReconcileStatistics>,
        client_config: ClientConfig,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
        has_warning: Arc<AtomicBool>,
    ) -> Storage;
}

/// Object store operations consumed by the eraser, the uploader and the
/// pre-run connectivity check.
///
/// Keys are full object keys within the configured bucket.
#[async_trait]
pub trait StorageTrait: DynClone {
    fn bucket(&self) -> &str;

    /// Verify the bucket is reachable with the configured credentials.
    ///
    /// Fails with `S3batchError::Auth` when the credentials are rejected and
    /// `S3batchError::Connectivity` otherwise.
    async fn head_bucket(&self) -> Result<()>;

    /// Fails with `S3batchError::ObjectNotFound` when the key does not exist.
    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput>;

    /// Every version and delete marker whose key is exactly `key`.
    /// Versions come before delete markers.
    async fn list_object_versions(&self, key: &str) -> Result<Vec<ObjectVersionRef>>;

    async fn delete_object(
        &self,
        key: &str,
        version_id: Option<String>,
    ) -> Result<DeleteObjectOutput>;

    /// Stream a local file to `key` with the given metadata.
    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<PutObjectOutput>;

    async fn send_stats(&self, stats: ReconcileStatistics);

    fn set_warning(&self);
}

dyn_clone::clone_trait_object!(StorageTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

/// Create the S3 storage for the configured bucket.
pub async fn create_storage(
    config: Config,
    cancellation_token: BatchCancellationToken,
    stats_sender: Sender<ReconcileStatistics>,
    has_warning: Arc<AtomicBool>,
) -> Storage {
    let rate_limit_objects_per_sec = config.rate_limit_objects.map(build_rate_limiter);

    let client_config = config.client_config.clone();
    let bucket = config.endpoints.bucket.clone();

    s3::S3StorageFactory::create(
        config,
        bucket,
        cancellation_token,
        stats_sender,
        client_config,
        rate_limit_objects_per_sec,
        has_warning,
    )
    .await
}

fn build_rate_limiter(rate_limit_value: u32) -> Arc<RateLimiter> {
    let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
        1
    } else {
        rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
    };
    Arc::new(
        RateLimiter::builder()
            .max(rate_limit_value as usize)
            .initial(rate_limit_value as usize)
            .refill(refill)
            .fair(true)
            .build(),
    )
}
