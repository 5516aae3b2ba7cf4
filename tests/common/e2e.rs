//! Helpers for tests against a real bucket. Every helper uses the
//! `s3batch-e2e-test` AWS profile.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration,
    VersioningConfiguration,
};
use s3batch_rs::config::Config;
use s3batch_rs::storage::{Storage, create_storage};
use s3batch_rs::types::S3Credentials;
use s3batch_rs::{Operation, create_batch_cancellation_token};

pub const AWS_PROFILE: &str = "s3batch-e2e-test";
const DEFAULT_REGION: &str = "us-east-1";

pub const E2E_TIMEOUT: Duration = Duration::from_secs(300);

/// Deletes every version and the bucket itself when dropped, even after a panic.
pub struct BucketGuard {
    helper: Arc<TestHelper>,
    bucket: String,
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        let helper = self.helper.clone();
        let bucket = self.bucket.clone();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async move {
                    helper.delete_bucket_cascade(&bucket).await;
                });
            });
        }));
    }
}

pub struct TestHelper {
    client: Client,
    region: String,
}

impl TestHelper {
    pub async fn new() -> Arc<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(AWS_PROFILE)
            .load()
            .await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Arc::new(Self {
            client: Client::new(&sdk_config),
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn generate_bucket_name(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("s3batch-e2e-{}-{nanos}", std::process::id())
    }

    pub fn bucket_guard(self: &Arc<Self>, bucket: &str) -> BucketGuard {
        BucketGuard {
            helper: Arc::clone(self),
            bucket: bucket.to_string(),
        }
    }

    pub async fn create_versioned_bucket(&self, bucket: &str) {
        let mut builder = self.client.create_bucket().bucket(bucket);

        // us-east-1 must not specify a location constraint
        if self.region != DEFAULT_REGION {
            let constraint = BucketLocationConstraint::from(self.region.as_str());
            builder = builder.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }
        builder
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to create bucket {bucket}: {e}"));

        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to enable versioning on {bucket}: {e}"));
    }

    pub async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to put {key}: {e}"));
    }

    /// Versions and delete markers whose key is exactly `key`.
    pub async fn count_versions(&self, bucket: &str, key: &str) -> usize {
        let output = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .prefix(key)
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to list versions of {key}: {e}"));

        let versions = output
            .versions()
            .iter()
            .filter(|version| version.key() == Some(key))
            .count();
        let markers = output
            .delete_markers()
            .iter()
            .filter(|marker| marker.key() == Some(key))
            .count();
        versions + markers
    }

    /// A config that reaches `bucket` through the e2e profile.
    pub fn config(&self, operation: Operation, bucket: &str) -> Config {
        let mut config = Config::for_bucket(bucket, &self.region);
        config.operation = operation;
        config.client_config.credential = S3Credentials::Profile(AWS_PROFILE.to_string());
        config
    }

    pub async fn storage(&self, config: &Config) -> Storage {
        let (stats_sender, _) = async_channel::unbounded();
        create_storage(
            config.clone(),
            create_batch_cancellation_token(),
            stats_sender,
            Arc::new(AtomicBool::new(false)),
        )
        .await
    }

    pub async fn delete_bucket_cascade(&self, bucket: &str) {
        if let Ok(output) = self.client.list_object_versions().bucket(bucket).send().await {
            let versions = output
                .versions()
                .iter()
                .filter_map(|version| Some((version.key()?, version.version_id()?)));
            let markers = output
                .delete_markers()
                .iter()
                .filter_map(|marker| Some((marker.key()?, marker.version_id()?)));

            for (key, version_id) in versions.chain(markers) {
                let _ = self
                    .client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .version_id(version_id)
                    .send()
                    .await;
            }
        }

        let _ = self.client.delete_bucket().bucket(bucket).send().await;
    }
}

#[macro_export]
macro_rules! e2e_timeout {
    ($body:expr) => {
        tokio::time::timeout(common::e2e::E2E_TIMEOUT, $body)
            .await
            .expect("E2E test timed out")
    };
}
