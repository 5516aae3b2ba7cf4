pub mod client_builder;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use leaky_bucket::RateLimiter;

use crate::config::{ClientConfig, Config};
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::error::S3batchError;
use crate::types::token::BatchCancellationToken;
use crate::types::{ObjectMetadata, ObjectVersionRef, ReconcileStatistics};

const AUTH_ERROR_CODES: [&str; 5] = [
    "AccessDenied",
    "Forbidden",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// Service errors yield the S3 error code (e.g. "AccessDenied") and message.
/// Other errors (network, timeout, construction failure) yield "N/A" and the
/// full error description.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

/// HTTP status of the raw response, if one was received.
fn response_status<E>(e: &SdkError<E>) -> Option<u16> {
    e.raw_response().map(|response| response.status().as_u16())
}

/// Whether a failed bucket check means the credentials were rejected.
fn is_auth_failure(status: Option<u16>, s3_error_code: &str) -> bool {
    matches!(status, Some(401) | Some(403)) || AUTH_ERROR_CODES.contains(&s3_error_code)
}

pub struct S3StorageFactory;

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(
        config: Config,
        bucket: String,
        cancellation_token: BatchCancellationToken,
        stats_sender: Sender<ReconcileStatistics>,
        client_config: ClientConfig,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
        has_warning: Arc<AtomicBool>,
    ) -> Storage {
        let client = Arc::new(client_config.create_client().await);

        Box::new(S3Storage {
            config,
            bucket,
            cancellation_token,
            client,
            stats_sender,
            rate_limit_objects_per_sec,
            has_warning,
        })
    }
}

#[derive(Clone)]
struct S3Storage {
    config: Config,
    bucket: String,
    cancellation_token: BatchCancellationToken,
    client: Arc<Client>,
    stats_sender: Sender<ReconcileStatistics>,
    rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    has_warning: Arc<AtomicBool>,
}

#[async_trait]
impl StorageTrait for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head_bucket(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                let status = response_status(&e);
                tracing::error!(
                    bucket = self.bucket,
                    region = self.config.endpoints.region,
                    status = status,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 HeadBucket API call failed for bucket '{}': {} ({}).",
                    self.bucket,
                    s3_error_code,
                    s3_error_message,
                );

                let error = if is_auth_failure(status, &s3_error_code) {
                    S3batchError::Auth(format!("{}: {s3_error_code}", self.bucket))
                } else {
                    S3batchError::Connectivity(format!("{}: {e}", self.bucket))
                };
                anyhow!(error).context("aws_sdk_s3::client::head_bucket() failed.")
            })?;

        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_not_found())
                {
                    tracing::debug!(bucket = self.bucket, key = key, "object not found.");
                    return anyhow!(S3batchError::ObjectNotFound(key.to_string()));
                }

                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = self.bucket,
                    key = key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 HeadObject API call failed for s3://{}/{}: {} ({}).",
                    self.bucket,
                    key,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context("aws_sdk_s3::client::head_object() failed.")
            })
    }

    async fn list_object_versions(&self, key: &str) -> Result<Vec<ObjectVersionRef>> {
        let mut versions = Vec::new();
        let mut delete_markers = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            if self.cancellation_token.is_cancelled() {
                tracing::info!(key = key, "version listing cancelled.");
                return Err(anyhow!(S3batchError::Cancelled));
            }

            self.exec_rate_limit_objects_per_sec().await;

            let output = self
                .client
                .list_object_versions()
                .bucket(&self.bucket)
                .prefix(key)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_id_marker.clone())
                .send()
                .await
                .map_err(|e| {
                    let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                    tracing::error!(
                        bucket = self.bucket,
                        key = key,
                        s3_error_code = s3_error_code,
                        s3_error_message = s3_error_message,
                        "S3 ListObjectVersions API call failed for s3://{}/{}: {} ({}).",
                        self.bucket,
                        key,
                        s3_error_code,
                        s3_error_message,
                    );
                    anyhow!(e).context("aws_sdk_s3::client::list_object_versions() failed.")
                })?;

            collect_exact_versions(&output, key, &mut versions, &mut delete_markers);

            if output.is_truncated() == Some(true) {
                key_marker = output.next_key_marker().map(String::from);
                version_id_marker = output.next_version_id_marker().map(String::from);
            } else {
                break;
            }
        }

        versions.append(&mut delete_markers);
        Ok(versions)
    }

    async fn delete_object(
        &self,
        key: &str,
        version_id: Option<String>,
    ) -> Result<DeleteObjectOutput> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .set_version_id(version_id.clone())
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = self.bucket,
                    key = key,
                    version_id = version_id,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 DeleteObject API call failed for s3://{}/{}: {} ({}).",
                    self.bucket,
                    key,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context("aws_sdk_s3::client::delete_object() failed.")
            })
    }

    async fn put_object(
        &self,
        key: &str,
        local_path: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<PutObjectOutput> {
        self.exec_rate_limit_objects_per_sec().await;

        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("failed to open {}.", local_path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(&metadata.content_type)
            .acl(metadata.acl.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = self.bucket,
                    key = key,
                    local_path = %local_path.display(),
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 PutObject API call failed for s3://{}/{}: {} ({}).",
                    self.bucket,
                    key,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context("aws_sdk_s3::client::put_object() failed.")
            })
    }

    async fn send_stats(&self, stats: ReconcileStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }
}

impl S3Storage {
    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire_one().await;
        }
    }
}

/// Keep only entries for exactly `key`; a prefix listing also returns longer keys.
fn collect_exact_versions(
    output: &ListObjectVersionsOutput,
    key: &str,
    versions: &mut Vec<ObjectVersionRef>,
    delete_markers: &mut Vec<ObjectVersionRef>,
) {
    for version in output.versions() {
        if let (Some(version_key), Some(version_id)) = (version.key(), version.version_id()) {
            if version_key == key {
                versions.push(ObjectVersionRef {
                    key: version_key.to_string(),
                    version_id: version_id.to_string(),
                    is_delete_marker: false,
                });
            }
        }
    }

    for marker in output.delete_markers() {
        if let (Some(marker_key), Some(version_id)) = (marker.key(), marker.version_id()) {
            if marker_key == key {
                delete_markers.push(ObjectVersionRef {
                    key: marker_key.to_string(),
                    version_id: version_id.to_string(),
                    is_delete_marker: true,
                });
            }
        }
    }
}
