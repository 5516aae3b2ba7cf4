use std::time::Duration;

use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::retry::RetryConfig;
use aws_config::stalled_stream_protection::StalledStreamProtectionConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, ConfigLoader, SdkConfig};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Builder, Credentials, Region};

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3batch";

impl ClientConfig {
    /// Build an S3 client. No request is sent; credentials are resolved lazily.
    pub async fn create_client(&self) -> Client {
        let mut config_builder =
            Builder::from(&self.load_sdk_config().await).force_path_style(self.force_path_style);

        if let Some(timeout_config) = self.build_timeout_config() {
            config_builder = config_builder.timeout_config(timeout_config);
        }

        Client::from_conf(config_builder.build())
    }

    async fn load_sdk_config(&self) -> SdkConfig {
        let stalled_stream_protection = if self.disable_stalled_stream_protection {
            StalledStreamProtectionConfig::disabled()
        } else {
            StalledStreamProtectionConfig::enabled().build()
        };

        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .stalled_stream_protection(stalled_stream_protection);

        let mut config_loader = self
            .load_config_credential(config_loader)
            .region(self.build_region_provider())
            .retry_config(self.build_retry_config());

        if let Some(endpoint_url) = &self.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint_url);
        }

        config_loader.load().await
    }

    fn load_config_credential(&self, mut config_loader: ConfigLoader) -> ConfigLoader {
        match &self.credential {
            S3Credentials::Credentials { access_keys } => {
                let credentials = Credentials::new(
                    access_keys.access_key.to_string(),
                    access_keys.secret_access_key.to_string(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                );
                config_loader = config_loader.credentials_provider(credentials);
            }
            S3Credentials::Profile(profile_name) => {
                let mut builder = aws_config::profile::ProfileFileCredentialsProvider::builder();

                if let Some(profile_files) = self.build_profile_files() {
                    builder = builder.profile_files(profile_files);
                }

                config_loader =
                    config_loader.credentials_provider(builder.profile_name(profile_name).build());
            }
            S3Credentials::FromEnvironment => {}
        }
        config_loader
    }

    fn build_profile_files(&self) -> Option<ProfileFiles> {
        let location = &self.client_config_location;
        if location.aws_config_file.is_none() && location.aws_shared_credentials_file.is_none() {
            return None;
        }

        let mut builder = ProfileFiles::builder();
        match &location.aws_config_file {
            Some(aws_config_file) => {
                builder = builder.with_file(ProfileFileKind::Config, aws_config_file);
            }
            None => builder = builder.include_default_config_file(true),
        }
        match &location.aws_shared_credentials_file {
            Some(aws_shared_credentials_file) => {
                builder = builder.with_file(ProfileFileKind::Credentials, aws_shared_credentials_file);
            }
            None => builder = builder.include_default_credentials_file(true),
        }
        Some(builder.build())
    }

    fn build_region_provider(&self) -> Box<dyn ProvideRegion> {
        let mut builder = aws_config::profile::ProfileFileRegionProvider::builder();

        if let S3Credentials::Profile(profile_name) = &self.credential {
            if let Some(profile_files) = self.build_profile_files() {
                builder = builder.profile_files(profile_files);
            }
            builder = builder.profile_name(profile_name);
        }

        let provider_region = if matches!(&self.credential, S3Credentials::FromEnvironment) {
            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_default_provider()
        } else {
            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_else(builder.build())
        };

        Box::new(provider_region)
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> Option<TimeoutConfig> {
        let timeout_config = &self.cli_timeout_config;
        if timeout_config.operation_timeout_milliseconds.is_none()
            && timeout_config.operation_attempt_timeout_milliseconds.is_none()
            && timeout_config.connect_timeout_milliseconds.is_none()
            && timeout_config.read_timeout_milliseconds.is_none()
        {
            return None;
        }

        let mut builder = TimeoutConfig::builder();
        builder.set_operation_timeout(
            timeout_config
                .operation_timeout_milliseconds
                .map(Duration::from_millis),
        );
        builder.set_operation_attempt_timeout(
            timeout_config
                .operation_attempt_timeout_milliseconds
                .map(Duration::from_millis),
        );
        builder.set_connect_timeout(
            timeout_config
                .connect_timeout_milliseconds
                .map(Duration::from_millis),
        );
        builder.set_read_timeout(
            timeout_config
                .read_timeout_milliseconds
                .map(Duration::from_millis),
        );

        Some(builder.build())
    }
}
