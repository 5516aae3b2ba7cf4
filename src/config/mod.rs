pub mod args;
pub mod settings;

use std::path::PathBuf;

use crate::key_mapper::{DEFAULT_HOST_SUFFIXES, PublicEndpoints};
use crate::prober::{
    DEFAULT_PROBE_DELAY_MILLISECONDS, DEFAULT_PROBE_RETRIES, DEFAULT_PROBE_TIMEOUT_MILLISECONDS,
};
use crate::types::{ClientConfigLocation, Operation, S3Credentials};

/// Configuration of one batch run.
///
/// Built once from the command line and the settings file (see
/// [`args::build_config_from_args`]) and then only read.
///
/// # Quick Start
///
/// ```
/// use s3batch_rs::Config;
///
/// let config = Config::for_bucket("my-bucket", "ap-northeast-1");
/// assert_eq!(config.worker_size, 4);
/// assert_eq!(config.endpoints.origin(), "https://my-bucket.s3.ap-northeast-1.amazonaws.com");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub operation: Operation,
    pub endpoints: PublicEndpoints,
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub resource_dir: PathBuf,
    pub host_suffixes: Vec<String>,
    pub probe_config: ProbeConfig,
    pub worker_size: u16,
    pub rate_limit_objects: Option<u32>,
    pub warn_as_error: bool,
    pub show_no_progress: bool,
    pub client_config: ClientConfig,
    pub tracing_config: Option<TracingConfig>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// A `Config` for `bucket` in `region` with every other field at its default.
    pub fn for_bucket(bucket: &str, region: &str) -> Self {
        Config {
            endpoints: PublicEndpoints::new(bucket, region, None, ""),
            client_config: ClientConfig {
                region: Some(region.to_string()),
                ..ClientConfig::default()
            },
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            operation: Operation::Delete,
            endpoints: PublicEndpoints::default(),
            input_file: PathBuf::new(),
            output_file: PathBuf::new(),
            resource_dir: PathBuf::new(),
            host_suffixes: DEFAULT_HOST_SUFFIXES
                .iter()
                .map(|suffix| suffix.to_string())
                .collect(),
            probe_config: ProbeConfig::default(),
            worker_size: 4,
            rate_limit_objects: None,
            warn_as_error: false,
            show_no_progress: false,
            client_config: ClientConfig::default(),
            tracing_config: None,
            auto_complete_shell: None,
        }
    }
}

/// HTTP accessibility probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub retries: u32,
    pub delay_milliseconds: u64,
    pub timeout_milliseconds: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            retries: DEFAULT_PROBE_RETRIES,
            delay_milliseconds: DEFAULT_PROBE_DELAY_MILLISECONDS,
            timeout_milliseconds: DEFAULT_PROBE_TIMEOUT_MILLISECONDS,
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
}

/// Retry configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            aws_max_attempts: 10,
            initial_backoff_milliseconds: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
