use crate::config::settings::{SelectedEnvironment, Settings};
use crate::config::{
    CLITimeoutConfig, ClientConfig, Config, ProbeConfig, RetryConfig, TracingConfig,
};
use crate::key_mapper::DEFAULT_HOST_SUFFIXES;
use crate::prober::{
    DEFAULT_PROBE_DELAY_MILLISECONDS, DEFAULT_PROBE_RETRIES, DEFAULT_PROBE_TIMEOUT_MILLISECONDS,
};
use crate::types::{ClientConfigLocation, Operation, S3Credentials};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod value_parser;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

pub const DEFAULT_SETTINGS_FILE: &str = "config.yaml";

const DEFAULT_WORKER_SIZE: u16 = 4;
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_WARN_AS_ERROR: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_PROBE_RETRIES_ZERO: &str = "Probe retries must be at least 1.";
const ERROR_MESSAGE_RATE_LIMIT_OBJECTS_ZERO: &str = "Rate limit objects must be at least 1.";
const ERROR_MESSAGE_HOST_SUFFIX_EMPTY: &str = "Source host suffix must not be empty.";
const ERROR_MESSAGE_INPUT_FILE_NOT_SET: &str =
    "Input file is not set. Use --input-file or files.inputs in the settings file.";
const ERROR_MESSAGE_OUTPUT_FILE_NOT_SET: &str =
    "Output file is not set. Use --output-file or files.outputs in the settings file.";
const ERROR_MESSAGE_OPERATION_NOT_SET: &str = "Operation (delete or upload) is required.";
const ERROR_MESSAGE_RESOURCE_DIR_NOT_SET: &str =
    "Resource directory is not set. Use --resource-dir or files.inputs.resource in the settings file.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// s3batch - Batch delete and upload of publicly served Amazon S3 objects.
///
/// Deletes every version of the objects behind a list of public URLs, or
/// uploads a list of local resources, and verifies each public URL over HTTP.
///
/// Example:
///   s3batch delete --environment staging
///   s3batch upload --settings-file config.yaml --worker-size 8 -v
#[derive(Parser, Clone, Debug)]
#[command(name = "s3batch", version, about, long_about = None)]
pub struct CLIArgs {
    /// Batch operation.
    #[arg(value_enum, required_unless_present = "auto_complete_shell")]
    pub operation: Option<Operation>,

    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// Settings file (YAML). Default: config.yaml.
    #[arg(long, env, value_parser = value_parser::file_exist::is_file_exist, help_heading = "General")]
    pub settings_file: Option<String>,

    /// Environment to run against. Overrides `environment` in the settings file.
    #[arg(long, env = "S3BATCH_ENVIRONMENT", value_parser = NonEmptyStringValueParser::new(), help_heading = "General")]
    pub environment: Option<String>,

    /// Input list. Overrides files.inputs in the settings file.
    #[arg(long, env, help_heading = "General")]
    pub input_file: Option<PathBuf>,

    /// Result report. Overrides files.outputs in the settings file.
    #[arg(long, env, help_heading = "General")]
    pub output_file: Option<PathBuf>,

    /// Local resource directory for uploads. Overrides files.inputs.resource.
    #[arg(long, env, help_heading = "General")]
    pub resource_dir: Option<PathBuf>,

    /// Don't show the progress bar.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    // -----------------------------------------------------------------------
    // Probe options
    // -----------------------------------------------------------------------
    /// Attempts per HTTP accessibility check. Default: 2.
    #[arg(long, env, default_value_t = DEFAULT_PROBE_RETRIES, help_heading = "Probe")]
    pub probe_retries: u32,

    /// Delay in ms between HTTP accessibility attempts. Default: 1500.
    #[arg(long, env, default_value_t = DEFAULT_PROBE_DELAY_MILLISECONDS, help_heading = "Probe")]
    pub probe_delay_milliseconds: u64,

    /// Timeout in ms of one HTTP accessibility attempt. Default: 10000.
    #[arg(long, env, default_value_t = DEFAULT_PROBE_TIMEOUT_MILLISECONDS, help_heading = "Probe")]
    pub probe_timeout_milliseconds: u64,

    /// Host suffix whose `scheme://host` prefix is rewritten to the bucket origin.
    #[arg(
        long = "source-host-suffix",
        env = "SOURCE_HOST_SUFFIX",
        value_delimiter = ',',
        default_values = DEFAULT_HOST_SUFFIXES,
        help_heading = "Probe",
        long_help = r#"Host suffix whose `scheme://host` prefix is rewritten to the bucket origin
before a source URL is mapped to a key. Repeatable. Default: .com, .net"#
    )]
    pub source_host_suffixes: Vec<String>,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent item workers. Default: 4.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Maximum storage operations per second across all workers.
    #[arg(long, env, help_heading = "Performance")]
    pub rate_limit_objects: Option<u32>,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Maximum retry attempts for AWS SDK operations. Default: 10.
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for retries. Default: 100.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Overall operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Per-attempt operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Read timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // AWS configuration
    // -----------------------------------------------------------------------
    /// AWS config file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// AWS profile. Takes precedence over keys in the settings file.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub aws_profile: Option<String>,

    /// Custom S3-compatible endpoint URL (e.g. MinIO).
    #[arg(long, env, value_parser = value_parser::url::check_scheme, help_heading = "AWS")]
    pub endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub force_path_style: bool,

    /// Disable stalled stream protection.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "AWS")]
    pub disable_stalled_stream_protection: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Exit with code 3 when any item fails.
    #[arg(long, env, default_value_t = DEFAULT_WARN_AS_ERROR, help_heading = "Advanced")]
    pub warn_as_error: bool,

    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3batch_rs::config::args::parse_from_args;
/// use s3batch_rs::types::Operation;
///
/// let args = vec!["s3batch", "upload", "--worker-size", "8"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.operation, Some(Operation::Upload));
/// assert_eq!(cli_args.worker_size, 8);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.probe_retries == 0 {
            return Err(ERROR_MESSAGE_PROBE_RETRIES_ZERO.to_string());
        }
        if self.rate_limit_objects == Some(0) {
            return Err(ERROR_MESSAGE_RATE_LIMIT_OBJECTS_ZERO.to_string());
        }
        if self.source_host_suffixes.iter().any(|suffix| suffix.is_empty()) {
            return Err(ERROR_MESSAGE_HOST_SUFFIX_EMPTY.to_string());
        }
        Ok(())
    }

    // --aws-profile, then static keys from the settings file, then the
    // default credential chain.
    fn build_client_config(&self, environment: &SelectedEnvironment) -> ClientConfig {
        let credential = if let Some(ref profile) = self.aws_profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(access_keys) = environment.aws.access_keys() {
            S3Credentials::Credentials { access_keys }
        } else {
            S3Credentials::FromEnvironment
        };

        ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: Some(environment.endpoints.region.clone()),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
        }
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    fn load_settings(&self) -> Result<Settings, String> {
        let settings_file = self
            .settings_file
            .as_deref()
            .unwrap_or(DEFAULT_SETTINGS_FILE);
        Settings::load(Path::new(settings_file)).map_err(|e| e.to_string())
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let tracing_config = args.build_tracing_config();

        // Completion generation needs neither settings nor credentials.
        if args.auto_complete_shell.is_some() {
            return Ok(Config {
                auto_complete_shell: args.auto_complete_shell,
                tracing_config,
                ..Config::default()
            });
        }

        let operation = args
            .operation
            .ok_or_else(|| ERROR_MESSAGE_OPERATION_NOT_SET.to_string())?;

        let settings = args.load_settings()?;
        let environment = settings
            .select_environment(args.environment.as_deref())
            .map_err(|e| e.to_string())?;

        let input_file = args
            .input_file
            .clone()
            .or_else(|| settings.files.input_file(operation).cloned())
            .ok_or_else(|| ERROR_MESSAGE_INPUT_FILE_NOT_SET.to_string())?;
        let output_file = args
            .output_file
            .clone()
            .or_else(|| settings.files.output_file(operation).cloned())
            .ok_or_else(|| ERROR_MESSAGE_OUTPUT_FILE_NOT_SET.to_string())?;

        let resource_dir = args
            .resource_dir
            .clone()
            .or_else(|| settings.files.inputs.resource.clone());
        let resource_dir = match (operation, resource_dir) {
            (_, Some(resource_dir)) => resource_dir,
            (Operation::Delete, None) => PathBuf::new(),
            (Operation::Upload, None) => {
                return Err(ERROR_MESSAGE_RESOURCE_DIR_NOT_SET.to_string());
            }
        };

        let client_config = args.build_client_config(&environment);

        Ok(Config {
            operation,
            endpoints: environment.endpoints,
            input_file,
            output_file,
            resource_dir,
            host_suffixes: args.source_host_suffixes,
            probe_config: ProbeConfig {
                retries: args.probe_retries,
                delay_milliseconds: args.probe_delay_milliseconds,
                timeout_milliseconds: args.probe_timeout_milliseconds,
            },
            worker_size: args.worker_size,
            rate_limit_objects: args.rate_limit_objects,
            warn_as_error: args.warn_as_error,
            show_no_progress: args.show_no_progress,
            client_config,
            tracing_config,
            auto_complete_shell: None,
        })
    }
}
