use super::*;
use crate::config::Config;
use tempfile::TempDir;

fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

const SETTINGS: &str = r#"
environment: staging
environments:
  staging:
    aws:
      access_key_id: AKIAEXAMPLE
      secret_access_key: secret-value
      region: ap-northeast-1
      bucket_name: staging-bucket
  production:
    aws:
      region: us-east-1
      bucket_name: production-bucket
    cloudfront:
      domain: cdn.example.com
files:
  inputs:
    delete_url_list: data/delete_url_list.txt
    upload_file_list: data/upload_file_list.txt
    resource: data/resource
  outputs:
    delete_results: data/delete_results.txt
    upload_results: data/upload_results.txt
"#;

fn write_settings(content: &str) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, content).unwrap();
    let path = path.to_string_lossy().to_string();
    (dir, path)
}

fn build_config(extra: &[&str], settings: &str) -> Result<Config, String> {
    let (_dir, path) = write_settings(settings);
    let mut args = vec!["s3batch".to_string()];
    args.extend(extra.iter().map(|arg| arg.to_string()));
    args.push("--settings-file".to_string());
    args.push(path);
    build_config_from_args(args)
}

// ---------------------------------------------------------------------------
// Basic parsing tests
// ---------------------------------------------------------------------------

#[test]
fn parse_minimal_args() {
    init_dummy_tracing_subscriber();

    let cli = parse_from_args(vec!["s3batch", "delete"]).unwrap();
    assert_eq!(cli.operation, Some(Operation::Delete));
    assert_eq!(cli.worker_size, 4);
    assert_eq!(cli.probe_retries, 2);
    assert_eq!(cli.probe_delay_milliseconds, 1500);
    assert_eq!(cli.probe_timeout_milliseconds, 10_000);
    assert_eq!(cli.source_host_suffixes, vec![".com", ".net"]);
    assert!(cli.settings_file.is_none());
    assert!(!cli.warn_as_error);
}

#[test]
fn parse_upload_operation() {
    let cli = parse_from_args(vec!["s3batch", "upload"]).unwrap();
    assert_eq!(cli.operation, Some(Operation::Upload));
}

#[test]
fn missing_operation_is_an_error() {
    assert!(parse_from_args(vec!["s3batch"]).is_err());
}

#[test]
fn unknown_operation_is_an_error() {
    assert!(parse_from_args(vec!["s3batch", "move"]).is_err());
}

#[test]
fn parse_repeated_host_suffixes() {
    let cli = parse_from_args(vec![
        "s3batch",
        "delete",
        "--source-host-suffix",
        ".jp",
        "--source-host-suffix",
        ".co.uk,.org",
    ])
    .unwrap();
    assert_eq!(cli.source_host_suffixes, vec![".jp", ".co.uk", ".org"]);
}

#[test]
fn parse_probe_and_performance_options() {
    let cli = parse_from_args(vec![
        "s3batch",
        "upload",
        "--probe-retries",
        "5",
        "--probe-delay-milliseconds",
        "10",
        "--probe-timeout-milliseconds",
        "2000",
        "--worker-size",
        "16",
        "--rate-limit-objects",
        "100",
    ])
    .unwrap();
    assert_eq!(cli.probe_retries, 5);
    assert_eq!(cli.probe_delay_milliseconds, 10);
    assert_eq!(cli.probe_timeout_milliseconds, 2000);
    assert_eq!(cli.worker_size, 16);
    assert_eq!(cli.rate_limit_objects, Some(100));
}

#[test]
fn settings_file_must_exist() {
    let result = parse_from_args(vec![
        "s3batch",
        "delete",
        "--settings-file",
        "/nonexistent/config.yaml",
    ]);
    assert!(result.is_err());
}

#[test]
fn endpoint_url_scheme_is_checked() {
    assert!(
        parse_from_args(vec![
            "s3batch",
            "delete",
            "--endpoint-url",
            "ftp://localhost:9000"
        ])
        .is_err()
    );
    let cli = parse_from_args(vec![
        "s3batch",
        "delete",
        "--endpoint-url",
        "http://localhost:9000",
    ])
    .unwrap();
    assert_eq!(cli.endpoint_url.as_deref(), Some("http://localhost:9000"));
}

#[test]
fn auto_complete_shell_needs_no_operation() {
    let cli = parse_from_args(vec!["s3batch", "--auto-complete-shell", "bash"]).unwrap();
    assert!(cli.operation.is_none());
    let config = Config::try_from(cli).unwrap();
    assert!(config.auto_complete_shell.is_some());
}

#[test]
fn command_definition_is_consistent() {
    use clap::CommandFactory;

    CLIArgs::command().debug_assert();
}

#[test]
fn operation_is_still_required_without_auto_complete_shell() {
    let error = parse_from_args(vec!["s3batch", "--worker-size", "2"]).unwrap_err();
    assert_eq!(
        error.kind(),
        clap::error::ErrorKind::MissingRequiredArgument
    );
}

// ---------------------------------------------------------------------------
// Config conversion tests
// ---------------------------------------------------------------------------

#[test]
fn build_config_from_settings_file() {
    init_dummy_tracing_subscriber();

    let config = build_config(&["delete"], SETTINGS).unwrap();

    assert_eq!(config.operation, Operation::Delete);
    assert_eq!(config.endpoints.bucket, "staging-bucket");
    assert_eq!(config.endpoints.region, "ap-northeast-1");
    assert_eq!(config.endpoints.environment, "staging");
    assert_eq!(config.input_file, PathBuf::from("data/delete_url_list.txt"));
    assert_eq!(config.output_file, PathBuf::from("data/delete_results.txt"));
    assert_eq!(config.resource_dir, PathBuf::from("data/resource"));
    assert_eq!(
        config.client_config.region.as_deref(),
        Some("ap-northeast-1")
    );
    let S3Credentials::Credentials { access_keys } = &config.client_config.credential else {
        panic!("static credentials expected");
    };
    assert_eq!(access_keys.access_key, "AKIAEXAMPLE");
    assert!(config.tracing_config.is_some());
}

#[test]
fn upload_uses_upload_paths() {
    let config = build_config(&["upload"], SETTINGS).unwrap();
    assert_eq!(config.input_file, PathBuf::from("data/upload_file_list.txt"));
    assert_eq!(config.output_file, PathBuf::from("data/upload_results.txt"));
}

#[test]
fn command_line_paths_override_settings() {
    let config = build_config(
        &[
            "upload",
            "--input-file",
            "in.txt",
            "--output-file",
            "out/results.txt",
            "--resource-dir",
            "assets",
        ],
        SETTINGS,
    )
    .unwrap();
    assert_eq!(config.input_file, PathBuf::from("in.txt"));
    assert_eq!(config.output_file, PathBuf::from("out/results.txt"));
    assert_eq!(config.resource_dir, PathBuf::from("assets"));
}

#[test]
fn environment_option_overrides_settings() {
    let config = build_config(&["delete", "--environment", "production"], SETTINGS).unwrap();
    assert_eq!(config.endpoints.bucket, "production-bucket");
    assert!(config.endpoints.is_production());
    assert_eq!(
        config.endpoints.cdn_domain.as_deref(),
        Some("cdn.example.com")
    );
    assert!(matches!(
        config.client_config.credential,
        S3Credentials::FromEnvironment
    ));
}

#[test]
fn aws_profile_takes_precedence_over_settings_keys() {
    let config = build_config(&["delete", "--aws-profile", "ops"], SETTINGS).unwrap();
    let S3Credentials::Profile(profile) = &config.client_config.credential else {
        panic!("profile credentials expected");
    };
    assert_eq!(profile, "ops");
}

#[test]
fn undeclared_environment_is_rejected() {
    let error = build_config(&["delete", "--environment", "qa"], SETTINGS).unwrap_err();
    assert!(error.contains("qa"));
}

#[test]
fn missing_input_file_is_rejected() {
    let settings = r#"
environment: staging
environments:
  staging:
    aws:
      region: us-east-1
      bucket_name: bucket
"#;
    let error = build_config(&["delete"], settings).unwrap_err();
    assert_eq!(error, ERROR_MESSAGE_INPUT_FILE_NOT_SET);
}

#[test]
fn upload_requires_resource_dir() {
    let settings = r#"
environment: staging
environments:
  staging:
    aws:
      region: us-east-1
      bucket_name: bucket
"#;
    let error = build_config(
        &["upload", "--input-file", "in.txt", "--output-file", "out.txt"],
        settings,
    )
    .unwrap_err();
    assert_eq!(error, ERROR_MESSAGE_RESOURCE_DIR_NOT_SET);

    let config = build_config(
        &["delete", "--input-file", "in.txt", "--output-file", "out.txt"],
        settings,
    )
    .unwrap();
    assert_eq!(config.resource_dir, PathBuf::new());
}

#[test]
fn zero_values_are_rejected() {
    assert_eq!(
        build_config(&["delete", "--worker-size", "0"], SETTINGS).unwrap_err(),
        ERROR_MESSAGE_WORKER_SIZE_ZERO
    );
    assert_eq!(
        build_config(&["delete", "--probe-retries", "0"], SETTINGS).unwrap_err(),
        ERROR_MESSAGE_PROBE_RETRIES_ZERO
    );
    assert_eq!(
        build_config(&["delete", "--rate-limit-objects", "0"], SETTINGS).unwrap_err(),
        ERROR_MESSAGE_RATE_LIMIT_OBJECTS_ZERO
    );
}

#[test]
fn quiet_disables_tracing() {
    let config = build_config(&["delete", "-qq"], SETTINGS).unwrap();
    assert!(config.tracing_config.is_none());
}

#[test]
fn verbosity_and_logging_flags() {
    let config = build_config(
        &["delete", "-vv", "--json-tracing", "--aws-sdk-tracing"],
        SETTINGS,
    )
    .unwrap();
    let tracing_config = config.tracing_config.unwrap();
    assert_eq!(tracing_config.tracing_level, log::Level::Debug);
    assert!(tracing_config.json_tracing);
    assert!(tracing_config.aws_sdk_tracing);
    assert!(!tracing_config.span_events_tracing);
}

#[test]
fn retry_and_timeout_options_reach_client_config() {
    let config = build_config(
        &[
            "delete",
            "--aws-max-attempts",
            "3",
            "--initial-backoff-milliseconds",
            "250",
            "--connect-timeout-milliseconds",
            "1000",
            "--force-path-style",
            "--endpoint-url",
            "http://localhost:9000",
        ],
        SETTINGS,
    )
    .unwrap();
    let client_config = &config.client_config;
    assert_eq!(client_config.retry_config.aws_max_attempts, 3);
    assert_eq!(client_config.retry_config.initial_backoff_milliseconds, 250);
    assert_eq!(
        client_config.cli_timeout_config.connect_timeout_milliseconds,
        Some(1000)
    );
    assert!(client_config.cli_timeout_config.read_timeout_milliseconds.is_none());
    assert!(client_config.force_path_style);
    assert_eq!(
        client_config.endpoint_url.as_deref(),
        Some("http://localhost:9000")
    );
}
