use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, info, trace};

use s3batch_rs::config::Config;
use s3batch_rs::{
    BatchReconciler, CLIArgs, create_batch_cancellation_token, exit_code_from_error,
    is_cancelled_error, write_report,
};

mod ctrl_c_handler;
pub mod indicator;
mod tracing_init;
pub mod ui_config;

const EXIT_CODE_WARNING: i32 = 3;

/// s3batch - batch delete and upload of publicly served Amazon S3 objects.
///
/// This binary is a thin wrapper over the s3batch-rs library.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3batch",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    let tracing_started = start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    match run(config).await {
        Ok(has_failure_as_error) => {
            if has_failure_as_error {
                std::process::exit(EXIT_CODE_WARNING);
            }
            Ok(())
        }
        Err(e) => {
            if tracing_started {
                error!("{e:#}");
            } else {
                eprintln!("{e:#}");
            }
            std::process::exit(exit_code_from_error(&e));
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

/// Returns true when the batch finished with failures and `--warn-as-error` is set.
async fn run(config: Config) -> Result<bool> {
    info!(
        environment = %config.endpoints.environment,
        bucket = %config.endpoints.bucket,
        operation = %config.operation,
        "s3batch has started."
    );

    let cancellation_token = create_batch_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();

    let mut reconciler = BatchReconciler::new(config.clone(), cancellation_token).await?;
    reconciler.check_connectivity().await?;
    let items = BatchReconciler::load_work_items(&config.input_file).await?;

    let indicator_join_handle = indicator::show_indicator(
        reconciler.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    let result = reconciler.run(items).await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if is_cancelled_error(&e) => {
            debug!(duration_sec = duration_sec, "batch cancelled by user.");
            return Ok(false);
        }
        Err(e) => {
            error!(duration_sec = duration_sec, "s3batch failed.");
            return Err(e);
        }
    };

    write_report(&config.output_file, &outcome).await?;
    info!(
        report = %config.output_file.display(),
        success = outcome.success.len(),
        failure = outcome.failure.len(),
        duration_sec = duration_sec,
        "s3batch has been completed."
    );

    Ok(config.warn_as_error && outcome.has_failure())
}
