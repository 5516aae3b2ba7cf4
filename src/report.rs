//! Plain-text result report.
//!
//! ```text
//! SUCCESS ####
//! <name>\t<path>
//!
//! FAILURE ####
//! [<name>] <reason> : <path>
//! ```

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::info;

use crate::types::error::S3batchError;
use crate::types::{BatchOutcome, OutcomeRecord};

pub const SUCCESS_HEADER: &str = "SUCCESS ####";
pub const FAILURE_HEADER: &str = "FAILURE ####";

pub fn render_report(outcome: &BatchOutcome) -> String {
    let mut report = String::new();

    let _ = writeln!(report, "{SUCCESS_HEADER}");
    for record in &outcome.success {
        let _ = writeln!(report, "{}\t{}", record.name(), record.path());
    }

    let _ = writeln!(report);
    let _ = writeln!(report, "{FAILURE_HEADER}");
    for record in &outcome.failure {
        if let OutcomeRecord::Failure { name, path, reason } = record {
            let _ = writeln!(report, "[{name}] {reason} : {path}");
        }
    }

    report
}

/// Write the report to `path`, creating parent directories as needed.
pub async fn write_report(path: &Path, outcome: &BatchOutcome) -> Result<()> {
    let to_report_error =
        |e: std::io::Error| anyhow!(S3batchError::ReportWrite(format!("{}: {e}", path.display())));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(to_report_error)?;
    }

    tokio::fs::write(path, render_report(outcome))
        .await
        .map_err(to_report_error)?;

    info!(
        path = %path.display(),
        success = outcome.success.len(),
        failure = outcome.failure.len(),
        "report written."
    );
    Ok(())
}
