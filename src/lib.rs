/*!
# Overview
s3batch-rs deletes and uploads publicly served Amazon S3 objects in batches
and checks over HTTP that each public URL behaves as expected.

## Features
- **Delete**: map public URLs to storage keys and permanently remove every
  version and delete marker of each object, after confirming the URL is live
- **Upload**: push local resources with a content type and public-read ACL,
  then confirm the access URL (CDN in production) serves them
- **Concurrent**: a fixed worker pool processes items while the report keeps
  input order
- **Report**: one plain-text file listing successes and failures
- **Library-First**: the s3batch CLI is a thin wrapper over this crate

Example usage
=============

```toml
[dependencies]
s3batch-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3batch_rs::config::Config;
use s3batch_rs::config::args::parse_from_args;
use s3batch_rs::{BatchReconciler, create_batch_cancellation_token, write_report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = vec!["s3batch", "delete", "--settings-file", "config.yaml"];

    let parsed_args = parse_from_args(args)?;
    let config = Config::try_from(parsed_args).map_err(anyhow::Error::msg)?;

    let cancellation_token = create_batch_cancellation_token();
    let mut reconciler = BatchReconciler::new(config.clone(), cancellation_token).await?;
    reconciler.check_connectivity().await?;

    let items = BatchReconciler::load_work_items(&config.input_file).await?;
    let outcome = reconciler.run(items).await?;
    write_report(&config.output_file, &outcome).await?;

    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod config;
pub mod eraser;
pub mod key_mapper;
pub mod prober;
pub mod reconciler;
pub mod report;
pub mod resolver;
pub mod stage;
pub mod storage;
pub mod terminator;
pub mod types;
pub mod uploader;
pub mod worker;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use config::args::CLIArgs;
pub use reconciler::BatchReconciler;
pub use report::{render_report, write_report};
pub use types::error::{S3batchError, exit_code_from_error, is_cancelled_error};
pub use types::token::{BatchCancellationToken, create_batch_cancellation_token};
pub use types::{BatchOutcome, Operation, OutcomeRecord, ReconcileStatistics, WorkItem};
