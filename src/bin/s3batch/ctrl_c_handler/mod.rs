use s3batch_rs::BatchCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

/// Cancel the batch on Ctrl+C. The task ends as soon as the token is cancelled
/// from either side.
pub fn spawn_ctrl_c_handler(cancellation_token: BatchCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("cancellation_token canceled.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received, stopping the batch.");
                cancellation_token.cancel();
            }
        }
    })
}
