/// A cancellation token used to stop a running batch.
///
/// Alias of [`tokio_util::sync::CancellationToken`]. Pass it to
/// [`BatchReconciler::new`](crate::BatchReconciler::new) and call
/// [`cancel()`](tokio_util::sync::CancellationToken::cancel) on it (e.g. from a
/// Ctrl+C handler) to stop handing out items.
pub type BatchCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`BatchCancellationToken`].
///
/// # Example
///
/// ```
/// use s3batch_rs::create_batch_cancellation_token;
///
/// let token = create_batch_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_batch_cancellation_token() -> BatchCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
