use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::config::Config;
use crate::prober::AccessibilityProber;
use crate::storage::Storage;
use crate::types::token::BatchCancellationToken;
use crate::types::{IndexedOutcome, Job, ReconcileStatistics};

/// Result of handing an outcome to the collector.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

/// Shared context owned by each worker.
///
/// All workers read jobs from the same `receiver` and write outcomes to the
/// same `sender`; the collector on the other end restores input order.
pub struct Stage {
    pub config: Config,
    pub target: Storage,
    pub prober: AccessibilityProber,
    pub receiver: Receiver<Job>,
    pub sender: Sender<IndexedOutcome>,
    pub stats_sender: Sender<ReconcileStatistics>,
    pub cancellation_token: BatchCancellationToken,
    pub has_warning: Arc<AtomicBool>,
}

impl Stage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        target: Storage,
        prober: AccessibilityProber,
        receiver: Receiver<Job>,
        sender: Sender<IndexedOutcome>,
        stats_sender: Sender<ReconcileStatistics>,
        cancellation_token: BatchCancellationToken,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            target,
            prober,
            receiver,
            sender,
            stats_sender,
            cancellation_token,
            has_warning,
        }
    }

    /// Returns `SendResult::Closed` if the collector has gone away, so the
    /// caller can exit gracefully.
    pub async fn send(&self, outcome: IndexedOutcome) -> Result<SendResult> {
        let result = self
            .sender
            .send(outcome)
            .await
            .context("async_channel::Sender::send() failed.");

        if let Err(e) = result {
            return if !self.is_channel_closed() {
                Err(anyhow!(e))
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    pub fn is_channel_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn send_stats(&self, stats: ReconcileStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    pub fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }
}
