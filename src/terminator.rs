use async_channel::Receiver;
use tracing::debug;

use crate::types::{IndexedOutcome, OutcomeRecord};

/// Terminal stage of a batch run.
///
/// Drains the result channel until every worker has dropped its sender, then
/// returns the outcomes in input order.
#[derive(Debug)]
pub struct Terminator {
    receiver: Receiver<IndexedOutcome>,
}

impl Terminator {
    pub fn new(receiver: Receiver<IndexedOutcome>) -> Self {
        Self { receiver }
    }

    pub async fn terminate(&self) -> Vec<OutcomeRecord> {
        debug!("terminator has started.");

        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.receiver.recv().await {
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|outcome| outcome.index);

        debug!(count = outcomes.len(), "terminator has been completed.");
        outcomes.into_iter().map(|outcome| outcome.outcome).collect()
    }
}
