//! Write-once store for prompt resolutions within one presentation.
//!
//! A prompt can resolve twice when a timeout races a submit. Whichever
//! lands first owns the slot; the record step re-reads from here instead
//! of trusting values captured before the race settled.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::models::{MeasureDim, PromptAnswer};

/// One resolved prompt as captured, before metric derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnswer {
    pub dim: MeasureDim,
    /// Option/field order the prompt was presented with.
    pub options_shown: Option<Vec<String>>,
    /// `None` is the timeout sentinel.
    pub answer: Option<PromptAnswer>,
    pub elapsed_ms: Option<u64>,
}

impl RecordedAnswer {
    pub fn timed_out(dim: MeasureDim, options_shown: Option<Vec<String>>) -> Self {
        Self {
            dim,
            options_shown,
            answer: None,
            elapsed_ms: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResponseLedger {
    slots: Mutex<HashMap<MeasureDim, RecordedAnswer>>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolution. The first write for a dimension wins; a later
    /// write is dropped and `false` comes back.
    pub async fn resolve(&self, entry: RecordedAnswer) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.entry(entry.dim) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub async fn get(&self, dim: MeasureDim) -> Option<RecordedAnswer> {
        self.slots.lock().await.get(&dim).cloned()
    }

    /// Copy of every resolved slot, for the record step.
    pub async fn snapshot(&self) -> HashMap<MeasureDim, RecordedAnswer> {
        self.slots.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(dim: MeasureDim) -> RecordedAnswer {
        RecordedAnswer {
            dim,
            options_shown: None,
            answer: Some(PromptAnswer::Ratings {
                value: 62.0,
                confidence: 80.0,
            }),
            elapsed_ms: Some(1200),
        }
    }

    #[tokio::test]
    async fn submit_then_late_timeout_keeps_the_submission() {
        let ledger = ResponseLedger::new();
        assert!(ledger.resolve(submitted(MeasureDim::Trustworthiness)).await);
        assert!(
            !ledger
                .resolve(RecordedAnswer::timed_out(MeasureDim::Trustworthiness, None))
                .await
        );

        let stored = ledger.get(MeasureDim::Trustworthiness).await.unwrap();
        assert_eq!(stored.elapsed_ms, Some(1200));
        assert!(stored.answer.is_some());
    }

    #[tokio::test]
    async fn timeout_then_late_submit_keeps_the_timeout() {
        let ledger = ResponseLedger::new();
        assert!(
            ledger
                .resolve(RecordedAnswer::timed_out(MeasureDim::Dominance, None))
                .await
        );
        assert!(!ledger.resolve(submitted(MeasureDim::Dominance)).await);

        let stored = ledger.get(MeasureDim::Dominance).await.unwrap();
        assert_eq!(stored.answer, None);
        assert_eq!(stored.elapsed_ms, None);
    }

    #[tokio::test]
    async fn dimensions_resolve_independently() {
        let ledger = ResponseLedger::new();
        assert!(ledger.resolve(submitted(MeasureDim::Trustworthiness)).await);
        assert!(
            ledger
                .resolve(RecordedAnswer::timed_out(MeasureDim::Dominance, None))
                .await
        );

        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[&MeasureDim::Trustworthiness].answer.is_some());
        assert!(snapshot[&MeasureDim::Dominance].answer.is_none());
    }
}
