use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one reconciliation attempt between the local replica and the
/// remote store.
///
/// Only the latest value is retained; the UI observes it passively for
/// status display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub items_pulled: usize,
    pub items_pushed: usize,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl SyncOutcome {
    /// A completed reconciliation.
    #[must_use]
    pub fn ok(items_pulled: usize, items_pushed: usize, finished_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            items_pulled,
            items_pushed,
            error: None,
            finished_at,
        }
    }

    /// An aborted reconciliation. Counts are zero because nothing from the
    /// attempt is considered committed.
    #[must_use]
    pub fn failed(error: impl Into<String>, finished_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            items_pulled: 0,
            items_pushed: 0,
            error: Some(error.into()),
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn ok_outcome_carries_counts() {
        let outcome = SyncOutcome::ok(3, 2, fixed_now());
        assert!(outcome.success);
        assert_eq!(outcome.items_pulled, 3);
        assert_eq!(outcome.items_pushed, 2);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn failed_outcome_carries_message() {
        let outcome = SyncOutcome::failed("connection reset", fixed_now());
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("connection reset"));
        assert_eq!(outcome.items_pulled, 0);
    }
}
