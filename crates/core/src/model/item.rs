use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CollectionId, ItemId, UserId};

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Per-item scheduling state maintained by the SM-2 scheduler.
///
/// # Fields
///
/// * `easiness` - Multiplier controlling interval growth, bounded [1.3, 2.5]
/// * `interval_days` - Days until the item is due again
/// * `repetition_count` - Consecutive successful (non-Again) reviews
/// * `next_review_date` - Calendar date on or after which the item is due
/// * `last_reviewed_at` - Timestamp of the most recent review, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub easiness: f64,
    pub interval_days: u32,
    pub repetition_count: u32,
    pub next_review_date: NaiveDate,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// Lower bound for the easiness factor.
    pub const MIN_EASINESS: f64 = 1.3;
    /// Upper bound for the easiness factor.
    pub const MAX_EASINESS: f64 = 2.5;
    /// Easiness assigned to an item that has never been reviewed.
    pub const INITIAL_EASINESS: f64 = 2.5;

    /// State of an item that has never been reviewed: immediately due.
    #[must_use]
    pub fn new_item(today: NaiveDate) -> Self {
        Self {
            easiness: Self::INITIAL_EASINESS,
            interval_days: 0,
            repetition_count: 0,
            next_review_date: today,
            last_reviewed_at: None,
        }
    }

    /// Returns true when the item is due on the given date.
    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }

    /// Last-write-wins comparison used when reconciling replicas.
    ///
    /// Returns true when `self` carries a strictly newer review than
    /// `other`. A record that was never reviewed cannot supersede one that
    /// was.
    #[must_use]
    pub fn supersedes(&self, other: &Progress) -> bool {
        match (self.last_reviewed_at, other.last_reviewed_at) {
            (Some(mine), Some(theirs)) => mine > theirs,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Checks the invariants every persisted progress record must hold.
    ///
    /// The scheduler clamps its outputs, so a violation can only come from
    /// outside data (storage corruption, a misbehaving remote).
    ///
    /// # Errors
    ///
    /// Returns `ProgressInvariantError` describing the violated bound.
    pub fn validate(&self) -> Result<(), ProgressInvariantError> {
        if !(Self::MIN_EASINESS..=Self::MAX_EASINESS).contains(&self.easiness) {
            return Err(ProgressInvariantError::EasinessOutOfRange {
                provided: self.easiness,
            });
        }
        if self.repetition_count == 0 && self.interval_days != 0 {
            return Err(ProgressInvariantError::UnreviewedItemScheduled {
                interval_days: self.interval_days,
            });
        }
        Ok(())
    }
}

/// Violations of the progress invariants.
///
/// These should be unreachable for scheduler-produced values; they surface
/// when decoding persisted or remote data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProgressInvariantError {
    #[error("easiness factor out of range [1.3, 2.5]: {provided}")]
    EasinessOutOfRange { provided: f64 },

    #[error("item with no successful review has a nonzero interval: {interval_days} days")]
    UnreviewedItemScheduled { interval_days: u32 },
}

//
// ─── LEARNING ITEM ─────────────────────────────────────────────────────────────
//

/// A vocabulary entry owned by a user, belonging to one collection.
///
/// The lexical payload (`term`, `definition`, `phonetic`) is opaque to the
/// scheduler; only `progress` participates in scheduling and sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningItem {
    pub id: ItemId,
    pub owner_id: UserId,
    pub collection_id: CollectionId,
    pub term: String,
    pub definition: String,
    pub phonetic: Option<String>,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
}

impl LearningItem {
    /// Creates a brand-new item that is immediately due.
    #[must_use]
    pub fn new(
        id: ItemId,
        owner_id: UserId,
        collection_id: CollectionId,
        term: impl Into<String>,
        definition: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            collection_id,
            term: term.into(),
            definition: definition.into(),
            phonetic: None,
            progress: Progress::new_item(created_at.date_naive()),
            created_at,
        }
    }

    /// Returns true when the item is due for review on the given date.
    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.progress.is_due(today)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_now, fixed_today};
    use chrono::Duration;

    fn build_item() -> LearningItem {
        LearningItem::new(
            ItemId::generate(),
            UserId::generate(),
            CollectionId::generate(),
            "perro",
            "dog",
            fixed_now(),
        )
    }

    #[test]
    fn new_item_is_immediately_due() {
        let item = build_item();
        assert_eq!(item.progress.repetition_count, 0);
        assert_eq!(item.progress.interval_days, 0);
        assert!(item.is_due(fixed_today()));
        assert!(item.progress.last_reviewed_at.is_none());
    }

    #[test]
    fn item_scheduled_tomorrow_is_not_due_today() {
        let mut item = build_item();
        item.progress.repetition_count = 1;
        item.progress.interval_days = 1;
        item.progress.next_review_date = fixed_today() + Duration::days(1);
        assert!(!item.is_due(fixed_today()));
        assert!(item.is_due(fixed_today() + Duration::days(1)));
    }

    #[test]
    fn validate_rejects_out_of_range_easiness() {
        let mut progress = Progress::new_item(fixed_today());
        progress.easiness = 2.9;
        let err = progress.validate().unwrap_err();
        assert!(matches!(
            err,
            ProgressInvariantError::EasinessOutOfRange { provided } if provided == 2.9
        ));

        progress.easiness = 1.0;
        assert!(progress.validate().is_err());
    }

    #[test]
    fn validate_rejects_scheduled_unreviewed_item() {
        let mut progress = Progress::new_item(fixed_today());
        progress.interval_days = 6;
        let err = progress.validate().unwrap_err();
        assert!(matches!(
            err,
            ProgressInvariantError::UnreviewedItemScheduled { interval_days: 6 }
        ));
    }

    #[test]
    fn supersedes_prefers_strictly_newer_reviews() {
        let mut older = Progress::new_item(fixed_today());
        older.last_reviewed_at = Some(fixed_now());
        let mut newer = older.clone();
        newer.last_reviewed_at = Some(fixed_now() + Duration::minutes(5));

        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
        // Equal timestamps do not supersede in either direction.
        assert!(!older.supersedes(&older.clone()));
    }

    #[test]
    fn never_reviewed_progress_never_supersedes() {
        let unreviewed = Progress::new_item(fixed_today());
        let mut reviewed = Progress::new_item(fixed_today());
        reviewed.last_reviewed_at = Some(fixed_now());

        assert!(!unreviewed.supersedes(&reviewed));
        assert!(!unreviewed.supersedes(&unreviewed.clone()));
        assert!(reviewed.supersedes(&unreviewed));
    }
}
