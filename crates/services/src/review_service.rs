use chrono::{DateTime, NaiveDate, Utc};

use storage::repository::ItemRepository;
use vocab_core::{
    Clock,
    model::{AssessmentLevel, ItemId, LearningItem, Progress},
    scheduler::{ScheduledStates, Scheduler},
};

use crate::error::ReviewServiceError;

//
// ─── APPLIED ASSESSMENT ────────────────────────────────────────────────────────
//

/// Result of recording one assessment: the item's new progress, already
/// persisted to the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAssessment {
    pub item_id: ItemId,
    pub assessment: AssessmentLevel,
    pub progress: Progress,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Applies a user's assessment to an item and persists it write-through.
///
/// Persistence goes straight to the local store and never waits on remote
/// sync; the sync manager picks the change up on its own schedule.
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
}

impl ReviewService {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            scheduler: Scheduler::new(),
        }
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current calendar date according to the service's clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// All four candidate next states for the item, for display before the
    /// user commits to an assessment.
    #[must_use]
    pub fn preview(&self, item: &LearningItem) -> ScheduledStates {
        self.scheduler
            .preview(&item.progress, self.clock.now(), self.clock.today())
    }

    /// Apply an assessment to the item and persist the new progress.
    ///
    /// If the write fails, the item is rolled back to its prior committed
    /// progress and the error is surfaced so the caller can retry the same
    /// item.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` if the local write fails.
    pub async fn apply_assessment(
        &self,
        item: &mut LearningItem,
        assessment: AssessmentLevel,
        items: &dyn ItemRepository,
    ) -> Result<AppliedAssessment, ReviewServiceError> {
        let original = item.progress.clone();

        item.progress = self.scheduler.next_progress(
            &item.progress,
            assessment,
            self.clock.now(),
            self.clock.today(),
        );

        match items.upsert_item(item).await {
            Ok(()) => Ok(AppliedAssessment {
                item_id: item.id,
                assessment,
                progress: item.progress.clone(),
            }),
            Err(err) => {
                item.progress = original;
                Err(err.into())
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
