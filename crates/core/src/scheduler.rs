use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::model::{AssessmentLevel, Progress};

//
// ─── CONSTANTS ─────────────────────────────────────────────────────────────────
//

/// Fixed interval for the first successful repetition (Good ladder).
const FIRST_INTERVAL_DAYS: u32 = 1;
/// Fixed interval for the second successful repetition (Good ladder).
const SECOND_INTERVAL_DAYS: u32 = 6;
/// Fixed interval for the first repetition assessed Easy.
const FIRST_INTERVAL_EASY_DAYS: u32 = 4;
/// Fixed interval for the second repetition assessed Easy.
const SECOND_INTERVAL_EASY_DAYS: u32 = 10;

/// Growth damping applied to Hard reviews.
const HARD_MULTIPLIER: f64 = 1.2;
/// Growth bonus applied to Easy reviews.
const EASY_MULTIPLIER: f64 = 1.3;

//
// ─── SCHEDULED STATES ──────────────────────────────────────────────────────────
//

/// All four candidate next states for an item under review.
///
/// Computing every branch up front lets the UI show the would-be interval
/// on each assessment button before the user commits.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledStates {
    pub again: Progress,
    pub hard: Progress,
    pub good: Progress,
    pub easy: Progress,
}

impl ScheduledStates {
    #[must_use]
    pub fn select(&self, assessment: AssessmentLevel) -> &Progress {
        match assessment {
            AssessmentLevel::Again => &self.again,
            AssessmentLevel::Hard => &self.hard,
            AssessmentLevel::Good => &self.good,
            AssessmentLevel::Easy => &self.easy,
        }
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// SM-2 derived scheduler for spaced repetition.
///
/// Pure and deterministic: the next state depends only on the current
/// progress, the assessment, and the caller-supplied clock readings. It
/// holds no state and never fails — out-of-range easiness results are
/// clamped back into [1.3, 2.5] rather than rejected.
///
/// The first and second successful repetitions use a fixed interval ladder
/// instead of the multiplier, because multiplying a near-zero interval
/// produces unstable schedules.
///
/// # Examples
///
/// ```
/// # use vocab_core::scheduler::Scheduler;
/// # use vocab_core::model::{AssessmentLevel, Progress};
/// # use vocab_core::time::{fixed_now, fixed_today};
/// let scheduler = Scheduler::new();
/// let fresh = Progress::new_item(fixed_today());
///
/// let next = scheduler.next_progress(&fresh, AssessmentLevel::Good, fixed_now(), fixed_today());
/// assert_eq!(next.repetition_count, 1);
/// assert_eq!(next.interval_days, 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Easiness adjustment per assessment, before clamping.
    #[must_use]
    pub fn easiness_delta(assessment: AssessmentLevel) -> f64 {
        match assessment {
            AssessmentLevel::Again => -0.20,
            AssessmentLevel::Hard => -0.15,
            AssessmentLevel::Good => 0.00,
            AssessmentLevel::Easy => 0.15,
        }
    }

    /// Computes all four candidate next states for the given progress.
    ///
    /// Select one based on the user's assessment with
    /// [`ScheduledStates::select`].
    #[must_use]
    pub fn preview(
        &self,
        current: &Progress,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> ScheduledStates {
        ScheduledStates {
            again: self.next_progress(current, AssessmentLevel::Again, now, today),
            hard: self.next_progress(current, AssessmentLevel::Hard, now, today),
            good: self.next_progress(current, AssessmentLevel::Good, now, today),
            easy: self.next_progress(current, AssessmentLevel::Easy, now, today),
        }
    }

    /// Applies an assessment to the current progress and returns the next.
    ///
    /// `Again` resets the repetition streak and makes the item due today;
    /// the easiness penalty still applies, but easiness is never pushed
    /// past its floor. Successful assessments grow the interval along the
    /// fixed ladder for the first two repetitions and along the easiness
    /// multiplier afterwards.
    #[must_use]
    pub fn next_progress(
        &self,
        current: &Progress,
        assessment: AssessmentLevel,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Progress {
        let easiness = (current.easiness + Self::easiness_delta(assessment))
            .clamp(Progress::MIN_EASINESS, Progress::MAX_EASINESS);

        // Branch on the repetition count *before* this review.
        let (repetition_count, interval_days) = match assessment {
            AssessmentLevel::Again => (0, 0),
            AssessmentLevel::Hard => (
                current.repetition_count + 1,
                match current.repetition_count {
                    0 => scale_days(FIRST_INTERVAL_DAYS, HARD_MULTIPLIER),
                    1 => scale_days(SECOND_INTERVAL_DAYS, HARD_MULTIPLIER),
                    _ => scale_days(current.interval_days, easiness * HARD_MULTIPLIER),
                },
            ),
            AssessmentLevel::Good => (
                current.repetition_count + 1,
                match current.repetition_count {
                    0 => FIRST_INTERVAL_DAYS,
                    1 => SECOND_INTERVAL_DAYS,
                    _ => scale_days(current.interval_days, easiness),
                },
            ),
            AssessmentLevel::Easy => (
                current.repetition_count + 1,
                match current.repetition_count {
                    0 => FIRST_INTERVAL_EASY_DAYS,
                    1 => SECOND_INTERVAL_EASY_DAYS,
                    _ => scale_days(current.interval_days, easiness * EASY_MULTIPLIER),
                },
            ),
        };

        Progress {
            easiness,
            interval_days,
            repetition_count,
            next_review_date: today + Duration::days(i64::from(interval_days)),
            last_reviewed_at: Some(now),
        }
    }
}

/// Rounds a scaled interval to whole days.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_days(interval_days: u32, factor: f64) -> u32 {
    (f64::from(interval_days) * factor).round() as u32
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
