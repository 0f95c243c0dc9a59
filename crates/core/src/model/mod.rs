mod collection;
mod ids;
mod item;
mod review;
mod sync;

pub use ids::{CollectionId, ItemId, ParseIdError, UserId};

pub use collection::Collection;
pub use item::{LearningItem, Progress, ProgressInvariantError};
pub use review::{AssessmentLevel, ReviewError};
pub use sync::SyncOutcome;
