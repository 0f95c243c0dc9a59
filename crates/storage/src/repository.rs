use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use vocab_core::model::{
    CollectionId, ItemId, LearningItem, Progress, ProgressInvariantError, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a learning item, with progress fields flattened.
///
/// This mirrors the domain `LearningItem` so repositories can
/// serialize/deserialize without leaking storage concerns into the domain
/// layer.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: ItemId,
    pub owner_id: UserId,
    pub collection_id: CollectionId,
    pub term: String,
    pub definition: String,
    pub phonetic: Option<String>,
    pub easiness: f64,
    pub interval_days: u32,
    pub repetition_count: u32,
    pub next_review_date: NaiveDate,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ItemRecord {
    #[must_use]
    pub fn from_item(item: &LearningItem) -> Self {
        Self {
            id: item.id,
            owner_id: item.owner_id,
            collection_id: item.collection_id,
            term: item.term.clone(),
            definition: item.definition.clone(),
            phonetic: item.phonetic.clone(),
            easiness: item.progress.easiness,
            interval_days: item.progress.interval_days,
            repetition_count: item.progress.repetition_count,
            next_review_date: item.progress.next_review_date,
            last_reviewed_at: item.progress.last_reviewed_at,
            created_at: item.created_at,
        }
    }

    /// Convert the record back into a domain `LearningItem`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressInvariantError` if the persisted progress fields
    /// violate the scheduling invariants.
    pub fn into_item(self) -> Result<LearningItem, ProgressInvariantError> {
        let progress = Progress {
            easiness: self.easiness,
            interval_days: self.interval_days,
            repetition_count: self.repetition_count,
            next_review_date: self.next_review_date,
            last_reviewed_at: self.last_reviewed_at,
        };
        progress.validate()?;

        Ok(LearningItem {
            id: self.id,
            owner_id: self.owner_id,
            collection_id: self.collection_id,
            term: self.term,
            definition: self.definition,
            phonetic: self.phonetic,
            progress,
            created_at: self.created_at,
        })
    }
}

/// Repository contract for the local replica of learning items.
///
/// Writes are keyed by item id; both the review flow and the sync pull go
/// through `upsert_item` so the later caller wins deterministically and a
/// record is never left torn.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Persist or update an item by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_item(&self, item: &LearningItem) -> Result<(), StorageError>;

    /// Fetch a single item by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures; a missing
    /// item is `Ok(None)`.
    async fn get_item(&self, id: ItemId) -> Result<Option<LearningItem>, StorageError>;

    /// Fetch all items owned by the given user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_items(&self, owner: UserId) -> Result<Vec<LearningItem>, StorageError>;

    /// Fetch the user's items due on or before the given date, ordered by
    /// next review date.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn due_items(
        &self,
        owner: UserId,
        today: NaiveDate,
    ) -> Result<Vec<LearningItem>, StorageError>;
}

/// Repository contract for the persisted sync checkpoint.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Timestamp of the last fully successful reconciliation, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn last_synced_at(&self, owner: UserId) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Persist the checkpoint after a fully successful reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the checkpoint cannot be stored.
    async fn set_last_synced_at(
        &self,
        owner: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Writes can be made to fail on demand, which failure-path tests use to
/// check that callers leave committed records untouched.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    items: Arc<Mutex<HashMap<ItemId, LearningItem>>>,
    checkpoints: Arc<Mutex<HashMap<UserId, DateTime<Utc>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a connection error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for InMemoryRepository {
    async fn upsert_item(&self, item: &LearningItem) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<LearningItem>, StorageError> {
        let guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_items(&self, owner: UserId) -> Result<Vec<LearningItem>, StorageError> {
        let guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut items: Vec<LearningItem> = guard
            .values()
            .filter(|item| item.owner_id == owner)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn due_items(
        &self,
        owner: UserId,
        today: NaiveDate,
    ) -> Result<Vec<LearningItem>, StorageError> {
        let guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut due: Vec<LearningItem> = guard
            .values()
            .filter(|item| item.owner_id == owner && item.is_due(today))
            .cloned()
            .collect();
        due.sort_by_key(|item| (item.progress.next_review_date, item.id));
        Ok(due)
    }
}

#[async_trait]
impl SyncStateRepository for InMemoryRepository {
    async fn last_synced_at(&self, owner: UserId) -> Result<Option<DateTime<Utc>>, StorageError> {
        let guard = self
            .checkpoints
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&owner).copied())
    }

    async fn set_last_synced_at(
        &self,
        owner: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut guard = self
            .checkpoints
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(owner, at);
        Ok(())
    }
}

/// Aggregates item and sync-state repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub items: Arc<dyn ItemRepository>,
    pub sync_state: Arc<dyn SyncStateRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let items: Arc<dyn ItemRepository> = Arc::new(repo.clone());
        let sync_state: Arc<dyn SyncStateRepository> = Arc::new(repo);
        Self { items, sync_state }
    }
}
