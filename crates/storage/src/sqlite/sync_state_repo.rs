use chrono::{DateTime, Utc};
use sqlx::Row;

use vocab_core::model::UserId;

use super::SqliteRepository;
use crate::repository::{StorageError, SyncStateRepository};

#[async_trait::async_trait]
impl SyncStateRepository for SqliteRepository {
    async fn last_synced_at(&self, owner: UserId) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row = sqlx::query("SELECT last_synced_at FROM sync_state WHERE owner_id = ?1")
            .bind(owner.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|r| {
            r.try_get::<DateTime<Utc>, _>("last_synced_at")
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn set_last_synced_at(
        &self,
        owner: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sync_state (owner_id, last_synced_at)
            VALUES (?1, ?2)
            ON CONFLICT(owner_id) DO UPDATE SET
                last_synced_at = excluded.last_synced_at
            ",
        )
        .bind(owner.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
