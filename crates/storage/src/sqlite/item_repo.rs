use chrono::NaiveDate;

use vocab_core::model::{ItemId, LearningItem, UserId};

use super::{SqliteRepository, mapping::map_item_row};
use crate::repository::{ItemRepository, StorageError};

const ITEM_COLUMNS: &str = r"
    id, owner_id, collection_id, term, definition, phonetic,
    easiness, interval_days, repetition_count,
    next_review_date, last_reviewed_at, created_at
";

#[async_trait::async_trait]
impl ItemRepository for SqliteRepository {
    async fn upsert_item(&self, item: &LearningItem) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO items (
                id, owner_id, collection_id, term, definition, phonetic,
                easiness, interval_days, repetition_count,
                next_review_date, last_reviewed_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                owner_id = excluded.owner_id,
                collection_id = excluded.collection_id,
                term = excluded.term,
                definition = excluded.definition,
                phonetic = excluded.phonetic,
                easiness = excluded.easiness,
                interval_days = excluded.interval_days,
                repetition_count = excluded.repetition_count,
                next_review_date = excluded.next_review_date,
                last_reviewed_at = excluded.last_reviewed_at
            ",
        )
        .bind(item.id.to_string())
        .bind(item.owner_id.to_string())
        .bind(item.collection_id.to_string())
        .bind(item.term.clone())
        .bind(item.definition.clone())
        .bind(item.phonetic.clone())
        .bind(item.progress.easiness)
        .bind(i64::from(item.progress.interval_days))
        .bind(i64::from(item.progress.repetition_count))
        .bind(item.progress.next_review_date)
        .bind(item.progress.last_reviewed_at)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<LearningItem>, StorageError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_item_row).transpose()
    }

    async fn list_items(&self, owner: UserId) -> Result<Vec<LearningItem>, StorageError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE owner_id = ?1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(map_item_row(&row)?);
        }
        Ok(items)
    }

    async fn due_items(
        &self,
        owner: UserId,
        today: NaiveDate,
    ) -> Result<Vec<LearningItem>, StorageError> {
        let sql = format!(
            r"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE owner_id = ?1
              AND next_review_date <= ?2
            ORDER BY next_review_date ASC, id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .bind(today)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(map_item_row(&row)?);
        }
        Ok(items)
    }
}
