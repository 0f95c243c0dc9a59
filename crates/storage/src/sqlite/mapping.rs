use sqlx::Row;
use std::str::FromStr;

use vocab_core::model::{CollectionId, ItemId, LearningItem, UserId};

use crate::repository::{ItemRecord, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn item_id_from_str(s: &str) -> Result<ItemId, StorageError> {
    ItemId::from_str(s).map_err(ser)
}

pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    UserId::from_str(s).map_err(ser)
}

pub(crate) fn collection_id_from_str(s: &str) -> Result<CollectionId, StorageError> {
    CollectionId::from_str(s).map_err(ser)
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_item_row(row: &sqlx::sqlite::SqliteRow) -> Result<LearningItem, StorageError> {
    let record = ItemRecord {
        id: item_id_from_str(row.try_get::<String, _>("id").map_err(ser)?.as_str())?,
        owner_id: user_id_from_str(row.try_get::<String, _>("owner_id").map_err(ser)?.as_str())?,
        collection_id: collection_id_from_str(
            row.try_get::<String, _>("collection_id").map_err(ser)?.as_str(),
        )?,
        term: row.try_get("term").map_err(ser)?,
        definition: row.try_get("definition").map_err(ser)?,
        phonetic: row.try_get("phonetic").map_err(ser)?,
        easiness: row.try_get("easiness").map_err(ser)?,
        interval_days: i64_to_u32(
            "interval_days",
            row.try_get::<i64, _>("interval_days").map_err(ser)?,
        )?,
        repetition_count: i64_to_u32(
            "repetition_count",
            row.try_get::<i64, _>("repetition_count").map_err(ser)?,
        )?,
        next_review_date: row.try_get("next_review_date").map_err(ser)?,
        last_reviewed_at: row.try_get("last_reviewed_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    };

    // Invariant violations in persisted data surface as serialization errors
    // rather than corrupting the domain layer.
    record.into_item().map_err(ser)
}
