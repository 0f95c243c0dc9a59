use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CollectionId, UserId};

/// Summary of a collection of learning items, as listed by the remote store.
///
/// Collection contents and editing are handled elsewhere; the engine only
/// needs the listing for grouping and status display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub owner_id: UserId,
    pub name: String,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn collection_serializes_roundtrip() {
        let collection = Collection {
            id: CollectionId::generate(),
            owner_id: UserId::generate(),
            name: "Spanish A1".to_string(),
            item_count: 42,
            created_at: fixed_now(),
        };

        let json = serde_json::to_string(&collection).unwrap();
        let back: Collection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, collection);
    }
}
