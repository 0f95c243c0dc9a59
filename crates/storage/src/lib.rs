#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, ItemRecord, ItemRepository, Storage, StorageError, SyncStateRepository,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
