use std::sync::Arc;

use tokio::sync::Mutex;

use storage::repository::Storage;
use vocab_core::{
    Clock,
    model::{Collection, UserId},
};

use crate::error::{AppServicesError, GatewayError};
use crate::gateway::RemoteGateway;
use crate::network::NetworkMonitor;
use crate::session::SessionController;
use crate::sync::SyncService;

/// Assembles the engine surface consumed by the UI layer.
///
/// The session controller lives behind an async mutex so UI calls are
/// serialized one assessment at a time; the sync service runs independently
/// on its own triggers.
#[derive(Clone)]
pub struct AppServices {
    session: Arc<Mutex<SessionController>>,
    sync: SyncService,
    gateway: Arc<dyn RemoteGateway>,
    monitor: NetworkMonitor,
    storage: Storage,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        gateway: Arc<dyn RemoteGateway>,
        monitor: NetworkMonitor,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, gateway, monitor))
    }

    /// Build services over in-memory storage, for tests and prototyping.
    #[must_use]
    pub fn new_in_memory(
        clock: Clock,
        gateway: Arc<dyn RemoteGateway>,
        monitor: NetworkMonitor,
    ) -> Self {
        Self::from_storage(Storage::in_memory(), clock, gateway, monitor)
    }

    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        gateway: Arc<dyn RemoteGateway>,
        monitor: NetworkMonitor,
    ) -> Self {
        let session = Arc::new(Mutex::new(SessionController::new(
            clock,
            Arc::clone(&gateway),
            Arc::clone(&storage.items),
            monitor.clone(),
        )));
        let sync = SyncService::new(
            clock,
            Arc::clone(&gateway),
            Arc::clone(&storage.items),
            Arc::clone(&storage.sync_state),
        );

        Self {
            session,
            sync,
            gateway,
            monitor,
            storage,
        }
    }

    #[must_use]
    pub fn session(&self) -> Arc<Mutex<SessionController>> {
        Arc::clone(&self.session)
    }

    #[must_use]
    pub fn sync(&self) -> SyncService {
        self.sync.clone()
    }

    #[must_use]
    pub fn monitor(&self) -> NetworkMonitor {
        self.monitor.clone()
    }

    #[must_use]
    pub fn storage(&self) -> Storage {
        self.storage.clone()
    }

    /// List the user's collections from the remote store.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the remote call fails.
    pub async fn list_collections(&self, user: UserId) -> Result<Vec<Collection>, GatewayError> {
        self.gateway.fetch_collections(user).await
    }
}
