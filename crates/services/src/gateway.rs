use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use vocab_core::model::{
    Collection, CollectionId, ItemId, LearningItem, Progress, UserId,
};

use crate::error::GatewayError;

/// Default bound on every remote call. Network calls fail closed rather
/// than hang.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

//
// ─── GATEWAY CONTRACT ──────────────────────────────────────────────────────────
//

/// Remote authoritative store for learning items and collections.
///
/// The engine is transport-agnostic; this trait is the only seam through
/// which it reaches the network. All methods are expected to respect a
/// bounded timeout.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Items due for review according to the remote store.
    async fn fetch_due_items(&self, user: UserId) -> Result<Vec<LearningItem>, GatewayError>;

    /// Every item owned by the user.
    async fn fetch_all_items(&self, user: UserId) -> Result<Vec<LearningItem>, GatewayError>;

    /// Items modified after `since` (delta pull).
    async fn fetch_items_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LearningItem>, GatewayError>;

    /// Write one item's progress to the remote store, keyed by item id.
    async fn write_progress(
        &self,
        item_id: ItemId,
        progress: &Progress,
    ) -> Result<(), GatewayError>;

    /// Collections owned by the user.
    async fn fetch_collections(&self, user: UserId) -> Result<Vec<Collection>, GatewayError>;
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        // Url::join treats a base without a trailing slash as a file and
        // replaces its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            bearer_token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

//
// ─── HTTP IMPLEMENTATION ───────────────────────────────────────────────────────
//

/// `RemoteGateway` backed by the progress-sync HTTP API.
#[derive(Clone)]
pub struct HttpRemoteGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpRemoteGateway {
    /// Build a gateway with a client enforcing the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Network` if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_item_list(&self, url: Url) -> Result<Vec<LearningItem>, GatewayError> {
        let response = self.authorize(self.client.get(url)).send().await?;
        let body: Vec<ItemDto> = decode_response(response).await?;
        body.into_iter().map(ItemDto::into_item).collect()
    }
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::AuthRequired),
        status if !status.is_success() => Err(GatewayError::Http(status)),
        _ => Ok(response.json::<T>().await?),
    }
}

async fn check_ack(response: reqwest::Response) -> Result<(), GatewayError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::AuthRequired),
        status if !status.is_success() => Err(GatewayError::Http(status)),
        _ => Ok(()),
    }
}

#[async_trait]
impl RemoteGateway for HttpRemoteGateway {
    async fn fetch_due_items(&self, user: UserId) -> Result<Vec<LearningItem>, GatewayError> {
        let mut url = self.endpoint(&format!("users/{user}/items"))?;
        url.query_pairs_mut().append_pair("due", "true");
        self.fetch_item_list(url).await
    }

    async fn fetch_all_items(&self, user: UserId) -> Result<Vec<LearningItem>, GatewayError> {
        let url = self.endpoint(&format!("users/{user}/items"))?;
        self.fetch_item_list(url).await
    }

    async fn fetch_items_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LearningItem>, GatewayError> {
        let mut url = self.endpoint(&format!("users/{user}/items"))?;
        url.query_pairs_mut()
            .append_pair("since", &since.to_rfc3339());
        self.fetch_item_list(url).await
    }

    async fn write_progress(
        &self,
        item_id: ItemId,
        progress: &Progress,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("items/{item_id}/progress"))?;
        let payload = ProgressDto::from_progress(progress);
        let response = self
            .authorize(self.client.put(url))
            .json(&payload)
            .send()
            .await?;
        check_ack(response).await
    }

    async fn fetch_collections(&self, user: UserId) -> Result<Vec<Collection>, GatewayError> {
        let url = self.endpoint(&format!("users/{user}/collections"))?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let body: Vec<CollectionDto> = decode_response(response).await?;
        Ok(body.into_iter().map(CollectionDto::into_collection).collect())
    }
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemDto {
    id: ItemId,
    owner_id: UserId,
    collection_id: CollectionId,
    term: String,
    definition: String,
    #[serde(default)]
    phonetic: Option<String>,
    progress: ProgressDto,
    created_at: DateTime<Utc>,
}

impl ItemDto {
    fn into_item(self) -> Result<LearningItem, GatewayError> {
        let progress = self.progress.into_progress();
        // The remote is authoritative but not trusted: invariant-violating
        // payloads are rejected instead of written into the local replica.
        progress
            .validate()
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
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

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressDto {
    easiness: f64,
    interval_days: u32,
    repetition_count: u32,
    next_review_date: NaiveDate,
    #[serde(default)]
    last_reviewed_at: Option<DateTime<Utc>>,
}

impl ProgressDto {
    fn from_progress(progress: &Progress) -> Self {
        Self {
            easiness: progress.easiness,
            interval_days: progress.interval_days,
            repetition_count: progress.repetition_count,
            next_review_date: progress.next_review_date,
            last_reviewed_at: progress.last_reviewed_at,
        }
    }

    fn into_progress(self) -> Progress {
        Progress {
            easiness: self.easiness,
            interval_days: self.interval_days,
            repetition_count: self.repetition_count,
            next_review_date: self.next_review_date,
            last_reviewed_at: self.last_reviewed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionDto {
    id: CollectionId,
    owner_id: UserId,
    name: String,
    item_count: u32,
    created_at: DateTime<Utc>,
}

impl CollectionDto {
    fn into_collection(self) -> Collection {
        Collection {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            item_count: self.item_count,
            created_at: self.created_at,
        }
    }
}

//
// ─── TEST SUPPORT ──────────────────────────────────────────────────────────────
//

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    /// Scripted in-process gateway for unit tests.
    ///
    /// Holds a remote item table keyed the same way the real store is, can
    /// fail on demand, records pushed progress, and can hold a fetch open
    /// to exercise overlap handling.
    #[derive(Default)]
    pub(crate) struct StubGateway {
        items: Mutex<Vec<LearningItem>>,
        collections: Mutex<Vec<Collection>>,
        fail_requests: AtomicBool,
        auth_expired: AtomicBool,
        written: Mutex<Vec<(ItemId, Progress)>>,
        fetch_gate: Mutex<Option<Arc<Notify>>>,
        fetch_count: Mutex<usize>,
    }

    impl StubGateway {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn seed_item(&self, item: LearningItem) {
            let mut guard = self.items.lock().unwrap();
            guard.retain(|existing| existing.id != item.id);
            guard.push(item);
        }

        pub(crate) fn seed_collection(&self, collection: Collection) {
            self.collections.lock().unwrap().push(collection);
        }

        pub(crate) fn set_fail_requests(&self, fail: bool) {
            self.fail_requests.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn set_auth_expired(&self, expired: bool) {
            self.auth_expired.store(expired, Ordering::SeqCst);
        }

        /// Make the next fetches wait until the returned handle is notified.
        pub(crate) fn hold_fetches(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.fetch_gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }

        pub(crate) fn release_fetches(&self) {
            *self.fetch_gate.lock().unwrap() = None;
        }

        pub(crate) fn written(&self) -> Vec<(ItemId, Progress)> {
            self.written.lock().unwrap().clone()
        }

        pub(crate) fn fetch_count(&self) -> usize {
            *self.fetch_count.lock().unwrap()
        }

        fn check_available(&self) -> Result<(), GatewayError> {
            if self.auth_expired.load(Ordering::SeqCst) {
                return Err(GatewayError::AuthRequired);
            }
            if self.fail_requests.load(Ordering::SeqCst) {
                return Err(GatewayError::Network("connection refused".into()));
            }
            Ok(())
        }

        async fn wait_for_gate(&self) {
            let gate = self.fetch_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl RemoteGateway for StubGateway {
        async fn fetch_due_items(&self, user: UserId) -> Result<Vec<LearningItem>, GatewayError> {
            self.check_available()?;
            self.wait_for_gate().await;
            *self.fetch_count.lock().unwrap() += 1;
            let guard = self.items.lock().unwrap();
            Ok(guard
                .iter()
                .filter(|item| item.owner_id == user)
                .cloned()
                .collect())
        }

        async fn fetch_all_items(&self, user: UserId) -> Result<Vec<LearningItem>, GatewayError> {
            self.fetch_due_items(user).await
        }

        async fn fetch_items_since(
            &self,
            user: UserId,
            since: DateTime<Utc>,
        ) -> Result<Vec<LearningItem>, GatewayError> {
            self.check_available()?;
            self.wait_for_gate().await;
            *self.fetch_count.lock().unwrap() += 1;
            let guard = self.items.lock().unwrap();
            Ok(guard
                .iter()
                .filter(|item| item.owner_id == user)
                .filter(|item| {
                    item.progress
                        .last_reviewed_at
                        .is_some_and(|reviewed| reviewed > since)
                })
                .cloned()
                .collect())
        }

        async fn write_progress(
            &self,
            item_id: ItemId,
            progress: &Progress,
        ) -> Result<(), GatewayError> {
            self.check_available()?;
            let mut guard = self.items.lock().unwrap();
            if let Some(item) = guard.iter_mut().find(|item| item.id == item_id) {
                item.progress = progress.clone();
            }
            self.written.lock().unwrap().push((item_id, progress.clone()));
            Ok(())
        }

        async fn fetch_collections(&self, user: UserId) -> Result<Vec<Collection>, GatewayError> {
            self.check_available()?;
            let guard = self.collections.lock().unwrap();
            Ok(guard
                .iter()
                .filter(|collection| collection.owner_id == user)
                .cloned()
                .collect())
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
