use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use storage::repository::ItemRepository;
use vocab_core::{
    Clock,
    model::{AssessmentLevel, ItemId, LearningItem, UserId},
};

use crate::error::SessionError;
use crate::gateway::RemoteGateway;
use crate::network::NetworkMonitor;
use crate::review_service::ReviewService;

//
// ─── SNAPSHOTS ─────────────────────────────────────────────────────────────────
//

/// Lifecycle of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Active,
    Complete,
}

/// Snapshot of session progress for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// Presentations in this sitting, including re-queued failures.
    pub total: usize,
    /// Assessments recorded so far.
    pub answered: usize,
    /// Presentations still ahead.
    pub remaining: usize,
    /// Failed items waiting to be shown again this sitting.
    pub deferred: usize,
    pub is_complete: bool,
}

/// Result of recording one assessment within the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedReview {
    pub item_id: ItemId,
    pub assessment: AssessmentLevel,
    /// True when the item was re-queued for another pass this sitting.
    pub deferred: bool,
    pub is_complete: bool,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// One sitting's worth of review state. Ephemeral: never persisted, never
/// synced, discarded whole on exit.
struct ReviewSession {
    queue: Vec<LearningItem>,
    current: usize,
    completed_count: usize,
    again_queue: VecDeque<ItemId>,
    started_at: DateTime<Utc>,
}

impl ReviewSession {
    fn new(queue: Vec<LearningItem>, started_at: DateTime<Utc>) -> Self {
        Self {
            queue,
            current: 0,
            completed_count: 0,
            again_queue: VecDeque::new(),
            started_at,
        }
    }

    fn progress(&self, is_complete: bool) -> SessionProgress {
        SessionProgress {
            total: self.queue.len(),
            answered: self.completed_count,
            remaining: self.queue.len().saturating_sub(self.current),
            deferred: self.again_queue.len(),
            is_complete,
        }
    }
}

enum ControllerState {
    Idle,
    Loading,
    Active(ReviewSession),
    Complete(ReviewSession),
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Sequences one sitting of due items through a bounded state machine:
/// `Idle → Loading → Active → Complete`.
///
/// The controller owns its `ReviewSession` exclusively; UI layers holding
/// the controller behind an async mutex get one assessment at a time, so a
/// call can never race an unresolved predecessor.
///
/// An item assessed `Again` is re-queued at the end of the current queue
/// with its just-reset progress and must be answered again before the
/// session completes.
pub struct SessionController {
    clock: Clock,
    gateway: Arc<dyn RemoteGateway>,
    items: Arc<dyn ItemRepository>,
    monitor: NetworkMonitor,
    review_service: ReviewService,
    shuffle: bool,
    state: ControllerState,
}

impl SessionController {
    #[must_use]
    pub fn new(
        clock: Clock,
        gateway: Arc<dyn RemoteGateway>,
        items: Arc<dyn ItemRepository>,
        monitor: NetworkMonitor,
    ) -> Self {
        Self {
            clock,
            gateway,
            items,
            monitor,
            review_service: ReviewService::new(clock),
            shuffle: false,
            state: ControllerState::Idle,
        }
    }

    /// Enable or disable shuffling of the queue at session start.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self.state {
            ControllerState::Idle => SessionPhase::Idle,
            ControllerState::Loading => SessionPhase::Loading,
            ControllerState::Active(_) => SessionPhase::Active,
            ControllerState::Complete(_) => SessionPhase::Complete,
        }
    }

    /// The item currently awaiting an assessment.
    #[must_use]
    pub fn current_item(&self) -> Option<&LearningItem> {
        match &self.state {
            ControllerState::Active(session) => session.queue.get(session.current),
            _ => None,
        }
    }

    /// Progress snapshot, available while a session exists.
    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        match &self.state {
            ControllerState::Active(session) => Some(session.progress(false)),
            ControllerState::Complete(session) => Some(session.progress(true)),
            _ => None,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ControllerState::Active(session) | ControllerState::Complete(session) => {
                Some(session.started_at)
            }
            _ => None,
        }
    }

    /// Start a sitting for the user's due items.
    ///
    /// Fetches due items from the remote gateway, falling back to the local
    /// store when offline or when the remote fails transiently. Returns the
    /// number of items queued; zero means nothing was due and the
    /// controller stayed `Idle` — that is a defined edge case, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyActive` if a session exists.
    /// Returns `SessionError::Load` or `SessionError::Storage` if due items
    /// cannot be loaded; the controller returns to `Idle` and never enters
    /// `Active` with partial data.
    pub async fn start_session(&mut self, user: UserId) -> Result<usize, SessionError> {
        match self.state {
            ControllerState::Idle => {}
            _ => return Err(SessionError::AlreadyActive),
        }

        self.state = ControllerState::Loading;
        match self.load_due_items(user).await {
            Ok(queue) if queue.is_empty() => {
                self.state = ControllerState::Idle;
                Ok(0)
            }
            Ok(mut queue) => {
                if self.shuffle {
                    queue.shuffle(&mut rand::rng());
                }
                let count = queue.len();
                self.state = ControllerState::Active(ReviewSession::new(queue, self.clock.now()));
                Ok(count)
            }
            Err(err) => {
                self.state = ControllerState::Idle;
                Err(err)
            }
        }
    }

    async fn load_due_items(&self, user: UserId) -> Result<Vec<LearningItem>, SessionError> {
        let today = self.clock.today();

        if !self.monitor.is_online() {
            log::debug!("offline, loading due items from the local store");
            return Ok(self.items.due_items(user, today).await?);
        }

        match self.gateway.fetch_due_items(user).await {
            Ok(fetched) => {
                let mut queue = Vec::with_capacity(fetched.len());
                for remote in fetched {
                    // The local replica wins unless the remote carries a
                    // strictly newer review.
                    let item = match self.items.get_item(remote.id).await? {
                        Some(local) if !remote.progress.supersedes(&local.progress) => local,
                        _ => {
                            self.items.upsert_item(&remote).await?;
                            remote
                        }
                    };
                    if item.is_due(today) {
                        queue.push(item);
                    }
                }
                Ok(queue)
            }
            Err(err) if err.is_transient() => {
                log::warn!("due-items fetch failed ({err}), falling back to the local store");
                Ok(self.items.due_items(user, today).await?)
            }
            Err(err) => Err(SessionError::Load(err)),
        }
    }

    /// Record an assessment for the given item and advance.
    ///
    /// `item_id` must name the item currently being presented; a stale id
    /// is rejected without touching the queue. The new progress is
    /// persisted write-through before the queue advances; on a storage
    /// failure the queue position is unchanged and the same item can be
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside an active session,
    /// `SessionError::Completed` if the sitting already finished,
    /// `SessionError::WrongItem` for a stale id, and
    /// `SessionError::Review` if persisting the assessment failed.
    pub async fn submit_assessment(
        &mut self,
        item_id: ItemId,
        assessment: AssessmentLevel,
    ) -> Result<SubmittedReview, SessionError> {
        let session = match &mut self.state {
            ControllerState::Active(session) => session,
            ControllerState::Complete(_) => return Err(SessionError::Completed),
            _ => return Err(SessionError::NotActive),
        };

        let Some(item) = session.queue.get_mut(session.current) else {
            return Err(SessionError::Completed);
        };
        if item.id != item_id {
            return Err(SessionError::WrongItem {
                submitted: item_id,
                current: item.id,
            });
        }

        let applied = self
            .review_service
            .apply_assessment(item, assessment, self.items.as_ref())
            .await?;

        let reviewed = item.clone();
        session.completed_count += 1;
        session.current += 1;

        // This presentation settles any earlier deferral of the same item.
        session.again_queue.retain(|&id| id != reviewed.id);

        let deferred = assessment == AssessmentLevel::Again;
        if deferred {
            session.again_queue.push_back(reviewed.id);
            session.queue.push(reviewed);
        }

        let is_complete = session.current >= session.queue.len();
        let result = SubmittedReview {
            item_id: applied.item_id,
            assessment,
            deferred,
            is_complete,
        };

        if is_complete {
            if let ControllerState::Active(session) =
                std::mem::replace(&mut self.state, ControllerState::Idle)
            {
                self.state = ControllerState::Complete(session);
            }
        }

        Ok(result)
    }

    /// Discard the session and return to `Idle`.
    ///
    /// Writes already dispatched are not cancelled; only the session state
    /// is dropped. Nothing about the sitting is persisted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` if there is no session to end.
    pub fn end_session(&mut self) -> Result<(), SessionError> {
        match self.state {
            ControllerState::Active(_) | ControllerState::Complete(_) => {
                self.state = ControllerState::Idle;
                Ok(())
            }
            _ => Err(SessionError::NotActive),
        }
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("SessionController");
        builder.field("phase", &self.phase());
        if let Some(progress) = self.progress() {
            builder.field("progress", &progress);
        }
        builder.finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::testing::StubGateway;
    use chrono::Duration;
    use storage::repository::InMemoryRepository;
    use vocab_core::model::CollectionId;
    use vocab_core::time::{fixed_clock, fixed_now};

    struct Harness {
        gateway: Arc<StubGateway>,
        repo: InMemoryRepository,
        controller: SessionController,
        user: UserId,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(StubGateway::new());
        let repo = InMemoryRepository::new();
        let controller = SessionController::new(
            fixed_clock(),
            Arc::clone(&gateway) as Arc<dyn RemoteGateway>,
            Arc::new(repo.clone()),
            NetworkMonitor::new(true),
        );
        Harness {
            gateway,
            repo,
            controller,
            user: UserId::generate(),
        }
    }

    fn build_item(user: UserId, term: &str) -> LearningItem {
        LearningItem::new(
            ItemId::generate(),
            user,
            CollectionId::generate(),
            term,
            "definition",
            fixed_now(),
        )
    }

    /// Assess whatever item is currently presented.
    async fn answer(
        controller: &mut SessionController,
        assessment: AssessmentLevel,
    ) -> Result<SubmittedReview, SessionError> {
        let id = controller
            .current_item()
            .map_or_else(ItemId::generate, |item| item.id);
        controller.submit_assessment(id, assessment).await
    }

    #[tokio::test]
    async fn empty_due_list_keeps_controller_idle() {
        let mut h = harness();
        let count = h.controller.start_session(h.user).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(h.controller.progress().is_none());
    }

    #[tokio::test]
    async fn session_completes_after_n_successful_assessments() {
        let mut h = harness();
        for term in ["uno", "dos", "tres"] {
            h.gateway.seed_item(build_item(h.user, term));
        }

        let count = h.controller.start_session(h.user).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(h.controller.phase(), SessionPhase::Active);

        for _ in 0..3 {
            answer(&mut h.controller, AssessmentLevel::Good)
                .await
                .unwrap();
        }

        assert_eq!(h.controller.phase(), SessionPhase::Complete);
        let progress = h.controller.progress().unwrap();
        assert_eq!(progress.answered, 3);
        assert_eq!(progress.remaining, 0);
        assert!(progress.is_complete);
    }

    #[tokio::test]
    async fn again_defers_item_to_end_of_queue() {
        let mut h = harness();
        let failed = build_item(h.user, "difícil");
        h.gateway.seed_item(failed.clone());
        h.gateway.seed_item(build_item(h.user, "fácil"));

        h.controller.start_session(h.user).await.unwrap();
        let first_id = h.controller.current_item().unwrap().id;

        let review = answer(&mut h.controller, AssessmentLevel::Again)
            .await
            .unwrap();
        assert!(review.deferred);
        assert!(!review.is_complete);

        let progress = h.controller.progress().unwrap();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.deferred, 1);

        // Second item comes up next; the failed one returns at the end.
        let second = answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap();
        assert!(!second.is_complete);

        let replay = h.controller.current_item().unwrap();
        assert_eq!(replay.id, first_id);
        // The re-presented copy carries the reset progress.
        assert_eq!(replay.progress.repetition_count, 0);
        assert_eq!(replay.progress.interval_days, 0);

        let last = answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap();
        assert!(last.is_complete);
        assert_eq!(h.controller.phase(), SessionPhase::Complete);
        assert_eq!(h.controller.progress().unwrap().deferred, 0);
    }

    #[tokio::test]
    async fn failed_write_does_not_advance_queue() {
        let mut h = harness();
        h.gateway.seed_item(build_item(h.user, "uno"));
        h.gateway.seed_item(build_item(h.user, "dos"));

        h.controller.start_session(h.user).await.unwrap();
        let current_id = h.controller.current_item().unwrap().id;

        h.repo.set_fail_writes(true);
        let err = answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Review(_)));
        assert!(err.is_retryable());

        // Queue position unchanged; the same item can be retried.
        assert_eq!(h.controller.current_item().unwrap().id, current_id);
        assert_eq!(h.controller.progress().unwrap().answered, 0);

        h.repo.set_fail_writes(false);
        let review = answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap();
        assert_eq!(review.item_id, current_id);
    }

    #[tokio::test]
    async fn offline_start_falls_back_to_local_store() {
        let gateway = Arc::new(StubGateway::new());
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        let local_item = build_item(user, "local");
        repo.upsert_item(&local_item).await.unwrap();

        let monitor = NetworkMonitor::new(false);
        let mut controller = SessionController::new(
            fixed_clock(),
            Arc::clone(&gateway) as Arc<dyn RemoteGateway>,
            Arc::new(repo.clone()),
            monitor,
        );

        let count = controller.start_session(user).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(controller.current_item().unwrap().id, local_item.id);
        // The gateway was never consulted.
        assert_eq!(gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn transient_fetch_failure_falls_back_to_local_store() {
        let mut h = harness();
        let local_item = build_item(h.user, "local");
        h.repo.upsert_item(&local_item).await.unwrap();
        h.gateway.set_fail_requests(true);

        let count = h.controller.start_session(h.user).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(h.controller.phase(), SessionPhase::Active);
    }

    #[tokio::test]
    async fn auth_failure_surfaces_and_returns_to_idle() {
        let mut h = harness();
        h.gateway.set_auth_expired(true);

        let err = h.controller.start_session(h.user).await.unwrap_err();
        assert!(matches!(err, SessionError::Load(GatewayError::AuthRequired)));
        assert!(!err.is_retryable());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn remote_snapshot_does_not_clobber_newer_local_progress() {
        let mut h = harness();

        // Local copy was reviewed five minutes after the remote snapshot.
        let mut remote = build_item(h.user, "palabra");
        remote.progress.last_reviewed_at = Some(fixed_now() - Duration::minutes(10));
        let mut local = remote.clone();
        local.progress.repetition_count = 1;
        local.progress.interval_days = 0;
        local.progress.last_reviewed_at = Some(fixed_now() - Duration::minutes(5));

        h.gateway.seed_item(remote);
        h.repo.upsert_item(&local).await.unwrap();

        h.controller.start_session(h.user).await.unwrap();
        let queued = h.controller.current_item().unwrap();
        assert_eq!(queued.progress.repetition_count, 1);

        let stored = h.repo.get_item(local.id).await.unwrap().unwrap();
        assert_eq!(stored.progress.repetition_count, 1);
    }

    #[tokio::test]
    async fn end_session_discards_state_from_active_and_complete() {
        let mut h = harness();
        h.gateway.seed_item(build_item(h.user, "uno"));

        h.controller.start_session(h.user).await.unwrap();
        h.controller.end_session().unwrap();
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(h.controller.progress().is_none());

        h.controller.start_session(h.user).await.unwrap();
        answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap();
        assert_eq!(h.controller.phase(), SessionPhase::Complete);
        h.controller.end_session().unwrap();
        assert_eq!(h.controller.phase(), SessionPhase::Idle);

        let err = h.controller.end_session().unwrap_err();
        assert!(matches!(err, SessionError::NotActive));
    }

    #[tokio::test]
    async fn submit_outside_active_session_is_rejected() {
        let mut h = harness();
        let err = answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotActive));

        h.gateway.seed_item(build_item(h.user, "uno"));
        h.controller.start_session(h.user).await.unwrap();
        answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap();

        let err = answer(&mut h.controller, AssessmentLevel::Good)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Completed));
    }

    #[tokio::test]
    async fn stale_item_id_is_rejected_without_advancing() {
        let mut h = harness();
        h.gateway.seed_item(build_item(h.user, "uno"));
        h.controller.start_session(h.user).await.unwrap();

        let current_id = h.controller.current_item().unwrap().id;
        let stale = ItemId::generate();
        let err = h
            .controller
            .submit_assessment(stale, AssessmentLevel::Good)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::WrongItem { submitted, current }
                if submitted == stale && current == current_id
        ));
        assert_eq!(h.controller.progress().unwrap().answered, 0);
        assert_eq!(h.controller.current_item().unwrap().id, current_id);
    }

    #[tokio::test]
    async fn starting_while_active_is_rejected() {
        let mut h = harness();
        h.gateway.seed_item(build_item(h.user, "uno"));
        h.controller.start_session(h.user).await.unwrap();

        let err = h.controller.start_session(h.user).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyActive));
        // The active session is untouched.
        assert_eq!(h.controller.phase(), SessionPhase::Active);
    }
}
