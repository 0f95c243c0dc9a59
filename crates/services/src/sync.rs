use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use storage::repository::{ItemRepository, SyncStateRepository};
use vocab_core::{
    Clock,
    model::{SyncOutcome, UserId},
};

use crate::gateway::RemoteGateway;
use crate::network::NetworkMonitor;

/// Default cadence of the periodic sync trigger.
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(5 * 60);

//
// ─── SYNC SERVICE ──────────────────────────────────────────────────────────────
//

/// Keeps the local replica and the remote store convergent without blocking
/// the review flow.
///
/// Reconciliation is at-least-once and idempotent: writes are keyed by item
/// id and conflicts resolve last-write-wins by `last_reviewed_at`, so
/// re-running the same delta window cannot corrupt state. Overlapping
/// triggers are dropped while an attempt is in flight; the in-flight
/// attempt is trusted to cover the dropped trigger's intent.
///
/// Failures never propagate as errors. Sync is best-effort background work;
/// each attempt folds into a [`SyncOutcome`] that the UI observes
/// passively.
#[derive(Clone)]
pub struct SyncService {
    clock: Clock,
    gateway: Arc<dyn RemoteGateway>,
    items: Arc<dyn ItemRepository>,
    sync_state: Arc<dyn SyncStateRepository>,
    in_flight: Arc<AtomicBool>,
    latest: Arc<watch::Sender<Option<SyncOutcome>>>,
    period: Duration,
}

impl SyncService {
    #[must_use]
    pub fn new(
        clock: Clock,
        gateway: Arc<dyn RemoteGateway>,
        items: Arc<dyn ItemRepository>,
        sync_state: Arc<dyn SyncStateRepository>,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            clock,
            gateway,
            items,
            sync_state,
            in_flight: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(latest),
            period: DEFAULT_SYNC_PERIOD,
        }
    }

    /// Override the periodic trigger cadence.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Latest reconciliation outcome, if any attempt has finished.
    #[must_use]
    pub fn latest_outcome(&self) -> Option<SyncOutcome> {
        self.latest.borrow().clone()
    }

    /// Subscribe to reconciliation outcomes as they are published.
    #[must_use]
    pub fn subscribe_outcomes(&self) -> watch::Receiver<Option<SyncOutcome>> {
        self.latest.subscribe()
    }

    /// Run one reconciliation attempt.
    ///
    /// Returns `None` when nothing ran: either no user is signed in (a
    /// no-op, not an error) or an attempt is already in flight and this
    /// trigger was dropped.
    pub async fn perform_sync(&self, user: Option<UserId>) -> Option<SyncOutcome> {
        let Some(user) = user else {
            log::debug!("sync skipped: no signed-in user");
            return None;
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("sync trigger dropped: reconciliation already in flight");
            return None;
        }

        let outcome = self.reconcile(user).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match &outcome.error {
            None => log::info!(
                "sync finished: pulled {} pushed {}",
                outcome.items_pulled,
                outcome.items_pushed
            ),
            Some(error) => log::warn!("sync failed: {error}"),
        }

        self.latest.send_replace(Some(outcome.clone()));
        Some(outcome)
    }

    /// Pull the remote delta, merge last-write-wins, push newer local
    /// records, then advance the checkpoint.
    ///
    /// Any failure aborts the remaining steps and leaves the checkpoint
    /// untouched, so the next trigger retries the same delta window.
    async fn reconcile(&self, user: UserId) -> SyncOutcome {
        // The checkpoint is advanced to the start time, not the finish
        // time, so records mutated mid-sync land in the next delta window.
        let started_at = self.clock.now();

        let since = match self.sync_state.last_synced_at(user).await {
            Ok(since) => since,
            Err(err) => return SyncOutcome::failed(err.to_string(), self.clock.now()),
        };

        // First reconciliation has no checkpoint and pulls everything.
        let fetched = match since {
            Some(checkpoint) => self.gateway.fetch_items_since(user, checkpoint).await,
            None => self.gateway.fetch_all_items(user).await,
        };
        let remote_delta = match fetched {
            Ok(items) => items,
            Err(err) => return SyncOutcome::failed(err.to_string(), self.clock.now()),
        };

        let mut items_pulled = 0;
        let mut pulled_ids = HashSet::new();
        for remote in remote_delta {
            let local = match self.items.get_item(remote.id).await {
                Ok(local) => local,
                Err(err) => return SyncOutcome::failed(err.to_string(), self.clock.now()),
            };

            let remote_wins = match &local {
                Some(local) => remote.progress.supersedes(&local.progress),
                None => true,
            };
            if remote_wins {
                if let Err(err) = self.items.upsert_item(&remote).await {
                    return SyncOutcome::failed(err.to_string(), self.clock.now());
                }
                pulled_ids.insert(remote.id);
                items_pulled += 1;
            }
        }

        let locals = match self.items.list_items(user).await {
            Ok(locals) => locals,
            Err(err) => return SyncOutcome::failed(err.to_string(), self.clock.now()),
        };

        let mut items_pushed = 0;
        for item in locals {
            // Records that just arrived from the remote need no echo.
            if pulled_ids.contains(&item.id) {
                continue;
            }
            let newer_than_checkpoint = item
                .progress
                .last_reviewed_at
                .is_some_and(|reviewed| since.is_none_or(|checkpoint| reviewed > checkpoint));
            if !newer_than_checkpoint {
                continue;
            }

            if let Err(err) = self.gateway.write_progress(item.id, &item.progress).await {
                return SyncOutcome::failed(err.to_string(), self.clock.now());
            }
            items_pushed += 1;
        }

        if let Err(err) = self.sync_state.set_last_synced_at(user, started_at).await {
            return SyncOutcome::failed(err.to_string(), self.clock.now());
        }

        SyncOutcome::ok(items_pulled, items_pushed, self.clock.now())
    }

    //
    // ─── TRIGGERS ──────────────────────────────────────────────────────────
    //

    /// Spawn the periodic trigger. The first attempt fires one period from
    /// now. Abort the handle to stop.
    #[must_use]
    pub fn spawn_periodic(&self, user: UserId) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; consume it so
            // the cadence starts one period from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                service.perform_sync(Some(user)).await;
            }
        })
    }

    /// Spawn the reconnect trigger: one attempt per offline→online
    /// transition. Abort the handle to stop.
    #[must_use]
    pub fn spawn_reconnect_listener(&self, user: UserId, monitor: &NetworkMonitor) -> JoinHandle<()> {
        let mut connectivity = monitor.subscribe();
        // Read the starting state before spawning so a transition fired
        // right after this call is still seen as a transition.
        let mut was_online = *connectivity.borrow();
        let service = self.clone();
        tokio::spawn(async move {
            while connectivity.changed().await.is_ok() {
                let online = *connectivity.borrow_and_update();
                if online && !was_online {
                    log::debug!("network restored, triggering sync");
                    service.perform_sync(Some(user)).await;
                }
                was_online = online;
            }
        })
    }

    /// App-foreground hook; runs one attempt subject to the in-flight
    /// guard.
    pub async fn notify_foreground(&self, user: Option<UserId>) -> Option<SyncOutcome> {
        self.perform_sync(user).await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
