use std::sync::Arc;

use tokio::sync::watch;

/// Connectivity state shared between the host platform and the engine.
///
/// The platform layer reports transitions via [`set_online`]; the engine
/// reads the current state and subscribes to changes. Dropping a receiver
/// unsubscribes it.
///
/// [`set_online`]: NetworkMonitor::set_online
#[derive(Clone)]
pub struct NetworkMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (sender, _receiver) = watch::channel(initially_online);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Report the current connectivity state.
    pub fn set_online(&self, online: bool) {
        self.state.send_replace(online);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Subscribe to connectivity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
