//! Session change notifications published by auth adapters.
//!
//! Adapters own a [`SessionBroadcaster`] and publish a [`SessionChange`]
//! whenever the active session is established, refreshed, or cleared. The
//! session store holds the matching [`SessionSubscription`] for its lifetime
//! and drops it on shutdown.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::identity::Session;

/// Buffered notifications per subscriber before lagging.
const CHANNEL_CAPACITY: usize = 32;

/// Kind of session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A transition together with the session that is now current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Sending half shared by adapter clones.
#[derive(Debug, Clone)]
pub struct SessionBroadcaster {
    sender: broadcast::Sender<SessionChange>,
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver a change to every live subscription. Having none is fine.
    pub fn publish(&self, change: SessionChange) {
        if self.sender.send(change).is_err() {
            debug!("session change published with no subscribers");
        }
    }

    /// Open a new subscription that sees changes published from now on.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving half held by the session store.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionChange>,
}

impl SessionSubscription {
    /// Wait for the next change. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SessionChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session subscription lagged; older changes dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take a change that is already queued, if any.
    pub fn try_recv(&mut self) -> Option<SessionChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "session subscription lagged; older changes dropped");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }

    /// Stop receiving. Equivalent to dropping the subscription.
    pub fn close(self) {}
}
