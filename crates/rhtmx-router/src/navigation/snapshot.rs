//! Observable route snapshots

use crate::lock;
use crate::route::Params;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// What observers see of the router
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteSnapshot {
    /// Committed absolute URL
    pub url: Option<String>,
    /// Pattern source of the committed route
    pub route: Option<String>,
    pub params: Params,
    /// Decoded query pairs, in URL order
    pub search: Vec<(String, String)>,
    pub is_navigating: bool,
}

pub type SnapshotListener = Arc<dyn Fn(&RouteSnapshot) + Send + Sync>;

/// Handle returned by [`Navigator::subscribe`](super::Navigator::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct Observers {
    listeners: Mutex<Vec<(SubscriptionId, SnapshotListener)>>,
    next_id: AtomicU64,
    last: Mutex<RouteSnapshot>,
}

impl Observers {
    /// Register a listener; it immediately receives the latest snapshot
    pub fn subscribe(&self, listener: SnapshotListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let last = lock(&self.last).clone();
        listener(&last);
        lock(&self.listeners).push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        listeners.len() != before
    }

    pub fn publish(&self, snapshot: RouteSnapshot) {
        tracing::trace!("Publishing snapshot: {:?}", snapshot);
        *lock(&self.last) = snapshot.clone();
        // Listeners may subscribe or unsubscribe while being notified
        let listeners: Vec<SnapshotListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    pub fn last(&self) -> RouteSnapshot {
        lock(&self.last).clone()
    }
}
