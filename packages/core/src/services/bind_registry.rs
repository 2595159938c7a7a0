//! Bind Registry
//!
//! Per-node listener sets multiplexed over a single store subscription.
//!
//! # State Machine (per node id)
//!
//! - `Unbound -> Bound`: first listener; the caller that created the entry must open the
//!   store subscription (`BindOutcome::SubscribeNeeded`).
//! - `Bound -> Bound`: more listeners, or removals that leave the set non-empty.
//! - `Bound -> Unbound`: last listener removed; the entry is dropped and the active
//!   subscription, if any, is handed back for teardown.
//!
//! Subscribing is async, so an entry can be emptied (or emptied and re-created) while
//! its subscription is still being opened. Each entry carries a generation number;
//! `activate` only accepts a subscription for the generation that requested it and
//! otherwise hands it back to be closed. This keeps at most one live subscription per id.
//!
//! Callers joining an entry whose subscription is still pending get a
//! `PendingSubscription` and must wait for it before treating the bind as live. When the
//! subscription fails, `abandon` drops the entry and every waiter resolves to `false`.

use crate::models::{NodeInfo, SubscriptionId};
use crate::services::listeners::{self, ListenerToken};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Per-node bind callback, invoked with the freshly refreshed projection
pub type BindCallback = Arc<dyn Fn(&Arc<NodeInfo>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionState {
    Pending,
    Active(SubscriptionId),
}

/// Outcome of opening the store subscription of a bound node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Failed,
}

struct BoundNode {
    generation: u64,
    listeners: Vec<(ListenerToken, BindCallback)>,
    subscription: SubscriptionState,
    status: watch::Sender<SubscriptionStatus>,
}

/// What the binding caller has to do next
#[derive(Debug)]
pub enum BindOutcome {
    /// Entry existed with an open subscription; nothing else to do
    Joined,
    /// Entry existed but another caller is still opening its subscription
    Pending(PendingSubscription),
    /// Entry was created; open a subscription and `activate` it with this generation
    SubscribeNeeded { generation: u64 },
}

/// Handle on a subscription another caller is opening
#[derive(Debug)]
pub struct PendingSubscription {
    status: watch::Receiver<SubscriptionStatus>,
}

impl PendingSubscription {
    /// Wait until the subscription is resolved
    ///
    /// `true` once it is open. `false` if it failed or the entry was dropped first.
    pub async fn opened(mut self) -> bool {
        let resolved = self
            .status
            .wait_for(|status| *status != SubscriptionStatus::Pending)
            .await
            .map(|status| *status);
        matches!(resolved, Ok(SubscriptionStatus::Active))
    }
}

#[derive(Default)]
pub struct BindRegistry {
    bound: Mutex<HashMap<String, BoundNode>>,
    next_generation: Mutex<u64>,
}

impl BindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) `caller`'s callback for `node_id`
    pub fn bind(
        &self,
        node_id: &str,
        caller: ListenerToken,
        callback: BindCallback,
    ) -> BindOutcome {
        let mut bound = self.bound.lock();
        if let Some(entry) = bound.get_mut(node_id) {
            listeners::upsert(&mut entry.listeners, caller, callback);
            return match entry.subscription {
                SubscriptionState::Active(_) => BindOutcome::Joined,
                SubscriptionState::Pending => BindOutcome::Pending(PendingSubscription {
                    status: entry.status.subscribe(),
                }),
            };
        }

        let generation = {
            let mut next = self.next_generation.lock();
            *next += 1;
            *next
        };
        let (status, _) = watch::channel(SubscriptionStatus::Pending);
        bound.insert(
            node_id.to_string(),
            BoundNode {
                generation,
                listeners: vec![(caller, callback)],
                subscription: SubscriptionState::Pending,
                status,
            },
        );
        tracing::debug!("Node {} bound (generation {})", node_id, generation);
        BindOutcome::SubscribeNeeded { generation }
    }

    /// Record the subscription opened for `generation`
    ///
    /// Returns `Some(subscription)` when the entry is gone or belongs to a newer
    /// generation; the caller must then close that subscription.
    pub fn activate(
        &self,
        node_id: &str,
        generation: u64,
        subscription: SubscriptionId,
    ) -> Option<SubscriptionId> {
        let mut bound = self.bound.lock();
        match bound.get_mut(node_id) {
            Some(entry)
                if entry.generation == generation
                    && entry.subscription == SubscriptionState::Pending =>
            {
                entry.subscription = SubscriptionState::Active(subscription);
                entry.status.send_replace(SubscriptionStatus::Active);
                None
            }
            _ => Some(subscription),
        }
    }

    /// Drop the entry for `generation` after its subscription failed to open
    ///
    /// Listeners that joined while the subscription was pending are dropped with it.
    pub fn abandon(&self, node_id: &str, generation: u64) {
        let mut bound = self.bound.lock();
        if !bound
            .get(node_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            return;
        }
        if let Some(entry) = bound.remove(node_id) {
            entry.status.send_replace(SubscriptionStatus::Failed);
        }
    }

    /// Remove `caller`'s callback for `node_id`
    ///
    /// Returns `(removed, subscription_to_close)`. The subscription is only handed back
    /// when the listener set became empty and the subscription was already active; a
    /// pending one is closed by `activate`'s caller instead.
    pub fn unbind(&self, node_id: &str, caller: ListenerToken) -> (bool, Option<SubscriptionId>) {
        let mut bound = self.bound.lock();
        let Some(entry) = bound.get_mut(node_id) else {
            return (false, None);
        };
        let removed = listeners::remove(&mut entry.listeners, caller);
        if !entry.listeners.is_empty() {
            return (removed, None);
        }

        let subscription = entry.subscription;
        bound.remove(node_id);
        tracing::debug!("Node {} unbound", node_id);
        match subscription {
            SubscriptionState::Active(id) => (removed, Some(id)),
            SubscriptionState::Pending => (removed, None),
        }
    }

    /// Callbacks currently bound to `node_id`, in registration order
    pub fn listeners(&self, node_id: &str) -> Vec<(ListenerToken, BindCallback)> {
        self.bound
            .lock()
            .get(node_id)
            .map(|entry| entry.listeners.clone())
            .unwrap_or_default()
    }

    pub fn is_bound(&self, node_id: &str) -> bool {
        self.bound.lock().contains_key(node_id)
    }

    /// Number of node ids with at least one listener
    pub fn bound_count(&self) -> usize {
        self.bound.lock().len()
    }

    /// Drop every entry and return the subscriptions that were open
    pub fn drain(&self) -> Vec<(String, SubscriptionId)> {
        self.bound
            .lock()
            .drain()
            .filter_map(|(node_id, entry)| match entry.subscription {
                SubscriptionState::Active(subscription) => Some((node_id, subscription)),
                SubscriptionState::Pending => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GraphStore, InMemoryGraphStore};
    use crate::models::Attributes;
    use tokio_test::block_on;

    fn noop() -> BindCallback {
        Arc::new(|_: &Arc<NodeInfo>| {})
    }

    async fn subscription() -> SubscriptionId {
        let store = InMemoryGraphStore::new();
        let node = store.create_node(Attributes::new(), None).await.unwrap();
        store.subscribe(node.id(), Arc::new(|_: &str| {})).await.unwrap()
    }

    fn subscribe_needed(outcome: BindOutcome) -> u64 {
        match outcome {
            BindOutcome::SubscribeNeeded { generation } => generation,
            other => panic!("expected a subscription request, got {:?}", other),
        }
    }

    fn pending(outcome: BindOutcome) -> PendingSubscription {
        match outcome {
            BindOutcome::Pending(pending) => pending,
            other => panic!("expected a pending subscription, got {:?}", other),
        }
    }

    #[test]
    fn test_first_bind_requests_subscription_and_last_unbind_returns_it() {
        let registry = BindRegistry::new();
        let (a, b, c) = (ListenerToken::new(), ListenerToken::new(), ListenerToken::new());

        let generation = subscribe_needed(registry.bind("n", a, noop()));
        let waiting = pending(registry.bind("n", b, noop()));

        let sub = block_on(subscription());
        assert_eq!(registry.activate("n", generation, sub), None);
        assert!(block_on(waiting.opened()));
        assert!(matches!(registry.bind("n", c, noop()), BindOutcome::Joined));

        assert_eq!(registry.unbind("n", a), (true, None));
        assert_eq!(registry.unbind("n", c), (true, None));
        assert_eq!(registry.unbind("n", b), (true, Some(sub)));
        assert!(!registry.is_bound("n"));
    }

    #[test]
    fn test_abandon_fails_every_pending_joiner() {
        let registry = BindRegistry::new();
        let generation = subscribe_needed(registry.bind("n", ListenerToken::new(), noop()));
        let first = pending(registry.bind("n", ListenerToken::new(), noop()));
        let second = pending(registry.bind("n", ListenerToken::new(), noop()));

        registry.abandon("n", generation);

        assert!(!block_on(first.opened()));
        assert!(!block_on(second.opened()));
        assert!(!registry.is_bound("n"));
        assert!(registry.listeners("n").is_empty());
    }

    #[test]
    fn test_stale_generation_subscription_is_handed_back() {
        let registry = BindRegistry::new();
        let a = ListenerToken::new();

        let first = subscribe_needed(registry.bind("n", a, noop()));
        // Emptied while pending: nothing to close yet
        assert_eq!(registry.unbind("n", a), (true, None));
        // Re-bound under a new generation
        let second = subscribe_needed(registry.bind("n", a, noop()));
        assert_ne!(first, second);

        // A late failure of the old generation leaves the new entry alone
        registry.abandon("n", first);
        assert!(registry.is_bound("n"));

        let stale = block_on(subscription());
        assert_eq!(registry.activate("n", first, stale), Some(stale));

        let fresh = block_on(subscription());
        assert_eq!(registry.activate("n", second, fresh), None);
        assert_eq!(registry.drain(), vec![("n".to_string(), fresh)]);
        assert_eq!(registry.bound_count(), 0);
    }

    #[test]
    fn test_rebind_same_caller_keeps_single_listener() {
        let registry = BindRegistry::new();
        let a = ListenerToken::new();
        registry.bind("n", a, noop());
        registry.bind("n", a, noop());
        assert_eq!(registry.listeners("n").len(), 1);
        assert_eq!(registry.unbind("other", a), (false, None));
    }
}
