//! Per-node binds.
//!
//! The first bind on an id opens one store subscription whose handler fans out to every
//! bound listener; the last unbind closes it. The fan-out refreshes the node's info
//! projection before any listener runs, and listeners receive that refreshed projection.
//!
//! A bind that joins an id whose subscription is still being opened waits for it, so a
//! returned `BindHandle` always refers to a live subscription.
//!
//! The store handler holds only a `Weak` reference to the directory, so a dropped
//! directory does not stay alive through its own subscriptions. Dropping the last
//! directory handle closes the subscriptions that are still open.

use super::{DirectoryInner, GraphDirectory};
use crate::models::{ChangeHandler, NodeInfo, SubscriptionId};
use crate::services::bind_registry::{BindCallback, BindOutcome};
use crate::services::listeners::{self, ListenerToken};
use std::sync::{Arc, Weak};

/// Unbind capability returned by `GraphDirectory::bind_node`
///
/// Tied to one `(node id, caller)` pair. Dropping the handle does not unbind.
#[derive(Clone)]
pub struct BindHandle {
    directory: Weak<DirectoryInner>,
    node_id: String,
    caller: ListenerToken,
}

impl std::fmt::Debug for BindHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindHandle")
            .field("node_id", &self.node_id)
            .field("caller", &self.caller)
            .finish()
    }
}

impl BindHandle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn caller(&self) -> ListenerToken {
        self.caller
    }

    /// Remove this caller's listener. Returns `false` if it was already gone.
    pub async fn unbind(self) -> bool {
        match self.directory.upgrade() {
            Some(inner) => inner.unbind(&self.node_id, self.caller).await,
            None => false,
        }
    }
}

impl DirectoryInner {
    /// Store handler dispatching change notifications for one node to its listeners
    fn fan_out_handler(self: &Arc<Self>) -> ChangeHandler {
        let directory = Arc::downgrade(self);
        Arc::new(move |node_id: &str| {
            if let Some(inner) = directory.upgrade() {
                inner.fan_out(node_id);
            }
        })
    }

    fn fan_out(&self, node_id: &str) {
        let targets = self.binds.listeners(node_id);
        if targets.is_empty() {
            return;
        }
        // Evicted ids keep their listeners but stay quiet until registered again
        let Some(node) = self.cache.lookup(node_id) else {
            tracing::debug!("Change on evicted node {} not dispatched", node_id);
            return;
        };
        let info: Arc<NodeInfo> = self.infos.refresh(&node);
        tracing::trace!("Dispatching change of {} to {} listeners", node_id, targets.len());
        for (caller, callback) in targets {
            listeners::invoke(self.config.isolate_listener_panics, "bind", caller, || {
                callback(&info)
            });
        }
    }

    async fn close_subscription(&self, node_id: &str, subscription: SubscriptionId) {
        if let Err(err) = self.store.unsubscribe(node_id, subscription).await {
            tracing::warn!("Failed to close subscription on {}: {}", node_id, err);
        }
    }

    async fn unbind(&self, node_id: &str, caller: ListenerToken) -> bool {
        let (removed, subscription) = self.binds.unbind(node_id, caller);
        if let Some(subscription) = subscription {
            self.close_subscription(node_id, subscription).await;
            tracing::debug!("Closed subscription on {}", node_id);
        }
        removed
    }
}

impl Drop for DirectoryInner {
    fn drop(&mut self) {
        let subscriptions = self.binds.drain();
        if subscriptions.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                "Directory dropped outside a runtime, {} store subscriptions left open",
                subscriptions.len()
            );
            return;
        };
        let store = self.store.clone();
        runtime.spawn(async move {
            for (node_id, subscription) in subscriptions {
                if let Err(err) = store.unsubscribe(&node_id, subscription).await {
                    tracing::warn!("Failed to close subscription on {}: {}", node_id, err);
                }
            }
        });
    }
}

impl GraphDirectory {
    /// Call `callback` with the refreshed projection of `id` on every change of `id`
    ///
    /// Binding again with the same `caller` replaces its callback. Returns `None` if `id`
    /// is not cached or the store subscription could not be opened. In the latter case
    /// every caller that joined while it was being opened gets `None` as well.
    pub async fn bind_node(
        &self,
        id: &str,
        caller: ListenerToken,
        callback: BindCallback,
    ) -> Option<BindHandle> {
        if !self.is_loaded(id) {
            tracing::debug!("bind_node: {} not cached", id);
            return None;
        }

        match self.inner.binds.bind(id, caller, callback) {
            BindOutcome::Joined => {}
            BindOutcome::Pending(pending) => {
                if !pending.opened().await {
                    tracing::debug!("bind_node: subscription on {} was not opened", id);
                    return None;
                }
            }
            BindOutcome::SubscribeNeeded { generation } => {
                let handler = self.inner.fan_out_handler();
                match self.inner.store.subscribe(id, handler).await {
                    Ok(subscription) => {
                        if let Some(stale) =
                            self.inner.binds.activate(id, generation, subscription)
                        {
                            self.inner.close_subscription(id, stale).await;
                        }
                    }
                    Err(err) => {
                        tracing::warn!("Failed to subscribe to {}: {}", id, err);
                        self.inner.binds.abandon(id, generation);
                        return None;
                    }
                }
            }
        }

        Some(BindHandle {
            directory: Arc::downgrade(&self.inner),
            node_id: id.to_string(),
            caller,
        })
    }

    /// Remove `caller`'s listener on `id`; closes the store subscription with the last one
    pub async fn unbind_node(&self, id: &str, caller: ListenerToken) -> bool {
        self.inner.unbind(id, caller).await
    }

    pub fn is_bound(&self, id: &str) -> bool {
        self.inner.binds.is_bound(id)
    }
}
