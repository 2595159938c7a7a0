//! Concurrency Tests
//!
//! Integration tests for operations that are in flight at the same time: parallel
//! traversals over the same ids, binds joining a subscription that is still being
//! opened, and bind/unbind racing with mutations.

mod common;

#[cfg(test)]
mod concurrency_tests {
    use super::common::{attrs, fixture_directory, CLASSIFICATION, CONTEXTUAL};
    use anyhow::Result;
    use async_trait::async_trait;
    use graph_directory::db::{
        ChangeHandler, GraphFixture, GraphStore, InMemoryGraphStore, StoreError, StoreResult,
        SubscriptionId,
    };
    use graph_directory::models::{Attributes, ElementRef, GraphNode, NodeInfo, NAME_KEY};
    use graph_directory::services::{predicate, DirectoryError, ListenerToken};
    use graph_directory::GraphDirectory;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Store whose subscriptions wait for `release` and then open, or fail if `refuse`
    struct GatedStore {
        inner: Arc<InMemoryGraphStore>,
        release: Notify,
        refuse: bool,
        subscribe_calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for GatedStore {
        fn default_node_type(&self) -> &str {
            self.inner.default_node_type()
        }

        async fn create_node(
            &self,
            attributes: Attributes,
            element: Option<ElementRef>,
        ) -> StoreResult<Arc<GraphNode>> {
            self.inner.create_node(attributes, element).await
        }

        async fn create_context(
            &self,
            graph_id: &str,
            relation_name: &str,
            attributes: Attributes,
            element: Option<ElementRef>,
        ) -> StoreResult<Arc<GraphNode>> {
            self.inner
                .create_context(graph_id, relation_name, attributes, element)
                .await
        }

        async fn get_children(
            &self,
            parent_id: &str,
            relation_names: &[String],
        ) -> StoreResult<Vec<Arc<GraphNode>>> {
            self.inner.get_children(parent_id, relation_names).await
        }

        async fn get_children_in_context(
            &self,
            parent_id: &str,
            context_id: &str,
        ) -> StoreResult<Vec<Arc<GraphNode>>> {
            self.inner
                .get_children_in_context(parent_id, context_id)
                .await
        }

        async fn get_parents(
            &self,
            child_id: &str,
            relation_names: &[String],
        ) -> StoreResult<Vec<Arc<GraphNode>>> {
            self.inner.get_parents(child_id, relation_names).await
        }

        async fn add_child(
            &self,
            parent_id: &str,
            child_id: &str,
            relation_name: &str,
            relation_type: &str,
        ) -> StoreResult<()> {
            self.inner
                .add_child(parent_id, child_id, relation_name, relation_type)
                .await
        }

        async fn add_child_in_context(
            &self,
            parent_id: &str,
            child_id: &str,
            context_id: &str,
            relation_name: &str,
            relation_type: &str,
        ) -> StoreResult<()> {
            self.inner
                .add_child_in_context(parent_id, child_id, context_id, relation_name, relation_type)
                .await
        }

        async fn remove_child(
            &self,
            parent_id: &str,
            child_id: &str,
            relation_name: &str,
            relation_type: &str,
        ) -> StoreResult<()> {
            self.inner
                .remove_child(parent_id, child_id, relation_name, relation_type)
                .await
        }

        async fn remove_from_graph(&self, node_id: &str) -> StoreResult<()> {
            self.inner.remove_from_graph(node_id).await
        }

        async fn subscribe(
            &self,
            node_id: &str,
            handler: ChangeHandler,
        ) -> StoreResult<SubscriptionId> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            if self.refuse {
                return Err(StoreError::backend("subscription refused"));
            }
            self.inner.subscribe(node_id, handler).await
        }

        async fn unsubscribe(
            &self,
            node_id: &str,
            subscription: SubscriptionId,
        ) -> StoreResult<()> {
            self.inner.unsubscribe(node_id, subscription).await
        }
    }

    /// Directory over the contextual fixture behind a gated store, with `p` cached
    async fn gated_directory(refuse: bool) -> Result<(GraphDirectory, Arc<GatedStore>)> {
        let fixture = GraphFixture::from_json(CONTEXTUAL)?;
        let inner = Arc::new(InMemoryGraphStore::from_fixture(&fixture).await?);
        let graph = inner
            .graph()
            .ok_or_else(|| anyhow::anyhow!("fixture has no graph"))?;
        let store = Arc::new(GatedStore {
            inner,
            release: Notify::new(),
            refuse,
            subscribe_calls: AtomicUsize::new(0),
        });

        let directory = GraphDirectory::new(store.clone());
        let graph_id = directory.set_graph(graph);
        directory.get_children(&graph_id, &[]).await?;
        Ok((directory, store))
    }

    fn counting(calls: &Arc<AtomicUsize>) -> Arc<dyn Fn(&Arc<NodeInfo>) + Send + Sync> {
        let counter = calls.clone();
        Arc::new(move |_: &Arc<NodeInfo>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Wait until a bind is parked inside the store subscription call
    async fn subscription_requested(store: &GatedStore) {
        while store.subscribe_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_bind_joining_failed_subscription_is_absent() -> Result<()> {
        let (directory, store) = gated_directory(true).await?;
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let first = tokio::spawn({
            let directory = directory.clone();
            let callback = counting(&first_calls);
            async move { directory.bind_node("p", ListenerToken::new(), callback).await }
        });
        subscription_requested(&store).await;

        let second_caller = ListenerToken::new();
        let (second, ()) = tokio::join!(
            directory.bind_node("p", second_caller, counting(&second_calls)),
            async { store.release.notify_one() }
        );
        let first = first.await?;

        assert!(first.is_none());
        assert!(second.is_none());
        assert!(!directory.is_bound("p"));
        assert_eq!(store.inner.counters().subscriptions_created, 0);

        assert!(directory.modify_node("p", &attrs(&[(NAME_KEY, "P1")])));
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert!(!directory.unbind_node("p", second_caller).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_bind_joining_pending_subscription_waits_for_it() -> Result<()> {
        let (directory, store) = gated_directory(false).await?;
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let first = tokio::spawn({
            let directory = directory.clone();
            let callback = counting(&first_calls);
            async move { directory.bind_node("p", ListenerToken::new(), callback).await }
        });
        subscription_requested(&store).await;

        let (second, ()) = tokio::join!(
            directory.bind_node("p", ListenerToken::new(), counting(&second_calls)),
            async { store.release.notify_one() }
        );
        let second = second.expect("subscription opened");
        // Handed out only once the shared subscription exists
        assert_eq!(store.inner.counters().subscriptions_created, 1);
        let first = first.await?.expect("subscription opened");

        assert!(directory.modify_node("p", &attrs(&[(NAME_KEY, "P1")])));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);

        assert!(second.unbind().await);
        assert!(first.unbind().await);
        let counters = store.inner.counters();
        assert_eq!(counters.subscriptions_created, 1);
        assert_eq!(counters.subscriptions_destroyed, 1);
        assert_eq!(store.subscribe_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_traversals_register_each_node_once() -> Result<()> {
        let (directory, store) = fixture_directory(CLASSIFICATION).await?;
        let added: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = added.clone();
        directory.listen_on_node_added(
            ListenerToken::new(),
            Arc::new(move |id: &str| recorded.lock().push(id.to_string())),
        );

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move {
                    let children = directory.get_children("root", &[]).await?;
                    for child in &children {
                        directory.get_children(child.id(), &[]).await?;
                    }
                    let everything = predicate(|_| true);
                    let found = directory.find_nodes("root", &[], &everything).await?;
                    Ok::<_, DirectoryError>(found)
                })
            })
            .collect();

        for task in tasks {
            let found = task.await??;
            assert_eq!(found.len(), 5);
            for node in &found {
                let cached = directory
                    .get_real_node(node.id())
                    .expect("visited nodes are cached");
                assert!(Arc::ptr_eq(node, &cached));
                assert!(Arc::ptr_eq(&cached, &store.get(node.id()).unwrap()));
            }
        }

        let added = added.lock().clone();
        let unique: HashSet<&str> = added.iter().map(String::as_str).collect();
        assert_eq!(added.len(), unique.len(), "each id fires once: {:?}", added);
        assert_eq!(unique, HashSet::from(["a", "b", "c", "d"]));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bind_and_unbind_settle_balanced() -> Result<()> {
        let (directory, store) = fixture_directory(CONTEXTUAL).await?;
        let calls = Arc::new(AtomicUsize::new(0));

        let binders: Vec<_> = (0..16)
            .map(|i| {
                let directory = directory.clone();
                let callback = counting(&calls);
                tokio::spawn(async move {
                    for _ in 0..4 {
                        let handle = directory
                            .bind_node("p", ListenerToken::new(), callback.clone())
                            .await
                            .expect("p is cached");
                        if i % 3 == 0 {
                            tokio::task::yield_now().await;
                        }
                        assert!(handle.unbind().await);
                    }
                })
            })
            .collect();

        let mutator = tokio::spawn({
            let directory = directory.clone();
            async move {
                for k in 0..50 {
                    let name = format!("P{}", k);
                    directory.modify_node("p", &attrs(&[(NAME_KEY, name.as_str())]));
                    tokio::task::yield_now().await;
                }
            }
        });

        for binder in binders {
            binder.await?;
        }
        mutator.await?;

        let counters = store.counters();
        assert!(counters.subscriptions_created >= 1);
        assert_eq!(counters.subscriptions_created, counters.subscriptions_destroyed);
        assert!(!directory.is_bound("p"));
        assert_eq!(directory.cache_stats().bound_nodes, 0);
        assert_eq!(store.get("p").unwrap().observer_count(), 0);
        Ok(())
    }
}
