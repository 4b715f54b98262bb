use std::sync::Arc;
use std::time::Duration;

use dstore_directory::{BindingIndex, LockDirectory, NodeRegistry};
use dstore_types::{CallbackKey, CallbackRequest, NodeId};
use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CallbackConfig;
use crate::queue::CallbackReceiver;

/// How a single callback request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The node acknowledged and the release is recorded.
    Acknowledged,
    /// The node was already dead; its access was stripped when it died.
    TargetGone,
    /// Every attempt failed; the node has been marked dead.
    NodeFailed,
}

/// Delivers release requests to nodes and settles the directory afterwards.
pub struct CallbackCoordinator {
    config: CallbackConfig,
    nodes: Arc<NodeRegistry>,
    objects: Arc<LockDirectory>,
    bindings: Arc<BindingIndex>,
}

impl CallbackCoordinator {
    pub fn new(
        config: CallbackConfig,
        nodes: Arc<NodeRegistry>,
        objects: Arc<LockDirectory>,
        bindings: Arc<BindingIndex>,
    ) -> Self {
        Self {
            config,
            nodes,
            objects,
            bindings,
        }
    }

    /// Drain `receiver` on a background task until every queue handle is dropped.
    ///
    /// Each request is delivered on its own task, at most
    /// `max_in_flight` at a time, so one unresponsive node never holds up
    /// callbacks to the others.
    pub fn spawn(self: Arc<Self>, mut receiver: CallbackReceiver) -> JoinHandle<()> {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };
                let this = Arc::clone(&self);
                tokio::spawn(async move {
                    this.deliver(request).await;
                    drop(permit);
                });
            }
            debug!("callback queue closed");
        })
    }

    /// Deliver one request, retrying with backoff.
    pub async fn deliver(&self, request: CallbackRequest) -> DeliveryOutcome {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let endpoint = match self.nodes.callback(request.target) {
                Ok(Some(endpoint)) => endpoint,
                Ok(None) => {
                    self.complete(&request);
                    return DeliveryOutcome::TargetGone;
                }
                Err(error) => {
                    warn!(%request, %error, "cannot resolve callback target");
                    return DeliveryOutcome::TargetGone;
                }
            };
            let call = endpoint.request_release(&request.key, request.release);
            match tokio::time::timeout(self.config.request_timeout(), call).await {
                Ok(Ok(())) => {
                    debug!(%request, attempt, "callback acknowledged");
                    self.complete(&request);
                    return DeliveryOutcome::Acknowledged;
                }
                Ok(Err(error)) => {
                    warn!(%request, attempt, %error, "callback delivery failed");
                }
                Err(_) => {
                    warn!(%request, attempt, "callback timed out");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }
        if let Err(error) = self.node_failed(request.target) {
            warn!(%request, %error, "cannot mark callback target dead");
        }
        DeliveryOutcome::NodeFailed
    }

    /// Declare `node` dead and strip its access everywhere.
    ///
    /// Returns `false` if the node was already dead or never registered.
    pub fn node_failed(&self, node: NodeId) -> dstore_directory::Result<bool> {
        let was_alive = self.nodes.mark_dead(node)?;
        let objects = self.objects.force_release_node(node);
        let bindings = self.bindings.force_release_node(node);
        if was_alive {
            info!(%node, objects, bindings, "stripped access of failed node");
        }
        Ok(was_alive)
    }

    fn complete(&self, request: &CallbackRequest) {
        match &request.key {
            CallbackKey::Object(oid) => {
                self.objects.complete_release(request.target, *oid);
            }
            CallbackKey::Binding(key) => {
                self.bindings.complete_release(request.target, key);
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_backoff_ms;
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(base.saturating_mul(u64::from(attempt)) + jitter)
    }
}

impl std::fmt::Debug for CallbackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackCoordinator")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::CallbackQueue;
    use async_trait::async_trait;
    use dstore_store::{BackingStore, InMemoryBackingStore};
    use dstore_types::{AccessMode, BindingKey, CallbackError, CallbackServer, ReleaseKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Endpoint that fails its first `failures` calls, optionally stalling.
    #[derive(Debug)]
    struct ScriptedEndpoint {
        identity: String,
        failures: AtomicU32,
        stall: Option<Duration>,
        seen: Mutex<Vec<(CallbackKey, ReleaseKind)>>,
    }

    impl ScriptedEndpoint {
        fn new(identity: &str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                identity: identity.into(),
                failures: AtomicU32::new(failures),
                stall: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn stalled(identity: &str) -> Arc<Self> {
            Arc::new(Self {
                identity: identity.into(),
                failures: AtomicU32::new(0),
                stall: Some(Duration::from_secs(5)),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<(CallbackKey, ReleaseKind)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallbackServer for ScriptedEndpoint {
        fn identity(&self) -> &str {
            &self.identity
        }

        async fn request_release(
            &self,
            key: &CallbackKey,
            release: ReleaseKind,
        ) -> Result<(), CallbackError> {
            self.seen.lock().unwrap().push((key.clone(), release));
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(CallbackError::Unreachable("scripted failure".into()));
            }
            Ok(())
        }
    }

    struct Harness {
        nodes: Arc<NodeRegistry>,
        objects: Arc<LockDirectory>,
        bindings: Arc<BindingIndex>,
        coordinator: Arc<CallbackCoordinator>,
        receiver: Option<CallbackReceiver>,
    }

    fn harness() -> Harness {
        let nodes = Arc::new(NodeRegistry::new(9000..=9100));
        let store = Arc::new(InMemoryBackingStore::new());
        store.put_object(5, b"five".to_vec()).unwrap();
        store.bind("b", 1).unwrap();
        let (queue, receiver) = CallbackQueue::channel();
        let queue = Arc::new(queue);
        let store: Arc<dyn BackingStore> = store;
        let objects = Arc::new(LockDirectory::new(nodes.clone(), store.clone(), queue.clone()));
        let bindings = Arc::new(BindingIndex::new(nodes.clone(), store, queue));
        let config = CallbackConfig {
            max_attempts: 3,
            retry_backoff_ms: 1,
            request_timeout_ms: 50,
            max_in_flight: 4,
        };
        let coordinator = Arc::new(CallbackCoordinator::new(
            config,
            nodes.clone(),
            objects.clone(),
            bindings.clone(),
        ));
        Harness {
            nodes,
            objects,
            bindings,
            coordinator,
            receiver: Some(receiver),
        }
    }

    impl Harness {
        fn register(&self, endpoint: Arc<ScriptedEndpoint>) -> NodeId {
            self.nodes.register(endpoint).unwrap().node_id
        }

        fn next_request(&mut self) -> CallbackRequest {
            self.receiver
                .as_mut()
                .and_then(CallbackReceiver::try_recv)
                .expect("a queued callback")
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn acknowledged_eviction_clears_releasing() {
        let mut h = harness();
        let a_endpoint = ScriptedEndpoint::new("a", 0);
        let a = h.register(a_endpoint.clone());
        let b = h.register(ScriptedEndpoint::new("b", 0));
        h.objects.get_object_for_update(a, 5).unwrap();
        h.objects.get_object(b, 5).unwrap();

        let request = h.next_request();
        assert_eq!(request.target, a);
        assert_eq!(h.coordinator.deliver(request).await, DeliveryOutcome::Acknowledged);
        assert_eq!(a_endpoint.seen(), vec![(CallbackKey::Object(5), ReleaseKind::Evict)]);
        assert!(h.objects.releasing(5).is_empty());
        assert!(h.nodes.is_registered(a));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let mut h = harness();
        let a_endpoint = ScriptedEndpoint::new("a", 2);
        let a = h.register(a_endpoint.clone());
        let b = h.register(ScriptedEndpoint::new("b", 0));
        h.bindings.get_binding_for_update(a, "b").unwrap();
        h.bindings.get_binding(b, "b").unwrap();

        let request = h.next_request();
        assert_eq!(h.coordinator.deliver(request).await, DeliveryOutcome::Acknowledged);
        assert_eq!(a_endpoint.seen().len(), 3);
        assert!(h.bindings.releasing(&BindingKey::name("b")).is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_mark_node_dead_and_strip_access() {
        let mut h = harness();
        let a = h.register(ScriptedEndpoint::new("a", u32::MAX));
        let b = h.register(ScriptedEndpoint::new("b", 0));
        h.objects.get_object_for_update(a, 5).unwrap();
        h.bindings.get_binding(a, "b").unwrap();
        h.objects.get_object(b, 5).unwrap();

        let request = h.next_request();
        assert_eq!(h.coordinator.deliver(request).await, DeliveryOutcome::NodeFailed);
        assert!(!h.nodes.is_registered(a));
        assert!(h.objects.releasing(5).is_empty());
        assert!(h.bindings.holders(&BindingKey::name("b")).is_empty());

        let r = h.objects.get_object_for_update(b, 5).unwrap().unwrap();
        assert!(!r.callback_evict);
    }

    #[tokio::test]
    async fn stalled_node_times_out_and_fails() {
        let mut h = harness();
        let a = h.register(ScriptedEndpoint::stalled("a"));
        let b = h.register(ScriptedEndpoint::new("b", 0));
        h.objects.get_object(a, 5).unwrap();
        h.objects.get_object_for_update(b, 5).unwrap();

        let request = h.next_request();
        assert_eq!(request.release, ReleaseKind::Downgrade);
        assert_eq!(h.coordinator.deliver(request).await, DeliveryOutcome::NodeFailed);
        assert!(!h.nodes.is_registered(a));
        assert_eq!(h.objects.holders(5), vec![(b, AccessMode::Write)]);
    }

    #[tokio::test]
    async fn request_to_dead_node_is_settled() {
        let mut h = harness();
        let a = h.register(ScriptedEndpoint::new("a", 0));
        let b = h.register(ScriptedEndpoint::new("b", 0));
        h.objects.get_object_for_update(a, 5).unwrap();
        h.objects.get_object(b, 5).unwrap();
        let request = h.next_request();
        h.nodes.mark_dead(a).unwrap();

        assert_eq!(h.coordinator.deliver(request).await, DeliveryOutcome::TargetGone);
        assert!(h.objects.releasing(5).is_empty());
    }

    #[tokio::test]
    async fn spawned_coordinator_drains_queue() {
        let mut h = harness();
        let a = h.register(ScriptedEndpoint::new("a", 0));
        let b = h.register(ScriptedEndpoint::new("b", 0));
        let receiver = h.receiver.take().unwrap();
        let _task = Arc::clone(&h.coordinator).spawn(receiver);

        h.objects.get_object_for_update(a, 5).unwrap();
        let r = h.objects.get_object(b, 5).unwrap().unwrap();
        assert!(r.callback_evict);

        let objects = h.objects.clone();
        wait_until(move || objects.releasing(5).is_empty()).await;
        assert_eq!(h.objects.holders(5), vec![(b, AccessMode::Read)]);
    }

    #[test]
    fn node_failed_reports_only_first_transition() {
        let h = harness();
        let a = h.register(ScriptedEndpoint::new("a", 0));
        assert!(h.coordinator.node_failed(a).unwrap());
        assert!(!h.coordinator.node_failed(a).unwrap());
    }
}
