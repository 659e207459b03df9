//! The decision-engine contract.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use simon_state::{ClusterStore, PodEventType, PodWatch};

use crate::binder::BindInterceptor;
use crate::error::EngineResult;

pub type EngineFuture = Pin<Box<dyn Future<Output = EngineResult<()>> + Send>>;

/// Everything an engine is handed when a run starts.
pub struct EngineContext {
    /// Full synthetic object graph, for filtering and scoring.
    pub store: ClusterStore,
    pub binder: BindInterceptor,
    /// Newly created pods that still need a node.
    pub pending: PodWatch,
}

impl EngineContext {
    /// Subscribe to pending pods on `store`. Must be called before pods are
    /// injected, or their creation events are missed.
    pub fn new(store: ClusterStore) -> Self {
        let pending = store.subscribe(|event| {
            event.event_type == PodEventType::Added && event.pod.node_name().is_none()
        });
        Self {
            binder: BindInterceptor::new(store.clone()),
            store,
            pending,
        }
    }
}

/// A scheduling decision engine driven by the simulator.
///
/// `run` is spawned as its own task and must return once `shutdown`
/// flips to `true`.
pub trait DecisionEngine: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run(self: Arc<Self>, ctx: EngineContext, shutdown: watch::Receiver<bool>)
    -> EngineFuture;
}
