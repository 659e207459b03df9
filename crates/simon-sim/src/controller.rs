//! Lifecycle controller.
//!
//! Owns the synthetic store for one orchestration session. Populating
//! calls (`sync_fake_cluster`, `add_nodes`, `add_fake_nodes`) run before
//! [`Simulator::run`], which starts the completion detector and the
//! decision engine, injects the pods, and blocks until the run ends.

use std::future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use simon_core::{Node, ObjectValidator, Pod, SimonConfig};
use simon_engine::{DecisionEngine, EngineContext};
use simon_state::{ClusterStore, PodEventType};
use simon_workload::{FakeNodeProvisioner, Materializer, ProvisionedNodes};

use crate::error::SimResult;
use crate::run::{RunState, SimulationRun, spawn_detector};
use crate::source::ClusterSource;
use crate::sync::{SyncSummary, sync_cluster};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub state: RunState,
    pub stop_reason: String,
    /// Pods actually created in the store.
    pub injected: usize,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }
}

/// Drives one simulation session against a decision engine.
pub struct Simulator {
    store: ClusterStore,
    materializer: Materializer,
    provisioner: FakeNodeProvisioner,
    engine: Arc<dyn DecisionEngine>,
    settle_delay: Duration,
    run_timeout: Option<Duration>,
    cancel_tx: watch::Sender<bool>,
    current: Mutex<Option<Arc<SimulationRun>>>,
}

impl Simulator {
    pub fn new(
        config: &SimonConfig,
        engine: Arc<dyn DecisionEngine>,
        validator: Arc<dyn ObjectValidator>,
    ) -> SimResult<Self> {
        let store = ClusterStore::open_in_memory(&config.scheduler_name)?;
        let materializer = Materializer::new(config.scheduler_name.clone(), validator);
        let provisioner =
            FakeNodeProvisioner::new(config.fake_node_prefix.clone(), materializer.clone());
        let (cancel_tx, _) = watch::channel(false);
        Ok(Self {
            store,
            materializer,
            provisioner,
            engine,
            settle_delay: config.settle_delay(),
            run_timeout: config.run_timeout(),
            cancel_tx,
            current: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub fn fake_node_prefix(&self) -> &str {
        self.provisioner.prefix()
    }

    // ── Populating ─────────────────────────────────────────────────

    /// Copy the real cluster into the store. All-or-nothing.
    pub fn sync_fake_cluster(
        &self,
        source: &dyn ClusterSource,
        include_pods_and_nodes: bool,
    ) -> SimResult<SyncSummary> {
        sync_cluster(source, &self.store, include_pods_and_nodes)
    }

    /// Store nodes as given, stopping at the first failure.
    pub fn add_nodes(&self, nodes: &[Node]) -> SimResult<()> {
        for node in nodes {
            self.store.create_node(node)?;
        }
        Ok(())
    }

    pub fn add_fake_nodes(&self, count: usize, template: &Node) -> SimResult<ProvisionedNodes> {
        Ok(self.provisioner.provision(&self.store, count, template)?)
    }

    /// Create pods in the store. Failures are logged and skipped; returns
    /// how many were created.
    pub fn add_pods(&self, pods: &[Pod]) -> usize {
        let mut created = 0;
        for pod in pods {
            match self.store.create_pod(pod) {
                Ok(()) => created += 1,
                Err(e) => error!(pod = %pod.key(), error = %e, "failed to create pod"),
            }
        }
        created
    }

    pub fn nodes(&self) -> SimResult<Vec<Node>> {
        Ok(self.store.list_nodes()?)
    }

    // ── Running ────────────────────────────────────────────────────

    /// Stop reason of the current or last run; empty while none has ended.
    pub fn status(&self) -> String {
        self.current_run()
            .and_then(|run| run.stop_reason())
            .unwrap_or_default()
    }

    pub fn state(&self) -> Option<RunState> {
        self.current_run().map(|run| run.state())
    }

    /// Request cancellation. Takes effect immediately on a running run,
    /// and makes a later `run` return at once.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
        if let Some(run) = self.current_run() {
            run.cancel();
        }
    }

    /// Inject `pods` and wait for a terminal outcome.
    pub async fn run(&self, pods: Vec<Pod>) -> SimResult<RunOutcome> {
        let (run, stop) = SimulationRun::new(pods.len());
        self.set_current(run.clone());

        if pods.is_empty() {
            info!("no pods to inject, run complete");
            return Ok(self.outcome(&run, 0));
        }
        if *self.cancel_tx.borrow() {
            run.cancel();
            info!("run cancelled before start, nothing injected");
            return Ok(self.outcome(&run, 0));
        }

        // Subscribe before anything is injected so no event is missed.
        let detector_events = self
            .store
            .subscribe(|event| event.event_type == PodEventType::Modified);
        let engine_ctx = EngineContext::new(self.store.clone());

        let detector = spawn_detector(run.clone(), detector_events);
        let (engine_shutdown_tx, engine_shutdown_rx) = watch::channel(false);
        let engine_name = self.engine.name().to_string();
        let engine = tokio::spawn(self.engine.clone().run(engine_ctx, engine_shutdown_rx));

        let mut cancel_rx = self.cancel_tx.subscribe();
        let timeout = self.run_timeout;
        let stalled = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => future::pending::<()>().await,
            }
        };

        let settled = tokio::select! {
            _ = tokio::time::sleep(self.settle_delay) => true,
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                run.cancel();
                false
            }
        };
        let injected = if settled && !run.is_terminal() {
            let injected = self.add_pods(&pods);
            info!(requested = pods.len(), injected, engine = %engine_name, "pods injected");
            injected
        } else {
            info!("run cancelled during settle delay, nothing injected");
            0
        };

        tokio::select! {
            _ = stop.wait() => {}
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                run.cancel();
            }
            _ = stalled => {
                if run.time_out() {
                    warn!(timeout = ?timeout, "run stalled");
                }
            }
        }

        let _ = engine_shutdown_tx.send(true);
        match engine.await {
            Ok(Ok(())) => debug!(engine = %engine_name, "decision engine stopped"),
            Ok(Err(e)) => error!(engine = %engine_name, error = %e, "decision engine failed"),
            Err(e) => error!(engine = %engine_name, error = %e, "decision engine task panicked"),
        }
        detector.abort();

        let outcome = self.outcome(&run, injected);
        info!(state = %outcome.state, reason = %outcome.stop_reason, "run finished");
        Ok(outcome)
    }

    fn outcome(&self, run: &SimulationRun, injected: usize) -> RunOutcome {
        RunOutcome {
            state: run.state(),
            stop_reason: run.stop_reason().unwrap_or_default(),
            injected,
        }
    }

    fn current_run(&self) -> Option<Arc<SimulationRun>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_current(&self, run: Arc<SimulationRun>) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simon_core::DefaultValidator;
    use simon_engine::{EngineFuture, FitEngine};

    /// An engine that never decides anything.
    struct IdleEngine;

    impl DecisionEngine for IdleEngine {
        fn name(&self) -> &str {
            "idle"
        }

        fn run(
            self: Arc<Self>,
            _ctx: EngineContext,
            mut shutdown: watch::Receiver<bool>,
        ) -> EngineFuture {
            Box::pin(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
                Ok(())
            })
        }
    }

    fn test_config() -> SimonConfig {
        SimonConfig {
            settle_delay_ms: 0,
            ..SimonConfig::default()
        }
    }

    fn test_simulator(engine: Arc<dyn DecisionEngine>, config: &SimonConfig) -> Simulator {
        Simulator::new(config, engine, Arc::new(DefaultValidator::new().unwrap())).unwrap()
    }

    fn test_pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata = simon_core::ObjectMeta::named("default", name);
        pod
    }

    #[tokio::test]
    async fn empty_run_returns_without_engine() {
        let sim = test_simulator(Arc::new(IdleEngine), &test_config());
        let outcome = sim.run(Vec::new()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.stop_reason, "everything is ok");
        assert_eq!(sim.status(), "everything is ok");
    }

    #[tokio::test]
    async fn stalled_run_times_out() {
        let config = SimonConfig {
            run_timeout_secs: Some(0),
            ..test_config()
        };
        let sim = test_simulator(Arc::new(IdleEngine), &config);
        let outcome = sim.run(vec![test_pod("web")]).await.unwrap();
        assert_eq!(outcome.state, RunState::TimedOut);
        assert_eq!(outcome.injected, 1);
    }

    #[tokio::test]
    async fn cancel_before_run_returns_cancelled() {
        let sim = test_simulator(Arc::new(FitEngine::default()), &test_config());
        let mut node = Node::default();
        node.metadata.name = "node-a".into();
        node.status
            .allocatable
            .insert("cpu".into(), simon_core::Quantity::from_value(4));
        sim.add_nodes(&[node]).unwrap();

        sim.cancel();
        let outcome = sim
            .run(vec![test_pod("web-0"), test_pod("web-1")])
            .await
            .unwrap();
        assert_eq!(outcome.state, RunState::Cancelled);
        assert_eq!(outcome.injected, 0);
        assert_eq!(sim.status(), "run cancelled");
        assert!(sim.store().list_pods().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_during_settle_delay_injects_nothing() {
        let config = SimonConfig {
            settle_delay_ms: 60_000,
            ..test_config()
        };
        let sim = Arc::new(test_simulator(Arc::new(FitEngine::default()), &config));
        let handle = {
            let sim = sim.clone();
            tokio::spawn(async move { sim.run(vec![test_pod("web")]).await })
        };
        while sim.state() != Some(RunState::Running { remaining: 1 }) {
            tokio::task::yield_now().await;
        }
        sim.cancel();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.state, RunState::Cancelled);
        assert_eq!(outcome.injected, 0);
        assert!(sim.store().list_pods().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_during_run_unblocks_it() {
        let sim = Arc::new(test_simulator(Arc::new(IdleEngine), &test_config()));
        let handle = {
            let sim = sim.clone();
            tokio::spawn(async move { sim.run(vec![test_pod("web")]).await })
        };
        while sim.state() != Some(RunState::Running { remaining: 1 }) {
            tokio::task::yield_now().await;
        }
        sim.cancel();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.state, RunState::Cancelled);
    }

    #[tokio::test]
    async fn failed_injection_is_logged_not_fatal() {
        let sim = test_simulator(Arc::new(FitEngine::default()), &test_config());
        let pods = vec![test_pod("web"), test_pod("web")];
        assert_eq!(sim.add_pods(&pods), 1);
    }

    #[test]
    fn add_nodes_stops_at_first_error() {
        let sim = test_simulator(Arc::new(IdleEngine), &test_config());
        let mut node = Node::default();
        node.metadata.name = "node-a".into();
        assert!(sim.add_nodes(&[node.clone(), node]).is_err());
        assert_eq!(sim.nodes().unwrap().len(), 1);
    }
}
