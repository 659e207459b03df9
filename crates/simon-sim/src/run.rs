//! Run state and completion detection.
//!
//! A [`SimulationRun`] turns pod change notifications into exactly one
//! terminal outcome. Every transition happens under one mutex, and the
//! stop signal is a oneshot sender taken out of that mutex on the first
//! terminal transition, so it can only ever fire once.
//!
//! ```text
//!   Running(n) ──bind──▶ Running(n-1) ──…──▶ Succeeded   (n reaches 0)
//!       │
//!       ├──unschedulable (provisioned pod)──▶ Failed(detail)
//!       ├──timeout──▶ TimedOut
//!       └──cancel───▶ Cancelled
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use simon_core::constants::{ANNO_POD_PROVISIONER, STOP_REASON_SUCCESS};
use simon_core::Pod;
use simon_state::{PodEvent, PodEventType, PodWatch};

/// Where a run is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running { remaining: usize },
    Succeeded,
    Failed(String),
    TimedOut,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running { .. })
    }

    /// Human-readable reason the run ended, `None` while still running.
    pub fn stop_reason(&self) -> Option<String> {
        match self {
            RunState::Running { .. } => None,
            RunState::Succeeded => Some(STOP_REASON_SUCCESS.to_string()),
            RunState::Failed(detail) => Some(detail.clone()),
            RunState::TimedOut => Some("run timed out waiting for scheduling outcomes".to_string()),
            RunState::Cancelled => Some("run cancelled".to_string()),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running { remaining } => write!(f, "running ({remaining} remaining)"),
            RunState::Succeeded => f.write_str("succeeded"),
            RunState::Failed(_) => f.write_str("failed"),
            RunState::TimedOut => f.write_str("timed out"),
            RunState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Resolves once the run reaches a terminal state.
pub struct StopSignal {
    rx: oneshot::Receiver<()>,
}

impl StopSignal {
    pub async fn wait(self) {
        // A dropped sender also means the run is over.
        let _ = self.rx.await;
    }
}

struct RunInner {
    state: RunState,
    stop: Option<oneshot::Sender<()>>,
}

/// The state of one simulation run, shared between the detector task and
/// the controller.
pub struct SimulationRun {
    inner: Mutex<RunInner>,
}

impl SimulationRun {
    /// Start a run expecting `injected` pods. With zero pods the run is
    /// already complete and the stop signal has already fired.
    pub fn new(injected: usize) -> (Arc<Self>, StopSignal) {
        let (tx, rx) = oneshot::channel();
        let run = Arc::new(Self {
            inner: Mutex::new(RunInner {
                state: RunState::Running {
                    remaining: injected,
                },
                stop: Some(tx),
            }),
        });
        if injected == 0 {
            let mut inner = run.lock();
            Self::finish(&mut inner, RunState::Succeeded);
        }
        (run, StopSignal { rx })
    }

    pub fn state(&self) -> RunState {
        self.lock().state.clone()
    }

    pub fn stop_reason(&self) -> Option<String> {
        self.lock().state.stop_reason()
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().state.is_terminal()
    }

    /// Apply one pod notification. Returns the state after it.
    ///
    /// Only `Modified` events count; creation is not a scheduling outcome.
    pub fn observe(&self, event: &PodEvent) -> RunState {
        let mut inner = self.lock();
        let RunState::Running { remaining } = inner.state else {
            return inner.state.clone();
        };
        if event.event_type != PodEventType::Modified {
            return inner.state.clone();
        }

        let pod = &event.pod;
        match pod.unschedulable_condition() {
            Some(_) if pod.metadata.has_annotation(ANNO_POD_PROVISIONER) => {
                let detail = failure_detail(pod, remaining);
                warn!(pod = %pod.key(), remaining, "run failed: {detail}");
                Self::finish(&mut inner, RunState::Failed(detail));
            }
            // Unschedulable pods this run did not create neither fail nor advance it.
            Some(_) => {
                debug!(pod = %pod.key(), "ignoring unschedulable pod not provisioned by this run");
            }
            None => {
                let remaining = remaining.saturating_sub(1);
                debug!(pod = %pod.key(), node = ?pod.node_name(), remaining, "pod scheduled");
                if remaining == 0 {
                    info!("all injected pods scheduled");
                    Self::finish(&mut inner, RunState::Succeeded);
                } else {
                    inner.state = RunState::Running { remaining };
                }
            }
        }
        inner.state.clone()
    }

    /// End a still-running run as timed out.
    pub fn time_out(&self) -> bool {
        self.end_with(RunState::TimedOut)
    }

    /// End a still-running run as cancelled.
    pub fn cancel(&self) -> bool {
        self.end_with(RunState::Cancelled)
    }

    fn end_with(&self, state: RunState) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        info!(%state, "run stopped");
        Self::finish(&mut inner, state);
        true
    }

    /// Enter a terminal state and fire the stop signal. The sender is taken,
    /// so later calls cannot fire it again.
    fn finish(inner: &mut RunInner, state: RunState) {
        inner.state = state;
        if let Some(stop) = inner.stop.take() {
            let _ = stop.send(());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `pod <ns>/<name> is failed, <n> pod(s) are waited to be scheduled: <reason>: <message>`
fn failure_detail(pod: &Pod, remaining: usize) -> String {
    let (reason, message) = pod
        .unschedulable_condition()
        .map(|c| {
            (
                c.reason.clone().unwrap_or_default(),
                c.message.clone().unwrap_or_default(),
            )
        })
        .unwrap_or_default();
    format!(
        "pod {} is failed, {} pod(s) are waited to be scheduled: {}: {}",
        pod.key(),
        remaining,
        reason,
        message
    )
}

/// Feed pod notifications into `run` until it is terminal or the store
/// goes away. This is the single consumer of the detector subscription.
pub fn spawn_detector(run: Arc<SimulationRun>, mut events: PodWatch) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if run.observe(&event).is_terminal() {
                break;
            }
        }
        debug!("completion detector finished");
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use simon_core::{ObjectMeta, PodCondition};

    fn test_pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("default", name);
        pod.metadata
            .annotations
            .insert(ANNO_POD_PROVISIONER.into(), "default-scheduler".into());
        pod
    }

    fn bound(name: &str) -> PodEvent {
        let mut pod = test_pod(name);
        pod.spec.node_name = Some("node-a".into());
        PodEvent {
            event_type: PodEventType::Modified,
            pod,
        }
    }

    fn unschedulable(name: &str) -> PodEvent {
        let mut pod = test_pod(name);
        pod.status.conditions.push(PodCondition::unschedulable(
            "0/3 nodes are available: insufficient resources",
        ));
        PodEvent {
            event_type: PodEventType::Modified,
            pod,
        }
    }

    #[tokio::test]
    async fn zero_pods_is_complete_immediately() {
        let (run, stop) = SimulationRun::new(0);
        assert_eq!(run.state(), RunState::Succeeded);
        assert_eq!(run.stop_reason().as_deref(), Some(STOP_REASON_SUCCESS));
        stop.wait().await;
        // Later terminal paths are no-ops.
        assert!(!run.cancel());
        assert!(!run.time_out());
        assert_eq!(run.state(), RunState::Succeeded);
    }

    #[tokio::test]
    async fn counts_binds_down_to_success() {
        let (run, stop) = SimulationRun::new(2);
        assert_eq!(run.observe(&bound("a")), RunState::Running { remaining: 1 });
        assert_eq!(run.observe(&bound("b")), RunState::Succeeded);
        stop.wait().await;
        // Extra notifications never drive the counter further.
        assert_eq!(run.observe(&bound("c")), RunState::Succeeded);
    }

    #[test]
    fn added_events_do_not_count() {
        let (run, _stop) = SimulationRun::new(1);
        let mut event = bound("a");
        event.event_type = PodEventType::Added;
        assert_eq!(run.observe(&event), RunState::Running { remaining: 1 });
    }

    #[test]
    fn unschedulable_provisioned_pod_fails_the_run() {
        let (run, _stop) = SimulationRun::new(3);
        run.observe(&bound("a"));
        let state = run.observe(&unschedulable("b"));

        assert_eq!(
            state,
            RunState::Failed(
                "pod default/b is failed, 2 pod(s) are waited to be scheduled: \
                 Unschedulable: 0/3 nodes are available: insufficient resources"
                    .into()
            )
        );
        // Terminal: later binds change nothing.
        assert_eq!(run.observe(&bound("c")), state);
    }

    #[test]
    fn unschedulable_foreign_pod_is_ignored() {
        let (run, _stop) = SimulationRun::new(1);
        let mut event = unschedulable("foreign");
        event.pod.metadata.annotations.clear();
        assert_eq!(run.observe(&event), RunState::Running { remaining: 1 });
    }

    #[tokio::test]
    async fn timeout_and_cancel_are_terminal() {
        let (run, stop) = SimulationRun::new(1);
        assert!(run.time_out());
        assert!(!run.cancel());
        assert_eq!(run.state(), RunState::TimedOut);
        stop.wait().await;
    }

    #[tokio::test]
    async fn concurrent_binds_succeed_exactly_once() {
        const PODS: usize = 64;
        let (run, stop) = SimulationRun::new(PODS);

        let handles: Vec<_> = (0..PODS * 2)
            .map(|i| {
                let run = run.clone();
                thread::spawn(move || run.observe(&bound(&format!("pod-{i}"))))
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|s| *s == RunState::Succeeded)
            .count();

        // Every observer at or after the last decrement sees Succeeded.
        assert!(succeeded >= PODS);
        assert_eq!(run.state(), RunState::Succeeded);
        stop.wait().await;
    }

    #[test]
    fn failure_racing_last_bind_yields_one_outcome() {
        for _ in 0..100 {
            let (run, _stop) = SimulationRun::new(1);
            let a = {
                let run = run.clone();
                thread::spawn(move || run.observe(&bound("a")))
            };
            let b = {
                let run = run.clone();
                thread::spawn(move || run.observe(&unschedulable("b")))
            };
            let (a, b) = (a.join().unwrap(), b.join().unwrap());
            let final_state = run.state();
            assert!(final_state.is_terminal());
            // Whoever ran second saw the first one's terminal state.
            assert!(a == final_state || b == final_state);
            match final_state {
                RunState::Succeeded => {}
                RunState::Failed(detail) => assert!(detail.contains("1 pod(s)")),
                other => panic!("unexpected state {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn detector_task_consumes_events() {
        let store = simon_state::ClusterStore::open_in_memory("default-scheduler").unwrap();
        let events = store.subscribe(|e| e.event_type == PodEventType::Modified);
        let (run, stop) = SimulationRun::new(1);
        let handle = spawn_detector(run.clone(), events);

        let mut pod = test_pod("web");
        store.create_pod(&pod).unwrap();
        pod.spec.node_name = Some("node-a".into());
        store.update_pod(&pod).unwrap();

        stop.wait().await;
        handle.await.unwrap();
        assert_eq!(run.state(), RunState::Succeeded);
    }
}
