//! simon-engine: the boundary between the simulator and a scheduling
//! decision engine.
//!
//! An engine implements [`DecisionEngine`]: it receives the synthetic store,
//! a stream of pending pods, and a [`BindInterceptor`] through which it
//! reports each decision. A "no node fits" outcome is surfaced by writing an
//! unschedulable condition onto the pod, also through the interceptor.
//!
//! [`FitEngine`] is a small built-in engine that filters nodes by free
//! resources and node selectors and ranks them with weighted scores.

pub mod binder;
pub mod engine;
pub mod error;
pub mod fit;
pub mod scorer;

pub use binder::{BindInterceptor, PodRef};
pub use engine::{DecisionEngine, EngineContext, EngineFuture};
pub use error::{BindError, EngineError, EngineResult};
pub use fit::{FitEngine, Placement};
