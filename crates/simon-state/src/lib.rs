//! simon-state: the synthetic cluster store.
//!
//! Backed by an in-memory [redb](https://docs.rs/redb) database: every
//! object kind has its own table, values are JSON-serialized, and keys are
//! `{namespace}/{name}` (or just `{name}` for cluster-scoped kinds).
//! Serializing on write and deserializing on read means callers only ever
//! hold copies; nothing they mutate can leak back into the store.
//!
//! Pod creates and updates for the configured scheduler are published on a
//! change bus (see [`watch`]). Publishing never waits on subscribers.
//!
//! The `ClusterStore` is `Clone` + `Send` + `Sync` and is shared across
//! the simulator, the decision engine, and the bind interceptor.

pub mod error;
pub mod store;
pub mod tables;
pub mod watch;

pub use error::{StateError, StateResult};
pub use store::{ClusterStore, StoredObject};
pub use watch::{PodEvent, PodEventType, PodWatch};
