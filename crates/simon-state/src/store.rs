//! In-memory redb store for the synthetic cluster.
//!
//! Provides create/get/update/list per object kind. Each operation runs in
//! its own redb transaction, so it is atomic with respect to concurrent
//! callers; there is no ordering guarantee across different objects.
//! Creates fail if the key exists, updates fail if it does not.

use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use simon_core::{
    DaemonSet, Deployment, Node, ObjectKind, ObjectMeta, Pod, RawObject, StatefulSet,
};

use crate::error::{StateError, StateResult};
use crate::tables::table_for;
use crate::watch::{PodEvent, PodEventBus, PodEventType, PodWatch};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// A typed object with a fixed kind.
pub trait StoredObject: Serialize + DeserializeOwned {
    const KIND: ObjectKind;

    fn meta(&self) -> &ObjectMeta;

    /// Pods are the only kind that publish change events.
    fn as_pod(&self) -> Option<&Pod> {
        None
    }
}

impl StoredObject for Node {
    const KIND: ObjectKind = ObjectKind::Node;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl StoredObject for Pod {
    const KIND: ObjectKind = ObjectKind::Pod;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn as_pod(&self) -> Option<&Pod> {
        Some(self)
    }
}

impl StoredObject for Deployment {
    const KIND: ObjectKind = ObjectKind::Deployment;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl StoredObject for StatefulSet {
    const KIND: ObjectKind = ObjectKind::StatefulSet;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl StoredObject for DaemonSet {
    const KIND: ObjectKind = ObjectKind::DaemonSet;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Clone, Copy)]
enum WriteMode {
    Create,
    Update,
}

/// Build the table key for an object of `kind`.
pub fn object_key(kind: ObjectKind, meta: &ObjectMeta) -> String {
    if kind.is_cluster_scoped() {
        meta.name.clone()
    } else {
        meta.key()
    }
}

/// Thread-safe synthetic cluster store.
#[derive(Clone)]
pub struct ClusterStore {
    db: Arc<Database>,
    bus: Arc<PodEventBus>,
    scheduler_name: Arc<str>,
}

impl ClusterStore {
    /// Create an empty in-memory store. Pod changes are published only for
    /// pods targeting `scheduler_name`.
    pub fn open_in_memory(scheduler_name: &str) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            bus: Arc::new(PodEventBus::default()),
            scheduler_name: Arc::from(scheduler_name),
        };
        store.ensure_tables()?;
        debug!(%scheduler_name, "in-memory cluster store opened");
        Ok(store)
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }

    /// Create all tables so reads on empty kinds succeed.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for kind in ObjectKind::ALL {
            txn.open_table(table_for(kind)).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Change bus ─────────────────────────────────────────────────

    /// Subscribe to pod changes. Only pods for this store's scheduler are
    /// ever published; `filter` narrows further.
    pub fn subscribe<F>(&self, filter: F) -> PodWatch
    where
        F: Fn(&PodEvent) -> bool + Send + Sync + 'static,
    {
        self.bus.subscribe(Box::new(filter))
    }

    fn publish(&self, event_type: PodEventType, pod: &Pod) {
        if pod.scheduler_name() == &*self.scheduler_name {
            self.bus.publish(event_type, pod);
        }
    }

    // ── Typed objects ──────────────────────────────────────────────

    pub fn create<T: StoredObject>(&self, obj: &T) -> StateResult<()> {
        let key = object_key(T::KIND, obj.meta());
        let value = serde_json::to_vec(obj).map_err(map_err!(Serialize))?;
        self.write(T::KIND, &key, &value, WriteMode::Create)?;
        if let Some(pod) = obj.as_pod() {
            self.publish(PodEventType::Added, pod);
        }
        Ok(())
    }

    pub fn update<T: StoredObject>(&self, obj: &T) -> StateResult<()> {
        let key = object_key(T::KIND, obj.meta());
        let value = serde_json::to_vec(obj).map_err(map_err!(Serialize))?;
        self.write(T::KIND, &key, &value, WriteMode::Update)?;
        if let Some(pod) = obj.as_pod() {
            self.publish(PodEventType::Modified, pod);
        }
        Ok(())
    }

    pub fn get<T: StoredObject>(&self, key: &str) -> StateResult<Option<T>> {
        self.read(T::KIND, key)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(map_err!(Deserialize)))
            .transpose()
    }

    /// Point-in-time snapshot of every object of the kind, in key order.
    pub fn list<T: StoredObject>(&self) -> StateResult<Vec<T>> {
        self.scan(T::KIND)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(map_err!(Deserialize)))
            .collect()
    }

    // ── Nodes ──────────────────────────────────────────────────────

    pub fn create_node(&self, node: &Node) -> StateResult<()> {
        self.create(node)?;
        debug!(node = %node.name(), fake = node.is_fake(), "node stored");
        Ok(())
    }

    pub fn get_node(&self, name: &str) -> StateResult<Option<Node>> {
        self.get(name)
    }

    pub fn list_nodes(&self) -> StateResult<Vec<Node>> {
        self.list()
    }

    // ── Pods ───────────────────────────────────────────────────────

    pub fn create_pod(&self, pod: &Pod) -> StateResult<()> {
        self.create(pod)
    }

    pub fn update_pod(&self, pod: &Pod) -> StateResult<()> {
        self.update(pod)
    }

    pub fn get_pod(&self, namespace: &str, name: &str) -> StateResult<Option<Pod>> {
        self.get(&ObjectMeta::named(namespace, name).key())
    }

    pub fn list_pods(&self) -> StateResult<Vec<Pod>> {
        self.list()
    }

    // ── Workloads ──────────────────────────────────────────────────

    pub fn list_daemon_sets(&self) -> StateResult<Vec<DaemonSet>> {
        self.list()
    }

    /// Create nodes and pods in one transaction. Either every object is
    /// stored or none is; pod events are published after the commit.
    pub fn create_nodes_and_pods(&self, nodes: &[Node], pods: &[Pod]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn
                .open_table(table_for(ObjectKind::Node))
                .map_err(map_err!(Table))?;
            for node in nodes {
                let key = object_key(ObjectKind::Node, &node.metadata);
                let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
                insert_new(&mut table, ObjectKind::Node, &key, &value)?;
            }
        }
        {
            let mut table = txn
                .open_table(table_for(ObjectKind::Pod))
                .map_err(map_err!(Table))?;
            for pod in pods {
                let key = object_key(ObjectKind::Pod, &pod.metadata);
                let value = serde_json::to_vec(pod).map_err(map_err!(Serialize))?;
                insert_new(&mut table, ObjectKind::Pod, &key, &value)?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        for pod in pods {
            self.publish(PodEventType::Added, pod);
        }
        debug!(nodes = nodes.len(), pods = pods.len(), "batch stored");
        Ok(())
    }

    // ── Opaque kinds ───────────────────────────────────────────────

    /// Store an object the simulator never interprets.
    pub fn create_raw(&self, kind: ObjectKind, obj: &RawObject) -> StateResult<()> {
        let key = object_key(kind, &obj.metadata);
        let value = serde_json::to_vec(obj).map_err(map_err!(Serialize))?;
        self.write(kind, &key, &value, WriteMode::Create)
    }

    pub fn get_raw(&self, kind: ObjectKind, key: &str) -> StateResult<Option<RawObject>> {
        self.read(kind, key)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(map_err!(Deserialize)))
            .transpose()
    }

    pub fn list_raw(&self, kind: ObjectKind) -> StateResult<Vec<RawObject>> {
        self.scan(kind)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(map_err!(Deserialize)))
            .collect()
    }

    /// Number of stored objects of a kind.
    pub fn count(&self, kind: ObjectKind) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_for(kind)).map_err(map_err!(Table))?;
        table.len().map_err(map_err!(Read))
    }

    // ── Raw table access ───────────────────────────────────────────

    fn write(&self, kind: ObjectKind, key: &str, value: &[u8], mode: WriteMode) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_for(kind)).map_err(map_err!(Table))?;
            match mode {
                WriteMode::Create => insert_new(&mut table, kind, key, value)?,
                WriteMode::Update => {
                    if table.get(key).map_err(map_err!(Read))?.is_none() {
                        return Err(StateError::NotFound {
                            kind: kind.as_str(),
                            key: key.to_string(),
                        });
                    }
                    table.insert(key, value).map_err(map_err!(Write))?;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn read(&self, kind: ObjectKind, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_for(kind)).map_err(map_err!(Table))?;
        let value = table.get(key).map_err(map_err!(Read))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn scan(&self, kind: ObjectKind) -> StateResult<Vec<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_for(kind)).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(value.value().to_vec());
        }
        Ok(results)
    }
}

/// Insert `key` into an open table, failing if it is already present.
fn insert_new(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    kind: ObjectKind,
    key: &str,
    value: &[u8],
) -> StateResult<()> {
    if table.get(key).map_err(map_err!(Read))?.is_some() {
        return Err(StateError::AlreadyExists {
            kind: kind.as_str(),
            key: key.to_string(),
        });
    }
    table.insert(key, value).map_err(map_err!(Write))?;
    Ok(())
}
