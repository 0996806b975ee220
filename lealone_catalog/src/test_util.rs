//! Shared fixtures for the tests of this crate.
use std::sync::Arc;

use async_trait::async_trait;
use lealone_id::{HostId, StorageId};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use uuid::Uuid;

use crate::catalog::{Catalog, DdlArgs};
use crate::database::{Database, RunMode, Storage, StorageMoveError};
use crate::ddl::{DdlContext, StatementType};
use crate::object::{CatalogObject, ObjectKind};
use crate::router::{PropagationHook, TopologyResolver};
use crate::session::Session;

pub(crate) const TEST_NODE_ID: &str = "127.0.0.1:9210";

pub(crate) fn test_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new(DdlArgs::new(TEST_NODE_ID)))
}

/// A session on the system database, running as a freshly created admin user
pub(crate) fn admin_session(catalog: &Catalog) -> Arc<Session> {
    let name = format!("root_{}", Uuid::new_v4().simple());
    session_as(catalog, CatalogObject::new(name, ObjectKind::User { admin: true }))
}

/// A session on the system database, running as a user without admin rights
pub(crate) fn user_session(catalog: &Catalog, name: &str) -> Arc<Session> {
    session_as(catalog, CatalogObject::new(name, ObjectKind::User { admin: false }))
}

fn session_as(catalog: &Catalog, user: CatalogObject) -> Arc<Session> {
    let system = catalog.system_database();
    let user = system.add_object(user).unwrap();
    Arc::new(Session::new(system, user))
}

/// A context for statements, spawning migrations on the current tokio runtime
pub(crate) fn test_context(
    catalog: Arc<Catalog>,
    resolver: Arc<RecordingResolver>,
    propagation: Arc<RecordingPropagation>,
) -> DdlContext {
    DdlContext::new(catalog, resolver, propagation, Handle::current())
}

#[derive(Debug)]
pub(crate) struct RecordingResolver {
    hosts: Vec<HostId>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl RecordingResolver {
    pub(crate) fn new<'a>(hosts: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            hosts: hosts.into_iter().map(HostId::from).collect(),
            calls: Mutex::new(vec![]),
        }
    }

    /// Database name and `for_write` of every resolution, in call order
    pub(crate) fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().clone()
    }
}

impl TopologyResolver for RecordingResolver {
    fn host_ids(&self, db: &Database, for_write: bool) -> Vec<HostId> {
        self.calls.lock().push((db.name().to_string(), for_write));
        self.hosts.clone()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingPropagation {
    calls: Mutex<Vec<(StatementType, String)>>,
}

impl RecordingPropagation {
    pub(crate) fn calls(&self) -> Vec<(StatementType, String)> {
        self.calls.lock().clone()
    }
}

impl PropagationHook for RecordingPropagation {
    fn apply(&self, statement: StatementType, db: &Database) {
        self.calls.lock().push((statement, db.name().to_string()));
    }
}

/// Holds back the moves of a gated [`TestStorage`] until opened.
#[derive(Debug)]
pub(crate) struct Gate(watch::Sender<bool>);

impl Gate {
    pub(crate) fn open(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug)]
pub(crate) struct TestStorage {
    id: StorageId,
    name: String,
    fail: bool,
    gate: Option<watch::Receiver<bool>>,
    moves: Mutex<Vec<(Vec<HostId>, RunMode)>>,
}

impl TestStorage {
    fn build(name: impl Into<String>, fail: bool, gate: Option<watch::Receiver<bool>>) -> Self {
        Self {
            id: StorageId::new(),
            name: name.into(),
            fail,
            gate,
            moves: Mutex::new(vec![]),
        }
    }

    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(name, false, None))
    }

    /// A storage whose every move fails
    pub(crate) fn failing(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(name, true, None))
    }

    /// A storage whose moves block until the returned gate is opened
    pub(crate) fn gated(name: impl Into<String>) -> (Arc<Self>, Gate) {
        let (tx, rx) = watch::channel(false);
        (Arc::new(Self::build(name, false, Some(rx))), Gate(tx))
    }

    /// Completed moves, in order
    pub(crate) fn moves(&self) -> Vec<(Vec<HostId>, RunMode)> {
        self.moves.lock().clone()
    }
}

#[async_trait]
impl Storage for TestStorage {
    fn id(&self) -> StorageId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn move_to(
        &self,
        host_ids: &[HostId],
        run_mode: RunMode,
    ) -> Result<(), StorageMoveError> {
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            gate.wait_for(|open| *open)
                .await
                .map_err(|e| anyhow::anyhow!("gate of {} dropped: {e}", self.name))?;
        }
        if self.fail {
            return Err(anyhow::anyhow!("disk full while moving {}", self.name).into());
        }
        self.moves.lock().push((host_ids.to_vec(), run_mode));
        Ok(())
    }
}
