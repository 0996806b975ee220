//! The in-memory descriptor of a single database.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use hashbrown::HashSet;
use indexmap::IndexMap;
use lealone_id::{DbId, HostId, ObjectId, SerdeVecMap, StorageId};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::object::{CatalogObject, DatabaseObjects, DbObjectType};

/// Deployment topology of a database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Local to a single process, no network endpoint
    #[default]
    Embedded,
    /// A single authoritative endpoint
    ClientServer,
    /// Multiple synchronized copies
    Replication,
    /// Partitioned across endpoints
    Sharding,
}

impl RunMode {
    /// Whether moving from `old` to `new` requires the database's storages to be migrated.
    ///
    /// Only a change away from a single endpoint into a replicated or sharded topology moves
    /// pages. Widening further or narrowing never does.
    pub fn triggers_migration(old: Self, new: Self) -> bool {
        old == Self::ClientServer && matches!(new, Self::Replication | Self::Sharding)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "EMBEDDED",
            Self::ClientServer => "CLIENT_SERVER",
            Self::Replication => "REPLICATION",
            Self::Sharding => "SHARDING",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid run mode: {0}")]
pub struct ParseRunModeError(String);

impl std::str::FromStr for RunMode {
    type Err = ParseRunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EMBEDDED" => Ok(Self::Embedded),
            "CLIENT_SERVER" => Ok(Self::ClientServer),
            "REPLICATION" => Ok(Self::Replication),
            "SHARDING" => Ok(Self::Sharding),
            _ => Err(ParseRunModeError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("storage move failed: {0:?}")]
pub struct StorageMoveError(#[from] anyhow::Error);

/// A physical storage owned by a database.
///
/// How pages are redistributed is up to the implementation, as are retries and idempotency of
/// repeated move requests.
#[async_trait]
pub trait Storage: std::fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> StorageId;

    fn name(&self) -> &str;

    /// Redistribute this storage's data onto `host_ids` for the given run mode.
    async fn move_to(&self, host_ids: &[HostId], run_mode: RunMode)
    -> Result<(), StorageMoveError>;
}

/// Settings of a database that ALTER DATABASE may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub run_mode: RunMode,
    pub replication_properties: BTreeMap<String, String>,
}

/// Descriptor of a database: its settings, endpoints, storages and owned objects.
///
/// Settings are only changed while the catalog's DATABASE lock is held. The owned objects sit
/// behind the database's own metadata lock, see [`Database::lock_meta`].
#[derive(Debug)]
pub struct Database {
    id: DbId,
    name: Arc<str>,
    settings: RwLock<DatabaseSettings>,
    /// Hosts that are target endpoints of this database; empty means every node is
    endpoints: RwLock<Vec<HostId>>,
    storages: RwLock<IndexMap<StorageId, Arc<dyn Storage>>>,
    objects: Mutex<DatabaseObjects>,
    prepared_statements: Mutex<HashSet<Arc<str>>>,
    delete_files_on_disconnect: AtomicBool,
}

impl Database {
    pub fn new(name: impl Into<Arc<str>>, run_mode: RunMode) -> Self {
        Self::new_with_id(DbId::new(), name, run_mode)
    }

    pub fn new_with_id(id: DbId, name: impl Into<Arc<str>>, run_mode: RunMode) -> Self {
        Self {
            id,
            name: name.into(),
            settings: RwLock::new(DatabaseSettings {
                run_mode,
                replication_properties: BTreeMap::new(),
            }),
            endpoints: RwLock::new(vec![]),
            storages: RwLock::new(IndexMap::new()),
            objects: Mutex::new(DatabaseObjects::new()),
            prepared_statements: Mutex::new(HashSet::new()),
            delete_files_on_disconnect: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }

    pub fn name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn run_mode(&self) -> RunMode {
        self.settings.read().run_mode
    }

    pub fn settings(&self) -> DatabaseSettings {
        self.settings.read().clone()
    }

    pub fn replication_properties(&self) -> BTreeMap<String, String> {
        self.settings.read().replication_properties.clone()
    }

    pub(crate) fn set_run_mode(&self, run_mode: RunMode) {
        self.settings.write().run_mode = run_mode;
    }

    /// Merge `properties` into the existing replication properties. Keys that are not given
    /// keep their current value.
    pub(crate) fn merge_replication_properties(&self, properties: &BTreeMap<String, String>) {
        self.settings.write().replication_properties.extend(
            properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
    }

    /// Put back settings taken with [`Database::settings`] when a change could not be persisted.
    pub(crate) fn restore_settings(&self, settings: DatabaseSettings) {
        *self.settings.write() = settings;
    }

    pub fn endpoints(&self) -> Vec<HostId> {
        self.endpoints.read().clone()
    }

    pub fn set_endpoints(&self, endpoints: impl IntoIterator<Item = HostId>) {
        *self.endpoints.write() = endpoints.into_iter().collect();
    }

    pub fn add_storage(&self, storage: Arc<dyn Storage>) {
        self.storages.write().insert(storage.id(), storage);
    }

    /// The storages owned by this database, in the order they were added
    pub fn storages(&self) -> Vec<Arc<dyn Storage>> {
        self.storages.read().values().map(Arc::clone).collect()
    }

    /// Take the metadata lock of this database.
    ///
    /// Statements changing the objects of a single database serialize on this lock rather than
    /// on the catalog-wide DATABASE lock.
    pub fn lock_meta(&self) -> MutexGuard<'_, DatabaseObjects> {
        self.objects.lock()
    }

    pub fn add_object(&self, object: CatalogObject) -> Result<Arc<CatalogObject>> {
        self.lock_meta().add(object)
    }

    pub fn find_object(&self, object_type: DbObjectType, name: &str) -> Option<Arc<CatalogObject>> {
        self.lock_meta().get(object_type, name)
    }

    pub fn contains_object(&self, object_type: DbObjectType, id: ObjectId) -> bool {
        self.lock_meta().get_by_id(object_type, id).is_some()
    }

    pub fn cache_prepared_statement(&self, sql: impl Into<Arc<str>>) {
        self.prepared_statements.lock().insert(sql.into());
    }

    pub fn prepared_statement_count(&self) -> usize {
        self.prepared_statements.lock().len()
    }

    /// Forget all cached prepared statements, they may reference objects about to go away.
    pub fn clean_prepared_statements(&self) {
        self.prepared_statements.lock().clear();
    }

    pub fn set_delete_files_on_disconnect(&self, delete: bool) {
        self.delete_files_on_disconnect.store(delete, Ordering::SeqCst);
    }

    pub fn delete_files_on_disconnect(&self) -> bool {
        self.delete_files_on_disconnect.load(Ordering::SeqCst)
    }

    /// Produce a point-in-time copy of this descriptor
    pub fn snapshot(&self) -> DatabaseSnapshot {
        DatabaseSnapshot {
            id: self.id,
            name: self.name(),
            settings: self.settings(),
            endpoints: self.endpoints(),
            storages: self.storages.read().keys().copied().collect(),
            objects: self
                .lock_meta()
                .iter()
                .map(|o| (o.id, o.as_ref().clone()))
                .collect(),
        }
    }
}

/// Serializable copy of a [`Database`] descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub id: DbId,
    pub name: Arc<str>,
    pub settings: DatabaseSettings,
    pub endpoints: Vec<HostId>,
    pub storages: Vec<StorageId>,
    pub objects: SerdeVecMap<ObjectId, CatalogObject>,
}
