//! The global catalog: registry of every database known to this node.
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use bimap::BiHashMap;
use hashbrown::HashMap;
use lealone_clap_blocks::catalog::CatalogConfig;
use lealone_id::{DbId, HostId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::{Database, DatabaseSnapshot, RunMode};
use crate::lock::{CatalogLockGuard, CatalogLocks};
use crate::object::DbObjectType;
use crate::session::Session;
use crate::{CatalogError, Result};

/// Name of the system database, which hosts the catalog itself and can never be dropped
pub const SYSTEM_DATABASE_NAME: &str = "lealone";

/// Arguments that control how DDL statements behave on this node
#[derive(Debug, Clone)]
pub struct DdlArgs {
    /// Host id of the executing node
    pub node_id: HostId,
    pub storage_move_concurrency: NonZeroUsize,
    pub storage_move_timeout: Option<Duration>,
}

impl DdlArgs {
    pub fn new(node_id: impl Into<HostId>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Default::default()
        }
    }
}

impl Default for DdlArgs {
    fn default() -> Self {
        Self::from(&CatalogConfig::default())
    }
}

impl From<&CatalogConfig> for DdlArgs {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            node_id: HostId::from(config.node_id.as_str()),
            storage_move_concurrency: config.storage_move_concurrency,
            storage_move_timeout: config.storage_move_timeout,
        }
    }
}

/// The sequence number of the catalog, incremented on every change to it
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
pub struct Catalog {
    args: DdlArgs,
    locks: Arc<CatalogLocks>,
    system_database: Arc<Database>,
    inner: RwLock<InnerCatalog>,
}

#[derive(Debug, Default)]
struct InnerCatalog {
    databases: HashMap<DbId, Arc<Database>>,
    /// Maps ids to lower-cased database names, names are case-insensitive
    db_map: BiHashMap<DbId, Arc<str>>,
    /// Persisted form of each registered database
    meta_records: BTreeMap<DbId, String>,
    /// Copies taken on this node for databases it is a target endpoint of
    endpoint_snapshots: HashMap<DbId, Arc<DatabaseSnapshot>>,
    sequence: SequenceNumber,
    /// If true, the catalog has changed since it was last persisted
    updated: bool,
}

impl InnerCatalog {
    fn bump(&mut self) {
        self.sequence = self.sequence.next();
        self.updated = true;
    }
}

fn lookup_key(name: &str) -> Arc<str> {
    name.to_lowercase().into()
}

impl Catalog {
    pub fn new(args: DdlArgs) -> Self {
        Self::new_with_locks(args, Arc::new(CatalogLocks::new()))
    }

    /// Create a catalog that serializes its statements on the given `locks`.
    pub fn new_with_locks(args: DdlArgs, locks: Arc<CatalogLocks>) -> Self {
        let system_database = Arc::new(Database::new(SYSTEM_DATABASE_NAME, RunMode::Embedded));
        let catalog = Self {
            args,
            locks,
            system_database: Arc::clone(&system_database),
            inner: RwLock::new(InnerCatalog::default()),
        };
        catalog.insert(system_database);
        catalog
    }

    pub fn args(&self) -> &DdlArgs {
        &self.args
    }

    pub fn node_id(&self) -> &HostId {
        &self.args.node_id
    }

    pub fn locks(&self) -> &Arc<CatalogLocks> {
        &self.locks
    }

    pub fn lock(&self, object_type: DbObjectType) -> CatalogLockGuard<'_> {
        self.locks.lock(object_type)
    }

    pub fn system_database(&self) -> Arc<Database> {
        Arc::clone(&self.system_database)
    }

    pub fn is_system_database_name(&self, name: &str) -> bool {
        SYSTEM_DATABASE_NAME.eq_ignore_ascii_case(name)
    }

    /// Look up a registered database by name, ignoring case
    pub fn lookup(&self, name: &str) -> Option<Arc<Database>> {
        let inner = self.inner.read();
        inner
            .db_map
            .get_by_right(&lookup_key(name))
            .and_then(|id| inner.databases.get(id))
            .cloned()
    }

    pub fn db_name_to_id(&self, name: &str) -> Option<DbId> {
        self.inner.read().db_map.get_by_right(&lookup_key(name)).copied()
    }

    pub fn db_exists(&self, id: DbId) -> bool {
        self.inner.read().databases.contains_key(&id)
    }

    pub fn list_databases(&self) -> Vec<Arc<str>> {
        let mut names: Vec<_> = self
            .inner
            .read()
            .databases
            .values()
            .map(|db| db.name())
            .collect();
        names.sort();
        names
    }

    /// Create and register a new database.
    ///
    /// Takes the DATABASE lock; fails if a database of the same name, in any case, exists.
    pub fn create_database(
        &self,
        session: &Session,
        name: &str,
        run_mode: RunMode,
    ) -> Result<Arc<Database>> {
        session.check_admin()?;
        let _guard = self.lock(DbObjectType::Database);
        let db = Arc::new(Database::new(name, run_mode));
        self.register(session, Arc::clone(&db))?;
        Ok(db)
    }

    /// Add `db` to the registry and persist its meta record.
    ///
    /// Fails if a database of the same name, in any case, or with the same id is registered.
    /// Callers must hold the DATABASE lock.
    pub fn register(&self, session: &Session, db: Arc<Database>) -> Result<()> {
        let record = serde_json::to_string(&db.snapshot())?;
        let mut inner = self.inner.write();
        if inner.db_map.contains_right(&lookup_key(&db.name()))
            || inner.databases.contains_key(&db.id())
        {
            return Err(CatalogError::AlreadyExists {
                object_type: DbObjectType::Database,
                name: db.name().to_string(),
            });
        }
        info!(
            db_name = db.name().as_ref(),
            db_id = %db.id(),
            session_id = %session.id(),
            "register database"
        );
        inner.meta_records.insert(db.id(), record);
        Self::insert_into(&mut inner, db);
        Ok(())
    }

    fn insert(&self, db: Arc<Database>) {
        Self::insert_into(&mut self.inner.write(), db);
    }

    fn insert_into(inner: &mut InnerCatalog, db: Arc<Database>) {
        inner.db_map.insert(db.id(), lookup_key(&db.name()));
        inner.databases.insert(db.id(), db);
        inner.bump();
    }

    /// Remove `db` from the registry. Subsequent lookups no longer find it.
    ///
    /// Callers must hold the DATABASE lock.
    pub fn unregister(&self, session: &Session, db: &Database) -> Option<Arc<Database>> {
        let mut inner = self.inner.write();
        let removed = inner.databases.remove(&db.id())?;
        inner.db_map.remove_by_left(&db.id());
        inner.meta_records.remove(&db.id());
        inner.endpoint_snapshots.remove(&db.id());
        inner.bump();
        info!(
            db_name = db.name().as_ref(),
            db_id = %db.id(),
            session_id = %session.id(),
            "unregister database"
        );
        Some(removed)
    }

    /// Persist the current state of `db` into its meta record.
    ///
    /// Callers must hold the DATABASE lock.
    pub fn update_meta(&self, session: &Session, db: &Database) -> Result<()> {
        let record = serde_json::to_string(&db.snapshot())?;
        let mut inner = self.inner.write();
        if !inner.databases.contains_key(&db.id()) {
            return Err(CatalogError::DatabaseNotFound(db.name().to_string()));
        }
        inner.meta_records.insert(db.id(), record);
        inner.bump();
        debug!(
            db_name = db.name().as_ref(),
            session_id = %session.id(),
            sequence = inner.sequence.as_u32(),
            "updated database meta record"
        );
        Ok(())
    }

    /// The persisted meta record of a registered database
    pub fn meta_record(&self, id: DbId) -> Option<DatabaseSnapshot> {
        self.inner
            .read()
            .meta_records
            .get(&id)
            .and_then(|record| serde_json::from_str(record).ok())
    }

    /// Keep a local copy of `db` on this node
    pub fn record_endpoint_snapshot(&self, db: &Database) -> Arc<DatabaseSnapshot> {
        let snapshot = Arc::new(db.snapshot());
        self.inner
            .write()
            .endpoint_snapshots
            .insert(db.id(), Arc::clone(&snapshot));
        snapshot
    }

    pub fn endpoint_snapshot(&self, id: DbId) -> Option<Arc<DatabaseSnapshot>> {
        self.inner.read().endpoint_snapshots.get(&id).cloned()
    }

    /// Whether this node performs the physical effects of statements on `db`
    pub fn is_target_endpoint(&self, db: &Database) -> bool {
        let endpoints = db.endpoints();
        endpoints.is_empty() || endpoints.contains(&self.args.node_id)
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.inner.read().sequence
    }

    pub fn is_updated(&self) -> bool {
        self.inner.read().updated
    }

    /// After the catalog has been persisted, mark it as not updated, if the sequence number
    /// matches. If it doesn't then the catalog was updated while persistence was running and
    /// will need to be persisted again.
    pub fn set_updated_false_if_sequence_matches(&self, sequence_number: SequenceNumber) {
        let mut inner = self.inner.write();
        if inner.sequence == sequence_number {
            inner.updated = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_util::{admin_session, test_catalog};

    #[test]
    fn system_database_is_registered() {
        let catalog = test_catalog();
        let db = catalog.lookup("LEALONE").unwrap();
        assert_eq!(catalog.system_database().id(), db.id());
        assert!(catalog.is_system_database_name("Lealone"));
        assert!(!catalog.is_system_database_name("sales"));
    }

    #[test]
    fn create_and_lookup_ignore_case() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let db = catalog
            .create_database(&session, "Sales", RunMode::ClientServer)
            .unwrap();
        assert_eq!(db.id(), catalog.lookup("sales").unwrap().id());
        assert_eq!(Some(db.id()), catalog.db_name_to_id("SALES"));

        let err = catalog
            .create_database(&session, "SALES", RunMode::Embedded)
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::AlreadyExists {
                object_type: DbObjectType::Database,
                ..
            }
        ));
        assert_eq!(
            vec![Arc::<str>::from("Sales"), Arc::from("lealone")],
            catalog.list_databases()
        );
    }

    #[test]
    fn register_rejects_a_name_taken_in_any_case() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let first = Arc::new(Database::new("sales", RunMode::ClientServer));
        catalog.register(&session, Arc::clone(&first)).unwrap();
        let sequence = catalog.sequence_number();

        let err = catalog
            .register(&session, Arc::new(Database::new("SALES", RunMode::Sharding)))
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::AlreadyExists {
                object_type: DbObjectType::Database,
                ..
            }
        ));
        assert_eq!(first.id(), catalog.lookup("Sales").unwrap().id());
        assert_eq!(
            vec![Arc::<str>::from("lealone"), Arc::from("sales")],
            catalog.list_databases()
        );
        assert_eq!(sequence, catalog.sequence_number());

        assert!(catalog.register(&session, Arc::clone(&first)).is_err());
    }

    #[test]
    fn unregister_removes_all_traces() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let db = catalog
            .create_database(&session, "reports", RunMode::ClientServer)
            .unwrap();
        catalog.record_endpoint_snapshot(&db);
        assert!(catalog.meta_record(db.id()).is_some());

        let removed = catalog.unregister(&session, &db).unwrap();
        assert_eq!(db.id(), removed.id());
        assert!(catalog.lookup("reports").is_none());
        assert!(!catalog.db_exists(db.id()));
        assert!(catalog.meta_record(db.id()).is_none());
        assert!(catalog.endpoint_snapshot(db.id()).is_none());
        assert!(catalog.unregister(&session, &db).is_none());
    }

    #[test]
    fn update_meta_persists_settings_and_bumps_sequence() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let db = catalog
            .create_database(&session, "sales", RunMode::ClientServer)
            .unwrap();
        let before = catalog.sequence_number();
        db.set_run_mode(RunMode::Sharding);
        catalog.update_meta(&session, &db).unwrap();

        assert_eq!(before.next(), catalog.sequence_number());
        assert_eq!(
            RunMode::Sharding,
            catalog.meta_record(db.id()).unwrap().settings.run_mode
        );
        assert!(catalog.is_updated());
        catalog.set_updated_false_if_sequence_matches(before);
        assert!(catalog.is_updated());
        catalog.set_updated_false_if_sequence_matches(catalog.sequence_number());
        assert!(!catalog.is_updated());
    }

    #[test]
    fn update_meta_of_unregistered_database_fails() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let db = Database::new("ghost", RunMode::ClientServer);
        assert!(matches!(
            catalog.update_meta(&session, &db),
            Err(CatalogError::DatabaseNotFound(_))
        ));
    }

    #[test]
    fn catalogs_can_share_injected_locks() {
        let locks = Arc::new(CatalogLocks::new());
        let a = Catalog::new_with_locks(DdlArgs::default(), Arc::clone(&locks));
        let b = Catalog::new_with_locks(DdlArgs::default(), Arc::clone(&locks));
        let _guard = a.lock(DbObjectType::Database);
        assert!(b.locks().try_lock(DbObjectType::Database).is_none());

        let isolated = test_catalog();
        assert!(isolated.locks().try_lock(DbObjectType::Database).is_some());
    }

    #[test]
    fn target_endpoint_follows_node_id() {
        let catalog = Catalog::new(DdlArgs::new("10.0.0.1:9210"));
        let db = Database::new("sales", RunMode::ClientServer);
        assert!(catalog.is_target_endpoint(&db), "no endpoints means every node");
        db.set_endpoints([HostId::from("10.0.0.2:9210")]);
        assert!(!catalog.is_target_endpoint(&db));
        db.set_endpoints([HostId::from("10.0.0.2:9210"), HostId::from("10.0.0.1:9210")]);
        assert!(catalog.is_target_endpoint(&db));
    }
}
