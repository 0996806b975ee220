use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{DatabaseStatement, DdlContext, StatementType};
use crate::database::{Database, RunMode};
use crate::migration::MigrationHandle;
use crate::object::DbObjectType;
use crate::session::Session;
use crate::{CatalogError, Result};

/// ALTER DATABASE: change the run mode and replication properties of an existing database.
///
/// When the database leaves CLIENT_SERVER for REPLICATION or SHARDING on a target endpoint,
/// its storages are migrated in the background; the statement does not wait for that.
#[derive(Debug)]
pub struct AlterDatabase {
    ctx: DdlContext,
    session: Arc<Session>,
    db: Arc<Database>,
    parameters: Option<BTreeMap<String, String>>,
    replication_properties: Option<BTreeMap<String, String>>,
    run_mode: Option<RunMode>,
}

/// Result of [`AlterDatabase::execute`]
#[derive(Debug)]
pub struct AlterOutcome {
    pub old_run_mode: RunMode,
    pub new_run_mode: RunMode,
    /// Set when a storage migration was scheduled
    pub migration: Option<MigrationHandle>,
}

impl AlterDatabase {
    pub fn new(ctx: DdlContext, session: Arc<Session>, db: Arc<Database>) -> Self {
        Self {
            ctx,
            session,
            db,
            parameters: None,
            replication_properties: None,
            run_mode: None,
        }
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_replication_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.replication_properties = Some(properties);
        self
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = Some(run_mode);
        self
    }

    /// Apply the statement and hand back the migration it scheduled, if any.
    ///
    /// Dropping the returned [`MigrationHandle`] leaves the migration running detached, which
    /// is what [`update`][DatabaseStatement::update] does.
    pub fn execute(&self) -> Result<AlterOutcome> {
        self.session.check_admin()?;
        if self.parameters.as_ref().is_some_and(|p| !p.is_empty()) {
            return Err(CatalogError::FeatureNotSupported("ALTER DATABASE parameters"));
        }
        let catalog = self.ctx.catalog();
        let db_name = self.db.name();
        debug!(
            db_name = db_name.as_ref(),
            run_mode = ?self.run_mode,
            replication_properties = ?self.replication_properties,
            "alter database"
        );

        let outcome = {
            let _guard = catalog.lock(DbObjectType::Database);

            let previous = self.db.settings();
            let old_run_mode = previous.run_mode;
            if let Some(run_mode) = self.run_mode {
                self.db.set_run_mode(run_mode);
            }
            if let Some(properties) = &self.replication_properties {
                self.db.merge_replication_properties(properties);
            }
            if let Err(e) = catalog.update_meta(&self.session, &self.db) {
                self.db.restore_settings(previous);
                return Err(e);
            }
            let new_run_mode = self.db.run_mode();
            if old_run_mode != new_run_mode {
                info!(
                    db_name = db_name.as_ref(),
                    %old_run_mode,
                    %new_run_mode,
                    "database run mode changed"
                );
            }

            let mut migration = None;
            if catalog.is_target_endpoint(&self.db) {
                catalog.record_endpoint_snapshot(&self.db);
                if let Some(run_mode) = self
                    .run_mode
                    .filter(|new| RunMode::triggers_migration(old_run_mode, *new))
                {
                    migration = Some(
                        self.ctx
                            .migrations()
                            .schedule(Arc::clone(&self.db), run_mode),
                    );
                }
            }

            AlterOutcome {
                old_run_mode,
                new_run_mode,
                migration,
            }
        };

        self.ctx.propagate(StatementType::AlterDatabase, &self.db);
        Ok(outcome)
    }
}

impl DatabaseStatement for AlterDatabase {
    fn statement_type(&self) -> StatementType {
        StatementType::AlterDatabase
    }

    fn update(&self) -> Result<u64> {
        self.execute()?;
        Ok(0)
    }
}
