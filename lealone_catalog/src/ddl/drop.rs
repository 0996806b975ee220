use std::sync::Arc;

use tracing::{debug, info};

use super::cascade::{self, CascadeReport};
use super::{DatabaseStatement, DdlContext, StatementType};
use crate::database::Database;
use crate::object::DbObjectType;
use crate::session::Session;
use crate::{CatalogError, Result};

/// DROP DATABASE: unregister a database and, on its target endpoints, remove every object it
/// owns.
#[derive(Debug)]
pub struct DropDatabase {
    ctx: DdlContext,
    session: Arc<Session>,
    db_name: String,
    if_exists: bool,
    delete_files: bool,
}

/// Result of [`DropDatabase::execute`]
#[derive(Debug, Default)]
pub struct DropOutcome {
    /// The dropped database, `None` if it did not exist and IF EXISTS was given
    pub dropped: Option<Arc<Database>>,
    /// Set when this node is a target endpoint and ran the cascade
    pub cascade: Option<CascadeReport>,
}

impl DropDatabase {
    pub fn new(ctx: DdlContext, session: Arc<Session>, db_name: impl Into<String>) -> Self {
        Self {
            ctx,
            session,
            db_name: db_name.into(),
            if_exists: false,
            delete_files: false,
        }
    }

    pub fn set_if_exists(&mut self, if_exists: bool) {
        self.if_exists = if_exists;
    }

    pub fn set_delete_files(&mut self, delete_files: bool) {
        self.delete_files = delete_files;
    }

    pub fn execute(&self) -> Result<DropOutcome> {
        self.session.check_admin()?;
        let catalog = self.ctx.catalog();
        if catalog.is_system_database_name(&self.db_name) {
            return Err(CatalogError::CannotDropSystemDatabase(self.db_name.clone()));
        }
        debug!(
            db_name = %self.db_name,
            if_exists = self.if_exists,
            delete_files = self.delete_files,
            "drop database"
        );

        let outcome = {
            let _guard = catalog.lock(DbObjectType::Database);
            let Some(db) = catalog.lookup(&self.db_name) else {
                if self.if_exists {
                    debug!(db_name = %self.db_name, "database does not exist, nothing to drop");
                    return Ok(DropOutcome::default());
                }
                return Err(CatalogError::DatabaseNotFound(self.db_name.clone()));
            };

            catalog.unregister(&self.session, &db);
            let cascade = catalog.is_target_endpoint(&db).then(|| {
                let report = cascade::drop_all_objects(&db, &self.session);
                if self.delete_files {
                    self.session.database().set_delete_files_on_disconnect(true);
                }
                report
            });
            info!(
                db_name = db.name().as_ref(),
                removed_objects = cascade.as_ref().map_or(0, |r| r.removed.len()),
                "dropped database"
            );

            DropOutcome {
                dropped: Some(db),
                cascade,
            }
        };

        if let Some(db) = &outcome.dropped {
            self.ctx.propagate(StatementType::DropDatabase, db);
        }
        Ok(outcome)
    }
}

impl DatabaseStatement for DropDatabase {
    fn statement_type(&self) -> StatementType {
        StatementType::DropDatabase
    }

    fn update(&self) -> Result<u64> {
        self.execute()?;
        Ok(0)
    }
}
