//! DDL statements on databases.
//!
//! Statements are built by the SQL layer with already validated fields, then run through
//! [`DatabaseStatement::update`]. Every statement follows the same shape: checks that need no
//! lock, then the catalog mutation under the DATABASE lock (plus physical work if this node is a
//! target endpoint of the database), then propagation to the rest of the cluster.
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use crate::Result;
use crate::catalog::Catalog;
use crate::database::Database;
use crate::migration::MigrationScheduler;
use crate::router::{PropagationHook, TopologyResolver};

mod alter;
pub mod cascade;
mod drop;

pub use alter::{AlterDatabase, AlterOutcome};
pub use drop::{DropDatabase, DropOutcome};

/// Discriminates statements for dispatch by the execution layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    AlterDatabase,
    DropDatabase,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlterDatabase => "ALTER DATABASE",
            Self::DropDatabase => "DROP DATABASE",
        }
    }
}

impl std::fmt::Display for StatementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait DatabaseStatement: std::fmt::Debug + Send + Sync {
    fn statement_type(&self) -> StatementType;

    /// Run the statement, returning the number of affected rows, which is always 0.
    fn update(&self) -> Result<u64>;
}

/// What a statement needs from the node it runs on.
#[derive(Debug, Clone)]
pub struct DdlContext {
    catalog: Arc<Catalog>,
    propagation: Arc<dyn PropagationHook>,
    migrations: MigrationScheduler,
}

impl DdlContext {
    /// Create a context whose migrations are spawned on `runtime`.
    pub fn new(
        catalog: Arc<Catalog>,
        resolver: Arc<dyn TopologyResolver>,
        propagation: Arc<dyn PropagationHook>,
        runtime: Handle,
    ) -> Self {
        let migrations = MigrationScheduler::new(runtime, resolver, catalog.args());
        Self {
            catalog,
            propagation,
            migrations,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub(crate) fn migrations(&self) -> &MigrationScheduler {
        &self.migrations
    }

    pub(crate) fn propagate(&self, statement: StatementType, db: &Database) {
        debug!(%statement, db_name = db.name().as_ref(), "propagating statement");
        self.propagation.apply(statement, db);
    }
}
