//! Contracts of the cluster-facing collaborators used by DDL statements.
use lealone_id::HostId;

use crate::database::Database;
use crate::ddl::StatementType;

/// Resolves which hosts a database is placed on.
pub trait TopologyResolver: std::fmt::Debug + Send + Sync + 'static {
    /// The ordered host ids serving `db`, for writes when `for_write` is set.
    fn host_ids(&self, db: &Database, for_write: bool) -> Vec<HostId>;
}

/// Broadcasts a statement that was applied locally, so the other nodes of the cluster converge
/// on the same catalog state.
///
/// Invoked once per successful local mutation, after the catalog lock has been released.
pub trait PropagationHook: std::fmt::Debug + Send + Sync + 'static {
    fn apply(&self, statement: StatementType, db: &Database);
}

/// A [`PropagationHook`] for single node deployments, where there is nothing to propagate to
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPropagation;

impl PropagationHook for NoopPropagation {
    fn apply(&self, _statement: StatementType, _db: &Database) {}
}

/// A [`TopologyResolver`] that places every database on the same fixed hosts
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    hosts: Vec<HostId>,
}

impl StaticTopology {
    pub fn new(hosts: impl IntoIterator<Item = HostId>) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
        }
    }
}

impl TopologyResolver for StaticTopology {
    fn host_ids(&self, _db: &Database, _for_write: bool) -> Vec<HostId> {
        self.hosts.clone()
    }
}
