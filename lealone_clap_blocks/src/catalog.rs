//! Config for the database catalog and its DDL operations.
use std::{num::NonZeroUsize, time::Duration};

/// Default host id used when none is configured.
pub const DEFAULT_NODE_ID: &str = "127.0.0.1:9210";

/// CLI config for the catalog.
#[derive(Debug, Clone, clap::Parser)]
pub struct CatalogConfig {
    /// Host id of this node.
    ///
    /// A node only performs the physical effects of a database statement (cascading object
    /// removal, storage migration) when it is one of the database's target endpoints.
    #[clap(
        long = "node-id",
        env = "LEALONE_NODE_ID",
        default_value = DEFAULT_NODE_ID,
        action
    )]
    pub node_id: String,

    /// Maximum number of storage move requests a single migration keeps in flight.
    #[clap(
        long = "storage-move-concurrency",
        env = "LEALONE_STORAGE_MOVE_CONCURRENCY",
        default_value = "1",
        action
    )]
    pub storage_move_concurrency: NonZeroUsize,

    /// Upper bound on each individual storage move request, e.g. `30s` or `5m`.
    ///
    /// A move that exceeds it is reported as failed. Unbounded when unset.
    #[clap(
        long = "storage-move-timeout",
        env = "LEALONE_STORAGE_MOVE_TIMEOUT",
        value_parser = humantime::parse_duration,
        action
    )]
    pub storage_move_timeout: Option<Duration>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID.to_string(),
            storage_move_concurrency: NonZeroUsize::MIN,
            storage_move_timeout: None,
        }
    }
}
