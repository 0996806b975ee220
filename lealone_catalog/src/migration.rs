//! Background migration of a database's storages after its topology widens.
//!
//! A migration is scheduled by ALTER DATABASE and runs on its own tokio task: the statement
//! returns as soon as the task is spawned. Callers that care about the outcome can keep the
//! [`MigrationHandle`] and [`wait`][MigrationHandle::wait] on it; dropping the handle detaches
//! the task, which then runs to completion on its own and only reports through the log.
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use lealone_id::{HostId, StorageId};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::catalog::DdlArgs;
use crate::database::{Database, RunMode, Storage, StorageMoveError};
use crate::router::TopologyResolver;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(
        "failed to move {} of {total} storages of database {db_name}",
        failures.len()
    )]
    StorageMoves {
        db_name: Arc<str>,
        total: usize,
        failures: Vec<StorageMoveFailure>,
    },

    #[error("migration task for database {db_name} did not complete: {source}")]
    TaskFailed {
        db_name: Arc<str>,
        #[source]
        source: JoinError,
    },
}

#[derive(Debug)]
pub struct StorageMoveFailure {
    pub storage_id: StorageId,
    pub error: StorageMoveError,
}

/// Outcome of a migration in which every storage was moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub db_name: Arc<str>,
    pub run_mode: RunMode,
    pub host_ids: Vec<HostId>,
    /// Moved storages, in the order the database owns them
    pub moved: Vec<StorageId>,
}

/// Spawns migration tasks onto a tokio runtime.
#[derive(Debug, Clone)]
pub struct MigrationScheduler {
    runtime: Handle,
    resolver: Arc<dyn TopologyResolver>,
    concurrency: NonZeroUsize,
    timeout: Option<Duration>,
}

impl MigrationScheduler {
    pub fn new(runtime: Handle, resolver: Arc<dyn TopologyResolver>, args: &DdlArgs) -> Self {
        Self {
            runtime,
            resolver,
            concurrency: args.storage_move_concurrency,
            timeout: args.storage_move_timeout,
        }
    }

    /// Spawn a task that resolves the write topology of `db` and moves each of its storages
    /// onto it for `run_mode`.
    pub fn schedule(&self, db: Arc<Database>, run_mode: RunMode) -> MigrationHandle {
        let db_name = db.name();
        info!(
            db_name = db_name.as_ref(),
            %run_mode,
            storages = db.storages().len(),
            "scheduling storage migration"
        );
        let task = Migration {
            db,
            run_mode,
            resolver: Arc::clone(&self.resolver),
            concurrency: self.concurrency,
            timeout: self.timeout,
        };
        MigrationHandle {
            db_name,
            join: self.runtime.spawn(task.run()),
        }
    }
}

/// Handle to a scheduled migration; dropping it leaves the migration running.
#[derive(Debug)]
pub struct MigrationHandle {
    db_name: Arc<str>,
    join: JoinHandle<Result<MigrationReport, MigrationError>>,
}

impl MigrationHandle {
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the migration to finish and return its outcome.
    pub async fn wait(self) -> Result<MigrationReport, MigrationError> {
        match self.join.await {
            Ok(result) => result,
            Err(source) => Err(MigrationError::TaskFailed {
                db_name: self.db_name,
                source,
            }),
        }
    }
}

#[derive(Debug)]
struct Migration {
    db: Arc<Database>,
    run_mode: RunMode,
    resolver: Arc<dyn TopologyResolver>,
    concurrency: NonZeroUsize,
    timeout: Option<Duration>,
}

impl Migration {
    async fn run(self) -> Result<MigrationReport, MigrationError> {
        let db_name = self.db.name();
        let host_ids: Arc<[HostId]> = self.resolver.host_ids(&self.db, true).into();
        let storages = self.db.storages();
        let total = storages.len();
        let (run_mode, timeout) = (self.run_mode, self.timeout);

        let moves: Vec<_> = storages
            .into_iter()
            .map(|storage| move_storage(storage, Arc::clone(&host_ids), run_mode, timeout))
            .collect();
        let results: Vec<(StorageId, Result<(), StorageMoveError>)> = stream::iter(moves)
            .buffered(self.concurrency.get())
            .collect()
            .await;

        let mut moved = Vec::with_capacity(total);
        let mut failures = vec![];
        for (storage_id, result) in results {
            match result {
                Ok(()) => moved.push(storage_id),
                Err(error) => {
                    warn!(
                        db_name = db_name.as_ref(),
                        %storage_id,
                        %error,
                        "failed to move storage"
                    );
                    failures.push(StorageMoveFailure { storage_id, error });
                }
            }
        }

        if failures.is_empty() {
            info!(
                db_name = db_name.as_ref(),
                run_mode = %self.run_mode,
                moved = moved.len(),
                "storage migration complete"
            );
            Ok(MigrationReport {
                db_name,
                run_mode: self.run_mode,
                host_ids: host_ids.to_vec(),
                moved,
            })
        } else {
            error!(
                db_name = db_name.as_ref(),
                run_mode = %self.run_mode,
                failed = failures.len(),
                total,
                "storage migration finished with failures"
            );
            Err(MigrationError::StorageMoves {
                db_name,
                total,
                failures,
            })
        }
    }
}

/// Move a single storage, bounded by `timeout` when one is configured.
async fn move_storage(
    storage: Arc<dyn Storage>,
    host_ids: Arc<[HostId]>,
    run_mode: RunMode,
    timeout: Option<Duration>,
) -> (StorageId, Result<(), StorageMoveError>) {
    let fut = storage.move_to(&host_ids, run_mode);
    let result = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut).await.unwrap_or_else(|_| {
            Err(StorageMoveError::from(anyhow::anyhow!(
                "moving storage {} timed out after {timeout:?}",
                storage.name()
            )))
        }),
        None => fut.await,
    };
    (storage.id(), result)
}
