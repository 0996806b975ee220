//! Category-scoped catalog locks.
use hashbrown::HashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::object::DbObjectType;

/// Guard returned by [`CatalogLocks::lock`]; the lock is released when it is dropped.
pub type CatalogLockGuard<'a> = MutexGuard<'a, ()>;

/// One mutual-exclusion lock per [`DbObjectType`].
///
/// Statements that change the catalog take the lock of the category they touch, so e.g. all
/// CREATE/ALTER/DROP DATABASE statements run one at a time while statements on unrelated
/// categories proceed independently. Each [`Catalog`][crate::Catalog] owns its own set.
#[derive(Debug)]
pub struct CatalogLocks {
    locks: HashMap<DbObjectType, Mutex<()>>,
}

impl CatalogLocks {
    pub fn new() -> Self {
        Self {
            locks: DbObjectType::ALL
                .into_iter()
                .map(|t| (t, Mutex::new(())))
                .collect(),
        }
    }

    pub fn lock(&self, object_type: DbObjectType) -> CatalogLockGuard<'_> {
        self.locks
            .get(&object_type)
            .expect("a lock exists for every object type")
            .lock()
    }

    pub fn try_lock(&self, object_type: DbObjectType) -> Option<CatalogLockGuard<'_>> {
        self.locks
            .get(&object_type)
            .expect("a lock exists for every object type")
            .try_lock()
    }
}

impl Default for CatalogLocks {
    fn default() -> Self {
        Self::new()
    }
}
