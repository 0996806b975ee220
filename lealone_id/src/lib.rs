//! Identifiers shared by the lealone catalog crates.
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

mod serialize;
pub use serialize::SerdeVecMap;

/// Defines an id newtype allocated from its own process-wide counter.
macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident($int:ty), $counter:ident: $atomic:ty) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
        pub struct $name($int);

        static $counter: $atomic = <$atomic>::new(0);

        impl $name {
            /// Allocate the next id. Running out of ids is an invariant violation.
            pub fn new() -> Self {
                Self(
                    $counter
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
                        .expect(concat!("overflowed with ", stringify!($name), "s")),
                )
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

counter_id!(
    /// Identifies a database registered in a catalog
    DbId(u32),
    NEXT_DB_ID: AtomicU32
);

counter_id!(
    /// Identifies any object owned by a database: schemas, tables, principals, and so on.
    ///
    /// Ids are drawn from a single counter shared by every object category, so two objects
    /// are the same object exactly when their ids are equal.
    ObjectId(u64),
    NEXT_OBJECT_ID: AtomicU64
);

counter_id!(
    /// Identifies a physical storage owned by a database
    StorageId(u32),
    NEXT_STORAGE_ID: AtomicU32
);

/// Identifier of a node in the cluster, e.g. `127.0.0.1:9210`
#[derive(Debug, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct HostId(Arc<str>);

impl From<&str> for HostId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
