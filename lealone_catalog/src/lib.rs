//! The database catalog of a lealone node and the DDL statements that reshape it.
//!
//! The [`catalog::Catalog`] is the registry of every [`database::Database`] known to the node,
//! including the system database itself. Statements in [`ddl`] mutate it under the
//! DATABASE-category [`lock::CatalogLocks`] guard; physical work (cascading object removal,
//! storage migration) only happens on nodes that are target endpoints of the database involved.
use thiserror::Error;

use object::DbObjectType;

pub mod catalog;
pub mod database;
pub mod ddl;
pub mod lock;
pub mod migration;
pub mod object;
pub mod router;
pub mod session;

#[cfg(test)]
pub(crate) mod test_util;

pub use catalog::{Catalog, DdlArgs};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot drop the system database {0}")]
    CannotDropSystemDatabase(String),

    #[error("database {0} not found")]
    DatabaseNotFound(String),

    #[error("admin rights are required for this operation (user: {user})")]
    AdminRightsRequired { user: String },

    #[error("feature not supported: {0}")]
    FeatureNotSupported(&'static str),

    #[error("{object_type} {name} already exists")]
    AlreadyExists {
        object_type: DbObjectType,
        name: String,
    },

    #[error("{object_type} {name} not found in database {db_name}")]
    ObjectNotFound {
        object_type: DbObjectType,
        name: String,
        db_name: String,
    },

    #[error("failed to serialize catalog record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    /// The stable code of this failure, independent of the message text.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CannotDropSystemDatabase(_) => ErrorCode::CannotDropSystemDatabase,
            Self::DatabaseNotFound(_) => ErrorCode::DatabaseNotFound,
            Self::AdminRightsRequired { .. } => ErrorCode::AdminRightsRequired,
            Self::FeatureNotSupported(_) => ErrorCode::FeatureNotSupported,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::ObjectNotFound { .. } => ErrorCode::ObjectNotFound,
            Self::Serialization(_) => ErrorCode::Serialization,
        }
    }
}

/// Stable codes surfaced to clients alongside a [`CatalogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CannotDropSystemDatabase,
    DatabaseNotFound,
    AdminRightsRequired,
    FeatureNotSupported,
    AlreadyExists,
    ObjectNotFound,
    Serialization,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CannotDropSystemDatabase => "CANNOT_DROP_SYSTEM_DATABASE",
            Self::DatabaseNotFound => "DATABASE_NOT_FOUND",
            Self::AdminRightsRequired => "ADMIN_RIGHTS_REQUIRED",
            Self::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::ObjectNotFound => "OBJECT_NOT_FOUND",
            Self::Serialization => "SERIALIZATION",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            "CANNOT_DROP_SYSTEM_DATABASE",
            CatalogError::CannotDropSystemDatabase("lealone".into())
                .code()
                .as_str()
        );
        assert_eq!(
            "DATABASE_NOT_FOUND",
            CatalogError::DatabaseNotFound("reports".into())
                .code()
                .to_string()
        );
        assert_eq!(
            ErrorCode::FeatureNotSupported,
            CatalogError::FeatureNotSupported("ALTER DATABASE parameters").code()
        );
    }
}
