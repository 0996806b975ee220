//! Removal of every object a database owns when it is dropped.
//!
//! Objects go away in the order of [`DROP_ORDER`]: dependents before the objects they depend
//! on, so views before the tables they select from and constraints before users. Hidden objects
//! are managed internally and are never removed by a cascade.
use std::sync::Arc;

use lealone_id::ObjectId;
use tracing::{debug, trace};

use crate::database::Database;
use crate::object::{CatalogObject, DbObjectType, ObjectKind, TableType};
use crate::session::Session;

/// Which objects of the step's categories a cascade step removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalFilter {
    Any,
    /// Schemas other than the system schemas
    DroppableSchema,
    View,
    StandardTable,
    /// Users other than the one running the statement
    NotSessionUser,
    /// Skips built-in sentinels such as the `PUBLIC` role
    HasCreateSql,
}

impl RemovalFilter {
    pub fn matches(&self, object: &CatalogObject, session: &Session) -> bool {
        match self {
            Self::Any => true,
            Self::DroppableSchema => matches!(object.kind, ObjectKind::Schema { droppable: true }),
            Self::View => object.table_type() == Some(TableType::View),
            Self::StandardTable => object.table_type() == Some(TableType::StandardTable),
            Self::NotSessionUser => object.id != session.user().id,
            Self::HasCreateSql => object.has_create_sql(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    /// Remove the non-hidden objects of `categories` accepted by `filter`
    Remove {
        categories: &'static [DbObjectType],
        filter: RemovalFilter,
    },
    /// Drop the local temporary tables of the invoking session
    ClearLocalTempTables,
}

/// The steps of a cascade, run in this order.
pub const DROP_ORDER: &[CascadeStep] = &[
    CascadeStep::Remove {
        categories: &[DbObjectType::Schema],
        filter: RemovalFilter::DroppableSchema,
    },
    CascadeStep::Remove {
        categories: &[DbObjectType::TableOrView],
        filter: RemovalFilter::View,
    },
    CascadeStep::Remove {
        categories: &[DbObjectType::TableOrView],
        filter: RemovalFilter::StandardTable,
    },
    CascadeStep::ClearLocalTempTables,
    CascadeStep::Remove {
        categories: &[
            DbObjectType::Sequence,
            DbObjectType::Constraint,
            DbObjectType::Trigger,
            DbObjectType::Constant,
            DbObjectType::FunctionAlias,
        ],
        filter: RemovalFilter::Any,
    },
    CascadeStep::Remove {
        categories: &[DbObjectType::User],
        filter: RemovalFilter::NotSessionUser,
    },
    CascadeStep::Remove {
        categories: &[DbObjectType::Role],
        filter: RemovalFilter::HasCreateSql,
    },
    CascadeStep::Remove {
        categories: &[
            DbObjectType::Right,
            DbObjectType::Aggregate,
            DbObjectType::UserDataType,
        ],
        filter: RemovalFilter::HasCreateSql,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedObject {
    pub object_type: DbObjectType,
    pub id: ObjectId,
    pub name: Arc<str>,
    /// Index into [`DROP_ORDER`] of the step that removed the object
    pub step: usize,
}

/// What a cascade removed, in removal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub removed: Vec<RemovedObject>,
    pub local_temp_tables_cleared: usize,
}

impl CascadeReport {
    /// Position of the object named `name` in the removal order
    pub fn position(&self, object_type: DbObjectType, name: &str) -> Option<usize> {
        self.removed
            .iter()
            .position(|o| o.object_type == object_type && o.name.as_ref() == name)
    }

    pub fn removed_of(&self, object_type: DbObjectType) -> impl Iterator<Item = &RemovedObject> {
        self.removed
            .iter()
            .filter(move |o| o.object_type == object_type)
    }
}

/// Remove the objects of `db` on behalf of `session`.
///
/// Holds the metadata lock of `db` for the whole cascade, so no other statement observes a
/// partially removed database through it.
pub fn drop_all_objects(db: &Database, session: &Session) -> CascadeReport {
    let mut objects = db.lock_meta();
    db.clean_prepared_statements();

    let mut report = CascadeReport::default();
    for (step, cascade_step) in DROP_ORDER.iter().enumerate() {
        match cascade_step {
            CascadeStep::ClearLocalTempTables => {
                report.local_temp_tables_cleared += session.clear_local_temp_tables().len();
            }
            CascadeStep::Remove { categories, filter } => {
                let candidates: Vec<_> = categories
                    .iter()
                    .flat_map(|object_type| objects.all(*object_type))
                    .filter(|o| !o.hidden && filter.matches(o, session))
                    .collect();
                for object in candidates {
                    let Some(removed) = objects.remove(object.object_type(), object.id) else {
                        continue;
                    };
                    trace!(
                        db_name = db.name().as_ref(),
                        object_type = %removed.object_type(),
                        name = removed.name.as_ref(),
                        "removed object"
                    );
                    report.removed.push(RemovedObject {
                        object_type: removed.object_type(),
                        id: removed.id,
                        name: Arc::clone(&removed.name),
                        step,
                    });
                }
            }
        }
    }

    debug!(
        db_name = db.name().as_ref(),
        removed = report.removed.len(),
        remaining = objects.len(),
        local_temp_tables = report.local_temp_tables_cleared,
        "dropped database objects"
    );
    report
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::database::RunMode;
    use crate::test_util::{admin_session, test_catalog};

    fn step_of(filter: RemovalFilter, object_type: DbObjectType) -> usize {
        DROP_ORDER
            .iter()
            .position(|s| {
                matches!(s, CascadeStep::Remove { categories, filter: f }
                    if *f == filter && categories.contains(&object_type))
            })
            .unwrap()
    }

    #[test]
    fn dependents_are_removed_first() {
        let schemas = step_of(RemovalFilter::DroppableSchema, DbObjectType::Schema);
        let views = step_of(RemovalFilter::View, DbObjectType::TableOrView);
        let tables = step_of(RemovalFilter::StandardTable, DbObjectType::TableOrView);
        let temp = DROP_ORDER
            .iter()
            .position(|s| *s == CascadeStep::ClearLocalTempTables)
            .unwrap();
        let constraints = step_of(RemovalFilter::Any, DbObjectType::Constraint);
        let users = step_of(RemovalFilter::NotSessionUser, DbObjectType::User);
        let roles = step_of(RemovalFilter::HasCreateSql, DbObjectType::Role);
        let rights = step_of(RemovalFilter::HasCreateSql, DbObjectType::Right);

        assert!(schemas < views);
        assert!(views < tables);
        assert!(tables < temp);
        assert!(temp < constraints);
        assert!(constraints < users);
        assert!(users < roles);
        assert!(roles < rights);
    }

    #[test]
    fn every_category_but_database_is_covered() {
        for object_type in DbObjectType::ALL {
            let covered = DROP_ORDER.iter().any(|s| match s {
                CascadeStep::Remove { categories, .. } => categories.contains(&object_type),
                CascadeStep::ClearLocalTempTables => false,
            });
            assert_eq!(object_type != DbObjectType::Database, covered, "{object_type}");
        }
    }

    #[test]
    fn filters_skip_sentinels_and_the_session_user() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let public = CatalogObject::sentinel("PUBLIC", ObjectKind::Role);
        let analyst = CatalogObject::new("analyst", ObjectKind::Role);
        assert!(!RemovalFilter::HasCreateSql.matches(&public, &session));
        assert!(RemovalFilter::HasCreateSql.matches(&analyst, &session));
        assert!(!RemovalFilter::NotSessionUser.matches(session.user(), &session));

        let info =
            CatalogObject::new("INFORMATION_SCHEMA", ObjectKind::Schema { droppable: false });
        assert!(!RemovalFilter::DroppableSchema.matches(&info, &session));
    }

    #[test]
    fn cascade_leaves_hidden_and_builtin_objects() {
        let catalog = test_catalog();
        let session = admin_session(&catalog);
        let db = Database::new("sales", RunMode::ClientServer);
        let add = |o: CatalogObject| {
            db.add_object(o).unwrap();
        };
        add(CatalogObject::new("INFORMATION_SCHEMA", ObjectKind::Schema { droppable: false }));
        add(CatalogObject::new("app", ObjectKind::Schema { droppable: true }));
        add(CatalogObject::new("orders", ObjectKind::Table(TableType::StandardTable)));
        add(CatalogObject::new("big_orders", ObjectKind::Table(TableType::View)));
        add(CatalogObject::new("meta", ObjectKind::Table(TableType::StandardTable)).hidden());
        add(CatalogObject::new("order_seq", ObjectKind::Sequence));
        add(CatalogObject::sentinel("PUBLIC", ObjectKind::Role));
        add(CatalogObject::new("analyst", ObjectKind::Role));
        db.cache_prepared_statement("SELECT * FROM orders");

        let report = drop_all_objects(&db, &session);

        let removed: Vec<_> = report.removed.iter().map(|o| o.name.as_ref()).collect();
        assert_eq!(
            vec!["app", "big_orders", "orders", "order_seq", "analyst"],
            removed
        );
        assert_eq!(0, db.prepared_statement_count());
        assert!(db.find_object(DbObjectType::Schema, "INFORMATION_SCHEMA").is_some());
        assert!(db.find_object(DbObjectType::TableOrView, "meta").is_some());
        assert!(db.find_object(DbObjectType::Role, "PUBLIC").is_some());
        assert_eq!(1, report.removed_of(DbObjectType::Role).count());
    }
}
