//! Objects owned by a database and the categories they are grouped in.
use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use lealone_id::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{CatalogError, Result};

/// The category of a catalog object.
///
/// Categories select both the [`CatalogLocks`][crate::lock::CatalogLocks] guard a statement
/// takes and the step of a database cascade in which an object is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbObjectType {
    Database,
    Schema,
    TableOrView,
    Sequence,
    Constraint,
    Trigger,
    Constant,
    FunctionAlias,
    User,
    Role,
    Right,
    Aggregate,
    UserDataType,
}

impl DbObjectType {
    pub const ALL: [Self; 13] = [
        Self::Database,
        Self::Schema,
        Self::TableOrView,
        Self::Sequence,
        Self::Constraint,
        Self::Trigger,
        Self::Constant,
        Self::FunctionAlias,
        Self::User,
        Self::Role,
        Self::Right,
        Self::Aggregate,
        Self::UserDataType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Schema => "schema",
            Self::TableOrView => "table or view",
            Self::Sequence => "sequence",
            Self::Constraint => "constraint",
            Self::Trigger => "trigger",
            Self::Constant => "constant",
            Self::FunctionAlias => "function alias",
            Self::User => "user",
            Self::Role => "role",
            Self::Right => "right",
            Self::Aggregate => "aggregate",
            Self::UserDataType => "user data type",
        }
    }
}

impl std::fmt::Display for DbObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    StandardTable,
    View,
}

/// What kind of object a [`CatalogObject`] is, along with the data specific to that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// System schemas such as `INFORMATION_SCHEMA` are not droppable
    Schema { droppable: bool },
    Table(TableType),
    Sequence,
    Constraint,
    Trigger,
    Constant,
    FunctionAlias,
    User { admin: bool },
    Role,
    Right,
    Aggregate,
    UserDataType,
}

impl ObjectKind {
    pub fn object_type(&self) -> DbObjectType {
        match self {
            Self::Schema { .. } => DbObjectType::Schema,
            Self::Table(_) => DbObjectType::TableOrView,
            Self::Sequence => DbObjectType::Sequence,
            Self::Constraint => DbObjectType::Constraint,
            Self::Trigger => DbObjectType::Trigger,
            Self::Constant => DbObjectType::Constant,
            Self::FunctionAlias => DbObjectType::FunctionAlias,
            Self::User { .. } => DbObjectType::User,
            Self::Role => DbObjectType::Role,
            Self::Right => DbObjectType::Right,
            Self::Aggregate => DbObjectType::Aggregate,
            Self::UserDataType => DbObjectType::UserDataType,
        }
    }

    fn sql_keyword(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "CREATE SCHEMA",
            Self::Table(TableType::View) => "CREATE VIEW",
            Self::Table(_) => "CREATE TABLE",
            Self::Sequence => "CREATE SEQUENCE",
            Self::Constraint => "ALTER TABLE ADD CONSTRAINT",
            Self::Trigger => "CREATE TRIGGER",
            Self::Constant => "CREATE CONSTANT",
            Self::FunctionAlias => "CREATE ALIAS",
            Self::User { .. } => "CREATE USER",
            Self::Role => "CREATE ROLE",
            Self::Right => "GRANT",
            Self::Aggregate => "CREATE AGGREGATE",
            Self::UserDataType => "CREATE DOMAIN",
        }
    }
}

/// An object owned by a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub id: ObjectId,
    pub name: Arc<str>,
    pub kind: ObjectKind,
    /// Name of the schema the object lives in, for schema-scoped objects
    pub schema: Option<Arc<str>>,
    /// Hidden objects are managed internally and never listed to users
    pub hidden: bool,
    /// The statement that recreates this object; `None` for built-in sentinel objects
    pub create_sql: Option<Arc<str>>,
}

impl CatalogObject {
    pub fn new(name: impl Into<Arc<str>>, kind: ObjectKind) -> Self {
        let name = name.into();
        let create_sql = Some(format!("{} {name}", kind.sql_keyword()).into());
        Self {
            id: ObjectId::new(),
            name,
            kind,
            schema: None,
            hidden: false,
            create_sql,
        }
    }

    /// A built-in object without a recreation statement, e.g. the `PUBLIC` role.
    pub fn sentinel(name: impl Into<Arc<str>>, kind: ObjectKind) -> Self {
        Self {
            create_sql: None,
            ..Self::new(name, kind)
        }
    }

    pub fn in_schema(mut self, schema: impl Into<Arc<str>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn object_type(&self) -> DbObjectType {
        self.kind.object_type()
    }

    pub fn table_type(&self) -> Option<TableType> {
        match self.kind {
            ObjectKind::Table(table_type) => Some(table_type),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.kind, ObjectKind::User { admin: true })
    }

    pub fn has_create_sql(&self) -> bool {
        self.create_sql.is_some()
    }
}

/// The objects of a single database, partitioned by [`DbObjectType`].
///
/// Each category keeps its objects in creation order. Names are unique within a category and
/// schema.
#[derive(Debug, Clone, Default)]
pub struct DatabaseObjects {
    repos: HashMap<DbObjectType, IndexMap<ObjectId, Arc<CatalogObject>>>,
}

impl DatabaseObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: CatalogObject) -> Result<Arc<CatalogObject>> {
        let object_type = object.object_type();
        let repo = self.repos.entry(object_type).or_default();
        if repo
            .values()
            .any(|o| o.name == object.name && o.schema == object.schema)
        {
            return Err(CatalogError::AlreadyExists {
                object_type,
                name: object.name.to_string(),
            });
        }
        let object = Arc::new(object);
        repo.insert(object.id, Arc::clone(&object));
        Ok(object)
    }

    pub fn remove(
        &mut self,
        object_type: DbObjectType,
        id: ObjectId,
    ) -> Option<Arc<CatalogObject>> {
        self.repos
            .get_mut(&object_type)
            .and_then(|repo| repo.shift_remove(&id))
    }

    pub fn get(&self, object_type: DbObjectType, name: &str) -> Option<Arc<CatalogObject>> {
        self.repos
            .get(&object_type)
            .and_then(|repo| repo.values().find(|o| o.name.as_ref() == name))
            .cloned()
    }

    pub fn get_by_id(&self, object_type: DbObjectType, id: ObjectId) -> Option<Arc<CatalogObject>> {
        self.repos
            .get(&object_type)
            .and_then(|repo| repo.get(&id))
            .cloned()
    }

    /// All objects of a category, in creation order
    pub fn all(&self, object_type: DbObjectType) -> Vec<Arc<CatalogObject>> {
        self.repos
            .get(&object_type)
            .map(|repo| repo.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, object_type: DbObjectType) -> usize {
        self.repos.get(&object_type).map_or(0, |repo| repo.len())
    }

    pub fn len(&self) -> usize {
        self.repos.values().map(|repo| repo.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CatalogObject>> + '_ {
        DbObjectType::ALL
            .iter()
            .filter_map(|t| self.repos.get(t))
            .flat_map(|repo| repo.values())
    }
}
