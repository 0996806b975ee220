use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::database::Database;
use crate::object::CatalogObject;
use crate::{CatalogError, Result};

/// A client session: the principal it runs as and the database it is connected to.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    user: Arc<CatalogObject>,
    database: Arc<Database>,
    local_temp_tables: Mutex<IndexMap<Arc<str>, Arc<CatalogObject>>>,
}

impl Session {
    pub fn new(database: Arc<Database>, user: Arc<CatalogObject>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            database,
            local_temp_tables: Mutex::new(IndexMap::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &Arc<CatalogObject> {
        &self.user
    }

    /// The database this session is connected to
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn check_admin(&self) -> Result<()> {
        if self.user.is_admin() {
            Ok(())
        } else {
            Err(CatalogError::AdminRightsRequired {
                user: self.user.name.to_string(),
            })
        }
    }

    pub fn add_local_temp_table(&self, table: Arc<CatalogObject>) {
        self.local_temp_tables
            .lock()
            .insert(Arc::clone(&table.name), table);
    }

    pub fn find_local_temp_table(&self, name: &str) -> Option<Arc<CatalogObject>> {
        self.local_temp_tables.lock().get(name).cloned()
    }

    pub fn local_temp_table_count(&self) -> usize {
        self.local_temp_tables.lock().len()
    }

    /// Drop every local temporary table registered on this session, returning them
    pub fn clear_local_temp_tables(&self) -> Vec<Arc<CatalogObject>> {
        self.local_temp_tables
            .lock()
            .drain(..)
            .map(|(_, table)| table)
            .collect()
    }
}
