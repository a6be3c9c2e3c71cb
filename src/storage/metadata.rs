use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::db::catalog::DatabaseType;
use crate::db::instance::{Instance, InstanceStatus};
use crate::error::{AppError, Result};

/// SQLite-backed metadata store for instance tracking
pub struct MetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataStore {
    /// Create a new metadata store, initializing the database if needed
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create metadata directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open metadata database: {}", e)))?;

        // Initialize schema
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS instances (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                database_type TEXT NOT NULL,
                image TEXT NOT NULL,
                tag TEXT NOT NULL,
                port INTEGER NOT NULL,
                root_password TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                volume_path TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_instances_status ON instances(status);
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to initialize schema: {}", e)))?;

        info!("Metadata store initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a new instance
    pub fn insert_instance(&self, instance: &Instance) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO instances (
                id, name, database_type, image, tag, port,
                root_password, status, created_at, volume_path
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                instance.id.to_string(),
                instance.name,
                instance.database_type.as_str(),
                instance.image,
                instance.tag,
                instance.port,
                instance.root_password,
                instance.status.as_str(),
                instance.created_at.to_rfc3339(),
                instance.volume_path,
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert instance: {}", e)))?;

        Ok(())
    }

    /// Get an instance by ID
    pub fn get_instance(&self, id: Uuid) -> Result<Option<Instance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, name, database_type, image, tag, port,
                   root_password, status, created_at, volume_path
            FROM instances WHERE id = ?1
            "#,
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let result = stmt
            .query_row(params![id.to_string()], Self::row_to_instance)
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to query instance: {}", e)))?;

        Ok(result)
    }

    /// Get an instance by name
    pub fn get_instance_by_name(&self, name: &str) -> Result<Option<Instance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, name, database_type, image, tag, port,
                   root_password, status, created_at, volume_path
            FROM instances WHERE name = ?1
            "#,
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let result = stmt
            .query_row(params![name], Self::row_to_instance)
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to query instance: {}", e)))?;

        Ok(result)
    }

    /// Update an instance
    pub fn update_instance(&self, instance: &Instance) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                r#"
            UPDATE instances SET
                name = ?2, database_type = ?3, image = ?4, tag = ?5,
                port = ?6, root_password = ?7, status = ?8,
                created_at = ?9, volume_path = ?10
            WHERE id = ?1
            "#,
                params![
                    instance.id.to_string(),
                    instance.name,
                    instance.database_type.as_str(),
                    instance.image,
                    instance.tag,
                    instance.port,
                    instance.root_password,
                    instance.status.as_str(),
                    instance.created_at.to_rfc3339(),
                    instance.volume_path,
                ],
            )
            .map_err(|e| AppError::Storage(format!("Failed to update instance: {}", e)))?;

        if updated == 0 {
            return Err(AppError::InstanceNotFound);
        }

        Ok(())
    }

    /// Update status only
    pub fn update_status(&self, id: Uuid, status: InstanceStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE instances SET status = ?2 WHERE id = ?1",
            params![id.to_string(), status.as_str()],
        )
        .map_err(|e| AppError::Storage(format!("Failed to update status: {}", e)))?;

        Ok(())
    }

    /// List all instances
    pub fn list_instances(&self) -> Result<Vec<Instance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, name, database_type, image, tag, port,
                   root_password, status, created_at, volume_path
            FROM instances ORDER BY created_at
            "#,
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let instances = stmt
            .query_map([], Self::row_to_instance)
            .map_err(|e| AppError::Storage(format!("Failed to query instances: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Storage(format!("Failed to collect instances: {}", e)))?;

        Ok(instances)
    }

    /// Delete an instance from the metadata store
    pub fn delete_instance(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM instances WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| AppError::Storage(format!("Failed to delete instance: {}", e)))?;

        if deleted == 0 {
            return Err(AppError::InstanceNotFound);
        }

        Ok(())
    }

    fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<Instance> {
        let id_str: String = row.get(0)?;
        let type_str: String = row.get(2)?;
        let status_str: String = row.get(7)?;
        let created_at_str: String = row.get(8)?;

        Ok(Instance {
            id: Uuid::parse_str(&id_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?,
            name: row.get(1)?,
            database_type: DatabaseType::from_str(&type_str).map_err(|_| {
                rusqlite::Error::InvalidColumnType(2, "database_type".into(), rusqlite::types::Type::Text)
            })?,
            image: row.get(3)?,
            tag: row.get(4)?,
            port: row.get(5)?,
            root_password: row.get(6)?,
            status: InstanceStatus::parse(&status_str).unwrap_or(InstanceStatus::Error),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            volume_path: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::instance::Instance;
    use tempfile::TempDir;

    fn store() -> (MetadataStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().join("instances.db")).unwrap();
        (store, dir)
    }

    fn sample(name: &str) -> Instance {
        Instance::new(
            name.to_string(),
            DatabaseType::Postgres,
            "postgres".to_string(),
            "16".to_string(),
            5432,
            "pw".to_string(),
        )
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (store, _dir) = store();
        let mut instance = sample("pg one");
        instance.volume_path = Some("/tmp/vols/x".to_string());
        store.insert_instance(&instance).unwrap();

        let loaded = store.get_instance(instance.id).unwrap().unwrap();
        assert_eq!(loaded.name, "pg one");
        assert_eq!(loaded.database_type, DatabaseType::Postgres);
        assert_eq!(loaded.port, 5432);
        assert_eq!(loaded.status, InstanceStatus::Creating);
        assert_eq!(loaded.volume_path.as_deref(), Some("/tmp/vols/x"));
    }

    #[test]
    fn lookup_by_name() {
        let (store, _dir) = store();
        let instance = sample("cache");
        store.insert_instance(&instance).unwrap();

        assert!(store.get_instance_by_name("cache").unwrap().is_some());
        assert!(store.get_instance_by_name("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_names_are_rejected_by_schema() {
        let (store, _dir) = store();
        store.insert_instance(&sample("dup")).unwrap();
        assert!(store.insert_instance(&sample("dup")).is_err());
    }

    #[test]
    fn status_update_persists() {
        let (store, _dir) = store();
        let instance = sample("pg");
        store.insert_instance(&instance).unwrap();

        store
            .update_status(instance.id, InstanceStatus::Running)
            .unwrap();
        let loaded = store.get_instance(instance.id).unwrap().unwrap();
        assert_eq!(loaded.status, InstanceStatus::Running);
    }

    #[test]
    fn delete_removes_row() {
        let (store, _dir) = store();
        let instance = sample("gone");
        store.insert_instance(&instance).unwrap();

        store.delete_instance(instance.id).unwrap();
        assert!(store.get_instance(instance.id).unwrap().is_none());
        assert!(matches!(
            store.delete_instance(instance.id),
            Err(AppError::InstanceNotFound)
        ));
    }

    #[test]
    fn list_returns_all_instances() {
        let (store, _dir) = store();
        store.insert_instance(&sample("a")).unwrap();
        store.insert_instance(&sample("b")).unwrap();
        assert_eq!(store.list_instances().unwrap().len(), 2);
    }
}
