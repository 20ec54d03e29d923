use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::task;

use crate::error::{DocdexError, Result};

/// Provenance record for one ingested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    pub file_path: String,
    #[serde(rename = "uploadTime")]
    pub uploaded_at: String,
}

impl FileRecord {
    /// Build a record stamped with the current local time
    pub fn new(file_id: &str, file_name: &str, file_path: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            // Lexicographic order matches chronological order for this format,
            // which the uploadTime DESC index relies on
            uploaded_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Database connection handle
///
/// Holds only the path; each operation opens its own connection inside a
/// blocking task so SQLite calls never stall the event loop.
#[derive(Debug, Clone)]
struct Db {
    path: PathBuf,
}

impl Db {
    fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path).map_err(DocdexError::Database)?;

        // WAL mode for concurrent readers/writers, NORMAL sync for speed
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON;",
        )?;

        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Db::open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DocdexError::Config(format!("Database task panicked: {}", e)))?
    }
}

/// Durable store of upload records
///
/// Must be initialized before use; every operation returns
/// `StoreNotInitialized` otherwise. Safe for concurrent use once
/// initialized.
pub struct RecordStore {
    db: RwLock<Option<Db>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            db: RwLock::new(None),
        }
    }

    /// Open or create the backing database under `<data_dir>/db/docdex.db`
    /// and create the schema if absent. Idempotent.
    pub async fn initialize(&self, data_dir: &Path) -> Result<()> {
        let db_dir = data_dir.join("db");
        std::fs::create_dir_all(&db_dir)?;

        let db = Db::new(db_dir.join("docdex.db"));
        db.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS upload_records (
                    fileId TEXT PRIMARY KEY,
                    fileName TEXT NOT NULL,
                    filePath TEXT NOT NULL,
                    uploadTime TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_upload_time
                    ON upload_records(uploadTime DESC);",
            )?;
            Ok(())
        })
        .await?;

        *self.db.write().unwrap() = Some(db);
        log::info!("Record store initialized at {}", db_dir.display());
        Ok(())
    }

    fn handle(&self) -> Result<Db> {
        self.db
            .read()
            .unwrap()
            .clone()
            .ok_or(DocdexError::StoreNotInitialized)
    }

    /// Insert or replace a record by fileId
    pub async fn add(&self, record: &FileRecord) -> Result<()> {
        let db = self.handle()?;
        let record = record.clone();
        let file_name = record.file_name.clone();
        db.with_connection(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO upload_records (fileId, fileName, filePath, uploadTime)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.file_id,
                    record.file_name,
                    record.file_path,
                    record.uploaded_at
                ],
            )?;
            Ok(())
        })
        .await?;
        log::debug!("Upload record saved: {}", file_name);
        Ok(())
    }

    /// All records, most recently uploaded first
    pub async fn get_all(&self) -> Result<Vec<FileRecord>> {
        let db = self.handle()?;
        db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fileId, fileName, filePath, uploadTime
                 FROM upload_records
                 ORDER BY uploadTime DESC",
            )?;
            let records = stmt
                .query_map([], |row| {
                    Ok(FileRecord {
                        file_id: row.get(0)?,
                        file_name: row.get(1)?,
                        file_path: row.get(2)?,
                        uploaded_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok(records)
        })
        .await
    }

    /// Point lookup by fileId
    pub async fn get_by_id(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let db = self.handle()?;
        let file_id = file_id.to_string();
        db.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT fileId, fileName, filePath, uploadTime
                 FROM upload_records
                 WHERE fileId = ?1",
            )?;
            let mut rows = stmt.query_map(params![file_id], |row| {
                Ok(FileRecord {
                    file_id: row.get(0)?,
                    file_name: row.get(1)?,
                    file_path: row.get(2)?,
                    uploaded_at: row.get(3)?,
                })
            })?;
            match rows.next() {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Delete a record. Deleting a non-existent id is not an error.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let db = self.handle()?;
        let file_id = file_id.to_string();
        db.with_connection(move |conn| {
            conn.execute(
                "DELETE FROM upload_records WHERE fileId = ?1",
                params![file_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Release the backing connection. Safe to call when not open.
    pub fn close(&self) {
        let mut guard = self.db.write().unwrap();
        if guard.take().is_some() {
            log::info!("Record store closed");
        }
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
