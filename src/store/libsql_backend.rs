//! libSQL implementation of the async `Database` trait.
//!
//! Supports local file and in-memory databases. Every write is a single
//! statement, so concurrent callers never observe a half-applied update.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, FieldUpdate, MemoryRecord, MemoryUpdate};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Fetch a record without creating it.
    pub async fn get_memory(&self, user_id: &str) -> Result<Option<MemoryRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MEMORY_COLUMNS} FROM conversation_memory WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_memory: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_memory: {e}")))?
        {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn blob_value(update: &FieldUpdate<Vec<u8>>) -> Value {
    match update.value() {
        Some(bytes) => Value::Blob(bytes.clone()),
        None => Value::Null,
    }
}

fn text_value(update: &FieldUpdate<String>) -> Value {
    match update.value() {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

fn touches<T>(update: &FieldUpdate<T>) -> i64 {
    if update.is_keep() { 0 } else { 1 }
}

fn row_to_record(row: &libsql::Row) -> Result<MemoryRecord, DatabaseError> {
    let user_id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("user_id: {e}")))?;
    let serialized_memory = match row
        .get_value(1)
        .map_err(|e| DatabaseError::Query(format!("serialized_memory: {e}")))?
    {
        Value::Blob(bytes) => Some(bytes),
        Value::Text(text) => Some(text.into_bytes()),
        _ => None,
    };
    let last_context = match row
        .get_value(2)
        .map_err(|e| DatabaseError::Query(format!("last_context: {e}")))?
    {
        Value::Text(text) => Some(text),
        _ => None,
    };
    let created_str: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("created_at: {e}")))?;
    let updated_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("updated_at: {e}")))?;

    Ok(MemoryRecord {
        user_id,
        serialized_memory,
        last_context,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const MEMORY_COLUMNS: &str = "user_id, serialized_memory, last_context, created_at, updated_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn get_or_create_memory(&self, user_id: &str) -> Result<MemoryRecord, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO conversation_memory (user_id, serialized_memory, last_context, created_at, updated_at)
                 VALUES (?1, NULL, NULL, ?2, ?2)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user_id, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_or_create_memory: {e}")))?;
        if inserted > 0 {
            debug!(user_id, "Created memory record");
        }

        self.get_memory(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "conversation_memory".to_string(),
                id: user_id.to_string(),
            })
    }

    async fn upsert_memory(
        &self,
        user_id: &str,
        update: &MemoryUpdate,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO conversation_memory (user_id, serialized_memory, last_context, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                    serialized_memory = CASE WHEN ?5 THEN excluded.serialized_memory
                                             ELSE conversation_memory.serialized_memory END,
                    last_context = CASE WHEN ?6 THEN excluded.last_context
                                        ELSE conversation_memory.last_context END,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    blob_value(&update.serialized_memory),
                    text_value(&update.last_context),
                    now,
                    touches(&update.serialized_memory),
                    touches(&update.last_context),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_memory: {e}")))?;
        debug!(user_id, "Memory record updated");
        Ok(())
    }

    async fn count_memory_records(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM conversation_memory", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_memory_records: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count_memory_records: {e}")))?
            .ok_or_else(|| DatabaseError::Query("count_memory_records: no row".into()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("count_memory_records: {e}")))?;
        Ok(count.max(0) as u64)
    }
}
