//! Key/value rule source backed by libSQL.
//!
//! Rules live under a single key in a `kv` table, as the JSON text that
//! `RuleSet::from_json` expects. The value is read fresh on every fetch.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database, params};
use tracing::info;

use crate::error::RuleSourceError;
use crate::rules::store::RuleSource;

const CREATE_KV_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)";

pub struct LibSqlRuleSource {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
    key: String,
}

impl LibSqlRuleSource {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path, key: impl Into<String>) -> Result<Self, RuleSourceError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                RuleSourceError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RuleSourceError::Open(format!("Failed to open libSQL database: {e}")))?;

        let source = Self::from_database(db, key.into()).await?;
        info!(path = %path.display(), "Rule store opened");
        Ok(source)
    }

    /// In-memory store (for tests).
    pub async fn new_memory(key: impl Into<String>) -> Result<Self, RuleSourceError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                RuleSourceError::Open(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db, key.into()).await
    }

    async fn from_database(db: Database, key: String) -> Result<Self, RuleSourceError> {
        let conn = db
            .connect()
            .map_err(|e| RuleSourceError::Open(format!("Failed to create connection: {e}")))?;
        conn.execute(CREATE_KV_TABLE, ())
            .await
            .map_err(|e| RuleSourceError::Open(format!("Failed to create kv table: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            key,
        })
    }

    /// Store the raw rules text under this source's key.
    pub async fn put_rules(&self, raw: &str) -> Result<(), RuleSourceError> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![self.key.clone(), raw.to_string()],
            )
            .await
            .map_err(|e| RuleSourceError::Query(format!("put_rules: {e}")))?;
        Ok(())
    }

    /// Remove the rules key.
    pub async fn clear_rules(&self) -> Result<(), RuleSourceError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![self.key.clone()])
            .await
            .map_err(|e| RuleSourceError::Query(format!("clear_rules: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl RuleSource for LibSqlRuleSource {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn fetch(&self) -> Result<Option<String>, RuleSourceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM kv WHERE key = ?1",
                params![self.key.clone()],
            )
            .await
            .map_err(|e| RuleSourceError::Query(format!("fetch rules: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| RuleSourceError::Query(format!("fetch rules row: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(RuleSourceError::Query(format!("fetch rules: {e}"))),
        }
    }
}
