//! SQLite-backed session store

use crate::core::SharedState;
use crate::session::{Exchange, ExchangeStatus, Session, SessionStore};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Durable sessions: reloading by id returns what earlier processes stored
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS exchanges (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                request TEXT NOT NULL,
                response TEXT NOT NULL,
                status TEXT NOT NULL,
                at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_exchanges_session ON exchanges(session_id)",
            r#"
            CREATE TABLE IF NOT EXISTS scratch (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (session_id, key)
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize session schema")?;
        }

        Ok(())
    }

    async fn ensure_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)")
            .bind(session_id)
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await
            .context("Failed to create session")?;
        Ok(())
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }
}

#[async_trait::async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get_or_create(&self, session_id: &str) -> Result<Session> {
        self.ensure_session(session_id).await?;

        let created_at: NaiveDateTime = sqlx::query("SELECT created_at FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to load session")?
            .get("created_at");

        let exchanges: Vec<Exchange> = sqlx::query(
            r#"
            SELECT request, response, status, at
            FROM exchanges
            WHERE session_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load exchanges")?
        .iter()
        .map(|row| Exchange {
            request: row.get("request"),
            response: row.get("response"),
            status: ExchangeStatus::parse(&row.get::<String, _>("status")),
            at: Self::from_naive(row.get("at")),
        })
        .collect();

        let mut scratch = SharedState::new();
        let rows = sqlx::query("SELECT key, value FROM scratch WHERE session_id = ?1")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load scratch")?;
        for row in rows {
            let key: String = row.get("key");
            let value: Value = serde_json::from_str(&row.get::<String, _>("value"))
                .with_context(|| format!("Corrupt scratch value for '{}'", key))?;
            scratch.insert(key, value);
        }

        Ok(Session {
            id: session_id.to_string(),
            created_at: Self::from_naive(created_at),
            exchanges,
            scratch,
        })
    }

    async fn append_exchange(&self, session_id: &str, exchange: Exchange) -> Result<()> {
        self.ensure_session(session_id).await?;
        sqlx::query(
            r#"
            INSERT INTO exchanges (session_id, request, response, status, at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(session_id)
        .bind(&exchange.request)
        .bind(&exchange.response)
        .bind(exchange.status.as_str())
        .bind(exchange.at.naive_utc())
        .execute(&self.pool)
        .await
        .context("Failed to save exchange")?;
        Ok(())
    }

    async fn read_scratch(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM scratch WHERE session_id = ?1 AND key = ?2")
            .bind(session_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read scratch")?;

        row.map(|row| {
            serde_json::from_str(&row.get::<String, _>("value"))
                .with_context(|| format!("Corrupt scratch value for '{}'", key))
        })
        .transpose()
    }

    async fn write_scratch(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        self.ensure_session(session_id).await?;
        sqlx::query("INSERT OR REPLACE INTO scratch (session_id, key, value) VALUES (?1, ?2, ?3)")
            .bind(session_id)
            .bind(key)
            .bind(value.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to write scratch")?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM sessions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list sessions")?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}
