//! LibSQL storage backend implementation
//!
//! Persists sites and interaction events in a local libSQL (SQLite) file or
//! a remote libSQL server. Schema migrations are embedded in the binary and
//! tracked in `_migrations_applied`.

use crate::error::{HeatforgeError, Result};
use crate::storage::SiteStore;
use crate::types::{EventKind, InteractionEvent, Site};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Builder, Connection, Database};
use tracing::{debug, info};

/// Embedded migrations, applied in order
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial_schema.sql",
        include_str!("../../migrations/libsql/001_initial_schema.sql"),
    ),
    (
        "002_add_indexes.sql",
        include_str!("../../migrations/libsql/002_add_indexes.sql"),
    ),
];

const SITE_COLUMNS: &str = "site_id, markup, style, script, preview_document, created_at, \
     last_accessed_at, view_count, click_count, parent_site_id, is_optimized, image_refs";

const INTERACTION_COLUMNS: &str = "site_id, session_id, kind, x, y, value, timestamp, dom_path, \
     element_text, scroll_percentage, time_spent_ms, viewport_width, viewport_height, user_agent, \
     referrer";

/// Parse SQL file into individual statements, handling multi-line constructs like triggers
fn parse_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0; // BEGIN/END nesting depth

    for line in sql.lines() {
        let trimmed = line.trim();

        if current.is_empty() && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        let upper = trimmed.to_uppercase();
        if upper.starts_with("BEGIN") || upper.contains(" BEGIN") {
            depth += 1;
        }
        if upper.starts_with("END") {
            depth = depth.saturating_sub(1);
        }

        if trimmed.ends_with(';') && depth == 0 {
            statements.push(current.clone());
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        statements.push(current);
    }

    statements
}

/// Timestamps are stored with fixed nanosecond precision so that text
/// ordering matches chronological ordering.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HeatforgeError::Database(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Database connection mode
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (for testing)
    InMemory,
    /// Remote libSQL server
    Remote { url: String, token: String },
}

/// LibSQL storage backend
pub struct LibsqlStore {
    // Held so the database outlives its connection
    _db: Database,
    conn: Connection,
}

impl LibsqlStore {
    /// Validate an existing database file before opening it
    ///
    /// Returns `Ok(false)` when the file does not exist yet.
    fn validate_database_file(db_path: &str) -> Result<bool> {
        let path = std::path::Path::new(db_path);
        if !path.exists() {
            return Ok(false);
        }

        // SQLite files start with "SQLite format 3\0" (16 bytes); an empty
        // file is a database that was created but never written.
        let bytes = std::fs::read(path).map_err(|e| {
            HeatforgeError::Database(format!("Cannot read database file at '{}': {}", db_path, e))
        })?;
        if !bytes.is_empty() && (bytes.len() < 16 || &bytes[0..16] != b"SQLite format 3\0") {
            return Err(HeatforgeError::Database(format!(
                "Database file at '{}' is corrupted or not a valid SQLite database.",
                db_path
            )));
        }

        debug!("Database file validation passed: {}", db_path);
        Ok(true)
    }

    /// Open (creating if needed) a store and run migrations
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        info!("Connecting to LibSQL database: {:?}", redact(&mode));

        let db = match mode {
            ConnectionMode::Local(ref path) => {
                Self::validate_database_file(path)?;
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            HeatforgeError::Database(format!(
                                "Failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                Builder::new_local(path).build().await.map_err(|e| {
                    HeatforgeError::Database(format!("Failed to create local database: {}", e))
                })?
            }
            ConnectionMode::InMemory => Builder::new_local(":memory:").build().await.map_err(|e| {
                HeatforgeError::Database(format!("Failed to create in-memory database: {}", e))
            })?,
            ConnectionMode::Remote { ref url, ref token } => {
                Builder::new_remote(url.clone(), token.clone())
                    .build()
                    .await
                    .map_err(|e| {
                        HeatforgeError::Database(format!("Failed to create remote database: {}", e))
                    })?
            }
        };

        // A single shared connection keeps `:memory:` databases coherent
        let conn = db
            .connect()
            .map_err(|e| HeatforgeError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self { _db: db, conn };
        store.run_migrations().await?;
        info!("LibSQL database connection established");
        Ok(store)
    }

    /// Open a local database file
    pub async fn new_local(path: &str) -> Result<Self> {
        Self::new(ConnectionMode::Local(path.to_string())).await
    }

    /// Parse a database URL and open the matching connection mode
    ///
    /// - ":memory:" → InMemory
    /// - "libsql://..." → Remote (token from `LIBSQL_AUTH_TOKEN`)
    /// - Other → Local file path
    pub async fn from_path(database_url: &str) -> Result<Self> {
        let mode = if database_url == ":memory:" {
            ConnectionMode::InMemory
        } else if database_url.starts_with("libsql://") {
            let token = std::env::var("LIBSQL_AUTH_TOKEN")
                .map_err(|_| HeatforgeError::Other("LIBSQL_AUTH_TOKEN not found".into()))?;
            ConnectionMode::Remote {
                url: database_url.to_string(),
                token,
            }
        } else {
            ConnectionMode::Local(database_url.to_string())
        };

        Self::new(mode).await
    }

    /// Run embedded database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS _migrations_applied (
                    migration_name TEXT PRIMARY KEY,
                    applied_at INTEGER NOT NULL
                )",
                params![],
            )
            .await
            .map_err(|e| {
                HeatforgeError::Migration(format!("Failed to create migrations table: {}", e))
            })?;

        for (name, sql) in MIGRATIONS {
            let mut rows = self
                .conn
                .query(
                    "SELECT COUNT(*) FROM _migrations_applied WHERE migration_name = ?",
                    params![*name],
                )
                .await?;
            let already_applied = match rows.next().await? {
                Some(row) => row.get::<i64>(0).unwrap_or(0),
                None => 0,
            };
            if already_applied > 0 {
                debug!("Skipping already applied migration: {}", name);
                continue;
            }

            let statements = parse_sql_statements(sql);
            debug!("Parsed {} statements from {}", statements.len(), name);
            for (i, statement) in statements.iter().enumerate() {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                self.conn.execute(statement, params![]).await.map_err(|e| {
                    HeatforgeError::Migration(format!(
                        "Failed to execute statement #{} in {}: {}",
                        i + 1,
                        name,
                        e
                    ))
                })?;
            }

            self.conn
                .execute(
                    "INSERT INTO _migrations_applied (migration_name, applied_at) VALUES (?, ?)",
                    params![*name, Utc::now().timestamp()],
                )
                .await
                .map_err(|e| HeatforgeError::Migration(format!("Failed to record migration: {}", e)))?;

            info!("Executed migration: {}", name);
        }

        info!("Database migrations completed");
        Ok(())
    }

    fn row_to_site(row: &libsql::Row) -> Result<Site> {
        let image_refs_json: String = row.get(11)?;
        Ok(Site {
            site_id: row.get(0)?,
            markup: row.get(1)?,
            style: row.get(2)?,
            script: row.get(3)?,
            preview_document: row.get(4)?,
            created_at: parse_ts(&row.get::<String>(5)?)?,
            last_accessed_at: parse_ts(&row.get::<String>(6)?)?,
            view_count: row.get::<i64>(7)?.max(0) as u64,
            click_count: row.get::<i64>(8)?.max(0) as u64,
            parent_site_id: row.get(9)?,
            is_optimized: row.get::<i64>(10)? != 0,
            image_refs: serde_json::from_str(&image_refs_json)?,
        })
    }

    fn row_to_interaction(row: &libsql::Row) -> Result<InteractionEvent> {
        let kind_str: String = row.get(2)?;
        let kind = EventKind::parse(&kind_str).ok_or_else(|| {
            HeatforgeError::Database(format!("Unknown interaction kind: {}", kind_str))
        })?;

        Ok(InteractionEvent {
            site_id: row.get(0)?,
            session_id: row.get(1)?,
            kind,
            x: row.get(3)?,
            y: row.get(4)?,
            value: row.get(5)?,
            timestamp: row.get(6)?,
            dom_path: row.get(7)?,
            element_text: row.get(8)?,
            scroll_percentage: row.get(9)?,
            time_spent_ms: row.get(10)?,
            viewport_width: row.get::<Option<i64>>(11)?.map(|v| v.max(0) as u32),
            viewport_height: row.get::<Option<i64>>(12)?.map(|v| v.max(0) as u32),
            user_agent: row.get(13)?,
            referrer: row.get(14)?,
        })
    }
}

fn redact(mode: &ConnectionMode) -> String {
    match mode {
        ConnectionMode::Local(path) => format!("local:{}", path),
        ConnectionMode::InMemory => "memory".to_string(),
        ConnectionMode::Remote { url, .. } => format!("remote:{}", url),
    }
}

#[async_trait]
impl SiteStore for LibsqlStore {
    fn backend_name(&self) -> &'static str {
        "libsql"
    }

    async fn get_site(&self, site_id: &str) -> Result<Option<Site>> {
        debug!("Fetching site: {}", site_id);
        let sql = format!("SELECT {} FROM sites WHERE site_id = ?", SITE_COLUMNS);
        let mut rows = self.conn.query(&sql, params![site_id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_site(&row)?)),
            None => Ok(None),
        }
    }

    async fn put_site(&self, site: &Site) -> Result<()> {
        debug!("Storing site: {}", site.site_id);
        let sql = format!(
            "INSERT OR REPLACE INTO sites ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SITE_COLUMNS
        );
        self.conn
            .execute(
                &sql,
                params![
                    site.site_id.clone(),
                    site.markup.clone(),
                    site.style.clone(),
                    site.script.clone(),
                    site.preview_document.clone(),
                    format_ts(&site.created_at),
                    format_ts(&site.last_accessed_at),
                    site.view_count as i64,
                    site.click_count as i64,
                    site.parent_site_id.clone(),
                    if site.is_optimized { 1i64 } else { 0i64 },
                    serde_json::to_string(&site.image_refs)?
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_latest_derived(&self, original_id: &str) -> Result<Option<Site>> {
        let sql = format!(
            "SELECT {} FROM sites WHERE parent_site_id = ? \
             ORDER BY created_at DESC, site_id DESC LIMIT 1",
            SITE_COLUMNS
        );
        let mut rows = self.conn.query(&sql, params![original_id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_site(&row)?)),
            None => Ok(None),
        }
    }

    async fn count_derived(&self, original_id: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM sites WHERE parent_site_id = ?",
                params![original_id],
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count.max(0) as usize)
    }

    async fn record_view(&self, site_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sites SET view_count = view_count + 1, last_accessed_at = ? WHERE site_id = ?",
                params![format_ts(&at), site_id],
            )
            .await?;
        Ok(())
    }

    async fn increment_clicks(&self, site_id: &str) -> Result<Option<u64>> {
        // Each concurrent click observes a distinct counter value
        let mut rows = self
            .conn
            .query(
                "UPDATE sites SET click_count = click_count + 1 WHERE site_id = ? \
                 RETURNING click_count",
                params![site_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)?.max(0) as u64)),
            None => Ok(None),
        }
    }

    async fn list_interactions(&self, site_id: &str) -> Result<Vec<InteractionEvent>> {
        let sql = format!(
            "SELECT {} FROM interactions WHERE site_id = ? ORDER BY id ASC",
            INTERACTION_COLUMNS
        );
        let mut rows = self.conn.query(&sql, params![site_id]).await?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::row_to_interaction(&row)?);
        }
        Ok(events)
    }

    async fn append_interaction(&self, event: &InteractionEvent) -> Result<()> {
        let sql = format!(
            "INSERT INTO interactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            INTERACTION_COLUMNS
        );
        self.conn
            .execute(
                &sql,
                params![
                    event.site_id.clone(),
                    event.session_id.clone(),
                    event.kind.as_str(),
                    event.x,
                    event.y,
                    event.value,
                    event.timestamp,
                    event.dom_path.clone(),
                    event.element_text.clone(),
                    event.scroll_percentage,
                    event.time_spent_ms,
                    event.viewport_width.map(i64::from),
                    event.viewport_height.map(i64::from),
                    event.user_agent.clone(),
                    event.referrer.clone()
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_interactions(&self, site_id: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM interactions WHERE site_id = ?", params![site_id])
            .await?;
        Ok(deleted as usize)
    }
}
