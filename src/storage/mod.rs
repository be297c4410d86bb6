//! SQLite storage layer -- schema, migrations and summary snapshots.

pub mod schema;

use crate::analysis::aggregator::SummaryTree;
use chrono::Utc;
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Slot holding the most recent snapshot of a project.
const LATEST: u32 = 0;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("summary store unavailable: {0}")]
    Unavailable(#[from] r2d2::Error),

    #[error("summary store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("snapshot for '{project}' could not be encoded: {source}")]
    Encode {
        project: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot for '{project}' is corrupt: {source}")]
    Corrupt {
        project: String,
        #[source]
        source: serde_json::Error,
    },
}

fn init_connection(c: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    c.execute_batch(
        "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
    )
}

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool, StoreError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            // Let the open below report the failure if this does not work.
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(init_connection);
    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Single-connection pool over a private in-memory database.
pub fn open_memory_pool() -> Result<Pool, StoreError> {
    let manager = SqliteConnectionManager::memory();
    let pool = R2D2Pool::builder().max_size(1).build(manager)?;
    let conn = pool.get()?;
    schema::migrate(&conn)?;
    Ok(pool)
}

/// Durable home of each project's summary tree.
#[derive(Clone)]
pub struct SummaryStore {
    pool: Pool,
}

impl SummaryStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self::new(open_pool(path)?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Store `tree` as the project's latest snapshot and, when `build` is
    /// given, as that build's snapshot too. Both writes commit together.
    pub fn save(&self, tree: &SummaryTree, build: Option<u32>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(tree).map_err(|source| StoreError::Encode {
            project: tree.project.clone(),
            source,
        })?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO summary_snapshots (project, build_number, payload_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(project, build_number)
                 DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            )?;
            stmt.execute(params![tree.project, LATEST, payload, now])?;
            if let Some(build) = build.filter(|b| *b != LATEST) {
                stmt.execute(params![tree.project, build, payload, now])?;
            }
        }
        tx.commit()?;

        info!(project = %tree.project, ?build, bytes = payload.len(), "saved summary snapshot");
        Ok(())
    }

    /// Load the latest snapshot, or one build's snapshot.
    /// `Ok(None)` when nothing has been stored yet.
    pub fn load(&self, project: &str, build: Option<u32>) -> Result<Option<SummaryTree>, StoreError> {
        let conn = self.pool.get()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM summary_snapshots WHERE project = ?1 AND build_number = ?2",
                params![project, build.unwrap_or(LATEST)],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            debug!(%project, ?build, "no stored snapshot");
            return Ok(None);
        };

        let tree = serde_json::from_str(&payload).map_err(|source| StoreError::Corrupt {
            project: project.to_string(),
            source,
        })?;
        Ok(Some(tree))
    }

    /// Build numbers that have a point-in-time snapshot, ascending.
    pub fn list_snapshots(&self, project: &str) -> Result<Vec<u32>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT build_number FROM summary_snapshots
             WHERE project = ?1 AND build_number <> ?2
             ORDER BY build_number ASC",
        )?;
        let rows = stmt.query_map(params![project, LATEST], |row| row.get::<_, u32>(0))?;

        let mut builds = Vec::new();
        for r in rows {
            builds.push(r?);
        }
        Ok(builds)
    }

    /// Remove every snapshot of a project. Returns how many were deleted.
    pub fn delete_project(&self, project: &str) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute(
            "DELETE FROM summary_snapshots WHERE project = ?1",
            params![project],
        )?;
        Ok(deleted)
    }
}
