//! SQLite-backed assignment cache
//!
//! Reference implementation of the `AssignmentCache` collaborator for
//! single-node deployments. The cache owns its persistence format; the
//! engine only sees the trait.

pub mod assignments;
pub mod schema;

use crate::error::Result;
use crate::models::SegmentAssignment;
use crate::services::assignment_cache::AssignmentCache;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Initialize the cache database connection pool.
///
/// Creates the database file (and parent directory) if missing and runs
/// table setup.
pub async fn init_cache_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(cartwise_common::Error::Io)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to cache database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    schema::init_tables(&pool).await?;

    Ok(pool)
}

/// Assignment cache persisted in SQLite.
#[derive(Clone)]
pub struct SqliteAssignmentCache {
    pool: SqlitePool,
}

impl SqliteAssignmentCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) a cache database at the given path.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = init_cache_pool(db_path).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl AssignmentCache for SqliteAssignmentCache {
    async fn get(&self, customer_id: Uuid) -> Result<Option<SegmentAssignment>> {
        assignments::fetch_assignment(&self.pool, customer_id).await
    }

    async fn set(&self, assignment: &SegmentAssignment, ttl: Duration) -> Result<()> {
        assignments::upsert_assignment(&self.pool, assignment, ttl).await
    }
}
