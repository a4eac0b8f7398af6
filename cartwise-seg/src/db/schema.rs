//! Cache database schema

use crate::error::Result;
use sqlx::SqlitePool;

/// Create cache tables if they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segment_assignments (
            customer_id TEXT PRIMARY KEY,
            segment_id TEXT NOT NULL,
            segment_name TEXT NOT NULL,
            confidence REAL NOT NULL,
            assigned_at TEXT NOT NULL,
            previous_segment_id TEXT,
            migration_reason TEXT,
            features TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Cache database tables initialized (segment_assignments)");

    Ok(())
}
