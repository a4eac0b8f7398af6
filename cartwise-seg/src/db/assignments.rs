//! Assignment cache queries

use crate::catalog::SegmentId;
use crate::error::Result;
use crate::models::SegmentAssignment;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on the stored TTL (100 years). Caps oversized values so
/// the seconds cast cannot wrap negative and the expiry timestamp keeps
/// a four-digit year, which the lexicographic RFC3339 comparison in the
/// expiry filter depends on.
const MAX_TTL_SECS: i64 = 100 * 365 * 86_400;

/// Insert or replace a customer's latest assignment.
pub async fn upsert_assignment(
    pool: &SqlitePool,
    assignment: &SegmentAssignment,
    ttl: Duration,
) -> Result<()> {
    let ttl_secs = i64::try_from(ttl.as_secs())
        .unwrap_or(MAX_TTL_SECS)
        .min(MAX_TTL_SECS);
    let expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs);
    let features = serde_json::to_string(&assignment.features)?;

    sqlx::query(
        r#"
        INSERT INTO segment_assignments
            (customer_id, segment_id, segment_name, confidence, assigned_at,
             previous_segment_id, migration_reason, features, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(customer_id) DO UPDATE SET
            segment_id = excluded.segment_id,
            segment_name = excluded.segment_name,
            confidence = excluded.confidence,
            assigned_at = excluded.assigned_at,
            previous_segment_id = excluded.previous_segment_id,
            migration_reason = excluded.migration_reason,
            features = excluded.features,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(assignment.customer_id.to_string())
    .bind(assignment.segment_id.as_str())
    .bind(&assignment.segment_name)
    .bind(assignment.confidence as f64)
    .bind(assignment.assigned_at.to_rfc3339())
    .bind(assignment.previous_segment_id.map(|id| id.as_str()))
    .bind(&assignment.migration_reason)
    .bind(features)
    .bind(expires_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a customer's latest assignment if present and not expired.
pub async fn fetch_assignment(
    pool: &SqlitePool,
    customer_id: Uuid,
) -> Result<Option<SegmentAssignment>> {
    let row: Option<(
        String,
        String,
        f64,
        String,
        Option<String>,
        Option<String>,
        String,
    )> = sqlx::query_as(
        r#"
        SELECT segment_id, segment_name, confidence, assigned_at,
               previous_segment_id, migration_reason, features
        FROM segment_assignments
        WHERE customer_id = ? AND expires_at > ?
        "#,
    )
    .bind(customer_id.to_string())
    .bind(Utc::now().to_rfc3339())
    .fetch_optional(pool)
    .await?;

    let Some((segment_id, segment_name, confidence, assigned_at, previous, reason, features)) =
        row
    else {
        return Ok(None);
    };

    let segment_id: SegmentId = segment_id.parse()?;
    let previous_segment_id = previous.map(|s| s.parse()).transpose()?;
    let assigned_at = parse_timestamp(&assigned_at)?;
    let features = serde_json::from_str(&features)?;

    Ok(Some(SegmentAssignment {
        customer_id,
        segment_id,
        segment_name,
        assigned_at,
        confidence: confidence as f32,
        features,
        previous_segment_id,
        migration_reason: reason,
    }))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            cartwise_common::Error::InvalidInput(format!("Bad timestamp in cache row: {}", e))
                .into()
        })
}
