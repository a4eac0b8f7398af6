//! SQLite assignment cache tests
//!
//! Verify the persisted cache behaves identically to the in-memory
//! reference implementation: round-trip fidelity, TTL expiry, and
//! last-writer-wins overwrites.

use cartwise_seg::catalog::SegmentId;
use cartwise_seg::db::SqliteAssignmentCache;
use cartwise_seg::models::{ChurnRisk, CustomerFeatures, SegmentAssignment};
use cartwise_seg::services::AssignmentCache;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

async fn open_cache(dir: &tempfile::TempDir) -> SqliteAssignmentCache {
    SqliteAssignmentCache::open(&dir.path().join("cache.db"))
        .await
        .unwrap()
}

fn assignment(customer_id: Uuid, segment_id: SegmentId) -> SegmentAssignment {
    SegmentAssignment {
        customer_id,
        segment_id,
        segment_name: segment_id.display_name().to_string(),
        assigned_at: Utc::now(),
        confidence: 0.85,
        features: CustomerFeatures {
            total_purchases: 12,
            total_spent: 640.0,
            average_order_value: 53.33,
            purchase_frequency: 2.4,
            days_since_last_purchase: 9,
            favorite_categories: vec!["Dairy".to_string(), "Bakery".to_string()],
            lifetime_value: 640.0,
            churn_risk: ChurnRisk::Low,
            engagement_level: 78,
            preferred_shopping_days: vec!["Saturday".to_string()],
            preferred_shopping_times: vec!["Morning".to_string()],
        },
        previous_segment_id: Some(SegmentId::New),
        migration_reason: Some("New customer successfully converted to loyal".to_string()),
    }
}

#[tokio::test]
async fn set_then_get_round_trips_all_fields() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir).await;
    let customer_id = Uuid::new_v4();
    let stored = assignment(customer_id, SegmentId::Loyal);

    cache
        .set(&stored, Duration::from_secs(3600))
        .await
        .unwrap();
    let loaded = cache.get(customer_id).await.unwrap().unwrap();

    assert_eq!(loaded.customer_id, customer_id);
    assert_eq!(loaded.segment_id, SegmentId::Loyal);
    assert_eq!(loaded.segment_name, "Loyal");
    assert_eq!(loaded.confidence, stored.confidence);
    assert_eq!(loaded.previous_segment_id, Some(SegmentId::New));
    assert_eq!(loaded.migration_reason, stored.migration_reason);
    assert_eq!(loaded.features.total_purchases, 12);
    assert_eq!(
        loaded.features.favorite_categories,
        vec!["Dairy".to_string(), "Bakery".to_string()]
    );
    assert_eq!(loaded.features.churn_risk, ChurnRisk::Low);
}

#[tokio::test]
async fn missing_customer_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir).await;

    let loaded = cache.get(Uuid::new_v4()).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn expired_entry_is_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir).await;
    let customer_id = Uuid::new_v4();

    cache
        .set(&assignment(customer_id, SegmentId::Champions), Duration::ZERO)
        .await
        .unwrap();

    let loaded = cache.get(customer_id).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn oversized_ttl_is_capped_not_pre_expired() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir).await;
    let customer_id = Uuid::new_v4();

    // A TTL beyond i64 seconds must clamp to a far-future expiry, not
    // wrap negative and expire the entry on write.
    cache
        .set(
            &assignment(customer_id, SegmentId::Loyal),
            Duration::from_secs(u64::MAX),
        )
        .await
        .unwrap();

    let loaded = cache.get(customer_id).await.unwrap();
    assert!(loaded.is_some());
}

#[tokio::test]
async fn second_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir).await;
    let customer_id = Uuid::new_v4();

    cache
        .set(
            &assignment(customer_id, SegmentId::Champions),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
    cache
        .set(
            &assignment(customer_id, SegmentId::AtRisk),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    let loaded = cache.get(customer_id).await.unwrap().unwrap();
    assert_eq!(loaded.segment_id, SegmentId::AtRisk);
}

#[tokio::test]
async fn cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let customer_id = Uuid::new_v4();

    {
        let cache = open_cache(&dir).await;
        cache
            .set(
                &assignment(customer_id, SegmentId::Hibernating),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
    }

    let reopened = open_cache(&dir).await;
    let loaded = reopened.get(customer_id).await.unwrap().unwrap();
    assert_eq!(loaded.segment_id, SegmentId::Hibernating);
}
