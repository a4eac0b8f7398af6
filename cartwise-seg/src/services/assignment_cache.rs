//! Assignment cache collaborator
//!
//! Persists the latest segment assignment per customer so repeat
//! requests can be served without recomputation. The cache owns its
//! persistence format; TTLs are advisory. Operations are idempotent and
//! keyed by customer, so concurrent writers follow last-writer-wins.

use crate::error::Result;
use crate::models::SegmentAssignment;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Latest-assignment store, one entry per customer.
#[async_trait]
pub trait AssignmentCache: Send + Sync {
    /// Fetch the latest non-expired assignment, if any.
    async fn get(&self, customer_id: Uuid) -> Result<Option<SegmentAssignment>>;

    /// Store the latest assignment, replacing any previous entry.
    async fn set(&self, assignment: &SegmentAssignment, ttl: Duration) -> Result<()>;
}

/// In-memory expiry-aware assignment cache.
#[derive(Default)]
pub struct InMemoryAssignmentCache {
    inner: RwLock<HashMap<Uuid, (SegmentAssignment, Instant)>>,
}

impl InMemoryAssignmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including not-yet-evicted expired ones.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl AssignmentCache for InMemoryAssignmentCache {
    async fn get(&self, customer_id: Uuid) -> Result<Option<SegmentAssignment>> {
        let expired = {
            let entries = self.inner.read().await;
            match entries.get(&customer_id) {
                Some((assignment, expires_at)) => {
                    if Instant::now() < *expires_at {
                        return Ok(Some(assignment.clone()));
                    }
                    true
                }
                None => false,
            }
        };
        if expired {
            // Re-check under the write lock: a concurrent set may have
            // replaced the entry since the read guard was dropped, and
            // the fresh write must survive.
            let mut entries = self.inner.write().await;
            if entries
                .get(&customer_id)
                .is_some_and(|(_, expires_at)| Instant::now() >= *expires_at)
            {
                entries.remove(&customer_id);
            }
        }
        Ok(None)
    }

    async fn set(&self, assignment: &SegmentAssignment, ttl: Duration) -> Result<()> {
        // Oversized TTLs saturate to the farthest representable expiry
        // instead of overflowing the Instant addition.
        let expires_at = Instant::now()
            .checked_add(ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(u32::MAX as u64));
        self.inner
            .write()
            .await
            .insert(assignment.customer_id, (assignment.clone(), expires_at));
        Ok(())
    }
}
