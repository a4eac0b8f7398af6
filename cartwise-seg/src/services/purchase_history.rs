//! Purchase history collaborator
//!
//! The purchase-history store is external to the engine; this module
//! defines the minimum contract the engine requires plus an in-memory
//! implementation used in tests and single-process deployments.

use crate::error::Result;
use async_trait::async_trait;
use cartwise_common::models::PurchaseRecord;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Read-only access to customer purchase histories.
///
/// Implementations return an empty list for unknown customers rather
/// than erroring.
#[async_trait]
pub trait PurchaseHistoryProvider: Send + Sync {
    async fn get_purchases(&self, customer_id: Uuid) -> Result<Vec<PurchaseRecord>>;
}

/// In-memory purchase history keyed by customer.
#[derive(Default)]
pub struct InMemoryPurchaseHistory {
    inner: RwLock<HashMap<Uuid, Vec<PurchaseRecord>>>,
}

impl InMemoryPurchaseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one purchase to a customer's history.
    pub async fn add_purchase(&self, record: PurchaseRecord) {
        self.inner
            .write()
            .await
            .entry(record.customer_id)
            .or_default()
            .push(record);
    }

    /// Replace a customer's entire history.
    pub async fn set_history(&self, customer_id: Uuid, records: Vec<PurchaseRecord>) {
        self.inner.write().await.insert(customer_id, records);
    }
}

#[async_trait]
impl PurchaseHistoryProvider for InMemoryPurchaseHistory {
    async fn get_purchases(&self, customer_id: Uuid) -> Result<Vec<PurchaseRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&customer_id)
            .cloned()
            .unwrap_or_default())
    }
}
