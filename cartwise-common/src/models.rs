//! Shared domain models for Cartwise services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single purchase line item.
///
/// Owned by the purchase-history service; immutable once created.
/// Read-only input to analytics consumers such as the segmentation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    /// Purchase record identifier
    pub id: Uuid,
    /// Customer who made the purchase
    pub customer_id: Uuid,
    /// Product identifier
    pub product_id: String,
    /// Product display name
    pub product_name: String,
    /// Product category (e.g. "Dairy", "Bakery")
    pub category: String,
    /// Quantity purchased (always positive)
    pub quantity: u32,
    /// Unit price (non-negative)
    pub unit_price: f64,
    /// When the purchase was made
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseRecord {
    /// Total line amount (`unit_price * quantity`)
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Caller-specified effort level for customer analysis.
///
/// Controls whether the external assisted-analysis collaborator is
/// consulted (`Detailed`/`Comprehensive`) or only the deterministic
/// rule path runs (`Basic`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Basic,
    Detailed,
    Comprehensive,
}

impl AnalysisDepth {
    /// String representation used in logs and metric tags
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDepth::Basic => "basic",
            AnalysisDepth::Detailed => "detailed",
            AnalysisDepth::Comprehensive => "comprehensive",
        }
    }

    /// Whether this depth consults the assisted-analysis collaborator
    pub fn uses_assisted_analysis(&self) -> bool {
        matches!(self, AnalysisDepth::Detailed | AnalysisDepth::Comprehensive)
    }
}

impl std::fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
