//! Data models for the segmentation engine

use crate::catalog::SegmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Churn risk band derived from purchase recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChurnRisk {
    Low,
    Medium,
    High,
}

impl ChurnRisk {
    /// Band for a given recency, in days since last purchase.
    ///
    /// `Low` up to 90 days (including the no-purchase-history case,
    /// where no disconfirming evidence exists), `Medium` up to 180,
    /// `High` beyond.
    pub fn from_days_since_last_purchase(days: i64) -> Self {
        if days > 180 {
            ChurnRisk::High
        } else if days > 90 {
            ChurnRisk::Medium
        } else {
            ChurnRisk::Low
        }
    }

    /// Ordinal encoding used in clustering feature vectors (0/1/2)
    pub fn ordinal(&self) -> f64 {
        match self {
            ChurnRisk::Low => 0.0,
            ChurnRisk::Medium => 1.0,
            ChurnRisk::High => 2.0,
        }
    }
}

/// Behavioral feature summary derived from a customer's purchase history.
///
/// Recomputed on every segmentation request; never persisted on its own
/// (it travels embedded in the resulting assignment).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFeatures {
    pub total_purchases: u64,
    pub total_spent: f64,
    pub average_order_value: f64,
    /// Purchases per month over the first-to-last purchase span
    /// (minimum one-month denominator; zero below two purchases)
    pub purchase_frequency: f64,
    pub days_since_last_purchase: i64,
    /// Up to three categories, ranked by purchase count
    pub favorite_categories: Vec<String>,
    /// Equal to total spend
    pub lifetime_value: f64,
    pub churn_risk: ChurnRisk,
    /// 0-100, derived from frequency, recency, and category diversity
    pub engagement_level: u8,
    /// Top-two weekdays by purchase count
    pub preferred_shopping_days: Vec<String>,
    /// Top-two time-of-day buckets by purchase count
    pub preferred_shopping_times: Vec<String>,
}

impl CustomerFeatures {
    /// Fixed-order numeric projection for clustering.
    ///
    /// Order: total purchases, total spend, average order value,
    /// frequency, days since last purchase, lifetime value, engagement
    /// level, churn risk ordinal.
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.total_purchases as f64,
            self.total_spent,
            self.average_order_value,
            self.purchase_frequency,
            self.days_since_last_purchase as f64,
            self.lifetime_value,
            self.engagement_level as f64,
            self.churn_risk.ordinal(),
        ]
    }
}

/// The authoritative segment assignment for one customer.
///
/// Overwritten on every segmentation run; only the most recent
/// assignment is persisted (via the assignment cache collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAssignment {
    pub customer_id: Uuid,
    pub segment_id: SegmentId,
    pub segment_name: String,
    pub assigned_at: DateTime<Utc>,
    /// Confidence in this assignment (0.0-1.0)
    pub confidence: f32,
    /// Feature summary snapshot the assignment was derived from
    pub features: CustomerFeatures,
    /// Segment held before this run, if any
    pub previous_segment_id: Option<SegmentId>,
    /// Populated if and only if a previous assignment existed with a
    /// different segment identifier
    pub migration_reason: Option<String>,
}

/// One K-means cluster; exists only for the duration of a batch
/// clustering call.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: usize,
    pub centroid: Vec<f64>,
    pub members: Vec<Uuid>,
    pub size: usize,
    /// Mean squared distance of members to the centroid
    pub variance: f64,
    /// Inverse-variance quality measure: `1 / (1 + variance)`
    pub cohesion: f64,
}

/// Result of one batch clustering pass.
#[derive(Debug, Clone)]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    /// Average cohesion over clusters of size > 1, rescaled to [-1, 1]
    pub silhouette_score: f64,
    pub iterations: usize,
    pub converged: bool,
    pub k: usize,
}

/// Lifecycle phases of one customer-segmentation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationPhase {
    NotStarted,
    FeaturesExtracted,
    Classified,
    ClusteredBatch,
    Resolved,
    Persisted,
    MigrationNotified,
}

impl SegmentationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentationPhase::NotStarted => "NotStarted",
            SegmentationPhase::FeaturesExtracted => "FeaturesExtracted",
            SegmentationPhase::Classified => "Classified",
            SegmentationPhase::ClusteredBatch => "ClusteredBatch",
            SegmentationPhase::Resolved => "Resolved",
            SegmentationPhase::Persisted => "Persisted",
            SegmentationPhase::MigrationNotified => "MigrationNotified",
        }
    }
}

/// Per-request progress tracker; transitions are logged for tracing
/// a request through the pipeline.
#[derive(Debug, Clone)]
pub struct SegmentationRun {
    pub customer_id: Uuid,
    pub phase: SegmentationPhase,
    pub started_at: DateTime<Utc>,
}

impl SegmentationRun {
    pub fn new(customer_id: Uuid) -> Self {
        Self {
            customer_id,
            phase: SegmentationPhase::NotStarted,
            started_at: Utc::now(),
        }
    }

    /// Advance to the next phase, logging the transition.
    pub fn transition_to(&mut self, next: SegmentationPhase) {
        tracing::debug!(
            customer_id = %self.customer_id,
            from = self.phase.as_str(),
            to = next.as_str(),
            "Segmentation phase transition"
        );
        self.phase = next;
    }

    /// Elapsed time since the request started, in milliseconds.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
