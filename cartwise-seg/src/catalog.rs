//! Segment catalogue and its owned store
//!
//! The catalogue is a closed set of behavioral segments, each carrying
//! defining criteria, running aggregate statistics, and a recommendation
//! strategy descriptor for downstream consumers. The `SegmentStore` is an
//! explicitly owned, injected store (no process-wide globals): create one
//! per process and share it by `Arc`.

use crate::error::{Result, SegmentationError};
use crate::models::CustomerFeatures;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;

/// Closed catalogue of segment identifiers.
///
/// Serialized form matches the wire/cache representation
/// (e.g. `"potential-loyalists"`, `"cant-lose"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentId {
    Champions,
    Loyal,
    PotentialLoyalists,
    New,
    AtRisk,
    CantLose,
    Hibernating,
    Lost,
}

impl SegmentId {
    /// All catalogue entries, in presentation order
    pub const ALL: [SegmentId; 8] = [
        SegmentId::Champions,
        SegmentId::Loyal,
        SegmentId::PotentialLoyalists,
        SegmentId::New,
        SegmentId::AtRisk,
        SegmentId::CantLose,
        SegmentId::Hibernating,
        SegmentId::Lost,
    ];

    /// Stable identifier string (matches serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentId::Champions => "champions",
            SegmentId::Loyal => "loyal",
            SegmentId::PotentialLoyalists => "potential-loyalists",
            SegmentId::New => "new",
            SegmentId::AtRisk => "at-risk",
            SegmentId::CantLose => "cant-lose",
            SegmentId::Hibernating => "hibernating",
            SegmentId::Lost => "lost",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SegmentId::Champions => "Champions",
            SegmentId::Loyal => "Loyal",
            SegmentId::PotentialLoyalists => "Potential Loyalists",
            SegmentId::New => "New",
            SegmentId::AtRisk => "At Risk",
            SegmentId::CantLose => "Can't Lose",
            SegmentId::Hibernating => "Hibernating",
            SegmentId::Lost => "Lost",
        }
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentId {
    type Err = SegmentationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "champions" => Ok(SegmentId::Champions),
            "loyal" => Ok(SegmentId::Loyal),
            "potential-loyalists" => Ok(SegmentId::PotentialLoyalists),
            "new" => Ok(SegmentId::New),
            "at-risk" => Ok(SegmentId::AtRisk),
            "cant-lose" => Ok(SegmentId::CantLose),
            "hibernating" => Ok(SegmentId::Hibernating),
            "lost" => Ok(SegmentId::Lost),
            other => Err(SegmentationError::UnknownSegment(other.to_string())),
        }
    }
}

/// Qualitative traits associated with a segment's typical customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCharacteristics {
    pub primary_categories: Vec<String>,
    pub brand_affinity: AffinityLevel,
    pub price_preference: PricePreference,
    pub shopping_pattern: ShoppingPattern,
    pub seasonal_trends: bool,
    pub bulk_buying_tendency: bool,
    pub promotion_sensitivity: AffinityLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricePreference {
    Budget,
    MidRange,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShoppingPattern {
    Rare,
    Occasional,
    Regular,
    Frequent,
}

/// Marketing priority driving a segment's recommendation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyPriority {
    Retention,
    Upsell,
    CrossSell,
    Acquisition,
    Reactivation,
    WinBack,
}

/// Recommendation strategy descriptor consumed by downstream marketing
/// services; not interpreted by the engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationStrategy {
    pub priority: StrategyPriority,
    pub recommendation_type: String,
    pub communication_frequency: String,
    pub preferred_channels: Vec<String>,
    pub incentive_type: String,
    pub content_tone: String,
}

/// A catalogue segment with its running aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    pub description: String,
    /// Human-readable defining criteria
    pub criteria: String,
    /// Customers assigned to this segment (best-effort counter)
    pub customer_count: u64,
    /// Running mean of assigned customers' average order value
    pub average_order_value: f64,
    /// Running mean of assigned customers' purchase frequency
    pub average_purchase_frequency: f64,
    pub characteristics: SegmentCharacteristics,
    pub recommendations: RecommendationStrategy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    fn new(id: SegmentId, description: &str, criteria: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: id.display_name().to_string(),
            description: description.to_string(),
            criteria: criteria.to_string(),
            customer_count: 0,
            average_order_value: 0.0,
            average_purchase_frequency: 0.0,
            characteristics: characteristics_for(id),
            recommendations: strategy_for(id),
            created_at: now,
            updated_at: now,
        }
    }
}

fn characteristics_for(id: SegmentId) -> SegmentCharacteristics {
    let (categories, brand, price, pattern, seasonal, bulk, promo) = match id {
        SegmentId::Champions => (
            vec!["Premium", "Organic", "Gourmet"],
            AffinityLevel::High,
            PricePreference::Premium,
            ShoppingPattern::Frequent,
            true,
            true,
            AffinityLevel::Low,
        ),
        SegmentId::Loyal => (
            vec!["Essentials", "Family", "Health"],
            AffinityLevel::High,
            PricePreference::MidRange,
            ShoppingPattern::Regular,
            false,
            true,
            AffinityLevel::Medium,
        ),
        SegmentId::PotentialLoyalists => (
            vec!["Variety", "Trending", "Seasonal"],
            AffinityLevel::Medium,
            PricePreference::MidRange,
            ShoppingPattern::Occasional,
            true,
            false,
            AffinityLevel::High,
        ),
        SegmentId::New => (
            vec!["Popular", "Essentials", "Promotions"],
            AffinityLevel::Low,
            PricePreference::Budget,
            ShoppingPattern::Rare,
            false,
            false,
            AffinityLevel::High,
        ),
        SegmentId::AtRisk => (
            vec!["Essentials", "Staples"],
            AffinityLevel::Medium,
            PricePreference::MidRange,
            ShoppingPattern::Occasional,
            false,
            false,
            AffinityLevel::High,
        ),
        SegmentId::CantLose => (
            vec!["Premium", "Essentials"],
            AffinityLevel::High,
            PricePreference::Premium,
            ShoppingPattern::Occasional,
            false,
            true,
            AffinityLevel::Medium,
        ),
        SegmentId::Hibernating => (
            vec!["Essentials"],
            AffinityLevel::Low,
            PricePreference::Budget,
            ShoppingPattern::Rare,
            false,
            false,
            AffinityLevel::High,
        ),
        SegmentId::Lost => (
            vec!["Promotions"],
            AffinityLevel::Low,
            PricePreference::Budget,
            ShoppingPattern::Rare,
            false,
            false,
            AffinityLevel::High,
        ),
    };
    SegmentCharacteristics {
        primary_categories: categories.into_iter().map(String::from).collect(),
        brand_affinity: brand,
        price_preference: price,
        shopping_pattern: pattern,
        seasonal_trends: seasonal,
        bulk_buying_tendency: bulk,
        promotion_sensitivity: promo,
    }
}

fn strategy_for(id: SegmentId) -> RecommendationStrategy {
    let (priority, rec_type, frequency, channels, incentive, tone) = match id {
        SegmentId::Champions => (
            StrategyPriority::Retention,
            "personalized",
            "weekly",
            vec!["email", "push", "in-app"],
            "loyalty-points",
            "personalized",
        ),
        SegmentId::Loyal => (
            StrategyPriority::Upsell,
            "complementary",
            "bi-weekly",
            vec!["email", "in-app"],
            "bundle",
            "informative",
        ),
        SegmentId::PotentialLoyalists => (
            StrategyPriority::CrossSell,
            "discovery",
            "weekly",
            vec!["email", "push"],
            "discount",
            "promotional",
        ),
        SegmentId::New => (
            StrategyPriority::Acquisition,
            "trending",
            "weekly",
            vec!["email", "push"],
            "discount",
            "promotional",
        ),
        SegmentId::AtRisk => (
            StrategyPriority::Reactivation,
            "replenishment",
            "bi-weekly",
            vec!["email", "sms"],
            "free-shipping",
            "urgent",
        ),
        SegmentId::CantLose => (
            StrategyPriority::WinBack,
            "personalized",
            "weekly",
            vec!["email", "sms", "push"],
            "exclusive-offer",
            "urgent",
        ),
        SegmentId::Hibernating => (
            StrategyPriority::Reactivation,
            "replenishment",
            "monthly",
            vec!["email"],
            "discount",
            "promotional",
        ),
        SegmentId::Lost => (
            StrategyPriority::WinBack,
            "trending",
            "monthly",
            vec!["email"],
            "deep-discount",
            "promotional",
        ),
    };
    RecommendationStrategy {
        priority,
        recommendation_type: rec_type.to_string(),
        communication_frequency: frequency.to_string(),
        preferred_channels: channels.into_iter().map(String::from).collect(),
        incentive_type: incentive.to_string(),
        content_tone: tone.to_string(),
    }
}

/// Owned, shared store for the segment catalogue.
///
/// Running statistics are best-effort counters: every assignment mutates
/// them in place under a write lock, and concurrent segmentation calls
/// may interleave. Callers must not treat them as strongly consistent.
pub struct SegmentStore {
    inner: RwLock<HashMap<SegmentId, Segment>>,
}

impl SegmentStore {
    /// Create a store seeded with the full predefined catalogue.
    pub fn with_defaults() -> Self {
        let mut segments = HashMap::new();
        let seed = [
            (
                SegmentId::Champions,
                "Best customers: buy often, spend the most, bought recently",
                "frequency >= 4/month, lifetime value >= 1000, active within 30 days",
            ),
            (
                SegmentId::Loyal,
                "Regular customers with solid lifetime value",
                "frequency >= 2/month, lifetime value >= 500",
            ),
            (
                SegmentId::PotentialLoyalists,
                "Recent, reasonably active customers who could become loyal",
                "frequency >= 1/month, active within 60 days",
            ),
            (
                SegmentId::New,
                "First-time or near-first-time buyers",
                "at most 2 purchases, active within 30 days",
            ),
            (
                SegmentId::AtRisk,
                "Valuable customers drifting toward churn",
                "lifetime value >= 300, inactive for more than 90 days",
            ),
            (
                SegmentId::CantLose,
                "High-value customers with extended inactivity",
                "lifetime value >= 800, inactive for more than 120 days",
            ),
            (
                SegmentId::Hibernating,
                "Long-inactive customers with low recent engagement",
                "inactive for more than 180 days",
            ),
            (
                SegmentId::Lost,
                "Customers inactive for over a year",
                "inactive for more than 365 days",
            ),
        ];
        for (id, description, criteria) in seed {
            segments.insert(id, Segment::new(id, description, criteria));
        }
        tracing::info!(segment_count = segments.len(), "Segment catalogue initialized");
        Self {
            inner: RwLock::new(segments),
        }
    }

    /// Look up a segment by identifier.
    ///
    /// Returns `UnknownSegment` if missing; with a defaults-seeded store
    /// this is unreachable and indicates a programmer error.
    pub async fn get(&self, id: SegmentId) -> Result<Segment> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SegmentationError::UnknownSegment(id.to_string()))
    }

    /// Fold one assignment into the segment's running statistics.
    ///
    /// Uses the incremental mean: `new_avg = (old_avg * (n-1) + value) / n`.
    pub async fn record_assignment(
        &self,
        id: SegmentId,
        features: &CustomerFeatures,
    ) -> Result<()> {
        let mut segments = self.inner.write().await;
        let segment = segments
            .get_mut(&id)
            .ok_or_else(|| SegmentationError::UnknownSegment(id.to_string()))?;

        segment.customer_count += 1;
        let n = segment.customer_count as f64;
        segment.average_order_value =
            (segment.average_order_value * (n - 1.0) + features.average_order_value) / n;
        segment.average_purchase_frequency =
            (segment.average_purchase_frequency * (n - 1.0) + features.purchase_frequency) / n;
        segment.updated_at = Utc::now();
        Ok(())
    }

    /// Read-only snapshot of the catalogue, in presentation order.
    pub async fn snapshot(&self) -> Vec<Segment> {
        let segments = self.inner.read().await;
        SegmentId::ALL
            .iter()
            .filter_map(|id| segments.get(id).cloned())
            .collect()
    }
}
