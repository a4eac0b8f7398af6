//! Assisted classification adapter
//!
//! Optionally consults an external generative-analysis collaborator for
//! a segment hint. The hint is purely advisory: any transport, timeout,
//! or parse failure degrades to "no hint" and the orchestrator falls
//! back to the deterministic rule cascade. This path must never block
//! correctness.

use crate::catalog::SegmentId;
use crate::models::CustomerFeatures;
use async_trait::async_trait;
use cartwise_common::models::PurchaseRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Shopping-frequency category reported by the analysis collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShoppingFrequency {
    Daily,
    Weekly,
    Monthly,
    Rarely,
}

/// Spend tier reported by the analysis collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendTier {
    Budget,
    Standard,
    Premium,
}

/// Spending patterns section of a customer profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingPatterns {
    pub shopping_frequency: ShoppingFrequency,
    pub average_order_value: f64,
    pub spend_tier: SpendTier,
}

/// Behavioral flags section of a customer profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralFlags {
    pub planned_shopper: bool,
    pub brand_loyal: bool,
    pub promotion_driven: bool,
}

/// Customer profile returned by the analysis collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub spending_patterns: SpendingPatterns,
    pub behavioral_insights: BehavioralFlags,
}

/// Outcome of one assisted-analysis call.
///
/// Collaborators must degrade to `success: false` rather than erroring;
/// the adapter treats anything short of a successful profile with
/// confidence as "no hint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    pub profile: Option<CustomerProfile>,
    pub confidence: Option<f32>,
}

impl AnalysisOutcome {
    /// Unsuccessful outcome, used for every degradation path
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// External generative-analysis collaborator.
///
/// Infallible by contract: implementations absorb their own failures
/// and return an unsuccessful outcome instead.
#[async_trait]
pub trait AssistedAnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        customer_id: Uuid,
        purchases: &[PurchaseRecord],
        analysis_kind: &str,
    ) -> AnalysisOutcome;
}

/// Advisory segment hint with the collaborator's confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHint {
    pub segment: SegmentId,
    pub confidence: f32,
}

/// Map an analysis outcome onto a segment hint.
///
/// Returns `None` whenever the outcome is unsuccessful or incomplete;
/// the orchestrator then falls back to the rule cascade.
pub fn map_profile_to_hint(
    outcome: &AnalysisOutcome,
    features: &CustomerFeatures,
) -> Option<SegmentHint> {
    if !outcome.success {
        return None;
    }
    let profile = outcome.profile.as_ref()?;
    let confidence = outcome.confidence?.clamp(0.0, 1.0);

    let spending = &profile.spending_patterns;
    let behavior = &profile.behavioral_insights;

    let segment = if matches!(
        spending.shopping_frequency,
        ShoppingFrequency::Daily | ShoppingFrequency::Weekly
    ) {
        if spending.spend_tier == SpendTier::Premium || spending.average_order_value > 50.0 {
            SegmentId::Champions
        } else {
            SegmentId::Loyal
        }
    } else if behavior.planned_shopper && behavior.brand_loyal {
        SegmentId::Loyal
    } else if features.days_since_last_purchase > 90 {
        SegmentId::AtRisk
    } else {
        SegmentId::PotentialLoyalists
    };

    Some(SegmentHint {
        segment,
        confidence,
    })
}

/// HTTP client errors for the assisted-analysis collaborator.
///
/// Internal to the client: callers only ever see a degraded
/// `AnalysisOutcome`, never these.
#[derive(Debug, thiserror::Error)]
enum AssistedClientError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error {0}: {1}")]
    Api(u16, String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// HTTP-backed assisted-analysis collaborator client.
#[derive(Debug, Clone)]
pub struct HttpAssistedAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest<'a> {
    customer_id: Uuid,
    purchases: &'a [PurchaseRecord],
    analysis_type: &'a str,
}

impl HttpAssistedAnalysisClient {
    /// Create a client for the given endpoint with a request timeout.
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cartwise-seg/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url })
    }

    async fn analyze_inner(
        &self,
        customer_id: Uuid,
        purchases: &[PurchaseRecord],
        analysis_kind: &str,
    ) -> Result<AnalysisOutcome, AssistedClientError> {
        let url = format!("{}/analyze", self.base_url.trim_end_matches('/'));
        let request = AnalysisRequest {
            customer_id,
            purchases,
            analysis_type: analysis_kind,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistedClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistedClientError::Api(status.as_u16(), body));
        }

        response
            .json::<AnalysisOutcome>()
            .await
            .map_err(|e| AssistedClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AssistedAnalysisProvider for HttpAssistedAnalysisClient {
    async fn analyze(
        &self,
        customer_id: Uuid,
        purchases: &[PurchaseRecord],
        analysis_kind: &str,
    ) -> AnalysisOutcome {
        match self
            .analyze_inner(customer_id, purchases, analysis_kind)
            .await
        {
            Ok(outcome) => {
                debug!(
                    customer_id = %customer_id,
                    success = outcome.success,
                    "Assisted analysis responded"
                );
                outcome
            }
            Err(e) => {
                warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Assisted analysis unavailable, continuing without hint"
                );
                AnalysisOutcome::unavailable()
            }
        }
    }
}
