//! Segment assignment orchestrator
//!
//! Coordinates one segmentation request through its phases:
//! NotStarted → FeaturesExtracted → Classified → (ClusteredBatch) →
//! Resolved → Persisted → (MigrationNotified)
//!
//! Combines the rule-based baseline, the optional assisted hint, and
//! cluster-derived assignments into a single authoritative assignment
//! per customer, detects segment migrations, maintains catalogue
//! statistics, and publishes change events.
//!
//! Collaborator degradation (assisted analysis, cache, notifier,
//! metrics) never fails a call; only a segment identifier missing from
//! the catalogue or invalid configuration propagates as an error.

use crate::catalog::{Segment, SegmentId, SegmentStore};
use crate::config::SegmentationConfig;
use crate::error::Result;
use crate::models::{
    ChurnRisk, CustomerFeatures, SegmentAssignment, SegmentationPhase, SegmentationRun,
};
use crate::services::assignment_cache::AssignmentCache;
use crate::services::assisted_classifier::{
    map_profile_to_hint, AssistedAnalysisProvider, HttpAssistedAnalysisClient,
};
use crate::services::change_notifier::ChangeNotifier;
use crate::services::clustering_engine::ClusteringEngine;
use crate::services::feature_extractor::FeatureExtractor;
use crate::services::metrics::MetricsSink;
use crate::services::purchase_history::PurchaseHistoryProvider;
use crate::services::rule_classifier::RuleBasedClassifier;
use cartwise_common::events::SegmentChangeEvent;
use cartwise_common::models::{AnalysisDepth, PurchaseRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Analysis kind passed to the assisted collaborator
const PROFILING_ANALYSIS: &str = "customer_profiling";

/// Segmentation engine front door, consumed by the controller layer.
///
/// Concurrent calls for the same customer are not serialized: the last
/// writer to the assignment cache wins, and the cached assignment
/// always reflects the most recently completed call.
pub struct SegmentationEngine {
    config: SegmentationConfig,
    store: Arc<SegmentStore>,
    purchase_history: Arc<dyn PurchaseHistoryProvider>,
    assisted: Option<Arc<dyn AssistedAnalysisProvider>>,
    cache: Arc<dyn AssignmentCache>,
    notifier: Arc<dyn ChangeNotifier>,
    metrics: Arc<dyn MetricsSink>,
    extractor: FeatureExtractor,
    classifier: RuleBasedClassifier,
    clustering: ClusteringEngine,
}

impl SegmentationEngine {
    /// Create an engine with validated configuration.
    ///
    /// The assisted-analysis collaborator is optional (`with_assisted`);
    /// without it, `Detailed`/`Comprehensive` requests still succeed on
    /// the rule path alone.
    pub fn new(
        config: SegmentationConfig,
        store: Arc<SegmentStore>,
        purchase_history: Arc<dyn PurchaseHistoryProvider>,
        cache: Arc<dyn AssignmentCache>,
        notifier: Arc<dyn ChangeNotifier>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        config.validate()?;
        let clustering = ClusteringEngine::from_config(&config);

        // A configured endpoint wires up the HTTP collaborator; no
        // endpoint means the assisted path stays off unless a provider
        // is attached explicitly.
        let assisted: Option<Arc<dyn AssistedAnalysisProvider>> =
            match &config.assisted_endpoint {
                Some(endpoint) => {
                    let client = HttpAssistedAnalysisClient::new(
                        endpoint.clone(),
                        Duration::from_secs(config.assisted_timeout_secs),
                    )
                    .map_err(|e| {
                        crate::error::SegmentationError::Config(format!(
                            "Assisted analysis client setup failed: {}",
                            e
                        ))
                    })?;
                    Some(Arc::new(client))
                }
                None => None,
            };

        Ok(Self {
            config,
            store,
            purchase_history,
            assisted,
            cache,
            notifier,
            metrics,
            extractor: FeatureExtractor::new(),
            classifier: RuleBasedClassifier::new(),
            clustering,
        })
    }

    /// Attach the assisted-analysis collaborator.
    pub fn with_assisted(mut self, provider: Arc<dyn AssistedAnalysisProvider>) -> Self {
        self.assisted = Some(provider);
        self
    }

    /// Fix the clustering seed for reproducible batch runs.
    pub fn with_clustering_seed(mut self, seed: u64) -> Self {
        self.clustering = self.clustering.with_seed(seed);
        self
    }

    /// Segment a single customer.
    ///
    /// With `force_recalculation` unset, a non-expired cached assignment
    /// is returned unchanged without recomputation or re-notification.
    pub async fn segment_customer(
        &self,
        customer_id: Uuid,
        depth: AnalysisDepth,
        force_recalculation: bool,
    ) -> Result<SegmentAssignment> {
        let mut run = SegmentationRun::new(customer_id);

        if !force_recalculation {
            match self.cache.get(customer_id).await {
                Ok(Some(cached)) => {
                    info!(
                        customer_id = %customer_id,
                        segment = %cached.segment_id,
                        "Serving cached segment assignment"
                    );
                    self.metrics.record(
                        "segmentation.cache_hit",
                        1.0,
                        "count",
                        &[("depth", depth.as_str())],
                    );
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        customer_id = %customer_id,
                        error = %e,
                        "Assignment cache read failed, recomputing"
                    );
                }
            }
        }

        let purchases = self.fetch_purchases(customer_id).await;
        let features = self.extractor.extract(&purchases, Utc::now());
        run.transition_to(SegmentationPhase::FeaturesExtracted);

        // Rule-based baseline is always computed; the assisted hint,
        // when present, takes priority with its own confidence.
        let rule_segment = self.classifier.classify(&features);
        run.transition_to(SegmentationPhase::Classified);

        let hint = if depth.uses_assisted_analysis() {
            match &self.assisted {
                Some(provider) => {
                    let outcome = provider
                        .analyze(customer_id, &purchases, PROFILING_ANALYSIS)
                        .await;
                    map_profile_to_hint(&outcome, &features)
                }
                None => None,
            }
        } else {
            None
        };

        let (segment_id, confidence) = match hint {
            Some(hint) => (hint.segment, hint.confidence),
            None => (rule_segment, self.config.default_confidence),
        };

        let assignment = self
            .resolve_and_persist(&mut run, customer_id, segment_id, confidence, features)
            .await?;

        self.metrics.record(
            "segmentation.duration",
            run.elapsed_ms() as f64,
            "ms",
            &[("depth", depth.as_str()), ("path", "single")],
        );

        Ok(assignment)
    }

    /// Segment a batch of customers.
    ///
    /// Batches above the clustering threshold at non-basic depth run one
    /// K-means pass over the whole batch; smaller or basic-depth batches
    /// are processed per customer, sequentially.
    pub async fn segment_batch(
        &self,
        customer_ids: &[Uuid],
        depth: AnalysisDepth,
    ) -> Result<Vec<SegmentAssignment>> {
        let started = Utc::now();

        let assignments = if customer_ids.len() > self.config.clustering_batch_threshold
            && depth != AnalysisDepth::Basic
        {
            info!(
                batch_size = customer_ids.len(),
                "Batch segmentation via K-means clustering"
            );
            self.cluster_batch(customer_ids).await?
        } else {
            let mut assignments = Vec::with_capacity(customer_ids.len());
            for &customer_id in customer_ids {
                assignments.push(self.segment_customer(customer_id, depth, false).await?);
            }
            assignments
        };

        self.metrics.record(
            "segmentation.batch_size",
            assignments.len() as f64,
            "count",
            &[("depth", depth.as_str())],
        );
        self.metrics.record(
            "segmentation.batch_duration",
            (Utc::now() - started).num_milliseconds() as f64,
            "ms",
            &[("depth", depth.as_str())],
        );

        Ok(assignments)
    }

    /// Read-only snapshot of the segment catalogue and its running
    /// statistics.
    pub async fn segment_catalogue(&self) -> Vec<Segment> {
        self.store.snapshot().await
    }

    /// Cluster-based batch path: one feature pass, one K-means pass,
    /// then per-member resolution with no further external reads.
    /// Member persistence and notification run concurrently since
    /// assignments are keyed by distinct customers.
    async fn cluster_batch(&self, customer_ids: &[Uuid]) -> Result<Vec<SegmentAssignment>> {
        let now = Utc::now();
        let mut features_by_customer: HashMap<Uuid, CustomerFeatures> =
            HashMap::with_capacity(customer_ids.len());
        let mut vectors = Vec::with_capacity(customer_ids.len());

        for &customer_id in customer_ids {
            let purchases = self.fetch_purchases(customer_id).await;
            let features = self.extractor.extract(&purchases, now);
            vectors.push(features.to_vector());
            features_by_customer.insert(customer_id, features);
        }

        let result = self.clustering.cluster(customer_ids, &vectors);
        self.metrics.record(
            "segmentation.silhouette",
            result.silhouette_score,
            "score",
            &[("k", &result.k.to_string())],
        );

        let mut member_futures = Vec::with_capacity(customer_ids.len());
        for cluster in result.clusters.iter().filter(|c| c.size > 0) {
            // The whole cluster maps to one segment via the rule cascade
            // applied to its mean features.
            let member_features: Vec<&CustomerFeatures> = cluster
                .members
                .iter()
                .filter_map(|id| features_by_customer.get(id))
                .collect();
            let mean = mean_cluster_features(&member_features);
            let segment_id = self.classifier.classify(&mean);
            let confidence = (0.75 + 0.25 * cluster.cohesion) as f32;

            for &customer_id in &cluster.members {
                let features = match features_by_customer.get(&customer_id) {
                    Some(features) => features.clone(),
                    None => continue,
                };
                member_futures.push(async move {
                    let mut run = SegmentationRun::new(customer_id);
                    run.transition_to(SegmentationPhase::FeaturesExtracted);
                    run.transition_to(SegmentationPhase::ClusteredBatch);
                    self.resolve_and_persist(&mut run, customer_id, segment_id, confidence, features)
                        .await
                });
            }
        }

        futures::future::join_all(member_futures)
            .await
            .into_iter()
            .collect()
    }

    /// Finalize one assignment: look up the previous assignment, detect
    /// migration, update catalogue statistics, persist, and notify.
    async fn resolve_and_persist(
        &self,
        run: &mut SegmentationRun,
        customer_id: Uuid,
        segment_id: SegmentId,
        confidence: f32,
        features: CustomerFeatures,
    ) -> Result<SegmentAssignment> {
        let segment = self.store.get(segment_id).await?;

        let previous = match self.cache.get(customer_id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Previous assignment lookup failed, treating as new"
                );
                None
            }
        };
        let previous_segment_id = previous.as_ref().map(|p| p.segment_id);
        let migrated = previous_segment_id.is_some_and(|prev| prev != segment_id);

        let migration_reason = previous_segment_id.and_then(|prev| {
            if prev != segment_id {
                Some(migration_reason(prev, segment_id, &features))
            } else {
                None
            }
        });

        let assignment = SegmentAssignment {
            customer_id,
            segment_id,
            segment_name: segment.name.clone(),
            assigned_at: Utc::now(),
            confidence,
            features,
            previous_segment_id,
            migration_reason,
        };
        run.transition_to(SegmentationPhase::Resolved);

        self.store
            .record_assignment(segment_id, &assignment.features)
            .await?;

        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        if let Err(e) = self.cache.set(&assignment, ttl).await {
            warn!(
                customer_id = %customer_id,
                error = %e,
                "Assignment cache write failed, continuing"
            );
        }
        run.transition_to(SegmentationPhase::Persisted);

        // First-ever assignments notify with a null previous segment;
        // unchanged reassignments stay quiet.
        if migrated || previous_segment_id.is_none() {
            self.spawn_notification(&assignment);
            run.transition_to(SegmentationPhase::MigrationNotified);
        }

        if migrated {
            info!(
                customer_id = %customer_id,
                from = %previous_segment_id.map(|p| p.to_string()).unwrap_or_default(),
                to = %segment_id,
                reason = assignment.migration_reason.as_deref().unwrap_or(""),
                "Customer segment migration"
            );
            self.metrics
                .record("segmentation.migration", 1.0, "count", &[]);
        }

        Ok(assignment)
    }

    /// Publish the change event on a detached task; publish failures
    /// are logged and swallowed.
    fn spawn_notification(&self, assignment: &SegmentAssignment) {
        let event = SegmentChangeEvent {
            customer_id: assignment.customer_id,
            previous_segment: assignment.previous_segment_id.map(|id| id.to_string()),
            new_segment: assignment.segment_name.clone(),
            confidence: assignment.confidence,
            reason_codes: reason_codes(assignment),
            timestamp: assignment.assigned_at,
            model_version: self.config.model_version.clone(),
        };
        let notifier = Arc::clone(&self.notifier);
        let customer_id = assignment.customer_id;
        tokio::spawn(async move {
            if let Err(e) = notifier.publish(event).await {
                warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Segment change notification failed"
                );
            }
        });
    }

    /// Purchase history lookup with degradation to an empty history.
    async fn fetch_purchases(&self, customer_id: Uuid) -> Vec<PurchaseRecord> {
        match self.purchase_history.get_purchases(customer_id).await {
            Ok(purchases) => purchases,
            Err(e) => {
                warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Purchase history unavailable, proceeding with empty history"
                );
                Vec::new()
            }
        }
    }
}

/// Human-readable migration reason: every matching signal, checked in a
/// fixed order, joined by "; ".
fn migration_reason(from: SegmentId, to: SegmentId, features: &CustomerFeatures) -> String {
    let mut reasons: Vec<&str> = Vec::new();

    if features.days_since_last_purchase > 90 {
        reasons.push("Extended period without purchase");
    }
    if from == SegmentId::Champions && to == SegmentId::AtRisk {
        reasons.push("Champion customer showing signs of churn");
    }
    if from == SegmentId::New && to == SegmentId::Loyal {
        reasons.push("New customer successfully converted to loyal");
    }
    if features.purchase_frequency < 1.0 {
        reasons.push("Decreased purchase frequency");
    }
    if features.churn_risk == ChurnRisk::High {
        reasons.push("High churn risk detected");
    }

    if reasons.is_empty() {
        "Behavioral pattern change detected".to_string()
    } else {
        reasons.join("; ")
    }
}

/// Machine-readable reason codes for the change event.
fn reason_codes(assignment: &SegmentAssignment) -> Vec<String> {
    let features = &assignment.features;
    let mut codes: Vec<String> = Vec::new();

    if features.total_spent > 1000.0 {
        codes.push("high_value_customer".to_string());
    }
    if features.purchase_frequency > 10.0 {
        codes.push("frequent_purchaser".to_string());
    }
    if features.average_order_value > 100.0 {
        codes.push("high_order_value".to_string());
    }
    if features.days_since_last_purchase < 7 {
        codes.push("recent_activity".to_string());
    } else if features.days_since_last_purchase > 90 {
        codes.push("inactive_period".to_string());
    }
    if features.total_purchases > 20 {
        codes.push("loyal_customer".to_string());
    }
    if let Some(reason) = assignment
        .migration_reason
        .as_ref()
        .filter(|_| assignment.previous_segment_id.is_some())
    {
        let slug: String = reason
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        codes.push(format!("migration_{}", slug));
    }

    if codes.is_empty() {
        codes.push("standard_classification".to_string());
    }
    codes
}

/// Mean feature summary of a cluster, used to map the cluster onto a
/// segment through the same rule cascade as single customers. Only the
/// numeric fields the cascade reads are meaningful; rankings stay empty.
fn mean_cluster_features(features: &[&CustomerFeatures]) -> CustomerFeatures {
    let n = features.len().max(1) as f64;
    let mean =
        |f: fn(&CustomerFeatures) -> f64| features.iter().map(|x| f(x)).sum::<f64>() / n;

    let total_purchases = mean(|f| f.total_purchases as f64);
    let total_spent = mean(|f| f.total_spent);
    let days = mean(|f| f.days_since_last_purchase as f64).round() as i64;
    let engagement = mean(|f| f.engagement_level as f64).round().min(100.0) as u8;

    CustomerFeatures {
        total_purchases: total_purchases.round() as u64,
        total_spent,
        average_order_value: mean(|f| f.average_order_value),
        purchase_frequency: mean(|f| f.purchase_frequency),
        days_since_last_purchase: days,
        favorite_categories: vec![],
        lifetime_value: mean(|f| f.lifetime_value),
        churn_risk: ChurnRisk::from_days_since_last_purchase(days),
        engagement_level: engagement,
        preferred_shopping_days: vec![],
        preferred_shopping_times: vec![],
    }
}
