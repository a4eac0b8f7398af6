//! Segmentation services
//!
//! Service modules composing the segmentation pipeline.

pub mod assignment_cache;
pub mod assisted_classifier;
pub mod change_notifier;
pub mod clustering_engine;
pub mod feature_extractor;
pub mod metrics;
pub mod purchase_history;
pub mod rule_classifier;
pub mod segmentation_orchestrator;

pub use assignment_cache::{AssignmentCache, InMemoryAssignmentCache};
pub use assisted_classifier::{
    AnalysisOutcome, AssistedAnalysisProvider, HttpAssistedAnalysisClient, SegmentHint,
};
pub use change_notifier::{ChangeNotifier, EventBusNotifier};
pub use clustering_engine::ClusteringEngine;
pub use feature_extractor::FeatureExtractor;
pub use metrics::{MetricsSink, NullMetricsSink, TracingMetricsSink};
pub use purchase_history::{InMemoryPurchaseHistory, PurchaseHistoryProvider};
pub use rule_classifier::RuleBasedClassifier;
pub use segmentation_orchestrator::SegmentationEngine;
