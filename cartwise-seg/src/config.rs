//! Configuration for the segmentation engine
//!
//! Loaded from a TOML file with environment variable overrides.
//! All thresholds default to the values the engine was tuned with; a
//! config file only needs to state deviations.

use crate::error::{Result, SegmentationError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Segmentation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Batch size above which clustering replaces per-customer analysis
    pub clustering_batch_threshold: usize,

    /// Maximum K-means iterations before giving up on convergence
    pub kmeans_max_iterations: usize,

    /// Centroid movement (Euclidean) below which K-means is converged
    pub kmeans_convergence_epsilon: f64,

    /// Upper bound on cluster count
    pub kmeans_max_clusters: usize,

    /// Customers per cluster when deriving k from batch size
    pub kmeans_customers_per_cluster: usize,

    /// Advisory TTL for cached assignments, in seconds
    pub cache_ttl_secs: u64,

    /// Confidence attached to rule-based assignments (0.0-1.0)
    pub default_confidence: f32,

    /// Model version tag stamped on published change events
    pub model_version: String,

    /// Assisted-analysis collaborator endpoint; `None` disables the
    /// assisted path entirely (rule cascade still runs)
    pub assisted_endpoint: Option<String>,

    /// Request timeout for the assisted-analysis collaborator
    pub assisted_timeout_secs: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            clustering_batch_threshold: 50,
            kmeans_max_iterations: 100,
            kmeans_convergence_epsilon: 0.01,
            kmeans_max_clusters: 5,
            kmeans_customers_per_cluster: 10,
            cache_ttl_secs: 3600,
            default_confidence: 0.8,
            model_version: "v1.0".to_string(),
            assisted_endpoint: None,
            assisted_timeout_secs: 10,
        }
    }
}

impl SegmentationConfig {
    /// Load configuration from a TOML file, then apply environment
    /// variable overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SegmentationError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: SegmentationConfig = toml::from_str(&contents).map_err(|e| {
            SegmentationError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.apply_env_overrides();
        config.validate()?;
        info!(path = %path.display(), "Segmentation configuration loaded");
        Ok(config)
    }

    /// Apply `CARTWISE_*` environment variable overrides.
    ///
    /// Supported: `CARTWISE_ASSISTED_ENDPOINT`, `CARTWISE_CACHE_TTL_SECS`,
    /// `CARTWISE_MODEL_VERSION`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("CARTWISE_ASSISTED_ENDPOINT") {
            if !endpoint.is_empty() {
                self.assisted_endpoint = Some(endpoint);
            }
        }
        if let Ok(ttl) = std::env::var("CARTWISE_CACHE_TTL_SECS") {
            if let Ok(secs) = ttl.parse::<u64>() {
                self.cache_ttl_secs = secs;
            }
        }
        if let Ok(version) = std::env::var("CARTWISE_MODEL_VERSION") {
            if !version.is_empty() {
                self.model_version = version;
            }
        }
    }

    /// Validate configured values, returning a `Config` error on the
    /// first violation.
    pub fn validate(&self) -> Result<()> {
        if self.clustering_batch_threshold == 0 {
            return Err(SegmentationError::Config(
                "clustering_batch_threshold must be at least 1".to_string(),
            ));
        }
        if self.kmeans_max_iterations == 0 {
            return Err(SegmentationError::Config(
                "kmeans_max_iterations must be at least 1".to_string(),
            ));
        }
        if self.kmeans_convergence_epsilon <= 0.0 {
            return Err(SegmentationError::Config(
                "kmeans_convergence_epsilon must be positive".to_string(),
            ));
        }
        if self.kmeans_max_clusters == 0 {
            return Err(SegmentationError::Config(
                "kmeans_max_clusters must be at least 1".to_string(),
            ));
        }
        if self.kmeans_customers_per_cluster == 0 {
            return Err(SegmentationError::Config(
                "kmeans_customers_per_cluster must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(SegmentationError::Config(format!(
                "default_confidence out of range: {}",
                self.default_confidence
            )));
        }
        if self.model_version.is_empty() {
            return Err(SegmentationError::Config(
                "model_version must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
