//! Error types for the segmentation engine
//!
//! Only truly unexpected conditions propagate as failures of a
//! segmentation call: a segment identifier missing from the catalogue
//! (unreachable with a seeded store) or malformed configuration.
//! External-collaborator failures are absorbed at the call site with a
//! graceful fallback to the deterministic rule path.

use thiserror::Error;

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Segmentation engine errors
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// Referenced segment missing from the catalogue (programmer error)
    #[error("Segment not found in catalogue: {0}")]
    UnknownSegment(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation error (SQLite-backed assignment cache)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error (cached assignment payloads)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shared library error
    #[error("Common error: {0}")]
    Common(#[from] cartwise_common::Error),
}
