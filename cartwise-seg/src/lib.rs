//! Customer Segmentation & Clustering Engine
//!
//! Converts raw purchase histories into behavioral feature summaries,
//! assigns each customer to a named segment through a layered decision
//! process (deterministic rule cascade, optional assisted-analysis hint,
//! K-means clustering for large batches), tracks segment migrations over
//! time, and publishes change events.
//!
//! The engine is a library consumed by the controller layer; all external
//! collaborators (purchase history, assisted analysis, assignment cache,
//! change notifier, metrics sink) are injected behind narrow traits.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use catalog::{Segment, SegmentId, SegmentStore};
pub use config::SegmentationConfig;
pub use error::{Result, SegmentationError};
pub use models::{CustomerFeatures, SegmentAssignment};
pub use services::segmentation_orchestrator::SegmentationEngine;
