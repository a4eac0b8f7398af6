//! # Cartwise Common Library
//!
//! Shared code for Cartwise backend services including:
//! - Domain models (purchase records, analysis depth)
//! - Event types (CartwiseEvent enum) and the broadcast EventBus
//! - Common error types

pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
