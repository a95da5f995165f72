//! NeuroScan Core
//!
//! Core types and utilities shared across NeuroScan components.
//!
//! This crate provides:
//! - Error types and result handling
//! - Prediction types and top-k ranking
//! - The startup compatibility gate for the tensor runtime

pub mod compat;
pub mod error;
pub mod types;

pub use compat::CompatibilityGate;
pub use error::{Error, Result};
pub use types::{rank_top_k, Prediction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compat::CompatibilityGate;
    pub use crate::error::{Error, Result};
    pub use crate::types::{rank_top_k, Prediction};
}
