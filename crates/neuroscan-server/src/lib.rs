//! NeuroScan Server
//!
//! HTTP API that classifies uploaded brain MRI images. The classifier is
//! built lazily on the first prediction and shared by every request; a
//! startup compatibility gate short-circuits all work when the tensor
//! runtime is unsupported.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod static_files;

pub use app::{create_router, run_server};
pub use cli::Cli;
pub use config::ServiceConfig;
pub use error::ApiError;
pub use state::AppState;
