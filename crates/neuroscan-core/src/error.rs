//! Error types for NeuroScan

use std::sync::Arc;

/// Result type alias using NeuroScan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for NeuroScan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor runtime rejected by the version gate
    #[error("incompatible runtime: {0}")]
    Compatibility(String),

    /// Uploaded bytes could not be decoded into an image
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// Weights, configs or devices could not be prepared
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Classifier construction failed; the cause is shared with every
    /// caller that waited on the same attempt
    #[error("failed to initialize classifier '{model}'")]
    Initialization {
        model: String,
        #[source]
        source: Arc<Error>,
    },

    /// Forward pass or postprocessing failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new compatibility error
    pub fn compatibility(msg: impl Into<String>) -> Self {
        Self::Compatibility(msg.into())
    }

    /// Create a new image decode error
    pub fn image_decode(msg: impl Into<String>) -> Self {
        Self::ImageDecode(msg.into())
    }

    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Wrap a construction failure for the given model
    pub fn initialization(model: impl Into<String>, source: Arc<Error>) -> Self {
        Self::Initialization {
            model: model.into(),
            source,
        }
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable tag for the error kind, used for metrics labels and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Compatibility(_) => "compatibility",
            Self::ImageDecode(_) => "image_decode",
            Self::ModelLoad(_) => "model_load",
            Self::Initialization { .. } => "initialization",
            Self::Inference(_) => "inference",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Render this error and its full `source()` chain, one cause per line
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str("\nCaused by: ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}
