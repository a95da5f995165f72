//! NeuroScan Classifiers
//!
//! Image classifiers and the lazy model loader.
//!
//! - [`ViTClassifier`]: Vision Transformer pipeline (resize, normalize,
//!   forward pass, softmax, top-k) running on Candle, with weights pulled
//!   from the Hugging Face Hub or a local directory
//! - [`LazyClassifier`]: builds the served classifier once, on first use,
//!   safely under concurrent callers

pub mod classifier;
pub mod config;
pub mod lazy;
pub mod model_loader;
pub mod preprocessing;
pub mod vit;

pub use classifier::Classifier;
pub use config::{DeviceSpec, ModelSettings, ModelSource, DEFAULT_MODEL_ID, DEFAULT_TOP_K};
pub use lazy::{ClassifierFactory, LazyClassifier};
pub use model_loader::{ModelFiles, ModelFormat, ViTModelConfig};
pub use preprocessing::{decode_image, ImagePreprocessor, PreprocessorConfig};
pub use vit::{ViTClassifier, ViTFactory};

/// Runtime whose version the compatibility gate checks
pub const RUNTIME_NAME: &str = "candle-core";

/// candle-core version resolved at build time (`unknown` if undetermined)
pub const RUNTIME_VERSION: &str = env!("NEUROSCAN_RUNTIME_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::config::{DeviceSpec, ModelSettings, ModelSource};
    pub use crate::lazy::{ClassifierFactory, LazyClassifier};
    pub use crate::preprocessing::decode_image;
    pub use crate::vit::{ViTClassifier, ViTFactory};
}
