//! Model configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Model served when nothing else is configured
pub const DEFAULT_MODEL_ID: &str = "Hemgg/brain-tumor-classification";

/// Number of labels returned per image unless overridden
pub const DEFAULT_TOP_K: usize = 4;

/// Configuration for the served classification model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Where the weights come from
    #[serde(default)]
    pub source: ModelSource,

    /// Device to run inference on
    #[serde(default)]
    pub device: DeviceSpec,

    /// Labels returned per image
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Build the classifier at startup instead of on the first request
    #[serde(default)]
    pub preload: bool,
}

impl ModelSettings {
    /// Identifier reported by the API (repo id or local directory)
    pub fn model_id(&self) -> String {
        match &self.source {
            ModelSource::HuggingFace { repo, .. } => repo.clone(),
            ModelSource::Local { path } => path.display().to_string(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            source: ModelSource::default(),
            device: DeviceSpec::default(),
            top_k: default_top_k(),
            preload: false,
        }
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from a local directory holding `config.json` and weights
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::HuggingFace {
            repo: DEFAULT_MODEL_ID.to_string(),
            revision: default_revision(),
        }
    }
}

/// Device selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda,
    /// Metal (Apple Silicon)
    Metal,
}

impl std::str::FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            other => Err(format!("unknown device '{}', expected cpu, cuda or metal", other)),
        }
    }
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ModelSettings::default();
        assert_eq!(settings.model_id(), DEFAULT_MODEL_ID);
        assert_eq!(settings.top_k, 4);
        assert_eq!(settings.device, DeviceSpec::Cpu);
        assert!(!settings.preload);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
source:
  type: huggingface
  repo: "google/vit-base-patch16-224"
device: cuda
top_k: 2
"#;
        let settings: ModelSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            settings.source,
            ModelSource::HuggingFace {
                repo: "google/vit-base-patch16-224".to_string(),
                revision: "main".to_string(),
            }
        );
        assert_eq!(settings.device, DeviceSpec::Cuda);
        assert_eq!(settings.top_k, 2);
    }

    #[test]
    fn test_local_source_model_id() {
        let yaml = r#"
source:
  type: local
  path: "/models/vit"
"#;
        let settings: ModelSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.model_id(), "/models/vit");
        assert_eq!(settings.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_device_from_str() {
        assert_eq!("MPS".parse::<DeviceSpec>().unwrap(), DeviceSpec::Metal);
        assert!("tpu".parse::<DeviceSpec>().is_err());
    }
}
