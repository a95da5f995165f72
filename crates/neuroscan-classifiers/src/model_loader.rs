//! Model file resolution and loading for Candle-based classifiers

use crate::config::{DeviceSpec, ModelSource};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{api::sync::Api, Repo, RepoType};
use neuroscan_core::{Error, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Model weights file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// SafeTensors format (recommended)
    SafeTensors,
    /// PyTorch format
    PyTorch,
}

/// Local paths of every file a ViT classifier needs
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub preprocessor: Option<PathBuf>,
    pub weights: PathBuf,
    pub format: ModelFormat,
}

impl ModelFiles {
    /// Resolve model files from source, downloading from the Hub if needed.
    ///
    /// Blocking: run on a blocking thread when called from async code.
    pub fn resolve(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::Local { path } => Self::from_dir(path),
            ModelSource::HuggingFace { repo, revision } => Self::from_hub(repo, revision),
        }
    }

    /// Resolve model files from a local directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::model_load(format!(
                "Model directory not found: {}",
                dir.display()
            )));
        }

        let config = dir.join(CONFIG_FILE);
        if !config.exists() {
            return Err(Error::model_load(format!(
                "Missing {} in {}",
                CONFIG_FILE,
                dir.display()
            )));
        }

        let (weights, format) = [
            (SAFETENSORS_FILE, ModelFormat::SafeTensors),
            (PYTORCH_FILE, ModelFormat::PyTorch),
        ]
        .into_iter()
        .map(|(file, format)| (dir.join(file), format))
        .find(|(path, _)| path.exists())
        .ok_or_else(|| {
            Error::model_load(format!(
                "No {} or {} in {}",
                SAFETENSORS_FILE,
                PYTORCH_FILE,
                dir.display()
            ))
        })?;

        let preprocessor = Some(dir.join(PREPROCESSOR_FILE)).filter(|p| p.exists());

        Ok(Self {
            config,
            preprocessor,
            weights,
            format,
        })
    }

    /// Download model files from HuggingFace Hub
    pub fn from_hub(repo_id: &str, revision: &str) -> Result<Self> {
        tracing::info!("Downloading model from HuggingFace: {} @ {}", repo_id, revision);

        let api = Api::new()
            .map_err(|e| Error::model_load(format!("Failed to initialize HF API: {}", e)))?;
        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let config = repo.get(CONFIG_FILE).map_err(|e| {
            Error::model_load(format!("Failed to download {}: {}", CONFIG_FILE, e))
        })?;

        // Optional: ViT defaults apply when the repo ships no processor config
        let preprocessor = repo.get(PREPROCESSOR_FILE).ok();

        let (weights, format) = match repo.get(SAFETENSORS_FILE) {
            Ok(path) => (path, ModelFormat::SafeTensors),
            Err(safetensors_err) => {
                tracing::debug!("No {}: {}, trying {}", SAFETENSORS_FILE, safetensors_err, PYTORCH_FILE);
                let path = repo.get(PYTORCH_FILE).map_err(|e| {
                    Error::model_load(format!(
                        "Failed to download weights ({}: {}; {}: {})",
                        SAFETENSORS_FILE, safetensors_err, PYTORCH_FILE, e
                    ))
                })?;
                (path, ModelFormat::PyTorch)
            }
        };

        Ok(Self {
            config,
            preprocessor,
            weights,
            format,
        })
    }

    /// Load weights into a VarBuilder on `device`
    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        match self.format {
            ModelFormat::SafeTensors => {
                // SAFETY: the weights file is not modified while mapped
                unsafe {
                    VarBuilder::from_mmaped_safetensors(&[self.weights.clone()], DType::F32, device)
                }
                .map_err(|e| Error::model_load(format!("Failed to load SafeTensors: {}", e)))
            }
            ModelFormat::PyTorch => VarBuilder::from_pth(&self.weights, DType::F32, device)
                .map_err(|e| Error::model_load(format!("Failed to load PyTorch weights: {}", e))),
        }
    }
}

/// Create Candle device from device spec
pub fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda => Device::new_cuda(0)
            .map_err(|e| Error::model_load(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal => Device::new_metal(0)
            .map_err(|e| Error::model_load(format!("Failed to create Metal device: {}", e))),
    }
}

/// Architecture and label set parsed from a ViT `config.json`
#[derive(Debug, Clone)]
pub struct ViTModelConfig {
    pub architecture: vit::Config,
    pub labels: Vec<String>,
}

impl ViTModelConfig {
    /// Read and parse a `config.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse `config.json` content, filling ViT defaults for absent keys
    pub fn from_json(content: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(content)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| Error::model_load("config.json is not a JSON object"))?;

        let labels = parse_labels(object)?;
        fill_vit_defaults(object);

        let architecture: vit::Config = serde_json::from_value(value)
            .map_err(|e| Error::model_load(format!("Failed to parse ViT config: {}", e)))?;

        Ok(Self {
            architecture,
            labels,
        })
    }

    /// Number of output classes
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}

/// Labels ordered by class index from `id2label`
fn parse_labels(object: &Map<String, Value>) -> Result<Vec<String>> {
    let id2label = object
        .get("id2label")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::model_load("config.json has no id2label mapping"))?;

    let mut by_index = BTreeMap::new();
    for (id, label) in id2label {
        let idx: usize = id
            .parse()
            .map_err(|_| Error::model_load(format!("Invalid id2label key '{}'", id)))?;
        let label = label
            .as_str()
            .ok_or_else(|| Error::model_load(format!("Label for class {} is not a string", idx)))?;
        by_index.insert(idx, label.to_string());
    }

    let labels: Vec<String> = by_index.values().cloned().collect();
    if labels.is_empty() || by_index.keys().enumerate().any(|(pos, idx)| pos != *idx) {
        return Err(Error::model_load(
            "id2label must map contiguous class indices starting at 0",
        ));
    }
    Ok(labels)
}

fn fill_vit_defaults(object: &mut Map<String, Value>) {
    let defaults = [
        ("hidden_size", json!(768)),
        ("num_hidden_layers", json!(12)),
        ("num_attention_heads", json!(12)),
        ("intermediate_size", json!(3072)),
        ("hidden_act", json!("gelu")),
        ("layer_norm_eps", json!(1e-12)),
        ("image_size", json!(224)),
        ("patch_size", json!(16)),
        ("num_channels", json!(3)),
        ("qkv_bias", json!(true)),
    ];
    for (key, value) in defaults {
        object.entry(key).or_insert(value);
    }
}
