//! Vision Transformer image classifier built on candle-transformers

use crate::classifier::Classifier;
use crate::config::ModelSettings;
use crate::lazy::ClassifierFactory;
use crate::model_loader::{create_device, ModelFiles, ViTModelConfig};
use crate::preprocessing::ImagePreprocessor;
use async_trait::async_trait;
use candle_core::{Device, Module, D};
use candle_transformers::models::vit;
use image::RgbImage;
use neuroscan_core::{rank_top_k, Error, Prediction, Result};
use std::sync::Arc;
use std::time::Instant;

/// ViT-for-image-classification pipeline: preprocessing, model, softmax + top-k
pub struct ViTClassifier {
    inner: Arc<ViTInner>,
}

struct ViTInner {
    name: String,
    model: vit::Model,
    preprocessor: ImagePreprocessor,
    labels: Vec<String>,
    device: Device,
}

impl ViTClassifier {
    /// Load the pipeline described by `settings`.
    ///
    /// Blocking: downloads files and maps weights.
    pub fn load(settings: &ModelSettings) -> Result<Self> {
        let name = settings.model_id();
        let files = ModelFiles::resolve(&settings.source)?;
        let config = ViTModelConfig::from_file(&files.config)?;
        let preprocessor = ImagePreprocessor::from_file(
            files.preprocessor.as_deref(),
            config.architecture.image_size as u32,
        )?;

        let device = create_device(settings.device)?;
        let vb = files.var_builder(&device)?;
        let model = vit::Model::new(&config.architecture, config.num_labels(), vb)
            .map_err(|e| Error::model_load(format!("Failed to build ViT model: {}", e)))?;

        tracing::info!(
            model = %name,
            labels = config.num_labels(),
            "Successfully loaded ViT classifier"
        );

        Ok(Self {
            inner: Arc::new(ViTInner {
                name,
                model,
                preprocessor,
                labels: config.labels,
                device,
            }),
        })
    }

    /// Class labels in index order
    pub fn labels(&self) -> &[String] {
        &self.inner.labels
    }
}

impl ViTInner {
    fn run(&self, images: &[RgbImage], top_k: usize) -> Result<Vec<Vec<Prediction>>> {
        let batch = self.preprocessor.batch_to_tensor(images, &self.device)?;

        let logits = self
            .model
            .forward(&batch)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|p| p.to_vec2::<f32>())
            .map_err(|e| Error::inference(format!("Failed to read class scores: {}", e)))?;

        Ok(probs
            .iter()
            .map(|scores| rank_top_k(scores, &self.labels, top_k))
            .collect())
    }
}

#[async_trait]
impl Classifier for ViTClassifier {
    async fn classify_batch(
        &self,
        images: Vec<RgbImage>,
        top_k: usize,
    ) -> Result<Vec<Vec<Prediction>>> {
        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let batch_size = images.len();

        let predictions = tokio::task::spawn_blocking(move || inner.run(&images, top_k))
            .await
            .map_err(|e| Error::inference(format!("Inference task failed: {}", e)))??;

        let latency_us = start.elapsed().as_micros() as u64;
        metrics::histogram!("neuroscan_inference_latency_us").record(latency_us as f64);
        tracing::debug!(batch_size, latency_us, "ViT inference complete");

        Ok(predictions)
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}

/// Builds [`ViTClassifier`] instances for the lazy loader
pub struct ViTFactory {
    settings: ModelSettings,
    model_id: String,
}

impl ViTFactory {
    /// Create a factory for the given model settings
    pub fn new(settings: ModelSettings) -> Self {
        let model_id = settings.model_id();
        Self { settings, model_id }
    }
}

#[async_trait]
impl ClassifierFactory for ViTFactory {
    async fn build(&self) -> Result<Arc<dyn Classifier>> {
        let settings = self.settings.clone();
        let classifier = tokio::task::spawn_blocking(move || ViTClassifier::load(&settings))
            .await
            .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))??;
        Ok(Arc::new(classifier))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSource;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_factory_reports_missing_model() {
        let settings = ModelSettings {
            source: ModelSource::Local {
                path: PathBuf::from("/nonexistent/neuroscan-model"),
            },
            ..Default::default()
        };
        let factory = ViTFactory::new(settings);

        assert_eq!(factory.model_id(), "/nonexistent/neuroscan-model");
        let err = factory.build().await.err().unwrap();
        assert_eq!(err.kind(), "model_load");
    }
}
