//! Classifier trait and common types

use async_trait::async_trait;
use image::RgbImage;
use neuroscan_core::{Error, Prediction, Result};

/// Trait for all image classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a batch of images, returning the best `top_k` labels per image
    async fn classify_batch(&self, images: Vec<RgbImage>, top_k: usize)
        -> Result<Vec<Vec<Prediction>>>;

    /// Get the classifier name (model identifier)
    fn name(&self) -> &str;

    /// Classify one image by running it as a batch of one, so the batched
    /// preprocessing path is used regardless of caller
    async fn classify(&self, image: RgbImage, top_k: usize) -> Result<Vec<Prediction>> {
        self.classify_batch(vec![image], top_k)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::inference("classifier returned no result for the image"))
    }
}
