//! Image decoding and ViT input preprocessing

use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::RgbImage;
use neuroscan_core::{Error, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_SIZE: u32 = 224;
const DEFAULT_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_STD: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_RESCALE: f64 = 1.0 / 255.0;

/// Decode uploaded bytes into an RGB image, whatever the source color mode
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| Error::image_decode(e.to_string()))
}

/// `preprocessor_config.json` as published with HF image processors
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,
    #[serde(default = "default_true")]
    pub do_rescale: bool,
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    #[serde(default)]
    pub size: Option<ImageSize>,
    #[serde(default = "default_rescale")]
    pub rescale_factor: f64,
    #[serde(default = "default_mean")]
    pub image_mean: [f32; 3],
    #[serde(default = "default_std")]
    pub image_std: [f32; 3],
}

/// The `size` field comes in several shapes depending on processor version
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ImageSize {
    Square(u32),
    Dims { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            do_rescale: true,
            do_normalize: true,
            size: None,
            rescale_factor: DEFAULT_RESCALE,
            image_mean: DEFAULT_MEAN,
            image_std: DEFAULT_STD,
        }
    }
}

/// Turns RGB images into normalized NCHW tensors
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessorConfig,
    height: u32,
    width: u32,
}

impl ImagePreprocessor {
    /// Build from a processor config; `fallback_size` is the model's image size
    pub fn new(config: PreprocessorConfig, fallback_size: u32) -> Self {
        let (height, width) = match config.size {
            Some(ImageSize::Square(side)) | Some(ImageSize::ShortestEdge { shortest_edge: side }) => {
                (side, side)
            }
            Some(ImageSize::Dims { height, width }) => (height, width),
            None => (fallback_size, fallback_size),
        };
        Self {
            config,
            height,
            width,
        }
    }

    /// Load `preprocessor_config.json` if present, ViT defaults otherwise
    pub fn from_file(path: Option<&Path>, fallback_size: u32) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => PreprocessorConfig::default(),
        };
        Ok(Self::new(config, fallback_size))
    }

    /// Target (height, width)
    pub fn target_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Preprocess one image into a `(3, height, width)` tensor
    pub fn to_tensor(&self, image: &RgbImage, device: &Device) -> Result<Tensor> {
        self.process(image, device)
            .map_err(|e| Error::inference(format!("Image preprocessing failed: {}", e)))
    }

    /// Preprocess a batch into a `(batch, 3, height, width)` tensor
    pub fn batch_to_tensor(&self, images: &[RgbImage], device: &Device) -> Result<Tensor> {
        if images.is_empty() {
            return Err(Error::inference("Cannot preprocess an empty batch"));
        }
        let tensors = images
            .iter()
            .map(|image| self.to_tensor(image, device))
            .collect::<Result<Vec<_>>>()?;
        Tensor::stack(&tensors, 0)
            .map_err(|e| Error::inference(format!("Failed to stack batch: {}", e)))
    }

    fn process(&self, image: &RgbImage, device: &Device) -> candle_core::Result<Tensor> {
        let resized;
        let image = if self.config.do_resize
            && (image.height() != self.height || image.width() != self.width)
        {
            resized = image::imageops::resize(image, self.width, self.height, FilterType::Triangle);
            &resized
        } else {
            image
        };

        let (width, height) = image.dimensions();
        let pixels = Tensor::from_vec(
            image.as_raw().clone(),
            (height as usize, width as usize, 3),
            &Device::Cpu,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;

        let pixels = if self.config.do_rescale {
            pixels.affine(self.config.rescale_factor, 0.0)?
        } else {
            pixels
        };

        let pixels = if self.config.do_normalize {
            let mean = Tensor::new(&self.config.image_mean, &Device::Cpu)?.reshape((3, 1, 1))?;
            let std = Tensor::new(&self.config.image_std, &Device::Cpu)?.reshape((3, 1, 1))?;
            pixels.broadcast_sub(&mean)?.broadcast_div(&std)?
        } else {
            pixels
        };

        pixels.to_device(device)
    }
}

fn default_true() -> bool {
    true
}

fn default_rescale() -> f64 {
    DEFAULT_RESCALE
}

fn default_mean() -> [f32; 3] {
    DEFAULT_MEAN
}

fn default_std() -> [f32; 3] {
    DEFAULT_STD
}
