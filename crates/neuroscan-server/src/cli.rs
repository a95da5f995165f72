use clap::Parser;
use neuroscan_classifiers::DeviceSpec;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "neuroscan")]
#[command(
    author,
    version,
    about = "Brain MRI classification API backed by a Vision Transformer"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "neuroscan.yaml", env = "NEUROSCAN_CONFIG")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "NEUROSCAN_PORT")]
    pub port: Option<u16>,

    /// Hugging Face model repository
    #[arg(short, long, env = "NEUROSCAN_MODEL")]
    pub model: Option<String>,

    /// Model revision (branch, tag or commit)
    #[arg(long)]
    pub revision: Option<String>,

    /// Load the model from a local directory instead of the Hub
    #[arg(long, conflicts_with = "model")]
    pub model_path: Option<PathBuf>,

    /// Inference device: cpu, cuda or metal
    #[arg(short, long)]
    pub device: Option<DeviceSpec>,

    /// Number of labels returned per prediction
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Load the model at startup instead of on the first request
    #[arg(long)]
    pub preload: bool,

    /// Override the tensor runtime version checked at startup
    #[arg(long, env = "NEUROSCAN_TENSOR_VERSION")]
    pub tensor_version: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}
