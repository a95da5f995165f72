//! Service configuration

use crate::cli::Cli;
use neuroscan_classifiers::{ModelSettings, ModelSource, DEFAULT_MODEL_ID, RUNTIME_VERSION};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Served model
    #[serde(default)]
    pub model: ModelSettings,

    /// Tensor runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl ServiceConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_cli(cli);
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }

        if let Some(path) = &cli.model_path {
            self.model.source = ModelSource::Local { path: path.clone() };
        } else if cli.model.is_some() || cli.revision.is_some() {
            let (current_repo, current_revision) = match &self.model.source {
                ModelSource::HuggingFace { repo, revision } => (repo.clone(), revision.clone()),
                ModelSource::Local { .. } => (DEFAULT_MODEL_ID.to_string(), "main".to_string()),
            };
            self.model.source = ModelSource::HuggingFace {
                repo: cli.model.clone().unwrap_or(current_repo),
                revision: cli.revision.clone().unwrap_or(current_revision),
            };
        }

        if let Some(device) = cli.device {
            self.model.device = device;
        }
        if let Some(top_k) = cli.top_k {
            self.model.top_k = top_k;
        }
        if cli.preload {
            self.model.preload = true;
        }
        if let Some(version) = &cli.tensor_version {
            self.runtime.tensor_version = Some(version.clone());
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,
}

impl ServerConfig {
    /// Bind address; `listen` may be IPv4 or IPv6 (`::`)
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .listen
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address '{}': {}", self.listen, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_upload_bytes: default_max_upload(),
            cors: CorsConfig::default(),
        }
    }
}

/// Cross-origin policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Accept any origin, method and header with credentials (development)
    #[serde(default = "default_true")]
    pub allow_any_origin: bool,

    /// Origins accepted when `allow_any_origin` is off
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: true,
            allowed_origins: Vec::new(),
        }
    }
}

/// Tensor runtime settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Version fed to the compatibility gate instead of the built-in one
    #[serde(default)]
    pub tensor_version: Option<String>,
}

impl RuntimeConfig {
    /// Version string the compatibility gate evaluates
    pub fn effective_version(&self) -> &str {
        self.tensor_version.as_deref().unwrap_or(RUNTIME_VERSION)
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload() -> usize {
    20 * 1024 * 1024
}

fn default_true() -> bool {
    true
}
