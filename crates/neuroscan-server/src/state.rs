//! Shared application state

use crate::config::ServiceConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use neuroscan_classifiers::{ClassifierFactory, LazyClassifier};
use neuroscan_core::CompatibilityGate;
use std::sync::Arc;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServiceConfig>,

    /// Startup compatibility verdict, read-only for the process lifetime
    pub gate: Arc<CompatibilityGate>,

    /// Served classifier, built on first use
    pub classifier: Arc<LazyClassifier>,

    /// Prometheus metrics handle for rendering (absent when no recorder)
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the state from configuration, a gate verdict and a factory
    pub fn new(
        config: ServiceConfig,
        gate: CompatibilityGate,
        factory: Arc<dyn ClassifierFactory>,
    ) -> Self {
        let gate = Arc::new(gate);
        let classifier = Arc::new(LazyClassifier::new(factory, Arc::clone(&gate)));

        Self {
            config: Arc::new(config),
            gate,
            classifier,
            metrics_handle: None,
        }
    }

    /// Attach the Prometheus handle rendered by `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Labels returned per prediction
    pub fn top_k(&self) -> usize {
        self.config.model.top_k
    }
}
