//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use booking_assistant_config::Settings;
use booking_assistant_llm::{GroqBackend, LlmBackend, LlmConfig};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    /// Completion backend; `None` when no credential is configured
    pub backend: Option<Arc<dyn LlmBackend>>,
    /// Prometheus handle rendered at `/metrics`
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from settings, connecting to Groq when a credential is available
    pub fn new(config: Settings) -> Self {
        let backend = match config.resolved_api_key() {
            Some(key) => match GroqBackend::new(LlmConfig::from_settings(&config.llm, key)) {
                Ok(backend) => Some(Arc::new(backend) as Arc<dyn LlmBackend>),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create completion backend");
                    None
                },
            },
            None => {
                tracing::warn!("No completion credential configured; /api/chat will fail");
                None
            },
        };

        Self {
            config: Arc::new(config),
            backend,
            metrics: None,
        }
    }

    /// State with an explicit backend
    pub fn with_backend(config: Settings, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend: Some(backend),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.config.llm.model
    }
}
