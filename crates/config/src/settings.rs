//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Environment variable consulted when `llm.api_key` is not configured
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - missing credential only disables generation
    #[default]
    Development,
    Staging,
    /// Production mode - a credential is mandatory
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Chat proxy server
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion service
    #[serde(default)]
    pub llm: LlmSettings,

    /// Dialogue session behavior
    #[serde(default)]
    pub session: SessionConfig,

    /// Speech synthesis and recognition
    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Business catalog YAML; the embedded catalog is used when unset
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_session()?;
        self.validate_voice()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }
        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", llm.temperature),
            });
        }
        if !(0.0..=1.0).contains(&llm.top_p) {
            return Err(ConfigError::InvalidValue {
                field: "llm.top_p".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", llm.top_p),
            });
        }
        if llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        if llm.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_retries".to_string(),
                message: "At least one attempt is required".to_string(),
            });
        }
        if llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }
        if self.environment.is_production() && self.resolved_api_key().is_none() {
            return Err(ConfigError::MissingField(format!(
                "llm.api_key (or {})",
                API_KEY_ENV
            )));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        if self.session.history_window < 2 {
            return Err(ConfigError::InvalidValue {
                field: "session.history_window".to_string(),
                message: format!("Must hold at least 2 turns, got {}", self.session.history_window),
            });
        }
        if self.session.welcome_message.trim().is_empty() {
            return Err(ConfigError::MissingField("session.welcome_message".to_string()));
        }
        Ok(())
    }

    fn validate_voice(&self) -> Result<(), ConfigError> {
        let voice = &self.voice;
        if !(0.1..=10.0).contains(&voice.rate) {
            return Err(ConfigError::InvalidValue {
                field: "voice.rate".to_string(),
                message: format!("Must be between 0.1 and 10.0, got {}", voice.rate),
            });
        }
        if !(0.0..=2.0).contains(&voice.pitch) {
            return Err(ConfigError::InvalidValue {
                field: "voice.pitch".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", voice.pitch),
            });
        }
        if !(0.0..=1.0).contains(&voice.volume) {
            return Err(ConfigError::InvalidValue {
                field: "voice.volume".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", voice.volume),
            });
        }
        if voice.silence_timeout_ms < 500 {
            return Err(ConfigError::InvalidValue {
                field: "voice.silence_timeout_ms".to_string(),
                message: "Silence timeout too low (minimum 500ms)".to_string(),
            });
        }
        Ok(())
    }

    /// Credential from configuration, falling back to `GROQ_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

/// Completion service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per reply
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before retry N is `2^N * backoff_base_ms`
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_llm_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "llama3-8b-8192".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    1024
}
fn default_top_p() -> f32 {
    1.0
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Dialogue session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turns kept in the rolling window sent to the completion service
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Keep manually edited fields from being overwritten by extraction
    #[serde(default)]
    pub protect_manual_edits: bool,
}

fn default_history_window() -> usize {
    20
}
fn default_welcome_message() -> String {
    "Hi! Welcome to SkyJumper, your spot for fun and adventure. I'm your booking assistant. \
     Can I please have your name to get started?"
        .to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            welcome_message: default_welcome_message(),
            protect_manual_edits: false,
        }
    }
}

/// Voice settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Speak assistant replies automatically
    #[serde(default = "default_true")]
    pub auto_play: bool,

    #[serde(default = "default_rate")]
    pub rate: f32,

    #[serde(default = "default_unit")]
    pub pitch: f32,

    #[serde(default = "default_unit")]
    pub volume: f32,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub voice: Option<String>,

    /// Quiet period after which continuous recognition commits the transcript
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
}

fn default_rate() -> f32 {
    0.7
}
fn default_unit() -> f32 {
    1.0
}
fn default_language() -> String {
    "en-US".to_string()
}
fn default_silence_timeout_ms() -> u64 {
    5000
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_play: true,
            rate: default_rate(),
            pitch: default_unit(),
            volume: default_unit(),
            language: default_language(),
            voice: None,
            silence_timeout_ms: default_silence_timeout_ms(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` relative to the working directory
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::from(dir.join("default")).required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("BOOKING_ASSISTANT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        dir = %dir.display(),
        env = env.unwrap_or("default"),
        model = %settings.llm.model,
        "Settings loaded"
    );

    Ok(settings)
}
