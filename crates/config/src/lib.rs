//! Configuration management for the booking assistant
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (BOOKING_ASSISTANT_ prefix, `__` separator)
//!
//! The business catalog (locations, packages, themes, pricing, offers) is a
//! separate YAML document; a built-in copy is embedded in the crate.

pub mod catalog;
pub mod settings;

pub use catalog::{
    AgeGroupPrice, BusinessCatalog, Location, Offer, Package, PricingTier, Theme, TimeSlotPrice,
};
pub use settings::{
    load_settings, load_settings_from, LlmSettings, ObservabilityConfig, RuntimeEnvironment,
    ServerConfig, SessionConfig, Settings, VoiceConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
