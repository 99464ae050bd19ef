//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod mock;
pub mod trellis;

use crate::config::TrellisConfig;
use crate::provider::GenerationProvider;
use trellis_core::{Result, TrellisError};

/// Create the provider named in the configuration
pub fn create_provider(config: &TrellisConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.inference.provider.as_str() {
        "mock" => Ok(Box::new(mock::MockProvider::new())),
        "trellis" => Ok(Box::new(trellis::TrellisProvider::from_config(config)?)),
        other => Err(TrellisError::Config(format!(
            "Unknown provider '{}'. Available: {}",
            other,
            available_providers().join(", ")
        ))),
    }
}

/// List all available provider names
pub fn available_providers() -> Vec<&'static str> {
    vec!["trellis", "mock"]
}
