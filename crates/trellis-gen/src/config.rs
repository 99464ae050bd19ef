//! Environment-driven configuration
//!
//! Everything comes from environment variables; there is no config file.
//! Connection parameters are required, processing knobs fall back to
//! defaults:
//!
//! - `SUPABASE_URL`, `SUPABASE_SERVICE_KEY` (required)
//! - `TRELLIS_PROVIDER` (`trellis` or `mock`)
//! - `TRELLIS_API_URL` or `TRELLIS_API_HOST`, `RUNPOD_USERNAME`, `RUNPOD_PASSWORD`
//! - `TRELLIS_BUCKET`, `TRELLIS_MAX_RETRIES`, `TRELLIS_RETRY_DELAY_SECS`,
//!   `TRELLIS_ITEM_PAUSE_SECS`, `TRELLIS_INFERENCE_TIMEOUT_SECS`

use crate::provider::GenerationParams;
use crate::selector::SelectionRules;
use std::str::FromStr;
use std::time::Duration;
use trellis_core::{Result, TrellisError};

pub const DEFAULT_BUCKET: &str = "zuo-generated";
pub const DEFAULT_PROVIDER: &str = "trellis";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
const DEFAULT_ITEM_PAUSE_SECS: u64 = 3;
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 600;

/// Catalog database and object storage connection
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

/// Remote inference endpoint
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Provider name (`trellis` or `mock`)
    pub provider: String,
    /// Base URL of the Gradio app, without trailing slash
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// Retry and pacing knobs for the batch loop
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub item_pause: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            item_pause: Duration::from_secs(DEFAULT_ITEM_PAUSE_SECS),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct TrellisConfig {
    pub supabase: SupabaseConfig,
    pub inference: InferenceConfig,
    pub processing: ProcessingConfig,
    pub selection: SelectionRules,
    pub params: GenerationParams,
}

impl TrellisConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (url, service_key) = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(key)) => (url.trim_end_matches('/').to_string(), key),
            _ => {
                return Err(TrellisError::Config(
                    "Missing Supabase configuration. Set SUPABASE_URL and SUPABASE_SERVICE_KEY"
                        .to_string(),
                ))
            }
        };

        let supabase = SupabaseConfig {
            url,
            service_key,
            bucket: get("TRELLIS_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        };

        let provider = get("TRELLIS_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let api_url = get("TRELLIS_API_URL")
            .or_else(|| get("TRELLIS_API_HOST").map(|host| host_to_url(&host)))
            .map(|u| u.trim_end_matches('/').to_string());

        let inference = InferenceConfig {
            provider,
            api_url,
            username: get("RUNPOD_USERNAME"),
            password: get("RUNPOD_PASSWORD"),
            timeout: Duration::from_secs(parse_or(
                get("TRELLIS_INFERENCE_TIMEOUT_SECS"),
                "TRELLIS_INFERENCE_TIMEOUT_SECS",
                DEFAULT_INFERENCE_TIMEOUT_SECS,
            )?),
        };

        if inference.provider == "trellis" {
            inference.require_remote()?;
        }

        let max_retries: u32 = parse_or(
            get("TRELLIS_MAX_RETRIES"),
            "TRELLIS_MAX_RETRIES",
            DEFAULT_MAX_RETRIES,
        )?;
        if max_retries == 0 {
            return Err(TrellisError::Config(
                "TRELLIS_MAX_RETRIES must be at least 1".to_string(),
            ));
        }

        let processing = ProcessingConfig {
            max_retries,
            retry_delay: Duration::from_secs(parse_or(
                get("TRELLIS_RETRY_DELAY_SECS"),
                "TRELLIS_RETRY_DELAY_SECS",
                DEFAULT_RETRY_DELAY_SECS,
            )?),
            item_pause: Duration::from_secs(parse_or(
                get("TRELLIS_ITEM_PAUSE_SECS"),
                "TRELLIS_ITEM_PAUSE_SECS",
                DEFAULT_ITEM_PAUSE_SECS,
            )?),
        };

        let params = GenerationParams::default();
        params.validate()?;

        Ok(TrellisConfig {
            supabase,
            inference,
            processing,
            selection: SelectionRules::default(),
            params,
        })
    }
}

impl InferenceConfig {
    /// Check the remote endpoint and its credentials are all present
    pub fn require_remote(&self) -> Result<()> {
        if self.api_url.is_none() {
            return Err(TrellisError::Config(
                "Missing TRELLIS_API_HOST (or TRELLIS_API_URL)".to_string(),
            ));
        }
        if self.username.is_none() || self.password.is_none() {
            return Err(TrellisError::Config(
                "Missing RunPod credentials. Set RUNPOD_USERNAME and RUNPOD_PASSWORD".to_string(),
            ));
        }
        Ok(())
    }
}

/// `host` or `host:port` becomes an https URL; full URLs pass through
fn host_to_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.parse().map_err(|_| {
            TrellisError::Config(format!("Invalid value for {}: '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
