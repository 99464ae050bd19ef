//! Generation provider trait and request/result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use trellis_core::{Result, TrellisError};

/// Fixed sampling parameters sent with every image-to-3D request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub seed: i64,
    pub randomize_seed: bool,
    /// Sparse-structure stage guidance strength
    pub ss_guidance_strength: f64,
    pub ss_sampling_steps: u32,
    /// Structured-latent stage guidance strength
    pub slat_guidance_strength: f64,
    pub slat_sampling_steps: u32,
    /// Fraction of faces to remove when simplifying the mesh, in (0, 1]
    pub mesh_simplify: f64,
    /// Baked texture resolution in pixels
    pub texture_size: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 0,
            randomize_seed: true,
            ss_guidance_strength: 18.0,
            ss_sampling_steps: 35,
            slat_guidance_strength: 9.0,
            slat_sampling_steps: 35,
            mesh_simplify: 0.92,
            texture_size: 2048,
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.mesh_simplify > 0.0 && self.mesh_simplify <= 1.0) {
            return Err(TrellisError::Config(format!(
                "mesh_simplify must be in (0, 1], got {}",
                self.mesh_simplify
            )));
        }
        if self.ss_sampling_steps == 0 || self.slat_sampling_steps == 0 {
            return Err(TrellisError::Config(
                "sampling step counts must be positive".to_string(),
            ));
        }
        if self.texture_size == 0 {
            return Err(TrellisError::Config(
                "texture_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A request to generate a model from one image
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Item number; also names the output file
    pub name: String,
    /// Local path of the downloaded input image
    pub image_path: PathBuf,
    pub params: GenerationParams,
}

/// The result of a successful generation
#[derive(Debug, Clone)]
pub struct GenerateResult {
    /// Path to the generated GLB inside the caller's output directory
    pub output_path: PathBuf,
    pub provider: String,
    pub duration_secs: f64,
    /// Content hash (sha256:...)
    pub content_hash: Option<String>,
    /// Any provider-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Status returned by a provider health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    Unavailable(String),
    NoCredentials,
}

/// Trait implemented by each generation backend (Trellis, Mock).
///
/// The driver runs `generate` on a worker thread and stops waiting for it
/// when the run is cancelled, so implementations must be shareable.
pub trait GenerationProvider: Send + Sync {
    /// Provider name (e.g. "trellis", "mock")
    fn name(&self) -> &str;

    /// Check the provider is usable (credentials present, endpoint reachable)
    fn health_check(&self) -> Result<ProviderStatus>;

    /// Generate a model synchronously, writing the GLB into `output_dir`.
    ///
    /// A single call is a single remote request; callers own retries.
    fn generate(&self, request: &GenerateRequest, output_dir: &Path) -> Result<GenerateResult>;
}

/// Make an item number safe to use as a file name
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "asset".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = GenerationParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.ss_sampling_steps, 35);
        assert_eq!(params.slat_guidance_strength, 9.0);
        assert!(params.randomize_seed);
    }

    #[test]
    fn test_mesh_simplify_bounds() {
        let mut params = GenerationParams::default();
        params.mesh_simplify = 1.0;
        assert!(params.validate().is_ok());
        params.mesh_simplify = 0.0;
        assert!(params.validate().is_err());
        params.mesh_simplify = 1.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_steps_rejected() {
        let params = GenerationParams {
            ss_sampling_steps: 0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(TrellisError::Config(_))));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("A100"), "A100");
        assert_eq!(file_stem("100/200 b"), "100_200_b");
        assert_eq!(file_stem(""), "asset");
    }
}
