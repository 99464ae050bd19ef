//! Sanity checks on generated models before they are published
//!
//! A model is accepted when it is a binary glTF container whose JSON chunk
//! parses and validates, and which holds at least one mesh.

use gltf::binary::Glb;
use gltf::Gltf;
use trellis_core::{ContentHash, Result, TrellisError};

/// What was found in an accepted GLB
#[derive(Debug, Clone)]
pub struct GlbSummary {
    pub byte_len: usize,
    pub meshes: usize,
    pub nodes: usize,
    pub hash: ContentHash,
}

pub fn validate_glb(bytes: &[u8]) -> Result<GlbSummary> {
    if bytes.is_empty() {
        return Err(TrellisError::InvalidAsset("empty model file".to_string()));
    }

    // Gltf::from_slice also accepts plain JSON glTF, so insist on the container first
    Glb::from_slice(bytes)
        .map_err(|e| TrellisError::InvalidAsset(format!("not a GLB container: {}", e)))?;

    let document = Gltf::from_slice(bytes)
        .map_err(|e| TrellisError::InvalidAsset(format!("invalid glTF document: {}", e)))?;

    let meshes = document.meshes().count();
    if meshes == 0 {
        return Err(TrellisError::InvalidAsset("model has no meshes".to_string()));
    }

    Ok(GlbSummary {
        byte_len: bytes.len(),
        meshes,
        nodes: document.nodes().count(),
        hash: ContentHash::from_bytes(bytes),
    })
}
