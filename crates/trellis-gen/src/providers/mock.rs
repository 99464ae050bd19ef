//! Mock provider for testing
//!
//! Writes a minimal valid GLB (single triangle) without any network calls.
//! Can be told to fail a number of calls first, or always.

use crate::provider::*;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use trellis_core::{ContentHash, Result, TrellisError};

/// A provider that produces placeholder models locally.
///
/// Clones share the call counter, so a test can keep one handle and give the
/// other to the pipeline.
#[derive(Clone, Default)]
pub struct MockProvider {
    calls: Arc<AtomicUsize>,
    fail_first: usize,
    payload: Option<Arc<Vec<u8>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` calls with a generation error
    pub fn failing(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing(usize::MAX)
    }

    /// Write these exact bytes instead of the built-in triangle
    pub fn with_payload(mut self, bytes: Vec<u8>) -> Self {
        self.payload = Some(Arc::new(bytes));
        self
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn health_check(&self) -> Result<ProviderStatus> {
        Ok(ProviderStatus::Available)
    }

    fn generate(&self, request: &GenerateRequest, output_dir: &Path) -> Result<GenerateResult> {
        let start = std::time::Instant::now();
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !request.image_path.exists() {
            return Err(TrellisError::Generation(format!(
                "Input image missing: {}",
                request.image_path.display()
            )));
        }
        if call < self.fail_first {
            return Err(TrellisError::Generation(format!(
                "Mock failure {} for {}",
                call + 1,
                request.name
            )));
        }

        std::fs::create_dir_all(output_dir)?;
        let bytes = match &self.payload {
            Some(payload) => payload.as_ref().clone(),
            None => minimal_glb()?,
        };

        let output_path = output_dir.join(format!("{}.glb", file_stem(&request.name)));
        let mut file = std::fs::File::create(&output_path)?;
        file.write_all(&bytes)?;

        Ok(GenerateResult {
            output_path,
            provider: "mock".to_string(),
            duration_secs: start.elapsed().as_secs_f64(),
            content_hash: Some(ContentHash::from_bytes(&bytes).to_prefixed_hex()),
            metadata: HashMap::new(),
        })
    }
}

/// Build a minimal valid GLB (single triangle)
pub fn minimal_glb() -> Result<Vec<u8>> {
    let json = serde_json::json!({
        "asset": { "version": "2.0", "generator": "trellis-mock" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0 },
                "indices": 1
            }]
        }],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": 5126,
                "count": 3,
                "type": "VEC3",
                "max": [1.0, 1.0, 0.0],
                "min": [-1.0, 0.0, 0.0]
            },
            {
                "bufferView": 1,
                "componentType": 5123,
                "count": 3,
                "type": "SCALAR",
                "max": [2],
                "min": [0]
            }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
        ],
        "buffers": [{ "byteLength": 44 }]
    });

    let json_str = serde_json::to_string(&json).map_err(|e| {
        TrellisError::Generation(format!("Failed to serialize GLB JSON: {}", e))
    })?;

    // Chunks are 4-byte aligned: JSON padded with spaces, BIN with zeros
    let mut json_chunk = json_str.into_bytes();
    json_chunk.resize((json_chunk.len() + 3) & !3, b' ');

    let vertices: [f32; 9] = [-1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bin_chunk = Vec::new();
    for v in &vertices {
        bin_chunk.extend_from_slice(&v.to_le_bytes());
    }
    for i in &indices {
        bin_chunk.extend_from_slice(&i.to_le_bytes());
    }
    bin_chunk.resize((bin_chunk.len() + 3) & !3, 0);

    let total_len = 12 + 8 + json_chunk.len() as u32 + 8 + bin_chunk.len() as u32;

    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&total_len.to_le_bytes());

    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // "JSON"
    out.extend_from_slice(&json_chunk);

    out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E4942u32.to_le_bytes()); // "BIN\0"
    out.extend_from_slice(&bin_chunk);

    Ok(out)
}
