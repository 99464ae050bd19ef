//! TRELLIS image-to-3D provider
//!
//! Talks to a Gradio app hosting TRELLIS through the Gradio HTTP API:
//! upload the image, queue a call to `/generate_wrapper`, read the result
//! from the event stream, then download the GLB. Generation takes minutes,
//! so the agent timeout is long. Every request carries HTTP Basic auth.

use crate::config::TrellisConfig;
use crate::http::{basic_auth, build_agent, multipart_body, read_bytes};
use crate::provider::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use trellis_core::{ContentHash, Result, TrellisError};
use tracing::{debug, info};

const API_PREFIX: &str = "gradio_api";
const ENDPOINT: &str = "generate_wrapper";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote TRELLIS generator behind a Gradio app
pub struct TrellisProvider {
    base_url: String,
    auth_header: String,
    timeout: Duration,
}

impl TrellisProvider {
    /// Create a new TrellisProvider from config
    pub fn from_config(config: &TrellisConfig) -> Result<Self> {
        config.inference.require_remote()?;
        let missing = || TrellisError::Config("Trellis endpoint not configured".to_string());

        let base_url = config.inference.api_url.clone().ok_or_else(missing)?;
        let username = config.inference.username.as_deref().ok_or_else(missing)?;
        let password = config.inference.password.as_deref().ok_or_else(missing)?;

        Ok(Self {
            base_url,
            auth_header: basic_auth(username, password),
            timeout: config.inference.timeout,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    /// Upload the input image and return its server-side path
    fn upload_image(&self, image_path: &Path) -> Result<String> {
        let data = std::fs::read(image_path)?;
        let filename = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input.jpg");
        let content_type = match image_path.extension().and_then(|e| e.to_str()) {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        };

        let boundary = format!("----trellis{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, "files", filename, content_type, &data);

        let mut response = build_agent(self.timeout)
            .post(&self.api_url("upload"))
            .header("Authorization", &self.auth_header)
            .header(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send(&body[..])
            .map_err(|e| TrellisError::Generation(format!("Image upload failed: {}", e)))?;

        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| {
                TrellisError::Generation(format!("Failed to read upload response: {}", e))
            })?;
        parse_upload_response(&text)
    }

    /// Queue a generation call and return its event ID
    fn submit_call(&self, server_path: &str, params: &GenerationParams) -> Result<String> {
        let payload = call_payload(server_path, params);

        let mut response = build_agent(self.timeout)
            .post(&self.api_url(&format!("call/{}", ENDPOINT)))
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .send_json(&payload)
            .map_err(|e| TrellisError::Generation(format!("Trellis API request failed: {}", e)))?;

        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TrellisError::Generation(format!("Failed to read call response: {}", e)))?;
        parse_event_id(&text)
    }

    /// Block on the event stream until the call completes
    fn await_result(&self, event_id: &str) -> Result<Value> {
        let url = self.api_url(&format!("call/{}/{}", ENDPOINT, event_id));

        let response = build_agent(self.timeout)
            .get(&url)
            .header("Authorization", &self.auth_header)
            .call()
            .map_err(|e| TrellisError::Generation(format!("Trellis result stream failed: {}", e)))?;

        let bytes = read_bytes(response)
            .map_err(|e| TrellisError::Generation(format!("Failed to read result stream: {}", e)))?;
        parse_sse_result(&String::from_utf8_lossy(&bytes))
    }

    fn download_model(&self, url: &str, output_path: &Path) -> Result<()> {
        let agent = build_agent(self.timeout);
        let mut request = agent.get(url);
        if url.starts_with(&self.base_url) {
            request = request.header("Authorization", &self.auth_header);
        }

        let response = request
            .call()
            .map_err(|e| TrellisError::Generation(format!("Failed to download model: {}", e)))?;
        let bytes = read_bytes(response)
            .map_err(|e| TrellisError::Generation(format!("Failed to read model data: {}", e)))?;

        std::fs::write(output_path, &bytes)?;
        Ok(())
    }
}

impl GenerationProvider for TrellisProvider {
    fn name(&self) -> &str {
        "trellis"
    }

    fn health_check(&self) -> Result<ProviderStatus> {
        if self.auth_header.is_empty() {
            return Ok(ProviderStatus::NoCredentials);
        }

        // Gradio serves its app config at the root; any 2xx means the app is up
        let url = format!("{}/config", self.base_url);
        match build_agent(HEALTH_TIMEOUT)
            .get(&url)
            .header("Authorization", &self.auth_header)
            .call()
        {
            Ok(_) => Ok(ProviderStatus::Available),
            Err(e) => {
                debug!(url = %url, error = %e, "Health check request failed");
                Ok(ProviderStatus::Unavailable(e.to_string()))
            }
        }
    }

    fn generate(&self, request: &GenerateRequest, output_dir: &Path) -> Result<GenerateResult> {
        let start = std::time::Instant::now();
        std::fs::create_dir_all(output_dir)?;

        let server_path = self.upload_image(&request.image_path)?;
        debug!(server_path = %server_path, "Uploaded input image");

        let event_id = self.submit_call(&server_path, &request.params)?;
        info!(event_id = %event_id, "Submitted generation call");

        let output = self.await_result(&event_id)?;
        let model_url = parse_model_file(&output, &self.api_url(""))?;

        let output_path = output_dir.join(format!("{}.glb", file_stem(&request.name)));
        self.download_model(&model_url, &output_path)?;

        let hash = ContentHash::from_file(&output_path)
            .map(|h| h.to_prefixed_hex())
            .ok();

        let mut metadata = HashMap::new();
        metadata.insert("event_id".to_string(), event_id);
        metadata.insert("model_url".to_string(), model_url);

        Ok(GenerateResult {
            output_path,
            provider: "trellis".to_string(),
            duration_secs: start.elapsed().as_secs_f64(),
            content_hash: hash,
            metadata,
        })
    }
}

/// Positional arguments for `/generate_wrapper`
pub fn call_payload(server_path: &str, params: &GenerationParams) -> Value {
    json!({
        "data": [
            {
                "path": server_path,
                "meta": { "_type": "gradio.FileData" }
            },
            params.seed,
            params.randomize_seed,
            params.ss_guidance_strength,
            params.ss_sampling_steps,
            params.slat_guidance_strength,
            params.slat_sampling_steps,
            params.mesh_simplify,
            params.texture_size
        ]
    })
}

/// Parse the upload response (a JSON array of server paths)
pub fn parse_upload_response(text: &str) -> Result<String> {
    let paths: Vec<String> = serde_json::from_str(text).map_err(|e| {
        TrellisError::Generation(format!("Unexpected upload response '{}': {}", text, e))
    })?;
    paths
        .into_iter()
        .next()
        .ok_or_else(|| TrellisError::Generation("Upload returned no file path".to_string()))
}

/// Parse the call response (`{"event_id": "..."}`)
pub fn parse_event_id(text: &str) -> Result<String> {
    let response: Value = serde_json::from_str(text)
        .map_err(|e| TrellisError::Generation(format!("Invalid call response: {}", e)))?;

    response
        .get("event_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            TrellisError::Generation(format!("No event_id in call response: {}", text))
        })
}

/// Extract the output array from a Gradio server-sent event stream.
///
/// `generating` and `heartbeat` events are skipped; the stream must end
/// with `complete` (data = outputs) or `error`.
pub fn parse_sse_result(body: &str) -> Result<Value> {
    let mut event: Option<&str> = None;

    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim());
        } else if let Some(data) = line.strip_prefix("data:") {
            match event {
                Some("complete") => {
                    return serde_json::from_str(data.trim()).map_err(|e| {
                        TrellisError::Generation(format!("Invalid completion payload: {}", e))
                    });
                }
                Some("error") => {
                    return Err(TrellisError::Generation(format!(
                        "Remote generation failed: {}",
                        data.trim()
                    )));
                }
                _ => {}
            }
        }
    }

    Err(TrellisError::Generation(
        "Event stream ended without a result".to_string(),
    ))
}

/// Resolve the GLB download URL from the `(preview, model)` output pair.
///
/// The preview video is ignored. `file_prefix` is `{base}/gradio_api/` and is
/// used when the server only reports a path.
pub fn parse_model_file(output: &Value, file_prefix: &str) -> Result<String> {
    let model = output
        .as_array()
        .and_then(|items| items.get(1))
        .ok_or_else(|| {
            TrellisError::Generation(format!("Expected (preview, model) output, got {}", output))
        })?;

    if let Some(path) = model.as_str() {
        return Ok(format!("{}file={}", file_prefix, path));
    }

    if let Some(url) = model
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
    {
        return Ok(url.to_string());
    }

    model
        .get("path")
        .and_then(|p| p.as_str())
        .map(|path| format!("{}file={}", file_prefix, path))
        .ok_or_else(|| TrellisError::Generation(format!("No model file in output: {}", model)))
}
