//! Object store over the Supabase Storage API

use super::{ServiceKey, STORE_TIMEOUT};
use crate::config::TrellisConfig;
use crate::http::{build_lenient_agent, read_text};
use crate::storage::ObjectStore;
use serde_json::json;
use trellis_core::{Result, TrellisError};

/// Supabase Storage buckets
pub struct SupabaseStorage {
    base_url: String,
    auth: ServiceKey,
    agent: ureq::Agent,
}

impl SupabaseStorage {
    pub fn new(supabase_url: &str, service_key: &str) -> Self {
        Self {
            base_url: format!("{}/storage/v1", supabase_url.trim_end_matches('/')),
            auth: ServiceKey::new(service_key),
            agent: build_lenient_agent(STORE_TIMEOUT),
        }
    }

    pub fn from_config(config: &TrellisConfig) -> Self {
        Self::new(&config.supabase.url, &config.supabase.service_key)
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        )
    }
}

impl ObjectStore for SupabaseStorage {
    fn remove(&self, bucket: &str, key: &str) -> Result<bool> {
        let mut response = self
            .auth
            .authorize(self.agent.delete(&self.object_url(bucket, key)))
            .call()
            .map_err(|e| TrellisError::Storage(format!("Delete of {} failed: {}", key, e)))?;

        let status = response.status().as_u16();
        let text = read_text(&mut response);
        classify_remove(status, &text)
    }

    fn upload(&self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let mut response = self
            .auth
            .authorize(self.agent.post(&self.object_url(bucket, key)))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .send(bytes)
            .map_err(|e| TrellisError::Storage(format!("Upload of {} failed: {}", key, e)))?;

        let status = response.status().as_u16();
        let text = read_text(&mut response);
        classify_upload(status, &text, bucket)
    }

    fn create_bucket(&self, bucket: &str, public: bool) -> Result<()> {
        let mut response = self
            .auth
            .authorize(self.agent.post(&format!("{}/bucket", self.base_url)))
            .send_json(&json!({ "id": bucket, "name": bucket, "public": public }))
            .map_err(|e| TrellisError::Storage(format!("Bucket creation failed: {}", e)))?;

        let status = response.status().as_u16();
        let text = read_text(&mut response);
        classify_create_bucket(status, &text)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        )
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// `Ok(true)` when deleted, `Ok(false)` when there was nothing to delete
pub fn classify_remove(status: u16, body: &str) -> Result<bool> {
    if is_success(status) {
        return Ok(true);
    }
    // Storage reports a missing object as 404, sometimes wrapped in a 400
    let lower = body.to_ascii_lowercase();
    if status == 404 || lower.contains("not_found") || lower.contains("not found") {
        return Ok(false);
    }
    Err(TrellisError::Storage(format!(
        "Delete returned {}: {}",
        status, body
    )))
}

pub fn classify_upload(status: u16, body: &str, bucket: &str) -> Result<()> {
    if is_success(status) {
        return Ok(());
    }
    if body.contains("Bucket not found") {
        return Err(TrellisError::BucketNotFound(bucket.to_string()));
    }
    Err(TrellisError::Storage(format!(
        "Upload returned {}: {}",
        status, body
    )))
}

pub fn classify_create_bucket(status: u16, body: &str) -> Result<()> {
    if is_success(status) || status == 409 || body.to_ascii_lowercase().contains("already exists")
    {
        return Ok(());
    }
    Err(TrellisError::Storage(format!(
        "Bucket creation returned {}: {}",
        status, body
    )))
}
