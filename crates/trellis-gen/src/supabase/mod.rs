//! Supabase backends for the catalog (PostgREST) and object storage

pub mod rest;
pub mod storage;

pub use rest::SupabaseCatalog;
pub use storage::SupabaseStorage;

use std::time::Duration;

/// Timeout for every catalog and storage request
pub const STORE_TIMEOUT: Duration = Duration::from_secs(60);

/// Service-role key, sent both as `apikey` and as a bearer token
#[derive(Clone)]
struct ServiceKey {
    key: String,
    bearer: String,
}

impl ServiceKey {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            bearer: format!("Bearer {}", key),
        }
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request
            .header("apikey", &self.key)
            .header("Authorization", &self.bearer)
    }
}
