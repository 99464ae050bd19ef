//! Publishes generated models to object storage

use crate::storage::{ObjectStore, GLB_CONTENT_TYPE};
use trellis_core::{Result, TrellisError};
use tracing::{info, warn};

/// Uploads GLBs under `{item_id}.glb` and hands back their public URL
pub struct AssetPublisher<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
}

impl<'a> AssetPublisher<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str) -> Self {
        Self { store, bucket }
    }

    pub fn object_key(item_id: &str) -> String {
        format!("{}.glb", item_id)
    }

    /// Replace any previous object for this item and return the public URL
    pub fn publish(&self, item_id: &str, bytes: &[u8]) -> Result<String> {
        let key = Self::object_key(item_id);

        match self.store.remove(self.bucket, &key) {
            Ok(true) => info!(key = %key, "Removed previous asset"),
            Ok(false) => {}
            Err(e) => warn!(key = %key, error = %e, "Could not remove previous asset"),
        }

        match self.store.upload(self.bucket, &key, bytes, GLB_CONTENT_TYPE) {
            Ok(()) => {}
            Err(TrellisError::BucketNotFound(_)) => {
                info!(bucket = %self.bucket, "Bucket missing, creating it");
                self.store.create_bucket(self.bucket, true)?;
                self.store
                    .upload(self.bucket, &key, bytes, GLB_CONTENT_TYPE)?;
            }
            Err(e) => return Err(e),
        }

        let url = self.store.public_url(self.bucket, &key);
        info!(url = %url, bytes = bytes.len(), "Uploaded asset");
        Ok(url)
    }
}
