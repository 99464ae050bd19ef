//! Object store abstraction for published assets

use trellis_core::Result;

/// Content type used for every uploaded model
pub const GLB_CONTENT_TYPE: &str = "model/gltf-binary";

/// Bucketed blob storage with public URLs
pub trait ObjectStore: Send {
    /// Delete an object. `Ok(false)` when it was not there.
    fn remove(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Upload (overwriting) an object.
    ///
    /// Fails with `TrellisError::BucketNotFound` when the bucket does not
    /// exist so callers can create it.
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Create a bucket. An already existing bucket is not an error.
    fn create_bucket(&self, bucket: &str, public: bool) -> Result<()>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}
