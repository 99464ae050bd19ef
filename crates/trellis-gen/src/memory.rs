//! In-process catalog, object store and image source for unit tests
//!
//! Every handle is a cheap clone over shared state, so a test keeps one
//! handle for assertions and gives another to the pipeline.

use crate::catalog::{CatalogEntry, CatalogStore, ImageSet};
use crate::download::ImageSource;
use crate::storage::ObjectStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use trellis_core::{Result, TrellisError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// The embedding-table view of one item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingRecord {
    pub item_no: String,
    pub has_asset: bool,
    pub asset_url: Option<String>,
    pub asset_url_full: Option<String>,
}

#[derive(Default)]
struct CatalogTables {
    // Ordered so the next pending item is deterministic
    embeddings: BTreeMap<String, EmbeddingRecord>,
    catalog: HashMap<String, CatalogEntry>,
    images: HashMap<String, ImageSet>,
    failing: bool,
}

/// Catalog held in memory
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    tables: Arc<Mutex<CatalogTables>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending item. `None` leaves that table without a row.
    pub fn insert_item(
        &self,
        item_no: &str,
        entry: Option<CatalogEntry>,
        images: Option<ImageSet>,
    ) {
        let mut tables = lock(&self.tables);
        tables.embeddings.insert(
            item_no.to_string(),
            EmbeddingRecord {
                item_no: item_no.to_string(),
                ..Default::default()
            },
        );
        if let Some(entry) = entry {
            tables.catalog.insert(item_no.to_string(), entry);
        }
        if let Some(images) = images {
            tables.images.insert(item_no.to_string(), images);
        }
    }

    /// Shorthand for a fully populated item
    pub fn insert_simple(&self, item_no: &str, category: &str, status: &str, image_url: &str) {
        self.insert_item(
            item_no,
            Some(CatalogEntry {
                category: Some(category.to_string()),
                status: Some(status.to_string()),
            }),
            Some(ImageSet::with_primary(image_url)),
        );
    }

    pub fn record(&self, item_no: &str) -> Option<EmbeddingRecord> {
        lock(&self.tables).embeddings.get(item_no).cloned()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.tables)
            .embeddings
            .values()
            .filter(|r| !r.has_asset)
            .count()
    }

    /// Make every query fail with a store error
    pub fn set_failing(&self, failing: bool) {
        lock(&self.tables).failing = failing;
    }

    fn check(tables: &CatalogTables) -> Result<()> {
        if tables.failing {
            return Err(TrellisError::Store("memory catalog unavailable".to_string()));
        }
        Ok(())
    }
}

impl CatalogStore for MemoryCatalog {
    fn next_without_asset(&self) -> Result<Option<String>> {
        let tables = lock(&self.tables);
        Self::check(&tables)?;
        Ok(tables
            .embeddings
            .values()
            .find(|r| !r.has_asset)
            .map(|r| r.item_no.clone()))
    }

    fn catalog_entry(&self, item_no: &str) -> Result<Option<CatalogEntry>> {
        let tables = lock(&self.tables);
        Self::check(&tables)?;
        Ok(tables.catalog.get(item_no).cloned())
    }

    fn image_set(&self, item_no: &str) -> Result<Option<ImageSet>> {
        let tables = lock(&self.tables);
        Self::check(&tables)?;
        Ok(tables.images.get(item_no).cloned())
    }

    fn mark_has_asset(&self, item_no: &str) -> Result<usize> {
        let mut tables = lock(&self.tables);
        Self::check(&tables)?;
        Ok(match tables.embeddings.get_mut(item_no) {
            Some(record) => {
                record.has_asset = true;
                1
            }
            None => 0,
        })
    }

    fn set_asset_url(&self, item_no: &str, url: &str) -> Result<usize> {
        let mut tables = lock(&self.tables);
        Self::check(&tables)?;
        Ok(match tables.embeddings.get_mut(item_no) {
            Some(record) => {
                record.asset_url = Some(url.to_string());
                record.asset_url_full = Some(url.to_string());
                record.has_asset = true;
                1
            }
            None => 0,
        })
    }
}

const MEMORY_URL_PREFIX: &str = "memory://";

#[derive(Default)]
struct Buckets {
    buckets: HashMap<String, bool>,
    objects: HashMap<(String, String), Vec<u8>>,
    uploads: usize,
    fail_removes: bool,
}

/// Object store held in memory. URLs look like `memory://{bucket}/{key}`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<Buckets>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one bucket already present
    pub fn with_bucket(bucket: &str, public: bool) -> Self {
        let storage = Self::new();
        lock(&storage.state)
            .buckets
            .insert(bucket.to_string(), public);
        storage
    }

    /// `Some(public)` when the bucket exists
    pub fn bucket_public(&self, bucket: &str) -> Option<bool> {
        lock(&self.state).buckets.get(bucket).copied()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        lock(&self.state).objects.len()
    }

    /// Number of successful uploads
    pub fn uploads(&self) -> usize {
        lock(&self.state).uploads
    }

    /// Fetch the object behind a URL returned by `public_url`
    pub fn resolve(&self, url: &str) -> Option<Vec<u8>> {
        let rest = url.strip_prefix(MEMORY_URL_PREFIX)?;
        let (bucket, key) = rest.split_once('/')?;
        self.object(bucket, key)
    }

    /// Make every delete fail with a storage error
    pub fn set_fail_removes(&self, fail: bool) {
        lock(&self.state).fail_removes = fail;
    }
}

impl ObjectStore for MemoryStorage {
    fn remove(&self, bucket: &str, key: &str) -> Result<bool> {
        let mut state = lock(&self.state);
        if state.fail_removes {
            return Err(TrellisError::Storage("delete refused".to_string()));
        }
        Ok(state
            .objects
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some())
    }

    fn upload(&self, bucket: &str, key: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.buckets.contains_key(bucket) {
            return Err(TrellisError::BucketNotFound(bucket.to_string()));
        }
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        state.uploads += 1;
        Ok(())
    }

    fn create_bucket(&self, bucket: &str, public: bool) -> Result<()> {
        lock(&self.state)
            .buckets
            .entry(bucket.to_string())
            .or_insert(public);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}{}/{}", MEMORY_URL_PREFIX, bucket, key)
    }
}

/// Image source serving canned bytes by URL
#[derive(Clone, Default)]
pub struct StaticImageSource {
    images: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StaticImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        lock(&self.images).insert(url.to_string(), bytes);
    }

    /// Every URL fetched so far, in order
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    pub fn distinct_requests(&self) -> usize {
        lock(&self.requests).iter().collect::<HashSet<_>>().len()
    }
}

impl ImageSource for StaticImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        lock(&self.requests).push(url.to_string());
        lock(&self.images)
            .get(url)
            .cloned()
            .ok_or_else(|| TrellisError::Download(format!("404 Not Found: {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_next_and_mark() {
        let catalog = MemoryCatalog::new();
        catalog.insert_simple("A100", "Indoor", "ACTIVE", "http://x/a.jpg");
        catalog.insert_simple("A200", "Indoor", "ACTIVE", "http://x/b.jpg");

        assert_eq!(catalog.next_without_asset().unwrap().as_deref(), Some("A100"));
        assert_eq!(catalog.mark_has_asset("A100").unwrap(), 1);
        assert_eq!(catalog.next_without_asset().unwrap().as_deref(), Some("A200"));
        assert_eq!(catalog.set_asset_url("A200", "memory://b/A200.glb").unwrap(), 1);
        assert_eq!(catalog.next_without_asset().unwrap(), None);

        assert_eq!(catalog.mark_has_asset("missing").unwrap(), 0);
        let record = catalog.record("A200").unwrap();
        assert_eq!(record.asset_url_full.as_deref(), Some("memory://b/A200.glb"));
    }

    #[test]
    fn test_catalog_failing() {
        let catalog = MemoryCatalog::new();
        catalog.set_failing(true);
        assert!(matches!(
            catalog.next_without_asset(),
            Err(TrellisError::Store(_))
        ));
    }

    #[test]
    fn test_storage_requires_bucket() {
        let storage = MemoryStorage::new();
        let err = storage.upload("assets", "A.glb", b"x", "model/gltf-binary").unwrap_err();
        assert!(matches!(err, TrellisError::BucketNotFound(_)));

        storage.create_bucket("assets", true).unwrap();
        storage.upload("assets", "A.glb", b"x", "model/gltf-binary").unwrap();
        let url = storage.public_url("assets", "A.glb");
        assert_eq!(storage.resolve(&url).unwrap(), b"x");
        assert!(storage.remove("assets", "A.glb").unwrap());
        assert!(!storage.remove("assets", "A.glb").unwrap());
    }

    #[test]
    fn test_static_images() {
        let images = StaticImageSource::new();
        images.insert("http://x/a.jpg", vec![1, 2, 3]);
        assert_eq!(images.fetch("http://x/a.jpg").unwrap(), vec![1, 2, 3]);
        assert!(images.fetch("http://x/b.jpg").is_err());
        assert_eq!(images.requests().len(), 2);
    }
}
