//! Catalog store abstraction
//!
//! The catalog is three tables keyed by item number: the embedding table that
//! carries `has_asset` and the asset URL, the catalog table with category and
//! lifecycle status, and the images table with up to three image URLs.

use trellis_core::Result;

/// Category and lifecycle status of an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    pub category: Option<String>,
    pub status: Option<String>,
}

/// Image URLs for an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub image_1: Option<String>,
    pub image_2: Option<String>,
    pub image_3: Option<String>,
}

impl ImageSet {
    pub fn with_primary(url: impl Into<String>) -> Self {
        Self {
            image_1: Some(url.into()),
            ..Default::default()
        }
    }

    /// The first image URL, trimmed. Blank counts as missing.
    pub fn primary(&self) -> Option<&str> {
        self.image_1
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// An eligible item, merged from its three catalog rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub item_no: String,
    pub category: Option<String>,
    pub status: Option<String>,
    /// Trimmed, non-blank URL of the image fed to the generator
    pub primary_image: String,
    pub images: ImageSet,
}

/// Read and write access to the catalog tables
pub trait CatalogStore: Send {
    /// Item number of one record that has no asset yet
    fn next_without_asset(&self) -> Result<Option<String>>;

    fn catalog_entry(&self, item_no: &str) -> Result<Option<CatalogEntry>>;

    fn image_set(&self, item_no: &str) -> Result<Option<ImageSet>>;

    /// Set `has_asset = true` without touching the URL. Returns rows affected.
    fn mark_has_asset(&self, item_no: &str) -> Result<usize>;

    /// Write `asset_url` and `asset_url_full` and set `has_asset = true`.
    /// Returns rows affected.
    fn set_asset_url(&self, item_no: &str, url: &str) -> Result<usize>;
}
