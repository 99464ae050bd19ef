//! Writes the published asset URL back to the catalog

use crate::catalog::CatalogStore;
use trellis_core::{Result, TrellisError};
use tracing::info;

pub struct CompletionRecorder<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> CompletionRecorder<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Set both URL columns and `has_asset`. Zero rows affected is an error.
    pub fn record(&self, item_id: &str, asset_url: &str) -> Result<()> {
        let rows = self.store.set_asset_url(item_id, asset_url)?;
        if rows == 0 {
            return Err(TrellisError::NoRowsUpdated(item_id.to_string()));
        }
        info!(rows, "Recorded asset URL");
        Ok(())
    }
}
