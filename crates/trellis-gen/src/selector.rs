//! Catalog selection with exclusion rules
//!
//! Walks the pending records one at a time. Records that can never be
//! processed are marked as having an asset so they drop out of the queue.

use crate::catalog::{CatalogStore, PendingItem};
use std::fmt;
use trellis_core::{Result, TrellisError};
use tracing::{debug, warn};

/// Which records are excluded from generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRules {
    pub excluded_categories: Vec<String>,
    pub excluded_statuses: Vec<String>,
    /// Upper bound on candidates examined by one `next_pending` call
    pub max_scan: usize,
}

impl Default for SelectionRules {
    fn default() -> Self {
        Self {
            excluded_categories: vec!["Outdoor".to_string()],
            excluded_statuses: vec!["DISC".to_string()],
            max_scan: 1000,
        }
    }
}

/// Why a record was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoCatalogEntry,
    ExcludedCategory(String),
    ExcludedStatus(String),
    NoImage,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCatalogEntry => write!(f, "no catalog entry"),
            SkipReason::ExcludedCategory(c) => write!(f, "excluded category '{}'", c),
            SkipReason::ExcludedStatus(s) => write!(f, "excluded status '{}'", s),
            SkipReason::NoImage => write!(f, "no primary image"),
        }
    }
}

fn matches_any(value: Option<&str>, excluded: &[String]) -> Option<String> {
    let value = value?.trim();
    excluded
        .iter()
        .any(|e| e == value)
        .then(|| value.to_string())
}

/// Finds the next record eligible for generation
pub struct CatalogSelector<'a> {
    store: &'a dyn CatalogStore,
    rules: &'a SelectionRules,
}

impl<'a> CatalogSelector<'a> {
    pub fn new(store: &'a dyn CatalogStore, rules: &'a SelectionRules) -> Self {
        Self { store, rules }
    }

    /// Return the next eligible item, marking excluded ones along the way.
    ///
    /// Any store error aborts selection, as does a skip mark that matches no
    /// rows (the same record would come back on every pass).
    pub fn next_pending(&self) -> Result<Option<PendingItem>> {
        for _ in 0..self.rules.max_scan {
            let item_no = match self.store.next_without_asset()? {
                Some(item_no) => item_no,
                None => return Ok(None),
            };

            match self.evaluate(&item_no)? {
                Ok(item) => return Ok(Some(item)),
                Err(reason) => {
                    debug!(item_no = %item_no, reason = %reason, "Skipping item");
                    if self.store.mark_has_asset(&item_no)? == 0 {
                        return Err(TrellisError::Store(format!(
                            "Marking skipped item {} matched no rows",
                            item_no
                        )));
                    }
                }
            }
        }

        warn!(
            max_scan = self.rules.max_scan,
            "Scanned the maximum number of candidates without finding an eligible item"
        );
        Ok(None)
    }

    /// Apply the exclusion rules in order
    fn evaluate(&self, item_no: &str) -> Result<std::result::Result<PendingItem, SkipReason>> {
        let entry = match self.store.catalog_entry(item_no)? {
            Some(entry) => entry,
            None => return Ok(Err(SkipReason::NoCatalogEntry)),
        };
        if let Some(category) =
            matches_any(entry.category.as_deref(), &self.rules.excluded_categories)
        {
            return Ok(Err(SkipReason::ExcludedCategory(category)));
        }
        if let Some(status) = matches_any(entry.status.as_deref(), &self.rules.excluded_statuses) {
            return Ok(Err(SkipReason::ExcludedStatus(status)));
        }

        let images = match self.store.image_set(item_no)? {
            Some(images) => images,
            None => return Ok(Err(SkipReason::NoImage)),
        };
        let primary_image = match images.primary() {
            Some(url) => url.to_string(),
            None => return Ok(Err(SkipReason::NoImage)),
        };

        Ok(Ok(PendingItem {
            item_no: item_no.to_string(),
            category: entry.category,
            status: entry.status,
            primary_image,
            images,
        }))
    }
}
