//! Batch driver
//!
//! Pulls eligible items one at a time and runs each through
//! download, generate, validate, publish and record inside a bounded retry
//! loop. An item that runs out of attempts is marked as having an asset so
//! it is never picked again.

use crate::catalog::{CatalogStore, PendingItem};
use crate::config::TrellisConfig;
use crate::download::{image_extension, ImageSource};
use crate::provider::{GenerateRequest, GenerationParams, GenerationProvider};
use crate::publisher::AssetPublisher;
use crate::recorder::CompletionRecorder;
use crate::selector::{CatalogSelector, SelectionRules};
use crate::storage::ObjectStore;
use crate::validate::validate_glb;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trellis_core::{CancelToken, ErrorKind, Result};
use tracing::{debug, error, info, info_span, warn};

/// Knobs for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Attempts per item, at least 1
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Pause between consecutive items
    pub item_pause: Duration,
    pub bucket: String,
    pub params: GenerationParams,
    pub selection: SelectionRules,
    /// Parent for per-attempt scratch dirs. System temp dir when `None`.
    pub scratch_root: Option<PathBuf>,
}

impl PipelineSettings {
    pub fn from_config(config: &TrellisConfig) -> Self {
        Self {
            max_retries: config.processing.max_retries,
            retry_delay: config.processing.retry_delay,
            item_pause: config.processing.item_pause,
            bucket: config.supabase.bucket.clone(),
            params: config.params.clone(),
            selection: config.selection.clone(),
            scratch_root: None,
        }
    }
}

/// Per-run options from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Maximum items to process. `None` or `Some(0)` means no limit.
    pub limit: Option<usize>,
    /// Process a single item with no inter-item pause
    pub test_mode: bool,
}

impl RunOptions {
    pub fn effective_limit(&self) -> Option<usize> {
        if self.test_mode {
            Some(1)
        } else {
            self.limit.filter(|&n| n > 0)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub success: usize,
    pub failed: usize,
    pub processed: usize,
}

impl RunStatistics {
    /// Percentage of processed items that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.success as f64 * 100.0 / self.processed as f64
        }
    }
}

/// Why the run loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No eligible items left
    Drained,
    LimitReached,
    Cancelled,
    /// The catalog could not be queried
    SelectionFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Drained => "no pending items",
            StopReason::LimitReached => "limit reached",
            StopReason::Cancelled => "cancelled",
            StopReason::SelectionFailed => "selection failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: RunStatistics,
    pub stop: StopReason,
}

enum ItemOutcome {
    Succeeded,
    Exhausted,
    Cancelled,
}

/// The batch pipeline and the backends it drives
pub struct Pipeline {
    catalog: Box<dyn CatalogStore>,
    storage: Box<dyn ObjectStore>,
    provider: Arc<dyn GenerationProvider>,
    images: Arc<dyn ImageSource>,
    settings: PipelineSettings,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(
        catalog: Box<dyn CatalogStore>,
        storage: Box<dyn ObjectStore>,
        provider: Box<dyn GenerationProvider>,
        images: Box<dyn ImageSource>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            catalog,
            storage,
            provider: Arc::from(provider),
            images: Arc::from(images),
            settings,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned token, typically one wired to Ctrl-C
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Process items until the queue drains, the limit is hit, selection
    /// fails or the run is cancelled. Never fails; the outcome is in the
    /// summary.
    pub fn run(&self, options: &RunOptions) -> RunSummary {
        let limit = options.effective_limit();
        let pause = if options.test_mode {
            Duration::ZERO
        } else {
            self.settings.item_pause
        };
        let selector = CatalogSelector::new(self.catalog.as_ref(), &self.settings.selection);

        info!(
            provider = self.provider.name(),
            bucket = %self.settings.bucket,
            limit = ?limit,
            max_retries = self.settings.max_retries,
            "Starting batch run"
        );

        let mut stats = RunStatistics::default();
        let stop = loop {
            if limit.is_some_and(|limit| stats.processed >= limit) {
                break StopReason::LimitReached;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let item = match selector.next_pending() {
                Ok(Some(item)) => item,
                Ok(None) => break StopReason::Drained,
                Err(e) => {
                    error!(error = %e, "Failed to select next item");
                    break StopReason::SelectionFailed;
                }
            };

            if stats.processed > 0 && self.cancel.sleep(pause).is_err() {
                break StopReason::Cancelled;
            }

            let span = info_span!("item", item_no = %item.item_no);
            let _enter = span.enter();
            match self.process_item(&item) {
                ItemOutcome::Succeeded => stats.success += 1,
                ItemOutcome::Exhausted => stats.failed += 1,
                ItemOutcome::Cancelled => break StopReason::Cancelled,
            }
            stats.processed += 1;
        };

        info!(
            processed = stats.processed,
            success = stats.success,
            failed = stats.failed,
            success_rate = %format!("{:.1}%", stats.success_rate()),
            stop = %stop,
            "Batch run finished"
        );
        RunSummary { stats, stop }
    }

    fn process_item(&self, item: &PendingItem) -> ItemOutcome {
        info!(
            category = item.category.as_deref().unwrap_or("-"),
            image = %item.primary_image,
            "Processing item"
        );
        let max = self.settings.max_retries.max(1);

        for attempt in 1..=max {
            let error = match self.attempt(item) {
                Ok(url) => {
                    info!(attempt, url = %url, "Item complete");
                    return ItemOutcome::Succeeded;
                }
                Err(e) => e,
            };

            match error.kind() {
                ErrorKind::Cancelled => return ItemOutcome::Cancelled,
                ErrorKind::Terminal => {
                    error!(attempt, error = %error, "Attempt failed, not retrying");
                    break;
                }
                ErrorKind::Retryable if attempt < max => {
                    warn!(
                        attempt,
                        max_retries = max,
                        error = %error,
                        "Attempt failed, retrying in {:?}",
                        self.settings.retry_delay
                    );
                    if self.cancel.sleep(self.settings.retry_delay).is_err() {
                        return ItemOutcome::Cancelled;
                    }
                }
                ErrorKind::Retryable => {
                    error!(attempt, error = %error, "Attempt failed, no retries left");
                }
            }
        }

        self.give_up(item)
    }

    /// Mark an exhausted item so it is not selected again
    fn give_up(&self, item: &PendingItem) -> ItemOutcome {
        if self.cancel.is_cancelled() {
            return ItemOutcome::Cancelled;
        }
        match self.catalog.mark_has_asset(&item.item_no) {
            Ok(0) => warn!("Giving up, but no row matched when marking the item"),
            Ok(_) => error!("Giving up on item, marked as done without an asset"),
            Err(e) => error!(error = %e, "Giving up on item, and failed to mark it"),
        }
        ItemOutcome::Exhausted
    }

    /// One attempt inside its own scratch dir, removed on every exit path
    fn attempt(&self, item: &PendingItem) -> Result<String> {
        self.cancel.check()?;
        let scratch = self.scratch_dir()?;
        let result = self.run_attempt(item, scratch.path());
        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch directory");
        }
        result
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("trellis-");
        let dir = match &self.settings.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Download and generation run on worker threads so cancellation does
    /// not wait for them. Store calls stay inline.
    fn run_attempt(&self, item: &PendingItem, scratch: &Path) -> Result<String> {
        let images = Arc::clone(&self.images);
        let image_url = item.primary_image.clone();
        let image = self.cancel.run(move || images.fetch(&image_url))?;
        let extension = image_extension(&image)?;
        let image_path = scratch.join(format!("input.{}", extension));
        std::fs::write(&image_path, &image)?;
        debug!(bytes = image.len(), path = %image_path.display(), "Downloaded image");

        self.cancel.check()?;
        let request = GenerateRequest {
            name: item.item_no.clone(),
            image_path,
            params: self.settings.params.clone(),
        };
        let provider = Arc::clone(&self.provider);
        let output_dir = scratch.to_path_buf();
        let generated = self
            .cancel
            .run(move || provider.generate(&request, &output_dir))?;
        info!(
            provider = %generated.provider,
            duration_secs = generated.duration_secs,
            hash = generated.content_hash.as_deref().unwrap_or("-"),
            "Generated model"
        );
        for (key, value) in &generated.metadata {
            debug!(key = %key, value = %value, "Provider metadata");
        }

        self.cancel.check()?;
        let model = std::fs::read(&generated.output_path)?;
        let summary = validate_glb(&model)?;
        debug!(
            bytes = summary.byte_len,
            meshes = summary.meshes,
            nodes = summary.nodes,
            hash = %summary.hash,
            "Model passed validation"
        );

        self.cancel.check()?;
        let url = AssetPublisher::new(self.storage.as_ref(), &self.settings.bucket)
            .publish(&item.item_no, &model)?;

        self.cancel.check()?;
        CompletionRecorder::new(self.catalog.as_ref()).record(&item.item_no, &url)?;
        Ok(url)
    }
}
