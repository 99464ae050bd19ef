//! Trellis Gen - batch 3D model generation for furniture catalog items
//!
//! Pulls catalog records that have no 3D asset yet, generates a GLB from the
//! item's primary image via a remote image-to-3D service, publishes the GLB to
//! object storage and records the public URL back in the catalog.

pub mod catalog;
pub mod config;
pub mod download;
pub mod driver;
mod http;
#[cfg(test)]
mod memory;
pub mod provider;
pub mod providers;
pub mod publisher;
pub mod recorder;
pub mod selector;
pub mod storage;
pub mod supabase;
pub mod validate;

pub use catalog::{CatalogEntry, CatalogStore, ImageSet, PendingItem};
pub use config::TrellisConfig;
pub use driver::{Pipeline, PipelineSettings, RunOptions, RunStatistics, RunSummary, StopReason};
pub use provider::{
    GenerateRequest, GenerateResult, GenerationParams, GenerationProvider, ProviderStatus,
};
pub use publisher::AssetPublisher;
pub use recorder::CompletionRecorder;
pub use selector::{CatalogSelector, SelectionRules, SkipReason};
pub use storage::ObjectStore;
