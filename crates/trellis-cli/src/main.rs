//! Trellis CLI - generate 3D assets for catalog items that lack one

mod signal;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use trellis_core::CancelToken;
use trellis_gen::download::HttpImageSource;
use trellis_gen::providers::create_provider;
use trellis_gen::supabase::{SupabaseCatalog, SupabaseStorage};
use trellis_gen::{Pipeline, PipelineSettings, ProviderStatus, RunOptions, TrellisConfig};

#[derive(Parser)]
#[command(name = "trellis-gen")]
#[command(about = "Generate 3D models for catalog items without an asset", long_about = None)]
#[command(version)]
struct Cli {
    /// Maximum number of items to process (0 for no limit)
    #[arg(long)]
    limit: Option<usize>,

    /// Process a single item without pausing
    #[arg(long)]
    test: bool,
}

fn main() -> Result<()> {
    // A missing .env is fine; the variables may come from the shell
    let dotenv_path = dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(path) = dotenv_path {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let cli = Cli::parse();

    let config = TrellisConfig::from_env().context("Failed to load configuration")?;
    let provider = create_provider(&config).context("Failed to set up generation provider")?;

    match provider.health_check() {
        Ok(ProviderStatus::Available) => {}
        Ok(status) => {
            warn!(provider = provider.name(), status = ?status, "Provider may not be usable")
        }
        Err(e) => warn!(provider = provider.name(), error = %e, "Provider health check failed"),
    }

    // Every attempt's scratch dir lives under this one, removed on exit
    let scratch = tempfile::Builder::new()
        .prefix("trellis-run-")
        .tempdir()
        .context("Failed to create scratch directory")?;

    let cancel = CancelToken::new();
    signal::spawn_watcher(cancel.clone(), scratch.path().to_path_buf())
        .context("Failed to install Ctrl-C handler")?;

    let mut settings = PipelineSettings::from_config(&config);
    settings.scratch_root = Some(scratch.path().to_path_buf());

    let pipeline = Pipeline::new(
        Box::new(SupabaseCatalog::from_config(&config)),
        Box::new(SupabaseStorage::from_config(&config)),
        provider,
        Box::new(HttpImageSource::new()),
        settings,
    )
    .with_cancel_token(cancel);

    let options = RunOptions {
        limit: cli.limit,
        test_mode: cli.test,
    };
    if options.test_mode {
        info!("Test mode: processing a single item");
    }

    let summary = pipeline.run(&options);
    println!(
        "Processed {} item(s): {} succeeded, {} failed ({:.1}% success), stopped: {}",
        summary.stats.processed,
        summary.stats.success,
        summary.stats.failed,
        summary.stats.success_rate(),
        summary.stop
    );

    if let Err(e) = scratch.close() {
        warn!(error = %e, "Failed to remove scratch directory");
    }
    Ok(())
}
