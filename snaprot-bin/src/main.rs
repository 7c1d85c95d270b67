use color_eyre::eyre;
use snaprot_common::SnapshotProvider;
use snaprot_ec2::Ec2Provider;
use snaprot_engine::{InMemoryProvider, ProviderKind, RotationConfig, Rotator};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// --- One rotation pass per invocation ---

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Invalid settings fail here, before the provider is touched
    let config = RotationConfig::from_env()?;
    info!(
        retain = config.retain.get(),
        tag_key = %config.tag_key,
        dry_run = config.dry_run,
        "Starting snapshot rotation..."
    );

    let provider = build_provider(&config).await?;
    let report = Rotator::new(provider, config).run().await?;

    info!(report = %serde_json::to_string(&report)?, "Rotation report");
    report.into_result()?;
    Ok(())
}

async fn build_provider(config: &RotationConfig) -> eyre::Result<Arc<dyn SnapshotProvider>> {
    let provider: Arc<dyn SnapshotProvider> = match config.provider {
        ProviderKind::Ec2 => Arc::new(Ec2Provider::from_env(config.region.clone()).await),
        ProviderKind::Memory => {
            warn!("Using the in-memory provider, no cloud resources will be touched");
            match &config.memory_fixture {
                Some(path) => Arc::new(InMemoryProvider::load_fixture(path)?),
                None => Arc::new(InMemoryProvider::new()),
            }
        }
    };
    Ok(provider)
}
