use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use astoria_pollen::{Config, Pipeline, RunOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astoria_pollen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting pollen run");

    let config = Config::load().await?;
    let pipeline = Pipeline::from_config(&config)?;

    match pipeline.run().await {
        Ok(RunOutcome::Quiet { index }) => {
            tracing::info!("Nothing to report today (index {:.2})", index);
        }
        Ok(RunOutcome::Published { results, .. }) => {
            tracing::info!("Run complete, posted to {} target(s)", results.len());
        }
        Err(e) => {
            if e.is_fatal_before_publish() {
                tracing::error!("Run aborted before posting: {}", e);
            } else {
                tracing::error!("Run finished with failed posts: {}", e);
            }
            return Err(e.into());
        }
    }

    Ok(())
}
