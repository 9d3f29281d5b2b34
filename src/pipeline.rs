use anyhow::Context;
use tracing::instrument;

use crate::config::{Config, TargetConfig};
use crate::constants::PUBLISH_THRESHOLD;
use crate::error::PollenError;
use crate::forecast::ForecastClient;
use crate::formatters::{format_message, Clock, SystemClock};
use crate::publisher::{aggregate, PublishResult, PublishTarget, Publisher};
use crate::targets::{MastodonTarget, TwitterTarget};

/// What a successful run did
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Today's index did not clear the threshold, nothing was posted
    Quiet { index: f64 },
    /// The message was built and handed to the publisher. `results` is
    /// empty for a dry run.
    Published {
        message: String,
        results: Vec<PublishResult>,
    },
}

/// One fetch, format and publish cycle
pub struct Pipeline {
    forecast: ForecastClient,
    publisher: Publisher,
    clock: Box<dyn Clock + Send + Sync>,
    location_label: String,
}

impl Pipeline {
    pub fn new(
        forecast: ForecastClient,
        publisher: Publisher,
        clock: Box<dyn Clock + Send + Sync>,
        location_label: &str,
    ) -> Self {
        Self {
            forecast,
            publisher,
            clock,
            location_label: location_label.to_string(),
        }
    }

    /// Wires up the real forecast client, posting targets and system clock.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let forecast = ForecastClient::new(
            &config.forecast_url,
            &config.referer,
            config.request_timeout,
            config.retry,
        )?;

        let mut targets: Vec<Box<dyn PublishTarget>> = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            let built: Box<dyn PublishTarget> = match target {
                TargetConfig::Twitter(creds) => Box::new(
                    TwitterTarget::new(creds.clone()).context("Failed to create Twitter client")?,
                ),
                TargetConfig::Mastodon(creds) => Box::new(
                    MastodonTarget::new(creds.clone()).context("Failed to create Mastodon client")?,
                ),
            };
            targets.push(built);
        }

        let publisher = Publisher::new(targets)
            .dry_run(config.dry_run)
            .timeout(config.publish_timeout);

        Ok(Self::new(
            forecast,
            publisher,
            Box::new(SystemClock),
            &config.location_label,
        ))
    }

    /// Runs the pipeline once. Fails if the forecast could not be fetched or
    /// was too short, or if any posting target rejected the message.
    #[instrument(skip(self), level = "info")]
    pub async fn run(&self) -> Result<RunOutcome, PollenError> {
        let forecast = self.forecast.load().await?;
        let today = forecast.today()?;

        if today.index <= PUBLISH_THRESHOLD {
            tracing::info!("Pollen index {:.2} is at or below {}, not posting", today.index, PUBLISH_THRESHOLD);
            return Ok(RunOutcome::Quiet { index: today.index });
        }

        let message = format_message(&self.location_label, today, self.clock.as_ref());
        tracing::info!("Message: {}", message);

        let results = self.publisher.publish(&message).await;
        aggregate(&results)?;

        Ok(RunOutcome::Published { message, results })
    }
}
