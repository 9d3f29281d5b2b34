use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::error::PollenError;
use crate::models::Forecast;
use crate::retry::{with_retry, RetryPolicy};

/// Client for the single upstream pollen forecast endpoint
#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Client,
    url: String,
    referer: String,
    retry: RetryPolicy,
}

impl ForecastClient {
    /// Creates a client whose every attempt is cut off after `timeout`
    pub fn new(
        url: &str,
        referer: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, PollenError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PollenError::invalid_config("POLLEN_REQUEST_TIMEOUT_MS", e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            referer: referer.to_string(),
            retry,
        })
    }

    /// Performs one GET against the forecast endpoint and reads the body
    async fn exchange(&self) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "en-US")
            .header(REFERER, &self.referer)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Fetches the raw forecast body, retrying transport failures only
    pub async fn fetch(&self) -> Result<String, PollenError> {
        tracing::info!("Fetching pollen forecast from {}", self.url);

        let outcome = with_retry(self.retry, || self.exchange()).await;
        let attempts = outcome.attempts;
        let (status, body) = outcome
            .result
            .map_err(|source| PollenError::Transport { attempts, source })?;

        if !status.is_success() {
            tracing::warn!("Forecast endpoint answered with status {}", status);
        }
        Ok(body)
    }

    /// Fetches and decodes today's forecast
    pub async fn load(&self) -> Result<Forecast, PollenError> {
        let body = self.fetch().await?;
        Ok(Forecast::decode(&body))
    }
}
