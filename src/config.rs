//! Run configuration, built once at startup.
//!
//! Values are looked up in order: parameter store (unless
//! `SKIP_SSM_PARAMETERS=true`), then the process environment, which also
//! picks up a local `.env` file. Empty values count as missing.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_AWS_REGION, DEFAULT_LOCATION_LABEL, DEFAULT_MAX_RETRIES, DEFAULT_PUBLISH_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_DELAY_MS, FORECAST_REFERER, FORECAST_URL,
    PARAMETER_PREFIX,
};
use crate::error::PollenError;
use crate::params::{AwsCredentials, ParameterStore};
use crate::retry::RetryPolicy;
use crate::targets::mastodon::MastodonCredentials;
use crate::targets::twitter::TwitterCredentials;

const DEFAULT_TARGETS: &str = "twitter,mastodon";

/// Credentials for one enabled posting target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfig {
    Twitter(TwitterCredentials),
    Mastodon(MastodonCredentials),
}

impl TargetConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TargetConfig::Twitter(_) => "twitter",
            TargetConfig::Mastodon(_) => "mastodon",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub forecast_url: String,
    pub referer: String,
    pub location_label: String,
    pub retry: RetryPolicy,
    /// Timeout for each forecast attempt
    pub request_timeout: Duration,
    /// Deadline for each posting target
    pub publish_timeout: Duration,
    pub dry_run: bool,
    /// Posting targets in publish order
    pub targets: Vec<TargetConfig>,
}

impl Config {
    /// Loads `.env`, then the parameter store unless skipped, then validates.
    pub async fn load() -> Result<Self, PollenError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) => tracing::debug!("No .env file loaded: {}", e),
        }

        let env = |key: &str| std::env::var(key).ok();
        let remote = if flag(&env, "SKIP_SSM_PARAMETERS") {
            tracing::info!("Skipping parameter store lookup");
            HashMap::new()
        } else {
            remote_parameters(&env).await?
        };

        Self::from_lookup(|key| remote.get(key).cloned().or_else(|| env(key)))
    }

    /// Builds and validates a configuration from a key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PollenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut targets = Vec::new();

        let target_list = value(&lookup, "POLLEN_TARGETS").unwrap_or_else(|| DEFAULT_TARGETS.to_string());
        for name in target_list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let target = match name.to_ascii_lowercase().as_str() {
                "twitter" => TargetConfig::Twitter(TwitterCredentials {
                    consumer_key: required(&lookup, "TWITTER_CONSUMER_KEY", &mut missing),
                    consumer_secret: required(&lookup, "TWITTER_CONSUMER_SECRET", &mut missing),
                    access_token: required(&lookup, "TWITTER_ACCESS_TOKEN", &mut missing),
                    access_token_secret: required(&lookup, "TWITTER_ACCESS_TOKEN_SECRET", &mut missing),
                }),
                "mastodon" => TargetConfig::Mastodon(MastodonCredentials {
                    server_url: required(&lookup, "MASTODON_SERVER_URL", &mut missing),
                    access_token: required(&lookup, "MASTODON_ACCESS_TOKEN", &mut missing),
                }),
                other => {
                    return Err(PollenError::invalid_config(
                        "POLLEN_TARGETS",
                        format!("unknown target '{}', expected twitter or mastodon", other),
                    ))
                }
            };
            if targets.iter().any(|t: &TargetConfig| t.name() == target.name()) {
                return Err(PollenError::invalid_config(
                    "POLLEN_TARGETS",
                    format!("target '{}' listed twice", name),
                ));
            }
            targets.push(target);
        }

        if !missing.is_empty() {
            return Err(PollenError::ConfigurationMissing(missing));
        }

        let config = Self {
            forecast_url: value(&lookup, "POLLEN_FORECAST_URL").unwrap_or_else(|| FORECAST_URL.to_string()),
            referer: value(&lookup, "POLLEN_REFERER").unwrap_or_else(|| FORECAST_REFERER.to_string()),
            location_label: value(&lookup, "POLLEN_LOCATION_LABEL")
                .unwrap_or_else(|| DEFAULT_LOCATION_LABEL.to_string()),
            retry: RetryPolicy::new(
                parsed(&lookup, "POLLEN_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
                Duration::from_millis(parsed(&lookup, "POLLEN_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?),
            ),
            request_timeout: Duration::from_millis(parsed(
                &lookup,
                "POLLEN_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
            publish_timeout: Duration::from_secs(parsed(
                &lookup,
                "POLLEN_PUBLISH_TIMEOUT_SECS",
                DEFAULT_PUBLISH_TIMEOUT_SECS,
            )?),
            dry_run: flag(&lookup, "DRY_RUN"),
            targets,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PollenError> {
        ensure_http_url("POLLEN_FORECAST_URL", &self.forecast_url)?;
        for target in &self.targets {
            if let TargetConfig::Mastodon(creds) = target {
                ensure_http_url("MASTODON_SERVER_URL", &creds.server_url)?;
            }
        }

        if self.request_timeout.is_zero() {
            return Err(PollenError::invalid_config(
                "POLLEN_REQUEST_TIMEOUT_MS",
                "must be greater than zero",
            ));
        }
        if self.publish_timeout.is_zero() {
            return Err(PollenError::invalid_config(
                "POLLEN_PUBLISH_TIMEOUT_SECS",
                "must be greater than zero",
            ));
        }
        if self.retry.max_retries > 10 {
            return Err(PollenError::invalid_config("POLLEN_MAX_RETRIES", "cannot exceed 10"));
        }
        Ok(())
    }
}

/// Fetches the parameter store values for this deployment.
pub(crate) async fn remote_parameters<F>(lookup: &F) -> Result<HashMap<String, String>, PollenError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    let credentials = AwsCredentials {
        access_key_id: required(lookup, "AWS_ACCESS_KEY_ID", &mut missing),
        secret_access_key: required(lookup, "AWS_SECRET_ACCESS_KEY", &mut missing),
        session_token: value(lookup, "AWS_SESSION_TOKEN"),
    };
    if !missing.is_empty() {
        return Err(PollenError::ConfigurationMissing(missing));
    }

    let region = value(lookup, "AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
    let store = match value(lookup, "POLLEN_SSM_ENDPOINT") {
        Some(endpoint) => ParameterStore::new_with_endpoint(&region, credentials, &endpoint)?,
        None => ParameterStore::new(&region, credentials)?,
    };
    store.fetch_all(PARAMETER_PREFIX).await
}

fn value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str, missing: &mut Vec<String>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    value(lookup, key).unwrap_or_else(|| {
        missing.push(key.to_string());
        String::new()
    })
}

fn flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    value(lookup, key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, PollenError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| PollenError::invalid_config(key, format!("'{}': {}", raw, e))),
        None => Ok(default),
    }
}

fn ensure_http_url(key: &str, url: &str) -> Result<(), PollenError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(PollenError::invalid_config(key, "must be an HTTP or HTTPS URL"))
    }
}
