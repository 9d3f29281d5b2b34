//! Error types for a pollen bot run.

use thiserror::Error;

use crate::publisher::PublishResult;

#[derive(Error, Debug)]
pub enum PollenError {
    #[error("Missing required configuration: {}", .0.join(", "))]
    ConfigurationMissing(Vec<String>),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Parameter store error: {0}")]
    ParameterStore(String),

    #[error("Forecast request failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed forecast: expected at least 2 periods, got {periods}")]
    MalformedForecast { periods: usize },

    #[error("Publishing failed for {}", describe_failures(.0))]
    PublishFailure(Vec<PublishResult>),
}

impl PollenError {
    pub fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Whether the run stopped before anything could have been posted.
    pub fn is_fatal_before_publish(&self) -> bool {
        !matches!(self, Self::PublishFailure(_))
    }
}

fn describe_failures(failures: &[PublishResult]) -> String {
    failures
        .iter()
        .map(|result| {
            format!(
                "{} ({})",
                result.target,
                result.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configuration_lists_every_key() {
        let err = PollenError::ConfigurationMissing(vec![
            "MASTODON_SERVER_URL".to_string(),
            "TWITTER_CONSUMER_KEY".to_string(),
        ]);
        let message = err.to_string();
        assert!(message.contains("MASTODON_SERVER_URL"));
        assert!(message.contains("TWITTER_CONSUMER_KEY"));
    }

    #[test]
    fn test_publish_failure_names_targets() {
        let err = PollenError::PublishFailure(vec![
            PublishResult::failed("twitter", "403 Forbidden"),
            PublishResult::failed("mastodon", "timed out"),
        ]);
        assert_eq!(
            err.to_string(),
            "Publishing failed for twitter (403 Forbidden), mastodon (timed out)"
        );
        assert!(!err.is_fatal_before_publish());
    }

    #[test]
    fn test_malformed_forecast_is_fatal() {
        let err = PollenError::MalformedForecast { periods: 1 };
        assert!(err.to_string().contains("got 1"));
        assert!(err.is_fatal_before_publish());
    }
}
