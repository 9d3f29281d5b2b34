use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::ensure_success;
use crate::constants::USER_AGENT;
use crate::publisher::PublishTarget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MastodonCredentials {
    pub server_url: String,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
    status: &'a str,
}

/// Posts statuses to a Mastodon server with an application access token
pub struct MastodonTarget {
    client: Client,
    credentials: MastodonCredentials,
}

impl MastodonTarget {
    pub fn new(credentials: MastodonCredentials) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn statuses_url(&self) -> String {
        format!(
            "{}/api/v1/statuses",
            self.credentials.server_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PublishTarget for MastodonTarget {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn post(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(self.statuses_url())
            .bearer_auth(&self.credentials.access_token)
            .json(&NewStatus { status: message })
            .send()
            .await
            .context("Failed to reach Mastodon server")?;

        ensure_success(self.name(), response).await
    }
}
