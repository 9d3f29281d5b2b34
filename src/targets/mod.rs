//! Posting targets the bot knows how to publish to.

pub mod mastodon;
pub mod twitter;

pub use mastodon::MastodonTarget;
pub use twitter::TwitterTarget;

use anyhow::Result;
use reqwest::Response;

/// Turns a non-success response into an error carrying the status and body.
async fn ensure_success(target: &str, response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{} rejected the post with status {}: {}", target, status, body.trim())
}
