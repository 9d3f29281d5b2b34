//! Twitter (X) posting via the v2 tweets endpoint, signed with OAuth 1.0a
//! user-context credentials.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Serialize;
use sha1::Sha1;

use super::ensure_success;
use crate::constants::USER_AGENT;
use crate::publisher::PublishTarget;

const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// RFC 3986 unreserved characters stay as they are, everything else is escaped
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Serialize)]
struct NewTweet<'a> {
    text: &'a str,
}

pub struct TwitterTarget {
    client: Client,
    credentials: TwitterCredentials,
    base_url: String,
}

impl TwitterTarget {
    pub fn new(credentials: TwitterCredentials) -> Result<Self> {
        Self::new_with_base_url(credentials, TWITTER_API_BASE)
    }

    pub fn new_with_base_url(credentials: TwitterCredentials, base_url: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds the `Authorization: OAuth ...` header for a request with no
    /// form or query parameters.
    fn authorization(&self, method: &str, url: &str, nonce: &str, timestamp: &str) -> Result<String> {
        let creds = &self.credentials;
        let mut oauth = vec![
            ("oauth_consumer_key", creds.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", creds.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let base = signature_base(method, url, &oauth);
        let signature = sign(&base, &creds.consumer_secret, &creds.access_token_secret)?;
        oauth.push(("oauth_signature", signature.as_str()));
        oauth.sort_unstable();

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", fields))
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// OAuth 1.0a signature base string over every signed parameter
fn signature_base(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> =
        params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&normalized)
    )
}

/// HMAC-SHA1 of the base string, base64 encoded
fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid OAuth signing key: {}", e))?;
    mac.update(base.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl PublishTarget for TwitterTarget {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn post(&self, message: &str) -> Result<()> {
        let url = format!("{}/2/tweets", self.base_url);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let authorization = self.authorization("POST", &url, &nonce(), &timestamp)?;

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .json(&NewTweet { text: message })
            .send()
            .await
            .context("Failed to reach Twitter API")?;

        ensure_success(self.name(), response).await
    }
}
