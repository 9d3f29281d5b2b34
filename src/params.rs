//! Remote configuration from AWS Systems Manager Parameter Store.
//!
//! Every parameter under a path prefix is fetched with decryption and keyed
//! by the last segment of its name, so `/astoria-pollen/MASTODON_ACCESS_TOKEN`
//! becomes `MASTODON_ACCESS_TOKEN`. Requests are signed with AWS Signature
//! Version 4 using the usual `AWS_*` credential variables.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

use crate::constants::{PARAMETER_STORE_TIMEOUT_SECS, USER_AGENT};
use crate::error::PollenError;

const SERVICE: &str = "ssm";
const TARGET: &str = "AmazonSSM.GetParametersByPath";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetParametersByPathRequest<'a> {
    path: &'a str,
    with_decryption: bool,
    recursive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct GetParametersByPathResponse {
    parameters: Vec<Parameter>,
    next_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Parameter {
    name: String,
    value: String,
}

pub struct ParameterStore {
    client: Client,
    endpoint: Url,
    region: String,
    credentials: AwsCredentials,
}

impl ParameterStore {
    pub fn new(region: &str, credentials: AwsCredentials) -> Result<Self, PollenError> {
        let endpoint = format!("https://ssm.{}.amazonaws.com/", region);
        Self::new_with_endpoint(region, credentials, &endpoint)
    }

    pub fn new_with_endpoint(
        region: &str,
        credentials: AwsCredentials,
        endpoint: &str,
    ) -> Result<Self, PollenError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PollenError::invalid_config("POLLEN_SSM_ENDPOINT", e.to_string()))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(PARAMETER_STORE_TIMEOUT_SECS))
            .build()
            .map_err(|e| PollenError::ParameterStore(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            region: region.to_string(),
            credentials,
        })
    }

    /// Fetches every parameter under `prefix`, following pagination.
    pub async fn fetch_all(&self, prefix: &str) -> Result<HashMap<String, String>, PollenError> {
        let mut values = HashMap::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self.fetch_page(prefix, next_token.as_deref()).await?;
            for param in page.parameters {
                let key = param.name.rsplit('/').next().unwrap_or_default().to_string();
                if !key.is_empty() {
                    values.insert(key, param.value);
                }
            }

            match page.next_token {
                Some(token) if next_token.as_deref() == Some(token.as_str()) => {
                    tracing::warn!("Parameter store repeated page token, stopping pagination");
                    break;
                }
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        tracing::info!("Loaded {} parameter(s) from {}", values.len(), prefix);
        Ok(values)
    }

    async fn fetch_page(
        &self,
        prefix: &str,
        next_token: Option<&str>,
    ) -> Result<GetParametersByPathResponse, PollenError> {
        let body = serde_json::to_string(&GetParametersByPathRequest {
            path: prefix,
            with_decryption: true,
            recursive: false,
            next_token,
        })
        .map_err(|e| PollenError::ParameterStore(e.to_string()))?;

        let headers = self.signed_headers(&body, Utc::now())?;
        let mut request = self.client.post(self.endpoint.clone()).body(body);
        for (name, value) in headers {
            // reqwest derives Host from the URL itself
            if name != "host" {
                request = request.header(name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| PollenError::ParameterStore(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PollenError::ParameterStore(e.to_string()))?;
        if !status.is_success() {
            return Err(PollenError::ParameterStore(format!(
                "request failed with status {}: {}",
                status,
                text.trim()
            )));
        }

        serde_json::from_str(&text).map_err(|e| PollenError::ParameterStore(e.to_string()))
    }

    fn host(&self) -> Result<String, PollenError> {
        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| PollenError::invalid_config("POLLEN_SSM_ENDPOINT", "missing host"))?;
        Ok(match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// SigV4 signed headers sorted by name, followed by `authorization`.
    fn signed_headers(
        &self,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, PollenError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host()?),
            ("x-amz-date".to_string(), amz_date.clone()),
            ("x-amz-target".to_string(), TARGET.to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_header_names = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "POST\n{}\n\n{}\n{}\n{}",
            self.endpoint.path(),
            canonical_headers,
            signed_header_names,
            hex::encode(Sha256::digest(body.as_bytes()))
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), &date)?;
        let k_region = hmac_sha256(&k_date, &self.region)?;
        let k_service = hmac_sha256(&k_region, SERVICE)?;
        let k_signing = hmac_sha256(&k_service, "aws4_request")?;
        let signature = hex::encode(hmac_sha256(&k_signing, &string_to_sign)?);

        headers.push((
            "authorization".to_string(),
            format!(
                "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
                self.credentials.access_key_id, scope, signed_header_names, signature
            ),
        ));
        Ok(headers)
    }
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>, PollenError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| PollenError::ParameterStore(format!("invalid signing key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(session_token: Option<&str>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: session_token.map(str::to_string),
        }
    }

    fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> &'a str {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_default_endpoint_uses_region() {
        let store = ParameterStore::new("eu-west-1", credentials(None)).unwrap();
        assert_eq!(store.host().unwrap(), "ssm.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_signed_headers_shape() {
        let store = ParameterStore::new("us-east-1", credentials(Some("session"))).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 3, 12, 30, 0).unwrap();
        let headers = store.signed_headers("{}", now).unwrap();

        assert_eq!(header_value(&headers, "x-amz-date"), "20260603T123000Z");
        assert_eq!(header_value(&headers, "x-amz-security-token"), "session");

        let authorization = header_value(&headers, "authorization");
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260603/us-east-1/ssm/aws4_request, "
        ));
        assert!(authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target, "
        ));
        let signature = authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_is_deterministic_and_body_bound() {
        let store = ParameterStore::new("us-east-1", credentials(None)).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 3, 12, 30, 0).unwrap();

        let a = store.signed_headers(r#"{"Path":"/a"}"#, now).unwrap();
        let b = store.signed_headers(r#"{"Path":"/a"}"#, now).unwrap();
        let c = store.signed_headers(r#"{"Path":"/b"}"#, now).unwrap();

        assert_eq!(header_value(&a, "authorization"), header_value(&b, "authorization"));
        assert_ne!(header_value(&a, "authorization"), header_value(&c, "authorization"));
    }

    #[test]
    fn test_signature_known_answer() {
        let store = ParameterStore::new("us-east-1", credentials(None)).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 3, 12, 30, 0).unwrap();
        let headers = store.signed_headers(r#"{"Path":"/a"}"#, now).unwrap();

        assert_eq!(
            header_value(&headers, "authorization"),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260603/us-east-1/ssm/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date;x-amz-target, \
             Signature=4ea1afb12b22addb7e3993306a05074413cc396336373ccab12772f1a4649c1f"
        );

        let headers = ParameterStore::new("us-east-1", credentials(Some("session")))
            .unwrap()
            .signed_headers("{}", now)
            .unwrap();
        assert!(header_value(&headers, "authorization").ends_with(
            "Signature=60447e711146f2302f004c05844c76ef8c11c48bc16b94383dfa485bbac0f49d"
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_follows_pagination() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", TARGET))
            .and(header_regex("authorization", "^AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"))
            .and(body_partial_json(serde_json::json!({"NextToken": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Parameters": [
                    {"Name": "/astoria-pollen/MASTODON_ACCESS_TOKEN", "Value": "secret-token"}
                ]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({
                "Path": "/astoria-pollen",
                "WithDecryption": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Parameters": [
                    {"Name": "/astoria-pollen/MASTODON_SERVER_URL", "Value": "https://mastodon.example"},
                    {"Name": "/astoria-pollen/DRY_RUN", "Value": "true"}
                ],
                "NextToken": "page-2"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store =
            ParameterStore::new_with_endpoint("us-east-1", credentials(None), &mock_server.uri())
                .unwrap();
        let values = store.fetch_all("/astoria-pollen").await.unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values["MASTODON_SERVER_URL"], "https://mastodon.example");
        assert_eq!(values["MASTODON_ACCESS_TOKEN"], "secret-token");
        assert_eq!(values["DRY_RUN"], "true");
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_repeated_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Parameters": [
                    {"Name": "/astoria-pollen/DRY_RUN", "Value": "true"}
                ],
                "NextToken": "stuck"
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let store =
            ParameterStore::new_with_endpoint("us-east-1", credentials(None), &mock_server.uri())
                .unwrap();
        let values = store.fetch_all("/astoria-pollen").await.unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values["DRY_RUN"], "true");
    }

    #[tokio::test]
    async fn test_fetch_all_surfaces_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("AccessDeniedException"))
            .mount(&mock_server)
            .await;

        let store =
            ParameterStore::new_with_endpoint("us-east-1", credentials(None), &mock_server.uri())
                .unwrap();
        let err = store.fetch_all("/astoria-pollen").await.unwrap_err();
        assert!(matches!(err, PollenError::ParameterStore(_)));
        assert!(err.to_string().contains("AccessDeniedException"));
    }
}
