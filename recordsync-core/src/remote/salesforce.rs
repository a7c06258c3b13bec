//! Salesforce REST session: OAuth username-password login, sObject
//! Collections upsert, and token revocation.

use super::{RemoteSession, RemoteStore};
use crate::config::{SalesforceConfig, SalesforceCredentials};
use crate::error::RemoteError;
use crate::types::{CandidateRecord, UpsertOutcome};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// An authenticated Salesforce API session.
pub struct SalesforceSession {
    client: Client,
    login_url: String,
    instance_url: String,
    access_token: String,
    api_version: String,
}

impl std::fmt::Debug for SalesforceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceSession")
            .field("login_url", &self.login_url)
            .field("instance_url", &self.instance_url)
            .field("access_token", &"<redacted>")
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn build_client() -> Result<Client, RemoteError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| RemoteError::Connection {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

impl SalesforceSession {
    /// Log in with the OAuth 2.0 username-password flow.
    pub async fn login(
        config: &SalesforceConfig,
        credentials: &SalesforceCredentials,
    ) -> Result<Self, RemoteError> {
        info!(login_url = %credentials.login_url, "Logging in to Salesforce");
        let client = build_client()?;
        let url = format!("{}/services/oauth2/token", credentials.login_url);

        let response = client
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RemoteError::Connection {
                message: format!("Login request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RemoteError::Connection {
            message: format!("Failed to read login response: {e}"),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) if !err.error.is_empty() => {
                    format!("{}: {}", err.error, err.error_description)
                }
                _ => format!("HTTP {status}: {body}"),
            };
            return Err(RemoteError::Auth { message });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| RemoteError::Auth {
            message: format!("Unexpected token response: {e}"),
        })?;
        info!(instance_url = %token.instance_url, "Salesforce login successful");

        Ok(Self {
            client,
            login_url: credentials.login_url.clone(),
            instance_url: token.instance_url.trim_end_matches('/').to_string(),
            access_token: token.access_token,
            api_version: config.api_version.clone(),
        })
    }

    /// Wrap an access token obtained elsewhere.
    pub fn from_token(
        login_url: impl Into<String>,
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client()?,
            login_url: login_url.into().trim_end_matches('/').to_string(),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            api_version: api_version.into(),
        })
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn upsert_url(&self, object_type: &str, external_id_field: &str) -> String {
        format!(
            "{}/services/data/v{}/composite/sobjects/{}/{}",
            self.instance_url, self.api_version, object_type, external_id_field
        )
    }

    fn map_http_error(object: &str, status: StatusCode, body: String) -> RemoteError {
        match status {
            StatusCode::UNAUTHORIZED => RemoteError::Auth {
                message: format!("Session rejected while writing {object}: {body}"),
            },
            _ => RemoteError::Http {
                object: object.to_string(),
                status: status.as_u16(),
                body,
            },
        }
    }
}

/// sObject Collections request body. `allOrNone: false` lets valid records
/// in a batch commit even when others are rejected.
fn upsert_body(object_type: &str, records: &[CandidateRecord]) -> Value {
    let records: Vec<Value> = records
        .iter()
        .map(|record| {
            let mut fields = Map::with_capacity(record.fields().len() + 1);
            fields.insert("attributes".to_string(), json!({ "type": object_type }));
            for (name, value) in record.fields() {
                fields.insert(name.clone(), value.clone());
            }
            Value::Object(fields)
        })
        .collect();
    json!({ "allOrNone": false, "records": records })
}

#[async_trait]
impl RemoteStore for SalesforceSession {
    async fn upsert(
        &self,
        object_type: &str,
        external_id_field: &str,
        records: &[CandidateRecord],
    ) -> Result<Vec<UpsertOutcome>, RemoteError> {
        let url = self.upsert_url(object_type, external_id_field);
        debug!(url = %url, records = records.len(), "Sending upsert request");

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(&upsert_body(object_type, records))
            .send()
            .await
            .map_err(|e| RemoteError::Connection {
                message: format!("Upsert request to {object_type} failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RemoteError::Connection {
            message: format!("Failed to read upsert response: {e}"),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(object_type, status, body));
        }

        serde_json::from_str(&body).map_err(|e| RemoteError::MalformedResponse {
            object: object_type.to_string(),
            message: format!("Invalid JSON: {e}"),
        })
    }
}

#[async_trait]
impl RemoteSession for SalesforceSession {
    async fn logout(&self) -> Result<(), RemoteError> {
        let url = format!("{}/services/oauth2/revoke", self.login_url);
        let response = self
            .client
            .post(&url)
            .form(&[("token", self.access_token.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Logout {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Logout {
                message: format!("HTTP {status}: {body}"),
            });
        }
        info!("Logged out from Salesforce");
        Ok(())
    }
}
