// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 token endpoint client.
//!
//! Two grants are used against `{authority}{tenant}/oauth2/token`:
//!
//! - `password`: verifies an end user's credentials (authentication)
//! - `client_credentials`: obtains the service token used for directory
//!   queries (authorization)
//!
//! The endpoint is a trait so the bridge and the token cache can be driven
//! by a fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde::{Deserialize, Deserializer};
use tracing::debug;
use uuid::Uuid;

use crate::config::ConfigError;

/// Request timeout applied to every outbound call.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth error code meaning the submitted credentials were rejected.
const INVALID_GRANT: &str = "invalid_grant";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenEndpointError {
    /// Provider rejected the grant (wrong username or password).
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("token endpoint returned {status} {error}: {description}")]
    Provider {
        status: u16,
        error: String,
        description: String,
    },

    #[error("token request failed: {0}")]
    Transport(String),

    #[error("token response was invalid: {0}")]
    InvalidResponse(String),
}

/// Resource-owner-password grant parameters.
pub struct PasswordGrant<'a> {
    pub client_id: &'a str,
    pub resource: &'a str,
    /// Fully qualified identity, `username@tenant`.
    pub username: &'a str,
    pub password: &'a str,
}

/// Client-credentials grant parameters.
#[derive(Clone)]
pub struct ClientCredentialsGrant {
    pub client_id: String,
    pub client_secret: String,
    pub resource: String,
}

impl std::fmt::Debug for ClientCredentialsGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsGrant")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource", &self.resource)
            .finish()
    }
}

/// Token issued by the endpoint.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, when the provider reported one.
    pub expires_in_secs: Option<i64>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn acquire_token_by_password(
        &self,
        grant: &PasswordGrant<'_>,
    ) -> Result<TokenGrant, TokenEndpointError>;

    async fn acquire_token_by_client_credentials(
        &self,
        grant: &ClientCredentialsGrant,
    ) -> Result<TokenGrant, TokenEndpointError>;
}

/// Shared HTTP client for the token endpoint and the directory API.
pub fn build_http_client() -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// [`TokenEndpoint`] speaking form-encoded OAuth2 over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    token_url: String,
    http: Client,
}

impl HttpTokenEndpoint {
    pub fn new(token_url: impl Into<String>, http: Client) -> Self {
        Self {
            token_url: token_url.into(),
            http,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn request_token(
        &self,
        grant_type: &'static str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, TokenEndpointError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, grant_type, "requesting token");

        let response = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .header("client-request-id", request_id.to_string())
            .header("return-client-request-id", "true")
            .form(form)
            .send()
            .await
            .map_err(|e| TokenEndpointError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TokenEndpointError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            debug!(%request_id, grant_type, status = status.as_u16(), "token request rejected");
            return Err(map_error_response(status.as_u16(), &body));
        }

        let token_response: OAuthTokenResponse = serde_json::from_str(&body)
            .map_err(|e| TokenEndpointError::InvalidResponse(e.to_string()))?;

        if token_response.access_token.trim().is_empty() {
            return Err(TokenEndpointError::InvalidResponse(
                "token response did not include access_token".to_string(),
            ));
        }

        Ok(TokenGrant {
            access_token: token_response.access_token,
            expires_in_secs: token_response.expires_in,
        })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn acquire_token_by_password(
        &self,
        grant: &PasswordGrant<'_>,
    ) -> Result<TokenGrant, TokenEndpointError> {
        let form = [
            ("grant_type", "password"),
            ("resource", grant.resource),
            ("client_id", grant.client_id),
            ("username", grant.username),
            ("password", grant.password),
        ];
        self.request_token("password", &form).await
    }

    async fn acquire_token_by_client_credentials(
        &self,
        grant: &ClientCredentialsGrant,
    ) -> Result<TokenGrant, TokenEndpointError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", grant.client_id.as_str()),
            ("client_secret", grant.client_secret.as_str()),
            ("resource", grant.resource.as_str()),
        ];
        self.request_token("client_credentials", &form).await
    }
}

fn map_error_response(status: u16, body: &str) -> TokenEndpointError {
    match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(err) if err.error == INVALID_GRANT => {
            TokenEndpointError::InvalidGrant(err.error_description.unwrap_or_default())
        }
        Ok(err) => TokenEndpointError::Provider {
            status,
            error: err.error,
            description: err.error_description.unwrap_or_default(),
        },
        Err(_) => TokenEndpointError::Provider {
            status,
            error: "unknown_error".to_string(),
            description: body.to_string(),
        },
    }
}

/// Accepts `3599` as well as `"3599"`; the provider sends the latter.
fn deserialize_lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(i64),
        Text(String),
    }

    match Option::<Lenient>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Number(n)) => Ok(Some(n)),
        Some(Lenient::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid integer: {text}"))),
    }
}
