//! OAuth2 client-credentials flow for Azure AD application tokens.

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{truncate, AuthError};

/// Bearer token for the directory API.
#[derive(Clone)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    pub fn secret(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// OAuth2 client for app-only Azure AD authentication.
pub struct OAuth2Client {
    token_url: String,
    client_id: String,
    client_secret: Zeroizing<String>,
    scope: String,
    http_client: reqwest::Client,
}

impl OAuth2Client {
    /// Create a new OAuth2 client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http.timeout())
            .connect_timeout(config.http.connect_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            token_url: config.token_url(),
            client_id: config.identity.client_id.clone(),
            client_secret: config.identity.client_secret.clone(),
            scope: config.api.graph_scope.clone(),
            http_client,
        })
    }

    /// Acquire an application token for Microsoft Graph.
    pub async fn acquire_token(&self) -> Result<AccessToken, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];

        debug!("Requesting client-credentials token");

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(details) => AuthError::Rejected {
                    error: details.error,
                    description: details.error_description.unwrap_or_default(),
                    correlation_id: details.correlation_id,
                },
                Err(_) => AuthError::Rejected {
                    error: format!("HTTP {}", status.as_u16()),
                    description: truncate(&body, 800),
                    correlation_id: None,
                },
            };
            error!("Token acquisition failed: HTTP {}", status.as_u16());
            return Err(err);
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        debug!(
            "Acquired {} token valid for {}s",
            token_response.token_type, token_response.expires_in
        );

        Ok(AccessToken::new(token_response.access_token))
    }
}

/// Token response from Azure AD.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: u64,
}

/// Error body returned by the token endpoint (AADSTS codes live in the description).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
    correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(login_base_url: &str) -> Config {
        let login = login_base_url.to_string();
        Config::load_with(move |name| match name {
            "TENANT_ID" => Some("tenant-1".into()),
            "CLIENT_ID" => Some("client-1".into()),
            "CLIENT_SECRET" => Some("s3cret".into()),
            "LOGIN_BASE_URL" => Some(login.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_acquire_token_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_secret=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "eyJ0eXAi",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuth2Client::new(&test_config(&server.uri())).unwrap();
        let token = client.acquire_token().await.unwrap();

        assert_eq!(token.secret(), "eyJ0eXAi");
        assert_eq!(format!("{:?}", token), "AccessToken(<redacted>)");
    }

    #[tokio::test]
    async fn test_acquire_token_reports_aadsts_details() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided.",
                "correlation_id": "c0ffee"
            })))
            .mount(&server)
            .await;

        let client = OAuth2Client::new(&test_config(&server.uri())).unwrap();
        let err = client.acquire_token().await.unwrap_err();

        match err {
            AuthError::Rejected {
                error,
                description,
                correlation_id,
            } => {
                assert_eq!(error, "invalid_client");
                assert!(description.starts_with("AADSTS7000215"));
                assert_eq!(correlation_id.as_deref(), Some("c0ffee"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
