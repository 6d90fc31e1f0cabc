//! OAuth 2.0 refresh-token grant (RFC 6749 §6).
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::{HttpClient, SystemClock};
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: Some("your-client-secret".to_string()),
//!     token_url: "https://oauth2.googleapis.com/token".to_string(),
//! };
//!
//! let manager = OAuthFlowManager::new(config, http_client, Arc::new(SystemClock));
//! let tokens = manager.refresh_access_token("1//0g...").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::Clock;
use bytes::Bytes;
use core_async::time::{sleep, Duration};
use core_runtime::config::DriveSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Attempts made against the token endpoint before giving up on 5xx.
const MAX_ATTEMPTS: u32 = 3;

/// OAuth 2.0 client configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Optional for public clients
    pub client_secret: Option<String>,
    /// Token endpoint URL
    pub token_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl From<&DriveSettings> for OAuthConfig {
    fn from(settings: &DriveSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: Some(settings.client_secret.clone()),
            token_url: settings.token_url.clone(),
        }
    }
}

/// Performs token requests against the provider's token endpoint.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http_client,
            clock,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// Server errors (5xx) are retried with exponential backoff up to three
    /// attempts; client errors (4xx) mean the grant is invalid or revoked and
    /// fail immediately. Providers that do not rotate refresh tokens omit one
    /// from the response, in which case the one passed in is kept.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenRefreshFailed`] on rejection or exhausted retries,
    /// [`AuthError::NetworkError`] on transport failure,
    /// [`AuthError::InvalidResponse`] when the body is not a token response.
    #[instrument(skip(self, refresh_token), fields(token_url = %self.config.token_url))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", self.config.client_id.as_str());
        if let Some(client_secret) = &self.config.client_secret {
            params.insert("client_secret", client_secret.as_str());
        }

        let encoded_body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;
        let body = Bytes::from(encoded_body);

        let mut attempts = 0;
        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone());

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| AuthError::NetworkError(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response
                    .json()
                    .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

                tracing::info!(
                    expires_in = token_response.expires_in,
                    "Refreshed access token"
                );

                return Ok(OAuthTokens::issued_at(
                    token_response.access_token,
                    token_response
                        .refresh_token
                        .unwrap_or_else(|| refresh_token.to_string()),
                    token_response.expires_in,
                    self.clock.now(),
                ));
            }

            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if response.is_client_error() {
                warn!(status, error = %error_body, "Token refresh rejected");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= MAX_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}
