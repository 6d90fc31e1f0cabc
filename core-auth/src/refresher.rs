//! Cached access token with on-demand refresh.

use crate::error::Result;
use crate::oauth::OAuthFlowManager;
use crate::types::OAuthTokens;
use bridge_traits::Clock;
use core_async::sync::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Seconds before expiry at which a cached token is considered stale.
pub const REFRESH_MARGIN_SECS: i64 = 60;

struct TokenState {
    refresh_token: String,
    cached: Option<OAuthTokens>,
}

/// Hands out a valid access token, refreshing it when it is about to expire.
///
/// Concurrent callers share one in-flight refresh: the state lock is held
/// across the token request, so a burst of uploads triggers a single grant.
pub struct TokenRefresher {
    flow: OAuthFlowManager,
    clock: Arc<dyn Clock>,
    state: Mutex<TokenState>,
}

impl TokenRefresher {
    pub fn new(flow: OAuthFlowManager, clock: Arc<dyn Clock>, refresh_token: impl Into<String>) -> Self {
        Self {
            flow,
            clock,
            state: Mutex::new(TokenState {
                refresh_token: refresh_token.into(),
                cached: None,
            }),
        }
    }

    /// Returns a cached access token, or refreshes it first when it expires
    /// within [`REFRESH_MARGIN_SECS`].
    pub async fn access_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        if let Some(tokens) = &state.cached {
            if !tokens.is_expired_at(now, REFRESH_MARGIN_SECS) {
                return Ok(tokens.access_token.clone());
            }
            debug!(expires_in = tokens.expires_in_at(now), "Access token stale");
        }

        let tokens = self.flow.refresh_access_token(&state.refresh_token).await?;
        let access_token = tokens.access_token.clone();
        state.refresh_token = tokens.refresh_token.clone();
        state.cached = Some(tokens);
        Ok(access_token)
    }

    /// Drops the cached access token, e.g. after the API answered 401.
    pub async fn invalidate(&self) {
        self.state.lock().await.cached = None;
    }
}
