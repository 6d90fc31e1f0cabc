//! Access token sources for Drive requests.

use async_trait::async_trait;
use core_auth::TokenRefresher;

use crate::error::Result;

/// Supplies bearer tokens to the connector.
///
/// `invalidate` is called once the API rejected a token with 401; the next
/// `access_token` call must not return the rejected token again.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    async fn invalidate(&self);
}

#[async_trait]
impl AccessTokenSource for TokenRefresher {
    async fn access_token(&self) -> Result<String> {
        Ok(TokenRefresher::access_token(self).await?)
    }

    async fn invalidate(&self) {
        TokenRefresher::invalidate(self).await;
    }
}

/// A fixed token, for hosts that manage OAuth themselves.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    async fn invalidate(&self) {}
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}
