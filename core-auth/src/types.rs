use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth 2.0 token set.
///
/// Tokens must never be logged; the `Debug` implementation redacts them.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use core_auth::OAuthTokens;
///
/// let now = Utc::now();
/// let tokens = OAuthTokens::issued_at("ya29.a0".into(), "1//0g".into(), 3600, now);
///
/// assert!(!tokens.is_expired_at(now, 60));
/// assert!(tokens.is_expired_at(now + Duration::seconds(3550), 60));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    pub refresh_token: String,
    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Build a token set issued at `now`, valid for `expires_in` seconds.
    pub fn issued_at(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    /// `true` if the access token is expired at `now`, or will be within
    /// `buffer_seconds`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now + Duration::seconds(buffer_seconds) >= self.expires_at
    }

    /// Seconds until expiry at `now` (negative once expired).
    pub fn expires_in_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_with_buffer() {
        let tokens = OAuthTokens::issued_at("a".into(), "r".into(), 3600, noon());

        assert!(!tokens.is_expired_at(noon(), 60));
        assert!(!tokens.is_expired_at(noon() + Duration::seconds(3539), 60));
        assert!(tokens.is_expired_at(noon() + Duration::seconds(3540), 60));
        assert!(tokens.is_expired_at(noon() + Duration::seconds(4000), 0));
    }

    #[test]
    fn test_expires_in() {
        let tokens = OAuthTokens::issued_at("a".into(), "r".into(), 120, noon());
        assert_eq!(tokens.expires_in_at(noon() + Duration::seconds(20)), 100);
        assert_eq!(tokens.expires_in_at(noon() + Duration::seconds(200)), -80);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = OAuthTokens::issued_at("ya29.secret".into(), "1//secret".into(), 60, noon());
        let debug = format!("{:?}", tokens);

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("ya29.secret"));
        assert!(!debug.contains("1//secret"));
    }
}
