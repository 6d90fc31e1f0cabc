//! # Authentication Module
//!
//! OAuth 2.0 access tokens for the Drive storage backend.
//!
//! The backend runs with a long-lived refresh token provisioned out of band,
//! so there is no interactive authorization flow here: only refresh-token
//! grants and an in-memory cache that keeps the access token until shortly
//! before it expires.

pub mod error;
pub mod oauth;
pub mod refresher;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager};
pub use refresher::TokenRefresher;
pub use types::OAuthTokens;
