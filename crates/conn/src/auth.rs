// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Credential supply.

use std::future::Future;
use std::pin::Pin;

/// A credential returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
}

impl AuthToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        AuthToken {
            access_token: access_token.into(),
        }
    }
}

/// Error type for token fetches.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("token fetch failed: {0}")]
    Fetch(String),
}

/// Result of a token fetch. `None` means the client is unauthenticated.
pub type TokenResult = Result<Option<AuthToken>, AuthError>;

/// Supplies credentials to the connection.
pub trait AuthTokenProvider: Send + Sync {
    /// Fetches the current credential, bypassing any cache when
    /// `force_refresh` is set.
    ///
    /// Dropping the returned future abandons the fetch.
    fn get_token(
        &self,
        force_refresh: bool,
    ) -> Pin<Box<dyn Future<Output = TokenResult> + Send + '_>>;

    /// Called once the server has rejected the credential repeatedly.
    fn notify_for_invalid_token(&self);
}

/// Provider for a fixed credential (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        StaticTokenProvider { token }
    }
}

impl AuthTokenProvider for StaticTokenProvider {
    fn get_token(
        &self,
        _force_refresh: bool,
    ) -> Pin<Box<dyn Future<Output = TokenResult> + Send + '_>> {
        let token = self.token.clone().map(AuthToken::new);
        Box::pin(async move { Ok(token) })
    }

    fn notify_for_invalid_token(&self) {
        tracing::warn!(
            "the configured credential was rejected repeatedly; \
             check that it is valid for this database"
        );
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
