// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[tokio::test]
async fn static_provider_returns_its_token() {
    let provider = StaticTokenProvider::new(Some("secret".into()));
    let token = provider.get_token(false).await.unwrap();
    assert_eq!(token, Some(AuthToken::new("secret")));
    let token = provider.get_token(true).await.unwrap();
    assert_eq!(token, Some(AuthToken::new("secret")));
}

#[tokio::test]
async fn static_provider_without_token_is_unauthenticated() {
    let provider = StaticTokenProvider::default();
    assert_eq!(provider.get_token(false).await.unwrap(), None);
}
