// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Credential inspection.
//!
//! Claims are read without validating the signature; the server does that.
//! The client only needs them to pick the auth action and the backoff ceiling.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

/// Length of the legacy database secrets, which grant admin access.
const LEGACY_SECRET_LEN: usize = 40;

/// Decodes the claims segment of a JWT, if the credential is one.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let mut parts = token.split('.');
    let (_header, claims, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(claims.trim_end_matches('=')).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// True for a JWT whose claims carry an issued-at time.
pub fn is_valid_format(token: &str) -> bool {
    decode_claims(token).is_some_and(|claims| claims.contains_key("iat"))
}

/// True for a JWT carrying `admin: true`.
pub fn is_admin(token: &str) -> bool {
    decode_claims(token).is_some_and(|claims| claims.get("admin") == Some(&Value::Bool(true)))
}

pub fn is_legacy_secret(token: &str) -> bool {
    token.len() == LEGACY_SECRET_LEN
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
