// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT current-user resolution.
//!
//! Tokens are issued by the account service; this crate only verifies them.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "runmate_token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: u64,
}

/// The request's user, if any. Inserted by [`resolve_user`] on every API request.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthUser>);

impl CurrentUser {
    pub fn user(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }
}

fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    // Try cookie first, then header
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Decode and validate a session token.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Option<AuthUser> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    let user_id = token_data.claims.sub.parse().ok()?;
    Some(AuthUser { user_id })
}

/// Middleware that resolves the optional current user.
///
/// Missing or invalid tokens are not rejected here; operations that need a
/// user fail with `Unauthorized` themselves.
pub async fn resolve_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let user = extract_token(&jar, &request)
        .and_then(|token| verify_jwt(&token, &state.config.jwt_signing_key));

    if user.is_none() {
        tracing::trace!(path = %request.uri().path(), "Anonymous request");
    }

    request.extensions_mut().insert(CurrentUser(user));

    next.run(request).await
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: u64, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
