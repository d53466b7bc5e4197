// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (current-user resolution, security headers).

pub mod auth;
pub mod security;

pub use auth::{resolve_user, AuthUser, CurrentUser};
