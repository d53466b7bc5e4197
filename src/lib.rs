// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! RunMate: running group backend
//!
//! This crate provides the backend API for creating running groups,
//! joining and leaving them, and the scheduled jobs that retire finished
//! groups and open the daily quick-match group.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::GroupService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub groups: GroupService,
}
