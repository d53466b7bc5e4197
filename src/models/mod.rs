// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod group;
pub mod leaderboard;
pub mod record;
pub mod stats;
pub mod user;

pub use group::{GroupTag, NewRunningGroup, RunningGroup};
pub use leaderboard::LeaderBoardEntry;
pub use record::{NewRecord, Record};
pub use stats::{DailyRecordSummary, WeeklyRecordSummary};
pub use user::User;
