// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`RunningStore`] is the persistence contract used by the group lifecycle.
//! Two backends implement it: [`FirestoreDb`] for production and
//! [`MemoryStore`] for local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    GroupTag, LeaderBoardEntry, NewRecord, NewRunningGroup, Record, RunningGroup, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const RUNNING_GROUPS: &str = "running_groups";
    pub const RECORDS: &str = "records";
    pub const LEADERBOARD: &str = "leaderboard";
}

/// Writes produced by a successful participation commit.
#[derive(Debug, Clone)]
pub struct Participation {
    pub record: Record,
    pub entry: LeaderBoardEntry,
}

/// Persistence for groups, records, leaderboard entries and users.
///
/// `commit_participation` and `commit_cancellation` are atomic: either every
/// write in the unit is applied or none is.
#[async_trait]
pub trait RunningStore: Send + Sync {
    // ─── Running Groups ──────────────────────────────────────────

    /// Persist a new group and return it with its assigned ID.
    async fn insert_group(&self, group: NewRunningGroup) -> Result<RunningGroup, AppError>;

    async fn get_group(&self, group_id: u64) -> Result<Option<RunningGroup>, AppError>;

    /// Overwrite an existing group.
    async fn update_group(&self, group: &RunningGroup) -> Result<(), AppError>;

    /// Groups with `start_time > after`, ordered by ID.
    async fn groups_starting_after(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError>;

    /// Active groups with `end_time <= at`, ordered by ID.
    async fn active_groups_ended_by(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError>;

    /// Active groups with the given tag, ordered by ID.
    async fn active_groups_with_tag(&self, tag: GroupTag)
        -> Result<Vec<RunningGroup>, AppError>;

    /// Upcoming groups whose title contains `search_word`, optionally
    /// restricted to `tag`, ordered by ID.
    async fn search_groups(
        &self,
        now: DateTime<Utc>,
        tag: Option<GroupTag>,
        search_word: &str,
    ) -> Result<Vec<RunningGroup>, AppError> {
        Ok(self
            .groups_starting_after(now)
            .await?
            .into_iter()
            .filter(|g| g.matches_filter(now, tag, search_word))
            .collect())
    }

    // ─── Records & Leaderboard ───────────────────────────────────

    async fn get_record(&self, record_id: u64) -> Result<Option<Record>, AppError>;

    async fn records_for_user(&self, user_id: u64) -> Result<Vec<Record>, AppError>;

    async fn leaderboard_for_group(&self, group_id: u64)
        -> Result<Vec<LeaderBoardEntry>, AppError>;

    /// The entry linking `record_id` to `group_id`, if that participation exists.
    async fn get_leaderboard_entry(
        &self,
        group_id: u64,
        record_id: u64,
    ) -> Result<Option<LeaderBoardEntry>, AppError>;

    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError>;

    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    // ─── Atomic Units ────────────────────────────────────────────

    /// Atomically create a record and its leaderboard entry for `group_id`,
    /// and overwrite `updated_group` when one is given.
    async fn commit_participation(
        &self,
        group_id: u64,
        updated_group: Option<&RunningGroup>,
        record: NewRecord,
    ) -> Result<Participation, AppError>;

    /// Atomically overwrite `updated_group`, delete the leaderboard entry for
    /// (group, record) and delete the record. Fails with `NotFound` when the
    /// record does not participate in that group.
    async fn commit_cancellation(
        &self,
        updated_group: &RunningGroup,
        record_id: u64,
    ) -> Result<(), AppError>;
}
