// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store used for local development and tests.
//!
//! All tables sit behind a single `RwLock`, so each atomic unit is applied
//! under one write guard after every precondition has been checked.

use crate::db::{Participation, RunningStore};
use crate::error::AppError;
use crate::models::leaderboard::INITIAL_RANKING;
use crate::models::{
    GroupTag, LeaderBoardEntry, NewRecord, NewRunningGroup, Record, RunningGroup, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    groups: BTreeMap<u64, RunningGroup>,
    records: BTreeMap<u64, Record>,
    /// Keyed by (group_id, record_id)
    leaderboard: BTreeMap<(u64, u64), LeaderBoardEntry>,
    users: HashMap<u64, User>,
    last_group_id: u64,
    last_record_id: u64,
    last_entry_id: u64,
}

/// In-memory [`RunningStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent atomic commit fail before applying any write.
    ///
    /// Lets tests observe that a failed unit leaves no partial state.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of stored records (test helper).
    pub async fn record_count(&self) -> usize {
        self.tables.read().await.records.len()
    }

    /// Number of stored leaderboard entries (test helper).
    pub async fn leaderboard_count(&self) -> usize {
        self.tables.read().await.leaderboard.len()
    }

    /// Number of stored groups (test helper).
    pub async fn group_count(&self) -> usize {
        self.tables.read().await.groups.len()
    }

    fn check_commit_allowed(&self) -> Result<(), AppError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "Commit rejected (injected failure)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RunningStore for MemoryStore {
    async fn insert_group(&self, group: NewRunningGroup) -> Result<RunningGroup, AppError> {
        let mut tables = self.tables.write().await;
        tables.last_group_id += 1;
        let group = group.with_id(tables.last_group_id);
        tables.groups.insert(group.group_id, group.clone());
        Ok(group)
    }

    async fn get_group(&self, group_id: u64) -> Result<Option<RunningGroup>, AppError> {
        Ok(self.tables.read().await.groups.get(&group_id).cloned())
    }

    async fn update_group(&self, group: &RunningGroup) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.groups.get_mut(&group.group_id) {
            Some(stored) => {
                *stored = group.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "Running group {}",
                group.group_id
            ))),
        }
    }

    async fn groups_starting_after(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .groups
            .values()
            .filter(|g| g.is_upcoming(after))
            .cloned()
            .collect())
    }

    async fn active_groups_ended_by(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .groups
            .values()
            .filter(|g| g.active && g.has_ended(at))
            .cloned()
            .collect())
    }

    async fn active_groups_with_tag(
        &self,
        tag: GroupTag,
    ) -> Result<Vec<RunningGroup>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .groups
            .values()
            .filter(|g| g.active && g.tag == tag)
            .cloned()
            .collect())
    }

    async fn get_record(&self, record_id: u64) -> Result<Option<Record>, AppError> {
        Ok(self.tables.read().await.records.get(&record_id).cloned())
    }

    async fn records_for_user(&self, user_id: u64) -> Result<Vec<Record>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn leaderboard_for_group(
        &self,
        group_id: u64,
    ) -> Result<Vec<LeaderBoardEntry>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .leaderboard
            .range((group_id, 0)..=(group_id, u64::MAX))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn get_leaderboard_entry(
        &self,
        group_id: u64,
        record_id: u64,
    ) -> Result<Option<LeaderBoardEntry>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .leaderboard
            .get(&(group_id, record_id))
            .cloned())
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .users
            .insert(user.user_id, user.clone());
        Ok(())
    }

    async fn commit_participation(
        &self,
        group_id: u64,
        updated_group: Option<&RunningGroup>,
        record: NewRecord,
    ) -> Result<Participation, AppError> {
        let mut tables = self.tables.write().await;

        // Preconditions first: nothing below may fail.
        if !tables.groups.contains_key(&group_id) {
            return Err(AppError::NotFound(format!("Running group {}", group_id)));
        }
        if let Some(group) = updated_group {
            if group.group_id != group_id {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Participation for group {} carried update for group {}",
                    group_id,
                    group.group_id
                )));
            }
        }
        self.check_commit_allowed()?;

        tables.last_record_id += 1;
        let record = record.with_id(tables.last_record_id);
        tables.last_entry_id += 1;
        let entry = LeaderBoardEntry {
            entry_id: tables.last_entry_id,
            group_id,
            record_id: record.record_id,
            ranking: INITIAL_RANKING,
        };

        if let Some(group) = updated_group {
            tables.groups.insert(group_id, group.clone());
        }
        tables.records.insert(record.record_id, record.clone());
        tables
            .leaderboard
            .insert((group_id, record.record_id), entry.clone());

        Ok(Participation { record, entry })
    }

    async fn commit_cancellation(
        &self,
        updated_group: &RunningGroup,
        record_id: u64,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let group_id = updated_group.group_id;

        if !tables.groups.contains_key(&group_id) {
            return Err(AppError::NotFound(format!("Running group {}", group_id)));
        }
        if !tables.records.contains_key(&record_id) {
            return Err(AppError::NotFound(format!("Record {}", record_id)));
        }
        if !tables.leaderboard.contains_key(&(group_id, record_id)) {
            return Err(AppError::NotFound(format!(
                "Record {} in running group {}",
                record_id, group_id
            )));
        }
        self.check_commit_allowed()?;

        tables.groups.insert(group_id, updated_group.clone());
        tables.leaderboard.remove(&(group_id, record_id));
        tables.records.remove(&record_id);

        Ok(())
    }
}
