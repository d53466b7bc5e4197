// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Running groups (metadata and participant counters)
//! - Records (per-participation exercise records)
//! - Leaderboard (group/record join collection)
//! - Users (read-only profiles)

use crate::db::{collections, Participation, RunningStore};
use crate::error::AppError;
use crate::models::leaderboard::INITIAL_RANKING;
use crate::models::{
    GroupTag, LeaderBoardEntry, NewRecord, NewRunningGroup, Record, RunningGroup, User,
};
use crate::time_utils::format_fixed_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::FirestoreWritePrecondition;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Low bits of a generated ID reserved for the per-millisecond sequence.
const ID_SEQUENCE_BITS: u32 = 12;
/// Bits above the sequence identifying the allocating process.
const ID_INSTANCE_BITS: u32 = 10;

/// Time-ordered ID allocator.
///
/// IDs are `millis << 22 | instance << 12 | sequence`. They strictly increase
/// within a process, so ID order follows creation order. The instance tag
/// comes from a randomly seeded hash; two processes that still collide are
/// caught by the create-only precondition on every insert.
#[derive(Debug)]
struct IdAllocator {
    instance: u64,
    last: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seed = RandomState::new().hash_one((std::process::id(), nanos));
        Self {
            instance: seed & ((1 << ID_INSTANCE_BITS) - 1),
            last: AtomicU64::new(0),
        }
    }
}

impl IdAllocator {
    fn next(&self) -> u64 {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let floor = (millis << (ID_INSTANCE_BITS + ID_SEQUENCE_BITS))
            | (self.instance << ID_SEQUENCE_BITS);
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = floor.max(current + 1);
            match self.last.compare_exchange(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    ids: Arc<IdAllocator>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            ids: Arc::new(IdAllocator::default()),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            ids: Arc::new(IdAllocator::default()),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            ids: Arc::new(IdAllocator::default()),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Write a group. `must_exist` selects update-only (`true`) or
    /// create-only (`false`), so an ID collision never overwrites a group.
    async fn write_group(&self, group: &RunningGroup, must_exist: bool) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RUNNING_GROUPS)
            .precondition(FirestoreWritePrecondition::Exists(must_exist))
            .document_id(group.group_id.to_string())
            .object(group)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

fn sorted_by_id(mut groups: Vec<RunningGroup>) -> Vec<RunningGroup> {
    groups.sort_by_key(|g| g.group_id);
    groups
}

#[async_trait]
impl RunningStore for FirestoreDb {
    // ─── Running Group Operations ────────────────────────────────

    async fn insert_group(&self, group: NewRunningGroup) -> Result<RunningGroup, AppError> {
        let group = group.with_id(self.ids.next());
        self.write_group(&group, false).await?;
        tracing::debug!(group_id = group.group_id, "Running group stored");
        Ok(group)
    }

    async fn get_group(&self, group_id: u64) -> Result<Option<RunningGroup>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RUNNING_GROUPS)
            .obj()
            .one(&group_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_group(&self, group: &RunningGroup) -> Result<(), AppError> {
        self.write_group(group, true).await
    }

    async fn groups_starting_after(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError> {
        let after = format_fixed_rfc3339(after);
        let groups: Vec<RunningGroup> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RUNNING_GROUPS)
            .filter(move |q| q.for_all([q.field("start_time").greater_than(after.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(sorted_by_id(groups))
    }

    async fn active_groups_ended_by(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError> {
        let at = format_fixed_rfc3339(at);
        let groups: Vec<RunningGroup> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RUNNING_GROUPS)
            .filter(move |q| {
                q.for_all([
                    q.field("active").eq(true),
                    q.field("end_time").less_than_or_equal(at.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(sorted_by_id(groups))
    }

    async fn active_groups_with_tag(
        &self,
        tag: GroupTag,
    ) -> Result<Vec<RunningGroup>, AppError> {
        let groups: Vec<RunningGroup> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RUNNING_GROUPS)
            .filter(|q| {
                q.for_all([
                    q.field("active").eq(true),
                    q.field("tag").eq(tag.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(sorted_by_id(groups))
    }

    /// Tag and start time are pushed down to Firestore; the title substring
    /// match has no Firestore equivalent and runs in memory.
    async fn search_groups(
        &self,
        now: DateTime<Utc>,
        tag: Option<GroupTag>,
        search_word: &str,
    ) -> Result<Vec<RunningGroup>, AppError> {
        let candidates = match tag {
            None => self.groups_starting_after(now).await?,
            Some(tag) => {
                let after = format_fixed_rfc3339(now);
                let groups: Vec<RunningGroup> = self
                    .get_client()?
                    .fluent()
                    .select()
                    .from(collections::RUNNING_GROUPS)
                    .filter(move |q| {
                        q.for_all([
                            q.field("tag").eq(tag.as_str()),
                            q.field("start_time").greater_than(after.clone()),
                        ])
                    })
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                sorted_by_id(groups)
            }
        };

        Ok(candidates
            .into_iter()
            .filter(|g| g.matches_filter(now, tag, search_word))
            .collect())
    }

    // ─── Record & Leaderboard Operations ─────────────────────────

    async fn get_record(&self, record_id: u64) -> Result<Option<Record>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RECORDS)
            .obj()
            .one(&record_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn records_for_user(&self, user_id: u64) -> Result<Vec<Record>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RECORDS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn leaderboard_for_group(
        &self,
        group_id: u64,
    ) -> Result<Vec<LeaderBoardEntry>, AppError> {
        let mut entries: Vec<LeaderBoardEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::LEADERBOARD)
            .filter(|q| q.for_all([q.field("group_id").eq(group_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        entries.sort_by_key(|e| e.entry_id);
        Ok(entries)
    }

    async fn get_leaderboard_entry(
        &self,
        group_id: u64,
        record_id: u64,
    ) -> Result<Option<LeaderBoardEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LEADERBOARD)
            .obj()
            .one(&LeaderBoardEntry::doc_id(group_id, record_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.user_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Atomic Participation ────────────────────────────────────

    /// Writes the group counter, the record and the leaderboard entry in one
    /// Firestore transaction. Nothing is visible unless the commit succeeds.
    async fn commit_participation(
        &self,
        group_id: u64,
        updated_group: Option<&RunningGroup>,
        record: NewRecord,
    ) -> Result<Participation, AppError> {
        let client = self.get_client()?;

        let record = record.with_id(self.ids.next());
        let entry = LeaderBoardEntry {
            entry_id: self.ids.next(),
            group_id,
            record_id: record.record_id,
            ranking: INITIAL_RANKING,
        };

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if let Some(group) = updated_group {
            client
                .fluent()
                .update()
                .in_col(collections::RUNNING_GROUPS)
                .precondition(FirestoreWritePrecondition::Exists(true))
                .document_id(group.group_id.to_string())
                .object(group)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add group to transaction: {}", e))
                })?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::RECORDS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(record.record_id.to_string())
            .object(&record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add record to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::LEADERBOARD)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(LeaderBoardEntry::doc_id(group_id, record.record_id))
            .object(&entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add leaderboard entry to transaction: {}",
                    e
                ))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            group_id,
            record_id = record.record_id,
            "Participation committed atomically"
        );

        Ok(Participation { record, entry })
    }

    /// Writes the group counter and deletes the leaderboard entry and record
    /// in one Firestore transaction.
    async fn commit_cancellation(
        &self,
        updated_group: &RunningGroup,
        record_id: u64,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let group_id = updated_group.group_id;

        if self.get_leaderboard_entry(group_id, record_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Record {} in running group {}",
                record_id, group_id
            )));
        }

        // The deletes carry exists-preconditions, so an entry removed after the
        // check above fails the commit instead of freeing a seat twice.
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::RUNNING_GROUPS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(group_id.to_string())
            .object(updated_group)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add group to transaction: {}", e))
            })?;

        client
            .fluent()
            .delete()
            .from(collections::LEADERBOARD)
            .document_id(LeaderBoardEntry::doc_id(group_id, record_id))
            .precondition(FirestoreWritePrecondition::Exists(true))
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add leaderboard deletion to transaction: {}",
                    e
                ))
            })?;

        client
            .fluent()
            .delete()
            .from(collections::RECORDS)
            .document_id(record_id.to_string())
            .precondition(FirestoreWritePrecondition::Exists(true))
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add record deletion to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(group_id, record_id, "Cancellation committed atomically");

        Ok(())
    }
}
