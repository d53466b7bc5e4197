// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Running group lifecycle: creation, participation, cancellation, search,
//! and the scheduled deactivation/quick-match jobs.

use crate::db::RunningStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::group::{
    CreateGroupRequest, GroupParticipants, GroupSummary, MainPageGroup, ParticipationResponse,
    MAIN_PAGE_LIMIT,
};
use crate::models::{GroupTag, NewRecord, NewRunningGroup, RunningGroup, WeeklyRecordSummary};
use crate::time_utils::Clock;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures_util::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

/// Default title of the daily quick-match group.
pub const DEFAULT_QUICK_MATCH_TITLE: &str = "Quick Match";

/// Concurrent record/user lookups when listing participants.
const MAX_CONCURRENT_LOOKUPS: usize = 16;

/// Shared per-group locks type.
pub type GroupLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Outcome of one deactivation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deactivated: usize,
    pub failed: usize,
}

/// Orchestrates the running group lifecycle on top of a [`RunningStore`].
///
/// Counter mutations (`participate`, `cancel_participation`) hold a per-group
/// mutex from the read through the commit, so concurrent joins against the
/// same group serialize and can never push the counter past its capacity.
#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn RunningStore>,
    clock: Arc<dyn Clock>,
    group_locks: GroupLocks,
    quick_match_title: String,
}

fn require_user(current_user: Option<&AuthUser>) -> Result<&AuthUser> {
    current_user.ok_or(AppError::Unauthorized)
}

impl GroupService {
    pub fn new(store: Arc<dyn RunningStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            group_locks: Arc::new(DashMap::new()),
            quick_match_title: DEFAULT_QUICK_MATCH_TITLE.to_string(),
        }
    }

    pub fn with_quick_match_title(mut self, title: impl Into<String>) -> Self {
        self.quick_match_title = title.into();
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock_for(&self, group_id: u64) -> Arc<Mutex<()>> {
        self.group_locks
            .entry(group_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_group(&self, group_id: u64) -> Result<RunningGroup> {
        self.store
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Running group {} not found", group_id)))
    }

    // ─── Creation ────────────────────────────────────────────────

    /// Create a user-defined group. All validation happens before anything
    /// is persisted.
    pub async fn create_group(
        &self,
        request: CreateGroupRequest,
        current_user: Option<&AuthUser>,
    ) -> Result<RunningGroup> {
        let user = require_user(current_user)?;

        if request.max_participants <= 0 {
            return Err(AppError::InvalidArgument(
                "max participants must be at least 1".to_string(),
            ));
        }
        request.validate()?;
        if request.end_time < request.start_time {
            return Err(AppError::InvalidArgument(
                "end time must not be before start time".to_string(),
            ));
        }
        if request.tag == GroupTag::Quick {
            return Err(AppError::InvalidArgument(
                "QUICK groups are created automatically".to_string(),
            ));
        }
        let max_participants = u32::try_from(request.max_participants).map_err(|_| {
            AppError::InvalidArgument(format!("max participants must be at most {}", u32::MAX))
        })?;

        let group = self
            .store
            .insert_group(NewRunningGroup {
                title: request.title,
                tag: request.tag,
                start_time: request.start_time,
                end_time: request.end_time,
                target_distance: request.target_distance,
                max_participants,
            })
            .await?;

        tracing::info!(
            group_id = group.group_id,
            user_id = user.user_id,
            max_participants,
            tag = group.tag.as_str(),
            "Running group created"
        );

        Ok(group)
    }

    // ─── Participation ───────────────────────────────────────────

    /// Join a group, taking one seat and creating the user's record and
    /// leaderboard entry in a single atomic unit.
    pub async fn participate(
        &self,
        group_id: u64,
        current_user: Option<&AuthUser>,
    ) -> Result<ParticipationResponse> {
        let user = require_user(current_user)?;

        let lock = self.lock_for(group_id);
        let _guard = lock.lock().await;

        let mut group = self.load_group(group_id).await?;
        if !group.try_join() {
            tracing::debug!(
                group_id,
                user_id = user.user_id,
                max_participants = group.max_participants,
                "Join rejected: group is full"
            );
            return Err(AppError::CapacityExceeded(format!(
                "Running group {} is full ({} participants)",
                group_id, group.max_participants
            )));
        }

        let participation = self
            .store
            .commit_participation(
                group_id,
                Some(&group),
                NewRecord::starting(user.user_id, self.clock.today()),
            )
            .await?;

        tracing::info!(
            group_id,
            user_id = user.user_id,
            record_id = participation.record.record_id,
            current_participants = group.current_participants,
            "User joined running group"
        );

        Ok(to_response(group_id, participation.record))
    }

    /// Join the currently active QUICK group.
    ///
    /// QUICK groups are unbounded drop-in groups: the participant counter is
    /// neither checked nor incremented.
    pub async fn participate_quick_match(
        &self,
        current_user: Option<&AuthUser>,
    ) -> Result<ParticipationResponse> {
        let user = require_user(current_user)?;

        let quick_groups = self.store.active_groups_with_tag(GroupTag::Quick).await?;
        if quick_groups.len() > 1 {
            tracing::warn!(
                count = quick_groups.len(),
                "Multiple active QUICK groups; joining the newest"
            );
        }
        let group = quick_groups
            .into_iter()
            .max_by_key(|g| g.group_id)
            .ok_or_else(|| AppError::NotFound("No active quick match group".to_string()))?;

        let participation = self
            .store
            .commit_participation(
                group.group_id,
                None,
                NewRecord::starting(user.user_id, self.clock.today()),
            )
            .await?;

        tracing::info!(
            group_id = group.group_id,
            user_id = user.user_id,
            record_id = participation.record.record_id,
            "User joined quick match"
        );

        Ok(to_response(group.group_id, participation.record))
    }

    /// Leave a group: release one seat and delete the leaderboard entry and
    /// record in a single atomic unit.
    ///
    /// When `requester` is given, the record must belong to them.
    pub async fn cancel_participation(
        &self,
        group_id: u64,
        record_id: u64,
        requester: Option<&AuthUser>,
    ) -> Result<()> {
        let lock = self.lock_for(group_id);
        let _guard = lock.lock().await;

        let mut group = self.load_group(group_id).await?;
        let record = self
            .store
            .get_record(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", record_id)))?;

        if let Some(user) = requester {
            if record.user_id != user.user_id {
                tracing::warn!(
                    group_id,
                    record_id,
                    user_id = user.user_id,
                    "Cancellation attempted on another user's record"
                );
                return Err(AppError::NotFound(format!("Record {} not found", record_id)));
            }
        }

        if self
            .store
            .get_leaderboard_entry(group_id, record_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                group_id,
                record_id,
                "Cancellation names a record that is not in this group"
            );
            return Err(AppError::NotFound(format!(
                "Record {} not found in running group {}",
                record_id, group_id
            )));
        }

        if !group.try_leave() {
            return Err(AppError::InvalidState(format!(
                "Running group {} has no participants to remove",
                group_id
            )));
        }

        self.store.commit_cancellation(&group, record_id).await?;

        tracing::info!(
            group_id,
            record_id,
            current_participants = group.current_participants,
            "Participation cancelled"
        );

        Ok(())
    }

    // ─── Queries ─────────────────────────────────────────────────

    /// Nickname behind one leaderboard entry, `None` when the record or the
    /// user is gone.
    async fn participant_nickname(&self, group_id: u64, record_id: u64) -> Result<Option<String>> {
        let Some(record) = self.store.get_record(record_id).await? else {
            tracing::warn!(
                group_id,
                record_id,
                "Leaderboard entry points at a missing record"
            );
            return Ok(None);
        };
        let user = self.store.get_user(record.user_id).await?;
        if user.is_none() {
            tracing::warn!(group_id, user_id = record.user_id, "Participant user not found");
        }
        Ok(user.map(|u| u.nickname))
    }

    /// Groups that have not started yet.
    pub async fn list_upcoming_groups(&self) -> Result<Vec<GroupSummary>> {
        let now = self.clock.now();
        let groups = self.store.groups_starting_after(now).await?;
        Ok(groups.into_iter().map(GroupSummary::from).collect())
    }

    /// Upcoming groups whose title contains `search_word`, optionally
    /// restricted to one tag.
    pub async fn filter_groups(
        &self,
        tag: Option<GroupTag>,
        search_word: &str,
    ) -> Result<Vec<GroupSummary>> {
        let now = self.clock.now();
        let groups = self.store.search_groups(now, tag, search_word).await?;
        Ok(groups.into_iter().map(GroupSummary::from).collect())
    }

    /// Group details plus the nicknames of everyone who joined.
    pub async fn group_participants(&self, group_id: u64) -> Result<GroupParticipants> {
        let group = self.load_group(group_id).await?;

        let entries = self.store.leaderboard_for_group(group_id).await?;
        let nicknames: Vec<Option<String>> = stream::iter(entries)
            .map(|entry| self.participant_nickname(group_id, entry.record_id))
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .try_collect()
            .await?;
        let participants = nicknames.into_iter().flatten().collect();

        Ok(GroupParticipants {
            title: group.title,
            tag: group.tag,
            start_time: group.start_time,
            end_time: group.end_time,
            target_distance: group.target_distance,
            max_participants: group.max_participants,
            current_participants: group.current_participants,
            participants,
        })
    }

    /// First few upcoming groups for the landing page.
    pub async fn list_main_page_groups(&self) -> Result<Vec<MainPageGroup>> {
        let now = self.clock.now();
        let groups = self.store.groups_starting_after(now).await?;
        Ok(groups
            .into_iter()
            .take(MAIN_PAGE_LIMIT)
            .map(MainPageGroup::from)
            .collect())
    }

    /// Seven-day distance/calorie summary of the user's records.
    ///
    /// Records are created here with zeroed metrics; distance, time and
    /// calories are filled in by the run-tracking upload, which lives outside
    /// this service. Until then a day shows up with zero totals.
    pub async fn weekly_records(
        &self,
        current_user: Option<&AuthUser>,
    ) -> Result<WeeklyRecordSummary> {
        let user = require_user(current_user)?;
        let records = self.store.records_for_user(user.user_id).await?;
        Ok(WeeklyRecordSummary::from_records(
            &records,
            self.clock.today(),
        ))
    }

    // ─── Scheduled Jobs ──────────────────────────────────────────

    /// Deactivate every active group whose end time has passed.
    ///
    /// A failure on one group is logged and counted; the rest of the batch
    /// still runs.
    pub async fn sweep_deactivation(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let expired = self.store.active_groups_ended_by(now).await?;

        let mut report = SweepReport::default();
        for candidate in expired {
            let group_id = candidate.group_id;
            match self.deactivate_if_ended(group_id, now).await {
                Ok(true) => {
                    report.deactivated += 1;
                    tracing::debug!(group_id, "Running group deactivated");
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(group_id, error = %e, "Failed to deactivate running group");
                }
            }
            self.release_lock(group_id);
        }

        Ok(report)
    }

    /// Re-read the group under its lock and deactivate it if it is still
    /// active and ended. The sweep's listing snapshot is never written back.
    async fn deactivate_if_ended(&self, group_id: u64, now: DateTime<Utc>) -> Result<bool> {
        let lock = self.lock_for(group_id);
        let _guard = lock.lock().await;

        let Some(mut group) = self.store.get_group(group_id).await? else {
            return Ok(false);
        };
        if !group.active || !group.has_ended(now) {
            return Ok(false);
        }
        group.deactivate();
        self.store.update_group(&group).await?;
        Ok(true)
    }

    /// Drop the group's lock entry unless some task still holds it.
    fn release_lock(&self, group_id: u64) {
        self.group_locks
            .remove_if(&group_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of per-group locks currently tracked.
    pub fn tracked_locks(&self) -> usize {
        self.group_locks.len()
    }

    /// Create today's QUICK group: starts now, lasts one day, unbounded.
    ///
    /// The previous QUICK group is left active.
    pub async fn regenerate_quick_match_group(&self) -> Result<RunningGroup> {
        let now = self.clock.now();
        let group = self
            .store
            .insert_group(NewRunningGroup {
                title: self.quick_match_title.clone(),
                tag: GroupTag::Quick,
                start_time: now,
                end_time: now + Duration::days(1),
                target_distance: i64::MAX,
                max_participants: u32::MAX,
            })
            .await?;

        tracing::info!(group_id = group.group_id, "Quick match group created");

        let active_quick = self.store.active_groups_with_tag(GroupTag::Quick).await?;
        if active_quick.len() > 1 {
            tracing::warn!(
                count = active_quick.len(),
                "More than one QUICK group is active"
            );
        }

        Ok(group)
    }
}

fn to_response(group_id: u64, record: crate::models::Record) -> ParticipationResponse {
    ParticipationResponse {
        record_id: record.record_id,
        group_id,
        running_start_date: record.running_start_date,
        running_time_secs: record.running_time_secs,
        distance_meters: record.distance_meters,
        calories: record.calories,
    }
}
