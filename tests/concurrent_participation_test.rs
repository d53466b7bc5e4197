// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use runmate::db::{MemoryStore, Participation, RunningStore};
use runmate::error::AppError;
use runmate::models::{
    GroupTag, LeaderBoardEntry, NewRecord, NewRunningGroup, Record, RunningGroup, User,
};
use runmate::services::GroupService;
use runmate::time_utils::ManualClock;
use std::sync::Arc;
use tokio::sync::Notify;

mod common;
use common::{base_time, group_request, test_env, user};

const NUM_RUNNERS: u64 = 25;
const SEATS: i64 = 7;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_exceed_capacity() {
    // Every runner reads the counter before writing it back. Without the
    // per-group lock two joins could read the same count and both succeed
    // for the last seat.
    let env = test_env();
    let group = env
        .service
        .create_group(
            group_request("Race Day", GroupTag::Advanced, Duration::hours(1), SEATS),
            Some(&user(1)),
        )
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..NUM_RUNNERS {
        let service = env.service.clone();
        let group_id = group.group_id;
        handles.push(tokio::spawn(async move {
            service.participate(group_id, Some(&user(100 + i))).await
        }));
    }

    let mut joined = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.expect("Task join failed") {
            Ok(_) => joined += 1,
            Err(AppError::CapacityExceeded(_)) => full += 1,
            Err(e) => panic!("Unexpected error: {e:?}"),
        }
    }

    assert_eq!(joined, SEATS as u64);
    assert_eq!(full, NUM_RUNNERS - SEATS as u64);

    let stored = env.store.get_group(group.group_id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, SEATS as u32);
    assert_eq!(env.store.record_count().await, SEATS as usize);
    assert_eq!(
        env.store
            .leaderboard_for_group(group.group_id)
            .await
            .unwrap()
            .len(),
        SEATS as usize
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancellations_keep_counter_consistent() {
    let env = test_env();
    let group = env
        .service
        .create_group(
            group_request("Recovery", GroupTag::Beginner, Duration::hours(1), SEATS),
            Some(&user(1)),
        )
        .await
        .unwrap();

    let mut record_ids = vec![];
    for i in 0..SEATS as u64 {
        let joined = env
            .service
            .participate(group.group_id, Some(&user(100 + i)))
            .await
            .unwrap();
        record_ids.push((100 + i, joined.record_id));
    }

    let mut handles = vec![];
    for (user_id, record_id) in record_ids {
        let service = env.service.clone();
        let group_id = group.group_id;
        handles.push(tokio::spawn(async move {
            service
                .cancel_participation(group_id, record_id, Some(&user(user_id)))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("Task join failed")
            .expect("Cancellation failed");
    }

    let stored = env.store.get_group(group.group_id).await.unwrap().unwrap();
    assert_eq!(stored.current_participants, 0);
    assert_eq!(env.store.record_count().await, 0);
    assert_eq!(env.store.leaderboard_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_joins_on_different_groups_do_not_interfere() {
    let env = test_env();
    let me = user(1);
    let a = env
        .service
        .create_group(
            group_request("A", GroupTag::Beginner, Duration::hours(1), 3),
            Some(&me),
        )
        .await
        .unwrap();
    let b = env
        .service
        .create_group(
            group_request("B", GroupTag::Beginner, Duration::hours(1), 3),
            Some(&me),
        )
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..10u64 {
        let service = env.service.clone();
        let group_id = if i % 2 == 0 { a.group_id } else { b.group_id };
        handles.push(tokio::spawn(async move {
            service.participate(group_id, Some(&user(100 + i))).await
        }));
    }
    let successes = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(successes, 6);
    for group_id in [a.group_id, b.group_id] {
        let stored = env.store.get_group(group_id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 3);
    }
}

/// Store that holds the sweep between listing expired groups and acting on
/// them, so a join or cancel can commit inside that window.
struct PausedSweepStore {
    inner: Arc<MemoryStore>,
    listed: Notify,
    resume: Notify,
}

impl PausedSweepStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            listed: Notify::new(),
            resume: Notify::new(),
        }
    }
}

#[async_trait]
impl RunningStore for PausedSweepStore {
    async fn insert_group(&self, group: NewRunningGroup) -> Result<RunningGroup, AppError> {
        self.inner.insert_group(group).await
    }

    async fn get_group(&self, group_id: u64) -> Result<Option<RunningGroup>, AppError> {
        self.inner.get_group(group_id).await
    }

    async fn update_group(&self, group: &RunningGroup) -> Result<(), AppError> {
        self.inner.update_group(group).await
    }

    async fn groups_starting_after(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError> {
        self.inner.groups_starting_after(after).await
    }

    async fn active_groups_ended_by(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<RunningGroup>, AppError> {
        let groups = self.inner.active_groups_ended_by(at).await?;
        self.listed.notify_one();
        self.resume.notified().await;
        Ok(groups)
    }

    async fn active_groups_with_tag(
        &self,
        tag: GroupTag,
    ) -> Result<Vec<RunningGroup>, AppError> {
        self.inner.active_groups_with_tag(tag).await
    }

    async fn get_record(&self, record_id: u64) -> Result<Option<Record>, AppError> {
        self.inner.get_record(record_id).await
    }

    async fn records_for_user(&self, user_id: u64) -> Result<Vec<Record>, AppError> {
        self.inner.records_for_user(user_id).await
    }

    async fn leaderboard_for_group(
        &self,
        group_id: u64,
    ) -> Result<Vec<LeaderBoardEntry>, AppError> {
        self.inner.leaderboard_for_group(group_id).await
    }

    async fn get_leaderboard_entry(
        &self,
        group_id: u64,
        record_id: u64,
    ) -> Result<Option<LeaderBoardEntry>, AppError> {
        self.inner.get_leaderboard_entry(group_id, record_id).await
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        self.inner.get_user(user_id).await
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.inner.upsert_user(user).await
    }

    async fn commit_participation(
        &self,
        group_id: u64,
        updated_group: Option<&RunningGroup>,
        record: NewRecord,
    ) -> Result<Participation, AppError> {
        self.inner
            .commit_participation(group_id, updated_group, record)
            .await
    }

    async fn commit_cancellation(
        &self,
        updated_group: &RunningGroup,
        record_id: u64,
    ) -> Result<(), AppError> {
        self.inner.commit_cancellation(updated_group, record_id).await
    }
}

fn paused_sweep_env() -> (GroupService, Arc<PausedSweepStore>, Arc<MemoryStore>) {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(PausedSweepStore::new(inner.clone()));
    let service = GroupService::new(store.clone(), Arc::new(ManualClock::new(base_time())));
    (service, store, inner)
}

#[tokio::test]
async fn test_sweep_keeps_join_committed_during_sweep() {
    let (service, store, inner) = paused_sweep_env();
    let group = service
        .create_group(
            group_request("Ended", GroupTag::Beginner, Duration::hours(-3), 5),
            Some(&user(1)),
        )
        .await
        .unwrap();

    let sweep = tokio::spawn({
        let service = service.clone();
        async move { service.sweep_deactivation().await }
    });
    store.listed.notified().await;

    // The sweep already holds its listing; this join lands after it.
    service
        .participate(group.group_id, Some(&user(2)))
        .await
        .unwrap();
    store.resume.notify_one();

    let report = sweep.await.expect("Task join failed").unwrap();
    assert_eq!(report.deactivated, 1);

    let stored = inner.get_group(group.group_id).await.unwrap().unwrap();
    assert!(!stored.active);
    assert_eq!(stored.current_participants, 1);
    assert_eq!(
        inner.leaderboard_for_group(group.group_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_sweep_keeps_cancellation_committed_during_sweep() {
    let (service, store, inner) = paused_sweep_env();
    let runner = user(2);
    let group = service
        .create_group(
            group_request("Ended", GroupTag::Beginner, Duration::hours(-3), 5),
            Some(&user(1)),
        )
        .await
        .unwrap();
    let joined = service
        .participate(group.group_id, Some(&runner))
        .await
        .unwrap();

    let sweep = tokio::spawn({
        let service = service.clone();
        async move { service.sweep_deactivation().await }
    });
    store.listed.notified().await;

    service
        .cancel_participation(group.group_id, joined.record_id, Some(&runner))
        .await
        .unwrap();
    store.resume.notify_one();

    sweep.await.expect("Task join failed").unwrap();

    let stored = inner.get_group(group.group_id).await.unwrap().unwrap();
    assert!(!stored.active);
    assert_eq!(stored.current_participants, 0);
    assert_eq!(inner.leaderboard_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_racing_joins_keeps_counter_in_step_with_entries() {
    let env = test_env();
    let group = env
        .service
        .create_group(
            group_request("Late Joiners", GroupTag::Trail, Duration::hours(-3), SEATS),
            Some(&user(1)),
        )
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..NUM_RUNNERS {
        let service = env.service.clone();
        let group_id = group.group_id;
        handles.push(tokio::spawn(async move {
            if i % 5 == 0 {
                service.sweep_deactivation().await.map(|_| ())
            } else {
                service
                    .participate(group_id, Some(&user(100 + i)))
                    .await
                    .map(|_| ())
            }
        }));
    }
    futures_util::future::join_all(handles).await;

    let stored = env.store.get_group(group.group_id).await.unwrap().unwrap();
    let entries = env
        .store
        .leaderboard_for_group(group.group_id)
        .await
        .unwrap();
    assert!(!stored.active);
    assert_eq!(stored.current_participants as usize, entries.len());
    assert!(stored.current_participants <= SEATS as u32);
}
