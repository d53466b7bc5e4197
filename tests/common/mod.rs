// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, TimeZone, Utc};
use runmate::config::Config;
use runmate::db::{FirestoreDb, MemoryStore, RunningStore};
use runmate::middleware::auth::{create_jwt, AuthUser};
use runmate::models::group::CreateGroupRequest;
use runmate::models::{GroupTag, User};
use runmate::routes::create_router;
use runmate::services::GroupService;
use runmate::time_utils::ManualClock;
use runmate::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Fixed "now" every test starts from.
#[allow(dead_code)]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// Service wired to an in-memory store and a manual clock.
#[allow(dead_code)]
pub struct TestEnv {
    pub service: GroupService,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
pub fn test_env() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let service = GroupService::new(store.clone(), clock.clone());
    TestEnv {
        service,
        store,
        clock,
    }
}

#[allow(dead_code)]
pub fn user(user_id: u64) -> AuthUser {
    AuthUser { user_id }
}

/// Store a user profile so participant names resolve.
#[allow(dead_code)]
pub async fn seed_user(store: &dyn RunningStore, user_id: u64, nickname: &str) {
    store
        .upsert_user(&User {
            user_id,
            nickname: nickname.to_string(),
            email: None,
            height_cm: None,
            weight_kg: None,
        })
        .await
        .expect("Failed to seed user");
}

/// A valid create request starting `starts_in` after [`base_time`] and
/// lasting one hour.
#[allow(dead_code)]
pub fn group_request(
    title: &str,
    tag: GroupTag,
    starts_in: Duration,
    max_participants: i64,
) -> CreateGroupRequest {
    let start_time = base_time() + starts_in;
    CreateGroupRequest {
        title: title.to_string(),
        tag,
        start_time,
        end_time: start_time + Duration::hours(1),
        target_distance: 5000,
        max_participants,
    }
}

#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key).expect("Failed to create test JWT")
}

/// Create a test app backed by the in-memory store.
/// Returns the router, the shared state and the underlying test environment.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, TestEnv) {
    let env = test_env();
    let state = Arc::new(AppState {
        config: Config::test_default(),
        groups: env.service.clone(),
    });

    (create_router(state.clone()), state, env)
}
