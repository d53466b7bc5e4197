// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use runmate::error::AppError;
use runmate::models::group::CreateGroupRequest;
use runmate::models::GroupTag;
use validator::Validate;

#[test]
fn test_status_mapping() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::NotFound("g".into()), StatusCode::NOT_FOUND),
        (AppError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
        (AppError::CapacityExceeded("full".into()), StatusCode::CONFLICT),
        (AppError::InvalidState("empty".into()), StatusCode::CONFLICT),
        (
            AppError::Database("down".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            AppError::Internal(anyhow::anyhow!("boom")),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        assert_eq!(err.status(), status, "{err}");
    }
}

#[test]
fn test_capacity_and_state_errors_are_distinguishable() {
    let full = AppError::CapacityExceeded("full".into());
    let empty = AppError::InvalidState("empty".into());

    assert_eq!(full.status(), empty.status());
    assert_ne!(full.kind(), empty.kind());
}

#[tokio::test]
async fn test_response_body_hides_database_details() {
    let response = AppError::Database("connection string with secrets".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "database_error");
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn test_response_body_carries_client_details() {
    let response = AppError::CapacityExceeded("Running group 7 is full".into()).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "capacity_exceeded");
    assert_eq!(json["details"], "Running group 7 is full");
}

#[test]
fn test_validation_errors_become_invalid_argument() {
    let request = CreateGroupRequest {
        title: String::new(),
        tag: GroupTag::Beginner,
        start_time: chrono::Utc::now(),
        end_time: chrono::Utc::now(),
        target_distance: 5000,
        max_participants: 3,
    };

    let err: AppError = request.validate().unwrap_err().into();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(err.kind(), "invalid_argument");
}
