mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

fn new_user() -> String {
    format!("test-user-{}", Uuid::new_v4())
}

#[tokio::test]
async fn test_lesson_progress_is_created_lazily() {
    let app = common::create_test_app();

    let (status, body) = common::send(
        &app,
        "GET",
        "/api/v1/courses/rust-basics/lessons/ownership/progress",
        &new_user(),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_started");
    assert_eq!(body["currentStreak"], 0);
}

#[tokio::test]
async fn test_update_lesson_progress_status() {
    let app = common::create_test_app();
    let user = new_user();
    let uri = "/api/v1/courses/rust-basics/lessons/traits/progress";

    let (status, body) = common::send(
        &app,
        "POST",
        uri,
        &user,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");

    let (status, _) =
        common::send(&app, "POST", uri, &user, Some(json!({ "status": "finished" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lesson_completion_bonus_is_paid_once() {
    let app = common::create_test_app();
    let user = new_user();
    let uri = "/api/v1/courses/rust-basics/lessons/ownership/complete";

    let (status, first) = common::send(&app, "POST", uri, &user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["awarded"], true);
    assert_eq!(first["transaction"]["points"], 50);
    assert_eq!(first["transaction"]["transactionType"], "lesson_completed");

    let (status, second) = common::send(&app, "POST", uri, &user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["awarded"], false);
    assert_eq!(second["transaction"], Value::Null);

    let (_, summary) = common::send(&app, "GET", "/api/v1/points/summary", &user, None).await;
    assert_eq!(summary["totalPoints"], 50);
    assert_eq!(summary["recentTransactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_course_progress_reports_percentage() {
    let app = common::create_test_app();
    let user = new_user();

    common::send(
        &app,
        "POST",
        "/api/v1/courses/rust-basics/lessons/ownership/complete",
        &user,
        None,
    )
    .await;

    let (status, body) = common::send(
        &app,
        "GET",
        "/api/v1/courses/rust-basics/progress",
        &user,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completedLessons"], 1);
    assert_eq!(body["totalLessons"], 2);
    assert_eq!(body["progressPercentage"], 50.0);
}

#[tokio::test]
async fn test_course_completion_bonus_is_paid_once() {
    let app = common::create_test_app();
    let user = new_user();
    let uri = "/api/v1/courses/rust-basics/complete";

    let (_, first) = common::send(&app, "POST", uri, &user, None).await;
    let (_, second) = common::send(&app, "POST", uri, &user, None).await;

    assert_eq!(first["transaction"]["points"], 200);
    assert_eq!(second["transaction"], Value::Null);

    let (_, progress) = common::send(
        &app,
        "GET",
        "/api/v1/courses/rust-basics/progress",
        &user,
        None,
    )
    .await;
    assert_eq!(progress["status"], "completed");
}

#[tokio::test]
async fn test_unknown_course_returns_not_found() {
    let app = common::create_test_app();
    let user = new_user();

    let (status, _) =
        common::send(&app, "GET", "/api/v1/courses/cobol/progress", &user, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/v1/courses/rust-basics/lessons/macros/complete",
        &user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_content_hides_answer_keys() {
    let app = common::create_test_app();
    let user = new_user();

    let (status, courses) = common::send(&app, "GET", "/api/v1/courses", &user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(courses[0]["id"], "rust-basics");
    assert_eq!(courses[0]["lessons"].as_array().unwrap().len(), 2);

    let (status, lesson) = common::send(
        &app,
        "GET",
        "/api/v1/courses/rust-basics/lessons/ownership",
        &user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let exercises = lesson["exercises"].as_array().unwrap();
    assert_eq!(exercises.len(), 5);
    assert!(!lesson.to_string().contains("correctAnswer"));
    assert!(!lesson.to_string().contains("correctOrder"));
}

#[tokio::test]
async fn test_course_status_can_be_set() {
    let app = common::create_test_app();
    let user = new_user();

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/v1/courses/rust-basics/progress",
        &user,
        Some(json!({ "status": "in_progress" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["courseId"], "rust-basics");
}

#[tokio::test]
async fn test_lesson_streak_reset() {
    let app = common::create_test_app();
    let user = new_user();

    common::send(
        &app,
        "POST",
        &common::attempt_uri("traits", "trait-objects"),
        &user,
        Some(json!({ "answer": true })),
    )
    .await;

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/v1/courses/rust-basics/lessons/traits/streak/reset",
        &user,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentStreak"], 0);
    assert_eq!(body["maxStreak"], 1);
    assert_eq!(body["totalPoints"], 10);
}
