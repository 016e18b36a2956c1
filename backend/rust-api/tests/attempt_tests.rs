mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

fn new_user() -> String {
    format!("test-user-{}", Uuid::new_v4())
}

#[tokio::test]
async fn test_correct_answer_awards_points() {
    let app = common::create_test_app();
    let user = new_user();

    let (status, body) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "move-semantics"),
        &user,
        Some(json!({ "answer": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCorrect"], true);
    assert_eq!(body["points"], 10);
    assert_eq!(body["currentStreak"], 1);
    assert_eq!(body["attemptNumber"], 1);
    assert_eq!(body["transaction"]["transactionType"], "correct_answer");
    assert_eq!(body["transaction"]["exerciseId"], "move-semantics");
}

#[tokio::test]
async fn test_incorrect_answer_resets_streak() {
    let app = common::create_test_app();
    let user = new_user();
    let uri = common::attempt_uri("ownership", "copy-types");

    common::send(&app, "POST", &uri, &user, Some(json!({ "answer": true }))).await;
    let (status, body) =
        common::send(&app, "POST", &uri, &user, Some(json!({ "answer": false }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCorrect"], false);
    assert_eq!(body["points"], 0);
    assert_eq!(body["transaction"], serde_json::Value::Null);
    assert_eq!(body["currentStreak"], 0);
    assert_eq!(body["maxStreak"], 1);
    assert_eq!(body["attemptNumber"], 2);
}

#[tokio::test]
async fn test_streak_bonus_grows_with_consecutive_answers() {
    let app = common::create_test_app();
    let user = new_user();

    let answers = [
        ("move-semantics", json!(1)),
        ("copy-types", json!(true)),
        ("drop-keyword", json!("Drop")),
    ];
    let mut points = Vec::new();
    for (exercise, answer) in answers {
        let (status, body) = common::send(
            &app,
            "POST",
            &common::attempt_uri("ownership", exercise),
            &user,
            Some(json!({ "answer": answer })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        points.push(body["points"].as_i64().unwrap());
    }

    assert_eq!(points, vec![10, 14, 16]);

    let (_, lesson_points) = common::send(
        &app,
        "GET",
        "/api/v1/courses/rust-basics/lessons/ownership/points",
        &user,
        None,
    )
    .await;
    assert_eq!(lesson_points["totalPoints"], 40);
    assert_eq!(lesson_points["currentStreak"], 3);
}

#[tokio::test]
async fn test_matching_and_ordering_answers() {
    let app = common::create_test_app();
    let user = new_user();

    let (_, matching) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "smart-pointers"),
        &user,
        Some(json!({ "answer": [
            ["RefCell", "interior mutability"],
            ["Box", "heap allocation"],
            ["Rc", "shared ownership"]
        ]})),
    )
    .await;
    assert_eq!(matching["isCorrect"], true);

    let (_, ordering) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "borrow-steps"),
        &user,
        Some(json!({ "answer": [0, 1, 2] })),
    )
    .await;
    assert_eq!(ordering["isCorrect"], false);
}

#[tokio::test]
async fn test_malformed_answer_is_rejected() {
    let app = common::create_test_app();
    let user = new_user();

    let (status, body) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "move-semantics"),
        &user,
        Some(json!({ "answer": "one" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "smart-pointers"),
        &user,
        Some(json!({ "answer": [["Box"]] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejected input leaves no trace in the user's stats
    let (_, accuracy) = common::send(&app, "GET", "/api/v1/stats/accuracy", &user, None).await;
    assert_eq!(accuracy["totalAttempts"], 0);
}

#[tokio::test]
async fn test_missing_answer_field_is_rejected() {
    let app = common::create_test_app();

    let (status, body) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "move-semantics"),
        &new_user(),
        Some(json!({ "response": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to parse JSON request body"));
}

#[tokio::test]
async fn test_unknown_exercise_returns_not_found() {
    let app = common::create_test_app();

    let (status, body) = common::send(
        &app,
        "POST",
        &common::attempt_uri("ownership", "does-not-exist"),
        &new_user(),
        Some(json!({ "answer": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}
