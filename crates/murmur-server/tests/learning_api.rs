mod common;

use axum::http::StatusCode;
use common::{TestApp, ALICE_TOKEN, BOB_TOKEN};
use serde_json::{json, Value};

async fn create_topic(app: &TestApp, body: Value) -> String {
    let (status, created) = app
        .call("POST", "/api/learning/topics", Some(ALICE_TOKEN), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    created["topic"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn learning_routes_require_a_signed_in_user() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/api/learning/topics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");
    let (status, _) = app.call("GET", "/api/learning/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn topics_are_listed_filtered_and_paged() {
    let app = TestApp::new();
    create_topic(
        &app,
        json!({ "title": "Rust", "category": "Programming", "difficulty": "advanced" }),
    )
    .await;
    create_topic(&app, json!({ "title": "Piano", "category": "Music" })).await;

    let (status, _) = app
        .call(
            "POST",
            "/api/learning/topics",
            Some(ALICE_TOKEN),
            Some(json!({ "title": "Go", "difficulty": "guru" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .call("POST", "/api/learning/topics", Some(ALICE_TOKEN), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title is required");

    let (_, all) = app
        .call("GET", "/api/learning/topics", Some(ALICE_TOKEN), None)
        .await;
    assert_eq!(all["count"], 2);
    let (_, programming) = app
        .call(
            "GET",
            "/api/learning/topics?category=programming",
            Some(ALICE_TOKEN),
            None,
        )
        .await;
    assert_eq!(programming["count"], 1);
    assert_eq!(programming["topics"][0]["difficulty"], "advanced");
    assert_eq!(programming["topics"][0]["status"], "not_started");
    let (_, page) = app
        .call("GET", "/api/learning/topics?limit=1&offset=1", Some(ALICE_TOKEN), None)
        .await;
    assert_eq!(page["count"], 1);

    let (_, bob) = app
        .call("GET", "/api/learning/topics", Some(BOB_TOKEN), None)
        .await;
    assert_eq!(bob["count"], 0);
}

#[tokio::test]
async fn topic_detail_includes_study_sessions() {
    let app = TestApp::new();
    let topic_id = create_topic(&app, json!({ "title": "Spanish" })).await;
    {
        let conn = app.pool.get().unwrap();
        for _ in 0..2 {
            murmur_learning::continue_topic(&conn, "alice", &topic_id).unwrap();
        }
    }

    let uri = format!("/api/learning/topics/{topic_id}");
    let (status, detail) = app.call("GET", &uri, Some(ALICE_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK, "{detail}");
    assert_eq!(detail["topic"]["session_count"], 2);
    assert_eq!(detail["sessions"].as_array().unwrap().len(), 2);
    assert_eq!(detail["sessions"][0]["session_number"], 2);

    let (status, sessions) = app
        .call(
            "GET",
            &format!("{uri}/sessions?limit=1&offset=1"),
            Some(ALICE_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sessions["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(sessions["sessions"][0]["session_number"], 1);

    let (status, body) = app.call("GET", &uri, Some(BOB_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Learning topic not found");
    let (status, _) = app
        .call("GET", &format!("{uri}/sessions"), Some(BOB_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app
        .call("GET", "/api/learning/stats", Some(ALICE_TOKEN), None)
        .await;
    assert_eq!(stats["stats"]["total_topics"], 1);
    assert_eq!(stats["stats"]["total_sessions"], 2);
    assert_eq!(stats["stats"]["in_progress"], 1);
}

#[tokio::test]
async fn topics_are_updated_and_deleted() {
    let app = TestApp::new();
    let topic_id = create_topic(&app, json!({ "title": "Chess" })).await;
    let uri = format!("/api/learning/topics/{topic_id}");

    let (status, _) = app
        .call(
            "PATCH",
            &uri,
            Some(ALICE_TOKEN),
            Some(json!({ "progress_percentage": 150 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, updated) = app
        .call(
            "PATCH",
            &uri,
            Some(ALICE_TOKEN),
            Some(json!({ "status": "paused", "progress_percentage": 40 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["topic"]["status"], "paused");
    assert_eq!(updated["topic"]["progress_percentage"], 40);

    let (status, _) = app.call("DELETE", &uri, Some(BOB_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = app.call("DELETE", &uri, Some(ALICE_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Learning topic deleted successfully");
    let (status, _) = app.call("DELETE", &uri, Some(ALICE_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
