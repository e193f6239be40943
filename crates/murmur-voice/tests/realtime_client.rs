use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use murmur_types::{ModelConfig, ToolDefinition};
use murmur_voice::{ConversationProvider, RealtimeClient, RealtimeConfig, VoiceError};
use std::time::Duration;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub provider");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub provider");
    });
    format!("http://{addr}")
}

fn client(base_url: String, timeout_secs: u64) -> RealtimeClient {
    RealtimeClient::new(RealtimeConfig {
        api_key: "sk-test".into(),
        base_url,
        timeout_secs,
    })
}

#[tokio::test]
async fn mints_a_session_with_tools() {
    let router = Router::new().route(
        "/v1/realtime/sessions",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(serde_json::json!({
                "id": "sess_stub",
                "model": body["model"],
                "echo_auth": auth,
                "echo_tools": body["tools"],
                "client_secret": {"value": "ek_1", "expires_at": 42}
            }))
        }),
    );
    let base = spawn(router).await;

    let tools = vec![ToolDefinition::function("set_mode", "Switch mode")];
    let session = client(base, 5)
        .create_ephemeral_session(&ModelConfig::default(), &tools)
        .await
        .expect("session should be minted");

    assert_eq!(session.id, "sess_stub");
    assert_eq!(session.client_secret_expires_at, Some(42));
    assert_eq!(session.payload["echo_auth"], "Bearer sk-test");
    assert_eq!(session.payload["echo_tools"][0]["name"], "set_mode");
    assert_eq!(session.payload["model"], "gpt-4o-realtime-preview");
}

#[tokio::test]
async fn provider_errors_surface_status_and_body() {
    let router = Router::new().route(
        "/v1/realtime/sessions",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
    );
    let base = spawn(router).await;

    let err = client(base, 5)
        .create_ephemeral_session(&ModelConfig::default(), &[])
        .await
        .unwrap_err();
    match err {
        VoiceError::Upstream { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out() {
    let router = Router::new().route(
        "/v1/realtime/sessions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(serde_json::json!({"id": "late"}))
        }),
    );
    let base = spawn(router).await;

    let err = client(base, 1)
        .create_ephemeral_session(&ModelConfig::default(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, VoiceError::Timeout), "got {err:?}");
}
