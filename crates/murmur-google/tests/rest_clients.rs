use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use murmur_google::{
    CalendarProvider, GmailClient, GoogleCalendarClient, GoogleConfig, GoogleError, GoogleOAuth,
    MailProvider, OAuthProvider, OutgoingMessage,
};
use std::collections::HashMap;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub google");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub google");
    });
    format!("http://{addr}")
}

fn config(base: &str) -> GoogleConfig {
    GoogleConfig {
        client_id: "cid".into(),
        client_secret: "secret".into(),
        redirect_uri: "http://localhost/cb".into(),
        token_url: format!("{base}/token"),
        revoke_url: format!("{base}/revoke"),
        userinfo_url: format!("{base}/userinfo"),
        gmail_base_url: format!("{base}/gmail/v1"),
        calendar_base_url: format!("{base}/calendar/v3"),
        timeout_secs: 5,
        ..GoogleConfig::default()
    }
}

#[tokio::test]
async fn code_exchange_and_refresh_use_the_token_endpoint() {
    let router = Router::new().route(
        "/token",
        post(|Form(form): Form<HashMap<String, String>>| async move {
            let refresh = (form["grant_type"] == "authorization_code").then_some("rt-1");
            Json(serde_json::json!({
                "access_token": format!("at-for-{}", form["grant_type"]),
                "refresh_token": refresh,
                "expires_in": 3600,
                "scope": "email profile"
            }))
        }),
    );
    let base = spawn(router).await;
    let oauth = GoogleOAuth::new(config(&base));

    let grant = oauth.exchange_code("code-1").await.unwrap();
    assert_eq!(grant.access_token, "at-for-authorization_code");
    assert_eq!(grant.refresh_token.as_deref(), Some("rt-1"));
    assert!(grant.expires_at.is_some());

    let refreshed = oauth.refresh("rt-1").await.unwrap();
    assert_eq!(refreshed.access_token, "at-for-refresh_token");
    assert!(refreshed.refresh_token.is_none());
}

#[tokio::test]
async fn search_fetches_metadata_per_hit() {
    let router = Router::new()
        .route(
            "/gmail/v1/users/me/messages",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["q"], "from:bob");
                Json(serde_json::json!({
                    "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2", "threadId": "t2"}]
                }))
            }),
        )
        .route(
            "/gmail/v1/users/me/messages/{id}",
            get(|Path(id): Path<String>| async move {
                Json(serde_json::json!({
                    "id": id,
                    "threadId": "t",
                    "snippet": "hi",
                    "payload": {"headers": [
                        {"name": "From", "value": "bob@example.com"},
                        {"name": "Subject", "value": format!("subject {id}")}
                    ]}
                }))
            }),
        );
    let base = spawn(router).await;
    let gmail = GmailClient::new(&config(&base));

    let hits = gmail.search("at", "from:bob", 5).await.unwrap();
    let subjects: Vec<_> = hits.iter().map(|h| h.subject.as_str()).collect();
    assert_eq!(subjects, vec!["subject m1", "subject m2"]);
}

#[tokio::test]
async fn missing_draft_is_not_found() {
    let router = Router::new().route(
        "/gmail/v1/users/me/drafts/{id}",
        axum::routing::delete(|| async { StatusCode::NOT_FOUND }),
    );
    let base = spawn(router).await;
    let gmail = GmailClient::new(&config(&base));

    let err = gmail.delete_draft("at", "d-missing").await.unwrap_err();
    assert!(matches!(err, GoogleError::NotFound(ref what) if what == "draft"), "got {err:?}");
}

#[tokio::test]
async fn invalid_recipients_never_reach_the_api() {
    // No routes: any request would fail with a 404 rather than a validation error.
    let base = spawn(Router::new()).await;
    let gmail = GmailClient::new(&config(&base));

    let msg = OutgoingMessage::new(vec!["not an address".into()], "s", "b");
    let err = gmail.send("at", &msg).await.unwrap_err();
    assert!(matches!(err, GoogleError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn calendar_lists_primary_events() {
    let router = Router::new().route(
        "/calendar/v3/calendars/primary/events",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            assert_eq!(q["singleEvents"], "true");
            assert_eq!(q["timeMin"], "2026-03-02T00:00:00Z");
            Json(serde_json::json!({"items": [{
                "id": "e1",
                "summary": "Standup",
                "start": {"dateTime": "2026-03-02T09:00:00Z"},
                "end": {"dateTime": "2026-03-02T09:15:00Z"}
            }]}))
        }),
    );
    let base = spawn(router).await;
    let calendar = GoogleCalendarClient::new(&config(&base));

    let min = chrono::DateTime::parse_from_rfc3339("2026-03-02T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let events = calendar.list_events("at", Some(min), None, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].summary, "Standup");
    assert_eq!(events[0].start.as_deref(), Some("2026-03-02T09:00:00Z"));
}
