#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use murmur_accounts::{Account, NewAccount};
use murmur_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use murmur_google::{
    CalendarEvent, CalendarInfo, CalendarProvider, DraftSummary, GoogleError, MailMessage,
    MailProvider, MailboxProfile, MessageSummary, NewEvent, OAuthProvider, OutgoingMessage,
    SentMessage, TokenGrant, UserInfo,
};
use murmur_server::identity::{IdentityError, IdentityVerifier, VerifiedUser};
use murmur_server::oauth_state::StateSigner;
use murmur_server::{app, AppState, ServerSettings};
use murmur_types::{ModelConfig, ToolDefinition};
use murmur_voice::{ConversationProvider, ProviderSession, VoiceError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const ALICE_TOKEN: &str = "token-alice";
pub const BOB_TOKEN: &str = "token-bob";

/// Mints `sess_1`, `sess_2`, … and remembers the tool names it was given.
#[derive(Default)]
pub struct ScriptedConversation {
    minted: AtomicUsize,
    pub fail: bool,
    pub tools_seen: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ConversationProvider for ScriptedConversation {
    fn is_configured(&self) -> bool {
        true
    }

    async fn create_ephemeral_session(
        &self,
        model: &ModelConfig,
        tools: &[ToolDefinition],
    ) -> Result<ProviderSession, VoiceError> {
        if self.fail {
            return Err(VoiceError::Upstream {
                status: 500,
                body: "provider down".into(),
            });
        }
        let n = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        self.tools_seen
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        ProviderSession::from_payload(json!({
            "id": format!("sess_{n}"),
            "object": "realtime.session",
            "model": model.model,
            "voice": model.voice,
            "client_secret": { "value": format!("ek_{n}"), "expires_at": 1_900_000_000 },
        }))
    }
}

/// Accepts `token-alice` and `token-bob`.
pub struct TokenTable;

#[async_trait]
impl IdentityVerifier for TokenTable {
    fn is_configured(&self) -> bool {
        true
    }

    async fn verify(&self, token: &str) -> Result<Option<VerifiedUser>, IdentityError> {
        let user = match token {
            ALICE_TOKEN => Some(("alice", "alice@example.com")),
            BOB_TOKEN => Some(("bob", "bob@example.com")),
            _ => None,
        };
        Ok(user.map(|(id, email)| VerifiedUser {
            id: id.to_string(),
            email: Some(email.to_string()),
        }))
    }
}

/// Grants tokens for any code; `code-<email>` connects `<email>`.
#[derive(Default)]
pub struct StubOAuth {
    pub revoked: Mutex<Vec<String>>,
    pub refreshed: Mutex<Vec<String>>,
    pub fail_revoke: bool,
}

#[async_trait]
impl OAuthProvider for StubOAuth {
    fn is_configured(&self) -> bool {
        true
    }

    fn authorization_url(&self, state: &str) -> Result<String, GoogleError> {
        Ok(format!("https://accounts.example.test/consent?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError> {
        let email = code
            .strip_prefix("code-")
            .ok_or_else(|| GoogleError::Upstream {
                status: 400,
                body: "invalid_grant".into(),
            })?;
        Ok(TokenGrant {
            access_token: format!("access:{email}"),
            refresh_token: Some(format!("refresh:{email}")),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".into()],
        })
    }

    async fn user_info(&self, access_token: &str) -> Result<UserInfo, GoogleError> {
        let email = access_token.trim_start_matches("access:");
        Ok(UserInfo {
            id: format!("google-{email}"),
            email: email.to_string(),
            name: Some("Test User".into()),
            picture: None,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, GoogleError> {
        self.refreshed.lock().unwrap().push(refresh_token.to_string());
        Ok(TokenGrant {
            access_token: "access:refreshed".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            scopes: Vec::new(),
        })
    }

    async fn revoke(&self, token: &str) -> Result<(), GoogleError> {
        self.revoked.lock().unwrap().push(token.to_string());
        if self.fail_revoke {
            return Err(GoogleError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

/// In-memory mailbox keyed by message id; records everything sent.
#[derive(Default)]
pub struct RecordingMail {
    pub messages: Mutex<HashMap<String, MailMessage>>,
    pub sent: Mutex<Vec<(String, OutgoingMessage)>>,
}

impl RecordingMail {
    pub fn insert(&self, message: MailMessage) {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailProvider for RecordingMail {
    async fn search(
        &self,
        _token: &str,
        _query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, GoogleError> {
        let messages = self.messages.lock().unwrap();
        let mut found: Vec<_> = messages
            .values()
            .map(|m| MessageSummary {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
                from: m.from.clone(),
                subject: m.subject.clone(),
                date: m.date.clone(),
                snippet: m.snippet.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found.truncate(max_results as usize);
        Ok(found)
    }

    async fn get_message(&self, _token: &str, id: &str) -> Result<MailMessage, GoogleError> {
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GoogleError::NotFound("message".into()))
    }

    async fn send(&self, token: &str, message: &OutgoingMessage) -> Result<SentMessage, GoogleError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((token.to_string(), message.clone()));
        Ok(SentMessage {
            id: format!("sent-{}", sent.len()),
            thread_id: message.thread_id.clone().unwrap_or_else(|| "new-thread".into()),
        })
    }

    async fn create_draft(
        &self,
        _token: &str,
        message: &OutgoingMessage,
    ) -> Result<DraftSummary, GoogleError> {
        Ok(DraftSummary {
            id: "draft-1".into(),
            message_id: "draft-msg-1".into(),
            thread_id: "draft-thread-1".into(),
            to: message.to.clone(),
            subject: message.subject.clone(),
        })
    }

    async fn list_drafts(
        &self,
        _token: &str,
        _max_results: u32,
    ) -> Result<Vec<DraftSummary>, GoogleError> {
        Ok(Vec::new())
    }

    async fn update_draft(
        &self,
        token: &str,
        _draft_id: &str,
        message: &OutgoingMessage,
    ) -> Result<DraftSummary, GoogleError> {
        self.create_draft(token, message).await
    }

    async fn delete_draft(&self, _token: &str, _draft_id: &str) -> Result<(), GoogleError> {
        Ok(())
    }

    async fn send_draft(&self, _token: &str, draft_id: &str) -> Result<SentMessage, GoogleError> {
        Ok(SentMessage {
            id: format!("sent-{draft_id}"),
            thread_id: "draft-thread-1".into(),
        })
    }

    async fn profile(&self, token: &str) -> Result<MailboxProfile, GoogleError> {
        Ok(MailboxProfile {
            email_address: token.trim_start_matches("access:").to_string(),
            messages_total: 42,
            threads_total: 17,
        })
    }
}

/// Calendar with one fixed event; `delay` stalls `list_events`.
#[derive(Default)]
pub struct StubCalendar {
    pub delay: Option<Duration>,
    pub created: Mutex<Vec<NewEvent>>,
}

#[async_trait]
impl CalendarProvider for StubCalendar {
    async fn list_events(
        &self,
        _token: &str,
        _time_min: Option<DateTime<Utc>>,
        _time_max: Option<DateTime<Utc>>,
        _max_results: u32,
    ) -> Result<Vec<CalendarEvent>, GoogleError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(vec![CalendarEvent {
            id: "evt-1".into(),
            summary: "Standup".into(),
            description: None,
            location: None,
            start: Some("2026-10-19T09:00:00Z".into()),
            end: Some("2026-10-19T09:15:00Z".into()),
            attendees: Vec::new(),
            html_link: None,
        }])
    }

    async fn create_event(
        &self,
        _token: &str,
        event: &NewEvent,
    ) -> Result<CalendarEvent, GoogleError> {
        self.created.lock().unwrap().push(event.clone());
        Ok(CalendarEvent {
            id: "evt-new".into(),
            summary: event.summary.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start: Some(event.start.to_rfc3339()),
            end: Some(event.end.to_rfc3339()),
            attendees: event.attendees.clone(),
            html_link: None,
        })
    }

    async fn delete_event(&self, _token: &str, _event_id: &str) -> Result<(), GoogleError> {
        Ok(())
    }

    async fn list_calendars(&self, _token: &str) -> Result<Vec<CalendarInfo>, GoogleError> {
        Ok(vec![CalendarInfo {
            id: "primary".into(),
            summary: "Personal".into(),
            primary: true,
        }])
    }
}

/// Knobs for [`TestApp::build`].
#[derive(Default)]
pub struct Options {
    pub tool_timeout: Option<Duration>,
    pub calendar_delay: Option<Duration>,
    pub provider_fails: bool,
    pub revoke_fails: bool,
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub conversation: Arc<ScriptedConversation>,
    pub oauth: Arc<StubOAuth>,
    pub mail: Arc<RecordingMail>,
    pub calendar: Arc<StubCalendar>,
    pub signer: StateSigner,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Options::default())
    }

    pub fn build(options: Options) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("murmur.db");
        let pool = create_pool(
            path.to_str().unwrap(),
            DbRuntimeSettings {
                pool_max_size: 4,
                ..DbRuntimeSettings::default()
            },
        )
        .unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();

        let conversation = Arc::new(ScriptedConversation {
            fail: options.provider_fails,
            ..ScriptedConversation::default()
        });
        let oauth = Arc::new(StubOAuth {
            fail_revoke: options.revoke_fails,
            ..StubOAuth::default()
        });
        let mail = Arc::new(RecordingMail::default());
        let calendar = Arc::new(StubCalendar {
            delay: options.calendar_delay,
            ..StubCalendar::default()
        });
        let signer = StateSigner::new("test-state-secret", Duration::from_secs(600));

        let state = AppState {
            pool: pool.clone(),
            conversation: conversation.clone(),
            identity: Arc::new(TokenTable),
            oauth: oauth.clone(),
            mail: mail.clone(),
            calendar: calendar.clone(),
            oauth_state: signer.clone(),
            settings: ServerSettings {
                environment: "test".into(),
                frontend_url: "http://frontend.test".into(),
                tool_timeout: options.tool_timeout.unwrap_or(Duration::from_secs(5)),
            },
        };

        Self {
            router: app(state),
            pool,
            conversation,
            oauth,
            mail,
            calendar,
            signer,
            _dir: dir,
        }
    }

    pub async fn raw(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Creates a session and returns `(provider id, internal id)`.
    pub async fn create_session(&self, token: Option<&str>) -> (String, String) {
        let (status, body) = self
            .call("POST", "/api/realtime/session", token, Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["id"].as_str().unwrap().to_string(),
            body["session_id"].as_str().unwrap().to_string(),
        )
    }

    /// Invokes `tool` on the session with the given body fields.
    pub async fn tool(
        &self,
        token: Option<&str>,
        provider_id: &str,
        tool: &str,
        fields: Value,
    ) -> (StatusCode, Value) {
        let mut body = fields;
        body["sessionRef"] = Value::String(provider_id.to_string());
        self.call("POST", &format!("/api/tools/{tool}"), token, Some(body))
            .await
    }

    pub fn connect_account(&self, user_id: &str, email: &str) -> Account {
        self.connect_account_expiring(user_id, email, Utc::now() + chrono::Duration::hours(1))
    }

    pub fn connect_account_expiring(
        &self,
        user_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> Account {
        let conn = self.pool.get().unwrap();
        murmur_accounts::upsert_account(
            &conn,
            &NewAccount {
                user_id: user_id.to_string(),
                provider_user_id: format!("google-{email}"),
                email: email.to_string(),
                name: None,
                picture: None,
                scopes: Vec::new(),
                access_token: format!("access:{email}"),
                refresh_token: Some(format!("refresh:{email}")),
                token_expires_at: Some(expires_at),
            },
        )
        .unwrap()
    }
}

pub fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}
