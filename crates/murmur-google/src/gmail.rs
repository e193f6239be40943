use crate::config::GoogleConfig;
use crate::error::{check, GoogleError};
use crate::message::{split_addresses, MailMessage, OutgoingMessage};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Search result entry: headers only, no body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    pub date: Option<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub id: String,
    pub message_id: String,
    pub thread_id: String,
    pub to: Vec<String>,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxProfile {
    pub email_address: String,
    #[serde(default)]
    pub messages_total: u64,
    #[serde(default)]
    pub threads_total: u64,
}

/// Mailbox operations the email tool is built on. Every call takes the
/// access token of the account it acts for.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn search(
        &self,
        token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, GoogleError>;

    async fn get_message(&self, token: &str, id: &str) -> Result<MailMessage, GoogleError>;

    async fn send(&self, token: &str, message: &OutgoingMessage) -> Result<SentMessage, GoogleError>;

    async fn create_draft(
        &self,
        token: &str,
        message: &OutgoingMessage,
    ) -> Result<DraftSummary, GoogleError>;

    async fn list_drafts(&self, token: &str, max_results: u32)
        -> Result<Vec<DraftSummary>, GoogleError>;

    async fn update_draft(
        &self,
        token: &str,
        draft_id: &str,
        message: &OutgoingMessage,
    ) -> Result<DraftSummary, GoogleError>;

    async fn delete_draft(&self, token: &str, draft_id: &str) -> Result<(), GoogleError>;

    async fn send_draft(&self, token: &str, draft_id: &str) -> Result<SentMessage, GoogleError>;

    async fn profile(&self, token: &str) -> Result<MailboxProfile, GoogleError>;
}

// Gmail wire shapes.

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    payload: Option<WirePart>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<WireHeader>,
    #[serde(default)]
    body: Option<WireBody>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct WireHeader {
    name: String,
    value: String,
}

#[derive(Deserialize, Default)]
struct WireBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct WireDraft {
    id: String,
    #[serde(default)]
    message: Option<WireMessage>,
}

#[derive(Deserialize, Default)]
struct MessageList {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize, Default)]
struct DraftList {
    #[serde(default)]
    drafts: Vec<WireDraft>,
}

impl WirePart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// First `text/plain` body in the part tree.
    fn plain_text(&self) -> Option<String> {
        if self.mime_type.starts_with("text/plain") || (self.mime_type.is_empty() && self.parts.is_empty()) {
            if let Some(data) = self.body.as_ref().and_then(|b| b.data.as_deref()) {
                return decode_body(data);
            }
        }
        self.parts.iter().find_map(WirePart::plain_text)
    }
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}

impl From<WireMessage> for MailMessage {
    fn from(wire: WireMessage) -> Self {
        let payload = wire.payload.unwrap_or_default();
        let header = |name: &str| payload.header(name).map(str::to_string);
        MailMessage {
            from: header("From").unwrap_or_default(),
            to: header("To").map(|v| split_addresses(&v)).unwrap_or_default(),
            cc: header("Cc").map(|v| split_addresses(&v)).unwrap_or_default(),
            subject: header("Subject").unwrap_or_default(),
            date: header("Date"),
            message_id: header("Message-ID"),
            references: header("References"),
            body: payload.plain_text(),
            id: wire.id,
            thread_id: wire.thread_id,
            snippet: wire.snippet,
            labels: wire.label_ids,
        }
    }
}

impl From<MailMessage> for MessageSummary {
    fn from(m: MailMessage) -> Self {
        Self {
            id: m.id,
            thread_id: m.thread_id,
            from: m.from,
            subject: m.subject,
            date: m.date,
            snippet: m.snippet,
        }
    }
}

fn draft_summary(draft: WireDraft) -> DraftSummary {
    let message: MailMessage = draft.message.map(MailMessage::from).unwrap_or_default();
    DraftSummary {
        id: draft.id,
        message_id: message.id,
        thread_id: message.thread_id,
        to: message.to,
        subject: message.subject,
    }
}

fn raw_body(message: &OutgoingMessage) -> serde_json::Value {
    let mut body = json!({ "raw": message.encode_raw() });
    if let Some(thread_id) = &message.thread_id {
        body["threadId"] = json!(thread_id);
    }
    body
}

/// [`MailProvider`] over the Gmail REST API.
#[derive(Debug, Clone)]
pub struct GmailClient {
    base_url: String,
    http: reqwest::Client,
}

impl GmailClient {
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            base_url: config.gmail_base_url.trim_end_matches('/').to_string(),
            http: config.http_client(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.base_url)
    }

    async fn metadata(&self, token: &str, id: &str) -> Result<MailMessage, GoogleError> {
        let response = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .bearer_auth(token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await?;
        let wire: WireMessage = check(response, "message").await?.json().await?;
        Ok(wire.into())
    }

    async fn draft(&self, token: &str, id: &str) -> Result<DraftSummary, GoogleError> {
        let response = self
            .http
            .get(self.url(&format!("drafts/{id}")))
            .bearer_auth(token)
            .query(&[("format", "metadata")])
            .send()
            .await?;
        let wire: WireDraft = check(response, "draft").await?.json().await?;
        Ok(draft_summary(wire))
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn search(
        &self,
        token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, GoogleError> {
        let response = self
            .http
            .get(self.url("messages"))
            .bearer_auth(token)
            .query(&[("q", query), ("maxResults", max_results.to_string().as_str())])
            .send()
            .await?;
        let list: MessageList = check(response, "messages").await?.json().await?;

        let mut summaries = Vec::with_capacity(list.messages.len());
        for entry in list.messages {
            summaries.push(self.metadata(token, &entry.id).await?.into());
        }
        tracing::debug!(results = summaries.len(), "mail search complete");
        Ok(summaries)
    }

    async fn get_message(&self, token: &str, id: &str) -> Result<MailMessage, GoogleError> {
        let response = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .bearer_auth(token)
            .query(&[("format", "full")])
            .send()
            .await?;
        let wire: WireMessage = check(response, "message").await?.json().await?;
        Ok(wire.into())
    }

    async fn send(&self, token: &str, message: &OutgoingMessage) -> Result<SentMessage, GoogleError> {
        message.validate()?;
        let response = self
            .http
            .post(self.url("messages/send"))
            .bearer_auth(token)
            .json(&raw_body(message))
            .send()
            .await?;
        let wire: WireMessage = check(response, "message").await?.json().await?;
        tracing::info!(message_id = %wire.id, thread_id = %wire.thread_id, "mail sent");
        Ok(SentMessage {
            id: wire.id,
            thread_id: wire.thread_id,
        })
    }

    async fn create_draft(
        &self,
        token: &str,
        message: &OutgoingMessage,
    ) -> Result<DraftSummary, GoogleError> {
        message.validate()?;
        let response = self
            .http
            .post(self.url("drafts"))
            .bearer_auth(token)
            .json(&json!({ "message": raw_body(message) }))
            .send()
            .await?;
        let wire: WireDraft = check(response, "draft").await?.json().await?;
        let mut summary = draft_summary(wire);
        summary.to = message.to.clone();
        summary.subject = message.subject.clone();
        Ok(summary)
    }

    async fn list_drafts(
        &self,
        token: &str,
        max_results: u32,
    ) -> Result<Vec<DraftSummary>, GoogleError> {
        let response = self
            .http
            .get(self.url("drafts"))
            .bearer_auth(token)
            .query(&[("maxResults", max_results.to_string())])
            .send()
            .await?;
        let list: DraftList = check(response, "drafts").await?.json().await?;

        let mut drafts = Vec::with_capacity(list.drafts.len());
        for entry in list.drafts {
            drafts.push(self.draft(token, &entry.id).await?);
        }
        Ok(drafts)
    }

    async fn update_draft(
        &self,
        token: &str,
        draft_id: &str,
        message: &OutgoingMessage,
    ) -> Result<DraftSummary, GoogleError> {
        message.validate()?;
        let response = self
            .http
            .put(self.url(&format!("drafts/{draft_id}")))
            .bearer_auth(token)
            .json(&json!({ "id": draft_id, "message": raw_body(message) }))
            .send()
            .await?;
        let wire: WireDraft = check(response, "draft").await?.json().await?;
        let mut summary = draft_summary(wire);
        summary.to = message.to.clone();
        summary.subject = message.subject.clone();
        Ok(summary)
    }

    async fn delete_draft(&self, token: &str, draft_id: &str) -> Result<(), GoogleError> {
        let response = self
            .http
            .delete(self.url(&format!("drafts/{draft_id}")))
            .bearer_auth(token)
            .send()
            .await?;
        check(response, "draft").await?;
        Ok(())
    }

    async fn send_draft(&self, token: &str, draft_id: &str) -> Result<SentMessage, GoogleError> {
        let response = self
            .http
            .post(self.url("drafts/send"))
            .bearer_auth(token)
            .json(&json!({ "id": draft_id }))
            .send()
            .await?;
        let wire: WireMessage = check(response, "draft").await?.json().await?;
        tracing::info!(draft_id, message_id = %wire.id, "draft sent");
        Ok(SentMessage {
            id: wire.id,
            thread_id: wire.thread_id,
        })
    }

    async fn profile(&self, token: &str) -> Result<MailboxProfile, GoogleError> {
        let response = self
            .http
            .get(self.url("profile"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check(response, "profile").await?.json().await?)
    }
}
