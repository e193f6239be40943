use crate::config::GoogleConfig;
use crate::error::{check, GoogleError};
use crate::message::{is_valid_email, validate_recipients};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// RFC 3339 timestamp, or a bare date for all-day events.
    pub start: Option<String>,
    pub end: Option<String>,
    pub attendees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
}

/// A validated event ready to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
}

impl NewEvent {
    /// Parses and checks event input: summary present, start and end valid
    /// RFC 3339 timestamps with end after start, attendees well-formed.
    pub fn parse(
        summary: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        description: Option<String>,
        location: Option<String>,
        attendees: Vec<String>,
    ) -> Result<Self, GoogleError> {
        let summary = summary
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GoogleError::Validation("summary is required".into()))?;
        let start = parse_instant("start", start)?;
        let end = parse_instant("end", end)?;
        if end <= start {
            return Err(GoogleError::Validation("end must be after start".into()));
        }
        validate_recipients(&attendees)?;
        Ok(Self {
            summary: summary.to_string(),
            description,
            location,
            start,
            end,
            attendees,
        })
    }
}

fn parse_instant(field: &str, value: Option<&str>) -> Result<DateTime<Utc>, GoogleError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GoogleError::Validation(format!("{field} is required")))?;
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| GoogleError::Validation(format!("{field} must be an RFC 3339 timestamp")))
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list_events(
        &self,
        token: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, GoogleError>;

    async fn create_event(&self, token: &str, event: &NewEvent)
        -> Result<CalendarEvent, GoogleError>;

    async fn delete_event(&self, token: &str, event_id: &str) -> Result<(), GoogleError>;

    async fn list_calendars(&self, token: &str) -> Result<Vec<CalendarInfo>, GoogleError>;
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    start: Option<WireTime>,
    #[serde(default)]
    end: Option<WireTime>,
    #[serde(default)]
    attendees: Vec<WireAttendee>,
    #[serde(default)]
    html_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct WireAttendee {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize, Default)]
struct EventList {
    #[serde(default)]
    items: Vec<WireEvent>,
}

#[derive(Deserialize, Default)]
struct CalendarList {
    #[serde(default)]
    items: Vec<CalendarInfo>,
}

impl From<WireEvent> for CalendarEvent {
    fn from(wire: WireEvent) -> Self {
        let when = |t: Option<WireTime>| t.and_then(|t| t.date_time.or(t.date));
        Self {
            id: wire.id,
            summary: wire.summary.unwrap_or_default(),
            description: wire.description,
            location: wire.location,
            start: when(wire.start),
            end: when(wire.end),
            attendees: wire
                .attendees
                .into_iter()
                .map(|a| a.email)
                .filter(|e| is_valid_email(e))
                .collect(),
            html_link: wire.html_link,
        }
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// [`CalendarProvider`] over the Google Calendar v3 API, primary calendar.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    base_url: String,
    http: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            base_url: config.calendar_base_url.trim_end_matches('/').to_string(),
            http: config.http_client(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.base_url)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list_events(
        &self,
        token: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, GoogleError> {
        let mut query = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if let Some(t) = time_min {
            query.push(("timeMin", rfc3339(t)));
        }
        if let Some(t) = time_max {
            query.push(("timeMax", rfc3339(t)));
        }
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;
        let list: EventList = check(response, "events").await?.json().await?;
        Ok(list.items.into_iter().map(CalendarEvent::from).collect())
    }

    async fn create_event(
        &self,
        token: &str,
        event: &NewEvent,
    ) -> Result<CalendarEvent, GoogleError> {
        let body = json!({
            "summary": event.summary,
            "description": event.description,
            "location": event.location,
            "start": { "dateTime": rfc3339(event.start) },
            "end": { "dateTime": rfc3339(event.end) },
            "attendees": event
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect::<Vec<_>>(),
        });
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let wire: WireEvent = check(response, "event").await?.json().await?;
        tracing::info!(event_id = %wire.id, "calendar event created");
        Ok(wire.into())
    }

    async fn delete_event(&self, token: &str, event_id: &str) -> Result<(), GoogleError> {
        let response = self
            .http
            .delete(format!("{}/{event_id}", self.events_url()))
            .bearer_auth(token)
            .send()
            .await?;
        check(response, "event").await?;
        Ok(())
    }

    async fn list_calendars(&self, token: &str) -> Result<Vec<CalendarInfo>, GoogleError> {
        let response = self
            .http
            .get(format!("{}/users/me/calendarList", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        let list: CalendarList = check(response, "calendars").await?.json().await?;
        Ok(list.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_input_is_validated_before_any_call() {
        let ok = NewEvent::parse(
            Some("Standup"),
            Some("2026-03-02T09:00:00Z"),
            Some("2026-03-02T09:15:00+00:00"),
            None,
            None,
            vec!["ada@example.com".into()],
        )
        .unwrap();
        assert_eq!(ok.summary, "Standup");
        assert_eq!(rfc3339(ok.end), "2026-03-02T09:15:00Z");

        let cases = [
            (None, Some("2026-03-02T09:00:00Z"), Some("2026-03-02T10:00:00Z"), "summary is required"),
            (Some("x"), None, Some("2026-03-02T10:00:00Z"), "start is required"),
            (Some("x"), Some("tomorrow"), Some("2026-03-02T10:00:00Z"), "start must be an RFC 3339 timestamp"),
            (Some("x"), Some("2026-03-02T10:00:00Z"), Some("2026-03-02T10:00:00Z"), "end must be after start"),
        ];
        for (summary, start, end, message) in cases {
            let err = NewEvent::parse(summary, start, end, None, None, vec![]).unwrap_err();
            assert_eq!(err.to_string(), message);
        }

        let err = NewEvent::parse(
            Some("x"),
            Some("2026-03-02T09:00:00Z"),
            Some("2026-03-02T10:00:00Z"),
            None,
            None,
            vec!["not-an-address".into()],
        )
        .unwrap_err();
        assert!(matches!(err, GoogleError::Validation(_)));
    }

    #[test]
    fn all_day_events_use_their_date() {
        let event: CalendarEvent = serde_json::from_value::<WireEvent>(json!({
            "id": "e1",
            "summary": "Holiday",
            "start": {"date": "2026-12-25"},
            "end": {"date": "2026-12-26"},
            "attendees": [{"email": "ada@example.com"}]
        }))
        .unwrap()
        .into();
        assert_eq!(event.start.as_deref(), Some("2026-12-25"));
        assert_eq!(event.attendees, vec!["ada@example.com"]);
        assert!(event.html_link.is_none());
    }
}
