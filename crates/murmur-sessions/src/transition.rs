//! Pure session state transitions.
//!
//! Every change to a stored session is expressed as a [`SessionEvent`] and
//! folded into the current row by [`transition`]. The function has no side
//! effects; the store decides whether and how to persist the result.

use crate::Session;
use chrono::{DateTime, Utc};
use murmur_db::{format_timestamp, parse_timestamp};
use murmur_types::{Mode, SessionStatus};

/// A requested change to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The conversation switched to another domain mode.
    ModeChanged { mode: Mode },
    /// The user picked an external account for mail/calendar tools.
    ///
    /// Claims an anonymous session for `user_id`.
    AccountSelected { email: String, user_id: String },
    /// Client-reported status change, optionally with final counters.
    StatusChanged {
        status: SessionStatus,
        error_message: Option<String>,
        duration_seconds: Option<i64>,
        total_messages: Option<i64>,
    },
    /// A transcript message was stored.
    MessageRecorded,
    /// The tool set was recomputed for `mode`.
    ToolsRecomputed { mode: Mode, tools: Vec<String> },
    /// A tool invocation completed.
    ToolCallRecorded,
}

impl SessionEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModeChanged { .. } => "mode_changed",
            Self::AccountSelected { .. } => "account_selected",
            Self::StatusChanged { .. } => "status_changed",
            Self::MessageRecorded => "message_recorded",
            Self::ToolsRecomputed { .. } => "tools_recomputed",
            Self::ToolCallRecorded => "tool_call_recorded",
        }
    }
}

/// Why an event left the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The session already ended; terminal rows are frozen.
    Terminal,
    /// A tool recompute raced with a later mode change.
    StaleMode,
    /// The event would not change anything.
    NoChange,
}

/// Result of folding an event into a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The event produced this new state.
    Apply(Session),
    /// The event is dropped.
    Skip(Skip),
}

/// Folds `event` into `current` at time `now`.
///
/// `updated_at` is stamped on every applied transition; `ended_at` on the
/// first transition into a terminal status. The version counter is left to
/// the store.
pub fn transition(current: &Session, event: &SessionEvent, now: DateTime<Utc>) -> Transition {
    if current.status.is_terminal() {
        return Transition::Skip(Skip::Terminal);
    }

    let mut next = current.clone();
    match event {
        SessionEvent::ModeChanged { mode } => {
            if *mode == current.mode {
                return Transition::Skip(Skip::NoChange);
            }
            next.mode = *mode;
        }
        SessionEvent::AccountSelected { email, user_id } => {
            if current.selected_account.as_deref() == Some(email.as_str())
                && current.user_id.is_some()
            {
                return Transition::Skip(Skip::NoChange);
            }
            next.selected_account = Some(email.clone());
            if next.user_id.is_none() {
                next.user_id = Some(user_id.clone());
            }
        }
        SessionEvent::StatusChanged {
            status,
            error_message,
            duration_seconds,
            total_messages,
        } => {
            next.status = *status;
            if error_message.is_some() {
                next.error_message = error_message.clone();
            }
            if let Some(total) = total_messages {
                next.total_messages = *total;
            }
            if duration_seconds.is_some() {
                next.duration_seconds = *duration_seconds;
            }
            if status.is_terminal() {
                next.ended_at = Some(format_timestamp(now));
                if next.duration_seconds.is_none() {
                    next.duration_seconds = parse_timestamp(&current.started_at)
                        .map(|started| (now - started).num_seconds().max(0));
                }
            }
        }
        SessionEvent::MessageRecorded => {
            next.total_messages += 1;
        }
        SessionEvent::ToolsRecomputed { mode, tools } => {
            if *mode != current.mode {
                return Transition::Skip(Skip::StaleMode);
            }
            if *tools == current.active_tools {
                return Transition::Skip(Skip::NoChange);
            }
            next.active_tools = tools.clone();
        }
        SessionEvent::ToolCallRecorded => {
            next.tool_calls += 1;
        }
    }

    next.updated_at = format_timestamp(now);
    Transition::Apply(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn session() -> Session {
        Session {
            id: "s-1".into(),
            provider_session_id: "sess_1".into(),
            user_id: None,
            mode: Mode::None,
            selected_account: None,
            active_tools: vec!["set_mode".into(), "select_account".into()],
            status: SessionStatus::Active,
            model: "m".into(),
            voice: "v".into(),
            error_message: None,
            duration_seconds: None,
            total_messages: 0,
            tool_calls: 0,
            metadata: serde_json::json!({}),
            version: 3,
            started_at: format_timestamp(at(0)),
            updated_at: format_timestamp(at(0)),
            ended_at: None,
        }
    }

    fn applied(t: Transition) -> Session {
        match t {
            Transition::Apply(s) => s,
            Transition::Skip(reason) => panic!("expected apply, skipped: {reason:?}"),
        }
    }

    #[test]
    fn mode_change_stamps_updated_at_and_keeps_version() {
        let next = applied(transition(
            &session(),
            &SessionEvent::ModeChanged { mode: Mode::Todo },
            at(5),
        ));
        assert_eq!(next.mode, Mode::Todo);
        assert_eq!(next.updated_at, format_timestamp(at(5)));
        assert_eq!(next.version, 3);
    }

    #[test]
    fn same_mode_is_skipped() {
        assert_eq!(
            transition(&session(), &SessionEvent::ModeChanged { mode: Mode::None }, at(1)),
            Transition::Skip(Skip::NoChange)
        );
    }

    #[test]
    fn recompute_for_an_old_mode_is_dropped() {
        let mut s = session();
        s.mode = Mode::Calendar;
        let event = SessionEvent::ToolsRecomputed {
            mode: Mode::Email,
            tools: vec!["set_mode".into(), "email_actions".into()],
        };
        assert_eq!(transition(&s, &event, at(1)), Transition::Skip(Skip::StaleMode));
    }

    #[test]
    fn account_selection_claims_anonymous_session() {
        let next = applied(transition(
            &session(),
            &SessionEvent::AccountSelected {
                email: "a@example.com".into(),
                user_id: "user-1".into(),
            },
            at(1),
        ));
        assert_eq!(next.user_id.as_deref(), Some("user-1"));
        assert_eq!(next.selected_account.as_deref(), Some("a@example.com"));

        let mut owned = session();
        owned.user_id = Some("owner".into());
        let next = applied(transition(
            &owned,
            &SessionEvent::AccountSelected {
                email: "b@example.com".into(),
                user_id: "someone-else".into(),
            },
            at(1),
        ));
        assert_eq!(next.user_id.as_deref(), Some("owner"));
    }

    #[test]
    fn terminal_status_sets_ended_at_and_duration() {
        let next = applied(transition(
            &session(),
            &SessionEvent::StatusChanged {
                status: SessionStatus::Completed,
                error_message: None,
                duration_seconds: None,
                total_messages: Some(12),
            },
            at(90),
        ));
        assert_eq!(next.status, SessionStatus::Completed);
        assert_eq!(next.ended_at, Some(format_timestamp(at(90))));
        assert_eq!(next.duration_seconds, Some(90));
        assert_eq!(next.total_messages, 12);
    }

    #[test]
    fn terminal_sessions_are_frozen() {
        let mut s = session();
        s.status = SessionStatus::Failed;
        for event in [
            SessionEvent::ModeChanged { mode: Mode::Todo },
            SessionEvent::MessageRecorded,
            SessionEvent::ToolCallRecorded,
            SessionEvent::StatusChanged {
                status: SessionStatus::Completed,
                error_message: None,
                duration_seconds: None,
                total_messages: None,
            },
        ] {
            assert_eq!(transition(&s, &event, at(1)), Transition::Skip(Skip::Terminal));
        }
    }

    #[test]
    fn counters_increment() {
        let s = applied(transition(&session(), &SessionEvent::MessageRecorded, at(1)));
        let s = applied(transition(&s, &SessionEvent::ToolCallRecorded, at(2)));
        assert_eq!((s.total_messages, s.tool_calls), (1, 1));
    }
}
