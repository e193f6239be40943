//! Domain tool handlers.
//!
//! Each handler receives a [`ToolContext`] that the dispatcher has already
//! vetted (session live, caller authorized, credentials fresh) and runs one
//! action. Handlers return the JSON the model sees.

pub mod calendar;
pub mod email;
pub mod learning;
pub mod meta;
pub mod todo;

use crate::api::ApiError;
use murmur_accounts::Account;
use murmur_db::DbPool;
use murmur_google::{CalendarProvider, MailProvider};
use murmur_sessions::Session;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// Everything a domain handler may touch.
#[derive(Clone)]
pub struct ToolContext {
    pub pool: DbPool,
    pub user_id: Option<String>,
    pub session: Session,
    /// Present for account-scoped tools, with a usable access token.
    pub account: Option<Account>,
    pub mail: Arc<dyn MailProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
}

impl ToolContext {
    pub fn user(&self) -> Result<&str, ApiError> {
        self.user_id
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }

    pub fn account(&self) -> Result<&Account, ApiError> {
        self.account
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("no account selected".to_string()))
    }
}

/// Loosely typed tool arguments as the model sends them.
#[derive(Debug, Clone, Default)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Non-blank string value, trimmed.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_string)
    }

    pub fn required(&self, key: &str) -> Result<&str, ApiError> {
        self.str(key)
            .ok_or_else(|| ApiError::BadRequest(format!("{key} is required")))
    }

    /// Parses an optional enum-like value; a present but unknown value is a
    /// validation error.
    pub fn parsed<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.str(key)
            .map(|raw| raw.parse::<T>().map_err(|e| ApiError::BadRequest(e.to_string())))
            .transpose()
    }

    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// Integer given as a number or a numeric string.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// A list given as a JSON array or a comma-separated string.
    pub fn list(&self, key: &str) -> Vec<String> {
        let raw: Vec<String> = match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => Args::new(map),
            _ => Args::default(),
        }
    }

    #[test]
    fn lists_accept_arrays_and_comma_strings() {
        let a = args(json!({
            "to": ["ada@example.com", " "],
            "cc": "bob@example.com, carol@example.com",
        }));
        assert_eq!(a.list("to"), vec!["ada@example.com"]);
        assert_eq!(a.list("cc"), vec!["bob@example.com", "carol@example.com"]);
        assert!(a.list("bcc").is_empty());
    }

    #[test]
    fn scalars_are_lenient() {
        let a = args(json!({
            "max_results": "7",
            "progress_percentage": 42.0,
            "reply_all": "true",
            "title": "   ",
        }));
        assert_eq!(a.int("max_results"), Some(7));
        assert_eq!(a.int("progress_percentage"), Some(42));
        assert!(a.flag("reply_all"));
        assert!(!a.flag("missing"));
        assert_eq!(a.str("title"), None);
        assert_eq!(a.required("title").unwrap_err().to_string(), "invalid input: title is required");
    }
}
