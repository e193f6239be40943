//! The static tool catalog.
//!
//! Base definitions are built once and never mutated. Callers receive clones,
//! so per-call adjustments (such as listing a user's accounts in a
//! description) cannot leak into other sessions.

use murmur_types::{AuthTier, Domain, Mode, PropertySchema, ToolDefinition};
use std::sync::LazyLock;

pub const SET_MODE: &str = "set_mode";
pub const SELECT_ACCOUNT: &str = "select_account";
pub const EMAIL_ACTIONS: &str = "email_actions";
pub const CALENDAR_ACTIONS: &str = "calendar_actions";
pub const TODO_ACTIONS: &str = "todo_actions";
pub const LEARNING_ACTIONS: &str = "learning_actions";

pub const EMAIL_OPERATIONS: &[&str] = &[
    "search",
    "get",
    "draft",
    "send",
    "reply",
    "summary",
    "list_drafts",
    "update_draft",
    "delete_draft",
    "send_draft",
];
pub const CALENDAR_OPERATIONS: &[&str] = &["list", "create", "delete"];
pub const TODO_OPERATIONS: &[&str] = &["list", "create", "update", "complete", "delete", "stats"];
pub const LEARNING_OPERATIONS: &[&str] = &[
    "list_topics",
    "create_topic",
    "get_topic",
    "update_topic",
    "delete_topic",
    "continue_topic",
    "save_progress",
    "stats",
];

/// Base description of `select_account` when the user has no accounts.
pub const SELECT_ACCOUNT_DESCRIPTION: &str =
    "Choose which connected account the email and calendar tools act on.";

/// Template used when the user has accounts; `{accounts}` is replaced with a
/// comma-separated list of their emails.
pub const SELECT_ACCOUNT_TEMPLATE: &str =
    "Choose which connected account the email and calendar tools act on. Connected accounts: {accounts}.";

/// A catalog tool plus the dispatch metadata the model never sees.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub definition: ToolDefinition,
    /// `None` for meta tools.
    pub domain: Option<Domain>,
    pub tier: AuthTier,
    /// Whether the tool acts on the session's selected external account.
    pub account_scoped: bool,
    /// Accepted values of the `action` argument; empty for meta tools.
    pub actions: &'static [&'static str],
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_meta(&self) -> bool {
        self.domain.is_none()
    }
}

fn set_mode() -> CatalogEntry {
    let modes: Vec<&str> = Mode::ALL.iter().map(|m| m.as_str()).collect();
    CatalogEntry {
        definition: ToolDefinition::function(
            SET_MODE,
            "Switch the assistant to a domain mode. Call this before using email, calendar, \
             todo or learning tools; use 'relax' for casual conversation and 'none' to leave a mode.",
        )
        .with_property("mode", PropertySchema::one_of("Mode to switch to.", &modes), true),
        domain: None,
        tier: AuthTier::SoftAuth,
        account_scoped: false,
        actions: &[],
    }
}

fn select_account() -> CatalogEntry {
    CatalogEntry {
        definition: ToolDefinition::function(SELECT_ACCOUNT, SELECT_ACCOUNT_DESCRIPTION).with_property(
            "email",
            PropertySchema::string("Email address of the connected account to use."),
            true,
        ),
        domain: None,
        tier: AuthTier::HardAuth,
        account_scoped: false,
        actions: &[],
    }
}

fn action_property(actions: &[&str]) -> PropertySchema {
    PropertySchema::one_of("Operation to perform.", actions)
}

fn email_actions() -> CatalogEntry {
    let definition = ToolDefinition::function(
        EMAIL_ACTIONS,
        "Read, search, draft, send and reply to email on the selected account.",
    )
    .with_property("action", action_property(EMAIL_OPERATIONS), true)
    .with_property("query", PropertySchema::string("Search query, e.g. 'from:alice is:unread'."), false)
    .with_property("message_id", PropertySchema::string("Message to read or reply to."), false)
    .with_property("draft_id", PropertySchema::string("Draft to update, send or delete."), false)
    .with_property("to", PropertySchema::string_list("Recipient addresses."), false)
    .with_property("cc", PropertySchema::string_list("Carbon-copy addresses."), false)
    .with_property("subject", PropertySchema::string("Subject line."), false)
    .with_property("body", PropertySchema::string("Plain-text body."), false)
    .with_property(
        "reply_all",
        PropertySchema::boolean("Reply to every original recipient instead of only the sender."),
        false,
    )
    .with_property("max_results", PropertySchema::integer("Maximum messages to return."), false);

    CatalogEntry {
        definition,
        domain: Some(Domain::Email),
        tier: AuthTier::HardAuth,
        account_scoped: true,
        actions: EMAIL_OPERATIONS,
    }
}

fn calendar_actions() -> CatalogEntry {
    let definition = ToolDefinition::function(
        CALENDAR_ACTIONS,
        "List, create and delete events on the selected account's primary calendar.",
    )
    .with_property("action", action_property(CALENDAR_OPERATIONS), true)
    .with_property("time_min", PropertySchema::string("RFC 3339 lower bound for listed events."), false)
    .with_property("time_max", PropertySchema::string("RFC 3339 upper bound for listed events."), false)
    .with_property("event_id", PropertySchema::string("Event to delete."), false)
    .with_property("summary", PropertySchema::string("Event title."), false)
    .with_property("description", PropertySchema::string("Event details."), false)
    .with_property("location", PropertySchema::string("Event location."), false)
    .with_property("start", PropertySchema::string("RFC 3339 start time."), false)
    .with_property("end", PropertySchema::string("RFC 3339 end time."), false)
    .with_property("attendees", PropertySchema::string_list("Attendee email addresses."), false)
    .with_property("max_results", PropertySchema::integer("Maximum events to return."), false);

    CatalogEntry {
        definition,
        domain: Some(Domain::Calendar),
        tier: AuthTier::HardAuth,
        account_scoped: true,
        actions: CALENDAR_OPERATIONS,
    }
}

fn todo_actions() -> CatalogEntry {
    let definition = ToolDefinition::function(
        TODO_ACTIONS,
        "Manage the user's todo list. 'complete' accepts a todo_id or a title fragment.",
    )
    .with_property("action", action_property(TODO_OPERATIONS), true)
    .with_property("todo_id", PropertySchema::string("Todo to update, complete or delete."), false)
    .with_property("title", PropertySchema::string("Todo title, or a fragment of it for 'complete'."), false)
    .with_property("description", PropertySchema::string("Longer notes."), false)
    .with_property(
        "status",
        PropertySchema::one_of("Todo status.", &["todo", "in_progress", "done"]),
        false,
    )
    .with_property(
        "priority",
        PropertySchema::one_of("Todo priority.", &["low", "medium", "high"]),
        false,
    )
    .with_property(
        "category",
        PropertySchema::string("Category name; inferred from the title when omitted."),
        false,
    )
    .with_property("due_date", PropertySchema::string("Due date (YYYY-MM-DD or RFC 3339)."), false);

    CatalogEntry {
        definition,
        domain: Some(Domain::Todo),
        tier: AuthTier::HardAuth,
        account_scoped: false,
        actions: TODO_OPERATIONS,
    }
}

fn learning_actions() -> CatalogEntry {
    let definition = ToolDefinition::function(
        LEARNING_ACTIONS,
        "Track learning topics: resume a topic where the user left off and save what was covered.",
    )
    .with_property("action", action_property(LEARNING_OPERATIONS), true)
    .with_property("topic_id", PropertySchema::string("Topic to act on."), false)
    .with_property("title", PropertySchema::string("Topic title."), false)
    .with_property("description", PropertySchema::string("What the topic is about."), false)
    .with_property("category", PropertySchema::string("Subject area."), false)
    .with_property(
        "difficulty",
        PropertySchema::one_of("Difficulty.", &["beginner", "intermediate", "advanced"]),
        false,
    )
    .with_property(
        "status",
        PropertySchema::one_of(
            "Topic status.",
            &["not_started", "in_progress", "completed", "paused"],
        ),
        false,
    )
    .with_property("progress_percentage", PropertySchema::integer("Progress from 0 to 100."), false)
    .with_property("summary", PropertySchema::string("Summary of this study session."), false)
    .with_property("concepts", PropertySchema::string_list("Concepts covered."), false)
    .with_property("next_steps", PropertySchema::string("What to study next time."), false);

    CatalogEntry {
        definition,
        domain: Some(Domain::Learning),
        tier: AuthTier::HardAuth,
        account_scoped: false,
        actions: LEARNING_OPERATIONS,
    }
}

static CATALOG: LazyLock<Vec<CatalogEntry>> = LazyLock::new(|| {
    vec![
        set_mode(),
        select_account(),
        email_actions(),
        calendar_actions(),
        todo_actions(),
        learning_actions(),
    ]
});

/// Every domain the catalog knows, including those without tools.
pub fn list_domains() -> Vec<Domain> {
    vec![
        Domain::Email,
        Domain::Calendar,
        Domain::Todo,
        Domain::Learning,
        Domain::Relax,
    ]
}

/// Tools of one domain, in catalog order. Empty for tool-less domains.
pub fn tools_for(domain: Domain) -> Vec<ToolDefinition> {
    CATALOG
        .iter()
        .filter(|entry| entry.domain == Some(domain))
        .map(|entry| entry.definition.clone())
        .collect()
}

/// Domain tools backing `mode`; empty for [`Mode::None`].
pub fn tools_for_mode(mode: Mode) -> Vec<ToolDefinition> {
    mode.domain().map(tools_for).unwrap_or_default()
}

/// `set_mode` and `select_account`, always in that order.
pub fn meta_tools() -> Vec<ToolDefinition> {
    CATALOG
        .iter()
        .filter(|entry| entry.is_meta())
        .map(|entry| entry.definition.clone())
        .collect()
}

/// Looks up a tool and its dispatch metadata by name.
pub fn find(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.definition.name == name)
}
