//! Computes the tool set a session exposes to the model.

use crate::catalog::{self, SELECT_ACCOUNT, SELECT_ACCOUNT_TEMPLATE};
use crate::ToolError;
use murmur_types::{Mode, ToolDefinition};
use rusqlite::Connection;

/// The tools exposed for one (mode, accounts) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Meta tools first, then domain tools, in catalog order.
    pub tools: Vec<ToolDefinition>,
    /// The mode the tool set actually reflects. Differs from the requested
    /// mode when an account-scoped mode was asked for without accounts.
    pub granted_mode: Mode,
}

impl Resolution {
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

fn describe_accounts(tool: &mut ToolDefinition, account_emails: &[String]) {
    tool.description = SELECT_ACCOUNT_TEMPLATE.replace("{accounts}", &account_emails.join(", "));
}

/// Resolves the tool set for `mode` given the user's account emails, in the
/// order the account directory returns them.
///
/// Identical inputs always produce identical output.
pub fn resolve(mode: Mode, account_emails: &[String]) -> Resolution {
    let mut tools = catalog::meta_tools();
    if !account_emails.is_empty() {
        if let Some(select) = tools.iter_mut().find(|t| t.name == SELECT_ACCOUNT) {
            describe_accounts(select, account_emails);
        }
    }

    let granted_mode = if mode.is_account_scoped() && account_emails.is_empty() {
        Mode::None
    } else {
        mode
    };
    tools.extend(catalog::tools_for_mode(granted_mode));

    Resolution {
        tools,
        granted_mode,
    }
}

/// Resolves the tool set for `mode` using `user_id`'s connected accounts.
pub fn resolve_for_user(
    conn: &Connection,
    mode: Mode,
    user_id: Option<&str>,
) -> Result<Resolution, ToolError> {
    let emails = murmur_accounts::account_emails(conn, user_id)?;
    let resolution = resolve(mode, &emails);
    if resolution.granted_mode != mode {
        tracing::debug!(
            requested = %mode,
            granted = %resolution.granted_mode,
            "mode requires a connected account"
        );
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EMAIL_ACTIONS, SELECT_ACCOUNT_DESCRIPTION, SET_MODE, TODO_ACTIONS};

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mode_none_is_meta_only() {
        let r = resolve(Mode::None, &[]);
        assert_eq!(r.names(), vec![SET_MODE, SELECT_ACCOUNT]);
        assert_eq!(r.granted_mode, Mode::None);
    }

    #[test]
    fn account_scoped_mode_without_accounts_is_exactly_meta() {
        for mode in [Mode::Email, Mode::Calendar] {
            let r = resolve(mode, &[]);
            assert_eq!(r.tools, catalog::meta_tools());
            assert_eq!(r.granted_mode, Mode::None);
        }
    }

    #[test]
    fn non_scoped_modes_work_without_accounts() {
        let r = resolve(Mode::Todo, &[]);
        assert_eq!(r.names(), vec![SET_MODE, SELECT_ACCOUNT, TODO_ACTIONS]);
        assert_eq!(r.granted_mode, Mode::Todo);

        let relax = resolve(Mode::Relax, &[]);
        assert_eq!(relax.names(), vec![SET_MODE, SELECT_ACCOUNT]);
        assert_eq!(relax.granted_mode, Mode::Relax);
    }

    #[test]
    fn accounts_are_listed_in_select_account() {
        let r = resolve(Mode::Email, &emails(&["a@example.com", "b@example.com"]));
        assert_eq!(r.names(), vec![SET_MODE, SELECT_ACCOUNT, EMAIL_ACTIONS]);
        assert!(r.tools[1].description.ends_with("a@example.com, b@example.com."));
        assert_eq!(
            catalog::find(SELECT_ACCOUNT).unwrap().definition.description,
            SELECT_ACCOUNT_DESCRIPTION
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let accounts = emails(&["z@example.com", "a@example.com"]);
        for mode in Mode::ALL {
            let first = resolve(mode, &accounts);
            let second = resolve(mode, &accounts);
            assert_eq!(first, second);
            assert_eq!(
                serde_json::to_string(&first.tools).unwrap(),
                serde_json::to_string(&second.tools).unwrap()
            );
        }
    }

    #[test]
    fn resolve_for_user_reads_the_directory() {
        let conn = Connection::open_in_memory().unwrap();
        murmur_db::run_migrations(&conn).unwrap();
        murmur_accounts::upsert_account(
            &conn,
            &murmur_accounts::NewAccount {
                user_id: "u1".into(),
                provider_user_id: "g1".into(),
                email: "me@example.com".into(),
                name: None,
                picture: None,
                scopes: vec![],
                access_token: "t".into(),
                refresh_token: None,
                token_expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
            },
        )
        .unwrap();

        let owner = resolve_for_user(&conn, Mode::Email, Some("u1")).unwrap();
        assert!(owner.contains(EMAIL_ACTIONS));

        let stranger = resolve_for_user(&conn, Mode::Email, Some("u2")).unwrap();
        assert!(!stranger.contains(EMAIL_ACTIONS));
        let anonymous = resolve_for_user(&conn, Mode::Email, None).unwrap();
        assert_eq!(anonymous.granted_mode, Mode::None);
    }
}
