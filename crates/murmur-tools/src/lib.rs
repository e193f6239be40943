//! Tool catalog and tool-set resolution.
//!
//! [`catalog`] holds the immutable definitions of every tool the model can
//! be offered, grouped by domain, with the authorization tier and account
//! scoping the dispatcher enforces. [`resolver`] turns a session's mode and
//! the user's connected accounts into the concrete tool list sent to the
//! model.

pub mod catalog;
pub mod resolver;

pub use catalog::{find, list_domains, meta_tools, tools_for, tools_for_mode, CatalogEntry};
pub use resolver::{resolve, resolve_for_user, Resolution};

/// Errors that can occur while resolving tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("account lookup failed: {0}")]
    Accounts(#[from] murmur_accounts::AccountError),
}
