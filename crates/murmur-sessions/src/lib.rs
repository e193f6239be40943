//! Session store for the Murmur assistant.
//!
//! A session records one conversation: which domain mode it is in, which
//! external account its tools act on, which tools the model can currently
//! see, and its lifecycle status. This crate is the only writer of session
//! rows. All mutations are expressed as [`SessionEvent`]s, folded in by the
//! pure [`transition`] function and persisted by [`apply_event`] with an
//! optimistic version check, so concurrent tool calls on the same session
//! never lose each other's writes.
//!
//! Transcript messages live alongside sessions in [`messages`] and are
//! deleted with them.

mod error;
pub mod messages;
mod model;
mod store;
mod transition;

pub use error::SessionError;
pub use messages::{list_messages, record_message, ConversationMessage, MessageType, NewMessage};
pub use model::{NewSession, Session};
pub use store::{
    apply_event, create_session, delete_session, find_session, get_by_provider_id, get_session,
    list_sessions, Applied, SessionQuery, MAX_WRITE_ATTEMPTS,
};
pub use transition::{transition, SessionEvent, Skip, Transition};
