//! Google collaborators: OAuth, Gmail and Calendar.
//!
//! Each remote surface is a trait ([`OAuthProvider`], [`MailProvider`],
//! [`CalendarProvider`]) with a reqwest implementation over the Google REST
//! APIs. The server only depends on the traits.

pub mod calendar;
pub mod config;
pub mod error;
pub mod gmail;
pub mod message;
pub mod oauth;

pub use calendar::{CalendarEvent, CalendarInfo, CalendarProvider, GoogleCalendarClient, NewEvent};
pub use config::{GoogleConfig, SCOPES};
pub use error::GoogleError;
pub use gmail::{DraftSummary, GmailClient, MailProvider, MailboxProfile, MessageSummary, SentMessage};
pub use message::{build_reply, is_valid_email, MailMessage, OutgoingMessage};
pub use oauth::{GoogleOAuth, OAuthProvider, TokenGrant, UserInfo};
