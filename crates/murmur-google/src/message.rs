//! Mail message model, RFC 2822 composition and reply threading.

use crate::error::GoogleError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Serialize;

/// A message as read from the mailbox.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MailMessage {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub date: Option<String>,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// The `Message-ID` header.
    #[serde(skip)]
    pub message_id: Option<String>,
    #[serde(skip)]
    pub references: Option<String>,
    pub labels: Vec<String>,
}

/// A message to send or store as a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl OutgoingMessage {
    pub fn new(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Requires at least one recipient and a well-formed address for every
    /// `To` and `Cc` entry.
    pub fn validate(&self) -> Result<(), GoogleError> {
        if self.to.is_empty() {
            return Err(GoogleError::Validation("at least one recipient is required".into()));
        }
        validate_recipients(&self.to)?;
        validate_recipients(&self.cc)
    }

    /// Renders the message as an RFC 2822 document with CRLF line endings.
    pub fn to_rfc2822(&self) -> String {
        let mut out = String::new();
        push_header(&mut out, "To", &self.to.join(", "));
        if !self.cc.is_empty() {
            push_header(&mut out, "Cc", &self.cc.join(", "));
        }
        push_header(&mut out, "Subject", &encode_header_value(&self.subject));
        if let Some(id) = &self.in_reply_to {
            push_header(&mut out, "In-Reply-To", id);
        }
        if let Some(refs) = &self.references {
            push_header(&mut out, "References", refs);
        }
        push_header(&mut out, "MIME-Version", "1.0");
        push_header(&mut out, "Content-Type", "text/plain; charset=\"UTF-8\"");
        push_header(&mut out, "Content-Transfer-Encoding", "8bit");
        out.push_str("\r\n");
        out.push_str(&normalize_newlines(&self.body));
        out
    }

    /// base64url form expected by the Gmail `raw` field.
    pub fn encode_raw(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_rfc2822())
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    // CR/LF in a value would start a new header.
    let value: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    out.push_str(name);
    out.push_str(": ");
    out.push_str(&value);
    out.push_str("\r\n");
}

fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

fn normalize_newlines(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Builds a reply that stays in the original thread.
///
/// The reply goes to the original sender. With `reply_all` the original `To`
/// and `Cc` recipients are copied, minus `own_address` and the sender,
/// deduplicated case-insensitively.
pub fn build_reply(
    original: &MailMessage,
    own_address: &str,
    body: &str,
    reply_all: bool,
) -> OutgoingMessage {
    let sender = original.from.trim().to_string();
    let mut cc = Vec::new();
    if reply_all {
        let mut seen = vec![
            address_of(own_address).to_lowercase(),
            address_of(&sender).to_lowercase(),
        ];
        for recipient in original.to.iter().chain(original.cc.iter()) {
            let key = address_of(recipient).to_lowercase();
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            cc.push(recipient.trim().to_string());
        }
    }

    let references = match (&original.references, &original.message_id) {
        (Some(refs), Some(id)) if !refs.trim().is_empty() => Some(format!("{} {id}", refs.trim())),
        (_, Some(id)) => Some(id.clone()),
        (Some(refs), None) if !refs.trim().is_empty() => Some(refs.trim().to_string()),
        _ => None,
    };

    OutgoingMessage {
        to: vec![sender],
        cc,
        subject: reply_subject(&original.subject),
        body: body.to_string(),
        in_reply_to: original.message_id.clone(),
        references,
        thread_id: Some(original.thread_id.clone()).filter(|t| !t.is_empty()),
    }
}

/// Prefixes `Re: ` unless the subject already starts with `re:` in any case.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    let already = trimmed
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));
    if already {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

/// Splits an address header on commas outside quotes and angle brackets.
pub fn split_addresses(header: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut angle = false;
    for c in header.chars() {
        match c {
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' if !quoted && !angle => {
                let item = current.trim();
                if !item.is_empty() {
                    out.push(item.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    let item = current.trim();
    if !item.is_empty() {
        out.push(item.to_string());
    }
    out
}

/// Bare address of a mailbox such as `Ada <ada@example.com>`.
pub fn address_of(mailbox: &str) -> &str {
    let mailbox = mailbox.trim();
    match (mailbox.rfind('<'), mailbox.rfind('>')) {
        (Some(start), Some(end)) if start < end => mailbox[start + 1..end].trim(),
        _ => mailbox,
    }
}

/// `local@domain.tld` with no whitespace and an alphabetic TLD of two or
/// more characters.
pub fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

pub fn validate_recipients(recipients: &[String]) -> Result<(), GoogleError> {
    match recipients.iter().find(|r| !is_valid_email(address_of(r))) {
        Some(bad) => Err(GoogleError::Validation(format!(
            "invalid email address: {bad}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original() -> MailMessage {
        MailMessage {
            id: "m1".into(),
            thread_id: "t1".into(),
            from: "Bob <bob@example.com>".into(),
            to: vec!["me@example.com".into(), "Carol <carol@example.com>".into()],
            cc: vec!["dave@example.com".into(), "CAROL@example.com".into()],
            subject: "Quarterly numbers".into(),
            message_id: Some("<abc@mail.example.com>".into()),
            references: Some("<root@mail.example.com>".into()),
            ..MailMessage::default()
        }
    }

    #[test]
    fn reply_threads_onto_the_original() {
        let reply = build_reply(&original(), "me@example.com", "Thanks!", false);
        assert_eq!(reply.to, vec!["Bob <bob@example.com>"]);
        assert!(reply.cc.is_empty());
        assert_eq!(reply.subject, "Re: Quarterly numbers");
        assert_eq!(reply.in_reply_to.as_deref(), Some("<abc@mail.example.com>"));
        assert_eq!(
            reply.references.as_deref(),
            Some("<root@mail.example.com> <abc@mail.example.com>")
        );
        assert_eq!(reply.thread_id.as_deref(), Some("t1"));

        let raw = reply.to_rfc2822();
        assert!(raw.contains("In-Reply-To: <abc@mail.example.com>\r\n"));
        assert!(raw.contains("References: <root@mail.example.com> <abc@mail.example.com>\r\n"));
    }

    #[test]
    fn reply_all_drops_self_and_sender_and_dedupes() {
        let mut msg = original();
        msg.cc.push("Bob <BOB@example.com>".into());
        let reply = build_reply(&msg, "Me <ME@example.com>", "ok", true);
        assert_eq!(reply.to, vec!["Bob <bob@example.com>"]);
        assert_eq!(
            reply.cc,
            vec!["Carol <carol@example.com>", "dave@example.com"]
        );
    }

    #[test]
    fn references_start_from_message_id_when_absent() {
        let mut msg = original();
        msg.references = None;
        let reply = build_reply(&msg, "me@example.com", "ok", false);
        assert_eq!(reply.references.as_deref(), Some("<abc@mail.example.com>"));
    }

    #[test]
    fn subject_prefix_is_not_doubled() {
        assert_eq!(reply_subject("RE: hello"), "RE: hello");
        assert_eq!(reply_subject("re:hello"), "re:hello");
        assert_eq!(reply_subject("Regarding lunch"), "Re: Regarding lunch");
        assert_eq!(reply_subject(""), "Re: ");
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada@example.c0m"));
        assert!(!is_valid_email("ada @example.com"));

        assert!(validate_recipients(&["Ada <ada@example.com>".to_string()]).is_ok());
        let err = validate_recipients(&["ok@example.com".into(), "nope".into()]).unwrap_err();
        assert_eq!(err.to_string(), "invalid email address: nope");
    }

    #[test]
    fn outgoing_requires_a_recipient() {
        let msg = OutgoingMessage::new(vec![], "s", "b");
        assert!(matches!(msg.validate(), Err(GoogleError::Validation(_))));
    }

    #[test]
    fn composition_uses_crlf_and_strips_header_newlines() {
        let msg = OutgoingMessage::new(
            vec!["ada@example.com".into()],
            "Hi\r\nBcc: evil@example.com",
            "line one\nline two",
        );
        let raw = msg.to_rfc2822();
        assert!(raw.starts_with("To: ada@example.com\r\nSubject: Hi  Bcc: evil@example.com\r\n"));
        assert!(raw.ends_with("\r\n\r\nline one\r\nline two"));

        let decoded = URL_SAFE_NO_PAD.decode(msg.encode_raw()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), raw);
    }

    #[test]
    fn non_ascii_subjects_are_encoded() {
        let msg = OutgoingMessage::new(vec!["a@example.com".into()], "Café", "");
        assert!(msg.to_rfc2822().contains("Subject: =?UTF-8?B?Q2Fmw6k=?=\r\n"));
    }

    #[test]
    fn address_lists_respect_quotes() {
        let list = split_addresses(r#""Doe, Jane" <jane@example.com>, bob@example.com ,"#);
        assert_eq!(list, vec![r#""Doe, Jane" <jane@example.com>"#, "bob@example.com"]);
        assert_eq!(address_of(&list[0]), "jane@example.com");
        assert_eq!(address_of(" plain@example.com "), "plain@example.com");
    }
}
