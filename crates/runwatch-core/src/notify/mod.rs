//! Notification sink seam.
//!
//! Jobs build [`Draft`]s and hand them to [`dispatch`] only after their
//! transaction committed. Compose and send failures are logged and swallowed.

pub mod html;
pub mod outbox;
pub mod spool;

use crate::errors::NotifyError;
use serde::{Deserialize, Serialize};

pub use outbox::Outbox;
pub use spool::SpoolSink;

/// A composed, validated message ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html: String,
}

impl Message {
    /// Validates the envelope. Bodies are not inspected.
    pub fn compose(recipients: &[String], subject: &str, html: &str) -> Result<Self, NotifyError> {
        let fail = |reason: String| NotifyError::Compose {
            subject: subject.to_string(),
            reason,
        };
        if recipients.is_empty() {
            return Err(fail("no recipients".into()));
        }
        if let Some(bad) = recipients.iter().find(|r| !is_plausible_address(r)) {
            return Err(fail(format!("invalid address '{bad}'")));
        }
        if subject.trim().is_empty() {
            return Err(fail("empty subject".into()));
        }
        if subject.contains(['\r', '\n']) {
            return Err(fail("subject contains a line break".into()));
        }
        Ok(Message {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            html: html.to_string(),
        })
    }
}

fn is_plausible_address(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !addr.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Outbound mail transport.
pub trait NotificationSink: Send + Sync {
    fn compose(&self, recipients: &[String], subject: &str, html: &str) -> Result<Message, NotifyError> {
        Message::compose(recipients, subject, html)
    }

    fn send_all(&self, messages: Vec<Message>) -> Result<(), NotifyError>;
}

/// A message before composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Composes and sends `drafts`; returns how many messages were handed to the sink.
pub fn dispatch(sink: &dyn NotificationSink, drafts: Vec<Draft>) -> usize {
    let mut messages = Vec::with_capacity(drafts.len());
    for draft in drafts {
        match sink.compose(&draft.recipients, &draft.subject, &draft.html) {
            Ok(m) => messages.push(m),
            Err(e) => tracing::warn!(error = %e, "dropping notification"),
        }
    }
    if messages.is_empty() {
        return 0;
    }
    let n = messages.len();
    match sink.send_all(messages) {
        Ok(()) => {
            tracing::debug!(count = n, "notifications sent");
            n
        }
        Err(e) => {
            tracing::warn!(error = %e, "notification send failed");
            0
        }
    }
}

/// Subscribers followed by default recipients, without duplicates.
pub fn recipients(subscribers: Vec<String>, defaults: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(subscribers.len() + defaults.len());
    for addr in subscribers.into_iter().chain(defaults.iter().cloned()) {
        let addr = addr.trim().to_string();
        if !addr.is_empty() && !out.iter().any(|a| a.eq_ignore_ascii_case(&addr)) {
            out.push(addr);
        }
    }
    out
}
