use super::{Message, NotificationSink};
use crate::errors::NotifyError;
use std::sync::{Arc, Mutex};

/// In-memory sink collecting sent messages.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<Message>>>,
    fail_sends: bool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// An outbox whose `send_all` always fails.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Messages sent so far, in send order.
    pub fn messages(&self) -> Vec<Message> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drains the outbox.
    pub fn drain(&self) -> Vec<Message> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NotificationSink for Outbox {
    fn send_all(&self, messages: Vec<Message>) -> Result<(), NotifyError> {
        if self.fail_sends {
            return Err(NotifyError::Send {
                count: messages.len(),
                reason: "outbox configured to fail".into(),
            });
        }
        let mut sent = self.sent.lock().map_err(|_| NotifyError::Send {
            count: messages.len(),
            reason: "outbox lock poisoned".into(),
        })?;
        sent.extend(messages);
        Ok(())
    }
}
