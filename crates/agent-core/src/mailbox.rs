//! Agent Mailboxes
//!
//! One bounded channel per recipient, owned by a single execution. Senders
//! post [`Envelope`]s; each recipient takes its [`Inbox`] once and drains it
//! on read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Message passed between agents of one execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("No mailbox for recipient '{0}'")]
    UnknownRecipient(String),

    #[error("Mailbox of '{0}' is full")]
    Full(String),

    #[error("Mailbox of '{0}' is closed")]
    Closed(String),
}

/// Receiving end of one recipient's mailbox
#[derive(Debug)]
pub struct Inbox {
    owner: String,
    receiver: mpsc::Receiver<Envelope>,
}

impl Inbox {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Take every pending envelope, oldest first
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Ok(envelope) = self.receiver.try_recv() {
            envelopes.push(envelope);
        }
        envelopes
    }
}

/// Per-recipient mailboxes of one execution
#[derive(Debug)]
pub struct Mailboxes {
    senders: HashMap<String, mpsc::Sender<Envelope>>,
    inboxes: HashMap<String, Inbox>,
}

impl Mailboxes {
    /// Open one mailbox per recipient id
    pub fn open<I, S>(recipients: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut senders = HashMap::new();
        let mut inboxes = HashMap::new();
        for recipient in recipients {
            let owner = recipient.into();
            if senders.contains_key(&owner) {
                continue;
            }
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.insert(owner.clone(), tx);
            inboxes.insert(owner.clone(), Inbox { owner, receiver: rx });
        }
        Self { senders, inboxes }
    }

    /// Post without waiting; a full mailbox is reported, not awaited
    pub fn send(&self, envelope: Envelope) -> Result<(), MailboxError> {
        let sender = self
            .senders
            .get(&envelope.to)
            .ok_or_else(|| MailboxError::UnknownRecipient(envelope.to.clone()))?;
        let to = envelope.to.clone();
        sender.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(_) => MailboxError::Full(to),
            TrySendError::Closed(_) => MailboxError::Closed(to),
        })
    }

    /// Hand the receiving end to its owner; `None` once taken
    pub fn take_inbox(&mut self, recipient: &str) -> Option<Inbox> {
        self.inboxes.remove(recipient)
    }
}
