//! Core types used throughout the mailbox store

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Character separating the segments of a hierarchical mailbox name
pub const HIERARCHY_DELIMITER: char = '.';

/// First segment of every absolute mailbox name
pub const USER_NAMESPACE: &str = "#mail";

/// Name of the default mailbox created for every store
pub const INBOX_NAME: &str = "INBOX";

/// Message UID (unique within a mailbox, never reused)
pub type Uid = u64;

/// Message sequence number, 1-based (changes as messages are expunged)
pub type SequenceNumber = usize;

/// Identity of a mailbox instance
///
/// A mailbox that is deleted and recreated under the same name gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxId(pub Uuid);

impl MailboxId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MailboxId {
    fn default() -> Self {
        Self::new()
    }
}

/// Message flags as defined by IMAP
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageFlag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Custom(String),
}

impl MessageFlag {
    pub fn to_imap_string(&self) -> String {
        match self {
            MessageFlag::Seen => "\\Seen".to_string(),
            MessageFlag::Answered => "\\Answered".to_string(),
            MessageFlag::Flagged => "\\Flagged".to_string(),
            MessageFlag::Deleted => "\\Deleted".to_string(),
            MessageFlag::Draft => "\\Draft".to_string(),
            MessageFlag::Recent => "\\Recent".to_string(),
            MessageFlag::Custom(s) => s.clone(),
        }
    }

    pub fn from_imap_string(s: &str) -> Self {
        match s {
            "\\Seen" => MessageFlag::Seen,
            "\\Answered" => MessageFlag::Answered,
            "\\Flagged" => MessageFlag::Flagged,
            "\\Deleted" => MessageFlag::Deleted,
            "\\Draft" => MessageFlag::Draft,
            "\\Recent" => MessageFlag::Recent,
            _ => MessageFlag::Custom(s.to_string()),
        }
    }

    /// Whether a client may set or clear this flag with STORE
    ///
    /// `\Recent` is maintained by the server only.
    pub fn is_settable(&self) -> bool {
        !matches!(self, MessageFlag::Recent)
    }
}
