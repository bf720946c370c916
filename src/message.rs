//! Stored messages and the opaque content they carry

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::flags::FlagSet;
use crate::types::{MessageFlag, SequenceNumber, Uid};

/// Opaque message content (headers and body)
///
/// The store never looks inside; clones share the same immutable bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content(Arc<[u8]>);

impl Content {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// One message entry in a mailbox
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub content: Content,
    pub flags: FlagSet,
    pub internal_date: DateTime<Utc>,
    pub uid: Uid,
}

impl StoredMessage {
    pub fn new(content: Content, flags: FlagSet, internal_date: DateTime<Utc>, uid: Uid) -> Self {
        Self {
            content,
            flags,
            internal_date,
            uid,
        }
    }

    pub fn has_flag(&self, flag: &MessageFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(&MessageFlag::Deleted)
    }

    pub fn size(&self) -> usize {
        self.content.size()
    }
}

/// Already-parsed message sequence ranges, e.g. `2`, `4:7` or `5:*`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsnRange {
    ranges: Vec<(SequenceNumber, Option<SequenceNumber>)>,
}

impl MsnRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single message number
    pub fn single(msn: SequenceNumber) -> Self {
        Self::new().with(msn, Some(msn))
    }

    /// Add the inclusive range `start..=end`; `None` stands for `*`
    pub fn with(mut self, start: SequenceNumber, end: Option<SequenceNumber>) -> Self {
        let range = match end {
            Some(end) if end < start => (end, Some(start)),
            _ => (start, end),
        };
        self.ranges.push(range);
        self
    }

    pub fn includes(&self, msn: SequenceNumber) -> bool {
        self.ranges.iter().any(|&(start, end)| match end {
            Some(end) => msn >= start && msn <= end,
            None => msn >= start,
        })
    }
}
