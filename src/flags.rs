//! Flag sets attached to stored messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::types::MessageFlag;

/// An ordered set of message flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet(BTreeSet<MessageFlag>);

impl FlagSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Flags a client can change permanently: the system flags minus `\Recent`
    pub fn permanent() -> Self {
        [
            MessageFlag::Answered,
            MessageFlag::Deleted,
            MessageFlag::Draft,
            MessageFlag::Flagged,
            MessageFlag::Seen,
        ]
        .into_iter()
        .collect()
    }

    pub fn contains(&self, flag: &MessageFlag) -> bool {
        self.0.contains(flag)
    }

    pub fn insert(&mut self, flag: MessageFlag) -> bool {
        self.0.insert(flag)
    }

    pub fn remove(&mut self, flag: &MessageFlag) -> bool {
        self.0.remove(flag)
    }

    /// Add every flag of `other`
    pub fn union_with(&mut self, other: &FlagSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Remove every flag of `other`
    pub fn subtract(&mut self, other: &FlagSet) {
        self.0.retain(|f| !other.0.contains(f));
    }

    /// Replace the client-settable subset with `other`, keeping `\Recent`
    pub fn replace_settable(&mut self, other: &FlagSet) {
        self.0.retain(|f| !f.is_settable());
        self.0.extend(other.0.iter().filter(|f| f.is_settable()).cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageFlag> {
        self.0.iter()
    }
}

impl FromIterator<MessageFlag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = MessageFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<MessageFlag> for FlagSet {
    fn from(flag: MessageFlag) -> Self {
        std::iter::once(flag).collect()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<String> = self.0.iter().map(MessageFlag::to_imap_string).collect();
        write!(f, "({})", flags.join(" "))
    }
}
