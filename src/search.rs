//! Search criteria applied by `Mailbox::search`
//!
//! The mailbox treats a criteria object as an opaque predicate and calls it
//! once per message, in sequence order. Closures work directly:
//!
//! ```ignore
//! let big = mailbox.search(&|m: &StoredMessage| m.size() > 4096).await;
//! ```
//!
//! `SearchQuery` covers the flag, UID and date keys that can be answered
//! without looking at message content.

use chrono::{DateTime, Utc};

use crate::message::StoredMessage;
use crate::types::{MessageFlag, Uid};

/// Predicate deciding whether a stored message matches a search
pub trait SearchCriteria: Send + Sync {
    fn matches(&self, message: &StoredMessage) -> bool;
}

impl<F> SearchCriteria for F
where
    F: Fn(&StoredMessage) -> bool + Send + Sync,
{
    fn matches(&self, message: &StoredMessage) -> bool {
        self(message)
    }
}

/// Search keys that only need the message envelope kept by the store
#[derive(Debug, Clone)]
pub enum SearchQuery {
    All,
    Uid(Vec<Uid>),
    Seen,
    Unseen,
    Flagged,
    Unflagged,
    Deleted,
    Undeleted,
    Recent,
    Keyword(String),
    Before(DateTime<Utc>),
    Since(DateTime<Utc>),
    And(Box<SearchQuery>, Box<SearchQuery>),
    Or(Box<SearchQuery>, Box<SearchQuery>),
    Not(Box<SearchQuery>),
}

impl SearchCriteria for SearchQuery {
    fn matches(&self, message: &StoredMessage) -> bool {
        match self {
            SearchQuery::All => true,
            SearchQuery::Uid(uids) => uids.contains(&message.uid),
            SearchQuery::Seen => message.has_flag(&MessageFlag::Seen),
            SearchQuery::Unseen => !message.has_flag(&MessageFlag::Seen),
            SearchQuery::Flagged => message.has_flag(&MessageFlag::Flagged),
            SearchQuery::Unflagged => !message.has_flag(&MessageFlag::Flagged),
            SearchQuery::Deleted => message.is_deleted(),
            SearchQuery::Undeleted => !message.is_deleted(),
            SearchQuery::Recent => message.has_flag(&MessageFlag::Recent),
            SearchQuery::Keyword(k) => message.has_flag(&MessageFlag::Custom(k.clone())),
            SearchQuery::Before(date) => message.internal_date < *date,
            SearchQuery::Since(date) => message.internal_date >= *date,
            SearchQuery::And(a, b) => a.matches(message) && b.matches(message),
            SearchQuery::Or(a, b) => a.matches(message) || b.matches(message),
            SearchQuery::Not(q) => !q.matches(message),
        }
    }
}
