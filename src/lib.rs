//! Mailroom - in-memory mailbox store for IMAP/POP3 test servers
//!
//! This library holds the mail of a test server in memory and keeps every
//! connected session's view of a mailbox consistent while other sessions
//! append, flag and expunge messages.
//!
//! - [`Mailbox`]: message sequence, UIDs, flags and listener fan-out
//! - [`MailboxStore`]: the `#mail` hierarchy with create, delete and LIST
//! - [`SessionView`]: one connection's buffered, MSN-corrected view

pub mod config;
pub mod error;
pub mod flags;
pub mod hierarchy;
pub mod listener;
pub mod mailbox;
pub mod message;
pub mod response;
pub mod search;
pub mod session;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use flags::FlagSet;
pub use hierarchy::r#impl::InMemoryHierarchy;
pub use hierarchy::HierarchyBackend;
pub use listener::{ListenerId, MailboxListener};
pub use mailbox::{Mailbox, MailboxSnapshot};
pub use message::{Content, MsnRange, StoredMessage};
pub use response::UnsolicitedResponse;
pub use search::{SearchCriteria, SearchQuery};
pub use session::{FlagUpdate, SelectStatus, SessionState, SessionView};
pub use store::MailboxStore;
pub use types::*;
