//! Error types for the mailbox store

use thiserror::Error;

use crate::types::Uid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("No such message: UID {0}")]
    NoSuchMessage(Uid),

    #[error("Cannot delete mailbox with children: {0}")]
    HasChildren(String),

    #[error("Cannot delete non-empty mailbox: {0}")]
    NotEmpty(String),

    #[error("Invalid mailbox name: {0}")]
    InvalidName(String),

    #[error("Mailbox is not selectable: {0}")]
    NotSelectable(String),

    #[error("Mailbox already exists: {0}")]
    AlreadyExists(String),

    #[error("Wildcard characters are only handled as the last character of a list pattern: {0}")]
    UnsupportedPattern(String),

    /// A sequencing bug in the caller. The affected session must be torn down.
    #[error("Internal consistency failure: {0}")]
    InternalConsistency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error can be reported to the client as a plain `NO`
    /// response while the session carries on.
    pub fn is_folder_error(&self) -> bool {
        !matches!(self, Error::InternalConsistency(_) | Error::Internal(_))
    }
}
