//! Mailbox hierarchy backend trait and implementations
//!
//! The backend owns the name tree primitives the store is built on. It is
//! chosen when the store is constructed (`MailboxStore::with_backend`), so
//! tests and embedders can swap it without any global lookup.

use async_trait::async_trait;

use crate::error::Result;
use crate::mailbox::Mailbox;

pub mod r#impl;

/// Tree primitives behind `MailboxStore`
///
/// Validation that depends on mailbox contents (children, messages, name
/// syntax) happens in the store before these are called.
#[async_trait]
pub trait HierarchyBackend: Send + Sync {
    /// The `#mail` namespace root
    fn root(&self) -> Mailbox;

    /// Direct child of `parent` whose name matches case-insensitively
    async fn child(&self, parent: &Mailbox, name: &str) -> Option<Mailbox>;

    /// Direct children of `parent`, in creation order
    async fn children(&self, parent: &Mailbox) -> Vec<Mailbox>;

    /// Create and attach a new child mailbox
    ///
    /// Fails with `Error::AlreadyExists` if a sibling with the same
    /// case-insensitive name exists.
    async fn create(&self, parent: &Mailbox, name: &str, selectable: bool) -> Result<Mailbox>;

    /// Detach `mailbox` from its parent
    async fn delete(&self, mailbox: &Mailbox) -> Result<()>;

    /// Change the name of `mailbox` in place
    async fn rename(&self, mailbox: &Mailbox, new_name: &str) -> Result<()>;
}
