//! Mailbox store: hierarchical names, creation, deletion and listing
//!
//! Absolute names start with the `#mail` namespace token and use `.` as the
//! hierarchy delimiter, e.g. `#mail.INBOX.Receipts`. Name segments match
//! case-insensitively.
//!
//! # Listing
//!
//! `list` accepts a wildcard only as the last character of the pattern:
//! - `*` matches every child of the parent whose name starts with the text
//!   before it, plus all descendants of each match
//! - `%` matches the same children but not their descendants
//!
//! The parent is everything before the last delimiter. `#mail.box.*` lists
//! every mailbox below `box`; `#mail.box*` lists `box` itself (and any
//! sibling starting with `box`) with everything below.

use log::{debug, info};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::hierarchy::r#impl::InMemoryHierarchy;
use crate::hierarchy::HierarchyBackend;
use crate::mailbox::Mailbox;
use crate::types::*;

/// Owner of the mailbox tree
#[derive(Clone)]
pub struct MailboxStore {
    backend: Arc<dyn HierarchyBackend>,
}

impl MailboxStore {
    /// Create an empty in-memory store (only the `#mail` root exists)
    ///
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(InMemoryHierarchy::new()))
    }

    /// Create a store over a specific hierarchy backend
    pub fn with_backend(backend: Arc<dyn HierarchyBackend>) -> Self {
        Self { backend }
    }

    /// Create an in-memory store and the configured initial mailboxes
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let backend = if config.clock_seeded_uid_validity {
            InMemoryHierarchy::clock_seeded()
        } else {
            InMemoryHierarchy::new()
        };
        let store = Self::with_backend(Arc::new(backend));

        for path in &config.initial_mailboxes {
            let absolute = format!("{}{}{}", USER_NAMESPACE, HIERARCHY_DELIMITER, path);
            store.create_path(&absolute).await?;
        }

        info!(
            "Mailbox store ready with {} initial mailboxes",
            config.initial_mailboxes.len()
        );
        Ok(store)
    }

    pub fn root(&self) -> Mailbox {
        self.backend.root()
    }

    /// Look up a mailbox by absolute name
    ///
    /// Returns `None` if the name does not start with `#mail` or any segment
    /// is missing.
    pub async fn resolve(&self, absolute_name: &str) -> Option<Mailbox> {
        let mut tokens = absolute_name
            .split(HIERARCHY_DELIMITER)
            .filter(|t| !t.is_empty());

        match tokens.next() {
            Some(first) if first.eq_ignore_ascii_case(USER_NAMESPACE) => {}
            _ => return None,
        }

        let mut current = self.backend.root();
        for token in tokens {
            current = self.backend.child(&current, token).await?;
        }
        Some(current)
    }

    pub async fn child(&self, parent: &Mailbox, name: &str) -> Option<Mailbox> {
        self.backend.child(parent, name).await
    }

    pub async fn children(&self, parent: &Mailbox) -> Vec<Mailbox> {
        self.backend.children(parent).await
    }

    /// Create a single-segment child of `parent`
    pub async fn create(&self, parent: &Mailbox, name: &str, selectable: bool) -> Result<Mailbox> {
        validate_segment(name)?;
        let mailbox = self.backend.create(parent, name, selectable).await?;
        info!("Created mailbox {}", mailbox.full_name());
        Ok(mailbox)
    }

    /// Create `absolute_name` and any missing mailboxes above it
    ///
    /// Existing mailboxes along the path are reused, so this is idempotent.
    pub async fn create_path(&self, absolute_name: &str) -> Result<Mailbox> {
        let mut tokens = absolute_name
            .split(HIERARCHY_DELIMITER)
            .filter(|t| !t.is_empty());

        match tokens.next() {
            Some(first) if first.eq_ignore_ascii_case(USER_NAMESPACE) => {}
            _ => return Err(Error::InvalidName(absolute_name.to_string())),
        }

        let mut current = self.backend.root();
        for token in tokens {
            current = match self.backend.child(&current, token).await {
                Some(existing) => existing,
                None => self.create(&current, token, true).await?,
            };
        }
        Ok(current)
    }

    /// Delete an empty, childless mailbox
    ///
    /// Every session that has it selected receives `mailbox_deleted`, and
    /// the mailbox rejects further mutations.
    pub async fn delete(&self, mailbox: &Mailbox) -> Result<()> {
        let name = mailbox.full_name();

        if mailbox.parent().is_none() {
            return Err(Error::InvalidName(name));
        }
        if !self.backend.children(mailbox).await.is_empty() {
            return Err(Error::HasChildren(name));
        }

        mailbox.close_if_empty().await?;
        self.backend.delete(mailbox).await?;

        info!("Deleted mailbox {}", name);
        Ok(())
    }

    /// Rename in place; the mailbox keeps its position in the tree
    pub async fn rename(&self, mailbox: &Mailbox, new_name: &str) -> Result<()> {
        validate_segment(new_name)?;
        let old_name = mailbox.full_name();
        self.backend.rename(mailbox, new_name).await?;
        info!("Renamed mailbox {} to {}", old_name, mailbox.full_name());
        Ok(())
    }

    /// List mailboxes matching `pattern` (see the module docs)
    pub async fn list(&self, pattern: &str) -> Result<Vec<Mailbox>> {
        let star = pattern.find('*');
        let percent = pattern.find('%');
        let is_last = |index: usize| index + 1 == pattern.len();

        if star.is_some_and(|i| !is_last(i)) || percent.is_some_and(|i| !is_last(i)) {
            return Err(Error::UnsupportedPattern(pattern.to_string()));
        }

        if star.is_none() && percent.is_none() {
            return Ok(self.resolve(pattern).await.into_iter().collect());
        }

        let stem = &pattern[..pattern.len() - 1];
        let (parent_name, prefix) = match stem.rfind(HIERARCHY_DELIMITER) {
            Some(index) => (&stem[..index], &stem[index + 1..]),
            None => (USER_NAMESPACE, stem),
        };

        let parent = match self.resolve(parent_name).await {
            Some(parent) => parent,
            None => return Ok(Vec::new()),
        };

        let mut mailboxes = Vec::new();
        for child in self.backend.children(&parent).await {
            if child.name().starts_with(prefix) {
                let descendants = if star.is_some() {
                    self.descendants(&child).await
                } else {
                    Vec::new()
                };
                mailboxes.push(child);
                mailboxes.extend(descendants);
            }
        }

        debug!("LIST {} matched {} mailboxes", pattern, mailboxes.len());
        Ok(mailboxes)
    }

    /// Every mailbox below `mailbox`, depth first
    async fn descendants(&self, mailbox: &Mailbox) -> Vec<Mailbox> {
        let mut found = Vec::new();
        let mut stack: Vec<Mailbox> = self.backend.children(mailbox).await;
        stack.reverse();

        while let Some(next) = stack.pop() {
            let mut children = self.backend.children(&next).await;
            children.reverse();
            found.push(next);
            stack.extend(children);
        }
        found
    }
}

impl Default for MailboxStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(HIERARCHY_DELIMITER) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
