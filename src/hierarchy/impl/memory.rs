//! In-memory mailbox hierarchy
//!
//! Ownership flows from the root down: each mailbox holds strong handles to
//! its children and only a weak link back to its parent.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::hierarchy::HierarchyBackend;
use crate::mailbox::Mailbox;
use crate::types::*;

pub struct InMemoryHierarchy {
    root: Mailbox,
    /// Counter for generating unique UID validity values
    next_uid_validity: AtomicU32,
}

impl InMemoryHierarchy {
    /// Create a hierarchy whose UID validity values start at 1
    pub fn new() -> Self {
        Self::with_uid_validity_seed(1)
    }

    /// Create a hierarchy whose UID validity values start at the current
    /// Unix time, so a restarted server does not repeat earlier values
    pub fn clock_seeded() -> Self {
        let seed = u32::try_from(Utc::now().timestamp()).unwrap_or(1).max(1);
        Self::with_uid_validity_seed(seed)
    }

    pub fn with_uid_validity_seed(seed: u32) -> Self {
        let root = Mailbox::new(USER_NAMESPACE, seed);
        root.set_selectable(false);
        Self {
            root,
            next_uid_validity: AtomicU32::new(seed.wrapping_add(1)),
        }
    }

    fn next_uid_validity(&self) -> u32 {
        self.next_uid_validity.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for InMemoryHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HierarchyBackend for InMemoryHierarchy {
    fn root(&self) -> Mailbox {
        self.root.clone()
    }

    async fn child(&self, parent: &Mailbox, name: &str) -> Option<Mailbox> {
        parent.child(name)
    }

    async fn children(&self, parent: &Mailbox) -> Vec<Mailbox> {
        parent.children()
    }

    async fn create(&self, parent: &Mailbox, name: &str, selectable: bool) -> Result<Mailbox> {
        let child = Mailbox::new_child(parent, name, self.next_uid_validity());
        child.set_selectable(selectable);
        parent.attach_child_unique(child.clone())?;

        debug!("Attached {} (selectable: {})", child.full_name(), selectable);
        Ok(child)
    }

    async fn delete(&self, mailbox: &Mailbox) -> Result<()> {
        let parent = mailbox
            .parent()
            .ok_or_else(|| Error::InvalidName(mailbox.full_name()))?;

        if parent.detach_child(mailbox.id()) {
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "{} is not attached to its parent",
                mailbox.full_name()
            )))
        }
    }

    async fn rename(&self, mailbox: &Mailbox, new_name: &str) -> Result<()> {
        mailbox.set_name(new_name);
        Ok(())
    }
}
