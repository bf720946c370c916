//! Mailbox shared handle: message sequence, flags and listener fan-out
//!
//! A `Mailbox` is a cheap-to-clone handle onto one mailbox instance. It owns:
//! - the ordered message sequence (MSN = index + 1)
//! - UID validity and the next-UID counter
//! - the registered listeners
//! - hierarchy links (weak parent, owned children)
//!
//! # Architecture
//!
//! Mutations go through a per-mailbox writer loop:
//! - every append, flag change, expunge and listener (de)registration is a
//!   command sent over a channel and applied by one task
//! - the task holds the write half of the state lock while it mutates and
//!   while it notifies listeners, so "mutate, then notify" is atomic for
//!   everyone else
//! - reads bypass the channel and take the read half, seeing either the
//!   state before or after a mutation, never a partial one
//!
//! # Usage
//!
//! ```ignore
//! use mailroom::{Mailbox, FlagSet};
//!
//! let mailbox = Mailbox::new("INBOX", 1);
//! let uid = mailbox.append("Subject: hi\r\n\r\n".into(), FlagSet::new(), Utc::now()).await?;
//! assert_eq!(mailbox.msn(uid).await?, 1);
//! ```

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::flags::FlagSet;
use crate::listener::{downgrade, ListenerId, ListenerSet, MailboxListener};
use crate::message::{Content, MsnRange, StoredMessage};
use crate::search::SearchCriteria;
use crate::types::*;

/// Mailbox commands for the writer loop
enum MailboxCommand {
    Append {
        content: Content,
        flags: FlagSet,
        internal_date: DateTime<Utc>,
        reply: oneshot::Sender<Uid>,
    },
    SetFlags {
        flags: FlagSet,
        add: bool,
        uid: Uid,
        exclude: Option<ListenerId>,
        announce_uid: bool,
        reply: oneshot::Sender<Result<FlagSet>>,
    },
    ReplaceFlags {
        flags: FlagSet,
        uid: Uid,
        exclude: Option<ListenerId>,
        announce_uid: bool,
        reply: oneshot::Sender<Result<FlagSet>>,
    },
    Expunge {
        reply: oneshot::Sender<Vec<Uid>>,
    },
    ResetRecent {
        reply: oneshot::Sender<usize>,
    },
    DeleteAll {
        reply: oneshot::Sender<()>,
    },
    AddListener {
        id: ListenerId,
        listener: Weak<dyn MailboxListener>,
        reply: oneshot::Sender<()>,
    },
    RemoveListener {
        id: ListenerId,
        reply: Option<oneshot::Sender<bool>>,
    },
    SignalDeletion {
        reply: oneshot::Sender<()>,
    },
    Delete {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Read-only snapshot of the counters a SELECT or STATUS reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxSnapshot {
    pub name: String,
    pub uid_validity: u32,
    pub uid_next: Uid,
    pub message_count: usize,
    pub recent_count: usize,
    pub unseen_count: usize,
    pub first_unseen: Option<SequenceNumber>,
}

/// Message sequence and listeners, guarded by the mailbox lock
struct FolderState {
    messages: Vec<StoredMessage>,
    uid_next: Uid,
    listeners: ListenerSet,
}

impl FolderState {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            uid_next: 1,
            listeners: ListenerSet::new(),
        }
    }

    fn index_of(&self, uid: Uid) -> Result<usize> {
        self.messages
            .iter()
            .position(|m| m.uid == uid)
            .ok_or(Error::NoSuchMessage(uid))
    }

    fn append(
        &mut self,
        content: Content,
        mut flags: FlagSet,
        internal_date: DateTime<Utc>,
    ) -> Uid {
        let uid = self.uid_next;
        self.uid_next += 1;

        flags.insert(MessageFlag::Recent);
        self.messages
            .push(StoredMessage::new(content, flags, internal_date, uid));

        let msn = self.messages.len();
        self.listeners.added(msn);
        uid
    }

    fn set_flags(
        &mut self,
        flags: &FlagSet,
        add: bool,
        uid: Uid,
        exclude: Option<ListenerId>,
        announce_uid: bool,
    ) -> Result<FlagSet> {
        let index = self.index_of(uid)?;
        let message = &mut self.messages[index];
        if add {
            message.flags.union_with(flags);
        } else {
            message.flags.subtract(flags);
        }
        let updated = message.flags.clone();

        self.listeners
            .flags_updated(index + 1, &updated, announce_uid.then_some(uid), exclude);
        Ok(updated)
    }

    fn replace_flags(
        &mut self,
        flags: &FlagSet,
        uid: Uid,
        exclude: Option<ListenerId>,
        announce_uid: bool,
    ) -> Result<FlagSet> {
        let index = self.index_of(uid)?;
        let message = &mut self.messages[index];
        message.flags.replace_settable(flags);
        let updated = message.flags.clone();

        self.listeners
            .flags_updated(index + 1, &updated, announce_uid.then_some(uid), exclude);
        Ok(updated)
    }

    /// Remove every `\Deleted` message in ascending order.
    ///
    /// The index is re-read after each removal, so each `expunged` event
    /// carries the position the message had at the moment it went away.
    fn expunge(&mut self) -> Vec<Uid> {
        let mut expunged = Vec::new();
        let mut index = 0;
        while index < self.messages.len() {
            if self.messages[index].is_deleted() {
                let removed = self.messages.remove(index);
                expunged.push(removed.uid);
                self.listeners.expunged(index + 1);
            } else {
                index += 1;
            }
        }
        expunged
    }

    fn recent_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.has_flag(&MessageFlag::Recent))
            .count()
    }

    fn reset_recent(&mut self) -> usize {
        let mut count = 0;
        for message in &mut self.messages {
            if message.flags.remove(&MessageFlag::Recent) {
                count += 1;
            }
        }
        count
    }

    fn unseen_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| !m.has_flag(&MessageFlag::Seen))
            .count()
    }

    fn first_unseen(&self) -> Option<SequenceNumber> {
        self.messages
            .iter()
            .position(|m| !m.has_flag(&MessageFlag::Seen))
            .map(|index| index + 1)
    }
}

/// Hierarchy metadata, guarded separately from the message sequence
struct Meta {
    name: String,
    children: Vec<Mailbox>,
}

struct MailboxInner {
    id: MailboxId,
    uid_validity: u32,
    parent: Weak<MailboxInner>,
    meta: Mutex<Meta>,
    selectable: AtomicBool,
    state: Arc<RwLock<FolderState>>,
    command_tx: Sender<MailboxCommand>,
}

/// Mailbox shared handle (cheap to clone)
#[derive(Clone)]
pub struct Mailbox {
    inner: Arc<MailboxInner>,
}

impl Mailbox {
    /// Create a parentless mailbox
    ///
    /// This spawns the writer loop and must be called inside a tokio runtime.
    pub fn new(name: impl Into<String>, uid_validity: u32) -> Self {
        Self::spawn(name.into(), Weak::new(), uid_validity)
    }

    /// Create a mailbox whose parent link points at `parent`
    ///
    /// The child is not attached to the parent's child list; hierarchy
    /// backends do that with `attach_child_unique`.
    pub fn new_child(parent: &Mailbox, name: impl Into<String>, uid_validity: u32) -> Self {
        Self::spawn(name.into(), Arc::downgrade(&parent.inner), uid_validity)
    }

    fn spawn(name: String, parent: Weak<MailboxInner>, uid_validity: u32) -> Self {
        let (command_tx, command_rx) = channel(100);
        let state = Arc::new(RwLock::new(FolderState::new()));
        let id = MailboxId::new();

        tokio::spawn(mailbox_writer_loop(id, Arc::clone(&state), command_rx));
        debug!("Created mailbox {} ({:?}, uid validity {})", name, id, uid_validity);

        Self {
            inner: Arc::new(MailboxInner {
                id,
                uid_validity,
                parent,
                meta: Mutex::new(Meta {
                    name,
                    children: Vec::new(),
                }),
                selectable: AtomicBool::new(true),
                state,
                command_tx,
            }),
        }
    }

    async fn send<T>(&self, command: MailboxCommand, rx: oneshot::Receiver<T>) -> Result<T> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| Error::Internal(format!("Mailbox {} has been shut down", self.name())))?;
        rx.await
            .map_err(|_| Error::Internal("Mailbox writer loop dropped reply".to_string()))
    }

    fn meta(&self) -> std::sync::MutexGuard<'_, Meta> {
        self.inner.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- identity and hierarchy -------------------------------------------

    pub fn id(&self) -> MailboxId {
        self.inner.id
    }

    pub fn name(&self) -> String {
        self.meta().name.clone()
    }

    /// Absolute name, e.g. `#mail.INBOX.Receipts`
    pub fn full_name(&self) -> String {
        let name = self.name();
        self.full_name_with(&name)
    }

    fn full_name_with(&self, name: &str) -> String {
        match self.parent() {
            Some(parent) => format!("{}{}{}", parent.full_name(), HIERARCHY_DELIMITER, name),
            None => name.to_string(),
        }
    }

    pub fn parent(&self) -> Option<Mailbox> {
        self.inner.parent.upgrade().map(|inner| Mailbox { inner })
    }

    pub fn children(&self) -> Vec<Mailbox> {
        self.meta().children.clone()
    }

    pub fn has_children(&self) -> bool {
        !self.meta().children.is_empty()
    }

    /// Direct child whose name matches case-insensitively
    pub fn child(&self, name: &str) -> Option<Mailbox> {
        self.meta()
            .children
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn is_selectable(&self) -> bool {
        self.inner.selectable.load(Ordering::SeqCst)
    }

    // Tree mutation for hierarchy backends. Go through `MailboxStore`
    // everywhere else so its validation runs.

    pub fn set_selectable(&self, selectable: bool) {
        self.inner.selectable.store(selectable, Ordering::SeqCst);
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.meta().name = name.into();
    }

    /// Attach `child` unless a sibling with the same case-insensitive name
    /// is already attached
    pub fn attach_child_unique(&self, child: Mailbox) -> Result<()> {
        let child_name = child.name();
        let mut meta = self.meta();
        if meta
            .children
            .iter()
            .any(|c| c.name().eq_ignore_ascii_case(&child_name))
        {
            return Err(Error::AlreadyExists(format!(
                "{}{}{}",
                self.full_name_with(&meta.name),
                HIERARCHY_DELIMITER,
                child_name
            )));
        }
        meta.children.push(child);
        Ok(())
    }

    pub fn detach_child(&self, id: MailboxId) -> bool {
        let mut meta = self.meta();
        let before = meta.children.len();
        meta.children.retain(|c| c.id() != id);
        meta.children.len() != before
    }

    // ---- counters -----------------------------------------------------------

    pub fn uid_validity(&self) -> u32 {
        self.inner.uid_validity
    }

    pub async fn uid_next(&self) -> Uid {
        self.inner.state.read().await.uid_next
    }

    pub async fn message_count(&self) -> usize {
        self.inner.state.read().await.messages.len()
    }

    pub async fn unseen_count(&self) -> usize {
        self.inner.state.read().await.unseen_count()
    }

    /// Number of `\Recent` messages, optionally clearing the flag on all of them
    pub async fn recent_count(&self, reset: bool) -> Result<usize> {
        if !reset {
            return Ok(self.inner.state.read().await.recent_count());
        }
        let (tx, rx) = oneshot::channel();
        self.send(MailboxCommand::ResetRecent { reply: tx }, rx).await
    }

    /// Position of the first message without `\Seen`
    pub async fn first_unseen(&self) -> Option<SequenceNumber> {
        self.inner.state.read().await.first_unseen()
    }

    pub fn permanent_flags(&self) -> FlagSet {
        FlagSet::permanent()
    }

    pub async fn snapshot(&self) -> MailboxSnapshot {
        self.with_snapshot(MailboxSnapshot::clone).await
    }

    /// Run `f` on a snapshot while no mutation (and so no listener callback)
    /// can run on this mailbox
    pub(crate) async fn with_snapshot<R>(&self, f: impl FnOnce(&MailboxSnapshot) -> R) -> R {
        let state = self.inner.state.read().await;
        let snapshot = MailboxSnapshot {
            name: self.full_name(),
            uid_validity: self.inner.uid_validity,
            uid_next: state.uid_next,
            message_count: state.messages.len(),
            recent_count: state.recent_count(),
            unseen_count: state.unseen_count(),
            first_unseen: state.first_unseen(),
        };
        f(&snapshot)
    }

    // ---- message reads ------------------------------------------------------

    pub async fn msn(&self, uid: Uid) -> Result<SequenceNumber> {
        Ok(self.inner.state.read().await.index_of(uid)? + 1)
    }

    pub async fn message(&self, uid: Uid) -> Option<StoredMessage> {
        let state = self.inner.state.read().await;
        state.messages.iter().find(|m| m.uid == uid).cloned()
    }

    pub async fn message_uids(&self) -> Vec<Uid> {
        let state = self.inner.state.read().await;
        state.messages.iter().map(|m| m.uid).collect()
    }

    pub async fn messages(&self) -> Vec<StoredMessage> {
        self.inner.state.read().await.messages.clone()
    }

    pub async fn messages_in_range(&self, range: &MsnRange) -> Vec<StoredMessage> {
        let state = self.inner.state.read().await;
        state
            .messages
            .iter()
            .enumerate()
            .filter(|(index, _)| range.includes(index + 1))
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn non_deleted_messages(&self) -> Vec<StoredMessage> {
        let state = self.inner.state.read().await;
        state
            .messages
            .iter()
            .filter(|m| !m.is_deleted())
            .cloned()
            .collect()
    }

    /// `(msn, uid)` of every message not marked `\Deleted`, as POP3 UIDL lists them
    pub async fn uid_listing(&self) -> Vec<(SequenceNumber, Uid)> {
        let state = self.inner.state.read().await;
        state
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_deleted())
            .map(|(index, m)| (index + 1, m.uid))
            .collect()
    }

    /// UIDs of matching messages, in sequence order
    pub async fn search(&self, criteria: &dyn SearchCriteria) -> Vec<Uid> {
        let state = self.inner.state.read().await;
        state
            .messages
            .iter()
            .filter(|m| criteria.matches(m))
            .map(|m| m.uid)
            .collect()
    }

    // ---- mutations ----------------------------------------------------------

    /// Append a message at the tail and mark it `\Recent`
    pub async fn append(
        &self,
        content: Content,
        flags: FlagSet,
        internal_date: DateTime<Utc>,
    ) -> Result<Uid> {
        let (tx, rx) = oneshot::channel();
        self.send(
            MailboxCommand::Append {
                content,
                flags,
                internal_date,
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Deliver a message with no flags, dated now
    pub async fn store(&self, content: Content) -> Result<Uid> {
        self.store_at(content, Utc::now()).await
    }

    pub async fn store_at(&self, content: Content, internal_date: DateTime<Utc>) -> Result<Uid> {
        self.append(content, FlagSet::new(), internal_date).await
    }

    /// Add (`add == true`) or remove `flags` on one message
    ///
    /// Every listener except `exclude` receives `flags_updated`; the UID is
    /// included in the event only when `announce_uid` is set. Returns the
    /// message's new flags.
    pub async fn set_flags(
        &self,
        flags: FlagSet,
        add: bool,
        uid: Uid,
        exclude: Option<ListenerId>,
        announce_uid: bool,
    ) -> Result<FlagSet> {
        let (tx, rx) = oneshot::channel();
        self.send(
            MailboxCommand::SetFlags {
                flags,
                add,
                uid,
                exclude,
                announce_uid,
                reply: tx,
            },
            rx,
        )
        .await?
    }

    /// Replace the client-settable flags of one message
    pub async fn replace_flags(
        &self,
        flags: FlagSet,
        uid: Uid,
        exclude: Option<ListenerId>,
        announce_uid: bool,
    ) -> Result<FlagSet> {
        let (tx, rx) = oneshot::channel();
        self.send(
            MailboxCommand::ReplaceFlags {
                flags,
                uid,
                exclude,
                announce_uid,
                reply: tx,
            },
            rx,
        )
        .await?
    }

    /// Permanently remove every `\Deleted` message; returns the removed UIDs
    pub async fn expunge(&self) -> Result<Vec<Uid>> {
        let (tx, rx) = oneshot::channel();
        self.send(MailboxCommand::Expunge { reply: tx }, rx).await
    }

    /// Copy one message into `destination`, returning its UID there
    pub async fn copy_message(&self, uid: Uid, destination: &Mailbox) -> Result<Uid> {
        let original = self.message(uid).await.ok_or(Error::NoSuchMessage(uid))?;
        destination
            .append(original.content, original.flags, original.internal_date)
            .await
    }

    /// Drop every message without notifying listeners
    pub async fn delete_all_messages(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(MailboxCommand::DeleteAll { reply: tx }, rx).await
    }

    // ---- listeners ----------------------------------------------------------

    /// Register a listener; the mailbox only keeps a weak reference to it
    pub async fn add_listener<L>(&self, listener: &Arc<L>) -> Result<ListenerId>
    where
        L: MailboxListener + 'static,
    {
        let id = ListenerId::new();
        let (tx, rx) = oneshot::channel();
        self.send(
            MailboxCommand::AddListener {
                id,
                listener: downgrade(listener),
                reply: tx,
            },
            rx,
        )
        .await?;
        Ok(id)
    }

    /// Deregister a listener; returns whether it was registered
    pub async fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(
            MailboxCommand::RemoveListener {
                id,
                reply: Some(tx),
            },
            rx,
        )
        .await
    }

    /// Best-effort deregistration for contexts that cannot await, such as `Drop`
    ///
    /// If the command cannot be queued the weak reference is pruned at the
    /// next dispatch instead.
    pub(crate) fn remove_listener_nowait(&self, id: ListenerId) {
        let _ = self
            .inner
            .command_tx
            .try_send(MailboxCommand::RemoveListener { id, reply: None });
    }

    pub async fn listener_count(&self) -> usize {
        self.inner.state.read().await.listeners.len()
    }

    /// Tell every listener the mailbox is gone and forget them
    pub async fn signal_deletion(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(MailboxCommand::SignalDeletion { reply: tx }, rx)
            .await
    }

    /// Close the mailbox if it holds no messages
    ///
    /// The emptiness check, the `mailbox_deleted` fan-out and the end of the
    /// writer loop happen as one step, so no append can slip in between.
    /// Fails with `Error::NotEmpty` otherwise and leaves the mailbox open.
    pub async fn close_if_empty(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.send(MailboxCommand::Delete { reply: tx }, rx).await? {
            Ok(())
        } else {
            Err(Error::NotEmpty(self.full_name()))
        }
    }

    /// Stop the writer loop; later mutations fail with `Error::Internal`
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .inner
            .command_tx
            .send(MailboxCommand::Shutdown { reply: tx })
            .await;
        let _ = rx.await;
        Ok(())
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Mailbox {}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.inner.id)
            .field("name", &self.full_name())
            .field("uid_validity", &self.inner.uid_validity)
            .finish()
    }
}

/// Writer loop applying mutations one at a time
async fn mailbox_writer_loop(
    id: MailboxId,
    state: Arc<RwLock<FolderState>>,
    mut rx: Receiver<MailboxCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            MailboxCommand::Append {
                content,
                flags,
                internal_date,
                reply,
            } => {
                let mut state = state.write().await;
                let uid = state.append(content, flags, internal_date);
                let _ = reply.send(uid);
            }
            MailboxCommand::SetFlags {
                flags,
                add,
                uid,
                exclude,
                announce_uid,
                reply,
            } => {
                let mut state = state.write().await;
                let result = state.set_flags(&flags, add, uid, exclude, announce_uid);
                let _ = reply.send(result);
            }
            MailboxCommand::ReplaceFlags {
                flags,
                uid,
                exclude,
                announce_uid,
                reply,
            } => {
                let mut state = state.write().await;
                let result = state.replace_flags(&flags, uid, exclude, announce_uid);
                let _ = reply.send(result);
            }
            MailboxCommand::Expunge { reply } => {
                let mut state = state.write().await;
                let expunged = state.expunge();
                if !expunged.is_empty() {
                    debug!("Expunged {} messages from {:?}", expunged.len(), id);
                }
                let _ = reply.send(expunged);
            }
            MailboxCommand::ResetRecent { reply } => {
                let mut state = state.write().await;
                let _ = reply.send(state.reset_recent());
            }
            MailboxCommand::DeleteAll { reply } => {
                state.write().await.messages.clear();
                let _ = reply.send(());
            }
            MailboxCommand::AddListener {
                id: listener_id,
                listener,
                reply,
            } => {
                state.write().await.listeners.add(listener_id, listener);
                let _ = reply.send(());
            }
            MailboxCommand::RemoveListener {
                id: listener_id,
                reply,
            } => {
                let removed = state.write().await.listeners.remove(listener_id);
                if let Some(reply) = reply {
                    let _ = reply.send(removed);
                }
            }
            MailboxCommand::SignalDeletion { reply } => {
                let mut state = state.write().await;
                state.listeners.mailbox_deleted();
                state.listeners.clear();
                let _ = reply.send(());
            }
            MailboxCommand::Delete { reply } => {
                let mut state = state.write().await;
                if !state.messages.is_empty() {
                    let _ = reply.send(false);
                    continue;
                }
                state.listeners.mailbox_deleted();
                state.listeners.clear();
                info!("Mailbox {:?} deleted", id);
                let _ = reply.send(true);
                break;
            }
            MailboxCommand::Shutdown { reply } => {
                info!("Mailbox {:?} shutting down", id);
                let _ = reply.send(());
                break;
            }
        }
    }
}
