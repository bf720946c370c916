//! Mailbox listener protocol
//!
//! A mailbox broadcasts every mutation to its registered listeners
//! synchronously, from inside its serialized mutation path, before the
//! mutating call returns to its caller. For one mutation, every listener
//! observes the event before the next mutation on that mailbox starts.
//!
//! Listeners are held weakly. A listener whose owner has gone away is pruned
//! on the next dispatch, so a dropped session is never notified even if it
//! never got to deregister.
//!
//! Callbacks run while the mailbox holds its write lock and must not call back
//! into the mailbox.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use uuid::Uuid;

use crate::flags::FlagSet;
use crate::types::{SequenceNumber, Uid};

/// Observer of mailbox mutations
pub trait MailboxListener: Send + Sync {
    /// A message was appended at this position
    fn added(&self, msn: SequenceNumber);

    /// The message formerly at this position was removed
    ///
    /// The position already accounts for earlier removals in the same expunge.
    fn expunged(&self, msn: SequenceNumber);

    /// Flags of the message at this position changed
    fn flags_updated(&self, msn: SequenceNumber, flags: &FlagSet, uid: Option<Uid>);

    /// The mailbox itself was removed. No further events follow.
    fn mailbox_deleted(&self);
}

/// Registration handle used to deregister or to exclude a listener from a
/// flag broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// The listener collection owned by one mailbox
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: HashMap<ListenerId, Weak<dyn MailboxListener>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, id: ListenerId, listener: Weak<dyn MailboxListener>) {
        self.listeners.insert(id, listener);
        debug!("Registered listener {:?} ({} total)", id, self.listeners.len());
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(&id).is_some();
        if removed {
            debug!("Deregistered listener {:?} ({} left)", id, self.listeners.len());
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Deliver an event to every live listener except `exclude`
    pub(crate) fn dispatch<F>(&mut self, exclude: Option<ListenerId>, mut deliver: F)
    where
        F: FnMut(&dyn MailboxListener),
    {
        self.listeners.retain(|id, listener| match listener.upgrade() {
            Some(listener) => {
                if exclude != Some(*id) {
                    deliver(listener.as_ref());
                }
                true
            }
            None => {
                debug!("Pruned dropped listener {:?}", id);
                false
            }
        });
    }

    pub(crate) fn added(&mut self, msn: SequenceNumber) {
        self.dispatch(None, |l| l.added(msn));
    }

    pub(crate) fn expunged(&mut self, msn: SequenceNumber) {
        self.dispatch(None, |l| l.expunged(msn));
    }

    pub(crate) fn flags_updated(
        &mut self,
        msn: SequenceNumber,
        flags: &FlagSet,
        uid: Option<Uid>,
        exclude: Option<ListenerId>,
    ) {
        self.dispatch(exclude, |l| l.flags_updated(msn, flags, uid));
    }

    pub(crate) fn mailbox_deleted(&mut self) {
        self.dispatch(None, |l| l.mailbox_deleted());
    }
}

/// Register `listener` under a fresh id, keeping only a weak reference
pub(crate) fn downgrade<L>(listener: &Arc<L>) -> Weak<dyn MailboxListener>
where
    L: MailboxListener + 'static,
{
    let listener: Arc<dyn MailboxListener> = listener.clone();
    Arc::downgrade(&listener)
}
