//! Per-connection view of a selected mailbox
//!
//! A `SessionView` registers itself as a listener on the mailbox it selects
//! and buffers what other sessions (and its own mutations) do to that mailbox
//! until the connection is ready to tell its client:
//! - appends set a size-changed flag
//! - expunges queue up the removed MSNs in order
//! - flag changes overwrite one pending entry per MSN
//!
//! Until the pending expunges are drained, the client still believes the
//! removed messages occupy their old positions. MSNs read back through the
//! view are corrected for that (see [`SessionView::first_unseen`]).
//!
//! # Drain ordering
//!
//! Expunges may only be drained once flag updates and the size-changed flag
//! have been reported. [`SessionView::drain_expunged`] fails with
//! `Error::InternalConsistency` otherwise, and the session must be torn down.
//! [`SessionView::unsolicited_responses`] drains in the required order.
//!
//! # Lifetime
//!
//! [`SessionView::deselect`] consumes the view. A view dropped without
//! deselecting deregisters from its `Drop` impl. If the mailbox is deleted,
//! the view moves to `Deselected` and fires its close signal.

use log::{debug, error, info};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::flags::FlagSet;
use crate::listener::{ListenerId, MailboxListener};
use crate::mailbox::Mailbox;
use crate::message::{Content, MsnRange, StoredMessage};
use crate::response::UnsolicitedResponse;
use crate::search::SearchCriteria;
use crate::types::*;

/// A flag change the client has not been told about yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagUpdate {
    pub msn: SequenceNumber,
    pub uid: Option<Uid>,
    pub flags: FlagSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Selected,
    /// The mailbox was deleted underneath the session
    Deselected,
}

/// What SELECT/EXAMINE reports about the mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatus {
    pub exists: usize,
    pub recent: usize,
    pub uid_validity: u32,
    pub uid_next: Uid,
    pub first_unseen: Option<SequenceNumber>,
    pub permanent_flags: FlagSet,
    pub read_only: bool,
}

/// Events not yet reported to the client
///
/// `flag_updates` is keyed by the message's position in the mailbox as it is
/// now, after every expunge in `expunged`.
#[derive(Debug, Default)]
struct PendingEvents {
    expunged: Vec<SequenceNumber>,
    flag_updates: BTreeMap<SequenceNumber, (FlagSet, Option<Uid>)>,
    size_changed: bool,
}

impl PendingEvents {
    /// Undo the pending expunges on a mailbox MSN, newest first
    fn client_msn(&self, raw: SequenceNumber) -> SequenceNumber {
        self.expunged
            .iter()
            .rev()
            .fold(raw, |msn, &removed| if removed <= msn { msn + 1 } else { msn })
    }

    /// Message count as the client has it once unreported appends are
    /// announced but before the pending expunges are
    fn client_count(&self, raw: usize) -> usize {
        raw + self.expunged.len()
    }

    fn take_flag_updates(&mut self) -> Vec<FlagUpdate> {
        let updates = std::mem::take(&mut self.flag_updates);
        updates
            .into_iter()
            .map(|(msn, (flags, uid))| FlagUpdate {
                msn: self.client_msn(msn),
                uid,
                flags,
            })
            .collect()
    }
}

/// The listener half of a session, shared weakly with the mailbox
struct SessionBuffers {
    pending: Mutex<PendingEvents>,
    deleted: AtomicBool,
    close_tx: watch::Sender<bool>,
}

impl SessionBuffers {
    fn new() -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            pending: Mutex::new(PendingEvents::default()),
            deleted: AtomicBool::new(false),
            close_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingEvents> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }
}

impl MailboxListener for SessionBuffers {
    fn added(&self, _msn: SequenceNumber) {
        self.lock().size_changed = true;
    }

    fn expunged(&self, msn: SequenceNumber) {
        let mut pending = self.lock();
        pending.expunged.push(msn);
        // the removed message's own update goes, later ones move up by one
        pending.flag_updates = std::mem::take(&mut pending.flag_updates)
            .into_iter()
            .filter(|(updated, _)| *updated != msn)
            .map(|(updated, update)| {
                if updated > msn {
                    (updated - 1, update)
                } else {
                    (updated, update)
                }
            })
            .collect();
    }

    fn flags_updated(&self, msn: SequenceNumber, flags: &FlagSet, uid: Option<Uid>) {
        self.lock().flag_updates.insert(msn, (flags.clone(), uid));
    }

    fn mailbox_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
        self.close_tx.send_replace(true);
    }
}

/// One connection's view of its selected mailbox
pub struct SessionView {
    mailbox: Mailbox,
    buffers: Arc<SessionBuffers>,
    listener_id: ListenerId,
    read_only: bool,
    registered: bool,
}

impl SessionView {
    /// Select `mailbox` read-write
    pub async fn select(mailbox: Mailbox) -> Result<Self> {
        Self::open(mailbox, false).await
    }

    /// Select `mailbox` read-only; `\Recent` is left alone
    pub async fn examine(mailbox: Mailbox) -> Result<Self> {
        Self::open(mailbox, true).await
    }

    async fn open(mailbox: Mailbox, read_only: bool) -> Result<Self> {
        if !mailbox.is_selectable() {
            return Err(Error::NotSelectable(mailbox.full_name()));
        }

        let buffers = Arc::new(SessionBuffers::new());
        let listener_id = mailbox.add_listener(&buffers).await?;
        debug!(
            "Session {:?} selected {} (read-only: {})",
            listener_id,
            mailbox.full_name(),
            read_only
        );

        Ok(Self {
            mailbox,
            buffers,
            listener_id,
            read_only,
            registered: true,
        })
    }

    /// Leave the mailbox and stop listening to it
    pub async fn deselect(mut self) -> Result<()> {
        self.registered = false;
        if self.buffers.is_deleted() {
            return Ok(());
        }
        self.mailbox.remove_listener(self.listener_id).await?;
        debug!("Session {:?} deselected {}", self.listener_id, self.mailbox.full_name());
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        if self.buffers.is_deleted() {
            SessionState::Deselected
        } else {
            SessionState::Selected
        }
    }

    /// Receiver that flips to `true` once the mailbox is deleted; the
    /// connection owning this view must then close
    pub fn close_signal(&self) -> watch::Receiver<bool> {
        self.buffers.close_tx.subscribe()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Counters for the SELECT/EXAMINE response
    ///
    /// A read-write selection clears `\Recent` on every message it reports.
    pub async fn status(&self) -> Result<SelectStatus> {
        let recent = self.mailbox.recent_count(!self.read_only).await?;
        let status = self
            .mailbox
            .with_snapshot(|snapshot| {
                let pending = self.buffers.lock();
                SelectStatus {
                    exists: pending.client_count(snapshot.message_count),
                    recent,
                    uid_validity: snapshot.uid_validity,
                    uid_next: snapshot.uid_next,
                    first_unseen: snapshot.first_unseen.map(|raw| pending.client_msn(raw)),
                    permanent_flags: self.mailbox.permanent_flags(),
                    read_only: self.read_only,
                }
            })
            .await;
        Ok(status)
    }

    // ---- buffered events ----------------------------------------------------

    /// Take every pending expunge, oldest first
    ///
    /// Fails with `Error::InternalConsistency`, leaving every buffer as it
    /// was, if flag updates are pending or the size-changed flag is set.
    pub fn drain_expunged(&self) -> Result<Vec<SequenceNumber>> {
        let mut pending = self.buffers.lock();
        if !pending.flag_updates.is_empty() || pending.size_changed {
            error!(
                "Session {:?} drained expunges with {} flag updates pending (size changed: {})",
                self.listener_id,
                pending.flag_updates.len(),
                pending.size_changed
            );
            return Err(Error::InternalConsistency(format!(
                "expunges drained before flag and size changes for {}",
                self.mailbox.full_name()
            )));
        }
        Ok(std::mem::take(&mut pending.expunged))
    }

    /// Take every pending flag update, in MSN order
    ///
    /// MSNs are numbered as the client sees them, so the updates can be
    /// reported ahead of the pending expunges.
    pub fn drain_flag_updates(&self) -> Vec<FlagUpdate> {
        self.buffers.lock().take_flag_updates()
    }

    pub fn size_changed(&self) -> bool {
        self.buffers.lock().size_changed
    }

    pub fn set_size_changed(&self, size_changed: bool) {
        self.buffers.lock().size_changed = size_changed;
    }

    /// Everything the client should hear before the next tagged response
    ///
    /// EXISTS and RECENT come first if the mailbox grew, then one FETCH per
    /// flag update, then the EXPUNGEs unless `omit_expunged` is set (FETCH,
    /// STORE and SEARCH must not send them). EXISTS counts and FETCH MSNs are
    /// numbered as the client sees them before the EXPUNGEs, so replaying the
    /// batch in order leaves the client in step with the mailbox. A deleted
    /// mailbox yields only a BYE.
    pub async fn unsolicited_responses(
        &self,
        omit_expunged: bool,
    ) -> Result<Vec<UnsolicitedResponse>> {
        if self.buffers.is_deleted() {
            return Ok(vec![UnsolicitedResponse::Bye(format!(
                "Mailbox {} has been deleted",
                self.mailbox.full_name()
            ))]);
        }

        // the buffers cannot change while the mailbox read lock is held
        let (exists, flag_updates, expunged) = self
            .mailbox
            .with_snapshot(|snapshot| {
                let mut pending = self.buffers.lock();
                let exists = std::mem::take(&mut pending.size_changed)
                    .then(|| pending.client_count(snapshot.message_count));
                let flag_updates = pending.take_flag_updates();
                let expunged = if omit_expunged {
                    Vec::new()
                } else {
                    std::mem::take(&mut pending.expunged)
                };
                (exists, flag_updates, expunged)
            })
            .await;

        let mut responses = Vec::new();
        if let Some(exists) = exists {
            responses.push(UnsolicitedResponse::Exists(exists));
            let recent = self.mailbox.recent_count(!self.read_only).await?;
            responses.push(UnsolicitedResponse::Recent(recent));
        }
        for update in flag_updates {
            responses.push(UnsolicitedResponse::Fetch {
                msn: update.msn,
                flags: update.flags,
                uid: update.uid,
            });
        }
        responses.extend(expunged.into_iter().map(UnsolicitedResponse::Expunge));

        Ok(responses)
    }

    // ---- corrected reads ----------------------------------------------------

    /// Shift a mailbox MSN to the position the client still believes it has
    ///
    /// The pending expunges are undone newest first: each one at or before
    /// the running position moves it up by one.
    pub fn correct_msn(&self, raw: SequenceNumber) -> SequenceNumber {
        self.buffers.lock().client_msn(raw)
    }

    /// First message without `\Seen`, as the client numbers it
    pub async fn first_unseen(&self) -> Option<SequenceNumber> {
        self.mailbox
            .with_snapshot(|snapshot| {
                let raw = snapshot.first_unseen?;
                Some(self.buffers.lock().client_msn(raw))
            })
            .await
    }

    /// Current MSN of `uid` in the mailbox
    pub async fn msn_for_uid(&self, uid: Uid) -> Result<SequenceNumber> {
        self.mailbox.msn(uid).await
    }

    // ---- passthroughs -------------------------------------------------------

    pub fn uid_validity(&self) -> u32 {
        self.mailbox.uid_validity()
    }

    pub async fn uid_next(&self) -> Uid {
        self.mailbox.uid_next().await
    }

    pub async fn message_count(&self) -> usize {
        self.mailbox.message_count().await
    }

    pub async fn unseen_count(&self) -> usize {
        self.mailbox.unseen_count().await
    }

    pub async fn recent_count(&self, reset: bool) -> Result<usize> {
        self.mailbox.recent_count(reset).await
    }

    pub async fn message(&self, uid: Uid) -> Option<StoredMessage> {
        self.mailbox.message(uid).await
    }

    pub async fn message_uids(&self) -> Vec<Uid> {
        self.mailbox.message_uids().await
    }

    pub async fn messages_in_range(&self, range: &MsnRange) -> Vec<StoredMessage> {
        self.mailbox.messages_in_range(range).await
    }

    pub async fn search(&self, criteria: &dyn SearchCriteria) -> Vec<Uid> {
        self.mailbox.search(criteria).await
    }

    pub async fn append(
        &self,
        content: Content,
        flags: FlagSet,
        internal_date: chrono::DateTime<chrono::Utc>,
    ) -> Result<Uid> {
        self.mailbox.append(content, flags, internal_date).await
    }

    /// Add or remove flags on one message
    ///
    /// With `silent` set this session is not notified of its own change
    /// (`STORE ... .SILENT`).
    pub async fn set_flags(
        &self,
        flags: FlagSet,
        add: bool,
        uid: Uid,
        silent: bool,
        announce_uid: bool,
    ) -> Result<FlagSet> {
        let exclude = silent.then_some(self.listener_id);
        self.mailbox
            .set_flags(flags, add, uid, exclude, announce_uid)
            .await
    }

    pub async fn replace_flags(
        &self,
        flags: FlagSet,
        uid: Uid,
        silent: bool,
        announce_uid: bool,
    ) -> Result<FlagSet> {
        let exclude = silent.then_some(self.listener_id);
        self.mailbox
            .replace_flags(flags, uid, exclude, announce_uid)
            .await
    }

    pub async fn expunge(&self) -> Result<Vec<Uid>> {
        self.mailbox.expunge().await
    }

    pub async fn copy_message(&self, uid: Uid, destination: &Mailbox) -> Result<Uid> {
        self.mailbox.copy_message(uid, destination).await
    }
}

impl Drop for SessionView {
    fn drop(&mut self) {
        if self.registered && !self.buffers.is_deleted() {
            info!(
                "Session {:?} dropped while selected on {}",
                self.listener_id,
                self.mailbox.full_name()
            );
            self.mailbox.remove_listener_nowait(self.listener_id);
        }
    }
}

impl std::fmt::Debug for SessionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionView")
            .field("mailbox", &self.mailbox)
            .field("listener_id", &self.listener_id)
            .field("read_only", &self.read_only)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    async fn mailbox_with(count: usize) -> Mailbox {
        let mailbox = Mailbox::new("INBOX", 42);
        for i in 0..count {
            mailbox
                .store(Content::from(format!("message {}", i).as_str()))
                .await
                .unwrap();
        }
        mailbox
    }

    async fn mark(mailbox: &Mailbox, uid: Uid, flag: MessageFlag) {
        mailbox
            .set_flags(FlagSet::from(flag), true, uid, None, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_select_registers_listener() {
        let mailbox = mailbox_with(0).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();

        assert_eq!(mailbox.listener_count().await, 1);
        assert_eq!(view.state(), SessionState::Selected);
        assert!(!view.is_read_only());
    }

    #[tokio::test]
    async fn test_select_unselectable_mailbox() {
        let mailbox = mailbox_with(0).await;
        mailbox.set_selectable(false);

        let result = SessionView::select(mailbox.clone()).await;
        assert!(matches!(result, Err(Error::NotSelectable(_))));
        assert_eq!(mailbox.listener_count().await, 0);
    }

    #[tokio::test]
    async fn test_append_sets_size_changed() {
        let mailbox = mailbox_with(0).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        assert!(!view.size_changed());

        mailbox.store(Content::from("new")).await.unwrap();
        assert!(view.size_changed());

        view.set_size_changed(false);
        assert!(!view.size_changed());
    }

    #[tokio::test]
    async fn test_flag_updates_last_write_wins() {
        let mailbox = mailbox_with(2).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();

        mark(&mailbox, 2, MessageFlag::Seen).await;
        mark(&mailbox, 1, MessageFlag::Flagged).await;
        mark(&mailbox, 2, MessageFlag::Answered).await;

        let updates = view.drain_flag_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].msn, 1);
        assert_eq!(updates[1].msn, 2);
        assert!(updates[1].flags.contains(&MessageFlag::Seen));
        assert!(updates[1].flags.contains(&MessageFlag::Answered));
        assert!(view.drain_flag_updates().is_empty());
    }

    #[tokio::test]
    async fn test_drain_expunged_fifo() {
        let mailbox = mailbox_with(4).await;
        mark(&mailbox, 2, MessageFlag::Deleted).await;
        mark(&mailbox, 3, MessageFlag::Deleted).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();

        mailbox.expunge().await.unwrap();

        assert_eq!(view.drain_expunged().unwrap(), vec![2, 2]);
        assert!(view.drain_expunged().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_expunged_rejects_pending_flags() {
        let mailbox = mailbox_with(3).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        mark(&mailbox, 1, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();
        mark(&mailbox, 3, MessageFlag::Seen).await;

        let result = view.drain_expunged();
        assert!(matches!(result, Err(Error::InternalConsistency(_))));

        // buffers are untouched by the failed drain
        let updates = view.drain_flag_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].msn, 3);
        assert_eq!(view.drain_expunged().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_drain_expunged_rejects_size_change() {
        let mailbox = mailbox_with(0).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        mailbox.store(Content::from("new")).await.unwrap();

        assert!(matches!(view.drain_expunged(), Err(Error::InternalConsistency(_))));
        assert!(view.size_changed());
    }

    #[tokio::test]
    async fn test_correct_msn() {
        let mailbox = mailbox_with(6).await;
        for uid in [1, 3] {
            mark(&mailbox, uid, MessageFlag::Deleted).await;
        }
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        mailbox.expunge().await.unwrap();

        // pending expunges at 1 and 2
        assert_eq!(view.correct_msn(1), 2);
        assert_eq!(view.correct_msn(2), 4);
        assert_eq!(view.correct_msn(4), 6);
    }

    #[tokio::test]
    async fn test_status_resets_recent_only_read_write() {
        let mailbox = mailbox_with(2).await;

        let examined = SessionView::examine(mailbox.clone()).await.unwrap();
        let status = examined.status().await.unwrap();
        assert_eq!(status.recent, 2);
        assert!(status.read_only);
        assert_eq!(mailbox.recent_count(false).await.unwrap(), 2);

        let selected = SessionView::select(mailbox.clone()).await.unwrap();
        let status = selected.status().await.unwrap();
        assert_eq!(status.exists, 2);
        assert_eq!(status.recent, 2);
        assert_eq!(status.uid_validity, 42);
        assert_eq!(status.uid_next, 3);
        assert_eq!(status.first_unseen, Some(1));
        assert_eq!(status.permanent_flags, FlagSet::permanent());
        assert_eq!(mailbox.recent_count(false).await.unwrap(), 0);
    }

    /// Apply a response batch to the UID list a client would hold
    fn replay(
        client: &mut Vec<Uid>,
        appended: &mut VecDeque<Uid>,
        responses: &[UnsolicitedResponse],
    ) {
        for response in responses {
            match response {
                UnsolicitedResponse::Exists(count) => {
                    assert!(*count >= client.len());
                    while client.len() < *count {
                        client.push(appended.pop_front().unwrap());
                    }
                }
                UnsolicitedResponse::Fetch { msn, uid, .. } => {
                    assert_eq!(Some(client[msn - 1]), *uid);
                }
                UnsolicitedResponse::Expunge(msn) => {
                    client.remove(msn - 1);
                }
                _ => {}
            }
        }
    }

    async fn announce(mailbox: &Mailbox, uid: Uid, flag: MessageFlag) {
        mailbox
            .set_flags(FlagSet::from(flag), true, uid, None, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unsolicited_responses_order() {
        let mailbox = mailbox_with(3).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();

        mark(&mailbox, 1, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();
        announce(&mailbox, 3, MessageFlag::Seen).await;
        mailbox.store(Content::from("new")).await.unwrap();

        let responses = view.unsolicited_responses(false).await.unwrap();
        let lines: Vec<String> = responses.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "* 4 EXISTS",
                "* 3 RECENT",
                "* 3 FETCH (FLAGS (\\Seen \\Recent) UID 3)",
                "* 1 EXPUNGE",
            ]
        );

        let mut client = vec![1, 2, 3];
        replay(&mut client, &mut VecDeque::from(vec![4]), &responses);
        assert_eq!(client, mailbox.message_uids().await);
        assert!(view.unsolicited_responses(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replayed_batches_track_the_mailbox() {
        let mailbox = mailbox_with(5).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        let mut client = vec![1, 2, 3, 4, 5];
        let mut appended = VecDeque::new();

        announce(&mailbox, 4, MessageFlag::Seen).await;
        mark(&mailbox, 2, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();
        appended.push_back(mailbox.store(Content::from("six")).await.unwrap());
        mark(&mailbox, 1, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();
        announce(&mailbox, 5, MessageFlag::Flagged).await;

        // FETCH-style batch: expunges stay pending
        let responses = view.unsolicited_responses(true).await.unwrap();
        assert_eq!(responses[0], UnsolicitedResponse::Exists(6));
        replay(&mut client, &mut appended, &responses);
        assert_eq!(client, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(view.first_unseen().await, Some(3));

        let responses = view.unsolicited_responses(false).await.unwrap();
        assert_eq!(
            responses,
            vec![UnsolicitedResponse::Expunge(2), UnsolicitedResponse::Expunge(1)]
        );
        replay(&mut client, &mut appended, &responses);
        assert_eq!(client, mailbox.message_uids().await);
        assert_eq!(view.first_unseen().await, Some(1));
    }

    #[tokio::test]
    async fn test_correct_msn_across_expunge_passes() {
        let mailbox = mailbox_with(3).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();

        mark(&mailbox, 2, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();
        mark(&mailbox, 1, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();

        // uid 3 is alone at raw position 1; the client still has it at 3
        assert_eq!(mailbox.first_unseen().await, Some(1));
        assert_eq!(view.first_unseen().await, Some(3));
    }

    #[tokio::test]
    async fn test_expunged_message_drops_its_flag_update() {
        let mailbox = mailbox_with(3).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();

        announce(&mailbox, 2, MessageFlag::Deleted).await;
        mailbox.expunge().await.unwrap();

        assert!(view.drain_flag_updates().is_empty());
        assert_eq!(view.drain_expunged().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_unsolicited_responses_can_hold_expunges() {
        let mailbox = mailbox_with(2).await;
        mark(&mailbox, 2, MessageFlag::Deleted).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        mailbox.expunge().await.unwrap();

        assert!(view.unsolicited_responses(true).await.unwrap().is_empty());
        assert_eq!(view.drain_expunged().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_deselect_deregisters() {
        let mailbox = mailbox_with(1).await;
        let view = SessionView::select(mailbox.clone()).await.unwrap();
        assert_eq!(mailbox.listener_count().await, 1);

        view.deselect().await.unwrap();
        assert_eq!(mailbox.listener_count().await, 0);
    }
}
