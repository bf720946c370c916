//! Integration tests for the mailbox hierarchy

use async_trait::async_trait;
use mailroom::{
    Content, Error, FlagSet, HierarchyBackend, InMemoryHierarchy, Mailbox, MailboxStore,
    MessageFlag, Result, StoreConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn names(mailboxes: &[Mailbox]) -> Vec<String> {
    mailboxes.iter().map(Mailbox::full_name).collect()
}

#[tokio::test]
async fn test_config_from_json() {
    init_logging();
    let config = StoreConfig::from_json(
        r#"{
            "initial_mailboxes": ["INBOX", "INBOX.Drafts", "Archive.2024"],
            "clock_seeded_uid_validity": false
        }"#,
    )
    .unwrap();
    let store = MailboxStore::from_config(&config).await.unwrap();

    let listed = store.list("#mail.*").await.unwrap();
    assert_eq!(
        names(&listed),
        vec![
            "#mail.INBOX",
            "#mail.INBOX.Drafts",
            "#mail.Archive",
            "#mail.Archive.2024"
        ]
    );
}

#[tokio::test]
async fn test_wildcard_listing() {
    init_logging();
    let store = MailboxStore::new();
    for path in ["#mail.box.child.grandchild", "#mail.box.sibling", "#mail.boxer", "#mail.other"] {
        store.create_path(path).await.unwrap();
    }

    assert_eq!(
        names(&store.list("#mail.box*").await.unwrap()),
        vec![
            "#mail.box",
            "#mail.box.child",
            "#mail.box.child.grandchild",
            "#mail.box.sibling",
            "#mail.boxer"
        ]
    );
    assert_eq!(
        names(&store.list("#mail.box.%").await.unwrap()),
        vec!["#mail.box.child", "#mail.box.sibling"]
    );
    assert_eq!(
        names(&store.list("#mail.box.s%").await.unwrap()),
        vec!["#mail.box.sibling"]
    );
    assert!(matches!(
        store.list("#mail.*.child").await,
        Err(Error::UnsupportedPattern(_))
    ));
}

#[tokio::test]
async fn test_delete_rules() {
    init_logging();
    let store = MailboxStore::new();
    let parent = store.create_path("#mail.Projects").await.unwrap();
    let child = store.create(&parent, "Alpha", true).await.unwrap();

    assert_eq!(
        store.delete(&parent).await,
        Err(Error::HasChildren("#mail.Projects".to_string()))
    );

    let uid = child.store(Content::from("note")).await.unwrap();
    assert_eq!(
        store.delete(&child).await,
        Err(Error::NotEmpty("#mail.Projects.Alpha".to_string()))
    );
    assert!(Error::NotEmpty(String::new()).is_folder_error());

    child
        .set_flags(FlagSet::from(MessageFlag::Deleted), true, uid, None, false)
        .await
        .unwrap();
    child.expunge().await.unwrap();

    store.delete(&child).await.unwrap();
    store.delete(&parent).await.unwrap();
    assert!(store.children(&store.root()).await.is_empty());
    assert_eq!(store.delete(&store.root()).await, Err(Error::InvalidName("#mail".to_string())));
}

#[tokio::test]
async fn test_recreated_mailbox_gets_new_uid_validity() {
    init_logging();
    let store = MailboxStore::new();
    let first = store.create_path("#mail.Trash").await.unwrap();
    let validity = first.uid_validity();
    store.delete(&first).await.unwrap();

    let second = store.create_path("#mail.Trash").await.unwrap();
    assert_ne!(first, second);
    assert!(second.uid_validity() > validity);
}

#[tokio::test]
async fn test_deleted_mailbox_rejects_writes() {
    init_logging();
    let store = MailboxStore::new();
    let mailbox = store.create_path("#mail.Scratch").await.unwrap();
    store.delete(&mailbox).await.unwrap();

    let result = mailbox.store(Content::from("late")).await;
    assert!(matches!(result, Err(Error::Internal(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_racing_append_never_loses_a_message() {
    init_logging();
    let store = MailboxStore::new();

    for round in 0..200 {
        let name = format!("#mail.Race{}", round);
        let mailbox = store.create_path(&name).await.unwrap();

        let append = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move { mailbox.store(Content::from("racing")).await })
        };
        let deleted = store.delete(&mailbox).await;
        let appended = append.await.unwrap();

        match (deleted, appended) {
            (Ok(()), Ok(uid)) => panic!("round {}: deleted mailbox still took UID {}", round, uid),
            (Ok(()), Err(e)) => {
                assert!(matches!(e, Error::Internal(_)));
                assert!(store.resolve(&name).await.is_none());
            }
            (Err(e), Ok(_)) => {
                assert_eq!(e, Error::NotEmpty(name.clone()));
                assert_eq!(mailbox.message_count().await, 1);
                assert!(store.resolve(&name).await.is_some());
            }
            (Err(e), Err(a)) => panic!("round {}: delete {:?}, append {:?}", round, e, a),
        }
    }
}

/// Backend wrapper counting the calls the store makes
struct CountingBackend {
    inner: InMemoryHierarchy,
    creates: AtomicUsize,
    deletes: AtomicUsize,
}

#[async_trait]
impl HierarchyBackend for CountingBackend {
    fn root(&self) -> Mailbox {
        self.inner.root()
    }

    async fn child(&self, parent: &Mailbox, name: &str) -> Option<Mailbox> {
        self.inner.child(parent, name).await
    }

    async fn children(&self, parent: &Mailbox) -> Vec<Mailbox> {
        self.inner.children(parent).await
    }

    async fn create(&self, parent: &Mailbox, name: &str, selectable: bool) -> Result<Mailbox> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(parent, name, selectable).await
    }

    async fn delete(&self, mailbox: &Mailbox) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(mailbox).await
    }

    async fn rename(&self, mailbox: &Mailbox, new_name: &str) -> Result<()> {
        self.inner.rename(mailbox, new_name).await
    }
}

#[tokio::test]
async fn test_injected_backend() {
    init_logging();
    let backend = Arc::new(CountingBackend {
        inner: InMemoryHierarchy::with_uid_validity_seed(1000),
        creates: AtomicUsize::new(0),
        deletes: AtomicUsize::new(0),
    });
    let store = MailboxStore::with_backend(backend.clone());

    let receipts = store.create_path("#mail.INBOX.Receipts").await.unwrap();
    assert_eq!(backend.creates.load(Ordering::SeqCst), 2);
    assert!(receipts.uid_validity() > 1000);

    // validation runs before the backend is consulted
    assert!(store.create(&receipts, "bad.name", true).await.is_err());
    assert_eq!(backend.creates.load(Ordering::SeqCst), 2);

    store.delete(&receipts).await.unwrap();
    assert_eq!(backend.deletes.load(Ordering::SeqCst), 1);
    assert!(store.resolve("#mail.INBOX.Receipts").await.is_none());
}
