//! Comment lifecycle integration tests: threading, moderation,
//! deletion/reaping, and the aggregation queries, all against an
//! in-memory store.

use chrono::Duration;
use mn_core::models::{DeleteOutcome, Mode, NewComment};
use mn_core::moderation::ActivateOutcome;
use mn_core::traits::CommentRepo;
use mn_db_sqlite::SqliteCommentRepo;

fn approved(text: &str, parent: Option<i64>) -> NewComment {
    NewComment {
        parent,
        text: text.into(),
        author: None,
        email: None,
        website: None,
        remote_addr: "deadbeef".into(),
        mode: Mode::Approved,
        notification: false,
    }
}

fn pending(text: &str, parent: Option<i64>) -> NewComment {
    NewComment {
        mode: Mode::Pending,
        ..approved(text, parent)
    }
}

async fn repo() -> SqliteCommentRepo {
    SqliteCommentRepo::in_memory().await.unwrap()
}

// ── Parent resolution ────────────────────────────────────────────────────────

#[tokio::test]
async fn reply_to_reply_flattens_to_the_root() {
    let repo = repo().await;

    let a = repo.create("/p/", None, approved("First", None)).await.unwrap();
    let b = repo.create("/p/", None, approved("Second", Some(a.id))).await.unwrap();
    let c = repo.create("/p/", None, approved("Third", Some(b.id))).await.unwrap();

    assert_eq!(b.parent, Some(a.id));
    assert_eq!(c.parent, Some(a.id), "reply to a reply roots to the top-level ancestor");
}

#[tokio::test]
async fn missing_parent_becomes_a_root_comment() {
    let repo = repo().await;
    let c = repo.create("/p/", None, approved("...", Some(42))).await.unwrap();
    assert_eq!(c.parent, None);
}

#[tokio::test]
async fn cross_thread_parent_is_rejected() {
    let repo = repo().await;

    let one = repo.create("/one/", None, approved("...", None)).await.unwrap();
    let invalid = repo.create("/two/", None, approved("...", Some(one.id))).await.unwrap();
    let valid = repo
        .create("/two/", None, approved("...", Some(invalid.id)))
        .await
        .unwrap();

    assert_eq!(invalid.parent, None);
    assert_eq!(valid.parent, Some(invalid.id));
}

#[tokio::test]
async fn depth_stays_at_one_for_every_acceptance_path() {
    let repo = repo().await;

    let a = repo.create("/p/", None, approved("root", None)).await.unwrap();
    let b = repo.create("/p/", None, approved("reply", Some(a.id))).await.unwrap();
    for requested in [a.id, b.id] {
        let c = repo
            .create("/p/", None, approved("deep", Some(requested)))
            .await
            .unwrap();
        let parent = repo.get(c.parent.unwrap()).await.unwrap().unwrap();
        assert_eq!(parent.parent, None);
    }
}

// ── Moderation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn activation_is_idempotent() {
    let repo = repo().await;
    let y = repo.create("/p/", None, pending("...", None)).await.unwrap();
    assert_eq!(y.mode, Mode::Pending);

    assert_eq!(
        repo.activate(y.id).await.unwrap(),
        ActivateOutcome::Activated
    );
    assert_eq!(repo.get(y.id).await.unwrap().unwrap().mode, Mode::Approved);

    assert_eq!(
        repo.activate(y.id).await.unwrap(),
        ActivateOutcome::AlreadyActivated
    );
    assert_eq!(repo.get(y.id).await.unwrap().unwrap().mode, Mode::Approved);
}

#[tokio::test]
async fn edit_updates_text_and_modified_only() {
    let repo = repo().await;
    let c = repo.create("/p/", None, approved("Tpyo", None)).await.unwrap();
    assert!(c.modified.is_none());

    let edited = repo
        .update(
            c.id,
            mn_core::models::CommentEdit {
                text: "Typo".into(),
                author: Some("me".into()),
                website: Some("http://example.tld/".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.text, "Typo");
    assert_eq!(edited.author.as_deref(), Some("me"));
    assert_eq!(edited.website.as_deref(), Some("http://example.tld/"));
    assert!(edited.modified.is_some());
    assert_eq!(edited.id, c.id);
    assert_eq!(edited.created, c.created);
}

// ── Deletion and reaping ─────────────────────────────────────────────────────

#[tokio::test]
async fn delete_without_children_removes_row_and_thread() {
    let repo = repo().await;
    let x = repo.create("/p/", None, approved("...", None)).await.unwrap();

    match repo.delete(x.id).await.unwrap() {
        DeleteOutcome::Removed => {}
        other => panic!("expected full delete, got {:?}", other),
    }
    assert!(repo.get(x.id).await.unwrap().is_none());
    assert!(repo.thread_by_uri("/p/").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_with_reference_leaves_a_cleared_tombstone() {
    let repo = repo().await;
    let mut new = approved("First", None);
    new.author = Some("ann".into());
    new.email = Some("ann@example.tld".into());
    let a = repo.create("/p/", None, new).await.unwrap();
    let b = repo.create("/p/", None, approved("Reply", Some(a.id))).await.unwrap();

    let tombstone = match repo.delete(a.id).await.unwrap() {
        DeleteOutcome::Tombstoned(c) => c,
        other => panic!("expected tombstone, got {:?}", other),
    };
    assert_eq!(tombstone.mode, Mode::Tombstone);
    assert_eq!(tombstone.id, a.id);
    assert!(tombstone.text.is_empty());
    assert!(tombstone.author.is_none());
    assert!(tombstone.email.is_none());

    // The thread and the child survive; the child still anchors to the
    // tombstone.
    assert!(repo.thread_by_uri("/p/").await.unwrap().is_some());
    assert_eq!(repo.get(b.id).await.unwrap().unwrap().parent, Some(a.id));

    // Deleting the last child reaps the tombstone and the thread.
    repo.delete(b.id).await.unwrap();
    assert!(repo.get(a.id).await.unwrap().is_none());
    assert!(repo.thread_by_uri("/p/").await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_every_comment_in_any_order_leaves_nothing() {
    // [ 1 ] <- [ 2 ]   [ 1 ] <- [ 3 ]   [ 4 ]
    let repo = repo().await;
    let c1 = repo.create("/p/", None, approved("First", None)).await.unwrap();
    let c2 = repo.create("/p/", None, approved("Second", Some(c1.id))).await.unwrap();
    let c3 = repo.create("/p/", None, approved("Third", Some(c1.id))).await.unwrap();
    let c4 = repo.create("/p/", None, approved("Last", None)).await.unwrap();

    repo.delete(c1.id).await.unwrap(); // tombstoned, two children
    repo.delete(c2.id).await.unwrap(); // removed, tombstone keeps one child
    assert!(repo.get(c1.id).await.unwrap().is_some());

    repo.delete(c3.id).await.unwrap(); // removed, cascade reaps the tombstone
    assert!(repo.get(c1.id).await.unwrap().is_none());

    repo.delete(c4.id).await.unwrap();
    assert!(repo.thread_by_uri("/p/").await.unwrap().is_none());
    assert_eq!(repo.fetch("/p/", None, None).await.unwrap().len(), 0);
}

// ── Purge sweep ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn purge_removes_stale_pending_comments() {
    let repo = repo().await;
    repo.create("/p/", None, pending("...", None)).await.unwrap();

    assert_eq!(repo.purge(Duration::seconds(0)).await.unwrap(), 1);
    assert!(repo.get(1).await.unwrap().is_none());
    assert!(repo.thread_by_uri("/p/").await.unwrap().is_none());
}

#[tokio::test]
async fn purge_respects_min_age() {
    let repo = repo().await;
    let c = repo.create("/p/", None, pending("...", None)).await.unwrap();

    assert_eq!(repo.purge(Duration::seconds(3600)).await.unwrap(), 0);
    assert!(repo.get(c.id).await.unwrap().is_some());
}

#[tokio::test]
async fn purge_does_no_harm_to_approved_or_tombstoned_comments() {
    let repo = repo().await;
    let a = repo.create("/p/", None, pending("...", None)).await.unwrap();
    repo.activate(a.id).await.unwrap();

    let b = repo.create("/q/", None, approved("root", None)).await.unwrap();
    let c = repo.create("/q/", None, approved("reply", Some(b.id))).await.unwrap();
    repo.delete(b.id).await.unwrap(); // tombstone

    assert_eq!(repo.purge(Duration::seconds(0)).await.unwrap(), 0);
    assert!(repo.get(a.id).await.unwrap().is_some());
    assert_eq!(
        repo.get(b.id).await.unwrap().unwrap().mode,
        Mode::Tombstone
    );
    assert!(repo.get(c.id).await.unwrap().is_some());
}

#[tokio::test]
async fn purging_a_pending_leaf_cascades_into_its_tombstoned_root() {
    let repo = repo().await;
    let root = repo.create("/p/", None, approved("root", None)).await.unwrap();
    let leaf = repo.create("/p/", None, pending("reply", Some(root.id))).await.unwrap();
    repo.delete(root.id).await.unwrap(); // tombstone anchored by the pending leaf

    assert_eq!(repo.purge(Duration::seconds(0)).await.unwrap(), 1);

    // Same reap rule as delete: the orphaned tombstone and the thread go.
    assert!(repo.get(leaf.id).await.unwrap().is_none());
    assert!(repo.get(root.id).await.unwrap().is_none());
    assert!(repo.thread_by_uri("/p/").await.unwrap().is_none());
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn counts_by_uri() {
    let repo = repo().await;
    assert_eq!(
        repo.count_by_uris(&["/p/".into()]).await.unwrap(),
        vec![0],
        "unknown uri counts zero, not an error"
    );

    for _ in 0..3 {
        repo.create("/a/", None, approved("...", None)).await.unwrap();
    }
    repo.create("/b/", None, approved("...", None)).await.unwrap();
    repo.create("/b/", None, pending("...", None)).await.unwrap();

    assert_eq!(
        repo.count_by_uris(&["/a/".into(), "/b/".into(), "/c/".into()])
            .await
            .unwrap(),
        vec![3, 1, 0],
        "pending comments are not counted"
    );
}

#[tokio::test]
async fn fetch_lists_roots_and_children_separately() {
    let repo = repo().await;
    let root = repo.create("/p/", None, approved("root", None)).await.unwrap();
    for i in 0..5 {
        repo.create("/p/", None, approved(&format!("reply {i}"), Some(root.id)))
            .await
            .unwrap();
    }
    repo.create("/p/", None, approved("other root", None)).await.unwrap();

    let roots = repo.fetch("/p/", None, None).await.unwrap();
    assert_eq!(roots.len(), 2);
    assert!(roots.windows(2).all(|w| w[0].id < w[1].id));

    let replies = repo.fetch("/p/", Some(root.id), None).await.unwrap();
    assert_eq!(replies.len(), 5);

    let limited = repo.fetch("/p/", Some(root.id), Some(3)).await.unwrap();
    assert_eq!(limited.len(), 3);
}

#[tokio::test]
async fn fetch_hides_pending_but_keeps_anchoring_tombstones() {
    let repo = repo().await;
    let root = repo.create("/p/", None, approved("root", None)).await.unwrap();
    repo.create("/p/", None, approved("reply", Some(root.id))).await.unwrap();
    repo.create("/p/", None, pending("hidden", None)).await.unwrap();
    repo.delete(root.id).await.unwrap();

    let roots = repo.fetch("/p/", None, None).await.unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].mode, Mode::Tombstone);
    assert!(roots[0].text.is_empty());
}

#[tokio::test]
async fn latest_spans_threads_newest_first() {
    let repo = repo().await;
    for (i, uri) in ["/a/", "/b/", "/a/", "/c/"].iter().enumerate() {
        repo.create(uri, None, approved(&format!("text-{i}"), None))
            .await
            .unwrap();
    }

    let latest = repo.latest(2).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].1.text, "text-3");
    assert_eq!(latest[0].0.uri, "/c/");
    assert_eq!(latest[1].1.text, "text-2");

    assert!(repo.latest(0).await.is_err());
    assert!(repo.latest(-12).await.is_err());
}
