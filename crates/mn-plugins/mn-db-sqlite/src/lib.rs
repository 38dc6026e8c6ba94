//! # mn-db-sqlite Implementation
//!
//! SQLite implementation of the `CommentRepo` port. Every mutating
//! contract runs inside a single transaction, so parent resolution can
//! never accept a concurrently deleted comment and the reap cascade can
//! never leave a dangling `parent` behind.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mn_core::error::{AppError, Result};
use mn_core::models::{
    Comment, CommentEdit, DeleteOutcome, Mode, NewComment, Thread, VoteOutcome,
};
use mn_core::moderation::{self, ActivateOutcome, Removal};
use mn_core::resolver;
use mn_core::traits::CommentRepo;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};

/// The comment id sequence comes from `AUTOINCREMENT`, which guarantees
/// ids stay monotonic and are never reused after physical deletion.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS threads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uri TEXT UNIQUE NOT NULL,
        title TEXT
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tid INTEGER NOT NULL REFERENCES threads(id),
        parent INTEGER,
        created TEXT NOT NULL,
        modified TEXT,
        mode INTEGER NOT NULL,
        remote_addr TEXT NOT NULL,
        text TEXT NOT NULL,
        author TEXT,
        email TEXT,
        website TEXT,
        likes INTEGER NOT NULL DEFAULT 0,
        dislikes INTEGER NOT NULL DEFAULT 0,
        voters TEXT NOT NULL DEFAULT '[]',
        notification INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_tid ON comments (tid)",
    "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments (parent)",
];

pub struct SqliteCommentRepo {
    pool: SqlitePool,
}

fn store(err: sqlx::Error) -> AppError {
    AppError::Store(err.to_string())
}

/// Maps a comments row back to the domain model.
fn row_to_comment(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        thread_id: row.get("tid"),
        parent: row.get("parent"),
        created: row.get("created"),
        modified: row.get("modified"),
        mode: Mode::from_i64(row.get("mode")).unwrap_or(Mode::Pending),
        remote_addr: row.get("remote_addr"),
        text: row.get("text"),
        author: row.get("author"),
        email: row.get("email"),
        website: row.get("website"),
        likes: row.get("likes"),
        dislikes: row.get("dislikes"),
        voters: serde_json::from_str(&row.get::<String, _>("voters")).unwrap_or_default(),
        notification: row.get("notification"),
    }
}

async fn get_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(store)?;
    Ok(row.map(|r| row_to_comment(&r)))
}

async fn count_children_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE parent = ?")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(store)
}

/// Clears content and personal fields but keeps `id` and `parent`, so
/// the children's links stay valid.
async fn tombstone_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Comment> {
    sqlx::query(
        "UPDATE comments SET mode = 4, text = '', author = NULL, email = NULL,
         website = NULL, notification = 0 WHERE id = ?",
    )
    .bind(id)
    .execute(&mut **tx)
    .await
    .map_err(store)?;
    get_tx(tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("comment".into(), id))
}

/// Physically removes `target`, then walks up the ancestor chain with an
/// explicit work-list: a tombstone left with zero children carries no
/// information and is removed too. Iterative because sibling-by-sibling
/// deletions can make the chain arbitrarily long.
async fn remove_and_reap_tx(tx: &mut Transaction<'_, Sqlite>, target: &Comment) -> Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(target.id)
        .execute(&mut **tx)
        .await
        .map_err(store)?;

    let mut work: Vec<i64> = target.parent.into_iter().collect();
    while let Some(pid) = work.pop() {
        let Some(parent) = get_tx(tx, pid).await? else {
            continue;
        };
        if parent.mode == Mode::Tombstone && count_children_tx(tx, pid).await? == 0 {
            tracing::debug!(id = pid, "reaping orphaned tombstone");
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(pid)
                .execute(&mut **tx)
                .await
                .map_err(store)?;
            if let Some(grandparent) = parent.parent {
                work.push(grandparent);
            }
        }
    }
    Ok(())
}

/// Tears the thread down once its last comment row is gone.
async fn teardown_thread_tx(tx: &mut Transaction<'_, Sqlite>, tid: i64) -> Result<()> {
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE tid = ?")
        .bind(tid)
        .fetch_one(&mut **tx)
        .await
        .map_err(store)?;
    if remaining == 0 {
        sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(tid)
            .execute(&mut **tx)
            .await
            .map_err(store)?;
    }
    Ok(())
}

fn encode_voters(voters: &[String]) -> Result<String> {
    serde_json::to_string(voters).map_err(|e| AppError::Store(e.to_string()))
}

impl SqliteCommentRepo {
    pub async fn connect(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(opts)
            .await
            .map_err(store)?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// In-memory database on a single pooled connection: SQLite's
    /// transient memory database lives and dies with its connection.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(store)?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(store)?;
        }
        Ok(())
    }

    /// Resolves the requested parent per the flattening rules, using
    /// lookups inside the caller's transaction.
    async fn resolve_parent_tx(
        tx: &mut Transaction<'_, Sqlite>,
        thread_id: i64,
        requested: Option<i64>,
    ) -> Result<Option<i64>> {
        let Some(requested) = requested else {
            return Ok(None);
        };
        let Some(candidate) = get_tx(tx, requested).await? else {
            return Ok(None);
        };
        let target = resolver::flatten_target(&candidate);
        let root = if target == candidate.id {
            Some(candidate)
        } else {
            get_tx(tx, target).await?
        };
        Ok(root.and_then(|r| resolver::accept(&r, thread_id)))
    }
}

#[async_trait]
impl CommentRepo for SqliteCommentRepo {
    /// Atomic unit: thread lookup/creation, parent resolution, and the
    /// insert either all land or none do — no ghost threads, no parents
    /// accepted from a state that no longer exists.
    async fn create(&self, uri: &str, title: Option<&str>, new: NewComment) -> Result<Comment> {
        let mut tx = self.pool.begin().await.map_err(store)?;

        let thread_id: i64 = match sqlx::query("SELECT id FROM threads WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store)?
        {
            Some(row) => row.get("id"),
            None => sqlx::query("INSERT INTO threads (uri, title) VALUES (?, ?)")
                .bind(uri)
                .bind(title)
                .execute(&mut *tx)
                .await
                .map_err(store)?
                .last_insert_rowid(),
        };

        let parent = Self::resolve_parent_tx(&mut tx, thread_id, new.parent).await?;

        let id = sqlx::query(
            "INSERT INTO comments (tid, parent, created, mode, remote_addr,
             text, author, email, website, notification)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(parent)
        .bind(Utc::now())
        .bind(new.mode.as_i64())
        .bind(&new.remote_addr)
        .bind(&new.text)
        .bind(&new.author)
        .bind(&new.email)
        .bind(&new.website)
        .bind(new.notification)
        .execute(&mut *tx)
        .await
        .map_err(store)?
        .last_insert_rowid();

        let comment = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;
        tx.commit().await.map_err(store)?;
        Ok(comment)
    }

    async fn get(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store)?;
        Ok(row.map(|r| row_to_comment(&r)))
    }

    async fn update(&self, id: i64, edit: CommentEdit) -> Result<Comment> {
        let mut tx = self.pool.begin().await.map_err(store)?;
        let current = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;
        moderation::editable(current.mode)?;

        sqlx::query(
            "UPDATE comments SET text = ?, modified = ?,
             author = COALESCE(?, author), website = COALESCE(?, website)
             WHERE id = ?",
        )
        .bind(&edit.text)
        .bind(Utc::now())
        .bind(&edit.author)
        .bind(&edit.website)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(store)?;

        let updated = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;
        tx.commit().await.map_err(store)?;
        Ok(updated)
    }

    async fn activate(&self, id: i64) -> Result<ActivateOutcome> {
        let mut tx = self.pool.begin().await.map_err(store)?;
        let current = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;
        let outcome = moderation::activate(current.mode)?;
        if outcome == ActivateOutcome::Activated {
            sqlx::query("UPDATE comments SET mode = 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(store)?;
        }
        tx.commit().await.map_err(store)?;
        Ok(outcome)
    }

    async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        let mut tx = self.pool.begin().await.map_err(store)?;
        let target = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;

        let outcome = match moderation::removal(count_children_tx(&mut tx, id).await?) {
            Removal::Tombstone => DeleteOutcome::Tombstoned(tombstone_tx(&mut tx, id).await?),
            Removal::Physical => {
                remove_and_reap_tx(&mut tx, &target).await?;
                teardown_thread_tx(&mut tx, target.thread_id).await?;
                DeleteOutcome::Removed
            }
        };
        tx.commit().await.map_err(store)?;
        Ok(outcome)
    }

    async fn purge(&self, min_age: Duration) -> Result<u64> {
        let cutoff = Utc::now() - min_age;
        let mut tx = self.pool.begin().await.map_err(store)?;

        let expired: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM comments WHERE mode = 2 AND created < ?")
                .bind(cutoff)
                .fetch_all(&mut *tx)
                .await
                .map_err(store)?;

        let mut purged = 0u64;
        for id in expired {
            let Some(target) = get_tx(&mut tx, id).await? else {
                continue;
            };
            match moderation::removal(count_children_tx(&mut tx, id).await?) {
                Removal::Tombstone => {
                    tombstone_tx(&mut tx, id).await?;
                }
                Removal::Physical => remove_and_reap_tx(&mut tx, &target).await?,
            }
            purged += 1;
        }

        // Threads emptied by the sweep go with it
        sqlx::query("DELETE FROM threads WHERE id NOT IN (SELECT tid FROM comments)")
            .execute(&mut *tx)
            .await
            .map_err(store)?;

        tx.commit().await.map_err(store)?;
        if purged > 0 {
            tracing::info!(purged, "purged unmoderated comments");
        }
        Ok(purged)
    }

    async fn vote(&self, id: i64, like: bool, voter: &str) -> Result<VoteOutcome> {
        let mut tx = self.pool.begin().await.map_err(store)?;
        let current = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;

        // No self-votes, no double votes
        if current.remote_addr == voter || current.voters.iter().any(|v| v == voter) {
            return Ok(VoteOutcome {
                applied: false,
                likes: current.likes,
                dislikes: current.dislikes,
            });
        }

        let mut voters = current.voters.clone();
        voters.push(voter.to_string());
        let (likes, dislikes) = if like {
            (current.likes + 1, current.dislikes)
        } else {
            (current.likes, current.dislikes + 1)
        };

        sqlx::query("UPDATE comments SET likes = ?, dislikes = ?, voters = ? WHERE id = ?")
            .bind(likes)
            .bind(dislikes)
            .bind(encode_voters(&voters)?)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store)?;
        tx.commit().await.map_err(store)?;

        Ok(VoteOutcome {
            applied: true,
            likes,
            dislikes,
        })
    }

    async fn unsubscribe(&self, id: i64, email: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store)?;
        let comment = get_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;

        sqlx::query("UPDATE comments SET notification = 0 WHERE tid = ? AND email = ?")
            .bind(comment.thread_id)
            .bind(email)
            .execute(&mut *tx)
            .await
            .map_err(store)?;
        tx.commit().await.map_err(store)?;
        Ok(())
    }

    async fn thread_by_uri(&self, uri: &str) -> Result<Option<Thread>> {
        let row = sqlx::query("SELECT id, uri, title FROM threads WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&self.pool)
            .await
            .map_err(store)?;
        Ok(row.map(|r| Thread {
            id: r.get("id"),
            uri: r.get("uri"),
            title: r.get("title"),
        }))
    }

    async fn count_by_uris(&self, uris: &[String]) -> Result<Vec<i64>> {
        let mut counts = Vec::with_capacity(uris.len());
        for uri in uris {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(comments.id) FROM comments
                 INNER JOIN threads ON threads.id = comments.tid
                 WHERE threads.uri = ? AND comments.mode = 1",
            )
            .bind(uri)
            .fetch_one(&self.pool)
            .await
            .map_err(store)?;
            counts.push(count);
        }
        Ok(counts)
    }

    async fn fetch(&self, uri: &str, parent: Option<i64>, limit: Option<i64>) -> Result<Vec<Comment>> {
        // Approved comments plus the tombstones anchoring their children
        let mut sql = String::from(
            "SELECT comments.* FROM comments
             INNER JOIN threads ON threads.id = comments.tid
             WHERE threads.uri = ? AND comments.mode IN (1, 4)",
        );
        if parent.is_some() {
            sql.push_str(" AND comments.parent = ?");
        } else {
            sql.push_str(" AND comments.parent IS NULL");
        }
        sql.push_str(" ORDER BY comments.created ASC, comments.id ASC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql).bind(uri);
        if let Some(parent) = parent {
            query = query.bind(parent);
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store)?;
        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn latest(&self, limit: i64) -> Result<Vec<(Thread, Comment)>> {
        if limit < 1 {
            return Err(AppError::Validation(
                "limit must be a positive integer".into(),
            ));
        }
        let rows = sqlx::query(
            "SELECT threads.id AS thread_pk, threads.uri AS thread_uri,
                    threads.title AS thread_title, comments.*
             FROM comments
             INNER JOIN threads ON threads.id = comments.tid
             WHERE comments.mode = 1
             ORDER BY comments.created DESC, comments.id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store)?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    Thread {
                        id: row.get("thread_pk"),
                        uri: row.get("thread_uri"),
                        title: row.get("thread_title"),
                    },
                    row_to_comment(row),
                )
            })
            .collect())
    }
}
