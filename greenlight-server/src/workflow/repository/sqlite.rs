//! SQLite implementation of [`Repository`].
//!
//! Persistent storage that survives restarts. Assignments are stored with
//! explicit relational columns plus a JSON column for the step history;
//! workflow definitions and revision snapshots are JSON payloads.
//!
//! # Schema versioning
//!
//! The database uses SQLite's `user_version` pragma to track the schema
//! version. When the schema changes, increment `SCHEMA_VERSION` and add a
//! migration function in `run_migrations`.
//!
//! # Concurrency
//!
//! `rusqlite::Connection` is not `Sync`, so it sits behind a `Mutex`, and
//! every operation runs under `tokio::task::spawn_blocking` to keep the
//! async runtime unblocked. The exactly-one-live-assignment invariant is a
//! partial unique index on `assignments(post_id) WHERE status = 'pending'`;
//! the optimistic version check is `UPDATE … WHERE id = ? AND version = ?`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use greenlight_core::{ActorId, CommentId, PostId, RevisionId, WorkflowId};

use super::{Repository, RepositoryError};
use crate::comments::{Comment, CommentKind};
use crate::history::{ActionCounts, ActionDetails, HistoryAction, HistoryEntry, HistoryQuery};
use crate::revisions::{Revision, RevisionSnapshot};
use crate::workflow::definition::Workflow;
use crate::workflow::state::{Assignment, AssignmentStatus, StepRecord};

/// Current schema version. Increment when making schema changes.
const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed repository.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open or create the database file at the given path and run any
    /// pending migrations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RepositoryError::storage(
                        "create database directory",
                        format!("{}: {}", parent.display(), e),
                    )
                })?;
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // WAL for concurrent readers; verify it actually took, since SQLite
        // silently keeps DELETE mode on some filesystems.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!("expected 'wal', database reports '{}'", journal_mode),
            ));
        }
        conn.execute_batch("PRAGMA synchronous = FULL; PRAGMA busy_timeout = 5000;")
            .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    /// In-memory database, for tests.
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepositoryError::storage("open in-memory database", e.to_string()))?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn init_schema(&self) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().expect("connection mutex poisoned");

        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?;

        if current_version > SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "database schema version {} is newer than supported version {}",
                    current_version, SCHEMA_VERSION
                ),
            ));
        }
        if current_version < SCHEMA_VERSION {
            Self::run_migrations(&conn, current_version)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| RepositoryError::storage("set schema version", e.to_string()))?;
        }
        Ok(())
    }

    fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), RepositoryError> {
        if from_version < 1 {
            Self::migrate_v0_to_v1(conn)?;
        }
        Ok(())
    }

    fn migrate_v0_to_v1(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                definition_json TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                workflow_id TEXT NOT NULL,
                current_step_id TEXT NOT NULL,
                status TEXT NOT NULL,
                step_history_json TEXT NOT NULL,
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- One live state machine per post.
            CREATE UNIQUE INDEX IF NOT EXISTS ux_assignments_active
                ON assignments(post_id) WHERE status = 'pending';

            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                action TEXT NOT NULL,
                details_json TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_actor
                ON history(actor_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_history_post
                ON history(post_id);

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                body TEXT NOT NULL,
                kind TEXT NOT NULL,
                parent_id TEXT,
                thread_id TEXT NOT NULL,
                is_resolved INTEGER NOT NULL DEFAULT 0,
                resolved_by TEXT,
                resolved_at TEXT,
                resolution TEXT,
                mentions_json TEXT NOT NULL,
                step_id TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post
                ON comments(post_id, created_at);

            CREATE TABLE IF NOT EXISTS revisions (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                snapshot_json TEXT NOT NULL,
                restored_from TEXT,
                reason TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_revisions_post
                ON revisions(post_id, created_at);
            "#,
        )
        .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))
    }

    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("connection mutex poisoned");
            f(&conn)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, format!("blocking task failed: {}", e)))?
    }
}

/// Fixed-width UTC timestamp; lexicographic order matches chronology.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::storage("parse timestamp", format!("{}: {}", s, e)))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    s.as_deref().map(parse_ts).transpose()
}

// Raw row shapes: rusqlite's row mapper runs under its own error type, so
// columns are read verbatim and decoded to domain types afterwards.

struct AssignmentRow {
    id: String,
    post_id: String,
    workflow_id: String,
    current_step_id: String,
    status: String,
    step_history_json: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl AssignmentRow {
    const COLUMNS: &'static str =
        "id, post_id, workflow_id, current_step_id, status, step_history_json, version, created_at, updated_at";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            workflow_id: row.get(2)?,
            current_step_id: row.get(3)?,
            status: row.get(4)?,
            step_history_json: row.get(5)?,
            version: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<Assignment, RepositoryError> {
        let status = AssignmentStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::storage("decode assignment", format!("unknown status '{}'", self.status))
        })?;
        let step_history: Vec<StepRecord> = serde_json::from_str(&self.step_history_json)?;
        Ok(Assignment {
            id: self.id.into(),
            post_id: self.post_id.into(),
            workflow_id: self.workflow_id.into(),
            current_step_id: self.current_step_id.into(),
            status,
            step_history,
            version: self.version as u64,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

struct HistoryRow {
    id: String,
    post_id: String,
    actor_id: String,
    action: String,
    details_json: Option<String>,
    created_at: String,
}

impl HistoryRow {
    const COLUMNS: &'static str = "id, post_id, actor_id, action, details_json, created_at";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            actor_id: row.get(2)?,
            action: row.get(3)?,
            details_json: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<HistoryEntry, RepositoryError> {
        let action = HistoryAction::parse(&self.action).ok_or_else(|| {
            RepositoryError::storage("decode history", format!("unknown action '{}'", self.action))
        })?;
        let details: Option<ActionDetails> = self
            .details_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(HistoryEntry {
            id: self.id.into(),
            post_id: self.post_id.into(),
            actor_id: self.actor_id.into(),
            action,
            details,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

struct CommentRow {
    id: String,
    post_id: String,
    actor_id: String,
    body: String,
    kind: String,
    parent_id: Option<String>,
    thread_id: String,
    is_resolved: i64,
    resolved_by: Option<String>,
    resolved_at: Option<String>,
    resolution: Option<String>,
    mentions_json: String,
    step_id: Option<String>,
    created_at: String,
}

impl CommentRow {
    const COLUMNS: &'static str =
        "id, post_id, actor_id, body, kind, parent_id, thread_id, is_resolved, resolved_by, resolved_at, resolution, mentions_json, step_id, created_at";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            actor_id: row.get(2)?,
            body: row.get(3)?,
            kind: row.get(4)?,
            parent_id: row.get(5)?,
            thread_id: row.get(6)?,
            is_resolved: row.get(7)?,
            resolved_by: row.get(8)?,
            resolved_at: row.get(9)?,
            resolution: row.get(10)?,
            mentions_json: row.get(11)?,
            step_id: row.get(12)?,
            created_at: row.get(13)?,
        })
    }

    fn decode(self) -> Result<Comment, RepositoryError> {
        let kind = CommentKind::parse(&self.kind).ok_or_else(|| {
            RepositoryError::storage("decode comment", format!("unknown kind '{}'", self.kind))
        })?;
        let mentions: Vec<ActorId> = serde_json::from_str(&self.mentions_json)?;
        Ok(Comment {
            id: self.id.into(),
            post_id: self.post_id.into(),
            actor_id: self.actor_id.into(),
            body: self.body,
            kind,
            parent_id: self.parent_id.map(Into::into),
            thread_id: self.thread_id.into(),
            is_resolved: self.is_resolved != 0,
            resolved_by: self.resolved_by.map(Into::into),
            resolved_at: parse_opt_ts(self.resolved_at)?,
            resolution: self.resolution,
            mentions,
            step_id: self.step_id.map(Into::into),
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

struct RevisionRow {
    id: String,
    post_id: String,
    actor_id: String,
    snapshot_json: String,
    restored_from: Option<String>,
    reason: Option<String>,
    created_at: String,
}

impl RevisionRow {
    const COLUMNS: &'static str =
        "id, post_id, actor_id, snapshot_json, restored_from, reason, created_at";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            actor_id: row.get(2)?,
            snapshot_json: row.get(3)?,
            restored_from: row.get(4)?,
            reason: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Revision, RepositoryError> {
        let snapshot: RevisionSnapshot = serde_json::from_str(&self.snapshot_json)?;
        Ok(Revision {
            id: self.id.into(),
            post_id: self.post_id.into(),
            actor_id: self.actor_id.into(),
            snapshot,
            restored_from: self.restored_from.map(Into::into),
            reason: self.reason,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let definition_json = serde_json::to_string(workflow)?;
        let id = workflow.id.0.clone();
        let is_active = workflow.is_active;
        let created_at = ts(&workflow.created_at);
        self.with_conn("insert workflow", move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO workflows (id, definition_json, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, definition_json, is_active as i64, created_at],
            )
            .map_err(|e| RepositoryError::storage("insert workflow", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get workflow", move |conn| {
            let definition: Option<String> = conn
                .query_row(
                    "SELECT definition_json FROM workflows WHERE id = ?1",
                    [&id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get workflow", e.to_string()))?;
            definition
                .map(|json| serde_json::from_str(&json).map_err(Into::into))
                .transpose()
        })
        .await
    }

    async fn active_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        self.with_conn("list active workflows", move |conn| {
            let mut stmt = conn
                .prepare("SELECT definition_json FROM workflows WHERE is_active = 1")
                .map_err(|e| RepositoryError::storage("list active workflows", e.to_string()))?;
            let jsons = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
                .map_err(|e| RepositoryError::storage("list active workflows", e.to_string()))?;
            jsons
                .iter()
                .map(|json| serde_json::from_str(json).map_err(Into::into))
                .collect()
        })
        .await
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), RepositoryError> {
        let a = assignment.clone();
        let step_history_json = serde_json::to_string(&a.step_history)?;
        self.with_conn("insert assignment", move |conn| {
            let result = conn.execute(
                "INSERT INTO assignments
                     (id, post_id, workflow_id, current_step_id, status, step_history_json,
                      version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    a.id.0,
                    a.post_id.0,
                    a.workflow_id.0,
                    a.current_step_id.0,
                    a.status.as_str(),
                    step_history_json,
                    a.version as i64,
                    ts(&a.created_at),
                    ts(&a.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_constraint_violation(&e) => {
                    Err(RepositoryError::DuplicateAssignment(a.post_id.clone()))
                }
                Err(e) => Err(RepositoryError::storage("insert assignment", e.to_string())),
            }
        })
        .await
    }

    async fn active_assignment(
        &self,
        post_id: &PostId,
    ) -> Result<Option<Assignment>, RepositoryError> {
        let post_id = post_id.0.clone();
        self.with_conn("get active assignment", move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM assignments WHERE post_id = ?1 AND status = 'pending'",
                        AssignmentRow::COLUMNS
                    ),
                    [&post_id],
                    AssignmentRow::read,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get active assignment", e.to_string()))?;
            row.map(AssignmentRow::decode).transpose()
        })
        .await
    }

    async fn update_assignment(
        &self,
        assignment: &Assignment,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let a = assignment.clone();
        let step_history_json = serde_json::to_string(&a.step_history)?;
        self.with_conn("update assignment", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE assignments
                     SET current_step_id = ?1, status = ?2, step_history_json = ?3,
                         version = ?4, updated_at = ?5
                     WHERE id = ?6 AND version = ?7",
                    params![
                        a.current_step_id.0,
                        a.status.as_str(),
                        step_history_json,
                        a.version as i64,
                        ts(&a.updated_at),
                        a.id.0,
                        expected_version as i64,
                    ],
                )
                .map_err(|e| RepositoryError::storage("update assignment", e.to_string()))?;
            if changed == 0 {
                return Err(RepositoryError::Conflict(a.id.clone()));
            }
            Ok(())
        })
        .await
    }

    async fn pending_assignments(&self) -> Result<Vec<Assignment>, RepositoryError> {
        self.with_conn("list pending assignments", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM assignments WHERE status = 'pending'
                     ORDER BY created_at ASC, rowid ASC",
                    AssignmentRow::COLUMNS
                ))
                .map_err(|e| {
                    RepositoryError::storage("list pending assignments", e.to_string())
                })?;
            let rows = stmt
                .query_map([], AssignmentRow::read)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<AssignmentRow>>>())
                .map_err(|e| {
                    RepositoryError::storage("list pending assignments", e.to_string())
                })?;
            rows.into_iter().map(AssignmentRow::decode).collect()
        })
        .await
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), RepositoryError> {
        let e = entry.clone();
        let details_json = e
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.with_conn("append history", move |conn| {
            conn.execute(
                "INSERT INTO history (id, post_id, actor_id, action, details_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    e.id.0,
                    e.post_id.0,
                    e.actor_id.0,
                    e.action.as_str(),
                    details_json,
                    ts(&e.created_at),
                ],
            )
            .map_err(|err| RepositoryError::storage("append history", err.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let query = query.clone();
        self.with_conn("query history", move |conn| {
            let mut sql = format!("SELECT {} FROM history", HistoryRow::COLUMNS);
            let mut clauses: Vec<String> = Vec::new();
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(post_id) = &query.post_id {
                params.push(Box::new(post_id.0.clone()));
                clauses.push(format!("post_id = ?{}", params.len()));
            }
            if let Some(actor_id) = &query.actor_id {
                params.push(Box::new(actor_id.0.clone()));
                clauses.push(format!("actor_id = ?{}", params.len()));
            }
            if let Some(before) = &query.before {
                params.push(Box::new(ts(before)));
                clauses.push(format!("created_at < ?{}", params.len()));
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            params.push(Box::new(query.effective_limit() as i64));
            sql.push_str(&format!(
                " ORDER BY created_at DESC, rowid DESC LIMIT ?{}",
                params.len()
            ));

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| RepositoryError::storage("query history", e.to_string()))?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                    HistoryRow::read,
                )
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<HistoryRow>>>())
                .map_err(|e| RepositoryError::storage("query history", e.to_string()))?;
            rows.into_iter().map(HistoryRow::decode).collect()
        })
        .await
    }

    async fn action_counts(&self, actor_id: &ActorId) -> Result<ActionCounts, RepositoryError> {
        let actor_id = actor_id.0.clone();
        self.with_conn("count history actions", move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT action, COUNT(*) FROM history WHERE actor_id = ?1 GROUP BY action",
                )
                .map_err(|e| RepositoryError::storage("count history actions", e.to_string()))?;
            let pairs = stmt
                .query_map([&actor_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<(String, i64)>>>())
                .map_err(|e| RepositoryError::storage("count history actions", e.to_string()))?;

            let mut counts = ActionCounts::default();
            for (action, count) in pairs {
                if let Some(action) = HistoryAction::parse(&action) {
                    for _ in 0..count {
                        counts.record(action);
                    }
                }
            }
            Ok(counts)
        })
        .await
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepositoryError> {
        let c = comment.clone();
        let mentions_json = serde_json::to_string(&c.mentions)?;
        self.with_conn("insert comment", move |conn| {
            conn.execute(
                "INSERT INTO comments
                     (id, post_id, actor_id, body, kind, parent_id, thread_id, is_resolved,
                      resolved_by, resolved_at, resolution, mentions_json, step_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    c.id.0,
                    c.post_id.0,
                    c.actor_id.0,
                    c.body,
                    c.kind.as_str(),
                    c.parent_id.as_ref().map(|p| p.0.clone()),
                    c.thread_id.0,
                    c.is_resolved as i64,
                    c.resolved_by.as_ref().map(|a| a.0.clone()),
                    c.resolved_at.as_ref().map(ts),
                    c.resolution,
                    mentions_json,
                    c.step_id.as_ref().map(|s| s.0.clone()),
                    ts(&c.created_at),
                ],
            )
            .map_err(|e| RepositoryError::storage("insert comment", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn comment(&self, id: &CommentId) -> Result<Option<Comment>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get comment", move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM comments WHERE id = ?1", CommentRow::COLUMNS),
                    [&id],
                    CommentRow::read,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get comment", e.to_string()))?;
            row.map(CommentRow::decode).transpose()
        })
        .await
    }

    async fn resolve_comment(
        &self,
        id: &CommentId,
        resolved_by: &ActorId,
        resolved_at: DateTime<Utc>,
        resolution: Option<&str>,
    ) -> Result<Option<Comment>, RepositoryError> {
        let id = id.0.clone();
        let resolved_by = resolved_by.0.clone();
        let resolved_at = ts(&resolved_at);
        let resolution = resolution.map(|s| s.to_string());
        self.with_conn("resolve comment", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE comments
                     SET is_resolved = 1, resolved_by = ?1, resolved_at = ?2, resolution = ?3
                     WHERE id = ?4",
                    params![resolved_by, resolved_at, resolution, id],
                )
                .map_err(|e| RepositoryError::storage("resolve comment", e.to_string()))?;
            if changed == 0 {
                return Ok(None);
            }
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM comments WHERE id = ?1", CommentRow::COLUMNS),
                    [&id],
                    CommentRow::read,
                )
                .map_err(|e| RepositoryError::storage("resolve comment", e.to_string()))?;
            row.decode().map(Some)
        })
        .await
    }

    async fn comments_for_post(&self, post_id: &PostId) -> Result<Vec<Comment>, RepositoryError> {
        let post_id = post_id.0.clone();
        self.with_conn("list comments", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM comments WHERE post_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                    CommentRow::COLUMNS
                ))
                .map_err(|e| RepositoryError::storage("list comments", e.to_string()))?;
            let rows = stmt
                .query_map([&post_id], CommentRow::read)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<CommentRow>>>())
                .map_err(|e| RepositoryError::storage("list comments", e.to_string()))?;
            rows.into_iter().map(CommentRow::decode).collect()
        })
        .await
    }

    async fn insert_revision(&self, revision: &Revision) -> Result<(), RepositoryError> {
        let r = revision.clone();
        let snapshot_json = serde_json::to_string(&r.snapshot)?;
        self.with_conn("insert revision", move |conn| {
            conn.execute(
                "INSERT INTO revisions
                     (id, post_id, actor_id, snapshot_json, restored_from, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    r.id.0,
                    r.post_id.0,
                    r.actor_id.0,
                    snapshot_json,
                    r.restored_from.as_ref().map(|id| id.0.clone()),
                    r.reason,
                    ts(&r.created_at),
                ],
            )
            .map_err(|e| RepositoryError::storage("insert revision", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn revision(&self, id: &RevisionId) -> Result<Option<Revision>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get revision", move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM revisions WHERE id = ?1",
                        RevisionRow::COLUMNS
                    ),
                    [&id],
                    RevisionRow::read,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get revision", e.to_string()))?;
            row.map(RevisionRow::decode).transpose()
        })
        .await
    }

    async fn revisions_for_post(
        &self,
        post_id: &PostId,
    ) -> Result<Vec<Revision>, RepositoryError> {
        let post_id = post_id.0.clone();
        self.with_conn("list revisions", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM revisions WHERE post_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                    RevisionRow::COLUMNS
                ))
                .map_err(|e| RepositoryError::storage("list revisions", e.to_string()))?;
            let rows = stmt
                .query_map([&post_id], RevisionRow::read)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<RevisionRow>>>())
                .map_err(|e| RepositoryError::storage("list revisions", e.to_string()))?;
            rows.into_iter().map(RevisionRow::decode).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use greenlight_core::{ApproverRef, StepId};

    use crate::workflow::definition::{Step, WorkflowScope};

    fn repo() -> SqliteRepository {
        SqliteRepository::new_in_memory().unwrap()
    }

    fn workflow() -> Workflow {
        Workflow::new(
            ActorId::from("owner"),
            "standard review",
            WorkflowScope::Global,
            vec![
                Step::new(1, "editorial", ApproverRef::Role("editor".into())),
                Step::new(2, "legal", ApproverRef::Role("legal".into())).with_min_approvals(2),
            ],
            Utc::now(),
        )
    }

    fn assignment(post: &str) -> Assignment {
        Assignment::new(
            PostId::from(post),
            WorkflowId::from("w1"),
            StepId::from("s1"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn workflow_round_trips_with_steps() {
        let repo = repo();
        let wf = workflow();
        repo.insert_workflow(&wf).await.unwrap();

        let fetched = repo.workflow(&wf.id).await.unwrap().unwrap();
        assert_eq!(fetched, wf);
        assert_eq!(fetched.steps.len(), 2);
        assert_eq!(fetched.steps[1].min_approvals, 2);
    }

    #[tokio::test]
    async fn active_workflows_excludes_inactive() {
        let repo = repo();
        let active = workflow();
        let mut inactive = workflow();
        inactive.is_active = false;
        repo.insert_workflow(&active).await.unwrap();
        repo.insert_workflow(&inactive).await.unwrap();

        let listed = repo.active_workflows().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);
    }

    #[tokio::test]
    async fn assignment_round_trips() {
        let repo = repo();
        let mut a = assignment("p1");
        a.record(
            crate::workflow::state::ReviewAction::Approve,
            ActorId::from("alice"),
            Utc::now(),
        );
        repo.insert_assignment(&a).await.unwrap();

        let fetched = repo
            .active_assignment(&PostId::from("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, a);
        assert_eq!(fetched.step_history.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_active_assignment_violates_unique_index() {
        let repo = repo();
        repo.insert_assignment(&assignment("p1")).await.unwrap();

        let err = repo.insert_assignment(&assignment("p1")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateAssignment(_)));
    }

    #[tokio::test]
    async fn terminal_assignment_does_not_block_a_new_cycle() {
        let repo = repo();
        let mut done = assignment("p1");
        done.status = AssignmentStatus::Rejected;
        repo.insert_assignment(&done).await.unwrap();

        repo.insert_assignment(&assignment("p1")).await.unwrap();
        assert!(repo
            .active_assignment(&PostId::from("p1"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn update_assignment_checks_version() {
        let repo = repo();
        let a = assignment("p1");
        repo.insert_assignment(&a).await.unwrap();

        let mut updated = a.clone();
        updated.version = 1;
        updated.status = AssignmentStatus::Completed;
        repo.update_assignment(&updated, 0).await.unwrap();

        let mut stale = a.clone();
        stale.version = 1;
        let err = repo.update_assignment(&stale, 0).await.unwrap_err();
        assert!(err.is_conflict());

        // Terminal now, so no active assignment remains.
        assert!(repo
            .active_assignment(&PostId::from("p1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn history_query_filters_and_pages() {
        let repo = repo();
        let base = Utc::now();
        for i in 0..5 {
            let actor = if i % 2 == 0 { "alice" } else { "bob" };
            repo.append_history(&HistoryEntry::new(
                PostId::from("p1"),
                ActorId::from(actor),
                HistoryAction::Approved,
                ActionDetails::from_parts(None, Some(format!("r{}", i))),
                base + TimeDelta::seconds(i),
            ))
            .await
            .unwrap();
        }

        let all = repo.history(&HistoryQuery::default()).await.unwrap();
        assert_eq!(all.len(), 5);
        // Newest first.
        assert_eq!(all[0].details.as_ref().unwrap().reason.as_deref(), Some("r4"));

        let alices = repo
            .history(&HistoryQuery::for_actor(ActorId::from("alice")))
            .await
            .unwrap();
        assert_eq!(alices.len(), 3);

        let page = repo
            .history(&HistoryQuery {
                limit: Some(2),
                before: Some(base + TimeDelta::seconds(4)),
                ..HistoryQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].details.as_ref().unwrap().reason.as_deref(), Some("r3"));
    }

    #[tokio::test]
    async fn history_details_null_round_trips() {
        let repo = repo();
        repo.append_history(&HistoryEntry::new(
            PostId::from("p1"),
            ActorId::from("alice"),
            HistoryAction::Submitted,
            None,
            Utc::now(),
        ))
        .await
        .unwrap();

        let all = repo.history(&HistoryQuery::default()).await.unwrap();
        assert_eq!(all[0].details, None);
    }

    #[tokio::test]
    async fn action_counts_group_by_action() {
        let repo = repo();
        let now = Utc::now();
        for action in [
            HistoryAction::Approved,
            HistoryAction::Approved,
            HistoryAction::Rejected,
        ] {
            repo.append_history(&HistoryEntry::new(
                PostId::from("p1"),
                ActorId::from("alice"),
                action,
                None,
                now,
            ))
            .await
            .unwrap();
        }

        let counts = repo.action_counts(&ActorId::from("alice")).await.unwrap();
        assert_eq!(counts.approved, 2);
        assert_eq!(counts.rejected, 1);
        assert_eq!(counts.submitted, 0);
    }

    #[tokio::test]
    async fn comment_round_trips_and_resolves() {
        let repo = repo();
        let comment = Comment {
            id: CommentId::from("c1"),
            post_id: PostId::from("p1"),
            actor_id: ActorId::from("alice"),
            body: "needs legal review".to_string(),
            kind: CommentKind::Feedback,
            parent_id: None,
            thread_id: CommentId::from("c1"),
            is_resolved: false,
            resolved_by: None,
            resolved_at: None,
            resolution: None,
            mentions: vec![ActorId::from("bob")],
            step_id: Some(StepId::from("s1")),
            created_at: Utc::now(),
        };
        repo.insert_comment(&comment).await.unwrap();

        let fetched = repo.comment(&comment.id).await.unwrap().unwrap();
        assert_eq!(fetched, comment);

        let resolved = repo
            .resolve_comment(
                &comment.id,
                &ActorId::from("carol"),
                Utc::now(),
                Some("addressed"),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(resolved.is_resolved);
        assert_eq!(resolved.resolved_by, Some(ActorId::from("carol")));
        assert_eq!(resolved.resolution.as_deref(), Some("addressed"));

        // Resolving again overwrites.
        let resolved = repo
            .resolve_comment(&comment.id, &ActorId::from("dave"), Utc::now(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.resolved_by, Some(ActorId::from("dave")));
        assert_eq!(resolved.resolution, None);

        assert!(repo
            .resolve_comment(
                &CommentId::from("missing"),
                &ActorId::from("x"),
                Utc::now(),
                None
            )
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn revision_round_trips() {
        let repo = repo();
        let revision = Revision {
            id: RevisionId::from("r1"),
            post_id: PostId::from("p1"),
            actor_id: ActorId::from("alice"),
            snapshot: RevisionSnapshot {
                content: Some("draft two".to_string()),
                media_urls: None,
                scheduled_at: None,
            },
            restored_from: Some(RevisionId::from("r0")),
            reason: Some("restored_version".to_string()),
            created_at: Utc::now(),
        };
        repo.insert_revision(&revision).await.unwrap();

        let fetched = repo.revision(&revision.id).await.unwrap().unwrap();
        assert_eq!(fetched, revision);

        let listed = repo.revisions_for_post(&PostId::from("p1")).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
