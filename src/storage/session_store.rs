//! Workflow Session Persistence
//!
//! Persists workflow sessions to SQLite and supports resume after restart.
//! The engine returns a full next state on every call; this store holds that
//! state plus the node to resume at, keyed by session id.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::agent::state::InterviewState;
use crate::services::agent::types::NodeId;
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};

/// Lifecycle status of a workflow session.
///
/// A session is `Completed` exactly when its state carries a non-empty
/// pitch document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Get the string form for database storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            _ => Self::InProgress,
        }
    }
}

/// A persisted workflow session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSession {
    /// Unique session ID
    pub id: String,
    /// Display title
    pub title: String,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Node to resume at on the next call
    pub current_node: NodeId,
    /// Full interview state
    pub state: InterviewState,
    /// Created timestamp (ISO-8601)
    pub created_at: String,
    /// Last updated timestamp (ISO-8601)
    pub updated_at: String,
}

impl WorkflowSession {
    /// Create a fresh session at the initial node with empty state.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            status: SessionStatus::InProgress,
            current_node: NodeId::ClarificationInterview,
            state: InterviewState::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Manages workflow session persistence in SQLite
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
}

impl SessionStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Initialize the session table (called during database setup)
    pub fn init_schema(&self) -> AppResult<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS workflow_sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'in_progress',
                current_node TEXT NOT NULL DEFAULT 'clarification_interview',
                state TEXT NOT NULL DEFAULT '{}',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workflow_sessions_status
             ON workflow_sessions(status)",
            [],
        )?;

        Ok(())
    }

    /// Insert a new session record
    pub fn create(&self, session: &WorkflowSession) -> AppResult<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        conn.execute(
            "INSERT INTO workflow_sessions (id, title, status, current_node, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.title,
                session.status.as_str(),
                session.current_node.as_str(),
                serde_json::to_string(&session.state)?,
                session.created_at,
                session.updated_at,
            ],
        )?;

        Ok(())
    }

    /// Get a session by ID
    pub fn get(&self, id: &str) -> AppResult<Option<WorkflowSession>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        let result = conn.query_row(
            "SELECT id, title, status, current_node, state, created_at, updated_at
             FROM workflow_sessions WHERE id = ?1",
            params![id],
            Self::row_to_raw,
        );

        match result {
            Ok(raw) => Ok(Some(Self::raw_to_session(raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Persist the outcome of one engine call: the next state and the node to
    /// resume at. Flips the status to completed once the pitch exists.
    pub fn save_progress(
        &self,
        id: &str,
        node: NodeId,
        state: &InterviewState,
    ) -> AppResult<()> {
        let status = if state.pitch_document.is_empty() {
            SessionStatus::InProgress
        } else {
            SessionStatus::Completed
        };

        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        let updated = conn.execute(
            "UPDATE workflow_sessions SET status = ?2, current_node = ?3, state = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                node.as_str(),
                serde_json::to_string(state)?,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if updated == 0 {
            return Err(AppError::not_found(format!("session {}", id)));
        }

        Ok(())
    }

    /// List all sessions, optionally filtered by status, newest first
    pub fn list(&self, status_filter: Option<SessionStatus>) -> AppResult<Vec<WorkflowSession>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        let mut sessions = Vec::new();
        match status_filter {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, title, status, current_node, state, created_at, updated_at
                     FROM workflow_sessions WHERE status = ?1 ORDER BY updated_at DESC",
                )?;
                let rows = stmt.query_map(params![status.as_str()], Self::row_to_raw)?;
                for raw in rows {
                    sessions.push(Self::raw_to_session(raw?)?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, title, status, current_node, state, created_at, updated_at
                     FROM workflow_sessions ORDER BY updated_at DESC",
                )?;
                let rows = stmt.query_map([], Self::row_to_raw)?;
                for raw in rows {
                    sessions.push(Self::raw_to_session(raw?)?);
                }
            }
        }

        Ok(sessions)
    }

    /// Delete a session
    pub fn delete(&self, id: &str) -> AppResult<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

        conn.execute("DELETE FROM workflow_sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
        Ok(RawSession {
            id: row.get(0)?,
            title: row.get(1)?,
            status: row.get(2)?,
            current_node: row.get(3)?,
            state: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn raw_to_session(raw: RawSession) -> AppResult<WorkflowSession> {
        let current_node = NodeId::parse(&raw.current_node).ok_or_else(|| {
            AppError::database(format!("unknown node id in store: {}", raw.current_node))
        })?;
        let state: InterviewState = serde_json::from_str(&raw.state)?;

        Ok(WorkflowSession {
            id: raw.id,
            title: raw.title,
            status: SessionStatus::parse(&raw.status),
            current_node,
            state,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

/// Raw session row before node/state decoding
struct RawSession {
    id: String,
    title: String,
    status: String,
    current_node: String,
    state: String,
    created_at: String,
    updated_at: String,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish()
    }
}
