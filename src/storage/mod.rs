//! Storage Layer
//!
//! SQLite persistence for workflow sessions. The workflow engine itself is
//! stateless; the caller uses this layer to durably store each session's
//! state and program counter between turns.

pub mod database;
pub mod session_store;

pub use database::{Database, DbPool};
pub use session_store::{SessionStatus, SessionStore, WorkflowSession};
