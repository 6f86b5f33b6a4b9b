//! Service Builder - Workflow Engine Library
//!
//! Backend library for the AI-assisted service builder: a resumable,
//! node-based interview workflow over LLM calls, plus the session storage
//! its callers use to make the workflow durable across restarts.
//!
//! The engine (`services::agent`) is stateless: every call receives the full
//! current state and returns the full next state. Callers persist that state
//! (`storage`) and re-invoke with the returned next node to auto-continue.

pub mod services;
pub mod storage;
pub mod utils;

pub use services::agent::{
    AgentResponse, AgentWorkflow, InterviewState, NodeId, NodeOutcome, WorkflowConfig,
};
pub use storage::{Database, SessionStore, WorkflowSession};
pub use utils::error::{AppError, AppResult};
