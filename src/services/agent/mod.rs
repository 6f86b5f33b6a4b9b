//! Agent Workflow
//!
//! The multi-step interview/requirements-generation workflow: a node-based,
//! resumable state machine over LLM calls that drives a user from three seed
//! answers through clarification questions, persona generation, simulated
//! interviews, requirement synthesis, the profitability/feasibility/legal
//! gate, conditional revision, and final pitch generation.
//!
//! - `types` - Node identifiers, the response union, domain records
//! - `state` - The resumable `InterviewState` record and intake plan
//! - `workflow` - The engine: `AgentWorkflow::execute_node` and its handlers
//! - `generators` - One LLM helper per generative concern
//! - `parse` - Shared defensive JSON parsing
//! - `format` - Markdown renderers for generated documents

pub mod format;
mod generators;
pub mod parse;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod workflow;

pub use state::{InterviewState, UserAction};
pub use types::{
    AgentResponse, Choice, DocumentType, EvaluationResult, ExternalEnvironmentAnalysis,
    FeasibilityAssessment, Interview, LegalAssessment, NodeId, Persona, ProfitabilityAssessment,
};
pub use workflow::{AgentWorkflow, NodeOutcome, WorkflowConfig};
