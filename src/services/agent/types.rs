//! Agent Workflow Types
//!
//! The node identifiers, response union, and domain records exchanged between
//! the workflow engine and its caller. Wire shapes (tag values, camelCase
//! payload fields) are the contract the chat UI consumes and must stay stable.

use serde::{Deserialize, Serialize};

/// One named state in the workflow state machine. Acts as the program
/// counter: the caller stores the last `NodeId` alongside the state and
/// passes it back on the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    ClarificationInterview,
    DetailedQuestions,
    SummarizeRequest,
    GeneratePersonas,
    ConductInterviews,
    EvaluateInformation,
    AskFollowups,
    GenerateProfessionalRequirements,
    AnalyzeEnvironment,
    AssessProfitability,
    AssessFeasibility,
    AssessLegal,
    AssessmentGate,
    ImproveRequirements,
    GeneratePitch,
}

impl NodeId {
    /// Get the string form for storage and the wire contract
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClarificationInterview => "clarification_interview",
            Self::DetailedQuestions => "detailed_questions",
            Self::SummarizeRequest => "summarize_request",
            Self::GeneratePersonas => "generate_personas",
            Self::ConductInterviews => "conduct_interviews",
            Self::EvaluateInformation => "evaluate_information",
            Self::AskFollowups => "ask_followups",
            Self::GenerateProfessionalRequirements => "generate_professional_requirements",
            Self::AnalyzeEnvironment => "analyze_environment",
            Self::AssessProfitability => "assess_profitability",
            Self::AssessFeasibility => "assess_feasibility",
            Self::AssessLegal => "assess_legal",
            Self::AssessmentGate => "assessment_gate",
            Self::ImproveRequirements => "improve_requirements",
            Self::GeneratePitch => "generate_pitch",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clarification_interview" => Some(Self::ClarificationInterview),
            "detailed_questions" => Some(Self::DetailedQuestions),
            "summarize_request" => Some(Self::SummarizeRequest),
            "generate_personas" => Some(Self::GeneratePersonas),
            "conduct_interviews" => Some(Self::ConductInterviews),
            "evaluate_information" => Some(Self::EvaluateInformation),
            "ask_followups" => Some(Self::AskFollowups),
            "generate_professional_requirements" => {
                Some(Self::GenerateProfessionalRequirements)
            }
            "analyze_environment" => Some(Self::AnalyzeEnvironment),
            "assess_profitability" => Some(Self::AssessProfitability),
            "assess_feasibility" => Some(Self::AssessFeasibility),
            "assess_legal" => Some(Self::AssessLegal),
            "assessment_gate" => Some(Self::AssessmentGate),
            "improve_requirements" => Some(Self::ImproveRequirements),
            "generate_pitch" => Some(Self::GeneratePitch),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of generated artifact carried by a `completed` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Summary,
    Personas,
    Interviews,
    Requirements,
    Analysis,
    Pitch,
    ProfitabilityAssessment,
    FeasibilityAssessment,
    LegalAssessment,
}

/// A fixed-answer option rendered as a button by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    /// A choice whose label doubles as its value.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            label: text.clone(),
            value: text,
        }
    }
}

/// The engine's externally visible output: one of four mutually exclusive
/// variants. The caller's only responsibility is "if a next node was
/// returned, call again with no input; otherwise wait for the user".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentResponse {
    /// The engine needs one more piece of user input at the current node.
    #[serde(rename_all = "camelCase")]
    Question {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<Choice>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        node: NodeId,
        key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_question: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_questions: Option<u32>,
    },
    /// Pure state-machine transition with no user-visible content.
    #[serde(rename_all = "camelCase")]
    Plan {
        next_node: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        state_patch: Option<serde_json::Value>,
    },
    /// Incremental generation streamed to the UI. Part of the caller
    /// contract; no current node produces it.
    #[serde(rename_all = "camelCase")]
    Streaming {
        content: String,
        is_complete: bool,
        node: NodeId,
    },
    /// A finished document ready for display as a clickable artifact.
    #[serde(rename_all = "camelCase")]
    Completed {
        document_type: DocumentType,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        content: String,
        node: NodeId,
    },
}

/// A synthetic user profile used to simulate stakeholder feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub background: String,
}

/// One simulated interview exchange, standing in for real user research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub persona: Persona,
    pub question: String,
    pub answer: String,
}

/// Verdict on whether the accumulated interviews suffice to write the
/// requirements document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub reason: String,
    pub is_sufficient: bool,
    pub gaps: Vec<String>,
    pub followup_questions: Vec<String>,
}

/// Narrative external-environment analysis. Every field is a string; the
/// deserialization boundary coerces whatever shape the model returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEnvironmentAnalysis {
    pub customer_analysis: String,
    pub competitor_analysis: String,
    pub company_analysis: String,
    pub pest_analysis: String,
    pub summary_and_strategy: String,
}

impl ExternalEnvironmentAnalysis {
    /// A degraded report with the same literal text in every field.
    pub fn degraded(message: &str) -> Self {
        Self {
            customer_analysis: message.to_string(),
            competitor_analysis: message.to_string(),
            company_analysis: message.to_string(),
            pest_analysis: message.to_string(),
            summary_and_strategy: message.to_string(),
        }
    }
}

/// Profitability gate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityAssessment {
    pub is_profitable: bool,
    pub reason: String,
}

/// Feasibility gate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityAssessment {
    pub is_feasible: bool,
    pub reason: String,
}

/// Legal/compliance gate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalAssessment {
    pub is_compliant: bool,
    pub reason: String,
}
