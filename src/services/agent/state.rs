//! Interview State
//!
//! The single resumable record threaded through every node. Handlers never
//! mutate a state in place; each produces a new value via clone + patched
//! fields, and the caller persists whatever comes back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{
    EvaluationResult, ExternalEnvironmentAnalysis, FeasibilityAssessment, Interview,
    LegalAssessment, Persona, ProfitabilityAssessment,
};

/// Keys of the fixed intake phase. A closed set: the dynamic detailed
/// questions use integer indices instead and never share this keyspace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IntakeKey {
    ServiceOverview,
    Problem,
    Persona,
    Solution,
}

impl IntakeKey {
    /// Wire/key form used in question messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceOverview => "service_overview",
            Self::Problem => "problem",
            Self::Persona => "persona",
            Self::Solution => "solution",
        }
    }
}

/// Exact confirmation phrase the persona card's proceed button sends.
pub const CONFIRM_PERSONAS_PHRASE: &str = "はい、この設定で進めてください";

/// Exact confirmation phrase the interview card's proceed button sends.
pub const CONFIRM_INTERVIEWS_PHRASE: &str = "はい、この情報で要件定義を進めてください";

/// Explicit action codes recognized inside free-text user input.
///
/// UI copy coupling lives only in `from_response`; handlers match on this
/// enum and never inspect raw text for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ConfirmPersonas,
    ConfirmInterviews,
}

impl UserAction {
    /// Recognize a confirmation action inside a raw user response.
    pub fn from_response(response: &str) -> Option<Self> {
        if response.contains(CONFIRM_PERSONAS_PHRASE) {
            Some(Self::ConfirmPersonas)
        } else if response.contains(CONFIRM_INTERVIEWS_PHRASE) {
            Some(Self::ConfirmInterviews)
        } else {
            None
        }
    }
}

/// One fixed intake question.
pub struct IntakeQuestion {
    pub key: IntakeKey,
    pub prompt: &'static str,
    pub placeholder: &'static str,
}

/// The free-form seed question asked before the indexed intake questions.
pub const SERVICE_OVERVIEW_QUESTION: IntakeQuestion = IntakeQuestion {
    key: IntakeKey::ServiceOverview,
    prompt: "サービスの概要を教えてください",
    placeholder: "例: 歌を歌うとAIが自動でハモってくれるアプリ",
};

/// The three indexed intake questions (problem, persona, solution).
pub const INTAKE_QUESTIONS: [IntakeQuestion; 3] = [
    IntakeQuestion {
        key: IntakeKey::Problem,
        prompt: "解決したい課題は何ですか？",
        placeholder: "例: 歌を歌っているとき、一人だと寂しい",
    },
    IntakeQuestion {
        key: IntakeKey::Persona,
        prompt: "この課題を持つターゲットユーザー（ペルソナ）は誰ですか？",
        placeholder: "例: カラオケが好きな20代の社会人",
    },
    IntakeQuestion {
        key: IntakeKey::Solution,
        prompt: "どのような解決策を想定していますか？",
        placeholder: "例: AIが自動でハモってくれるアプリ",
    },
];

/// Intake progress is reported on a single 0..4 scale: the service overview
/// is question 1, the indexed questions 2 through 4.
pub const INTAKE_TOTAL_QUESTIONS: u32 = 4;

/// The full interview state. Created empty at session start; every engine
/// call reads a full state and emits a full next state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewState {
    /// Seed answer: the problem being solved
    pub initial_problem: String,
    /// Seed answer: the target persona
    pub initial_persona: String,
    /// Seed answer: the assumed solution
    pub initial_solution: String,
    /// Append-only formatted transcript of everything collected so far.
    /// Human-readable audit trail, also fed back into later prompts.
    pub clarification_interview_log: String,
    /// Answers of the fixed intake phase
    pub clarification_answers: BTreeMap<IntakeKey, String>,
    /// Cursor into the indexed intake questions (0..=3; 3 means all answered)
    pub current_question_index: usize,
    /// LLM-generated yes/no-style questions, generated once and then fixed
    pub detailed_questions: Vec<String>,
    /// Answers to the detailed questions, keyed by question index
    pub detailed_answers: BTreeMap<usize, String>,
    /// Cursor into `detailed_questions`
    pub current_detailed_question_index: usize,
    /// The synthesized one-paragraph project summary
    pub user_request: String,
    /// Generated candidate personas
    pub personas: Vec<Persona>,
    /// Simulated interviews, flattened across personas
    pub interviews: Vec<Interview>,
    /// The integrated requirements document
    pub professional_requirements_doc: String,
    /// External-environment analysis report
    pub consultant_analysis_report: Option<ExternalEnvironmentAnalysis>,
    /// Count of evaluate→followup loop passes
    pub iteration: u32,
    /// Whether the last evaluation judged the information sufficient
    pub is_information_sufficient: bool,
    /// The last evaluation verdict
    pub evaluation_result: Option<EvaluationResult>,
    /// Follow-up round counter (0..=2); round 2 forces forward progress
    pub followup_round: u32,
    /// The final generated pitch. Non-empty means the workflow is complete.
    pub pitch_document: String,
    /// Profitability gate verdict
    pub profitability: Option<ProfitabilityAssessment>,
    /// Feasibility gate verdict
    pub feasibility: Option<FeasibilityAssessment>,
    /// Legal gate verdict
    pub legal: Option<LegalAssessment>,
    /// Set by the revision pass. Not consumed by any node; kept so callers
    /// can observe that a revision happened.
    pub augment_personas: bool,
}

impl InterviewState {
    /// The seed problem, preferring the intake answer over the raw field.
    pub fn problem(&self) -> &str {
        self.clarification_answers
            .get(&IntakeKey::Problem)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.initial_problem)
    }

    /// The seed persona, preferring the intake answer over the raw field.
    pub fn persona(&self) -> &str {
        self.clarification_answers
            .get(&IntakeKey::Persona)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.initial_persona)
    }

    /// The seed solution, preferring the intake answer over the raw field.
    pub fn solution(&self) -> &str {
        self.clarification_answers
            .get(&IntakeKey::Solution)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.initial_solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_empty() {
        let state = InterviewState::default();
        assert_eq!(state.current_question_index, 0);
        assert_eq!(state.followup_round, 0);
        assert!(state.clarification_answers.is_empty());
        assert!(state.personas.is_empty());
        assert!(state.pitch_document.is_empty());
        assert!(!state.augment_personas);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = InterviewState::default();
        state
            .clarification_answers
            .insert(IntakeKey::Problem, "孤独な夕食".to_string());
        state.detailed_answers.insert(0, "はい".to_string());
        state.followup_round = 1;

        let json = serde_json::to_string(&state).unwrap();
        let parsed: InterviewState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_state_deserializes_from_partial_json() {
        // Older or caller-constructed states may omit fields entirely.
        let parsed: InterviewState =
            serde_json::from_str(r#"{"initial_problem": "孤独な夕食"}"#).unwrap();
        assert_eq!(parsed.initial_problem, "孤独な夕食");
        assert!(parsed.detailed_questions.is_empty());
        assert!(parsed.evaluation_result.is_none());
    }

    #[test]
    fn test_intake_key_serializes_snake_case() {
        let mut answers = BTreeMap::new();
        answers.insert(IntakeKey::ServiceOverview, "概要".to_string());
        let json = serde_json::to_string(&answers).unwrap();
        assert!(json.contains("\"service_overview\""));
    }

    #[test]
    fn test_user_action_from_response() {
        assert_eq!(
            UserAction::from_response("はい、この設定で進めてください"),
            Some(UserAction::ConfirmPersonas)
        );
        assert_eq!(
            UserAction::from_response("はい、この情報で要件定義を進めてください"),
            Some(UserAction::ConfirmInterviews)
        );
        // Embedded in surrounding text still counts.
        assert_eq!(
            UserAction::from_response("了解です。はい、この設定で進めてください！"),
            Some(UserAction::ConfirmPersonas)
        );
        assert_eq!(UserAction::from_response("いいえ"), None);
    }

    #[test]
    fn test_seed_accessors_prefer_intake_answers() {
        let mut state = InterviewState {
            initial_problem: "古い値".to_string(),
            ..Default::default()
        };
        assert_eq!(state.problem(), "古い値");

        state
            .clarification_answers
            .insert(IntakeKey::Problem, "新しい課題".to_string());
        assert_eq!(state.problem(), "新しい課題");

        // Empty answers fall back to the typed field.
        state
            .clarification_answers
            .insert(IntakeKey::Persona, String::new());
        state.initial_persona = "一人暮らしの会社員".to_string();
        assert_eq!(state.persona(), "一人暮らしの会社員");
    }
}
