//! Agent Workflow Engine
//!
//! A node-based, resumable state machine over LLM calls. The caller (chat
//! transport) invokes `execute_node` once per user turn or auto-continuation,
//! passing the current node, the full state, and optional user text; the
//! engine returns a response to surface, the full next state to persist, and
//! optionally the next node to re-invoke with no input.
//!
//! The engine is stateless between invocations and assumes the caller
//! serializes calls per session. Handlers never mutate the incoming state;
//! each clones it and patches the fields it owns.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use service_builder_llm::LlmProvider;
use tracing::{debug, warn};

use crate::utils::error::{AppError, AppResult};

use super::format::{
    format_analysis, format_clarification_log, format_detailed_answers_log, format_feasibility,
    format_interviews, format_legal, format_personas, format_profitability,
};
use super::state::{
    InterviewState, UserAction, INTAKE_QUESTIONS, INTAKE_TOTAL_QUESTIONS,
    SERVICE_OVERVIEW_QUESTION,
};
use super::types::{AgentResponse, Choice, DocumentType, NodeId};

/// Tuning knobs for the workflow engine.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Number of personas to synthesize
    pub persona_count: usize,
    /// Interview questions generated per persona
    pub questions_per_persona: usize,
    /// Cap on generated detailed questions
    pub detailed_question_count: usize,
    /// Follow-up rounds before forcing forward progress
    pub max_followup_rounds: u32,
    /// Per-LLM-call timeout
    pub request_timeout: Duration,
    /// Bounded retries for transient LLM errors
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff
    pub retry_base_delay: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            persona_count: 5,
            questions_per_persona: 3,
            detailed_question_count: 9,
            max_followup_rounds: 2,
            request_timeout: Duration::from_secs(120),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// The result of executing one node.
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    /// What to surface to the user/UI
    pub response: AgentResponse,
    /// The full state to persist
    pub next_state: InterviewState,
    /// When present, the caller should immediately re-invoke with no input
    pub next_node: Option<NodeId>,
}

/// The workflow engine. Holds the LLM provider and configuration; all
/// session state lives in the `InterviewState` passed through each call.
pub struct AgentWorkflow {
    pub(crate) provider: Arc<dyn LlmProvider>,
    pub(crate) config: WorkflowConfig,
}

impl AgentWorkflow {
    /// Create an engine over the given provider.
    pub fn new(provider: Arc<dyn LlmProvider>, config: WorkflowConfig) -> Self {
        Self { provider, config }
    }

    /// Execute one node against the current state.
    ///
    /// The only fatal errors are out-of-sequence invocations (an assessment
    /// node entered before the environment analysis exists); every LLM-side
    /// failure degrades inside the handlers instead of propagating.
    pub async fn execute_node(
        &self,
        node: NodeId,
        state: &InterviewState,
        user_response: Option<&str>,
    ) -> AppResult<NodeOutcome> {
        debug!(node = %node, has_response = user_response.is_some(), "executing node");

        match node {
            NodeId::ClarificationInterview => {
                self.handle_clarification_interview(state, user_response).await
            }
            NodeId::DetailedQuestions => self.handle_detailed_questions(state, user_response).await,
            NodeId::SummarizeRequest => self.handle_summarize_request(state).await,
            NodeId::GeneratePersonas => self.handle_generate_personas(state, user_response).await,
            NodeId::ConductInterviews => self.handle_conduct_interviews(state, user_response).await,
            NodeId::EvaluateInformation => self.handle_evaluate_information(state).await,
            NodeId::AskFollowups => self.handle_ask_followups(state, user_response).await,
            NodeId::GenerateProfessionalRequirements => {
                self.handle_generate_professional_requirements(state).await
            }
            NodeId::AnalyzeEnvironment => self.handle_analyze_environment(state).await,
            NodeId::AssessProfitability => self.handle_assess_profitability(state).await,
            NodeId::AssessFeasibility => self.handle_assess_feasibility(state).await,
            NodeId::AssessLegal => self.handle_assess_legal(state).await,
            NodeId::AssessmentGate => self.handle_assessment_gate(state).await,
            NodeId::ImproveRequirements => self.handle_improve_requirements(state).await,
            NodeId::GeneratePitch => self.handle_generate_pitch(state).await,
        }
    }

    /// Fixed intake: one free-form service overview, then three indexed
    /// questions (problem, persona, solution). Resumable at any point; once
    /// the cursor reaches the end the phase is permanently closed.
    async fn handle_clarification_interview(
        &self,
        state: &InterviewState,
        user_response: Option<&str>,
    ) -> AppResult<NodeOutcome> {
        use super::state::IntakeKey;

        if let Some(text) = non_empty(user_response) {
            // First response is the service overview
            if !state
                .clarification_answers
                .contains_key(&IntakeKey::ServiceOverview)
            {
                let mut next_state = state.clone();
                next_state
                    .clarification_answers
                    .insert(IntakeKey::ServiceOverview, text.to_string());
                next_state.current_question_index = 0;
                return Ok(intake_question(next_state, 0));
            }

            if state.current_question_index < INTAKE_QUESTIONS.len() {
                let index = state.current_question_index;
                let mut answers = state.clarification_answers.clone();
                answers.insert(INTAKE_QUESTIONS[index].key, text.to_string());
                let next_index = index + 1;

                if next_index >= INTAKE_QUESTIONS.len() {
                    // Intake finished: build the log, copy the typed seed
                    // fields, and hand over to the detailed questions.
                    let log = format_clarification_log(&answers);
                    let answer_or = |key: IntakeKey, fallback: &str| {
                        answers
                            .get(&key)
                            .filter(|s| !s.is_empty())
                            .cloned()
                            .unwrap_or_else(|| fallback.to_string())
                    };

                    let mut next_state = state.clone();
                    next_state.initial_problem =
                        answer_or(IntakeKey::Problem, &state.initial_problem);
                    next_state.initial_persona =
                        answer_or(IntakeKey::Persona, &state.initial_persona);
                    next_state.initial_solution =
                        answer_or(IntakeKey::Solution, &state.initial_solution);
                    next_state.clarification_answers = answers;
                    next_state.clarification_interview_log = log;
                    next_state.current_question_index = next_index;

                    let response = AgentResponse::Plan {
                        next_node: NodeId::DetailedQuestions,
                        state_patch: Some(json!({
                            "initial_problem": next_state.initial_problem.clone(),
                            "initial_persona": next_state.initial_persona.clone(),
                            "initial_solution": next_state.initial_solution.clone(),
                            "clarification_interview_log": next_state.clarification_interview_log.clone(),
                            "current_question_index": next_index,
                        })),
                    };

                    return Ok(NodeOutcome {
                        response,
                        next_state,
                        next_node: Some(NodeId::DetailedQuestions),
                    });
                }

                let mut next_state = state.clone();
                next_state.clarification_answers = answers;
                next_state.current_question_index = next_index;
                return Ok(intake_question(next_state, next_index));
            }

            // Everything already answered
            return Ok(plan(state.clone(), NodeId::SummarizeRequest));
        }

        // No response: (re-)display whatever is pending
        if !state
            .clarification_answers
            .contains_key(&IntakeKey::ServiceOverview)
        {
            let response = AgentResponse::Question {
                content: SERVICE_OVERVIEW_QUESTION.prompt.to_string(),
                choices: None,
                placeholder: Some(SERVICE_OVERVIEW_QUESTION.placeholder.to_string()),
                node: NodeId::ClarificationInterview,
                key: SERVICE_OVERVIEW_QUESTION.key.as_str().to_string(),
                current_question: Some(1),
                total_questions: Some(INTAKE_TOTAL_QUESTIONS),
            };
            return Ok(NodeOutcome {
                response,
                next_state: state.clone(),
                next_node: None,
            });
        }

        if state.current_question_index < INTAKE_QUESTIONS.len() {
            return Ok(intake_question(
                state.clone(),
                state.current_question_index,
            ));
        }

        Ok(plan(state.clone(), NodeId::SummarizeRequest))
    }

    /// The generated yes/no alignment questions. Generated exactly once;
    /// afterwards the list is fixed and only the cursor moves.
    async fn handle_detailed_questions(
        &self,
        state: &InterviewState,
        user_response: Option<&str>,
    ) -> AppResult<NodeOutcome> {
        if state.detailed_questions.is_empty() {
            let questions = self
                .generate_detailed_questions(state.problem(), state.persona(), state.solution())
                .await;

            if questions.is_empty() {
                warn!("no detailed questions generated, skipping alignment phase");
                return Ok(plan(state.clone(), NodeId::SummarizeRequest));
            }

            let mut next_state = state.clone();
            next_state.detailed_questions = questions;
            next_state.current_detailed_question_index = 0;
            return Ok(detailed_question(next_state, 0));
        }

        if let Some(text) = non_empty(user_response) {
            let index = state.current_detailed_question_index;
            if index < state.detailed_questions.len() {
                let mut next_state = state.clone();
                next_state.detailed_answers.insert(index, text.to_string());
                let next_index = index + 1;
                next_state.current_detailed_question_index = next_index;

                if next_index >= state.detailed_questions.len() {
                    let detailed_log = format_detailed_answers_log(
                        &next_state.detailed_questions,
                        &next_state.detailed_answers,
                    );
                    next_state.clarification_interview_log = format!(
                        "{}\n\n{}",
                        state.clarification_interview_log, detailed_log
                    );

                    let response = AgentResponse::Plan {
                        next_node: NodeId::SummarizeRequest,
                        state_patch: Some(json!({
                            "clarification_interview_log": next_state.clarification_interview_log.clone(),
                            "current_detailed_question_index": next_index,
                        })),
                    };
                    return Ok(NodeOutcome {
                        response,
                        next_state,
                        next_node: Some(NodeId::SummarizeRequest),
                    });
                }

                return Ok(detailed_question(next_state, next_index));
            }

            return Ok(plan(state.clone(), NodeId::SummarizeRequest));
        }

        if state.current_detailed_question_index < state.detailed_questions.len() {
            return Ok(detailed_question(
                state.clone(),
                state.current_detailed_question_index,
            ));
        }

        Ok(plan(state.clone(), NodeId::SummarizeRequest))
    }

    /// Pure transform step: synthesize the project summary and auto-continue.
    async fn handle_summarize_request(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let summary = self
            .generate_request_summary(
                &state.initial_problem,
                &state.initial_persona,
                &state.initial_solution,
                &state.clarification_interview_log,
            )
            .await;

        let mut next_state = state.clone();
        next_state.user_request = summary.clone();

        let response = AgentResponse::Completed {
            document_type: DocumentType::Summary,
            title: Some("サービス概要".to_string()),
            content: summary,
            node: NodeId::SummarizeRequest,
        };

        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::GeneratePersonas),
        })
    }

    /// Persona synthesis. Idempotent on re-entry; generation failure is the
    /// one recoverable error surfaced to the user as a retry prompt.
    async fn handle_generate_personas(
        &self,
        state: &InterviewState,
        user_response: Option<&str>,
    ) -> AppResult<NodeOutcome> {
        if user_response.and_then(UserAction::from_response) == Some(UserAction::ConfirmPersonas) {
            return Ok(plan(state.clone(), NodeId::ConductInterviews));
        }

        if state.personas.is_empty() {
            match self.generate_personas(&state.user_request).await {
                Ok(personas) if personas.is_empty() => {
                    let response = AgentResponse::Question {
                        content: "ペルソナの生成に失敗しました。申し訳ございません。もう一度お試しいただくか、手動でペルソナを設定していただけますか？".to_string(),
                        choices: Some(vec![
                            Choice::plain("再試行する"),
                            Choice::plain("手動で設定する"),
                        ]),
                        placeholder: None,
                        node: NodeId::GeneratePersonas,
                        key: "personas_error".to_string(),
                        current_question: None,
                        total_questions: None,
                    };
                    return Ok(NodeOutcome {
                        response,
                        next_state: state.clone(),
                        next_node: None,
                    });
                }
                Ok(personas) => {
                    let mut next_state = state.clone();
                    next_state.personas = personas;
                    next_state.iteration = 0;
                    next_state.is_information_sufficient = false;

                    let response = AgentResponse::Completed {
                        document_type: DocumentType::Personas,
                        title: Some("ペルソナ".to_string()),
                        content: format_personas(&next_state.personas),
                        node: NodeId::GeneratePersonas,
                    };
                    return Ok(NodeOutcome {
                        response,
                        next_state,
                        next_node: Some(NodeId::ConductInterviews),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "persona generation errored");
                    let response = AgentResponse::Question {
                        content: "システムエラーが発生しました。ペルソナの生成でエラーが発生しています。しばらくお待ちいただいてから再試行してください。".to_string(),
                        choices: Some(vec![Choice::plain("再試行する")]),
                        placeholder: None,
                        node: NodeId::GeneratePersonas,
                        key: "system_error".to_string(),
                        current_question: None,
                        total_questions: None,
                    };
                    return Ok(NodeOutcome {
                        response,
                        next_state: state.clone(),
                        next_node: None,
                    });
                }
            }
        }

        // Already generated: re-display and keep moving
        let response = AgentResponse::Completed {
            document_type: DocumentType::Personas,
            title: Some("ペルソナ".to_string()),
            content: format_personas(&state.personas),
            node: NodeId::GeneratePersonas,
        };
        Ok(NodeOutcome {
            response,
            next_state: state.clone(),
            next_node: Some(NodeId::ConductInterviews),
        })
    }

    /// Simulated interviews. Idempotent on re-entry: once populated they are
    /// re-displayed, never redone.
    async fn handle_conduct_interviews(
        &self,
        state: &InterviewState,
        user_response: Option<&str>,
    ) -> AppResult<NodeOutcome> {
        if user_response.and_then(UserAction::from_response)
            == Some(UserAction::ConfirmInterviews)
        {
            return Ok(plan(state.clone(), NodeId::EvaluateInformation));
        }

        if !state.interviews.is_empty() {
            let response = AgentResponse::Completed {
                document_type: DocumentType::Interviews,
                title: Some("インタビュー結果".to_string()),
                content: format_interviews(&state.interviews),
                node: NodeId::ConductInterviews,
            };
            return Ok(NodeOutcome {
                response,
                next_state: state.clone(),
                next_node: Some(NodeId::EvaluateInformation),
            });
        }

        let interviews = self
            .conduct_interviews(&state.user_request, &state.personas)
            .await;
        debug!(count = interviews.len(), "conducted interviews");

        let mut next_state = state.clone();
        next_state.interviews = interviews;

        let response = AgentResponse::Completed {
            document_type: DocumentType::Interviews,
            title: Some("インタビュー結果".to_string()),
            content: format_interviews(&next_state.interviews),
            node: NodeId::ConductInterviews,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::EvaluateInformation),
        })
    }

    /// Score information sufficiency and pick the next phase. After the
    /// follow-up rounds are exhausted this always moves forward: completing
    /// with gaps beats looping forever.
    async fn handle_evaluate_information(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let evaluation = self
            .evaluate_information(&state.user_request, &state.interviews)
            .await;

        let mut next_state = state.clone();
        next_state.is_information_sufficient = evaluation.is_sufficient;
        next_state.iteration = state.iteration + 1;
        next_state.evaluation_result = Some(evaluation.clone());

        let next_node = if evaluation.is_sufficient {
            NodeId::GenerateProfessionalRequirements
        } else if state.followup_round < self.config.max_followup_rounds {
            NodeId::AskFollowups
        } else {
            NodeId::GenerateProfessionalRequirements
        };

        let response = AgentResponse::Plan {
            next_node,
            state_patch: Some(json!({
                "is_information_sufficient": evaluation.is_sufficient,
                "iteration": next_state.iteration,
                "evaluation_result": evaluation,
            })),
        };

        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(next_node),
        })
    }

    /// Collect follow-up answers, or backfill remaining gaps with assumed
    /// defaults once the rounds are exhausted (or there is nothing to ask).
    async fn handle_ask_followups(
        &self,
        state: &InterviewState,
        user_response: Option<&str>,
    ) -> AppResult<NodeOutcome> {
        let Some(evaluation) = state.evaluation_result.clone() else {
            debug!("no evaluation result, moving to requirements");
            return Ok(plan(
                state.clone(),
                NodeId::GenerateProfessionalRequirements,
            ));
        };

        let mut updated_log = state.clarification_interview_log.clone();
        if let Some(text) = non_empty(user_response) {
            let header = if state.followup_round == 0 {
                "## 追加入力（1回目・自由記述）"
            } else {
                "## 追加入力（2回目・はい/いいえ）"
            };
            updated_log.push_str(&format!("\n\n{}\n{}", header, text));
        }

        // Rounds exhausted or nothing to ask: backfill and move forward.
        if state.followup_round >= self.config.max_followup_rounds
            || evaluation.followup_questions.is_empty()
        {
            if !evaluation.gaps.is_empty() {
                let backfill = self
                    .generate_assumption_backfill(
                        &state.user_request,
                        &state.interviews,
                        &evaluation.gaps,
                    )
                    .await;
                updated_log.push_str("\n\n## 自動補完（AI仮設定）\n");
                updated_log.push_str(&backfill);
            }

            let mut next_state = state.clone();
            next_state.clarification_interview_log = updated_log;
            next_state.followup_round = state.followup_round + 1;
            next_state.is_information_sufficient = true;

            let response = AgentResponse::Plan {
                next_node: NodeId::GenerateProfessionalRequirements,
                state_patch: Some(json!({
                    "clarification_interview_log": next_state.clarification_interview_log.clone(),
                    "followup_round": next_state.followup_round,
                    "is_information_sufficient": true,
                })),
            };
            return Ok(NodeOutcome {
                response,
                next_state,
                next_node: Some(NodeId::GenerateProfessionalRequirements),
            });
        }

        let mut next_state = state.clone();
        next_state.clarification_interview_log = updated_log;
        next_state.followup_round = state.followup_round + 1;

        // Ask the follow-up questions: round 0 as free text, round 1
        // converted to yes/no form first.
        if non_empty(user_response).is_none() {
            let (mode, questions) = if state.followup_round == 0 {
                ("自由記述", evaluation.followup_questions.clone())
            } else {
                (
                    "はい/いいえ",
                    self.convert_to_yes_no_questions(&evaluation.followup_questions)
                        .await,
                )
            };

            let listed = questions
                .iter()
                .enumerate()
                .map(|(i, q)| format!("{}. {}", i + 1, q))
                .collect::<Vec<_>>()
                .join("\n");

            let response = AgentResponse::Question {
                content: format!(
                    "以下の点について追加でお聞かせください（{}形式）:\n\n{}",
                    mode, listed
                ),
                choices: None,
                placeholder: None,
                node: NodeId::AskFollowups,
                key: "followup_response".to_string(),
                current_question: None,
                total_questions: None,
            };
            return Ok(NodeOutcome {
                response,
                next_state,
                next_node: None,
            });
        }

        // Answer collected; continue to requirements.
        let response = AgentResponse::Plan {
            next_node: NodeId::GenerateProfessionalRequirements,
            state_patch: Some(json!({
                "clarification_interview_log": next_state.clarification_interview_log.clone(),
                "followup_round": next_state.followup_round,
            })),
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::GenerateProfessionalRequirements),
        })
    }

    /// Generate the integrated requirements document.
    async fn handle_generate_professional_requirements(
        &self,
        state: &InterviewState,
    ) -> AppResult<NodeOutcome> {
        let requirements = self
            .generate_professional_requirements(&state.user_request, &state.interviews)
            .await;

        let mut next_state = state.clone();
        next_state.professional_requirements_doc = requirements.clone();

        let response = AgentResponse::Completed {
            document_type: DocumentType::Requirements,
            title: Some("統合要件定義書".to_string()),
            content: requirements,
            node: NodeId::GenerateProfessionalRequirements,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::AnalyzeEnvironment),
        })
    }

    /// External-environment analysis. Must never hard-fail the workflow;
    /// degraded reports carry their error text in every field.
    async fn handle_analyze_environment(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let analysis = self
            .analyze_external_environment(&state.professional_requirements_doc)
            .await;

        let mut next_state = state.clone();
        next_state.consultant_analysis_report = Some(analysis.clone());

        let response = AgentResponse::Completed {
            document_type: DocumentType::Analysis,
            title: Some("外部環境分析レポート".to_string()),
            content: format_analysis(&analysis),
            node: NodeId::AnalyzeEnvironment,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::AssessProfitability),
        })
    }

    /// Profitability gate.
    async fn handle_assess_profitability(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let analysis = state
            .consultant_analysis_report
            .as_ref()
            .ok_or_else(|| AppError::validation("no analysis report found"))?;

        let assessment = self
            .assess_profitability(&state.professional_requirements_doc, analysis)
            .await;

        let mut next_state = state.clone();
        next_state.profitability = Some(assessment.clone());

        let response = AgentResponse::Completed {
            document_type: DocumentType::ProfitabilityAssessment,
            title: Some("収益性評価".to_string()),
            content: format_profitability(&assessment),
            node: NodeId::AssessProfitability,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::AssessFeasibility),
        })
    }

    /// Feasibility gate.
    async fn handle_assess_feasibility(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let analysis = state
            .consultant_analysis_report
            .as_ref()
            .ok_or_else(|| AppError::validation("no analysis report found"))?;

        let assessment = self
            .assess_feasibility(&state.professional_requirements_doc, analysis)
            .await;

        let mut next_state = state.clone();
        next_state.feasibility = Some(assessment.clone());

        let response = AgentResponse::Completed {
            document_type: DocumentType::FeasibilityAssessment,
            title: Some("実現可能性評価".to_string()),
            content: format_feasibility(&assessment),
            node: NodeId::AssessFeasibility,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::AssessLegal),
        })
    }

    /// Legal gate.
    async fn handle_assess_legal(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let analysis = state
            .consultant_analysis_report
            .as_ref()
            .ok_or_else(|| AppError::validation("no analysis report found"))?;

        let assessment = self
            .assess_legal(&state.professional_requirements_doc, analysis)
            .await;

        let mut next_state = state.clone();
        next_state.legal = Some(assessment.clone());

        let response = AgentResponse::Completed {
            document_type: DocumentType::LegalAssessment,
            title: Some("法的リスク評価".to_string()),
            content: format_legal(&assessment),
            node: NodeId::AssessLegal,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::AssessmentGate),
        })
    }

    /// Pure decision: all three gates must pass to reach the pitch; any
    /// failure (or missing verdict) routes into the revision branch.
    async fn handle_assessment_gate(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let profitability_passed = state
            .profitability
            .as_ref()
            .map(|a| a.is_profitable)
            .unwrap_or(false);
        let feasibility_passed = state
            .feasibility
            .as_ref()
            .map(|a| a.is_feasible)
            .unwrap_or(false);
        let legal_passed = state
            .legal
            .as_ref()
            .map(|a| a.is_compliant)
            .unwrap_or(false);

        let all_passed = profitability_passed && feasibility_passed && legal_passed;
        debug!(
            profitability_passed,
            feasibility_passed, legal_passed, all_passed, "assessment gate"
        );

        let next_node = if all_passed {
            NodeId::GeneratePitch
        } else {
            NodeId::ImproveRequirements
        };

        Ok(plan(state.clone(), next_node))
    }

    /// Revision branch: rewrite the requirements against the gate failures
    /// and refresh the summary. Interviews are deliberately preserved, and
    /// the revised document goes straight to the pitch — one revision pass
    /// is trusted without re-running the gate.
    async fn handle_improve_requirements(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        let analysis = state
            .consultant_analysis_report
            .as_ref()
            .ok_or_else(|| AppError::validation("no analysis report found"))?;

        let mut bad_reasons = Vec::new();
        if let Some(p) = &state.profitability {
            if !p.is_profitable {
                bad_reasons.push(format!("[収益性NG] {}", p.reason));
            }
        }
        if let Some(f) = &state.feasibility {
            if !f.is_feasible {
                bad_reasons.push(format!("[実現性NG] {}", f.reason));
            }
        }
        if let Some(l) = &state.legal {
            if !l.is_compliant {
                bad_reasons.push(format!("[法務NG] {}", l.reason));
            }
        }
        debug!(count = bad_reasons.len(), "revising requirements");

        let improved = self
            .improve_requirements_doc(
                &state.professional_requirements_doc,
                analysis,
                &bad_reasons,
            )
            .await;
        let new_summary = self.generate_summary_from_requirements(&improved).await;

        let mut next_state = state.clone();
        next_state.professional_requirements_doc = improved.clone();
        next_state.user_request = new_summary;
        next_state.augment_personas = true;

        let response = AgentResponse::Completed {
            document_type: DocumentType::Requirements,
            title: Some("改善された要件定義書".to_string()),
            content: improved,
            node: NodeId::ImproveRequirements,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: Some(NodeId::GeneratePitch),
        })
    }

    /// Terminal state: generate the pitch exactly once. Re-entry with an
    /// existing pitch re-displays it without another generation.
    async fn handle_generate_pitch(&self, state: &InterviewState) -> AppResult<NodeOutcome> {
        if !state.pitch_document.is_empty() {
            let response = AgentResponse::Completed {
                document_type: DocumentType::Pitch,
                title: Some("プロジェクト企画書".to_string()),
                content: state.pitch_document.clone(),
                node: NodeId::GeneratePitch,
            };
            return Ok(NodeOutcome {
                response,
                next_state: state.clone(),
                next_node: None,
            });
        }

        let pitch = self
            .generate_pitch(&state.user_request, &state.interviews)
            .await;

        let mut next_state = state.clone();
        next_state.pitch_document = pitch.clone();

        let response = AgentResponse::Completed {
            document_type: DocumentType::Pitch,
            title: Some("プロジェクト企画書".to_string()),
            content: pitch,
            node: NodeId::GeneratePitch,
        };
        Ok(NodeOutcome {
            response,
            next_state,
            next_node: None,
        })
    }
}

/// A trimmed, non-empty user response, or none.
fn non_empty(user_response: Option<&str>) -> Option<&str> {
    user_response.map(str::trim).filter(|s| !s.is_empty())
}

/// A bare transition outcome with no user-visible content.
fn plan(next_state: InterviewState, next_node: NodeId) -> NodeOutcome {
    NodeOutcome {
        response: AgentResponse::Plan {
            next_node,
            state_patch: None,
        },
        next_state,
        next_node: Some(next_node),
    }
}

/// Ask intake question `index` (progress reported on the single 0..4 scale).
fn intake_question(next_state: InterviewState, index: usize) -> NodeOutcome {
    let question = &INTAKE_QUESTIONS[index];
    NodeOutcome {
        response: AgentResponse::Question {
            content: question.prompt.to_string(),
            choices: None,
            placeholder: Some(question.placeholder.to_string()),
            node: NodeId::ClarificationInterview,
            key: question.key.as_str().to_string(),
            current_question: Some(index as u32 + 2),
            total_questions: Some(INTAKE_TOTAL_QUESTIONS),
        },
        next_state,
        next_node: None,
    }
}

/// Ask detailed question `index` with the fixed yes/no/unsure choices.
fn detailed_question(next_state: InterviewState, index: usize) -> NodeOutcome {
    let total = next_state.detailed_questions.len() as u32;
    NodeOutcome {
        response: AgentResponse::Question {
            content: next_state.detailed_questions[index].clone(),
            choices: Some(vec![
                Choice::plain("はい"),
                Choice::plain("いいえ"),
                Choice::plain("わからない"),
            ]),
            placeholder: None,
            node: NodeId::DetailedQuestions,
            key: format!("detailed_{}", index),
            current_question: Some(index as u32 + 1),
            total_questions: Some(total),
        },
        next_state,
        next_node: None,
    }
}
