//! Document Formatters
//!
//! Pure renderers that turn structured workflow records into the markdown
//! shown in the chat UI. No I/O, no failure modes; missing answers render as
//! explicit placeholders.

use std::collections::BTreeMap;

use super::state::IntakeKey;
use super::types::{
    ExternalEnvironmentAnalysis, FeasibilityAssessment, Interview, LegalAssessment, Persona,
    ProfitabilityAssessment,
};

/// Render the intake answers as the initial interview log section.
pub fn format_clarification_log(answers: &BTreeMap<IntakeKey, String>) -> String {
    let get = |key: IntakeKey| answers.get(&key).map(String::as_str).unwrap_or("");
    format!(
        "## 収集した情報\n\n\
         ### サービス概要\n{}\n\n\
         ### 想定課題\n{}\n\n\
         ### ペルソナ\n{}\n\n\
         ### 想定解決策\n{}",
        get(IntakeKey::ServiceOverview),
        get(IntakeKey::Problem),
        get(IntakeKey::Persona),
        get(IntakeKey::Solution),
    )
}

/// Render the detailed Q&A as a log section appended to the transcript.
pub fn format_detailed_answers_log(
    questions: &[String],
    answers: &BTreeMap<usize, String>,
) -> String {
    let mut log = String::from("## 📋 詳細質問と回答\n\n");
    for (index, question) in questions.iter().enumerate() {
        let answer = answers.get(&index).map(String::as_str).unwrap_or("未回答");
        log.push_str(&format!(
            "### 質問 {}\n{}\n**回答**: {}\n\n",
            index + 1,
            question,
            answer
        ));
    }
    log
}

/// Render personas as a numbered markdown document.
pub fn format_personas(personas: &[Persona]) -> String {
    personas
        .iter()
        .enumerate()
        .map(|(index, persona)| {
            format!(
                "## {}. {}\n\n**背景:** {}\n",
                index + 1,
                persona.name,
                persona.background
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render interviews as a numbered markdown document.
pub fn format_interviews(interviews: &[Interview]) -> String {
    interviews
        .iter()
        .enumerate()
        .map(|(index, interview)| {
            format!(
                "## {}. {}さんへのインタビュー\n\n**質問:** {}\n\n**回答:** {}\n",
                index + 1,
                interview.persona.name,
                interview.question,
                interview.answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the external-environment analysis report.
pub fn format_analysis(analysis: &ExternalEnvironmentAnalysis) -> String {
    format!(
        "## 📊 外部環境分析レポート\n\n\
         ### 市場・顧客分析\n{}\n\n\
         ### 競合分析\n{}\n\n\
         ### 自社分析\n{}\n\n\
         ### PEST分析\n{}\n\n\
         ### 要約と戦略的提言\n{}",
        analysis.customer_analysis,
        analysis.competitor_analysis,
        analysis.company_analysis,
        analysis.pest_analysis,
        analysis.summary_and_strategy,
    )
}

/// Render the profitability verdict.
pub fn format_profitability(assessment: &ProfitabilityAssessment) -> String {
    let status = if assessment.is_profitable {
        "✅ 収益化可能"
    } else {
        "❌ 収益化困難"
    };
    format!("## 💰 収益性評価\n\n### {}\n\n{}", status, assessment.reason)
}

/// Render the feasibility verdict.
pub fn format_feasibility(assessment: &FeasibilityAssessment) -> String {
    let status = if assessment.is_feasible {
        "✅ 実現可能"
    } else {
        "❌ 実現困難"
    };
    format!("## 🛠️ 実現性評価\n\n### {}\n\n{}", status, assessment.reason)
}

/// Render the legal verdict.
pub fn format_legal(assessment: &LegalAssessment) -> String {
    let status = if assessment.is_compliant {
        "✅ 法的問題なし"
    } else {
        "⚠️ 法的注意が必要"
    };
    format!("## ⚖️ 法的評価\n\n### {}\n\n{}", status, assessment.reason)
}
