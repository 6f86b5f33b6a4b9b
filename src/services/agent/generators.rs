//! LLM Helper Methods
//!
//! One single-purpose helper per generative concern of the workflow. All
//! calls funnel through `complete`, which applies the per-call timeout and
//! bounded retry for transient provider errors.
//!
//! Contract: free-text helpers never fail — on any error they return a
//! literal Japanese fallback string so the workflow keeps moving. Structured
//! helpers parse defensively (`parse.rs`) and return typed defaults. Persona
//! generation is the one helper whose provider-level failure is surfaced to
//! the handler, which turns it into a retry prompt for the user.

use service_builder_llm::{LlmError, LlmRequestOptions, LlmResult, Message};
use tracing::{debug, warn};

use crate::utils::error::AppResult;

use super::parse::{coerce_field_to_string, extract_json_object, string_array_field};
use super::types::{
    EvaluationResult, ExternalEnvironmentAnalysis, FeasibilityAssessment, Interview,
    LegalAssessment, Persona, ProfitabilityAssessment,
};
use super::workflow::AgentWorkflow;

impl AgentWorkflow {
    /// Send one completion request with timeout and bounded retry.
    ///
    /// Only transient failures (network, 5xx, rate limit) are retried; the
    /// exhausted-retry error is returned to the caller, which degrades the
    /// same way it would for a single-attempt failure.
    pub(crate) async fn complete(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: Option<u32>,
        json_mode: bool,
    ) -> LlmResult<String> {
        let options = LlmRequestOptions {
            temperature_override: Some(temperature),
            max_tokens_override: max_tokens,
            json_mode,
        };

        let mut attempt: u32 = 0;
        loop {
            let call = self.provider.send_message(
                vec![Message::user(user.clone())],
                Some(system.to_string()),
                options.clone(),
            );

            let result = match tokio::time::timeout(self.config.request_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::NetworkError {
                    message: format!(
                        "request timed out after {}s",
                        self.config.request_timeout.as_secs()
                    ),
                }),
            };

            match result {
                Ok(response) => {
                    return Ok(response.content.unwrap_or_default().trim().to_string());
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(error = %e, attempt, "LLM call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Synthesize the one-paragraph project summary from the seed answers
    /// and the full interview log.
    pub(crate) async fn generate_request_summary(
        &self,
        problem: &str,
        persona: &str,
        solution: &str,
        interview_log: &str,
    ) -> String {
        let system = "あなたは優秀なプロジェクトマネージャーです。初期入力と質疑応答ログを読み解き、開発チームが参照するためのプロジェクトサマリーを1段落で簡潔に作成してください。出力は必ず日本語のみで記述すること。";
        let user = format!(
            "## 元情報\n\
             - **課題:** {problem}\n\
             - **ターゲットペルソナ:** {persona}\n\
             - **解決策:** {solution}\n\n\
             ## ヒアリングログ\n\
             {interview_log}\n\n\
             ## プロジェクトサマリー:"
        );

        free_text_or(
            self.complete(system, user, 0.7, None, false).await,
            "エラーが発生しました。",
        )
    }

    /// Generate the fixed batch of yes/no-style alignment questions from the
    /// three seed answers. Returns at most the configured question count;
    /// empty on failure (the caller skips the phase).
    pub(crate) async fn generate_detailed_questions(
        &self,
        problem: &str,
        persona: &str,
        solution: &str,
    ) -> Vec<String> {
        let system = "あなたは初期入力（課題・ペルソナ・解決策）の解釈と後続アウトプットの齟齬を最小化するための『方向性アライメント質問票』を作る専門家です。特定の業界・媒体・UI・プロダクト名に依存しない汎用の質問にすること。入力（課題/ペルソナ/解決策）に含まれる用語から曖昧または広範な語を抽出し一般化して定義づけを求める。回答は短時間で可能なよう選択中心＋最小限の自由記入、必要なら『わからない』を用意する。出力は必ず日本語のみで記述すること。";
        let user = format!(
            "【前提（ユーザーの初期入力）】\n\
             - 課題: {problem}\n\
             - ペルソナ: {persona}\n\
             - 解決策の仮説: {solution}\n\n\
             以下の9つの質問を生成してください。それぞれ簡潔で明確な質問にし、「はい/いいえ/わからない」で回答できるような形式にしてください：\n\n\
             1. AIの理解確認に関する質問（理解が正しいか）\n\
             2. 主要ゴールに関する質問（価値検証/獲得/効率化/満足度/収益のうちどれが最重要か）\n\
             3. スコープInに関する質問（何を含めるか）\n\
             4. スコープOutに関する質問（何を含めないか）\n\
             5. 優先順位に関する質問（品質 vs 速度）\n\
             6. 完成の定義に関する質問（どうなれば完成か）\n\
             7. 制約に関する質問（必須条件や禁止事項）\n\
             8. 入出力に関する質問（何を入力して何を出力するか）\n\
             9. リスクに関する質問（懸念点や注意すべき点）\n\n\
             各質問を1行で、番号なしで出力してください。"
        );

        match self.complete(system, user, 0.7, None, false).await {
            Ok(text) => {
                let questions: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .take(self.config.detailed_question_count)
                    .collect();
                debug!(count = questions.len(), "generated detailed questions");
                questions
            }
            Err(e) => {
                warn!(error = %e, "detailed question generation failed");
                Vec::new()
            }
        }
    }

    /// Generate candidate personas from the project summary.
    ///
    /// Provider-level failure is returned as an error (the handler offers a
    /// retry); unparseable output yields an empty list.
    pub(crate) async fn generate_personas(&self, user_request: &str) -> AppResult<Vec<Persona>> {
        let count = self.config.persona_count;
        let system = format!(
            "あなたはユーザーインタビュー用のペルソナ生成の専門家です。プロジェクトサマリーに基づき、適合する候補ペルソナを{count}名作成してください。人物属性の重複は避けること。出力は必ず日本語のみで記述し、日本名を用いること。JSONフォーマットで返してください。"
        );
        let user = format!(
            "プロジェクトサマリー: {user_request}\n\n\
             以下のフォーマットで{count}名のペルソナを返してください：\n\
             {{\n\
             \x20 \"personas\": [\n\
             \x20   {{\n\
             \x20     \"name\": \"田中太郎\",\n\
             \x20     \"background\": \"30代前半のエンジニア。副業でアプリ開発を行っている。\"\n\
             \x20   }}\n\
             \x20 ]\n\
             }}"
        );

        let text = self.complete(&system, user, 0.8, None, true).await?;

        let parsed = extract_json_object(&text)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok());
        let personas = match parsed {
            Some(value) => value
                .get("personas")
                .cloned()
                .and_then(|p| serde_json::from_value::<Vec<Persona>>(p).ok())
                .unwrap_or_default(),
            None => {
                warn!("persona generation returned unparseable output");
                Vec::new()
            }
        };

        Ok(personas.into_iter().take(count).collect())
    }

    /// Run the full simulated research pass: for every persona, generate
    /// interview questions, then answer each one in that persona's voice.
    /// Strictly sequential; the resulting order is deterministic.
    pub(crate) async fn conduct_interviews(
        &self,
        user_request: &str,
        personas: &[Persona],
    ) -> Vec<Interview> {
        let mut interviews = Vec::new();

        for persona in personas {
            let questions = self.generate_interview_questions(user_request, persona).await;
            for question in questions {
                let answer = self.generate_interview_answer(persona, &question).await;
                interviews.push(Interview {
                    persona: persona.clone(),
                    question,
                    answer,
                });
            }
        }

        interviews
    }

    /// Generate the per-persona interview questions.
    pub(crate) async fn generate_interview_questions(
        &self,
        user_request: &str,
        persona: &Persona,
    ) -> Vec<String> {
        let per_persona = self.config.questions_per_persona;
        let system = format!(
            "あなたはUXリサーチの質問設計の専門家です。各ペルソナの文脈から、真意を引き出す具体的な質問を{per_persona}つ作成してください。回答に時間がかからない粒度、かつ合意形成に役立つものに限定。出力は必ず日本語のみで記述すること。"
        );
        let user = format!(
            "プロジェクトサマリー: {user_request}\n\n\
             対象ペルソナ: {} - {}\n\n\
             箇条書き{per_persona}問で返してください。",
            persona.name, persona.background
        );

        match self.complete(&system, user, 0.7, None, false).await {
            Ok(text) => split_bullet_lines(&text)
                .into_iter()
                .take(per_persona)
                .collect(),
            Err(e) => {
                warn!(persona = %persona.name, error = %e, "interview question generation failed");
                Vec::new()
            }
        }
    }

    /// Answer one interview question in the persona's first-person voice.
    pub(crate) async fn generate_interview_answer(
        &self,
        persona: &Persona,
        question: &str,
    ) -> String {
        let system = "あなたは以下のペルソナとして回答します。一人称で自然な日本語、2〜3文、具体例を交えること。出力は必ず日本語のみで記述すること。";
        let user = format!(
            "ペルソナ: {} - {}\n質問: {}\n回答:",
            persona.name, persona.background, question
        );

        free_text_or(
            self.complete(system, user, 0.8, None, false).await,
            "回答できませんでした。",
        )
    }

    /// Score whether the accumulated interviews suffice to write the
    /// requirements document.
    pub(crate) async fn evaluate_information(
        &self,
        user_request: &str,
        interviews: &[Interview],
    ) -> EvaluationResult {
        let system = "あなたは包括的な要件文書を作成するための情報の十分性を評価する専門家です。不足がある場合は、何が足りないかと、それを埋めるための追加入力質問を具体的かつ実行可能な形で作成してください。ただし個人開発前提につき、軽微な不足はAIの仮設定で補完可能と判断し、致命的不足のみを不十分とする。出力は必ず日本語のみで記述すること。JSONフォーマットで返してください。";
        let user = format!(
            "プロジェクトサマリー: {user_request}\n\n\
             インタビュー結果:\n{}\n\
             以下のフォーマットで評価結果を返してください：\n\
             {{\n\
             \x20 \"reason\": \"判断理由\",\n\
             \x20 \"is_sufficient\": true/false,\n\
             \x20 \"gaps\": [\"不足項目1\", \"不足項目2\"],\n\
             \x20 \"followup_questions\": [\"追加質問1\", \"追加質問2\"]\n\
             }}",
            interviews_block(interviews)
        );

        let failed = EvaluationResult {
            reason: "評価に失敗しました".to_string(),
            is_sufficient: false,
            gaps: Vec::new(),
            followup_questions: Vec::new(),
        };

        let text = match self.complete(system, user, 0.3, None, true).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "information evaluation failed");
                return failed;
            }
        };

        match extract_json_object(&text)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
        {
            Some(value) => EvaluationResult {
                reason: coerce_field_to_string(&value, "reason"),
                is_sufficient: value
                    .get("is_sufficient")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
                gaps: string_array_field(&value, "gaps"),
                followup_questions: string_array_field(&value, "followup_questions"),
            },
            None => failed,
        }
    }

    /// Rephrase free-text follow-up questions into yes/no form. Falls back
    /// to the original questions when the conversion yields nothing.
    pub(crate) async fn convert_to_yes_no_questions(&self, questions: &[String]) -> Vec<String> {
        let system = "あなたは質問設計の専門家です。与えられた自由記述のフォローアップ質問群を、ユーザーが「はい／いいえ」で答えられる形式に短文化してください。各質問は1文・日本語・肯定がデフォルト仮説になるように書き換える。";
        let user = format!(
            "自由記述の質問群:\n{}\n\n変換後: 箇条書きで出力。",
            questions
                .iter()
                .map(|q| format!("- {}", q))
                .collect::<Vec<_>>()
                .join("\n")
        );

        match self.complete(system, user, 0.3, None, false).await {
            Ok(text) => {
                let converted = split_bullet_lines(&text);
                if converted.is_empty() {
                    questions.to_vec()
                } else {
                    converted
                }
            }
            Err(e) => {
                warn!(error = %e, "yes/no conversion failed, keeping original questions");
                questions.to_vec()
            }
        }
    }

    /// Backfill remaining information gaps with reasonable default
    /// assumptions instead of asking the user again.
    pub(crate) async fn generate_assumption_backfill(
        &self,
        user_request: &str,
        interviews: &[Interview],
        gaps: &[String],
    ) -> String {
        let system = "あなたは個人開発のPMです。以下のプロジェクトサマリー/インタビュー/不足項目に基づき、不足を合理的な仮設定で自動補完します。各補完は「決定値（1行）／根拠（1行）／再確認方法（1行）」で短く。日本語で、保守的かつ実装可能な現実解を優先。";
        let user = format!(
            "## プロジェクトサマリー\n{user_request}\n\n\
             ## インタビューメモ\n{}\n\n\
             ## 不足項目\n{}\n\n\
             ## 出力\n\
             - 項目名: 決定値 / 根拠 / 再確認方法（各1行）を箇条書きで。",
            interviews
                .iter()
                .map(|i| format!("- {}: {}", i.persona.name, i.answer))
                .collect::<Vec<_>>()
                .join("\n"),
            gaps.iter()
                .map(|g| format!("- {}", g))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        free_text_or(
            self.complete(system, user, 0.5, None, false).await,
            "自動補完に失敗しました。",
        )
    }

    /// Generate the integrated requirements document (Lean BRD + Tech Spec)
    /// on the fixed 18-subsection outline.
    pub(crate) async fn generate_professional_requirements(
        &self,
        user_request: &str,
        interviews: &[Interview],
    ) -> String {
        let system = "あなたは、個人開発者が単独で着手・運用できるレベルの統合要件定義書（Lean＋Tech）を作成する、経験豊富なプロダクトマネージャー兼システムアナリストです。ビジネス側（Lean BRD）と開発側（Tech Spec）を1つのドキュメントに統合し、空欄を作らず仮説で埋め、実行手順に落とせる粒度で日本語のみで記述してください。";
        let user = format!(
            "プロジェクトサマリー: {user_request}\n\n\
             インタビュー詳細:\n{}\n\
             以下のフォーマットで統合要件定義書を作成してください：\n\n\
             # 📝 統合要件定義書（個人開発向け：Lean＋Tech）\n\n\
             ## A. ビジネス（Lean BRD）\n\
             ### A-1. プロジェクトカード\n\
             ### A-2. 課題と解く理由（Top3）\n\
             ### A-3. 主要ユーザーとジョブ\n\
             ### A-4. 価値提案と差別化\n\
             ### A-5. 収益モデルと価格（試算付き）\n\
             ### A-6. 獲得チャネルと最初の10人\n\
             ### A-7. 成功指標（North Star & KPI）\n\
             ### A-8. スコープと優先順位（MVP前提）\n\
             ### A-9. リスク・前提・法務\n\
             ### A-10. コスト見積とランレート（概算）\n\n\
             ## B. 開発（Tech Spec）\n\
             ### B-1. MVPユーザーストーリー（3〜5件）\n\
             ### B-2. 画面と主要フロー\n\
             ### B-3. データモデル（簡易ER）\n\
             ### B-4. API / 外部連携\n\
             ### B-5. 非機能要件（個人開発現実解）\n\
             ### B-6. 運用・サポート\n\
             ### B-7. 開発ロードマップ（12週目安）\n\
             ### B-8. 用語集（曖昧語の定義）",
            interviews_block(interviews)
        );

        free_text_or(
            self.complete(system, user, 0.5, Some(4000), false).await,
            "要件定義書の生成に失敗しました。",
        )
    }

    /// Produce the five-section external-environment analysis. Never fails:
    /// provider errors and unparseable output both degrade to a report whose
    /// fields carry a literal error description.
    pub(crate) async fn analyze_external_environment(
        &self,
        requirements: &str,
    ) -> ExternalEnvironmentAnalysis {
        let system = "あなたは外資系戦略コンサルのシニア。個人開発の実行可否判断に足る精度で外部環境を分析する。3C/PESTに加え、JTBD・市場規模推定・ポーターの5フォース・規制/規約マップ・GTM・ユニットエコノミクス・技術実現性・差別化/モート・主要リスク＆対策・シナリオを含め、不足情報は明示的な仮定で補完し、数値はレンジと算出式を示す。出力は日本語、Markdownで簡潔に。JSONフォーマットで返してください。";
        let user = format!(
            "統合要件定義書: {requirements}\n\n\
             以下のフォーマットで外部環境分析を返してください：\n\
             {{\n\
             \x20 \"customer_analysis\": \"市場・顧客分析の内容\",\n\
             \x20 \"competitor_analysis\": \"競合分析の内容\",\n\
             \x20 \"company_analysis\": \"自社分析の内容\",\n\
             \x20 \"pest_analysis\": \"PEST分析の内容\",\n\
             \x20 \"summary_and_strategy\": \"要約と戦略的提言の内容\"\n\
             }}"
        );

        let text = match self.complete(system, user, 0.3, Some(3000), true).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "environment analysis call failed");
                return ExternalEnvironmentAnalysis::degraded(
                    "分析に失敗しました（API呼び出しエラー）",
                );
            }
        };

        match extract_json_object(&text)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
        {
            Some(value) => ExternalEnvironmentAnalysis {
                customer_analysis: coerce_field_to_string(&value, "customer_analysis"),
                competitor_analysis: coerce_field_to_string(&value, "competitor_analysis"),
                company_analysis: coerce_field_to_string(&value, "company_analysis"),
                pest_analysis: coerce_field_to_string(&value, "pest_analysis"),
                summary_and_strategy: coerce_field_to_string(&value, "summary_and_strategy"),
            },
            None => {
                warn!("environment analysis returned unparseable output");
                ExternalEnvironmentAnalysis::degraded("分析に失敗しました（JSON解析エラー）")
            }
        }
    }

    /// Judge whether the plan can plausibly turn a sustained profit.
    pub(crate) async fn assess_profitability(
        &self,
        requirements: &str,
        analysis: &ExternalEnvironmentAnalysis,
    ) -> ProfitabilityAssessment {
        let system = "あなたは収益性の監査官。与えられた要件定義書と外部環境分析から、個人開発が継続的に黒字化できる見込みがあるかを判定する。価格戦略、ARPU、CAC、粗利、回収期間、チャーン、チャネルの現実性を短く吟味。出力は必ず日本語のみで記述すること。JSONフォーマットで返してください。";
        let user = format!(
            "要件定義書: {requirements}\n\n\
             外部環境分析:\n{}\n\n\
             以下のフォーマットで収益性判定を返してください：\n\
             {{\n\
             \x20 \"is_profitable\": true/false,\n\
             \x20 \"reason\": \"判定理由\"\n\
             }}",
            analysis_block(analysis)
        );

        let (verdict, reason) = self.assess(system, user, "is_profitable").await;
        ProfitabilityAssessment {
            is_profitable: verdict,
            reason,
        }
    }

    /// Judge whether one developer can realistically build and operate this.
    pub(crate) async fn assess_feasibility(
        &self,
        requirements: &str,
        analysis: &ExternalEnvironmentAnalysis,
    ) -> FeasibilityAssessment {
        let system = "あなたは実現可能性の監査官。与えられた要件定義書と外部環境分析から、個人が負債なく現実的な工数・コスト・技術難易度で実装・運用できるかを判定する。MVPの範囲、スキル前提、推論コスト/遅延、運用負荷、依存外部APIの制約などを簡潔に評価。出力は必ず日本語のみで記述すること。JSONフォーマットで返してください。";
        let user = format!(
            "要件定義書: {requirements}\n\n\
             外部環境分析:\n{}\n\n\
             以下のフォーマットで実現性判定を返してください：\n\
             {{\n\
             \x20 \"is_feasible\": true/false,\n\
             \x20 \"reason\": \"判定理由\"\n\
             }}",
            analysis_block(analysis)
        );

        let (verdict, reason) = self.assess(system, user, "is_feasible").await;
        FeasibilityAssessment {
            is_feasible: verdict,
            reason,
        }
    }

    /// Judge legal and platform-policy compliance.
    pub(crate) async fn assess_legal(
        &self,
        requirements: &str,
        analysis: &ExternalEnvironmentAnalysis,
    ) -> LegalAssessment {
        let system = "あなたは法務・コンプライアンス監査官。与えられた要件定義書と外部環境分析から、著作権・商標・プラットフォーム規約・個人情報/プライバシー・表示義務・年齢制限などの観点でプロダクトが適合しているかを判定する。重大違反の恐れがあればFalse。出力は必ず日本語のみで記述すること。JSONフォーマットで返してください。";
        let user = format!(
            "要件定義書: {requirements}\n\n\
             外部環境分析:\n{}\n\n\
             以下のフォーマットで法務判定を返してください：\n\
             {{\n\
             \x20 \"is_compliant\": true/false,\n\
             \x20 \"reason\": \"判定理由\"\n\
             }}",
            analysis_block(analysis)
        );

        let (verdict, reason) = self.assess(system, user, "is_compliant").await;
        LegalAssessment {
            is_compliant: verdict,
            reason,
        }
    }

    /// Shared body of the three gate assessments: one JSON call, one boolean
    /// field, degraded to the negative verdict on any failure.
    async fn assess(&self, system: &str, user: String, verdict_field: &str) -> (bool, String) {
        let failed = (false, "判定に失敗しました".to_string());

        let text = match self.complete(system, user, 0.3, None, true).await {
            Ok(text) => text,
            Err(e) => {
                warn!(field = verdict_field, error = %e, "assessment call failed");
                return failed;
            }
        };

        match extract_json_object(&text)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
        {
            Some(value) => {
                let verdict = value
                    .get(verdict_field)
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                let reason = {
                    let r = coerce_field_to_string(&value, "reason");
                    if r.is_empty() {
                        "判定に失敗しました".to_string()
                    } else {
                        r
                    }
                };
                (verdict, reason)
            }
            None => failed,
        }
    }

    /// Revise the requirements document given the gate failures.
    pub(crate) async fn improve_requirements_doc(
        &self,
        requirements: &str,
        analysis: &ExternalEnvironmentAnalysis,
        bad_reasons: &[String],
    ) -> String {
        let system = "あなたはシニアPMです。以下の材料（要件定義書、外部環境、評価のNG理由）を受け、個人開発で現実的に勝てる形へ要件定義書を改訂します。改訂方針：MVPの絞り込み・差別化の明確化・収益性の改善・実現性の向上・法務の適合のいずれか。元の良さは保持しつつ、危険な仮定は明確に変更。出力は必ず日本語のみで記述すること。Markdownで完結な改訂版を返してください。";
        let user = format!(
            "## 旧 要件定義書\n{requirements}\n\n\
             ## 外部環境の要点\n{}\n\n\
             ## 評価NG理由\n{}\n\n\
             ## 出力: 改訂版の要件定義書（Markdown）",
            analysis_block(analysis),
            bad_reasons.join("\n"),
        );

        free_text_or(
            self.complete(system, user, 0.5, Some(4000), false).await,
            "改訂に失敗しました。",
        )
    }

    /// Re-derive the one-paragraph summary from a (revised) requirements doc.
    pub(crate) async fn generate_summary_from_requirements(&self, requirements: &str) -> String {
        let system = "あなたは編集者です。与えられた要件定義書から、開発チーム向けに1段落の要約を作成します。トーンは中立・簡潔。固有名の羅列を避け、目的・主要なユーザー価値・MVPスコープを明示する。出力は必ず日本語のみで記述すること。";
        let user = format!("要件定義書（抜粋可）:\n{requirements}\n\n---\n1段落サマリー:");

        free_text_or(
            self.complete(system, user, 0.3, None, false).await,
            "サマリー生成に失敗しました。",
        )
    }

    /// Generate the final pitch document on the fixed template.
    pub(crate) async fn generate_pitch(
        &self,
        user_request: &str,
        interviews: &[Interview],
    ) -> String {
        let system = "あなたは、提示された情報を基に、大学生向けの魅力的なプロジェクト企画書（ピッチ資料）を作成する学生起業家です。専門用語を避け、読者が共感しワクワクする文章を作成してください。出力は必ず日本語のみで記述すること。";
        let user = format!(
            "プロジェクトサマリー: {user_request}\n\n\
             インタビュー詳細:\n{}\n\
             以下のフォーマットで魅力的なプロジェクト企画書を作成してください：\n\n\
             # 🚀 プロジェクト企画書: [ここにキャッチーなアプリ名を考案]\n\n\
             ## 😵「こんなことで困ってない？」 - 解決したい課題\n\
             > [学生向けの言葉で課題を表現]\n\n\
             ## ✨「こうなったら最高じゃない？」 - 僕たちの解決策\n\
             > [ベネフィットを感情的に描写]\n\n\
             ## 🎯 ターゲットユーザー\n\
             - **こんな人にピッタリ:** [一行で表現]\n\n\
             ## 🛠️ このアプリでできること (主要機能)\n\
             - **[主要機能1]:** [説明]\n\
             - **[主要機能2]:** [説明]\n\
             - **[主要機能3]:** [説明]\n\n\
             ## 💰 ビジネス的な話（ちょっとだけ）\n\
             - [マネタイズの方針]\n\n\
             ## 🤝 一緒に作りませんか？\n\
             - [参加や応援の呼びかけ]",
            interviews
                .iter()
                .map(|i| format!("ペルソナ「{}」の意見: {}\n", i.persona.name, i.answer))
                .collect::<String>(),
        );

        free_text_or(
            self.complete(system, user, 0.7, Some(2000), false).await,
            "ピッチ生成に失敗しました。",
        )
    }
}

/// Resolve a free-text completion to its content or the given fallback.
fn free_text_or(result: LlmResult<String>, fallback: &str) -> String {
    match result {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => {
            warn!("LLM returned empty content, using fallback text");
            fallback.to_string()
        }
        Err(e) => {
            warn!(error = %e, "LLM call failed, using fallback text");
            fallback.to_string()
        }
    }
}

/// Split a bulleted response into trimmed, non-empty lines.
fn split_bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_start_matches(['-', '•']).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render interviews in the block form the prompts consume.
fn interviews_block(interviews: &[Interview]) -> String {
    interviews
        .iter()
        .map(|i| {
            format!(
                "ペルソナ: {}\n質問: {}\n回答: {}\n",
                i.persona.name, i.question, i.answer
            )
        })
        .collect()
}

/// Render the analysis report in the bullet form the prompts consume.
fn analysis_block(analysis: &ExternalEnvironmentAnalysis) -> String {
    format!(
        "- 顧客: {}\n- 競合: {}\n- 自社: {}\n- PEST: {}\n- 要約: {}",
        analysis.customer_analysis,
        analysis.competitor_analysis,
        analysis.company_analysis,
        analysis.pest_analysis,
        analysis.summary_and_strategy,
    )
}

#[cfg(test)]
mod tests {
    use super::super::testing::MockLlmProvider;
    use super::super::workflow::{AgentWorkflow, WorkflowConfig};
    use super::*;
    use service_builder_llm::LlmError;
    use std::sync::Arc;

    fn workflow_with(mock: MockLlmProvider) -> AgentWorkflow {
        AgentWorkflow::new(Arc::new(mock), WorkflowConfig::default())
    }

    fn sample_analysis() -> ExternalEnvironmentAnalysis {
        ExternalEnvironmentAnalysis {
            customer_analysis: "顧客".to_string(),
            competitor_analysis: "競合".to_string(),
            company_analysis: "自社".to_string(),
            pest_analysis: "PEST".to_string(),
            summary_and_strategy: "戦略".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generate_personas_parses_fenced_json() {
        let mock = MockLlmProvider::with_text(
            "```json\n{\"personas\": [\n  {\"name\": \"田中太郎\", \"background\": \"エンジニア\"},\n  {\"name\": \"佐藤花子\", \"background\": \"学生\"}\n]}\n```",
        );
        let workflow = workflow_with(mock);

        let personas = workflow.generate_personas("配信アプリ").await.unwrap();
        assert_eq!(personas.len(), 2);
        assert_eq!(personas[0].name, "田中太郎");
        assert_eq!(personas[1].background, "学生");
    }

    #[tokio::test]
    async fn test_generate_personas_unparseable_is_empty() {
        let workflow = workflow_with(MockLlmProvider::with_text("JSONを返せませんでした"));
        let personas = workflow.generate_personas("配信アプリ").await.unwrap();
        assert!(personas.is_empty());
    }

    #[tokio::test]
    async fn test_generate_personas_api_error_propagates() {
        let workflow = workflow_with(MockLlmProvider::with_responses(vec![Err(
            LlmError::InvalidRequest {
                message: "bad".to_string(),
            },
        )]));
        assert!(workflow.generate_personas("配信アプリ").await.is_err());
    }

    #[tokio::test]
    async fn test_generate_personas_caps_at_configured_count() {
        let many: Vec<String> = (0..8)
            .map(|i| format!("{{\"name\": \"人物{}\", \"background\": \"背景\"}}", i))
            .collect();
        let workflow = workflow_with(MockLlmProvider::with_text(&format!(
            "{{\"personas\": [{}]}}",
            many.join(",")
        )));

        let personas = workflow.generate_personas("サマリー").await.unwrap();
        assert_eq!(personas.len(), WorkflowConfig::default().persona_count);
    }

    #[tokio::test]
    async fn test_evaluate_information_defensive_defaults() {
        let workflow = workflow_with(MockLlmProvider::with_text("これはJSONではありません"));
        let result = workflow.evaluate_information("サマリー", &[]).await;
        assert!(!result.is_sufficient);
        assert_eq!(result.reason, "評価に失敗しました");
        assert!(result.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_information_parses_fields() {
        let workflow = workflow_with(MockLlmProvider::with_text(
            r#"{"reason": "十分", "is_sufficient": true, "gaps": [], "followup_questions": []}"#,
        ));
        let result = workflow.evaluate_information("サマリー", &[]).await;
        assert!(result.is_sufficient);
        assert_eq!(result.reason, "十分");
    }

    #[tokio::test]
    async fn test_analyze_environment_coerces_nested_objects() {
        let workflow = workflow_with(MockLlmProvider::with_text(
            r#"{"customer_analysis": {"市場規模": "10億円"}, "competitor_analysis": "競合は少ない", "company_analysis": null, "pest_analysis": "安定", "summary_and_strategy": "参入すべき"}"#,
        ));
        let analysis = workflow.analyze_external_environment("要件").await;
        assert!(analysis.customer_analysis.contains("市場規模"));
        assert_eq!(analysis.competitor_analysis, "競合は少ない");
        assert_eq!(analysis.company_analysis, "");
        assert_eq!(analysis.summary_and_strategy, "参入すべき");
    }

    #[tokio::test]
    async fn test_analyze_environment_degrades_on_parse_failure() {
        let workflow = workflow_with(MockLlmProvider::with_text("分析できません"));
        let analysis = workflow.analyze_external_environment("要件").await;
        assert_eq!(
            analysis.customer_analysis,
            "分析に失敗しました（JSON解析エラー）"
        );
    }

    #[tokio::test]
    async fn test_analyze_environment_degrades_on_api_error() {
        let workflow = workflow_with(MockLlmProvider::with_responses(vec![Err(
            LlmError::InvalidRequest {
                message: "bad".to_string(),
            },
        )]));
        let analysis = workflow.analyze_external_environment("要件").await;
        assert_eq!(
            analysis.pest_analysis,
            "分析に失敗しました（API呼び出しエラー）"
        );
    }

    #[tokio::test]
    async fn test_assessments_default_to_negative_verdict() {
        let workflow = workflow_with(MockLlmProvider::with_repeating_text("ダメな出力"));
        let analysis = sample_analysis();

        let profit = workflow.assess_profitability("要件", &analysis).await;
        assert!(!profit.is_profitable);
        assert_eq!(profit.reason, "判定に失敗しました");

        let feasibility = workflow.assess_feasibility("要件", &analysis).await;
        assert!(!feasibility.is_feasible);

        let legal = workflow.assess_legal("要件", &analysis).await;
        assert!(!legal.is_compliant);
    }

    #[tokio::test]
    async fn test_assessment_parses_positive_verdict() {
        let workflow = workflow_with(MockLlmProvider::with_text(
            r#"{"is_profitable": true, "reason": "ニッチだが高単価"}"#,
        ));
        let profit = workflow.assess_profitability("要件", &sample_analysis()).await;
        assert!(profit.is_profitable);
        assert_eq!(profit.reason, "ニッチだが高単価");
    }

    #[tokio::test]
    async fn test_interview_questions_strip_bullets() {
        let workflow = workflow_with(MockLlmProvider::with_text(
            "- 質問その1\n• 質問その2\n\n- 質問その3\n- 質問その4",
        ));
        let persona = Persona {
            name: "田中太郎".to_string(),
            background: "エンジニア".to_string(),
        };
        let questions = workflow.generate_interview_questions("サマリー", &persona).await;
        assert_eq!(
            questions,
            vec!["質問その1", "質問その2", "質問その3"]
        );
    }

    #[tokio::test]
    async fn test_conduct_interviews_sequential_order() {
        // One question call per persona, then one answer call per question.
        let workflow = workflow_with(MockLlmProvider::with_responses_text(vec![
            "- 質問A1", "回答A1", "- 質問B1", "回答B1",
        ]));
        let personas = vec![
            Persona {
                name: "A".to_string(),
                background: "a".to_string(),
            },
            Persona {
                name: "B".to_string(),
                background: "b".to_string(),
            },
        ];

        let interviews = workflow.conduct_interviews("サマリー", &personas).await;
        assert_eq!(interviews.len(), 2);
        assert_eq!(interviews[0].persona.name, "A");
        assert_eq!(interviews[0].answer, "回答A1");
        assert_eq!(interviews[1].persona.name, "B");
        assert_eq!(interviews[1].question, "質問B1");
    }

    #[tokio::test]
    async fn test_convert_to_yes_no_falls_back_to_originals() {
        let workflow = workflow_with(MockLlmProvider::with_responses(vec![Err(
            LlmError::InvalidRequest {
                message: "bad".to_string(),
            },
        )]));
        let questions = vec!["価格はいくらが妥当ですか？".to_string()];
        let converted = workflow.convert_to_yes_no_questions(&questions).await;
        assert_eq!(converted, questions);
    }

    #[tokio::test]
    async fn test_free_text_fallback_on_empty_response() {
        let workflow = workflow_with(MockLlmProvider::with_text(""));
        let summary = workflow
            .generate_request_summary("課題", "ペルソナ", "解決策", "ログ")
            .await;
        assert_eq!(summary, "エラーが発生しました。");
    }

    #[tokio::test]
    async fn test_detailed_questions_capped_at_nine() {
        let lines: Vec<String> = (1..=12).map(|i| format!("質問{}", i)).collect();
        let workflow = workflow_with(MockLlmProvider::with_text(&lines.join("\n")));
        let questions = workflow
            .generate_detailed_questions("課題", "ペルソナ", "解決策")
            .await;
        assert_eq!(questions.len(), 9);
        assert_eq!(questions[0], "質問1");
    }

    #[tokio::test]
    async fn test_non_retryable_error_not_retried() {
        let mock = Arc::new(MockLlmProvider::with_responses(vec![Err(
            LlmError::InvalidRequest {
                message: "bad".to_string(),
            },
        )]));
        let workflow = AgentWorkflow::new(mock.clone(), WorkflowConfig::default());
        let result = workflow
            .complete("system", "user".to_string(), 0.5, None, false)
            .await;
        assert!(result.is_err());
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_split_bullet_lines() {
        assert_eq!(
            split_bullet_lines("- 一つ目\n\n• 二つ目\n三つ目"),
            vec!["一つ目", "二つ目", "三つ目"]
        );
        assert!(split_bullet_lines("\n\n").is_empty());
    }

    #[test]
    fn test_interviews_block_shape() {
        let interviews = vec![Interview {
            persona: Persona {
                name: "田中".to_string(),
                background: "bg".to_string(),
            },
            question: "Q".to_string(),
            answer: "A".to_string(),
        }];
        let block = interviews_block(&interviews);
        assert_eq!(block, "ペルソナ: 田中\n質問: Q\n回答: A\n");
    }
}
