//! Service Builder CLI
//!
//! Interactive chat driver for the interview workflow. Plays the role of the
//! chat transport: renders questions and completed documents, collects
//! answers, auto-continues while the engine returns a next node, and
//! persists the session after every step so it can be resumed by id.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use service_builder::services::agent::{AgentResponse, AgentWorkflow, WorkflowConfig};
use service_builder::storage::{Database, SessionStore, WorkflowSession};
use service_builder::utils::paths;
use service_builder_llm::{LlmProvider, OpenAIProvider, ProviderConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
    let provider_config = ProviderConfig {
        api_key: Some(api_key),
        base_url: std::env::var("OPENAI_BASE_URL").ok(),
        model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
        ..Default::default()
    };
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAIProvider::new(provider_config));
    let workflow = AgentWorkflow::new(provider, WorkflowConfig::default());

    let db = Database::open_at(paths::database_path()?)?;
    let store = SessionStore::new(db.pool());

    // Resume an existing session by id, or start a new one.
    let mut session = match std::env::args().nth(1) {
        Some(id) => store
            .get(&id)?
            .with_context(|| format!("session {} not found", id))?,
        None => {
            let session = WorkflowSession::new("新しいサービス企画");
            store.create(&session)?;
            println!("セッション {} を開始します。", session.id);
            session
        }
    };

    let stdin = io::stdin();
    let mut pending_input: Option<String> = None;

    loop {
        let outcome = workflow
            .execute_node(session.current_node, &session.state, pending_input.as_deref())
            .await?;
        pending_input = None;
        session.state = outcome.next_state;

        match &outcome.response {
            AgentResponse::Question {
                content,
                choices,
                placeholder,
                ..
            } => {
                println!("\n{}", content);
                if let Some(choices) = choices {
                    for choice in choices {
                        println!("  - {}", choice.label);
                    }
                }
                if let Some(placeholder) = placeholder {
                    println!("  ({})", placeholder);
                }
            }
            AgentResponse::Completed { title, content, .. } => {
                if let Some(title) = title {
                    println!("\n=== {} ===", title);
                }
                println!("{}", content);
            }
            AgentResponse::Plan { .. } | AgentResponse::Streaming { .. } => {}
        }

        if let Some(next) = outcome.next_node {
            // Auto-continue with no user input.
            session.current_node = next;
            store.save_progress(&session.id, session.current_node, &session.state)?;
            continue;
        }

        store.save_progress(&session.id, session.current_node, &session.state)?;

        if !session.state.pitch_document.is_empty() {
            println!("\nワークフローが完了しました。");
            break;
        }

        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF: leave the session resumable at the current node.
            println!("\nセッション {} を保存しました。", session.id);
            break;
        }
        pending_input = Some(line.trim().to_string());
    }

    Ok(())
}
