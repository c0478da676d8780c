//! Ask command handler.
//!
//! Runs a research session for one question and prints the cited answer.

use clap::Args;
use prosearch_core::{config::AppConfig, AppResult};
use prosearch_knowledge::{create_provider, open_index, resolve_embedding};
use prosearch_llm::create_client;
use prosearch_prompt::PromptLibrary;
use prosearch_research::{
    ConversationStore, EventSink, JsonlConversationStore, Message, ModelCaller, ResearchAgent,
    ResearchConfig, ResearchEvent, ResearchOutcome, Retriever, VectorSource,
};
use prosearch_search::{create_search_client, SearchConfig};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Research a question and print a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to research
    pub question: String,

    /// Knowledge base to search alongside the web
    #[arg(short, long)]
    pub knowledge_base: Option<String>,

    /// Research effort (low, medium, high)
    #[arg(short, long)]
    pub effort: Option<String>,

    /// Queries generated for the first loop
    #[arg(long)]
    pub initial_queries: Option<usize>,

    /// Maximum research loops
    #[arg(long)]
    pub max_loops: Option<u32>,

    /// Disable relevance reranking
    #[arg(long)]
    pub no_rerank: bool,

    /// Reranking strategy (pure, hybrid)
    #[arg(long)]
    pub rerank_strategy: Option<String>,

    /// Relevance model (lexical, llm)
    #[arg(long)]
    pub rerank_model: Option<String>,

    /// Evidence items kept per loop after reranking
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Continue a stored conversation and append this turn to it
    #[arg(long)]
    pub conversation: Option<String>,

    /// Print research progress to stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let research_config = self.research_config(config)?;
        let retriever = self.retriever(config, &research_config)?;

        let client = create_client(
            &config.provider,
            config.resolve_endpoint(&config.provider).as_deref(),
            config.resolve_api_key(&config.provider).as_deref(),
        )?;
        let prompts = Arc::new(PromptLibrary::for_workspace(&config.workspace)?);
        let caller = ModelCaller::new(client, prompts, research_config.model.clone());
        let agent = ResearchAgent::with_llm(research_config, caller, retriever)?;

        let store = JsonlConversationStore::new(&config.workspace);
        let mut conversation = match &self.conversation {
            Some(id) => store.load(id)?,
            None => Vec::new(),
        };
        conversation.push(Message::user(self.question.trim()));

        let events = if self.progress {
            EventSink::new(Arc::new(|event: &ResearchEvent| eprintln!("{}", event.describe())))
        } else {
            EventSink::noop()
        };

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
        let outcome = agent.run(conversation, &cancel, &events).await;
        watcher.abort();
        let outcome = outcome?;

        if self.json {
            print_json(&outcome)?;
        } else {
            print_text(&outcome);
        }

        if let Some(ref id) = self.conversation {
            record_turn(&store, id, self.question.trim(), &outcome);
        }
        Ok(())
    }

    /// Layer CLI flags over the `research` section of config.yaml.
    fn research_config(&self, config: &AppConfig) -> AppResult<ResearchConfig> {
        let mut settings = config.research.clone();

        // A tier on the command line replaces counts from the config file
        if let Some(ref effort) = self.effort {
            settings.effort = Some(effort.clone());
            settings.initial_query_count = None;
            settings.max_loops = None;
        }
        if let Some(n) = self.initial_queries {
            settings.initial_query_count = Some(n);
        }
        if let Some(n) = self.max_loops {
            settings.max_loops = Some(n);
        }
        if self.no_rerank {
            settings.reranking_enabled = Some(false);
        }
        if let Some(ref strategy) = self.rerank_strategy {
            settings.reranking_strategy = Some(strategy.clone());
        }
        if let Some(ref model) = self.rerank_model {
            settings.reranking_model = Some(model.clone());
        }
        if let Some(k) = self.top_k {
            settings.reranking_top_k = Some(k);
        }

        let research_config = ResearchConfig::from_settings(&settings, config.model.clone())?;
        research_config.validate()?;
        Ok(research_config)
    }

    fn retriever(&self, config: &AppConfig, research: &ResearchConfig) -> AppResult<Retriever> {
        let web = create_search_client(&SearchConfig::from(&config.search))?;
        let mut retriever =
            Retriever::new(research.vector_top_k, research.vector_score_threshold).with_web(web);

        let base = self
            .knowledge_base
            .clone()
            .or_else(|| config.knowledge.default_base.clone());

        if let Some(base) = base {
            tracing::info!("Searching knowledge base '{}' alongside the web", base);
            let embedding = resolve_embedding(&config.workspace, &base, &config.knowledge)?;
            let embedder = create_provider(&embedding)?;
            let index = open_index(&config.workspace, &base, &config.knowledge, false)?;
            retriever = retriever.with_vector(VectorSource { index, embedder });
        }

        Ok(retriever)
    }
}

/// Exit status after a second interrupt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if watch_interrupts(tokio::signal::ctrl_c, &cancel).await {
        eprintln!("Interrupted again; exiting without an answer.");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
}

/// First interrupt cancels research so the answer is written from what was
/// gathered; returns true once a second interrupt arrives.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: &CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        return false;
    }
    eprintln!("Stopping research; answering from the evidence gathered so far...");
    eprintln!("Press Ctrl-C again to exit immediately.");
    cancel.cancel();

    next_interrupt().await.is_ok()
}

/// Append the finished turn to its conversation. The answer has already
/// been printed, so a storage failure is only reported.
fn record_turn(
    store: &dyn ConversationStore,
    id: &str,
    question: &str,
    outcome: &ResearchOutcome,
) -> bool {
    match store.append_turn(id, question, outcome) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(conversation = id, "Failed to save turn to conversation: {}", e);
            eprintln!("Warning: this answer was not saved to conversation '{}': {}", id, e);
            false
        }
    }
}

fn print_text(outcome: &ResearchOutcome) {
    println!("{}", outcome.answer);

    if !outcome.citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in &outcome.citations {
            println!(
                "{} {} ({})",
                citation.citation_ref, citation.source_label, citation.source_id
            );
        }
    }

    tracing::debug!(
        termination = outcome.termination.as_str(),
        loops = outcome.loop_count,
        evidence = outcome.evidence.len(),
        "Research outcome"
    );
}

fn print_json(outcome: &ResearchOutcome) -> AppResult<()> {
    let output = serde_json::json!({
        "sessionId": outcome.session_id,
        "answer": outcome.answer,
        "citations": outcome.citations,
        "termination": outcome.termination,
        "loopCount": outcome.loop_count,
        "queries": outcome.queries,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
