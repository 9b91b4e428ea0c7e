//! Ask command handler.
//!
//! Runs one grounded conversation turn: distill, retrieve, answer, and
//! print the result with its citations and follow-up questions.

use clap::Args;
use futures::StreamExt;
use ragchat_chat::{
    run_with_streaming, run_without_streaming, ChatApproach, ChatEvent, ChatOverrides,
    TextChatApproach, VisionChatApproach,
};
use ragchat_core::{config::AppConfig, AppError, AppResult};
use ragchat_llm::{ChatMessage, EmbeddingsClient, OpenAiClient};
use ragchat_retrieval::{
    AuthClaims, HttpSearchBackend, NoImageStore, NoSecurityFilter, RetrievalMode, Retriever,
};
use std::sync::Arc;

/// Ask a question grounded on the document index
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Enable streaming (default: true)
    #[arg(long, default_value = "true")]
    pub stream: bool,

    /// Disable streaming
    #[arg(long, conflicts_with = "stream")]
    pub no_stream: bool,

    /// Use the vision-augmented approach
    #[arg(long)]
    pub vision: bool,

    /// Suggest follow-up questions
    #[arg(long)]
    pub followups: bool,

    /// Retrieval mode (text, vectors, hybrid)
    #[arg(long)]
    pub mode: Option<String>,

    /// Number of sources to retrieve
    #[arg(long)]
    pub top: Option<usize>,

    /// Category to exclude from retrieval
    #[arg(long)]
    pub exclude_category: Option<String>,

    /// Temperature for answer generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self
            .question
            .clone()
            .ok_or_else(|| AppError::Config("No question provided".to_string()))?;

        // Wire the collaborators from configuration
        let chat_client = Arc::new(
            OpenAiClient::new(&config.chat_endpoint, config.api_key.clone())
                .with_embedding_models(&config.embedding_model, None),
        );
        let embeddings: Arc<dyn EmbeddingsClient> = chat_client.clone();

        let search = Arc::new(HttpSearchBackend::new(
            &config.search_endpoint,
            &config.search_index,
            config.search_api_key.clone(),
        ));
        let retriever = Retriever::new(search, embeddings);

        let approach: Arc<dyn ChatApproach> = if self.vision {
            Arc::new(VisionChatApproach::new(
                chat_client,
                retriever,
                Arc::new(NoSecurityFilter),
                Arc::new(NoImageStore),
                &config.vision_model,
            ))
        } else {
            Arc::new(TextChatApproach::new(
                chat_client,
                retriever,
                Arc::new(NoSecurityFilter),
                &config.model,
            ))
        };

        let overrides = self.build_overrides(config);
        let history = vec![ChatMessage::user(question)];

        if self.is_streaming() {
            self.handle_streaming(approach, history, overrides).await
        } else {
            self.handle_non_streaming(approach.as_ref(), &history, &overrides)
                .await
        }
    }

    /// Merge config defaults and CLI flags into the request overrides.
    fn build_overrides(&self, config: &AppConfig) -> ChatOverrides {
        let mut overrides = ChatOverrides::new();

        overrides.retrieval_mode =
            RetrievalMode::parse(self.mode.as_deref().unwrap_or(&config.retrieval.mode));
        overrides.top = Some(self.top.unwrap_or(config.retrieval.top));
        overrides.semantic_ranker = config.retrieval.semantic_ranker;
        overrides.semantic_captions = config.retrieval.semantic_captions;
        overrides.suggest_followup_questions = self.followups;
        overrides.exclude_category = self.exclude_category.clone();
        overrides.temperature = self.temperature;

        overrides
    }

    /// Handle non-streaming output.
    async fn handle_non_streaming(
        &self,
        approach: &dyn ChatApproach,
        history: &[ChatMessage],
        overrides: &ChatOverrides,
    ) -> AppResult<()> {
        tracing::info!("Running conversation turn without streaming");

        let response =
            run_without_streaming(approach, history, overrides, &AuthClaims::new(), None).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&response)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        println!("{}", response.message.text_content().unwrap_or(""));

        print_sources(&response.context.data_points.text);
        if let Some(questions) = &response.context.followup_questions {
            print_followups(questions);
        }

        Ok(())
    }

    /// Handle streaming output.
    async fn handle_streaming(
        &self,
        approach: Arc<dyn ChatApproach>,
        history: Vec<ChatMessage>,
        overrides: ChatOverrides,
    ) -> AppResult<()> {
        tracing::info!("Running conversation turn with streaming");

        let mut stream =
            run_with_streaming(approach, history, overrides, AuthClaims::new(), None);

        let mut sources = Vec::new();
        let mut followups = Vec::new();

        while let Some(event) = stream.next().await {
            let event = event?;

            if self.json {
                // One JSON event per line
                let json = serde_json::to_string(&event)
                    .map_err(|e| AppError::Serialization(e.to_string()))?;
                println!("{}", json);
                continue;
            }

            match event {
                ChatEvent::Context { context, .. } => {
                    sources = context.data_points.text;
                }
                ChatEvent::Delta { content } => {
                    print!("{}", content);
                    use std::io::Write;
                    std::io::stdout().flush().ok();
                }
                ChatEvent::FollowupQuestions { questions } => {
                    followups = questions;
                }
            }
        }

        if !self.json {
            println!();
            print_sources(&sources);
            if !followups.is_empty() {
                print_followups(&followups);
            }
        }

        Ok(())
    }

    /// Check if streaming is enabled.
    fn is_streaming(&self) -> bool {
        !self.no_stream && self.stream
    }
}

fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for source in sources {
        println!("  {}", source);
    }
}

fn print_followups(questions: &[String]) {
    println!("\nFollow-up questions:");
    for question in questions {
        println!("  <<{}>>", question);
    }
}
