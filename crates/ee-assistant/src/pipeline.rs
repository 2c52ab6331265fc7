//! The retrieval-augmented answer pipeline

use std::sync::Arc;
use tracing::{debug, info, warn};

use ee_core::{
    AnswerResult, AppConfig, ChatProvider, ConfigSource, EnvConfigSource, Interaction, Result,
    RetrievedChunk, Retriever, TelemetryEvent, COMPLETION_EVENT,
};
use ee_providers::{prepare_provider, BackendFactory, ProviderFactory};
use ee_rag::{extract_sources, format_context, VectorRetriever};

use crate::prompts::{render_ask_prompt, render_explain_prompt, retrieval_query};
use crate::telemetry::{JsonlTelemetrySink, TelemetrySink};

/// Opens the retriever used for one request
pub trait RetrieverFactory: Send + Sync {
    fn open(&self, config: &AppConfig) -> Result<Box<dyn Retriever>>;
}

/// Default factory reading the persisted local index
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorRetrieverFactory;

impl RetrieverFactory for VectorRetrieverFactory {
    fn open(&self, config: &AppConfig) -> Result<Box<dyn Retriever>> {
        Ok(Box::new(VectorRetriever::open(config)?))
    }
}

/// Orchestrates one question or code explanation per call.
///
/// Configuration, provider and retriever are resolved afresh on every call,
/// so the assistant itself holds no per-request state and can be shared
/// across tasks.
#[derive(Clone)]
pub struct Assistant {
    config: Arc<dyn ConfigSource>,
    providers: Arc<dyn ProviderFactory>,
    retrievers: Arc<dyn RetrieverFactory>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Default for Assistant {
    fn default() -> Self {
        Self {
            config: Arc::new(EnvConfigSource),
            providers: Arc::new(BackendFactory),
            retrievers: Arc::new(VectorRetrieverFactory),
            telemetry: Arc::new(JsonlTelemetrySink),
        }
    }
}

impl Assistant {
    /// Create an assistant with environment configuration and the default backends
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_source(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = config;
        self
    }

    pub fn with_provider_factory(mut self, providers: Arc<dyn ProviderFactory>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_retriever_factory(mut self, retrievers: Arc<dyn RetrieverFactory>) -> Self {
        self.retrievers = retrievers;
        self
    }

    pub fn with_telemetry_sink(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Answer a free-form question grounded in the indexed resources.
    pub async fn ask(
        &self,
        question: &str,
        skill_level: &str,
        request_id: Option<&str>,
    ) -> Result<AnswerResult> {
        let config = self.config.load()?;
        let provider = prepare_provider(&config, self.providers.as_ref())?;
        let retriever = self.retrievers.open(&config)?;

        let chunks = retriever.retrieve(question, config.retrieval_k).await?;
        debug!(chunks = chunks.len(), "retrieved context for question");

        let prompt = render_ask_prompt(question, skill_level, &format_context(&chunks));
        let answer = provider.generate(&prompt, None).await?;

        Ok(self.complete(
            &config,
            provider.as_ref(),
            Interaction::Ask,
            skill_level,
            request_id,
            answer,
            &chunks,
        ))
    }

    /// Explain a region of code, using the language and user context to
    /// steer retrieval.
    pub async fn explain_region(
        &self,
        code: &str,
        language: &str,
        context: &str,
        skill_level: &str,
        request_id: Option<&str>,
    ) -> Result<AnswerResult> {
        let config = self.config.load()?;
        let provider = prepare_provider(&config, self.providers.as_ref())?;
        let retriever = self.retrievers.open(&config)?;

        let query = retrieval_query(language, context, code);
        let chunks = retriever.retrieve(&query, config.retrieval_k).await?;
        debug!(chunks = chunks.len(), "retrieved context for code region");

        let prompt = render_explain_prompt(
            code,
            language,
            context,
            skill_level,
            &format_context(&chunks),
        );
        let answer = provider.generate(&prompt, None).await?;

        Ok(self.complete(
            &config,
            provider.as_ref(),
            Interaction::ExplainRegion,
            skill_level,
            request_id,
            answer,
            &chunks,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn complete(
        &self,
        config: &AppConfig,
        provider: &dyn ChatProvider,
        interaction: Interaction,
        skill_level: &str,
        request_id: Option<&str>,
        answer: String,
        chunks: &[RetrievedChunk],
    ) -> AnswerResult {
        let event = TelemetryEvent {
            event: COMPLETION_EVENT.to_string(),
            request_id: request_id.map(str::to_string),
            interaction,
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            skill_level: skill_level.to_string(),
            retrieval_chunk_count: chunks.len(),
        };

        if let Err(e) = self.telemetry.log_event(config, &event) {
            warn!(error = %e, interaction = interaction.as_str(), "failed to record telemetry event");
        }

        info!(
            interaction = interaction.as_str(),
            provider = provider.name(),
            model = provider.model(),
            chunks = chunks.len(),
            "completed request"
        );

        AnswerResult {
            answer,
            sources: extract_sources(chunks),
            provider: event.provider,
            model: event.model,
            request_id: event.request_id,
        }
    }
}
