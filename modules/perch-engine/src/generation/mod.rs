// Two-stage response generation: analyze the post, optionally retrieve
// knowledge-base context, then draft the reply. Produces a versioned draft
// Response; never mutates the opportunity.

pub mod claude;
pub mod prompt;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use perch_common::{
    KnowledgeChunk, PerchError, Response, ResponseMetadata, ResponseStatus, KNOWLEDGE_TOP_K,
};

use crate::store::Store;
use crate::traits::{KnowledgeBase, PlatformAdapter};

/// Structured result of the analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentAnalysis {
    /// What the post is about, in a short phrase.
    pub main_topic: String,
    /// Search terms capturing the subject matter.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Broad field, e.g. "software" or "finance".
    pub domain: String,
    /// The question the author asks, if any.
    pub question: Option<String>,
}

/// LLM seam for the pipeline's two stages.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Structured analysis of fenced post content. An `Err` here means the
    /// model produced malformed output — the pipeline retries once.
    async fn analyze(&self, system: &str, user: &str) -> Result<ContentAnalysis, PerchError>;

    /// Plain-text reply drafting.
    async fn generate(&self, system: &str, user: &str) -> Result<String, PerchError>;
}

pub struct ResponsePipeline {
    store: Arc<dyn Store>,
    adapter: Arc<dyn PlatformAdapter>,
    knowledge: Arc<dyn KnowledgeBase>,
    model: Arc<dyn LanguageModel>,
}

impl ResponsePipeline {
    pub fn new(
        store: Arc<dyn Store>,
        adapter: Arc<dyn PlatformAdapter>,
        knowledge: Arc<dyn KnowledgeBase>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            store,
            adapter,
            knowledge,
            model,
        }
    }

    /// Draft a response for an opportunity. Persists a new `draft` Response
    /// with the next version number and full stage metadata.
    pub async fn generate(
        &self,
        opportunity_id: Uuid,
        account_id: Uuid,
        profile_id: Uuid,
    ) -> Result<Response, PerchError> {
        let opportunity = self
            .store
            .get_opportunity(opportunity_id)
            .await?
            .ok_or_else(|| PerchError::not_found("opportunity", opportunity_id))?;
        let _account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| PerchError::not_found("account", account_id))?;
        let profile = self
            .store
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| PerchError::not_found("profile", profile_id))?;
        let constraints = self
            .adapter
            .response_constraints(opportunity.platform)
            .await?;

        // Stage 1: analysis, with one retry on malformed model output.
        let (analysis_system, analysis_user) = prompt::analysis_prompt(&opportunity.content.text);
        let analysis_started = Instant::now();
        let analysis = match self.model.analyze(&analysis_system, &analysis_user).await {
            Ok(analysis) => analysis,
            Err(first) => {
                warn!(
                    opportunity = %opportunity_id,
                    error = %first,
                    "Analysis output malformed, retrying once"
                );
                self.model
                    .analyze(&analysis_system, &analysis_user)
                    .await
                    .map_err(|e| {
                        PerchError::Generation(format!("analysis failed after retry: {e}"))
                    })?
            }
        };
        let analysis_ms = analysis_started.elapsed().as_millis() as u64;

        // Stage 2: retrieval. Any failure degrades to zero chunks here, at
        // the call site, so the rest of the pipeline sees one contract.
        let retrieval_started = Instant::now();
        let chunks: Vec<KnowledgeChunk> = if analysis.keywords.is_empty() {
            Vec::new()
        } else {
            match self
                .knowledge
                .search(&analysis.keywords, KNOWLEDGE_TOP_K)
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(
                        opportunity = %opportunity_id,
                        error = %e,
                        "Knowledge-base search failed, continuing without context"
                    );
                    Vec::new()
                }
            }
        };
        let retrieval_ms = retrieval_started.elapsed().as_millis() as u64;

        // Stage 3: generation.
        let (generation_system, generation_user) = prompt::generation_prompt(
            &profile,
            &analysis,
            &chunks,
            &opportunity.content.text,
            constraints.max_length,
        );
        let generation_started = Instant::now();
        let text = self
            .model
            .generate(&generation_system, &generation_user)
            .await?;
        let generation_ms = generation_started.elapsed().as_millis() as u64;

        let length = text.chars().count();
        if length > constraints.max_length {
            return Err(PerchError::ConstraintViolation {
                length,
                max_length: constraints.max_length,
            });
        }

        let version = self
            .store
            .latest_response_version(opportunity_id)
            .await?
            .map_or(1, |v| v + 1);
        debug!(opportunity = %opportunity_id, version, "Assigning response version");

        let response = Response {
            id: Uuid::new_v4(),
            opportunity_id,
            account_id,
            text,
            status: ResponseStatus::Draft,
            version,
            metadata: ResponseMetadata {
                keywords: analysis.keywords.clone(),
                topic: analysis.main_topic.clone(),
                domain: analysis.domain.clone(),
                question: analysis.question.clone(),
                knowledge_chunks: chunks.len(),
                model: self.model.model_id().to_string(),
                analysis_ms,
                retrieval_ms,
                generation_ms,
                max_length: constraints.max_length,
            },
            platform_post_id: None,
            platform_post_url: None,
            posted_at: None,
            created_at: Utc::now(),
        };

        self.store.insert_response(response.clone()).await?;

        info!(
            opportunity = %opportunity_id,
            version,
            chunks = chunks.len(),
            length,
            "Drafted response"
        );
        Ok(response)
    }
}
