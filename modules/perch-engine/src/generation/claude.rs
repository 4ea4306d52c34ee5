use ai_client::Claude;
use async_trait::async_trait;

use perch_common::{Config, PerchError};

use super::{ContentAnalysis, LanguageModel};

/// Claude-backed language model: a lighter model for analysis extraction, a
/// stronger one for drafting.
pub struct ClaudeModel {
    analysis: Claude,
    generation: Claude,
}

impl ClaudeModel {
    pub fn new(
        api_key: &str,
        analysis_model: impl Into<String>,
        generation_model: impl Into<String>,
    ) -> Self {
        Self {
            analysis: Claude::new(api_key, analysis_model),
            generation: Claude::new(api_key, generation_model),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.anthropic_api_key,
            config.analysis_model.clone(),
            config.generation_model.clone(),
        )
    }
}

#[async_trait]
impl LanguageModel for ClaudeModel {
    fn model_id(&self) -> &str {
        self.generation.model()
    }

    async fn analyze(&self, system: &str, user: &str) -> Result<ContentAnalysis, PerchError> {
        self.analysis
            .extract::<ContentAnalysis>(system, user)
            .await
            .map_err(|e| PerchError::Generation(format!("analysis call failed: {e}")))
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, PerchError> {
        self.generation
            .chat_completion(system, user)
            .await
            .map_err(|e| PerchError::Generation(format!("generation call failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_id_reports_the_generation_model() {
        let model = ClaudeModel::new(
            "sk-ant-test",
            "claude-haiku-4-5-20251001",
            "claude-sonnet-4-20250514",
        );
        assert_eq!(model.model_id(), "claude-sonnet-4-20250514");
    }
}
