use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::schema::StructuredOutput;
use crate::wire::{ChatRequest, ChatResponse, ToolSpec};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const EXTRACT_TOOL: &str = "structured_response";

/// Handle over the Anthropic Messages API: plain chat completion and
/// structured extraction via forced tool use.
#[derive(Clone)]
pub struct Claude {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "Claude chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .context("Claude API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Claude API error ({status}): {body}"));
        }

        response
            .json()
            .await
            .context("Claude API response was not valid JSON")
    }

    /// Extract a structured value by forcing a tool call against the type's
    /// schema. Extraction runs at temperature 0.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        debug!(type_name = %T::type_name(), "Structured extraction");

        let mut request = ChatRequest::new(&self.model)
            .temperature(0.0)
            .system(system_prompt)
            .user(user_prompt)
            .tool(ToolSpec {
                name: EXTRACT_TOOL.to_string(),
                description: "Record the extracted data.".to_string(),
                input_schema: T::tool_schema(),
            });
        request.force_tool(EXTRACT_TOOL);

        let response = self.send(&request).await?;
        let input = response
            .into_tool_input()
            .ok_or_else(|| anyhow!("no tool output in Claude response"))?;
        serde_json::from_value(input).map_err(|e| anyhow!("tool output did not match schema: {e}"))
    }

    /// One-shot chat completion returning the text body.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .temperature(0.7)
            .system(system)
            .user(user);

        let response = self.send(&request).await?;
        response
            .text()
            .ok_or_else(|| anyhow!("no text in Claude response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_keeps_model_and_base_url() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514");
        assert_eq!(ai.model(), "claude-sonnet-4-20250514");
        assert_eq!(ai.base_url, DEFAULT_BASE_URL);

        let ai = ai.with_base_url("http://localhost:9999");
        assert_eq!(ai.base_url, "http://localhost:9999");
    }
}
