use async_trait::async_trait;
use serde_json::json;

use super::{CallOptions, LlmClient, LlmResponse, TokenUsage};
use crate::config::LlmProvider;
use crate::error::LlmError;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Google Gemini `generateContent` for analysis, Perplexity chat completions for research.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    gemini_api_key: Option<String>,
    perplexity_api_key: Option<String>,
    gemini_base_url: String,
    perplexity_base_url: String,
}

impl HttpLlmClient {
    pub fn new(gemini_api_key: Option<String>, perplexity_api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            gemini_api_key: gemini_api_key.filter(|k| !k.is_empty()),
            perplexity_api_key: perplexity_api_key.filter(|k| !k.is_empty()),
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            perplexity_base_url: PERPLEXITY_BASE_URL.to_string(),
        }
    }

    /// Keys from `GEMINI_API_KEY` / `PERPLEXITY_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("GEMINI_API_KEY").ok(),
            std::env::var("PERPLEXITY_API_KEY").ok(),
        )
    }

    pub fn with_base_urls(mut self, gemini: impl Into<String>, perplexity: impl Into<String>) -> Self {
        self.gemini_base_url = gemini.into();
        self.perplexity_base_url = perplexity.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.gemini_api_key.is_some() || self.perplexity_api_key.is_some()
    }

    async fn call_gemini(&self, prompt: &str, options: &CallOptions) -> Result<LlmResponse, LlmError> {
        let api_key = self
            .gemini_api_key
            .as_deref()
            .ok_or(LlmError::NotConfigured("gemini"))?;

        let api_url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.gemini_base_url.trim_end_matches('/'),
            options.model,
            api_key
        );
        let request_body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_tokens
            }
        });

        let response_json = self.post_json(&api_url, None, &request_body).await?;

        let text = response_json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?
            .to_string();

        let usage = &response_json["usageMetadata"];
        let token_usage = usage["promptTokenCount"].as_u64().map(|prompt_tokens| TokenUsage {
            prompt_tokens: prompt_tokens as u32,
            completion_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        });

        Ok(LlmResponse { text, token_usage })
    }

    async fn call_perplexity(&self, prompt: &str, options: &CallOptions) -> Result<LlmResponse, LlmError> {
        let api_key = self
            .perplexity_api_key
            .as_deref()
            .ok_or(LlmError::NotConfigured("perplexity"))?;

        let api_url = format!("{}/chat/completions", self.perplexity_base_url.trim_end_matches('/'));
        let request_body = json!({
            "model": options.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens
        });

        let response_json = self.post_json(&api_url, Some(api_key), &request_body).await?;

        let text = response_json["choices"][0]["message"]["content"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?
            .to_string();

        let usage = &response_json["usage"];
        let token_usage = usage["prompt_tokens"].as_u64().map(|prompt_tokens| TokenUsage {
            prompt_tokens: prompt_tokens as u32,
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(LlmResponse { text, token_usage })
    }

    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn call(
        &self,
        provider: LlmProvider,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<LlmResponse, LlmError> {
        tracing::debug!("LLM call to {} ({})", provider.as_str(), options.model);
        match provider {
            LlmProvider::Gemini => self.call_gemini(prompt, options).await,
            LlmProvider::Perplexity => self.call_perplexity(prompt, options).await,
        }
    }
}
