//! The narrow contract with the external model collaborator.
//!
//! Rules never talk HTTP themselves: they get an `Arc<dyn LlmClient>` and call
//! it with a provider, a prompt and `CallOptions`. Wrappers layer retries,
//! timeouts and call counting on top of any client.

pub mod http;
pub mod json;
pub mod resilient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::LlmError;

pub use http::HttpLlmClient;
pub use json::{extract_first_json_object, parse_json_response, strip_code_blocks};
pub use resilient::{CountingLlm, DisabledLlm, ResilientLlm};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CallOptions {
    /// Options for page-level analysis prompts.
    pub fn analysis(config: &LlmConfig) -> Self {
        Self {
            model: config.analysis_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Options for web-research prompts.
    pub fn research(config: &LlmConfig) -> Self {
        Self {
            model: config.research_model.clone(),
            temperature: config.temperature,
            max_tokens: config.research_max_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token_usage: None,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn call(
        &self,
        provider: LlmProvider,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<LlmResponse, LlmError>;
}
