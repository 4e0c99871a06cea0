use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CallOptions, LlmClient, LlmResponse};
use crate::config::{LlmProvider, RetryPolicy};
use crate::error::LlmError;

/// Bounded retries with a per-attempt timeout and exponential back-off.
pub struct ResilientLlm {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl ResilientLlm {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.policy.backoff_multiplier.max(1.0).powi(attempt as i32);
        Duration::from_millis((self.policy.initial_backoff_ms as f64 * factor) as u64)
    }
}

#[async_trait]
impl LlmClient for ResilientLlm {
    async fn call(
        &self,
        provider: LlmProvider,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<LlmResponse, LlmError> {
        let attempts = self.policy.max_attempts.max(1);
        let timeout = Duration::from_secs(self.policy.timeout_secs);
        let mut last_error = LlmError::EmptyResponse;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt - 1)).await;
            }

            let result = match tokio::time::timeout(timeout, self.inner.call(provider, prompt, options)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.policy.timeout_secs)),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    tracing::warn!(
                        "LLM call to {} failed (attempt {}/{}): {}",
                        provider.as_str(),
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

/// Counts calls made through it; one per analysis run.
pub struct CountingLlm {
    inner: Arc<dyn LlmClient>,
    calls: AtomicUsize,
}

impl CountingLlm {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmClient for CountingLlm {
    async fn call(
        &self,
        provider: LlmProvider,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.call(provider, prompt, options).await
    }
}

/// Always fails; every LLM-dependent path falls back to heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn call(&self, _: LlmProvider, _: &str, _: &CallOptions) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Disabled)
    }
}
