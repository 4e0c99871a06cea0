#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aeo_scoring::config::LlmProvider;
use aeo_scoring::error::LlmError;
use aeo_scoring::service::llm::{CallOptions, LlmClient, LlmResponse};
use async_trait::async_trait;

/// Answers by prompt substring; everything else fails like an outage.
#[derive(Default)]
pub struct StubLlm {
    routes: Vec<(&'static str, &'static str)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, pattern: &'static str, text: &'static str) -> Self {
        self.routes.push((pattern, text));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn call(&self, _: LlmProvider, prompt: &str, _: &CallOptions) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.routes
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern))
            .map(|(_, text)| LlmResponse::text(*text))
            .ok_or(LlmError::Disabled)
    }
}

pub const ARTICLE: &str = r#"<html lang="en"><head>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Choosing a Trail Running Shoe</title>
  <meta name="description" content="What to look for in a trail running shoe: grip, cushioning, fit and drop explained simply.">
  <meta name="author" content="Alex Kim, Certified coach">
  <meta property="article:modified_time" content="2024-06-20T08:00:00Z">
  <link rel="canonical" href="https://example.com/blog/trail-shoes">
  <script type="application/ld+json">{"@context":"https://schema.org","@type":"Article","headline":"Choosing a Trail Running Shoe","author":{"@type":"Person","name":"Alex Kim, Certified coach"}}</script>
</head><body><article>
  <h1>Choosing a Trail Running Shoe</h1>
  <p>Written by Alex Kim · 4 min read</p>
  <h2>Grip matters most</h2>
  <p>Deep lugs hold on mud. Shallow lugs suit hard trails. Pick the lug for your terrain.</p>
  <h2>Cushioning and drop</h2>
  <p>More foam protects on long runs. Lower drop feels closer to the ground. See the <a href="https://www.ncbi.nlm.nih.gov/pmc/articles/running">study</a> and <a href="https://en.wikipedia.org/wiki/Trail_running">overview</a>.</p>
  <ul><li>Grip</li><li>Fit</li><li>Drop</li></ul>
</article></body></html>"#;

pub const LOGIN: &str = r#"<html><head><title>Sign in</title></head>
<body><form><input type="email"><input type="password"></form></body></html>"#;

pub const PLAIN: &str = "<html><body><p>Just a few words here.</p></body></html>";
