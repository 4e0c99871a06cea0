//! Shared fixtures for unit tests: scripted collaborators, canned pages and
//! ready-made rule contexts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::config::{LlmProvider, ScoringConfig};
use crate::domain::{CategorySource, CategoryType, Dimension, PageCategory, PageMetadata, PageSignals};
use crate::error::{LlmError, RuleError};
use crate::extractor::SignalExtractor;
use crate::service::llm::{CallOptions, DisabledLlm, LlmClient, LlmResponse};
use crate::service::rules::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};

/// 2024-07-01T12:00:00Z
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
}

/// LLM double that answers by prompt substring and counts every call.
#[derive(Default)]
pub struct ScriptedLlm {
    routes: Vec<(String, String)>,
    fail_all: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` to any prompt containing `pattern`. First match wins.
    pub fn respond(mut self, pattern: &str, text: &str) -> Self {
        self.routes.push((pattern.to_string(), text.to_string()));
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
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
impl LlmClient for ScriptedLlm {
    async fn call(&self, _: LlmProvider, prompt: &str, _: &CallOptions) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all {
            return Err(LlmError::Transport("scripted failure".into()));
        }
        self.routes
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, text)| LlmResponse::text(text.clone()))
            .ok_or_else(|| LlmError::Transport("no scripted response".into()))
    }
}

enum Behavior {
    Score(f64),
    Fail,
    Panic,
}

/// Page rule with a canned outcome, applicable to every category.
pub struct StaticRule {
    id: String,
    dimension: Dimension,
    weight: f64,
    behavior: Behavior,
}

impl StaticRule {
    fn with_behavior(id: &str, dimension: Dimension, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            dimension,
            weight: 1.0,
            behavior,
        }
    }

    pub fn scoring(id: &str, dimension: Dimension, score: f64) -> Self {
        Self::with_behavior(id, dimension, Behavior::Score(score))
    }

    pub fn failing(id: &str, dimension: Dimension) -> Self {
        Self::with_behavior(id, dimension, Behavior::Fail)
    }

    pub fn panicking(id: &str, dimension: Dimension) -> Self {
        Self::with_behavior(id, dimension, Behavior::Panic)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

#[async_trait]
impl Rule for StaticRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(&self.id, &self.id, self.dimension, Applicability::all_pages()).weight(self.weight)
    }

    async fn evaluate(&self, _ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        match self.behavior {
            Behavior::Score(score) => Ok(RuleOutcome::new(score).evidence(format!("static score {score}"))),
            Behavior::Fail => Err(RuleError::Internal(format!("{} always fails", self.id))),
            Behavior::Panic => panic!("{} always panics", self.id),
        }
    }
}

/// Page context over `html` with default config and the LLM switched off.
pub fn context_for(url: &str, html: &str) -> RuleContext {
    context_with(url, html, Arc::new(DisabledLlm))
}

pub fn context_with_llm(url: &str, html: &str, llm: Arc<ScriptedLlm>) -> RuleContext {
    context_with(url, html, llm)
}

fn context_with(url: &str, html: &str, llm: Arc<dyn LlmClient>) -> RuleContext {
    let extractor = SignalExtractor::default();
    let signals = extractor.extract(html, &PageMetadata::default(), url);
    let clean = extractor.clean_content(html);
    RuleContext::new(
        url,
        Arc::new(signals),
        PageCategory::unknown(0.1, "test"),
        llm,
        Arc::new(ScoringConfig::default()),
    )
    .unwrap()
    .with_html(html, clean)
    .with_now(fixed_now())
}

/// Domain-scope context rooted at `https://{domain}/`.
pub fn domain_context(domain: &str, llm: Arc<ScriptedLlm>, pages: Vec<Arc<PageSignals>>) -> RuleContext {
    RuleContext::new(
        &format!("https://{domain}/"),
        Arc::new(PageSignals::default()),
        PageCategory::new(CategoryType::Unknown, 1.0, CategorySource::Fallback, "test domain"),
        llm,
        Arc::new(ScoringConfig::default()),
    )
    .unwrap()
    .with_now(fixed_now())
    .with_domain_pages(pages)
}

pub mod html {
    /// Editorial article with a credentialed author, trusted citations,
    /// dates, JSON-LD and a clean heading hierarchy. One image lacks alt text.
    pub const BLOG_POST: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>How to Brew Better Coffee at Home</title>
  <meta name="description" content="A simple guide to brewing better coffee at home with fresh beans, clean water and the right grind.">
  <meta name="author" content="Jane Doe, PhD">
  <meta property="article:published_time" content="2024-05-01T09:00:00Z">
  <meta property="article:modified_time" content="2024-06-15T10:00:00Z">
  <link rel="canonical" href="https://example.com/blog/post">
  <script type="application/ld+json">
  {
    "@context": "https://schema.org",
    "@type": "BlogPosting",
    "headline": "How to Brew Better Coffee at Home",
    "author": {"@type": "Person", "name": "Jane Doe, PhD"},
    "datePublished": "2024-05-01T09:00:00Z",
    "dateModified": "2024-06-15T10:00:00Z",
    "publisher": {"@type": "Organization", "name": "Example Coffee"}
  }
  </script>
</head>
<body>
  <nav><a href="/">Home</a> <a href="/blog/">Blog</a></nav>
  <article>
    <h1>How to Brew Better Coffee at Home</h1>
    <p>Written by <span class="author">Jane Doe, PhD</span> · 6 min read · <time datetime="2024-05-01">May 1, 2024</time></p>
    <img src="/img/beans.jpg" alt="Roasted coffee beans">
    <h2>Start with fresh beans</h2>
    <p>Fresh beans make the biggest difference. Roasted coffee loses flavor within weeks. Store beans in a sealed jar.</p>
    <h3>Buy whole beans</h3>
    <p>Whole beans keep their aroma longer. Grind them right before brewing. Research from the <a href="https://www.nih.gov/news-events/coffee">NIH</a> covers caffeine intake.</p>
    <h2>Dial in the grind</h2>
    <p>Grind size controls extraction speed. Fine grinds extract fast. Coarse grinds extract slowly.</p>
    <img src="/img/grinder.jpg">
    <h3>Match grind to method</h3>
    <p>Use a coarse grind for a French press. Use a medium grind for drip brewers. The <a href="https://en.wikipedia.org/wiki/Coffee_preparation">history of brewing</a> is long.</p>
  </article>
  <footer>Copyright 2024 Example Coffee</footer>
</body>
</html>"#;

    /// FAQ page: three question headings, one list, one table, FAQPage schema.
    pub const FAQ_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Frequently asked questions | Example Coffee</title>
  <meta name="description" content="Answers to common questions about orders, shipping and refunds at Example Coffee.">
  <link rel="canonical" href="https://example.com/faq">
  <script type="application/ld+json">
  {
    "@context": "https://schema.org",
    "@type": "FAQPage",
    "mainEntity": [
      {"@type": "Question", "name": "How long does shipping take?",
       "acceptedAnswer": {"@type": "Answer", "text": "Most orders arrive within five days."}}
    ]
  }
  </script>
</head>
<body>
  <main>
    <section id="faq">
      <h1>Frequently asked questions</h1>
      <p>These frequently asked questions cover orders, shipping and refunds.</p>
      <h2>How long does shipping take?</h2>
      <p>Most orders arrive within five business days. Remote areas can take a little longer.</p>
      <h2>Can I return an item?</h2>
      <p>Yes. Unopened bags can be sent back within thirty days for a full refund.</p>
      <h2>Do you ship internationally?</h2>
      <p>We ship to most countries in Europe and North America.</p>
      <ul>
        <li>Canada</li>
        <li>Germany</li>
        <li>France</li>
      </ul>
      <table>
        <tr><th>Region</th><th>Delivery time</th></tr>
        <tr><td>Domestic</td><td>2 to 5 days</td></tr>
        <tr><td>International</td><td>7 to 14 days</td></tr>
      </table>
    </section>
  </main>
</body>
</html>"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_llm_routes_by_substring_and_counts() {
        let llm = ScriptedLlm::new().respond("alpha", "A").respond("beta", "B");
        let options = CallOptions::analysis(&Default::default());
        let answer = llm.call(LlmProvider::Gemini, "say beta", &options).await.unwrap();
        assert_eq!(answer.text, "B");
        assert!(llm.call(LlmProvider::Gemini, "gamma", &options).await.is_err());
        assert_eq!(llm.calls(), 2);
    }

    #[test]
    fn fixtures_parse_into_expected_signals() {
        let blog = context_for("https://example.com/blog/post", html::BLOG_POST);
        assert_eq!(blog.domain, "example.com");
        assert!(blog.clean_content.contains("6 min read"));
        assert!(!blog.clean_content.contains("Copyright"));

        let faq = context_for("https://example.com/faq", html::FAQ_PAGE);
        assert!(faq.signals.structure.schema_types.contains(&"FAQPage".to_string()));
        assert!(faq.signals.content.paragraph_word_counts.iter().all(|&w| w <= 60));
    }
}
