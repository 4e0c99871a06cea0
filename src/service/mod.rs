pub mod aggregator;
pub mod cache;
pub mod categorizer;
pub mod clock;
pub mod domain_analysis;
pub mod issues;
pub mod llm;
pub mod rules;
pub mod scoring;

pub use aggregator::{Aggregation, ConditionalAggregator};
pub use cache::{DomainResearch, DomainResearchCache};
pub use categorizer::{CategorizationInput, PageCategorizer};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain_analysis::{DomainAnalysisInput, DomainAnalysisOrchestrator};
pub use issues::IssueCollector;
pub use llm::{CountingLlm, DisabledLlm, HttpLlmClient, LlmClient, ResilientLlm};
pub use rules::{Rule, RuleContext, RuleRegistry};
pub use scoring::AeoScoringService;
