//! Rule registry and applicability resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Rule, RuleMeta, Scope};
use crate::config::{RuleOverride, ScoringConfig};
use crate::domain::{CategoryType, Dimension};
use crate::service::cache::DomainResearchCache;

use super::authority::EeatSignalsRule;
use super::brand::BrandAlignmentRule;
use super::domain_authority::DomainAuthorityRule;
use super::freshness::ContentAgeRule;
use super::llm_eeat::LlmEeatRule;
use super::quality::{ContentDepthRule, LlmContentQualityRule};
use super::schema_coverage::SchemaCoverageRule;
use super::snippet::ExtractabilityRule;
use super::structure::SemanticStructureRule;
use super::technical::{IndexabilityRule, MetaTagsRule};

/// A rule plus its effective metadata (weight after overrides).
#[derive(Clone)]
pub struct RegisteredRule {
    pub rule: Arc<dyn Rule>,
    pub meta: RuleMeta,
}

impl RegisteredRule {
    pub fn new(rule: Arc<dyn Rule>) -> Self {
        let meta = rule.meta();
        Self { rule, meta }
    }
}

impl std::fmt::Debug for RegisteredRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredRule").field("meta", &self.meta).finish()
    }
}

/// Rules in registration order. Re-registering an id replaces it in place.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<RegisteredRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in rule, with the config's per-rule overrides applied.
    pub fn with_default_rules(config: &ScoringConfig, research_cache: Arc<DomainResearchCache>) -> Self {
        let builtin: Vec<Arc<dyn Rule>> = vec![
            Arc::new(EeatSignalsRule),
            Arc::new(LlmEeatRule),
            Arc::new(ContentAgeRule),
            Arc::new(SemanticStructureRule),
            Arc::new(ExtractabilityRule),
            Arc::new(BrandAlignmentRule),
            Arc::new(MetaTagsRule),
            Arc::new(IndexabilityRule),
            Arc::new(ContentDepthRule),
            Arc::new(LlmContentQualityRule),
            Arc::new(DomainAuthorityRule::new(research_cache)),
            Arc::new(SchemaCoverageRule),
        ];

        let mut registry = Self::new();
        for rule in builtin {
            let id = rule.meta().id;
            registry.register_with(rule, &config.rule_override(&id));
        }
        registry
    }

    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        self.insert(RegisteredRule::new(rule));
    }

    /// Register with a config override. Disabled rules are not registered.
    pub fn register_with(&mut self, rule: Arc<dyn Rule>, overrides: &RuleOverride) {
        let mut registered = RegisteredRule::new(rule);
        if !overrides.enabled {
            tracing::debug!("Rule {} disabled by configuration", registered.meta.id);
            self.rules.retain(|r| r.meta.id != registered.meta.id);
            return;
        }
        if let Some(weight) = overrides.weight {
            registered.meta.weight = weight;
        }
        self.insert(registered);
    }

    fn insert(&mut self, registered: RegisteredRule) {
        match self.rules.iter_mut().find(|r| r.meta.id == registered.meta.id) {
            Some(existing) => *existing = registered,
            None => self.rules.push(registered),
        }
    }

    pub fn get_rules_for_dimension(
        &self,
        dimension: Dimension,
        category: CategoryType,
        scope: Scope,
    ) -> Vec<RegisteredRule> {
        self.rules
            .iter()
            .filter(|r| r.meta.dimension == dimension && r.meta.applicability.applies(category, scope))
            .cloned()
            .collect()
    }

    pub fn domain_rules(&self) -> Vec<RegisteredRule> {
        self.rules
            .iter()
            .filter(|r| r.meta.applicability.scope == Scope::Domain)
            .cloned()
            .collect()
    }

    /// Every registered rule grouped by dimension.
    pub fn get_all_rules(&self) -> BTreeMap<Dimension, Vec<RegisteredRule>> {
        let mut grouped: BTreeMap<Dimension, Vec<RegisteredRule>> = BTreeMap::new();
        for rule in &self.rules {
            grouped.entry(rule.meta.dimension).or_default().push(rule.clone());
        }
        grouped
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredRule> {
        self.rules.iter().find(|r| r.meta.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticRule;

    fn default_registry() -> RuleRegistry {
        RuleRegistry::with_default_rules(&ScoringConfig::default(), Arc::new(DomainResearchCache::new()))
    }

    #[test]
    fn default_rules_are_all_registered() {
        let registry = default_registry();
        assert_eq!(registry.len(), 12);
        assert_eq!(registry.domain_rules().len(), 2);
        let all = registry.get_all_rules();
        for dimension in Dimension::ALL {
            assert!(all.contains_key(&dimension), "no rules for {dimension}");
        }
    }

    #[test]
    fn applicability_filters_by_category() {
        let registry = default_registry();
        let blog = registry.get_rules_for_dimension(Dimension::Freshness, CategoryType::BlogArticle, Scope::Page);
        assert_eq!(blog.len(), 1);
        let pricing = registry.get_rules_for_dimension(Dimension::Freshness, CategoryType::Pricing, Scope::Page);
        assert!(pricing.is_empty());

        let domain = registry.get_rules_for_dimension(Dimension::Authority, CategoryType::Unknown, Scope::Domain);
        assert_eq!(domain.len(), 1);
        assert_eq!(domain[0].meta.id, "authority.domain_authority");
    }

    #[test]
    fn reregistering_replaces() {
        let mut registry = RuleRegistry::new();
        registry.register(Arc::new(StaticRule::scoring("x", Dimension::Brand, 10.0)));
        registry.register(Arc::new(StaticRule::scoring("x", Dimension::Brand, 90.0).with_weight(3.0)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").unwrap().meta.weight, 3.0);
    }

    #[test]
    fn overrides_change_weight_or_disable() {
        let config = ScoringConfig::from_json_str(
            r#"{"rules":{"structure.semantic_structure":{"weight":2.5},"technical.indexability":{"enabled":false}}}"#,
        )
        .unwrap();
        let registry = RuleRegistry::with_default_rules(&config, Arc::new(DomainResearchCache::new()));
        assert_eq!(registry.len(), 11);
        assert!(registry.get("technical.indexability").is_none());
        assert_eq!(registry.get("structure.semantic_structure").unwrap().meta.weight, 2.5);
    }
}
