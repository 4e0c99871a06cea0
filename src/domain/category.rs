//! Page categories, analysis levels and the category profile table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::models::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Homepage,
    ProductService,
    BlogArticle,
    Documentation,
    Faq,
    CaseStudy,
    Pricing,
    About,
    Contact,
    Legal,
    Navigation,
    Error,
    Login,
    SearchResults,
    LandingCampaign,
    Unknown,
}

impl CategoryType {
    pub const ALL: [CategoryType; 16] = [
        CategoryType::Homepage,
        CategoryType::ProductService,
        CategoryType::BlogArticle,
        CategoryType::Documentation,
        CategoryType::Faq,
        CategoryType::CaseStudy,
        CategoryType::Pricing,
        CategoryType::About,
        CategoryType::Contact,
        CategoryType::Legal,
        CategoryType::Navigation,
        CategoryType::Error,
        CategoryType::Login,
        CategoryType::SearchResults,
        CategoryType::LandingCampaign,
        CategoryType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Homepage => "homepage",
            CategoryType::ProductService => "product_service",
            CategoryType::BlogArticle => "blog_article",
            CategoryType::Documentation => "documentation",
            CategoryType::Faq => "faq",
            CategoryType::CaseStudy => "case_study",
            CategoryType::Pricing => "pricing",
            CategoryType::About => "about",
            CategoryType::Contact => "contact",
            CategoryType::Legal => "legal",
            CategoryType::Navigation => "navigation",
            CategoryType::Error => "error",
            CategoryType::Login => "login",
            CategoryType::SearchResults => "search_results",
            CategoryType::LandingCampaign => "landing_campaign",
            CategoryType::Unknown => "unknown",
        }
    }

    /// Parse a slug as produced by `as_str`, tolerating case, spaces and dashes.
    pub fn from_slug(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-', '/'], "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLevel {
    Full,
    Partial,
    Limited,
    Excluded,
}

/// Which tier of the categorizer produced the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    UrlPattern,
    Llm,
    RuleBased,
    Fallback,
}

/// Static facts about a category: how deep to analyze and how to weight it.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryProfile {
    pub analysis_level: AnalysisLevel,
    pub dimensions: Vec<Dimension>,
    pub weight_modifiers: BTreeMap<Dimension, f64>,
}

const ALL_DIMENSIONS: &[Dimension] = &Dimension::ALL;

const WITHOUT_FRESHNESS: &[Dimension] = &[
    Dimension::Authority,
    Dimension::Structure,
    Dimension::Snippet,
    Dimension::Brand,
    Dimension::Technical,
    Dimension::Quality,
];

const TRANSACTIONAL: &[Dimension] = &[
    Dimension::Structure,
    Dimension::Snippet,
    Dimension::Brand,
    Dimension::Technical,
];

const LIMITED: &[Dimension] = &[Dimension::Structure, Dimension::Brand];

/// Category -> profile lookup table.
pub fn category_profile(category: CategoryType) -> CategoryProfile {
    use AnalysisLevel::*;
    use CategoryType::*;
    use Dimension as D;

    let (level, dimensions, modifiers): (AnalysisLevel, &[Dimension], &[(Dimension, f64)]) =
        match category {
            Homepage => (Partial, WITHOUT_FRESHNESS, &[(D::Brand, 1.3), (D::Authority, 1.1)]),
            ProductService => (Full, ALL_DIMENSIONS, &[(D::Brand, 1.3), (D::Freshness, 0.7)]),
            BlogArticle => (Full, ALL_DIMENSIONS, &[(D::Authority, 1.2), (D::Freshness, 1.2)]),
            Documentation => (Full, ALL_DIMENSIONS, &[(D::Structure, 1.2), (D::Snippet, 1.1)]),
            Faq => (Full, ALL_DIMENSIONS, &[(D::Snippet, 1.3), (D::Brand, 0.8)]),
            CaseStudy => (Full, ALL_DIMENSIONS, &[(D::Authority, 1.2), (D::Quality, 1.1)]),
            Pricing => (Partial, TRANSACTIONAL, &[(D::Snippet, 1.2)]),
            About => (
                Partial,
                &[D::Authority, D::Structure, D::Brand, D::Technical],
                &[(D::Authority, 1.2), (D::Brand, 1.2)],
            ),
            Contact | Navigation => (Limited, LIMITED, &[]),
            LandingCampaign => (
                Partial,
                &[D::Structure, D::Snippet, D::Brand, D::Technical, D::Quality],
                &[(D::Brand, 1.2)],
            ),
            Unknown => (Partial, WITHOUT_FRESHNESS, &[]),
            Legal | Error | Login | SearchResults => (Excluded, &[], &[]),
        };

    CategoryProfile {
        analysis_level: level,
        dimensions: dimensions.to_vec(),
        weight_modifiers: modifiers.iter().copied().collect(),
    }
}

/// The categorizer's verdict for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCategory {
    pub category_type: CategoryType,
    pub analysis_level: AnalysisLevel,
    pub confidence: f64,
    pub reason: String,
    pub source: CategorySource,
    pub dimensions: Vec<Dimension>,
    pub weight_modifiers: BTreeMap<Dimension, f64>,
}

impl PageCategory {
    pub fn new(
        category_type: CategoryType,
        confidence: f64,
        source: CategorySource,
        reason: impl Into<String>,
    ) -> Self {
        let profile = category_profile(category_type);
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            category_type,
            analysis_level: profile.analysis_level,
            confidence,
            reason: reason.into(),
            source,
            dimensions: profile.dimensions,
            weight_modifiers: profile.weight_modifiers,
        }
    }

    /// Terminal fallback when no tier produced a match.
    pub fn unknown(confidence: f64, reason: impl Into<String>) -> Self {
        Self::new(CategoryType::Unknown, confidence, CategorySource::Fallback, reason)
    }

    pub fn is_excluded(&self) -> bool {
        self.analysis_level == AnalysisLevel::Excluded
    }

    pub fn scores_dimension(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    pub fn weight_modifier(&self, dimension: Dimension) -> f64 {
        self.weight_modifiers.get(&dimension).copied().unwrap_or(1.0)
    }
}
