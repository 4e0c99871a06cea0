//! Static detection table for the rule-based categorization tier.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::domain::CategoryType;

struct DetectionSpec {
    category: CategoryType,
    url: &'static [&'static str],
    meta: &'static [&'static str],
    content: &'static [&'static str],
    selectors: &'static [&'static str],
    schema_types: &'static [&'static str],
}

/// Ordered: on equal scores the earlier entry wins.
const DETECTION_SPECS: &[DetectionSpec] = &[
    DetectionSpec {
        category: CategoryType::Error,
        url: &[r"/(404|not-found|error)(/|\.|$)"],
        meta: &[r"page not found|\b404\b"],
        content: &[r"page (you|you're|you are) looking for|404 not found|page not found"],
        selectors: &[],
        schema_types: &[],
    },
    DetectionSpec {
        category: CategoryType::Login,
        url: &[r"/(login|log-in|signin|sign-in|signup|sign-up|register)(/|\.|$)"],
        meta: &[r"\b(log in|sign in|sign up)\b"],
        content: &[r"forgot (your )?password|sign in to|remember me"],
        selectors: &["input[type='password']"],
        schema_types: &[],
    },
    DetectionSpec {
        category: CategoryType::SearchResults,
        url: &[r"/search(/|\?|$)", r"[?&](q|s|query)="],
        meta: &[r"search results"],
        content: &[r"results? for\b|no results found"],
        selectors: &["input[type='search']"],
        schema_types: &["SearchResultsPage"],
    },
    DetectionSpec {
        category: CategoryType::Legal,
        url: &[r"/(privacy|terms|legal|cookies?|gdpr|imprint|disclaimer)"],
        meta: &[r"privacy policy|terms (of|and) (service|use|conditions)|cookie policy"],
        content: &[r"personal data|governing law|limitation of liability"],
        selectors: &[],
        schema_types: &[],
    },
    DetectionSpec {
        category: CategoryType::Faq,
        url: &[r"/(faq|faqs|questions|help-center)(/|\.|$)"],
        meta: &[r"frequently asked|\bfaqs?\b"],
        content: &[r"frequently asked questions"],
        selectors: &["details summary", ".faq", "#faq"],
        schema_types: &["FAQPage", "QAPage"],
    },
    DetectionSpec {
        category: CategoryType::Pricing,
        url: &[r"/(pricing|plans|price)(/|\.|$)"],
        meta: &[r"\b(pricing|plans)\b"],
        content: &[r"per (month|year|user|seat)|/mo\b|billed (monthly|annually)|free trial"],
        selectors: &[".pricing", ".pricing-table", ".plan", "[class*='pricing']"],
        schema_types: &[],
    },
    DetectionSpec {
        category: CategoryType::Documentation,
        url: &[r"/(docs|documentation|guides?|reference|api|manual|kb|knowledge-base)(/|\.|$)"],
        meta: &[r"\b(documentation|reference|api)\b"],
        content: &[r"getting started|installation|parameters|returns\b"],
        selectors: &["pre code", "nav.sidebar", ".docs"],
        schema_types: &["TechArticle", "APIReference"],
    },
    DetectionSpec {
        category: CategoryType::BlogArticle,
        url: &[r"/(blog|news|articles?|posts?|insights|stories)(/|$)", r"/\d{4}/\d{2}/"],
        meta: &[],
        content: &[r"\bmin(ute)? read\b|posted (on|by)|written by|published (on|by)"],
        selectors: &["article", "time[datetime]", ".byline", ".author"],
        schema_types: &["Article", "BlogPosting", "NewsArticle"],
    },
    DetectionSpec {
        category: CategoryType::CaseStudy,
        url: &[r"/(case-stud(y|ies)|customers?|success-stor(y|ies))(/|$)"],
        meta: &[r"case study|customer story|success story"],
        content: &[r"case study|the challenge|the solution|the results"],
        selectors: &[],
        schema_types: &[],
    },
    DetectionSpec {
        category: CategoryType::ProductService,
        url: &[r"/(products?|services?|solutions?|features?|platform)(/|$)"],
        meta: &[r"\b(product|service|solution|platform)s?\b"],
        content: &[r"add to cart|buy now|request a demo|book a demo|key features"],
        selectors: &["[itemtype*='Product']", ".product", "button.add-to-cart"],
        schema_types: &["Product", "Service", "SoftwareApplication", "Offer"],
    },
    DetectionSpec {
        category: CategoryType::About,
        url: &[r"/(about|about-us|company|team|who-we-are|our-story)(/|\.|$)"],
        meta: &[r"about us|our team|our story"],
        content: &[r"our mission|our team|founded in|our story"],
        selectors: &[],
        schema_types: &["AboutPage"],
    },
    DetectionSpec {
        category: CategoryType::Contact,
        url: &[r"/(contact|contact-us|get-in-touch)(/|\.|$)"],
        meta: &[r"\bcontact\b"],
        content: &[r"get in touch|contact us|send us a message"],
        selectors: &["form textarea", "a[href^='mailto:']", "a[href^='tel:']"],
        schema_types: &["ContactPage"],
    },
    DetectionSpec {
        category: CategoryType::LandingCampaign,
        url: &[r"/(lp|landing|campaigns?|promo|offer|webinar)(/|$)", r"[?&]utm_campaign="],
        meta: &[],
        content: &[r"limited time|sign up today|get started free|download (the|our|your) free"],
        selectors: &["form input[type='email']"],
        schema_types: &[],
    },
    DetectionSpec {
        category: CategoryType::Navigation,
        url: &[r"/(sitemap|categories|category|tags?|archive|archives)(/|\.|$)"],
        meta: &[],
        content: &[],
        selectors: &[],
        schema_types: &["CollectionPage", "ItemList", "SiteNavigationElement"],
    },
];

struct CompiledDetection {
    category: CategoryType,
    url: Vec<Regex>,
    meta: Vec<Regex>,
    content: Vec<Regex>,
    selectors: Vec<Selector>,
    schema_types: &'static [&'static str],
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("static regex"))
        .collect()
}

fn compiled() -> &'static [CompiledDetection] {
    static COMPILED: OnceLock<Vec<CompiledDetection>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        DETECTION_SPECS
            .iter()
            .map(|spec| CompiledDetection {
                category: spec.category,
                url: compile(spec.url),
                meta: compile(spec.meta),
                content: compile(spec.content),
                selectors: spec
                    .selectors
                    .iter()
                    .map(|css| Selector::parse(css).expect("static selector"))
                    .collect(),
                schema_types: spec.schema_types,
            })
            .collect()
    })
}

/// Inputs for the detection tier; `html` is re-parsed only for DOM checks.
pub struct DetectionInput<'a> {
    /// Path plus query.
    pub url_path: &'a str,
    pub meta_text: &'a str,
    pub content: &'a str,
    pub html: &'a str,
    pub schema_types: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub category: CategoryType,
    /// Share of the rule's pattern classes that matched, 0.0-1.0.
    pub score: f64,
    pub matched_classes: Vec<&'static str>,
}

/// Best-scoring detection rule, if any class of any rule matched.
pub fn detect(input: &DetectionInput) -> Option<Detection> {
    let document = Html::parse_document(input.html);
    let mut best: Option<Detection> = None;

    for rule in compiled() {
        let mut defined = 0usize;
        let mut matched = Vec::new();

        let mut check = |name: &'static str, defined_here: bool, hit: bool| {
            if defined_here {
                defined += 1;
                if hit {
                    matched.push(name);
                }
            }
        };
        check("url", !rule.url.is_empty(), rule.url.iter().any(|r| r.is_match(input.url_path)));
        check("meta", !rule.meta.is_empty(), rule.meta.iter().any(|r| r.is_match(input.meta_text)));
        check("content", !rule.content.is_empty(), rule.content.iter().any(|r| r.is_match(input.content)));
        check(
            "dom",
            !rule.selectors.is_empty(),
            rule.selectors.iter().any(|s| document.select(s).next().is_some()),
        );
        check(
            "schema",
            !rule.schema_types.is_empty(),
            input
                .schema_types
                .iter()
                .any(|t| rule.schema_types.iter().any(|s| s.eq_ignore_ascii_case(t))),
        );

        if defined == 0 || matched.is_empty() {
            continue;
        }
        let score = matched.len() as f64 / defined as f64;
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(Detection {
                category: rule.category,
                score,
                matched_classes: matched,
            });
        }
    }
    best
}
