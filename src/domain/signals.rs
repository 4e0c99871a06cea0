//! Page inputs and the normalized signal bundle derived from them.

use serde::{Deserialize, Serialize};

/// Metadata delivered by the crawler alongside the raw HTML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Value of the HTTP `Last-Modified` header or the crawler's own timestamp.
    pub last_modified: Option<String>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
}

/// One already-fetched page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub html: String,
    #[serde(default)]
    pub metadata: PageMetadata,
}

impl PageContent {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            metadata: PageMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: PageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Project-level brand context supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub brand_name: Option<String>,
    pub key_attributes: Vec<String>,
    pub keywords: Vec<String>,
    pub competitors: Vec<String>,
}

impl ProjectContext {
    pub fn brand(name: impl Into<String>) -> Self {
        Self {
            brand_name: Some(name.into()),
            ..Default::default()
        }
    }
}

// ====== Signal bundle ======

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSignals {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub clean_text: String,
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub paragraph_word_counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingEntry {
    pub tag: String,
    pub text: String,
}

impl HeadingEntry {
    /// Numeric level parsed from the tag (`h3` -> 3).
    pub fn level(&self) -> Option<u8> {
        self.tag
            .strip_prefix('h')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=6).contains(n))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSignals {
    pub h1_count: usize,
    pub headings: Vec<HeadingEntry>,
    pub list_count: usize,
    pub list_item_count: usize,
    pub table_count: usize,
    /// Headings phrased as questions (ending with `?`).
    pub question_headings: Vec<String>,
    pub schema_types: Vec<String>,
    /// Whether any JSON-LD object carries headline/datePublished/author/publisher.
    pub schema_has_article_fields: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthoritySignals {
    pub author_names: Vec<String>,
    pub outbound_links: Vec<String>,
    /// Outbound links to another hostname, deduplicated by host + path.
    pub citation_candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreshnessSignals {
    /// RFC 3339 timestamps.
    pub published: Option<String>,
    pub modified: Option<String>,
    pub raw_signals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignals {
    pub canonical: Option<String>,
    pub has_viewport: bool,
    pub lang: Option<String>,
    pub robots_noindex: bool,
    pub image_count: usize,
    pub images_without_alt: usize,
}

/// Immutable per (html, metadata) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSignals {
    pub content: ContentSignals,
    pub structure: StructureSignals,
    pub authority: AuthoritySignals,
    pub freshness: FreshnessSignals,
    pub technical: TechnicalSignals,
}

impl PageSignals {
    pub fn is_empty(&self) -> bool {
        self == &PageSignals::default()
    }

    pub fn heading_levels(&self) -> Vec<u8> {
        self.structure
            .headings
            .iter()
            .filter_map(HeadingEntry::level)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_level_parsing() {
        let h = HeadingEntry { tag: "h3".into(), text: "x".into() };
        assert_eq!(h.level(), Some(3));
        let bad = HeadingEntry { tag: "h9".into(), text: "x".into() };
        assert_eq!(bad.level(), None);
    }

    #[test]
    fn metadata_deserializes_with_missing_fields() {
        let meta: PageMetadata = serde_json::from_str(r#"{"last_modified":"2024-01-01"}"#).unwrap();
        assert_eq!(meta.last_modified.as_deref(), Some("2024-01-01"));
        assert!(meta.title.is_none());
    }
}
