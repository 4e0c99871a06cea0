use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::ContentLimits;
use crate::domain::{
    AuthoritySignals, ContentSignals, FreshnessSignals, HeadingEntry, PageMetadata, PageSignals,
    StructureSignals, TechnicalSignals,
};
use crate::extractor::dates::newest_rfc3339;
use crate::extractor::text::{
    average_sentence_length, collapse_whitespace, count_words, dedup_capped, split_sentences,
    strip_markup, truncate_chars,
};

/// Elements whose text is never visible content.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Page chrome skipped when falling back to the whole body.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "form",
];

const MAIN_CONTENT_CANDIDATES: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".main-content",
];

const AUTHOR_SELECTORS: &str =
    "[rel='author'], [itemprop='author'], .author, .author-name, .byline";

const PUBLISHED_META: &str = "meta[property='article:published_time'], meta[name='date'], \
     meta[itemprop='datePublished'], meta[name='dcterms.created']";

const MODIFIED_META: &str = "meta[property='article:modified_time'], meta[property='og:updated_time'], \
     meta[name='last-modified'], meta[itemprop='dateModified'], meta[name='dcterms.modified']";

const ARTICLE_FIELDS: &[&str] = &["headline", "datePublished", "author", "publisher"];

const MAX_HEADINGS: usize = 200;
const MAX_PARAGRAPHS: usize = 500;
const MAX_JSON_LD_DEPTH: usize = 8;

fn selector(cell: &'static OnceLock<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("static selector"))
}

macro_rules! static_selector {
    ($css:expr) => {{
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        selector(&SELECTOR, $css)
    }};
}

/// Parses raw HTML into a `PageSignals` bundle. Pure: no I/O, never fails.
#[derive(Debug, Clone, Default)]
pub struct SignalExtractor {
    limits: ContentLimits,
}

impl SignalExtractor {
    pub fn new(limits: ContentLimits) -> Self {
        Self { limits }
    }

    /// Extract every signal. On a parser panic an empty bundle is returned.
    pub fn extract(&self, html: &str, metadata: &PageMetadata, page_url: &str) -> PageSignals {
        match catch_unwind(AssertUnwindSafe(|| self.extract_document(html, metadata, page_url))) {
            Ok(signals) => signals,
            Err(_) => {
                tracing::warn!("Signal extraction failed for {}, using empty signals", page_url);
                PageSignals::default()
            }
        }
    }

    /// Boilerplate-stripped, length-capped visible text for prompts.
    pub fn clean_content(&self, html: &str) -> String {
        catch_unwind(AssertUnwindSafe(|| {
            let document = Html::parse_document(html);
            truncate_chars(&self.main_text(&document), self.limits.max_clean_content_chars)
        }))
        .unwrap_or_default()
    }

    fn extract_document(&self, html: &str, metadata: &PageMetadata, page_url: &str) -> PageSignals {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let json_ld = Self::json_ld_blocks(&document);

        PageSignals {
            content: self.content_signals(&document, metadata),
            structure: self.structure_signals(&document, &json_ld),
            authority: self.authority_signals(&document, &json_ld, base.as_ref()),
            freshness: self.freshness_signals(&document, &json_ld, metadata),
            technical: Self::technical_signals(&document),
        }
    }

    // ---------------------------------------------------------------------
    // Content
    // ---------------------------------------------------------------------

    fn content_signals(&self, document: &Html, metadata: &PageMetadata) -> ContentSignals {
        let title = Self::extract_title(document)
            .or_else(|| metadata.title.clone())
            .map(|t| truncate_chars(&strip_markup(&t), self.limits.max_heading_chars * 2));
        let meta_description = Self::extract_meta_description(document)
            .or_else(|| metadata.description.clone())
            .map(|d| strip_markup(&d));

        let main_text = self.main_text(document);
        let sentences = split_sentences(&main_text);

        let paragraph_word_counts = document
            .select(static_selector!("p"))
            .map(|p| count_words(&visible_text(p, HIDDEN_TAGS)))
            .filter(|&words| words > 0)
            .take(MAX_PARAGRAPHS)
            .collect();

        ContentSignals {
            title,
            meta_description,
            word_count: count_words(&main_text),
            sentence_count: sentences.len(),
            avg_sentence_length: average_sentence_length(&sentences),
            clean_text: truncate_chars(&main_text, self.limits.max_clean_content_chars),
            paragraph_word_counts,
        }
    }

    /// Text of the first main-content candidate with enough text, else the body minus chrome.
    fn main_text(&self, document: &Html) -> String {
        static CANDIDATES: OnceLock<Vec<Selector>> = OnceLock::new();
        let candidates = CANDIDATES.get_or_init(|| {
            MAIN_CONTENT_CANDIDATES
                .iter()
                .map(|css| Selector::parse(css).expect("static selector"))
                .collect()
        });

        for candidate in candidates {
            for element in document.select(candidate) {
                let text = visible_text(element, HIDDEN_TAGS);
                if text.chars().count() > self.limits.main_content_min_chars {
                    return text;
                }
            }
        }

        document
            .select(static_selector!("body"))
            .next()
            .map(|body| visible_text(body, BOILERPLATE_TAGS))
            .unwrap_or_default()
    }

    pub fn extract_title(html: &Html) -> Option<String> {
        html.select(static_selector!("title"))
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    }

    pub fn extract_meta_description(html: &Html) -> Option<String> {
        meta_content(html, static_selector!("meta[name='description']"))
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    fn structure_signals(&self, document: &Html, json_ld: &[serde_json::Value]) -> StructureSignals {
        let mut h1_count = 0;
        let mut headings = Vec::new();
        let mut questions = Vec::new();

        for element in document.select(static_selector!("h1, h2, h3, h4, h5, h6")) {
            let text = strip_markup(&visible_text(element, HIDDEN_TAGS));
            if text.is_empty() {
                continue;
            }
            let tag = element.value().name().to_string();
            if tag == "h1" {
                h1_count += 1;
            }
            if text.ends_with('?') {
                questions.push(text.clone());
            }
            if headings.len() < MAX_HEADINGS {
                headings.push(HeadingEntry {
                    tag,
                    text: truncate_chars(&text, self.limits.max_heading_chars),
                });
            }
        }

        let mut schema_types = Vec::new();
        let mut has_article_fields = false;
        for block in json_ld {
            walk_json_ld(block, 0, &mut |object| {
                match object.get("@type") {
                    Some(serde_json::Value::String(t)) => schema_types.push(t.clone()),
                    Some(serde_json::Value::Array(types)) => schema_types.extend(
                        types.iter().filter_map(|t| t.as_str()).map(str::to_string),
                    ),
                    _ => {}
                }
                if object.contains_key("@type")
                    && ARTICLE_FIELDS.iter().any(|field| object.contains_key(*field))
                {
                    has_article_fields = true;
                }
            });
        }
        for element in document.select(static_selector!("[itemtype]")) {
            if let Some(itemtype) = element.value().attr("itemtype") {
                if let Some(name) = itemtype.trim().trim_end_matches('/').rsplit('/').next() {
                    schema_types.push(name.to_string());
                }
            }
        }

        StructureSignals {
            h1_count,
            headings,
            list_count: document.select(static_selector!("ul, ol")).count(),
            list_item_count: document.select(static_selector!("li")).count(),
            table_count: document.select(static_selector!("table")).count(),
            question_headings: dedup_capped(questions, self.limits.max_list_items),
            schema_types: dedup_capped(schema_types, self.limits.max_list_items),
            schema_has_article_fields: has_article_fields,
        }
    }

    // ---------------------------------------------------------------------
    // Authority
    // ---------------------------------------------------------------------

    fn authority_signals(
        &self,
        document: &Html,
        json_ld: &[serde_json::Value],
        base: Option<&Url>,
    ) -> AuthoritySignals {
        let mut authors = Vec::new();
        if let Some(name) = meta_content(document, static_selector!("meta[name='author']")) {
            authors.push(name);
        }
        for element in document.select(static_selector!(AUTHOR_SELECTORS)) {
            let text = element
                .value()
                .attr("content")
                .map(str::to_string)
                .unwrap_or_else(|| visible_text(element, HIDDEN_TAGS));
            authors.push(truncate_chars(&text, self.limits.max_heading_chars));
        }
        for block in json_ld {
            walk_json_ld(block, 0, &mut |object| {
                if let Some(author) = object.get("author") {
                    collect_author_names(author, &mut authors);
                }
            });
        }

        let base_host = base.and_then(|b| b.host_str()).map(normalize_host);
        let mut outbound = Vec::new();
        let mut citations = Vec::new();

        for element in document.select(static_selector!("a[href]")) {
            let Some(href) = element.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
            {
                continue;
            }

            let resolved = match base {
                Some(base) => base.join(href).ok(),
                None => Url::parse(href).ok(),
            };
            let Some(link) = resolved else { continue };
            if !matches!(link.scheme(), "http" | "https") {
                continue;
            }
            let Some(host) = link.host_str().map(normalize_host) else {
                continue;
            };
            if base_host.as_deref() == Some(host.as_str()) {
                continue;
            }

            outbound.push(link.to_string());
            citations.push(format!("{}{}", host, link.path().trim_end_matches('/')));
        }

        AuthoritySignals {
            author_names: dedup_capped(authors, self.limits.max_list_items),
            outbound_links: dedup_capped(outbound, self.limits.max_list_items),
            citation_candidates: dedup_capped(citations, self.limits.max_list_items),
        }
    }

    // ---------------------------------------------------------------------
    // Freshness
    // ---------------------------------------------------------------------

    fn freshness_signals(
        &self,
        document: &Html,
        json_ld: &[serde_json::Value],
        metadata: &PageMetadata,
    ) -> FreshnessSignals {
        let mut published: Vec<String> = document
            .select(static_selector!(PUBLISHED_META))
            .filter_map(|el| el.value().attr("content").map(str::to_string))
            .collect();
        let mut modified: Vec<String> = document
            .select(static_selector!(MODIFIED_META))
            .filter_map(|el| el.value().attr("content").map(str::to_string))
            .collect();

        for element in document.select(static_selector!("time[datetime]")) {
            if let Some(value) = element.value().attr("datetime") {
                published.push(value.to_string());
            }
        }
        for block in json_ld {
            walk_json_ld(block, 0, &mut |object| {
                if let Some(value) = object.get("datePublished").and_then(|v| v.as_str()) {
                    published.push(value.to_string());
                }
                if let Some(value) = object.get("dateModified").and_then(|v| v.as_str()) {
                    modified.push(value.to_string());
                }
            });
        }
        if let Some(last_modified) = &metadata.last_modified {
            modified.push(last_modified.clone());
        }

        let published_iso = newest_rfc3339(published.iter().map(String::as_str));
        let modified_iso = newest_rfc3339(modified.iter().map(String::as_str));

        let raw_signals = dedup_capped(
            published.into_iter().chain(modified),
            self.limits.max_list_items,
        );

        FreshnessSignals {
            published: published_iso,
            modified: modified_iso,
            raw_signals,
        }
    }

    // ---------------------------------------------------------------------
    // Technical
    // ---------------------------------------------------------------------

    fn technical_signals(document: &Html) -> TechnicalSignals {
        let canonical = document
            .select(static_selector!("link[rel='canonical']"))
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let robots_noindex = document
            .select(static_selector!("meta[name='robots']"))
            .filter_map(|el| el.value().attr("content"))
            .any(|content| content.to_ascii_lowercase().contains("noindex"));

        let lang = document
            .select(static_selector!("html"))
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut image_count = 0;
        let mut images_without_alt = 0;
        for img in document.select(static_selector!("img")) {
            image_count += 1;
            if img.value().attr("alt").is_none() {
                images_without_alt += 1;
            }
        }

        TechnicalSignals {
            canonical,
            has_viewport: document
                .select(static_selector!("meta[name='viewport']"))
                .next()
                .is_some(),
            lang,
            robots_noindex,
            image_count,
            images_without_alt,
        }
    }

    // ---------------------------------------------------------------------
    // JSON-LD
    // ---------------------------------------------------------------------

    /// Parsed `application/ld+json` blocks; malformed blocks are skipped.
    fn json_ld_blocks(document: &Html) -> Vec<serde_json::Value> {
        document
            .select(static_selector!("script[type='application/ld+json']"))
            .filter_map(|el| {
                let raw = el.text().collect::<String>();
                match serde_json::from_str::<serde_json::Value>(raw.trim()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::debug!("Skipping malformed JSON-LD block: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

fn meta_content(html: &Html, selector: &Selector) -> Option<String> {
    html.select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Concatenated text of `element`, skipping text under any of `skip`.
fn visible_text(element: ElementRef, skip: &[&str]) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| skip.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

pub(crate) fn normalize_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Visit every JSON object, depth-first, bounded by `MAX_JSON_LD_DEPTH`.
fn walk_json_ld<F>(value: &serde_json::Value, depth: usize, visit: &mut F)
where
    F: FnMut(&serde_json::Map<String, serde_json::Value>),
{
    if depth > MAX_JSON_LD_DEPTH {
        return;
    }
    match value {
        serde_json::Value::Object(object) => {
            visit(object);
            for child in object.values() {
                walk_json_ld(child, depth + 1, visit);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                walk_json_ld(item, depth + 1, visit);
            }
        }
        _ => {}
    }
}

fn collect_author_names(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(name) => out.push(name.clone()),
        serde_json::Value::Object(object) => {
            if let Some(name) = object.get("name").and_then(|n| n.as_str()) {
                out.push(name.to_string());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_author_names(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::html;

    fn extract(doc: &str) -> PageSignals {
        SignalExtractor::default().extract(doc, &PageMetadata::default(), "https://example.com/blog/post")
    }

    #[test]
    fn empty_html_yields_empty_but_valid_signals() {
        let signals = extract("");
        assert_eq!(signals.content.word_count, 0);
        assert_eq!(signals.structure.h1_count, 0);
        assert!(signals.authority.author_names.is_empty());
        assert!(signals.freshness.modified.is_none());
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let signals = extract("<html><body><h1>Title<p>unclosed <div><<<>>> </b></i>");
        assert_eq!(signals.structure.h1_count, 1);
    }

    #[test]
    fn headings_are_recorded_in_document_order() {
        let signals = extract(html::BLOG_POST);
        let tags: Vec<&str> = signals.structure.headings.iter().map(|h| h.tag.as_str()).collect();
        assert_eq!(tags, vec!["h1", "h2", "h3", "h2", "h3"]);
        assert_eq!(signals.structure.h1_count, 1);
        assert_eq!(signals.heading_levels(), vec![1, 2, 3, 2, 3]);
    }

    #[test]
    fn script_and_style_text_never_reaches_signals() {
        let doc = r#"<html><body><main><p>Visible words here.</p>
            <script>var secret = "<b>x</b>";</script><style>.a{}</style></main></body></html>"#;
        let signals = extract(doc);
        assert!(!signals.content.clean_text.contains("secret"));
        assert!(!signals.content.clean_text.contains('<'));
        assert!(signals.content.clean_text.contains("Visible words here."));
    }

    #[test]
    fn main_content_falls_back_to_body_without_chrome() {
        let doc = r#"<html><body><nav>Home About Pricing</nav><main>short</main>
            <div><p>Body paragraph text.</p></div><footer>Copyright</footer></body></html>"#;
        let text = SignalExtractor::default().clean_content(doc);
        assert!(text.contains("Body paragraph text."));
        assert!(text.contains("short"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Pricing"));
    }

    #[test]
    fn main_candidate_used_when_long_enough() {
        let long = "word ".repeat(60);
        let doc = format!(
            "<html><body><nav>Menu</nav><article><p>{long}</p></article><aside>Ads</aside></body></html>"
        );
        let text = SignalExtractor::default().clean_content(&doc);
        assert!(!text.contains("Menu"));
        assert!(!text.contains("Ads"));
        assert_eq!(count_words(&text), 60);
    }

    #[test]
    fn clean_content_is_capped() {
        let long = "abcdefghij ".repeat(2000);
        let doc = format!("<html><body><main>{long}</main></body></html>");
        let limits = ContentLimits { max_clean_content_chars: 100, ..Default::default() };
        let text = SignalExtractor::new(limits).clean_content(&doc);
        assert_eq!(text.chars().count(), 100);
    }

    #[test]
    fn schema_types_and_article_fields_from_json_ld() {
        let signals = extract(html::BLOG_POST);
        assert!(signals.structure.schema_types.contains(&"BlogPosting".to_string()));
        assert!(signals.structure.schema_has_article_fields);
    }

    #[test]
    fn graph_and_array_types_are_collected() {
        let doc = r#"<html><head><script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[{"@type":["WebPage","FAQPage"]},{"@type":"Organization","name":"Acme"}]}
            </script><script type="application/ld+json">{ not json</script></head><body></body></html>"#;
        let signals = extract(doc);
        assert_eq!(signals.structure.schema_types, vec!["WebPage", "FAQPage", "Organization"]);
        assert!(!signals.structure.schema_has_article_fields);
    }

    #[test]
    fn authors_are_deduplicated_across_sources() {
        let signals = extract(html::BLOG_POST);
        assert_eq!(signals.authority.author_names, vec!["Jane Doe, PhD".to_string()]);
    }

    #[test]
    fn citations_exclude_own_host_and_dedupe_by_path() {
        let doc = r#"<html><body>
            <a href="/internal">internal</a>
            <a href="https://www.example.com/other">same host with www</a>
            <a href="https://en.wikipedia.org/wiki/Rust?x=1">wiki</a>
            <a href="https://en.wikipedia.org/wiki/Rust#History">wiki again</a>
            <a href="https://data.gov/set">gov</a>
            <a href="mailto:a@b.c">mail</a>
            </body></html>"#;
        let signals = extract(doc);
        assert_eq!(
            signals.authority.citation_candidates,
            vec!["en.wikipedia.org/wiki/Rust", "data.gov/set"]
        );
        assert_eq!(signals.authority.outbound_links.len(), 3);
    }

    #[test]
    fn freshness_prefers_newest_modified_signal() {
        let meta = PageMetadata {
            last_modified: Some("Mon, 01 Jan 2024 00:00:00 GMT".into()),
            ..Default::default()
        };
        let signals = SignalExtractor::default().extract(html::BLOG_POST, &meta, "https://example.com/blog/post");
        assert!(signals.freshness.published.as_deref().unwrap().starts_with("2024-05-01"));
        assert!(signals.freshness.modified.as_deref().unwrap().starts_with("2024-06-15"));
        assert!(signals.freshness.raw_signals.len() >= 3);
    }

    #[test]
    fn technical_signals() {
        let signals = extract(html::BLOG_POST);
        assert_eq!(signals.technical.lang.as_deref(), Some("en"));
        assert!(signals.technical.has_viewport);
        assert_eq!(signals.technical.canonical.as_deref(), Some("https://example.com/blog/post"));
        assert_eq!(signals.technical.image_count, 2);
        assert_eq!(signals.technical.images_without_alt, 1);
        assert!(!signals.technical.robots_noindex);
    }

    #[test]
    fn question_headings_and_lists() {
        let signals = extract(html::FAQ_PAGE);
        assert_eq!(signals.structure.question_headings.len(), 3);
        assert_eq!(signals.structure.list_count, 1);
        assert_eq!(signals.structure.table_count, 1);
    }
}
