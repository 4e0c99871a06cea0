//! Loading configuration from disk and feeding it to the engine.

use std::io::Write;

use aeo_scoring::config::ScoringConfig;
use aeo_scoring::domain::{Dimension, PageMetadata, ProjectContext};
use aeo_scoring::error::{ConfigError, ScoringError};
use aeo_scoring::ContentKpiEngine;

fn write_config(raw: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(raw.as_bytes()).unwrap();
    file
}

#[test]
fn partial_file_keeps_defaults() {
    let file = write_config(r#"{"category_weights": {"brand": 0.5}, "domain_analysis": {"cache_validity_hours": 6}}"#);
    let config = ScoringConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.category_weight(Dimension::Brand), 0.5);
    assert_eq!(config.category_weight(Dimension::Authority), 0.2);
    assert_eq!(config.domain_analysis.cache_validity_hours, 6);
    assert_eq!(config.domain_analysis.neutral_score, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn missing_and_malformed_files_are_errors() {
    let missing = ScoringConfig::from_json_file("/definitely/not/here.json");
    assert!(matches!(missing, Err(ConfigError::Io { .. })));

    let file = write_config("{ not json");
    assert!(ScoringConfig::from_json_file(file.path()).is_err());
}

#[test]
fn engine_refuses_invalid_severity_cut_points() {
    let raw = r#"{"severity": {"critical": 70, "high": 60, "medium": 80}}"#;
    let file = write_config(raw);
    assert!(matches!(ScoringConfig::from_json_file(file.path()), Err(ConfigError::Invalid { .. })));

    let config: ScoringConfig = serde_json::from_str(raw).unwrap();
    let result = ContentKpiEngine::builder().config(config).build();
    assert!(matches!(result, Err(ScoringError::Config(_))));
}

#[tokio::test]
async fn disabled_rules_drop_out_of_page_runs() {
    let file = write_config(r#"{"rules": {"technical.meta_tags": {"enabled": false}, "technical.indexability": {"enabled": false}}}"#);
    let config = ScoringConfig::from_json_file(file.path()).unwrap();
    let engine = ContentKpiEngine::builder().config(config).build().unwrap();

    let score = engine
        .evaluate_page(
            "https://example.com/misc",
            "<html><body><h1>Notes</h1><p>Some words.</p></body></html>",
            PageMetadata::default(),
            &ProjectContext::default(),
        )
        .await
        .unwrap();
    let technical = score.category(Dimension::Technical).unwrap();
    assert_eq!(technical.applied_rules, 0);
    assert_eq!(technical.score, 0);
}
