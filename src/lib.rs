//! Content-KPI / AEO scoring engine.
//!
//! Scores a web page (or a whole domain) for how well it is positioned to be
//! surfaced by answer engines. See [`application::ContentKpiEngine`] for the
//! entry point.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod repository;
pub mod service;
#[cfg(test)]
pub mod test_utils;

pub use application::{ContentKpiEngine, ContentKpiEngineBuilder};
pub use config::ScoringConfig;
pub use error::{Result, ScoringError};
