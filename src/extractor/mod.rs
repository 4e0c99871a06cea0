//! HTML -> `PageSignals`. Everything here is synchronous and free of I/O.

pub mod dates;
pub mod hierarchy;
pub mod page_extractor;
pub mod text;

pub use hierarchy::{validate_heading_hierarchy, HierarchyReport, HierarchyViolation};
pub use page_extractor::SignalExtractor;
pub use text::{contains_term, split_sentences, strip_markup, truncate_chars};
