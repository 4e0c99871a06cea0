pub mod category;
pub mod models;
pub mod signals;

pub use category::{category_profile, AnalysisLevel, CategoryProfile, CategorySource, CategoryType, PageCategory};
pub use models::*;
pub use signals::*;
