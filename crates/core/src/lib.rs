pub mod condition;
pub mod course;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod page;

pub use condition::{CompletionCondition, CompletionState, Condition, GradeCondition};
pub use course::{CourseRecord, FLEXPAGE_FORMAT, FeatureFlags, SiteConfig};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use page::Page;
