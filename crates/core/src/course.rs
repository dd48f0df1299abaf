use serde::{Deserialize, Serialize};

use crate::ids::CourseId;

pub const FLEXPAGE_FORMAT: &str = "flexpage";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: CourseId,
    pub short_name: String,
    pub format: String,
    pub enable_completion: bool,
}

impl CourseRecord {
    pub fn is_flexpage(&self) -> bool {
        self.format == FLEXPAGE_FORMAT
    }
}

/// Switches that decide whether a condition variant is in effect at all.
pub trait FeatureFlags {
    /// Site-wide switch for conditional availability (grade conditions).
    fn availability_enabled(&self) -> bool;

    /// Whether completion tracking is on for `course`.
    fn completion_enabled(&self, course: &CourseRecord) -> bool;
}

/// Site level settings. Missing settings are off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub enable_availability: bool,
    pub enable_completion: bool,
}

impl SiteConfig {
    pub fn all_enabled() -> Self {
        Self {
            enable_availability: true,
            enable_completion: true,
        }
    }
}

impl FeatureFlags for SiteConfig {
    fn availability_enabled(&self) -> bool {
        self.enable_availability
    }

    fn completion_enabled(&self, course: &CourseRecord) -> bool {
        self.enable_completion && course.enable_completion
    }
}
