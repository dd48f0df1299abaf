use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ConditionId, CourseModuleId, GradeItemId, PageId};

/// Completion state a course module must reach for a page to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionState {
    Incomplete,
    Complete,
    CompletePass,
    CompleteFail,
}

impl CompletionState {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Incomplete => 0,
            Self::Complete => 1,
            Self::CompletePass => 2,
            Self::CompleteFail => 3,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Incomplete),
            1 => Ok(Self::Complete),
            2 => Ok(Self::CompletePass),
            3 => Ok(Self::CompleteFail),
            other => Err(CoreError::UnknownCompletionState(other)),
        }
    }
}

/// Page is available while the user's grade on an item lies within bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeCondition {
    pub id: Option<ConditionId>,
    pub page_id: Option<PageId>,
    pub grade_item_id: GradeItemId,
    /// Inclusive lower bound; `None` means unbounded.
    pub min: Option<f64>,
    /// Exclusive upper bound; `None` means unbounded.
    pub max: Option<f64>,
}

impl GradeCondition {
    pub fn new(grade_item_id: GradeItemId, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            id: None,
            page_id: None,
            grade_item_id,
            min,
            max,
        }
    }

    /// Bounds must be finite; SQLite stores NaN as NULL.
    pub fn check_bounds(&self) -> Result<(), CoreError> {
        for (name, bound) in [("grademin", self.min), ("grademax", self.max)] {
            if let Some(value) = bound.filter(|v| !v.is_finite()) {
                return Err(CoreError::InvalidData(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Page is available once a course module reaches a completion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCondition {
    pub id: Option<ConditionId>,
    pub page_id: Option<PageId>,
    pub cm_id: CourseModuleId,
    pub required: CompletionState,
}

impl CompletionCondition {
    pub fn new(cm_id: CourseModuleId, required: CompletionState) -> Self {
        Self {
            id: None,
            page_id: None,
            cm_id,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Grade(GradeCondition),
    Completion(CompletionCondition),
}

impl Condition {
    pub fn id(&self) -> Option<ConditionId> {
        match self {
            Self::Grade(c) => c.id,
            Self::Completion(c) => c.id,
        }
    }

    pub fn page_id(&self) -> Option<PageId> {
        match self {
            Self::Grade(c) => c.page_id,
            Self::Completion(c) => c.page_id,
        }
    }

    pub fn as_grade(&self) -> Option<&GradeCondition> {
        match self {
            Self::Grade(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_completion(&self) -> Option<&CompletionCondition> {
        match self {
            Self::Completion(c) => Some(c),
            _ => None,
        }
    }

    /// Split a mixed list by variant. Relative order within each variant is
    /// kept.
    pub fn partition(
        conditions: &[Condition],
    ) -> (Vec<GradeCondition>, Vec<CompletionCondition>) {
        let mut grade = Vec::new();
        let mut completion = Vec::new();
        for condition in conditions {
            match condition {
                Self::Grade(c) => grade.push(c.clone()),
                Self::Completion(c) => completion.push(c.clone()),
            }
        }
        (grade, completion)
    }
}

impl From<GradeCondition> for Condition {
    fn from(condition: GradeCondition) -> Self {
        Self::Grade(condition)
    }
}

impl From<CompletionCondition> for Condition {
    fn from(condition: CompletionCondition) -> Self {
        Self::Completion(condition)
    }
}
