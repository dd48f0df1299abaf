use crate::condition::Condition;
use crate::ids::{CourseId, PageId};

/// A course page. Only the parts the condition repository touches are
/// modelled here.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    id: PageId,
    course_id: CourseId,
    name: String,
    conditions: Vec<Condition>,
}

impl Page {
    pub fn new(id: PageId, course_id: CourseId, name: impl Into<String>) -> Self {
        Self {
            id,
            course_id,
            name: name.into(),
            conditions: Vec::new(),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.conditions = conditions;
    }
}
