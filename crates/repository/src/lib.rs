pub mod reconcile;

pub use reconcile::{ReconcileOutcome, reconcile};

use std::collections::BTreeMap;

use tracing::debug;

use flexpage_core::{
    CompletionCondition, Condition, CourseId, FeatureFlags, GradeCondition, Page, PageId,
};
use flexpage_storage::{ConditionScope, ConditionStore, StorageError};

pub type PageConditions = BTreeMap<PageId, Vec<Condition>>;

/// Reads and writes the access conditions of course pages.
pub struct ConditionRepository<S, F> {
    store: S,
    flags: F,
}

impl<S, F> ConditionRepository<S, F>
where
    S: ConditionStore,
    F: FeatureFlags,
{
    pub fn new(store: S, flags: F) -> Self {
        Self { store, flags }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn flags(&self) -> &F {
        &self.flags
    }

    pub fn into_parts(self) -> (S, F) {
        (self.store, self.flags)
    }

    /// Every condition of every page in the course, grouped by page.
    pub fn get_course_conditions(&self, course_id: CourseId) -> Result<PageConditions, StorageError> {
        self.get_conditions(course_id, ConditionScope::Course(course_id))
    }

    pub fn get_page_conditions(&self, page: &Page) -> Result<Vec<Condition>, StorageError> {
        let mut conditions =
            self.get_conditions(page.course_id(), ConditionScope::Page(page.id()))?;
        Ok(conditions.remove(&page.id()).unwrap_or_default())
    }

    pub fn set_page_conditions(&self, page: &mut Page) -> Result<(), StorageError> {
        let conditions = self.get_page_conditions(page)?;
        page.set_conditions(conditions);
        Ok(())
    }

    /// Delete the page's stored conditions and clear its list.
    pub fn remove_page_conditions(&mut self, page: &mut Page) -> Result<(), StorageError> {
        let page_id = page.id();
        self.store.atomically(|store| {
            store.delete_conditions_except::<GradeCondition>(page_id, &[])?;
            store.delete_conditions_except::<CompletionCondition>(page_id, &[])?;
            Ok::<_, StorageError>(())
        })?;
        page.set_conditions(Vec::new());
        Ok(())
    }

    /// Replace the stored conditions of `page` with `conditions`.
    pub fn save_page_conditions(
        &mut self,
        page: &Page,
        conditions: &[Condition],
    ) -> Result<&mut Self, StorageError> {
        let (grade, completion) = Condition::partition(conditions);
        let page_id = page.id();
        self.store.atomically(|store| {
            reconcile(store, page_id, &grade)?;
            reconcile(store, page_id, &completion)?;
            Ok::<_, StorageError>(())
        })?;
        Ok(self)
    }

    pub fn save_page_grade_conditions(
        &mut self,
        page: &Page,
        conditions: &[GradeCondition],
    ) -> Result<&mut Self, StorageError> {
        reconcile(&mut self.store, page.id(), conditions)?;
        Ok(self)
    }

    pub fn save_page_completion_conditions(
        &mut self,
        page: &Page,
        conditions: &[CompletionCondition],
    ) -> Result<&mut Self, StorageError> {
        reconcile(&mut self.store, page.id(), conditions)?;
        Ok(self)
    }

    fn get_conditions(
        &self,
        course_id: CourseId,
        scope: ConditionScope,
    ) -> Result<PageConditions, StorageError> {
        let mut conditions = group_by_page(self.get_grade_conditions(scope)?);

        for (page_id, others) in group_by_page(self.get_completion_conditions(course_id, scope)?) {
            conditions.entry(page_id).or_default().extend(others);
        }
        Ok(conditions)
    }

    fn get_grade_conditions(&self, scope: ConditionScope) -> Result<Vec<Condition>, StorageError> {
        if !self.flags.availability_enabled() {
            debug!(?scope, "availability disabled, skipping grade conditions");
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .grade_conditions(scope)?
            .into_iter()
            .map(Condition::Grade)
            .collect())
    }

    fn get_completion_conditions(
        &self,
        course_id: CourseId,
        scope: ConditionScope,
    ) -> Result<Vec<Condition>, StorageError> {
        let course = self
            .store
            .get_course(course_id)?
            .ok_or_else(|| StorageError::NotFound(format!("course {course_id}")))?;
        if !self.flags.completion_enabled(&course) {
            debug!(course = %course_id, "completion disabled, skipping completion conditions");
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .completion_conditions(scope)?
            .into_iter()
            .map(Condition::Completion)
            .collect())
    }
}

fn group_by_page(conditions: Vec<Condition>) -> PageConditions {
    let mut grouped = PageConditions::new();
    for condition in conditions {
        if let Some(page_id) = condition.page_id() {
            grouped.entry(page_id).or_default().push(condition);
        }
    }
    grouped
}
