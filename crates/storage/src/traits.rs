use flexpage_core::{
    CompletionCondition, CompletionState, ConditionId, CoreError, CourseId, CourseModuleId,
    CourseRecord, FieldValue, GradeCondition, GradeItemId, PageId,
};

use crate::error::StorageError;

/// Which pages a condition query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionScope {
    Course(CourseId),
    Page(PageId),
}

/// A stored row as ordered `(column, value)` pairs.
pub type Row = Vec<(String, FieldValue)>;

/// Maps a condition variant onto its table. The natural key column together
/// with `pageid` identifies a row for upserts.
pub trait ConditionRow {
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;

    fn natural_key(&self) -> i64;

    /// Value columns other than `id` and `pageid`.
    fn values(&self) -> Vec<(&'static str, FieldValue)>;

    /// Rejects values that would not read back as written.
    fn check(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

impl ConditionRow for GradeCondition {
    const TABLE: &'static str = "format_flexpage_grade";
    const KEY_COLUMN: &'static str = "gradeitemid";

    fn natural_key(&self) -> i64 {
        self.grade_item_id.get()
    }

    fn values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("gradeitemid", FieldValue::Integer(self.grade_item_id.get())),
            ("grademin", self.min.into()),
            ("grademax", self.max.into()),
        ]
    }

    fn check(&self) -> Result<(), CoreError> {
        self.check_bounds()
    }
}

impl ConditionRow for CompletionCondition {
    const TABLE: &'static str = "format_flexpage_completion";
    const KEY_COLUMN: &'static str = "cmid";

    fn natural_key(&self) -> i64 {
        self.cm_id.get()
    }

    fn values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("cmid", FieldValue::Integer(self.cm_id.get())),
            ("requiredcompletion", FieldValue::Integer(self.required.as_i64())),
        ]
    }
}

/// Keyed CRUD and filtered reads over the condition tables.
pub trait ConditionStore {
    fn get_course(&self, course_id: CourseId) -> Result<Option<CourseRecord>, StorageError>;

    /// Grade conditions in scope whose grade item still exists, ordered by
    /// condition id.
    fn grade_conditions(&self, scope: ConditionScope) -> Result<Vec<GradeCondition>, StorageError>;

    /// Completion conditions in scope whose course module still exists,
    /// ordered by condition id.
    fn completion_conditions(
        &self,
        scope: ConditionScope,
    ) -> Result<Vec<CompletionCondition>, StorageError>;

    fn find_condition_id<C: ConditionRow>(
        &self,
        page_id: PageId,
        natural_key: i64,
    ) -> Result<Option<ConditionId>, StorageError>;

    fn insert_condition<C: ConditionRow>(
        &mut self,
        page_id: PageId,
        condition: &C,
    ) -> Result<ConditionId, StorageError>;

    fn update_condition<C: ConditionRow>(
        &mut self,
        id: ConditionId,
        page_id: PageId,
        condition: &C,
    ) -> Result<(), StorageError>;

    /// Delete rows of `page_id` whose id is not in `keep`. An empty `keep`
    /// deletes every row of the page. Returns the number of rows removed.
    fn delete_conditions_except<C: ConditionRow>(
        &mut self,
        page_id: PageId,
        keep: &[ConditionId],
    ) -> Result<usize, StorageError>;

    /// Run `f` as one atomic unit. Scopes may nest; an error from `f` undoes
    /// everything `f` wrote.
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StorageError>;
}

/// Rows for a `table.column = value` filter, ordered by `id`.
pub trait RowSource {
    fn fetch_rows(&self, table: &str, column: &str, value: i64) -> Result<Vec<Row>, StorageError>;
}

pub(crate) fn grade_condition_from_parts(
    id: i64,
    page_id: i64,
    grade_item_id: i64,
    min: Option<f64>,
    max: Option<f64>,
) -> GradeCondition {
    GradeCondition {
        id: Some(ConditionId::new(id)),
        page_id: Some(PageId::new(page_id)),
        grade_item_id: GradeItemId::new(grade_item_id),
        min,
        max,
    }
}

pub(crate) fn completion_condition_from_parts(
    id: i64,
    page_id: i64,
    cm_id: i64,
    required: i64,
) -> Result<CompletionCondition, StorageError> {
    Ok(CompletionCondition {
        id: Some(ConditionId::new(id)),
        page_id: Some(PageId::new(page_id)),
        cm_id: CourseModuleId::new(cm_id),
        required: CompletionState::from_i64(required)?,
    })
}
