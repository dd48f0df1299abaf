use crate::error::BackupError;

/// Value bound to a source table's filter column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceParam {
    /// The course being backed up.
    CourseId,
    /// The `id` of the nearest enclosing element that has a source.
    ParentId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    pub table: String,
    pub column: String,
    pub param: SourceParam,
}

/// Marks a field whose values reference another entity type, so restore can
/// remap them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAnnotation {
    pub item_name: String,
    pub field: String,
}

/// One node of a backup tree.
///
/// An element with a source is written once per fetched row; an element
/// without one is a grouping element written once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupElement {
    name: String,
    id_fields: Vec<String>,
    value_fields: Vec<String>,
    children: Vec<BackupElement>,
    source: Option<SourceTable>,
    annotations: Vec<IdAnnotation>,
}

impl BackupElement {
    pub fn new(name: &str, id_fields: &[&str], value_fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            id_fields: id_fields.iter().map(|f| f.to_string()).collect(),
            value_fields: value_fields.iter().map(|f| f.to_string()).collect(),
            children: Vec::new(),
            source: None,
            annotations: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, &[], &[])
    }

    pub fn with_child(mut self, child: BackupElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_source(mut self, table: &str, column: &str, param: SourceParam) -> Self {
        self.source = Some(SourceTable {
            table: table.to_string(),
            column: column.to_string(),
            param,
        });
        self
    }

    pub fn annotate_ids(mut self, item_name: &str, field: &str) -> Self {
        self.annotations.push(IdAnnotation {
            item_name: item_name.to_string(),
            field: field.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_fields(&self) -> &[String] {
        &self.id_fields
    }

    pub fn value_fields(&self) -> &[String] {
        &self.value_fields
    }

    pub fn children(&self) -> &[BackupElement] {
        &self.children
    }

    pub fn source(&self) -> Option<&SourceTable> {
        self.source.as_ref()
    }

    pub fn annotations(&self) -> &[IdAnnotation] {
        &self.annotations
    }

    /// Depth-first search by element name.
    pub fn find(&self, name: &str) -> Option<&BackupElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    pub fn validate(&self) -> Result<(), BackupError> {
        self.validate_within(false)
    }

    fn validate_within(&self, has_parent_row: bool) -> Result<(), BackupError> {
        let fields = || self.id_fields.iter().chain(self.value_fields.iter());

        for (i, field) in fields().enumerate() {
            if fields().skip(i + 1).any(|other| other == field) {
                return Err(BackupError::InvalidTree(format!(
                    "{}: duplicate field {field}",
                    self.name
                )));
            }
        }

        for annotation in &self.annotations {
            if !fields().any(|f| *f == annotation.field) {
                return Err(BackupError::InvalidTree(format!(
                    "{}: annotated field {} is not declared",
                    self.name, annotation.field
                )));
            }
        }

        match &self.source {
            Some(source) if source.param == SourceParam::ParentId && !has_parent_row => {
                return Err(BackupError::InvalidTree(format!(
                    "{}: parent id source without a parent row",
                    self.name
                )));
            }
            None if !self.id_fields.is_empty() || !self.value_fields.is_empty() => {
                return Err(BackupError::InvalidTree(format!(
                    "{}: fields declared without a source",
                    self.name
                )));
            }
            _ => {}
        }

        let has_row = has_parent_row || self.source.is_some();
        for child in &self.children {
            child.validate_within(has_row)?;
        }
        Ok(())
    }
}
