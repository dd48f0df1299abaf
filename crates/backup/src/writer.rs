use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use flexpage_core::{CourseId, FieldValue};
use flexpage_storage::{Row, RowSource};

use crate::element::{BackupElement, SourceParam};
use crate::error::BackupError;

/// Written in place of a null column value.
pub const NULL_MARKER: &str = "$@NULL@$";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Rows written per element name.
    pub rows: BTreeMap<String, usize>,
    /// Annotated ids per item name.
    pub annotations: BTreeMap<String, BTreeSet<i64>>,
    /// blake3 hex digest of the document.
    pub checksum: String,
    pub bytes: usize,
}

impl BackupReport {
    pub fn row_count(&self, element: &str) -> usize {
        self.rows.get(element).copied().unwrap_or(0)
    }

    pub fn annotated(&self, item_name: &str) -> Vec<i64> {
        self.annotations
            .get(item_name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Walks a backup tree for one course and writes it as XML.
pub struct BackupWriter<'a, R> {
    source: &'a R,
    course_id: CourseId,
}

impl<'a, R: RowSource> BackupWriter<'a, R> {
    pub fn new(source: &'a R, course_id: CourseId) -> Self {
        Self { source, course_id }
    }

    pub fn write<W: Write>(
        &self,
        root: &BackupElement,
        mut out: W,
    ) -> Result<BackupReport, BackupError> {
        root.validate()?;

        let mut report = BackupReport::default();
        let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_element(&mut xml, root, None, &mut report)?;

        let document = xml.into_inner();
        report.checksum = blake3::hash(&document).to_hex().to_string();
        report.bytes = document.len();

        out.write_all(&document)?;
        out.flush()?;
        Ok(report)
    }

    fn write_element(
        &self,
        xml: &mut Writer<Vec<u8>>,
        element: &BackupElement,
        parent_id: Option<i64>,
        report: &mut BackupReport,
    ) -> Result<(), BackupError> {
        let Some(source) = element.source() else {
            xml.write_event(Event::Start(BytesStart::new(element.name())))?;
            for child in element.children() {
                self.write_element(xml, child, parent_id, report)?;
            }
            xml.write_event(Event::End(BytesEnd::new(element.name())))?;
            return Ok(());
        };

        let value = match source.param {
            SourceParam::CourseId => self.course_id.get(),
            SourceParam::ParentId => parent_id.ok_or_else(|| {
                BackupError::InvalidTree(format!("{}: no parent row", element.name()))
            })?,
        };

        for row in self.source.fetch_rows(&source.table, &source.column, value)? {
            self.write_row(xml, element, &row, report)?;
        }
        Ok(())
    }

    fn write_row(
        &self,
        xml: &mut Writer<Vec<u8>>,
        element: &BackupElement,
        row: &Row,
        report: &mut BackupReport,
    ) -> Result<(), BackupError> {
        let mut start = BytesStart::new(element.name());
        for field in element.id_fields() {
            let text = render(column(element, row, field)?);
            start.push_attribute((field.as_str(), text.as_str()));
        }
        xml.write_event(Event::Start(start))?;

        for field in element.value_fields() {
            let text = render(column(element, row, field)?);
            xml.write_event(Event::Start(BytesStart::new(field.as_str())))?;
            xml.write_event(Event::Text(BytesText::new(&text)))?;
            xml.write_event(Event::End(BytesEnd::new(field.as_str())))?;
        }

        for annotation in element.annotations() {
            if let Some(id) = column(element, row, &annotation.field)?.as_integer() {
                report
                    .annotations
                    .entry(annotation.item_name.clone())
                    .or_default()
                    .insert(id);
            }
        }

        let row_id = column(element, row, "id")?.as_integer();
        for child in element.children() {
            self.write_element(xml, child, row_id, report)?;
        }

        xml.write_event(Event::End(BytesEnd::new(element.name())))?;
        *report.rows.entry(element.name().to_string()).or_default() += 1;
        Ok(())
    }
}

fn column<'r>(
    element: &BackupElement,
    row: &'r Row,
    field: &str,
) -> Result<&'r FieldValue, BackupError> {
    row.iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value)
        .ok_or_else(|| BackupError::InvalidTree(format!("{}: row has no column {field}", element.name())))
}

fn render(value: &FieldValue) -> String {
    value.render().unwrap_or_else(|| NULL_MARKER.to_string())
}
