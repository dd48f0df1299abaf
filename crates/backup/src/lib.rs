pub mod element;
pub mod error;
pub mod structure;
pub mod writer;

pub use element::{BackupElement, IdAnnotation, SourceParam, SourceTable};
pub use error::BackupError;
pub use structure::{PLUGIN_ELEMENT, flexpage_course_structure};
pub use writer::{BackupReport, BackupWriter, NULL_MARKER};

use std::io::Write;

use tracing::{debug, info};

use flexpage_core::CourseId;
use flexpage_storage::{ConditionStore, RowSource, StorageError};

/// Write the flexpage part of a course backup.
///
/// Returns `Ok(None)` without writing anything when the course does not use
/// the flexpage format.
pub fn backup_course<S, W>(
    store: &S,
    course_id: CourseId,
    out: W,
) -> Result<Option<BackupReport>, BackupError>
where
    S: ConditionStore + RowSource,
    W: Write,
{
    let course = store
        .get_course(course_id)?
        .ok_or_else(|| StorageError::NotFound(format!("course {course_id}")))?;
    if !course.is_flexpage() {
        debug!(course = %course_id, format = %course.format, "not a flexpage course, nothing to back up");
        return Ok(None);
    }

    let report = BackupWriter::new(store, course_id).write(&flexpage_course_structure(), out)?;
    info!(
        course = %course_id,
        pages = report.row_count("page"),
        menus = report.row_count("menu"),
        checksum = %report.checksum,
        "wrote flexpage course backup"
    );
    Ok(Some(report))
}
