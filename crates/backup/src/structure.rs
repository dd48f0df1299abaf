use crate::element::{BackupElement, SourceParam};

pub const PLUGIN_ELEMENT: &str = "plugin_format_flexpage_course";

/// The flexpage tables as they nest under a course backup.
pub fn flexpage_course_structure() -> BackupElement {
    let region = BackupElement::new("region", &["id"], &["region", "width"]).with_source(
        "format_flexpage_region",
        "pageid",
        SourceParam::ParentId,
    );

    let completion = BackupElement::new("completion", &["id"], &["cmid", "requiredcompletion"])
        .with_source("format_flexpage_completion", "pageid", SourceParam::ParentId);

    let grade = BackupElement::new("grade", &["id"], &["gradeitemid", "grademin", "grademax"])
        .with_source("format_flexpage_grade", "pageid", SourceParam::ParentId)
        .annotate_ids("grade_item", "gradeitemid");

    let page = BackupElement::new(
        "page",
        &["id"],
        &[
            "name",
            "display",
            "navigation",
            "availablefrom",
            "availableuntil",
            "releasecode",
            "showavailability",
            "parentid",
            "weight",
        ],
    )
    .with_source("format_flexpage_page", "courseid", SourceParam::CourseId)
    .with_child(BackupElement::group("regions").with_child(region))
    .with_child(BackupElement::group("completions").with_child(completion))
    .with_child(BackupElement::group("grades").with_child(grade));

    let config = BackupElement::new("config", &["id"], &["name", "value"]).with_source(
        "block_flexpagenav_config",
        "linkid",
        SourceParam::ParentId,
    );

    let link = BackupElement::new("link", &["id"], &["type", "weight"])
        .with_source("block_flexpagenav_link", "menuid", SourceParam::ParentId)
        .with_child(BackupElement::group("configs").with_child(config));

    let menu = BackupElement::new("menu", &["id"], &["name", "render", "displayname", "useastab"])
        .with_source("block_flexpagenav_menu", "courseid", SourceParam::CourseId)
        .with_child(BackupElement::group("links").with_child(link));

    BackupElement::group(PLUGIN_ELEMENT)
        .with_child(BackupElement::group("pages").with_child(page))
        .with_child(BackupElement::group("menus").with_child(menu))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_is_valid() {
        assert!(flexpage_course_structure().validate().is_ok());
    }

    #[test]
    fn conditions_hang_off_pages() {
        let tree = flexpage_course_structure();
        let page = tree.find("page").unwrap();
        let names: Vec<&str> = page.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["regions", "completions", "grades"]);

        let grade = page.find("grade").unwrap();
        let source = grade.source().unwrap();
        assert_eq!(source.table, "format_flexpage_grade");
        assert_eq!(source.param, SourceParam::ParentId);
        assert_eq!(grade.annotations()[0].item_name, "grade_item");
        assert_eq!(grade.annotations()[0].field, "gradeitemid");
    }

    #[test]
    fn menus_follow_pages() {
        let tree = flexpage_course_structure();
        let names: Vec<&str> = tree.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["pages", "menus"]);
        let config = tree.find("config").unwrap();
        assert_eq!(config.source().unwrap().column, "linkid");
    }
}
