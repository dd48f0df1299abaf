use flexpage_backup::{
    BackupElement, BackupError, BackupWriter, NULL_MARKER, SourceParam, backup_course,
    flexpage_course_structure,
};
use flexpage_core::{
    CompletionCondition, CompletionState, Condition, CourseId, CourseModuleId, GradeCondition,
    GradeItemId,
};
use flexpage_harness::TestSite;
use flexpage_storage::StorageError;

/// Course with two pages, conditions on the first, and a menu with one link.
fn populated_site() -> Result<(TestSite, CourseId), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let course = site.create_flexpage_course("C1")?;
    let home = site.create_page_with_id(course, 1, "Home & Intro")?;
    let week = site.create_page_with_id(course, 2, "Week 1")?;
    site.create_region(home.id(), "main", 0)?;
    site.create_region(week.id(), "side-pre", 200)?;
    site.create_grade_item(course, 10, "Quiz 1")?;
    site.create_grade_item(course, 11, "Quiz 2")?;
    site.create_course_module(course, 20, "quiz")?;

    let menu = site.create_menu(course, "Main menu")?;
    let link = site.create_link(menu, "flexpage", 1)?;
    site.create_link_config(link, "pageid", Some("1"))?;
    site.create_link_config(link, "children", None)?;

    let mut repo = site.repository()?;
    repo.save_page_conditions(
        &home,
        &[
            Condition::Grade(GradeCondition::new(GradeItemId::new(10), Some(50.0), None)),
            Condition::Grade(GradeCondition::new(GradeItemId::new(11), None, Some(80.0))),
            Condition::Completion(CompletionCondition::new(
                CourseModuleId::new(20),
                CompletionState::Complete,
            )),
        ],
    )?;
    let (storage, _) = repo.into_parts();
    Ok((TestSite { storage }, course))
}

#[test]
fn backup_writes_pages_and_menus() -> Result<(), Box<dyn std::error::Error>> {
    let (site, course) = populated_site()?;
    let mut out = Vec::new();

    let report = backup_course(&site.storage, course, &mut out)?.expect("flexpage course");
    let xml = String::from_utf8(out)?;

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<plugin_format_flexpage_course>"));
    assert!(xml.contains("<page id=\"1\">"));
    assert!(xml.contains("<page id=\"2\">"));
    assert!(xml.contains("<name>Home &amp; Intro</name>"));
    assert!(xml.contains("<region>side-pre</region>"));
    assert!(xml.contains("<gradeitemid>10</gradeitemid>"));
    assert!(xml.contains("<grademin>50</grademin>"));
    assert!(xml.contains(&format!("<grademax>{NULL_MARKER}</grademax>")));
    assert!(xml.contains("<requiredcompletion>1</requiredcompletion>"));
    assert!(xml.contains("<name>Main menu</name>"));
    assert!(xml.contains("<type>flexpage</type>"));
    assert!(xml.contains(&format!("<value>{NULL_MARKER}</value>")));

    assert_eq!(report.row_count("page"), 2);
    assert_eq!(report.row_count("region"), 2);
    assert_eq!(report.row_count("grade"), 2);
    assert_eq!(report.row_count("completion"), 1);
    assert_eq!(report.row_count("menu"), 1);
    assert_eq!(report.row_count("link"), 1);
    assert_eq!(report.row_count("config"), 2);
    assert_eq!(report.bytes, xml.len());
    Ok(())
}

#[test]
fn conditions_nest_under_their_page() -> Result<(), Box<dyn std::error::Error>> {
    let (site, course) = populated_site()?;
    let mut out = Vec::new();
    backup_course(&site.storage, course, &mut out)?;
    let xml = String::from_utf8(out)?;

    let first = xml.find("<page id=\"1\">").unwrap();
    let second = xml.find("<page id=\"2\">").unwrap();
    let grade = xml.find("<gradeitemid>").unwrap();
    let menus = xml.find("<menus>").unwrap();

    assert!(first < grade && grade < second);
    assert!(second < menus);
    // Page 2 has a region but no conditions.
    let page_two = &xml[second..menus];
    assert!(page_two.contains("<region>"));
    assert!(!page_two.contains("<grade "));
    assert!(!page_two.contains("<completion "));
    Ok(())
}

#[test]
fn grade_items_are_annotated() -> Result<(), Box<dyn std::error::Error>> {
    let (site, course) = populated_site()?;
    let report = backup_course(&site.storage, course, std::io::sink())?.expect("flexpage course");
    assert_eq!(report.annotated("grade_item"), vec![10, 11]);
    assert!(report.annotated("course_module").is_empty());
    Ok(())
}

#[test]
fn checksum_is_stable() -> Result<(), Box<dyn std::error::Error>> {
    let (site, course) = populated_site()?;
    let first = backup_course(&site.storage, course, std::io::sink())?.expect("flexpage course");
    let second = backup_course(&site.storage, course, std::io::sink())?.expect("flexpage course");
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(first.checksum.len(), 64);
    Ok(())
}

#[test]
fn other_formats_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let course = site.create_course("T1", "topics", true)?;
    site.create_page(course, "Stray")?;

    let mut out = Vec::new();
    assert!(backup_course(&site.storage, course, &mut out)?.is_none());
    assert!(out.is_empty());
    Ok(())
}

#[test]
fn missing_course_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let result = backup_course(&site.storage, CourseId::new(404), std::io::sink());
    assert!(matches!(
        result,
        Err(BackupError::Storage(StorageError::NotFound(_)))
    ));
    Ok(())
}

#[test]
fn empty_course_writes_empty_groups() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let course = site.create_flexpage_course("C1")?;

    let mut out = Vec::new();
    let report = backup_course(&site.storage, course, &mut out)?.expect("flexpage course");
    let xml = String::from_utf8(out)?;

    assert!(xml.contains("<pages>"));
    assert!(xml.contains("<menus>"));
    assert!(!xml.contains("<page "));
    assert_eq!(report.row_count("page"), 0);
    Ok(())
}

#[test]
fn writer_rejects_unknown_columns() -> Result<(), Box<dyn std::error::Error>> {
    let (site, course) = populated_site()?;
    let tree = BackupElement::group("root").with_child(
        BackupElement::new("page", &["id"], &["title"]).with_source(
            "format_flexpage_page",
            "courseid",
            SourceParam::CourseId,
        ),
    );

    let result = BackupWriter::new(&site.storage, course).write(&tree, std::io::sink());
    assert!(matches!(result, Err(BackupError::InvalidTree(_))));
    Ok(())
}

#[test]
fn writer_accepts_custom_trees() -> Result<(), Box<dyn std::error::Error>> {
    let (site, course) = populated_site()?;
    let tree = BackupElement::group("menus_only").with_child(
        flexpage_course_structure()
            .find("menu")
            .cloned()
            .expect("menu element"),
    );

    let mut out = Vec::new();
    let report = BackupWriter::new(&site.storage, course).write(&tree, &mut out)?;
    let xml = String::from_utf8(out)?;

    assert!(xml.contains("<menus_only>"));
    assert!(!xml.contains("<page "));
    assert_eq!(report.row_count("config"), 2);
    Ok(())
}
