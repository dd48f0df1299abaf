use flexpage_core::{
    CourseId, CourseModuleId, FLEXPAGE_FORMAT, FieldValue, GradeItemId, Page, PageId, SiteConfig,
};
use flexpage_repository::ConditionRepository;
use flexpage_storage::{SqliteStorage, StorageError};
use std::path::Path;

/// A throwaway site database with helpers for seeding courses and pages.
pub struct TestSite {
    pub storage: SqliteStorage,
}

impl TestSite {
    /// In-memory site with availability and completion switched on.
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(SiteConfig::all_enabled())
    }

    pub fn with_config(config: SiteConfig) -> Result<Self, StorageError> {
        let mut site = Self {
            storage: SqliteStorage::open_in_memory()?,
        };
        site.apply_config(config)?;
        Ok(site)
    }

    /// Site backed by a database file. Opening an existing file keeps its
    /// contents.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut site = Self {
            storage: SqliteStorage::open(&path.to_string_lossy())?,
        };
        site.apply_config(SiteConfig::all_enabled())?;
        Ok(site)
    }

    pub fn apply_config(&mut self, config: SiteConfig) -> Result<(), StorageError> {
        let flag = |on: bool| if on { "1" } else { "0" };
        self.storage
            .set_config("enableavailability", flag(config.enable_availability))?;
        self.storage
            .set_config("enablecompletion", flag(config.enable_completion))?;
        Ok(())
    }

    /// Repository over this site's storage, using the stored site config.
    pub fn repository(self) -> Result<ConditionRepository<SqliteStorage, SiteConfig>, StorageError> {
        let config = self.storage.load_site_config()?;
        Ok(ConditionRepository::new(self.storage, config))
    }

    pub fn create_course(
        &mut self,
        short_name: &str,
        format: &str,
        enable_completion: bool,
    ) -> Result<CourseId, StorageError> {
        let id = self.storage.insert_row(
            "course",
            &[
                ("shortname", FieldValue::Text(short_name.into())),
                ("format", FieldValue::Text(format.into())),
                ("enablecompletion", FieldValue::Integer(enable_completion as i64)),
            ],
        )?;
        Ok(CourseId::new(id))
    }

    pub fn create_flexpage_course(&mut self, short_name: &str) -> Result<CourseId, StorageError> {
        self.create_course(short_name, FLEXPAGE_FORMAT, true)
    }

    pub fn create_page(&mut self, course_id: CourseId, name: &str) -> Result<Page, StorageError> {
        let id = self.storage.insert_row(
            "format_flexpage_page",
            &[
                ("courseid", FieldValue::Integer(course_id.get())),
                ("name", FieldValue::Text(name.into())),
            ],
        )?;
        Ok(Page::new(PageId::new(id), course_id, name))
    }

    pub fn create_page_with_id(
        &mut self,
        course_id: CourseId,
        id: i64,
        name: &str,
    ) -> Result<Page, StorageError> {
        self.storage.insert_row(
            "format_flexpage_page",
            &[
                ("id", FieldValue::Integer(id)),
                ("courseid", FieldValue::Integer(course_id.get())),
                ("name", FieldValue::Text(name.into())),
            ],
        )?;
        Ok(Page::new(PageId::new(id), course_id, name))
    }

    pub fn create_grade_item(
        &mut self,
        course_id: CourseId,
        id: i64,
        name: &str,
    ) -> Result<GradeItemId, StorageError> {
        self.storage.insert_row(
            "grade_items",
            &[
                ("id", FieldValue::Integer(id)),
                ("courseid", FieldValue::Integer(course_id.get())),
                ("itemname", FieldValue::Text(name.into())),
            ],
        )?;
        Ok(GradeItemId::new(id))
    }

    pub fn create_course_module(
        &mut self,
        course_id: CourseId,
        id: i64,
        modname: &str,
    ) -> Result<CourseModuleId, StorageError> {
        self.storage.insert_row(
            "course_modules",
            &[
                ("id", FieldValue::Integer(id)),
                ("course", FieldValue::Integer(course_id.get())),
                ("modname", FieldValue::Text(modname.into())),
                ("completion", FieldValue::Integer(1)),
            ],
        )?;
        Ok(CourseModuleId::new(id))
    }

    pub fn create_region(
        &mut self,
        page_id: PageId,
        region: &str,
        width: i64,
    ) -> Result<i64, StorageError> {
        self.storage.insert_row(
            "format_flexpage_region",
            &[
                ("pageid", FieldValue::Integer(page_id.get())),
                ("region", FieldValue::Text(region.into())),
                ("width", FieldValue::Integer(width)),
            ],
        )
    }

    pub fn create_menu(&mut self, course_id: CourseId, name: &str) -> Result<i64, StorageError> {
        self.storage.insert_row(
            "block_flexpagenav_menu",
            &[
                ("courseid", FieldValue::Integer(course_id.get())),
                ("name", FieldValue::Text(name.into())),
            ],
        )
    }

    pub fn create_link(
        &mut self,
        menu_id: i64,
        link_type: &str,
        weight: i64,
    ) -> Result<i64, StorageError> {
        self.storage.insert_row(
            "block_flexpagenav_link",
            &[
                ("menuid", FieldValue::Integer(menu_id)),
                ("type", FieldValue::Text(link_type.into())),
                ("weight", FieldValue::Integer(weight)),
            ],
        )
    }

    pub fn create_link_config(
        &mut self,
        link_id: i64,
        name: &str,
        value: Option<&str>,
    ) -> Result<i64, StorageError> {
        self.storage.insert_row(
            "block_flexpagenav_config",
            &[
                ("linkid", FieldValue::Integer(link_id)),
                ("name", FieldValue::Text(name.into())),
                (
                    "value",
                    value.map_or(FieldValue::Null, |v| FieldValue::Text(v.into())),
                ),
            ],
        )
    }
}
