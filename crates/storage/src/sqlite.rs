use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use flexpage_core::{
    CompletionCondition, ConditionId, CourseId, CourseRecord, FieldValue, GradeCondition, PageId,
    SiteConfig,
};

use crate::error::StorageError;
use crate::traits::{
    ConditionRow, ConditionScope, ConditionStore, Row, RowSource,
    completion_condition_from_parts, grade_condition_from_parts,
};

const AVAILABILITY_SETTING: &str = "enableavailability";
const COMPLETION_SETTING: &str = "enablecompletion";

pub struct SqliteStorage {
    conn: Connection,
    savepoint_depth: u32,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            savepoint_depth: 0,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            savepoint_depth: 0,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a row built from `(column, value)` pairs and return its id.
    pub fn insert_row(
        &mut self,
        table: &str,
        values: &[(&str, FieldValue)],
    ) -> Result<i64, StorageError> {
        check_identifier(table)?;
        for (column, _) in values {
            check_identifier(column)?;
        }
        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|(_, v)| to_sql(v))),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn set_config(&mut self, name: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO config (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            rusqlite::params![name, value],
        )?;
        Ok(())
    }

    /// Read site feature switches from the `config` table.
    pub fn load_site_config(&self) -> Result<SiteConfig, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM config WHERE name IN (?1, ?2)")?;
        let rows = stmt
            .query_map(
                rusqlite::params![AVAILABILITY_SETTING, COMPLETION_SETTING],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = SiteConfig::default();
        for (name, value) in rows {
            let enabled = setting_enabled(&value);
            match name.as_str() {
                AVAILABILITY_SETTING => config.enable_availability = enabled,
                COMPLETION_SETTING => config.enable_completion = enabled,
                _ => {}
            }
        }
        Ok(config)
    }

    pub fn count_conditions<C: ConditionRow>(&self, page_id: PageId) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE pageid = ?1", C::TABLE),
            [page_id.get()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn setting_enabled(value: &str) -> bool {
    match value.trim().parse::<i64>() {
        Ok(n) => n != 0,
        Err(_) => matches!(value.trim(), "true" | "yes" | "on"),
    }
}

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
pub fn check_identifier(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(n) => Value::Integer(*n),
        FieldValue::Float(n) => Value::Real(*n),
    }
}

fn from_sql(value: ValueRef<'_>) -> Result<FieldValue, StorageError> {
    Ok(match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(n) => FieldValue::Integer(n),
        ValueRef::Real(n) => FieldValue::Float(n),
        ValueRef::Text(bytes) => FieldValue::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?
                .to_string(),
        ),
        ValueRef::Blob(_) => {
            return Err(StorageError::Serialization("unexpected blob column".into()));
        }
    })
}

fn scope_filter(scope: ConditionScope) -> (&'static str, i64) {
    match scope {
        ConditionScope::Course(course_id) => ("p.courseid = ?1", course_id.get()),
        ConditionScope::Page(page_id) => ("p.id = ?1", page_id.get()),
    }
}

impl ConditionStore for SqliteStorage {
    fn get_course(&self, course_id: CourseId) -> Result<Option<CourseRecord>, StorageError> {
        let course = self
            .conn
            .query_row(
                "SELECT id, shortname, format, enablecompletion FROM course WHERE id = ?1",
                [course_id.get()],
                |row| {
                    Ok(CourseRecord {
                        id: CourseId::new(row.get(0)?),
                        short_name: row.get(1)?,
                        format: row.get(2)?,
                        enable_completion: row.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(course)
    }

    fn grade_conditions(&self, scope: ConditionScope) -> Result<Vec<GradeCondition>, StorageError> {
        let (filter, param) = scope_filter(scope);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT c.id, c.pageid, c.gradeitemid, c.grademin, c.grademax
               FROM format_flexpage_page p
         INNER JOIN format_flexpage_grade c ON p.id = c.pageid
         INNER JOIN grade_items g ON g.id = c.gradeitemid
              WHERE {filter}
           ORDER BY c.id"
        ))?;
        let conditions = stmt
            .query_map([param], |row| {
                Ok(grade_condition_from_parts(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(conditions)
    }

    fn completion_conditions(
        &self,
        scope: ConditionScope,
    ) -> Result<Vec<CompletionCondition>, StorageError> {
        let (filter, param) = scope_filter(scope);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT c.id, c.pageid, c.cmid, c.requiredcompletion
               FROM format_flexpage_page p
         INNER JOIN format_flexpage_completion c ON p.id = c.pageid
         INNER JOIN course_modules cm ON cm.id = c.cmid
              WHERE {filter}
           ORDER BY c.id"
        ))?;
        let rows = stmt
            .query_map([param], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, page_id, cm_id, required)| {
                completion_condition_from_parts(id, page_id, cm_id, required)
            })
            .collect()
    }

    fn find_condition_id<C: ConditionRow>(
        &self,
        page_id: PageId,
        natural_key: i64,
    ) -> Result<Option<ConditionId>, StorageError> {
        let id = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE pageid = ?1 AND {} = ?2",
                    C::TABLE,
                    C::KEY_COLUMN
                ),
                rusqlite::params![page_id.get(), natural_key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(ConditionId::new))
    }

    fn insert_condition<C: ConditionRow>(
        &mut self,
        page_id: PageId,
        condition: &C,
    ) -> Result<ConditionId, StorageError> {
        condition.check()?;
        let mut values = vec![("pageid", FieldValue::Integer(page_id.get()))];
        values.extend(condition.values());
        let id = self.insert_row(C::TABLE, &values)?;
        Ok(ConditionId::new(id))
    }

    fn update_condition<C: ConditionRow>(
        &mut self,
        id: ConditionId,
        page_id: PageId,
        condition: &C,
    ) -> Result<(), StorageError> {
        condition.check()?;
        let mut values = vec![("pageid", FieldValue::Integer(page_id.get()))];
        values.extend(condition.values());

        let assignments: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            C::TABLE,
            assignments.join(", "),
            values.len() + 1
        );

        let mut params: Vec<Value> = values.iter().map(|(_, v)| to_sql(v)).collect();
        params.push(Value::Integer(id.get()));

        let changed = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(params))?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("{} row {id}", C::TABLE)));
        }
        Ok(())
    }

    fn delete_conditions_except<C: ConditionRow>(
        &mut self,
        page_id: PageId,
        keep: &[ConditionId],
    ) -> Result<usize, StorageError> {
        if keep.is_empty() {
            let removed = self.conn.execute(
                &format!("DELETE FROM {} WHERE pageid = ?1", C::TABLE),
                [page_id.get()],
            )?;
            return Ok(removed);
        }

        let placeholders: Vec<String> = (2..=keep.len() + 1).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "DELETE FROM {} WHERE pageid = ?1 AND id NOT IN ({})",
            C::TABLE,
            placeholders.join(", ")
        );
        let params = std::iter::once(page_id.get()).chain(keep.iter().map(|id| id.get()));
        let removed = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(removed)
    }

    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StorageError>,
    {
        // The outermost scope takes the write lock at BEGIN; nested scopes
        // are savepoints inside it.
        let (begin, commit, rollback) = if self.savepoint_depth == 0 {
            (
                "BEGIN IMMEDIATE".to_string(),
                "COMMIT".to_string(),
                "ROLLBACK".to_string(),
            )
        } else {
            let name = format!("flexpage_sp{}", self.savepoint_depth);
            (
                format!("SAVEPOINT {name}"),
                format!("RELEASE {name}"),
                format!("ROLLBACK TO {name}; RELEASE {name}"),
            )
        };

        self.conn
            .execute_batch(&begin)
            .map_err(StorageError::from)?;
        self.savepoint_depth += 1;
        let result = f(self);
        self.savepoint_depth -= 1;

        let result = match result {
            Ok(value) => match self.conn.execute_batch(&commit) {
                Ok(()) => return Ok(value),
                Err(e) => Err(E::from(StorageError::from(e))),
            },
            Err(e) => Err(e),
        };

        if let Err(failed) = self.conn.execute_batch(&rollback) {
            warn!(scope = %begin, error = %failed, "rollback failed");
        }
        result
    }
}

impl RowSource for SqliteStorage {
    fn fetch_rows(&self, table: &str, column: &str, value: i64) -> Result<Vec<Row>, StorageError> {
        check_identifier(table)?;
        check_identifier(column)?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} WHERE {column} = ?1 ORDER BY id"))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([value])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                fields.push((name.clone(), from_sql(row.get_ref(i)?)?));
            }
            out.push(fields);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexpage_core::{CompletionState, CourseModuleId, GradeItemId};

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    #[test]
    fn schema_version_is_recorded_once() -> Result<(), StorageError> {
        let storage = storage();
        crate::schema::init_schema(storage.connection())?;
        let versions: Vec<i32> = storage
            .connection()
            .prepare("SELECT version FROM schema_version")?
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        assert_eq!(versions, vec![crate::schema::SCHEMA_VERSION]);
        Ok(())
    }

    #[test]
    fn identifiers() {
        assert!(check_identifier("format_flexpage_page").is_ok());
        assert!(check_identifier("_x1").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("1abc").is_err());
        assert!(check_identifier("page; DROP TABLE course").is_err());
    }

    #[test]
    fn site_config_reads_flags() -> Result<(), StorageError> {
        let mut storage = storage();
        assert_eq!(storage.load_site_config()?, SiteConfig::default());

        storage.set_config("enableavailability", "1")?;
        storage.set_config("enablecompletion", "0")?;
        let config = storage.load_site_config()?;
        assert!(config.enable_availability);
        assert!(!config.enable_completion);
        Ok(())
    }

    #[test]
    fn condition_crud_by_natural_key() -> Result<(), StorageError> {
        let mut storage = storage();
        let page = PageId::new(5);

        let condition = GradeCondition::new(GradeItemId::new(10), Some(40.0), Some(100.0));
        let id = storage.insert_condition(page, &condition)?;
        assert_eq!(
            storage.find_condition_id::<GradeCondition>(page, 10)?,
            Some(id)
        );
        assert_eq!(storage.find_condition_id::<GradeCondition>(page, 11)?, None);
        assert_eq!(
            storage.find_condition_id::<GradeCondition>(PageId::new(6), 10)?,
            None
        );

        let updated = GradeCondition::new(GradeItemId::new(10), Some(50.0), None);
        storage.update_condition(id, page, &updated)?;
        let (min, max): (Option<f64>, Option<f64>) = storage.connection().query_row(
            "SELECT grademin, grademax FROM format_flexpage_grade WHERE id = ?1",
            [id.get()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!(min, Some(50.0));
        assert_eq!(max, None);
        Ok(())
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let mut storage = storage();
        let condition = CompletionCondition::new(CourseModuleId::new(3), CompletionState::Complete);
        let result = storage.update_condition(ConditionId::new(99), PageId::new(1), &condition);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn delete_except_keeps_listed_ids() -> Result<(), StorageError> {
        let mut storage = storage();
        let page = PageId::new(1);
        let other = PageId::new(2);
        let a = storage.insert_condition(
            page,
            &CompletionCondition::new(CourseModuleId::new(1), CompletionState::Complete),
        )?;
        storage.insert_condition(
            page,
            &CompletionCondition::new(CourseModuleId::new(2), CompletionState::Complete),
        )?;
        storage.insert_condition(
            other,
            &CompletionCondition::new(CourseModuleId::new(1), CompletionState::Complete),
        )?;

        let removed = storage.delete_conditions_except::<CompletionCondition>(page, &[a])?;
        assert_eq!(removed, 1);
        assert_eq!(storage.count_conditions::<CompletionCondition>(page)?, 1);
        assert_eq!(storage.count_conditions::<CompletionCondition>(other)?, 1);

        let removed = storage.delete_conditions_except::<CompletionCondition>(page, &[])?;
        assert_eq!(removed, 1);
        assert_eq!(storage.count_conditions::<CompletionCondition>(page)?, 0);
        assert_eq!(storage.count_conditions::<CompletionCondition>(other)?, 1);
        Ok(())
    }

    #[test]
    fn atomically_rolls_back_nested_scopes() -> Result<(), StorageError> {
        let mut storage = storage();
        let page = PageId::new(1);

        let result: Result<(), StorageError> = storage.atomically(|s| {
            s.insert_condition(page, &GradeCondition::new(GradeItemId::new(1), None, None))?;
            s.atomically(|inner| {
                inner.insert_condition(page, &GradeCondition::new(GradeItemId::new(2), None, None))
            })?;
            Err(StorageError::NotFound("forced".into()))
        });
        assert!(result.is_err());
        assert_eq!(storage.count_conditions::<GradeCondition>(page)?, 0);

        storage.atomically(|s| {
            s.insert_condition(page, &GradeCondition::new(GradeItemId::new(3), None, None))
        })?;
        assert_eq!(storage.count_conditions::<GradeCondition>(page)?, 1);
        Ok(())
    }

    #[test]
    fn outer_scope_holds_a_write_transaction() -> Result<(), StorageError> {
        let mut storage = storage();
        assert!(storage.connection().is_autocommit());

        storage.atomically(|s| {
            assert!(!s.connection().is_autocommit());
            s.atomically(|inner| {
                assert!(!inner.connection().is_autocommit());
                Ok::<_, StorageError>(())
            })
        })?;
        assert!(storage.connection().is_autocommit());

        let failed: Result<(), StorageError> =
            storage.atomically(|_| Err(StorageError::NotFound("forced".into())));
        assert!(failed.is_err());
        assert!(storage.connection().is_autocommit());
        Ok(())
    }

    #[test]
    fn non_finite_grade_bound_is_rejected() {
        let mut storage = storage();
        let page = PageId::new(1);
        let condition = GradeCondition::new(GradeItemId::new(10), Some(f64::NAN), None);

        let result = storage.insert_condition(page, &condition);
        assert!(matches!(
            result,
            Err(StorageError::Core(flexpage_core::CoreError::InvalidData(_)))
        ));
        assert_eq!(storage.count_conditions::<GradeCondition>(page).unwrap(), 0);
    }

    #[test]
    fn fetch_rows_in_id_order() -> Result<(), StorageError> {
        let mut storage = storage();
        storage.insert_row(
            "format_flexpage_region",
            &[
                ("id", FieldValue::Integer(9)),
                ("pageid", FieldValue::Integer(1)),
                ("region", FieldValue::Text("side-pre".into())),
                ("width", FieldValue::Integer(200)),
            ],
        )?;
        storage.insert_row(
            "format_flexpage_region",
            &[
                ("id", FieldValue::Integer(4)),
                ("pageid", FieldValue::Integer(1)),
                ("region", FieldValue::Text("main".into())),
                ("width", FieldValue::Integer(0)),
            ],
        )?;

        let rows = storage.fetch_rows("format_flexpage_region", "pageid", 1)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], ("id".to_string(), FieldValue::Integer(4)));
        assert_eq!(rows[1][2], ("region".to_string(), FieldValue::Text("side-pre".into())));

        assert!(matches!(
            storage.fetch_rows("format_flexpage_region", "pageid = 1 OR 1", 1),
            Err(StorageError::InvalidIdentifier(_))
        ));
        Ok(())
    }

    #[test]
    fn open_on_disk_persists() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("flexpage.db");
        let path = path.to_string_lossy().to_string();

        {
            let mut storage = SqliteStorage::open(&path)?;
            storage.set_config("enableavailability", "1")?;
        }
        let storage = SqliteStorage::open(&path)?;
        assert!(storage.load_site_config()?.enable_availability);
        Ok(())
    }
}
