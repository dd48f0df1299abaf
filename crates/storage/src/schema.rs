use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS config (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course (
    id INTEGER PRIMARY KEY,
    shortname TEXT NOT NULL,
    format TEXT NOT NULL DEFAULT 'flexpage',
    enablecompletion INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS grade_items (
    id INTEGER PRIMARY KEY,
    courseid INTEGER NOT NULL,
    itemname TEXT,
    itemtype TEXT NOT NULL DEFAULT 'mod',
    grademin REAL NOT NULL DEFAULT 0,
    grademax REAL NOT NULL DEFAULT 100
);

CREATE TABLE IF NOT EXISTS course_modules (
    id INTEGER PRIMARY KEY,
    course INTEGER NOT NULL,
    modname TEXT NOT NULL,
    completion INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS format_flexpage_page (
    id INTEGER PRIMARY KEY,
    courseid INTEGER NOT NULL,
    name TEXT NOT NULL,
    display INTEGER NOT NULL DEFAULT 0,
    navigation INTEGER NOT NULL DEFAULT 0,
    availablefrom INTEGER NOT NULL DEFAULT 0,
    availableuntil INTEGER NOT NULL DEFAULT 0,
    releasecode TEXT,
    showavailability INTEGER NOT NULL DEFAULT 0,
    parentid INTEGER NOT NULL DEFAULT 0,
    weight INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_page_course ON format_flexpage_page (courseid);

CREATE TABLE IF NOT EXISTS format_flexpage_region (
    id INTEGER PRIMARY KEY,
    pageid INTEGER NOT NULL,
    region TEXT NOT NULL,
    width INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_region_page ON format_flexpage_region (pageid);

CREATE TABLE IF NOT EXISTS format_flexpage_grade (
    id INTEGER PRIMARY KEY,
    pageid INTEGER NOT NULL,
    gradeitemid INTEGER NOT NULL,
    grademin REAL,
    grademax REAL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_grade_page_item ON format_flexpage_grade (pageid, gradeitemid);

CREATE TABLE IF NOT EXISTS format_flexpage_completion (
    id INTEGER PRIMARY KEY,
    pageid INTEGER NOT NULL,
    cmid INTEGER NOT NULL,
    requiredcompletion INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_completion_page_cm ON format_flexpage_completion (pageid, cmid);

CREATE TABLE IF NOT EXISTS block_flexpagenav_menu (
    id INTEGER PRIMARY KEY,
    courseid INTEGER NOT NULL,
    name TEXT NOT NULL,
    render TEXT NOT NULL DEFAULT 'tree',
    displayname INTEGER NOT NULL DEFAULT 1,
    useastab INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS block_flexpagenav_link (
    id INTEGER PRIMARY KEY,
    menuid INTEGER NOT NULL,
    type TEXT NOT NULL,
    weight INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS block_flexpagenav_config (
    id INTEGER PRIMARY KEY,
    linkid INTEGER NOT NULL,
    name TEXT NOT NULL,
    value TEXT
);
";
