//! Database schema definitions
//!
//! Table and column names are read by downstream tools and must not change
//! without bumping [`SCHEMA_VERSION`].

/// Version of the table layout, stored in `tsk_db_info.schema_ver`
pub const SCHEMA_VERSION: i64 = 2;

/// SQL to create the version table
pub const CREATE_DB_INFO_TABLE: &str =
    "CREATE TABLE tsk_db_info (schema_ver INTEGER, tsk_ver INTEGER)";

/// SQL to record the schema and tool version
pub const INSERT_DB_INFO: &str = "INSERT INTO tsk_db_info (schema_ver, tsk_ver) VALUES (?1, ?2)";

/// SQL to create the object hierarchy table
pub const CREATE_OBJECTS_TABLE: &str =
    "CREATE TABLE tsk_objects (obj_id INTEGER PRIMARY KEY, par_obj_id INTEGER, type INTEGER)";

/// Entity tables, in creation order, each with the name used in errors
pub const ENTITY_TABLES: &[(&str, &str)] = &[
    (
        "tsk_image_info table",
        "CREATE TABLE tsk_image_info (obj_id INTEGER, type INTEGER, ssize INTEGER)",
    ),
    (
        "tsk_image_names table",
        "CREATE TABLE tsk_image_names (obj_id INTEGER, name TEXT, sequence INTEGER)",
    ),
    (
        "tsk_vs_info table",
        "CREATE TABLE tsk_vs_info (obj_id INTEGER, vs_type INTEGER, img_offset INTEGER NOT NULL, block_size INTEGER NOT NULL)",
    ),
    (
        "tsk_vs_parts table",
        "CREATE TABLE tsk_vs_parts (obj_id INTEGER PRIMARY KEY, addr INTEGER, start INTEGER NOT NULL, length INTEGER NOT NULL, desc TEXT, flags INTEGER)",
    ),
    (
        "tsk_fs_info table",
        r#"
CREATE TABLE tsk_fs_info (
    obj_id INTEGER PRIMARY KEY,
    img_offset INTEGER,
    fs_type INTEGER,
    block_size INTEGER,
    block_count INTEGER,
    root_inum INTEGER,
    first_inum INTEGER,
    last_inum INTEGER
)
"#,
    ),
    (
        "tsk_files table",
        r#"
CREATE TABLE tsk_files (
    fs_obj_id INTEGER NOT NULL,
    obj_id INTEGER NOT NULL UNIQUE,
    attr_type INTEGER,
    attr_id INTEGER,
    name TEXT NOT NULL,
    meta_addr INTEGER,
    type INTEGER,
    has_layout INTEGER,
    has_path INTEGER,
    dir_type INTEGER,
    meta_type INTEGER,
    dir_flags INTEGER,
    meta_flags INTEGER,
    size INTEGER,
    ctime INTEGER,
    crtime INTEGER,
    atime INTEGER,
    mtime INTEGER,
    mode INTEGER,
    uid INTEGER,
    gid INTEGER
)
"#,
    ),
    (
        "tsk_files_path table",
        "CREATE TABLE tsk_files_path (obj_id INTEGER, path TEXT)",
    ),
    (
        "tsk_files_derived table",
        "CREATE TABLE tsk_files_derived (obj_id INTEGER UNIQUE, derived_id INTEGER, rederive TEXT)",
    ),
    (
        "tsk_files_derived_method table",
        "CREATE TABLE tsk_files_derived_method (derived_id INTEGER PRIMARY KEY, tool_name TEXT, tool_version TEXT, other TEXT)",
    ),
];

/// Name of the block layout table
pub const LAYOUT_TABLE: &str = "tsk_file_layout";

/// SQL to create the block layout table (only with block layout enabled)
pub const CREATE_LAYOUT_TABLE: &str = "CREATE TABLE tsk_file_layout (fs_id INTEGER NOT NULL, byte_start INTEGER NOT NULL, byte_len INTEGER NOT NULL, obj_id)";

/// SQL to create indexes, each with the name used in errors
pub const CREATE_INDEXES: &[(&str, &str)] = &[
    (
        "tsk_objects index on par_obj_id",
        "CREATE INDEX parObjId ON tsk_objects(par_obj_id)",
    ),
    (
        "tsk_files index on fs_obj_id, meta_addr",
        "CREATE INDEX fileMetaAddr ON tsk_files(fs_obj_id, meta_addr)",
    ),
];

/// Type of an object, checked before a child is attached to it
pub const SELECT_OBJECT_TYPE: &str = "SELECT type FROM tsk_objects WHERE obj_id = ?1";

/// Parent lookup run once per file; held in the connection's statement cache.
///
/// Earliest inserted match first, see `CaseDb::add_fs_file`.
pub const SELECT_FILE_ID_BY_META_ADDR: &str =
    "SELECT obj_id FROM tsk_files WHERE meta_addr IS ?1 AND fs_obj_id IS ?2 ORDER BY obj_id LIMIT 2";

/// Pack the crate version the way `tsk_db_info.tsk_ver` expects it:
/// `major << 24 | minor << 16 | patch << 8 | 0xff`.
pub fn tool_version_num() -> i64 {
    let mut parts = env!("CARGO_PKG_VERSION")
        .split('.')
        .map(|p| p.split(|c: char| !c.is_ascii_digit()).next().unwrap_or("").parse::<i64>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    (major << 24) | (minor << 16) | (patch << 8) | 0xff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_version_packing() {
        let packed = tool_version_num();
        assert_eq!(packed & 0xff, 0xff);
        let major: i64 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
        let minor: i64 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap();
        assert_eq!(packed >> 24, major);
        assert_eq!((packed >> 16) & 0xff, minor);
    }

    #[test]
    fn test_entity_table_order() {
        let names: Vec<&str> = ENTITY_TABLES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.first(), Some(&"tsk_image_info table"));
        assert_eq!(names.last(), Some(&"tsk_files_derived_method table"));
        assert_eq!(names.len(), 9);
    }
}
