//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - tsk_db_info(schema_ver, tsk_ver)
//! - tsk_objects(obj_id, par_obj_id, type)
//! - tsk_image_info, tsk_image_names, tsk_vs_info, tsk_vs_parts, tsk_fs_info
//! - tsk_files(fs_obj_id, obj_id, name, meta_addr, ...), tsk_files_path
//! - tsk_files_derived, tsk_files_derived_method
//! - tsk_file_layout(fs_id, byte_start, byte_len, obj_id), when block layout is on

pub mod schema;
pub mod sqlite;

pub use sqlite::{CaseDb, DbStats, FileRow, LayoutRun, SchemaInfo};
