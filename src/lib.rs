//! # imgdb - forensic image structure in SQLite
//!
//! Persists the structure discovered in a disk image (images, volume
//! systems, volumes, filesystems, files) as rows of a relational schema.
//!
//! imgdb provides:
//! - A generic object hierarchy (`tsk_objects`) every entity hangs off
//! - Container writers for images, partition tables, partitions and filesystems
//! - File ingestion with parent resolution by metadata address
//! - Carved file records and optional block layout runs
//! - Transactions and named savepoints around bulk ingestion
//! - A JSON manifest loader for walker output

pub mod object;
pub mod container;
pub mod file;
pub mod storage;
pub mod manifest;
pub mod config;
pub mod ui;

use std::path::PathBuf;

// Re-exports for convenient access
pub use object::{ObjId, ObjectType};
pub use container::{FsInfo, ImageInfo, VolumeInfo, VsInfo};
pub use file::{FileCategory, FsAttr, FsFile, FsMeta, FsName};
pub use storage::CaseDb;
pub use manifest::{Loader, Manifest};

/// Result type alias for imgdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for imgdb operations.
///
/// Every variant that originates in the storage engine keeps the engine's
/// own error as its source, next to a message naming what was attempted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Can't open database {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Error creating {object}: {source}")]
    SchemaCreationFailed {
        object: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Error preparing SQL statement `{sql}`: {source}")]
    StatementPrepareFailed {
        sql: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Error adding data to {table} ({detail}): {source}")]
    InsertFailed {
        table: &'static str,
        detail: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("No parent file with meta_addr {meta_addr} in filesystem {fs_obj_id}")]
    ParentLookupFailed {
        meta_addr: u64,
        fs_obj_id: ObjId,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Can't add {kind} object under {par_obj_id:?}: {reason}")]
    InvalidParent {
        kind: ObjectType,
        par_obj_id: Option<ObjId>,
        reason: String,
    },

    #[error("No filesystem with object id {0}")]
    UnknownFilesystem(ObjId),

    #[error("Failed to allocate name buffer: {0}")]
    AllocationFailed(#[from] std::collections::TryReserveError),

    #[error("Error using {op}: {source}")]
    TransactionFailed {
        op: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("Block layout tracking is not enabled for this database")]
    LayoutDisabled,

    #[error("Database is not open")]
    NotOpen,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this is a failed parent lookup, i.e. a child arrived before its parent.
    pub fn is_parent_lookup(&self) -> bool {
        matches!(self, Error::ParentLookupFailed { .. })
    }
}
