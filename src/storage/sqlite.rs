//! SQLite storage implementation

use std::cell::Cell;
use std::path::{Path, PathBuf};
use rusqlite::{Connection, OptionalExtension, Params, params};
use crate::{Error, Result};
use crate::container::{FsInfo, ImageInfo, VolumeInfo, VsInfo};
use crate::file::{self, FileCategory, FsAttr, FsFile, MetaType, NameType, meta_flags, name_flags};
use crate::object::{ObjId, ObjectRow, ObjectType};
use super::schema;

/// An open case database.
///
/// Owns the SQLite connection and, through the connection's statement
/// cache, the long-lived parent lookup used by [`CaseDb::add_fs_file`].
/// A `CaseDb` is meant for one ingestion thread; it has no internal locking.
pub struct CaseDb {
    conn: Option<Connection>,
    block_layout: bool,
    /// Root directory address of the filesystem files were last added to
    fs_root: Cell<Option<(ObjId, u64)>>,
}

impl CaseDb {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn, path.to_path_buf())
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        // A crashed load is redone from scratch, so durability buys nothing here
        conn.execute_batch("PRAGMA synchronous = OFF;")
            .map_err(|source| Error::OpenFailed { path: path.clone(), source })?;

        let layout_tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [schema::LAYOUT_TABLE],
            |row| row.get(0),
        )?;

        tracing::debug!("Opened database {}", path.display());
        Ok(Self {
            conn: Some(conn),
            block_layout: layout_tables > 0,
            fs_root: Cell::new(None),
        })
    }

    /// Close the database. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.fs_root.set(None);
        if let Some(conn) = self.conn.take() {
            conn.flush_prepared_statement_cache();
            conn.close().map_err(|(_, e)| Error::Storage(e))?;
            tracing::debug!("Closed database");
        }
        Ok(())
    }

    /// Whether the connection is still open
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Whether this store tracks file block layout (`tsk_file_layout`)
    pub fn block_layout_enabled(&self) -> bool {
        self.block_layout
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::NotOpen)
    }

    // ========== Schema ==========

    /// Create all tables and indexes and record the schema version.
    ///
    /// `block_layout` decides once, for the lifetime of the store, whether
    /// the layout table exists. The first failing statement aborts; tables
    /// created before it are left for the caller's transaction to undo.
    pub fn initialize(&mut self, block_layout: bool) -> Result<()> {
        let conn = self.conn()?;
        let create = |object: &'static str, sql: &str| -> Result<()> {
            conn.execute(sql, [])
                .map_err(|source| Error::SchemaCreationFailed { object, source })?;
            Ok(())
        };

        create("tsk_db_info table", schema::CREATE_DB_INFO_TABLE)?;
        conn.execute(
            schema::INSERT_DB_INFO,
            params![schema::SCHEMA_VERSION, schema::tool_version_num()],
        )
        .map_err(|source| Error::InsertFailed {
            table: "tsk_db_info",
            detail: format!("schema_ver {}", schema::SCHEMA_VERSION),
            source,
        })?;

        create("tsk_objects table", schema::CREATE_OBJECTS_TABLE)?;
        for &(object, sql) in schema::ENTITY_TABLES {
            create(object, sql)?;
        }
        if block_layout {
            create("tsk_file_layout table", schema::CREATE_LAYOUT_TABLE)?;
        }

        self.create_indexes()?;
        self.block_layout = block_layout;
        tracing::debug!("Initialized schema v{} (block layout: {})", schema::SCHEMA_VERSION, block_layout);
        Ok(())
    }

    /// Create the indexes used for child and parent lookups
    pub fn create_indexes(&self) -> Result<()> {
        let conn = self.conn()?;
        for &(object, sql) in schema::CREATE_INDEXES {
            conn.execute(sql, [])
                .map_err(|source| Error::SchemaCreationFailed { object, source })?;
        }
        Ok(())
    }

    /// Read the version row written by [`CaseDb::initialize`]
    pub fn schema_info(&self) -> Result<SchemaInfo> {
        let info = self.conn()?.query_row(
            "SELECT schema_ver, tsk_ver FROM tsk_db_info LIMIT 1",
            [],
            |row| {
                Ok(SchemaInfo {
                    schema_version: row.get(0)?,
                    tool_version: row.get(1)?,
                })
            },
        )?;
        Ok(info)
    }

    /// Fail unless the store was written with the current schema version
    pub fn check_schema(&self) -> Result<SchemaInfo> {
        let info = self.schema_info()?;
        if info.schema_version != schema::SCHEMA_VERSION {
            return Err(Error::SchemaMismatch {
                found: info.schema_version,
                expected: schema::SCHEMA_VERSION,
            });
        }
        Ok(info)
    }

    /// Prepare the parent lookup ahead of file ingestion.
    ///
    /// Must be called on an initialized database; surfaces a prepare failure
    /// before the first file instead of in the middle of a load.
    pub fn setup(&self) -> Result<()> {
        self.conn()?
            .prepare_cached(schema::SELECT_FILE_ID_BY_META_ADDR)
            .map_err(|source| Error::StatementPrepareFailed {
                sql: schema::SELECT_FILE_ID_BY_META_ADDR,
                source,
            })?;
        Ok(())
    }

    /// Drop cached statements once ingestion is done
    pub fn cleanup(&self) {
        if let Some(conn) = &self.conn {
            conn.flush_prepared_statement_cache();
        }
    }

    // ========== Error Wrapper ==========

    /// Run a cached insert; an engine failure becomes `InsertFailed` with `detail`.
    fn insert<P: Params>(
        &self,
        table: &'static str,
        sql: &'static str,
        params: P,
        detail: impl FnOnce() -> String,
    ) -> Result<()> {
        let mut stmt = self
            .conn()?
            .prepare_cached(sql)
            .map_err(|source| Error::StatementPrepareFailed { sql, source })?;
        stmt.execute(params).map_err(|source| Error::InsertFailed {
            table,
            detail: detail(),
            source,
        })?;
        Ok(())
    }

    /// Run a transaction control statement
    fn exec_control(&self, sql: &str) -> Result<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(|source| Error::TransactionFailed { op: sql.to_string(), source })
    }

    // ========== Object Hierarchy ==========

    /// Insert an object row and return its new id.
    ///
    /// The parent must already exist and be of a type `kind` may hang off;
    /// only images go without one. Anything else is [`Error::InvalidParent`].
    pub fn add_object(&self, kind: ObjectType, par_obj_id: Option<ObjId>) -> Result<ObjId> {
        self.check_parent(kind, par_obj_id)?;
        self.insert(
            "tsk_objects",
            "INSERT INTO tsk_objects (obj_id, par_obj_id, type) VALUES (NULL, ?1, ?2)",
            params![par_obj_id, kind.code()],
            || format!("par_obj_id {:?}, type {}", par_obj_id, kind),
        )?;
        let obj_id = self.conn()?.last_insert_rowid();
        tracing::trace!("Added {} object {} under {:?}", kind, obj_id, par_obj_id);
        Ok(obj_id)
    }

    fn check_parent(&self, kind: ObjectType, par_obj_id: Option<ObjId>) -> Result<()> {
        let invalid = |reason: String| Error::InvalidParent { kind, par_obj_id, reason };

        let Some(par_id) = par_obj_id else {
            return match kind.parent_types() {
                [] => Ok(()),
                _ => Err(invalid("only images are roots".to_string())),
            };
        };
        if kind.parent_types().is_empty() {
            return Err(invalid(format!("{} objects have no parent", kind)));
        }

        let mut stmt = self
            .conn()?
            .prepare_cached(schema::SELECT_OBJECT_TYPE)
            .map_err(|source| Error::StatementPrepareFailed {
                sql: schema::SELECT_OBJECT_TYPE,
                source,
            })?;
        let code: Option<i64> = stmt.query_row([par_id], |row| row.get(0)).optional()?;
        match code.map(ObjectType::from_code) {
            None => Err(invalid("no such object".to_string())),
            Some(Some(parent)) if kind.parent_types().contains(&parent) => Ok(()),
            Some(Some(parent)) => Err(invalid(format!("parent is of type {}", parent))),
            Some(None) => Err(invalid("parent has an unknown type code".to_string())),
        }
    }

    // ========== Container Operations ==========

    /// Add an image. Images are the roots of the hierarchy.
    pub fn add_image_info(&self, info: &ImageInfo) -> Result<ObjId> {
        let obj_id = self.add_object(ObjectType::Image, None)?;
        self.insert(
            "tsk_image_info",
            "INSERT INTO tsk_image_info (obj_id, type, ssize) VALUES (?1, ?2, ?3)",
            params![obj_id, info.container_type, info.sector_size],
            || format!("obj_id {}", obj_id),
        )?;
        Ok(obj_id)
    }

    /// Attach a segment file name to an image. `sequence` orders split
    /// segments and is stored as given.
    pub fn add_image_name(&self, obj_id: ObjId, name: &str, sequence: i64) -> Result<()> {
        self.insert(
            "tsk_image_names",
            "INSERT INTO tsk_image_names (obj_id, name, sequence) VALUES (?1, ?2, ?3)",
            params![obj_id, name, sequence],
            || format!("obj_id {}, sequence {}", obj_id, sequence),
        )
    }

    /// Add a volume system (partition table) under `par_obj_id`
    pub fn add_vs_info(&self, info: &VsInfo, par_obj_id: ObjId) -> Result<ObjId> {
        let obj_id = self.add_object(ObjectType::VolumeSystem, Some(par_obj_id))?;
        self.insert(
            "tsk_vs_info",
            "INSERT INTO tsk_vs_info (obj_id, vs_type, img_offset, block_size) VALUES (?1, ?2, ?3, ?4)",
            params![obj_id, info.vs_type, info.offset as i64, info.block_size],
            || format!("obj_id {}", obj_id),
        )?;
        Ok(obj_id)
    }

    /// Add a partition under its volume system
    pub fn add_volume_info(&self, info: &VolumeInfo, par_obj_id: ObjId) -> Result<ObjId> {
        let obj_id = self.add_object(ObjectType::Volume, Some(par_obj_id))?;
        self.insert(
            "tsk_vs_parts",
            "INSERT INTO tsk_vs_parts (obj_id, addr, start, length, desc, flags) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                obj_id,
                info.addr,
                info.start as i64,
                info.len as i64,
                info.desc,
                info.flags,
            ],
            || format!("obj_id {}, addr {}", obj_id, info.addr),
        )?;
        Ok(obj_id)
    }

    /// Add a filesystem under an image or volume
    pub fn add_fs_info(&self, info: &FsInfo, par_obj_id: ObjId) -> Result<ObjId> {
        let obj_id = self.add_object(ObjectType::Filesystem, Some(par_obj_id))?;
        self.insert(
            "tsk_fs_info",
            r#"
            INSERT INTO tsk_fs_info (obj_id, img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                obj_id,
                info.offset as i64,
                info.fs_type,
                info.block_size,
                info.block_count as i64,
                info.root_inum as i64,
                info.first_inum as i64,
                info.last_inum as i64,
            ],
            || format!("obj_id {}", obj_id),
        )?;
        Ok(obj_id)
    }

    // ========== File Operations ==========

    /// Add a file found while walking the filesystem `fs_obj_id`.
    ///
    /// The root directory (the `root_inum` recorded by [`CaseDb::add_fs_info`])
    /// hangs off the filesystem object. Every other file hangs off the file
    /// whose `meta_addr` equals its `par_addr`, which must have been added
    /// before: a missing parent is reported as [`Error::ParentLookupFailed`].
    /// Returns `None`, without writing anything, for entries that have no name.
    pub fn add_fs_file(
        &self,
        file: &FsFile,
        attr: Option<&FsAttr>,
        path: &str,
        fs_obj_id: ObjId,
    ) -> Result<Option<ObjId>> {
        let Some(name) = &file.name else {
            return Ok(None);
        };

        let par_obj_id = if self.fs_root_inum(fs_obj_id)? == name.meta_addr {
            fs_obj_id
        } else {
            self.find_parent_obj_id(name.par_addr, fs_obj_id)?
        };

        self.add_file(file, attr, path, fs_obj_id, par_obj_id)
    }

    /// Root directory address of a stored filesystem, remembered per filesystem
    fn fs_root_inum(&self, fs_obj_id: ObjId) -> Result<u64> {
        if let Some((cached_id, root_inum)) = self.fs_root.get() {
            if cached_id == fs_obj_id {
                return Ok(root_inum);
            }
        }

        let root_inum: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT root_inum FROM tsk_fs_info WHERE obj_id = ?1",
                [fs_obj_id],
                |row| row.get(0),
            )
            .optional()?;
        let root_inum = root_inum.ok_or(Error::UnknownFilesystem(fs_obj_id))? as u64;
        self.fs_root.set(Some((fs_obj_id, root_inum)));
        Ok(root_inum)
    }

    /// Resolve the object id of the file with `meta_addr` in `fs_obj_id`.
    ///
    /// When several files share the address (reused inodes, hard links) the
    /// earliest inserted one wins.
    pub fn find_parent_obj_id(&self, meta_addr: u64, fs_obj_id: ObjId) -> Result<ObjId> {
        let lookup_failed = |source: rusqlite::Error| Error::ParentLookupFailed {
            meta_addr,
            fs_obj_id,
            source: Some(source),
        };

        let mut stmt = self
            .conn()?
            .prepare_cached(schema::SELECT_FILE_ID_BY_META_ADDR)
            .map_err(|source| Error::StatementPrepareFailed {
                sql: schema::SELECT_FILE_ID_BY_META_ADDR,
                source,
            })?;
        let mut rows = stmt
            .query(params![meta_addr as i64, fs_obj_id])
            .map_err(lookup_failed)?;

        let par_obj_id: ObjId = match rows.next().map_err(lookup_failed)? {
            Some(row) => row.get(0).map_err(lookup_failed)?,
            None => {
                return Err(Error::ParentLookupFailed {
                    meta_addr,
                    fs_obj_id,
                    source: None,
                });
            }
        };

        if rows.next().map_err(lookup_failed)?.is_some() {
            tracing::debug!(
                "Several files with meta_addr {} in filesystem {}, using object {}",
                meta_addr,
                fs_obj_id,
                par_obj_id
            );
        }
        Ok(par_obj_id)
    }

    /// Add a file row under an already known parent object.
    ///
    /// A file without metadata is stored with zeroed times, size and mode.
    pub fn add_file(
        &self,
        file: &FsFile,
        attr: Option<&FsAttr>,
        path: &str,
        fs_obj_id: ObjId,
        par_obj_id: ObjId,
    ) -> Result<Option<ObjId>> {
        let Some(fs_name) = &file.name else {
            return Ok(None);
        };

        let meta = file.meta_or_default();
        let (attr_type, attr_id) = attr.map_or((0, 0), |a| (a.attr_type, a.id));
        let name = file::display_name(&fs_name.name, attr)?;
        let has_path = !path.is_empty();

        let obj_id = self.add_object(ObjectType::File, Some(par_obj_id))?;
        self.insert(
            "tsk_files",
            r#"
            INSERT INTO tsk_files (fs_obj_id, obj_id, type, attr_type, attr_id, name, meta_addr, has_path,
                dir_type, meta_type, dir_flags, meta_flags, size, crtime, ctime, atime, mtime, mode, gid, uid)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
            params![
                fs_obj_id,
                obj_id,
                FileCategory::FromFilesystem.code(),
                attr_type,
                attr_id,
                name,
                fs_name.meta_addr as i64,
                has_path.then_some(1),
                fs_name.name_type.code(),
                meta.meta_type.code(),
                fs_name.flags,
                meta.flags,
                meta.size,
                meta.crtime,
                meta.ctime,
                meta.atime,
                meta.mtime,
                meta.mode,
                meta.gid,
                meta.uid,
            ],
            || format!("obj_id {}, meta_addr {}", obj_id, fs_name.meta_addr),
        )?;

        if has_path {
            self.insert(
                "tsk_files_path",
                "INSERT INTO tsk_files_path (obj_id, path) VALUES (?1, ?2)",
                params![obj_id, path],
                || format!("obj_id {}", obj_id),
            )?;
        }

        Ok(Some(obj_id))
    }

    /// Add a file recovered from unallocated space of `fs_obj_id`.
    ///
    /// Carved files hang directly off the filesystem object and have no
    /// metadata address or times.
    pub fn add_carved_file_info(&self, fs_obj_id: ObjId, name: &str, size: u64) -> Result<ObjId> {
        let name = file::escape_quotes(name)?;

        let obj_id = self.add_object(ObjectType::File, Some(fs_obj_id))?;
        self.insert(
            "tsk_files",
            r#"
            INSERT INTO tsk_files (fs_obj_id, obj_id, type, attr_type, attr_id, name, meta_addr,
                dir_type, meta_type, dir_flags, meta_flags, size, crtime, ctime, atime, mtime, mode, gid, uid)
            VALUES (?1, ?2, ?3, NULL, NULL, ?4, NULL, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL, NULL, NULL, NULL, NULL)
            "#,
            params![
                fs_obj_id,
                obj_id,
                FileCategory::Carved.code(),
                name,
                NameType::Reg.code(),
                MetaType::Reg.code(),
                name_flags::UNALLOC,
                meta_flags::UNALLOC,
                size as i64,
            ],
            || format!("carved obj_id {}", obj_id),
        )?;
        Ok(obj_id)
    }

    // ========== Block Layout ==========

    /// Record one run of image bytes belonging to `file_obj_id`.
    ///
    /// Runs are stored as given, in call order; overlap and contiguity are
    /// the walker's business.
    pub fn add_fs_block_info(
        &self,
        fs_obj_id: ObjId,
        file_obj_id: ObjId,
        byte_start: u64,
        byte_len: u64,
    ) -> Result<()> {
        if !self.block_layout {
            return Err(Error::LayoutDisabled);
        }
        self.insert(
            "tsk_file_layout",
            "INSERT INTO tsk_file_layout (fs_id, byte_start, byte_len, obj_id) VALUES (?1, ?2, ?3, ?4)",
            params![fs_obj_id, byte_start as i64, byte_len as i64, file_obj_id],
            || format!("obj_id {}, byte_start {}", file_obj_id, byte_start),
        )
    }

    // ========== Transactions ==========

    /// Begin a transaction for bulk operations
    pub fn begin(&mut self) -> Result<()> {
        self.exec_control("BEGIN")
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.exec_control("COMMIT")
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        // Object ids of rolled back rows get reused
        self.fs_root.set(None);
        self.exec_control("ROLLBACK")
    }

    /// Set a named savepoint inside the open transaction.
    ///
    /// Names must be unique among unreleased savepoints; reuse behaves as
    /// SQLite defines it.
    pub fn savepoint(&mut self, name: &str) -> Result<()> {
        self.exec_control(&format!("SAVEPOINT {}", quote_ident(name)))
    }

    /// Undo everything since `name` was set; the savepoint stays open
    pub fn rollback_savepoint(&mut self, name: &str) -> Result<()> {
        self.fs_root.set(None);
        self.exec_control(&format!("ROLLBACK TO SAVEPOINT {}", quote_ident(name)))
    }

    /// Forget `name`, keeping its changes in the enclosing transaction
    pub fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.exec_control(&format!("RELEASE SAVEPOINT {}", quote_ident(name)))
    }

    // ========== Read Back ==========

    /// Get an object by id
    pub fn get_object(&self, obj_id: ObjId) -> Result<Option<ObjectRow>> {
        self.conn()?
            .query_row(
                "SELECT obj_id, par_obj_id, type FROM tsk_objects WHERE obj_id = ?1",
                [obj_id],
                row_to_object,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the direct children of an object, oldest first
    pub fn children_of(&self, par_obj_id: ObjId) -> Result<Vec<ObjectRow>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT obj_id, par_obj_id, type FROM tsk_objects WHERE par_obj_id = ?1 ORDER BY obj_id",
        )?;
        let children = stmt
            .query_map([par_obj_id], row_to_object)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(children)
    }

    /// Get a file row by object id
    pub fn get_file(&self, obj_id: ObjId) -> Result<Option<FileRow>> {
        self.conn()?
            .query_row(
                r#"
                SELECT fs_obj_id, obj_id, type, attr_type, attr_id, name, meta_addr, dir_type, meta_type,
                    dir_flags, meta_flags, size, crtime, ctime, atime, mtime, mode, uid, gid
                FROM tsk_files WHERE obj_id = ?1
                "#,
                [obj_id],
                row_to_file,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the parent path recorded for a file
    pub fn get_file_path(&self, obj_id: ObjId) -> Result<Option<String>> {
        self.conn()?
            .query_row(
                "SELECT path FROM tsk_files_path WHERE obj_id = ?1",
                [obj_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the segment names of an image ordered by sequence
    pub fn get_image_names(&self, obj_id: ObjId) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT name, sequence FROM tsk_image_names WHERE obj_id = ?1 ORDER BY sequence, rowid",
        )?;
        let names = stmt
            .query_map([obj_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Get the layout runs of a file in insertion order
    pub fn get_layout_runs(&self, file_obj_id: ObjId) -> Result<Vec<LayoutRun>> {
        if !self.block_layout {
            return Err(Error::LayoutDisabled);
        }
        let mut stmt = self.conn()?.prepare(
            "SELECT fs_id, obj_id, byte_start, byte_len FROM tsk_file_layout WHERE obj_id = ?1 ORDER BY rowid",
        )?;
        let runs = stmt
            .query_map([file_obj_id], |row| {
                Ok(LayoutRun {
                    fs_obj_id: row.get(0)?,
                    file_obj_id: row.get(1)?,
                    byte_start: row.get::<_, i64>(2)? as u64,
                    byte_len: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let count_type = |kind: ObjectType| {
            self.count(&format!("SELECT COUNT(*) FROM tsk_objects WHERE type = {}", kind.code()))
        };
        Ok(DbStats {
            objects: self.count("SELECT COUNT(*) FROM tsk_objects")?,
            images: count_type(ObjectType::Image)?,
            volume_systems: count_type(ObjectType::VolumeSystem)?,
            volumes: count_type(ObjectType::Volume)?,
            filesystems: count_type(ObjectType::Filesystem)?,
            files: count_type(ObjectType::File)?,
            carved_files: self.count(&format!(
                "SELECT COUNT(*) FROM tsk_files WHERE type = {}",
                FileCategory::Carved.code()
            ))?,
            layout_runs: if self.block_layout {
                Some(self.count("SELECT COUNT(*) FROM tsk_file_layout")?)
            } else {
                None
            },
        })
    }
}

impl Drop for CaseDb {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close database: {}", e);
        }
    }
}

/// Quote a savepoint name as an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_to_object(row: &rusqlite::Row) -> rusqlite::Result<ObjectRow> {
    let code: i64 = row.get(2)?;
    let kind = ObjectType::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(2, code))?;
    Ok(ObjectRow {
        obj_id: row.get(0)?,
        par_obj_id: row.get(1)?,
        kind,
    })
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRow> {
    let code: i64 = row.get(2)?;
    let category = FileCategory::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(2, code))?;
    Ok(FileRow {
        fs_obj_id: row.get(0)?,
        obj_id: row.get(1)?,
        category,
        attr_type: row.get(3)?,
        attr_id: row.get(4)?,
        name: row.get(5)?,
        meta_addr: row.get::<_, Option<i64>>(6)?.map(|a| a as u64),
        dir_type: row.get(7)?,
        meta_type: row.get(8)?,
        dir_flags: row.get(9)?,
        meta_flags: row.get(10)?,
        size: row.get(11)?,
        crtime: row.get(12)?,
        ctime: row.get(13)?,
        atime: row.get(14)?,
        mtime: row.get(15)?,
        mode: row.get(16)?,
        uid: row.get(17)?,
        gid: row.get(18)?,
    })
}

/// Version row of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaInfo {
    pub schema_version: i64,
    pub tool_version: i64,
}

/// A `tsk_files` row as stored. Columns that carved files leave NULL are options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub fs_obj_id: ObjId,
    pub obj_id: ObjId,
    pub category: FileCategory,
    pub attr_type: Option<i64>,
    pub attr_id: Option<i64>,
    /// Quote-escaped display name
    pub name: String,
    pub meta_addr: Option<u64>,
    pub dir_type: i64,
    pub meta_type: i64,
    pub dir_flags: i64,
    pub meta_flags: i64,
    pub size: i64,
    pub crtime: Option<i64>,
    pub ctime: Option<i64>,
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
    pub mode: Option<i64>,
    pub uid: Option<i64>,
    pub gid: Option<i64>,
}

impl FileRow {
    pub fn is_unallocated(&self) -> bool {
        self.dir_flags & i64::from(name_flags::UNALLOC) != 0
    }
}

/// One run of image bytes attributed to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRun {
    pub fs_obj_id: ObjId,
    pub file_obj_id: ObjId,
    pub byte_start: u64,
    pub byte_len: u64,
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub objects: usize,
    pub images: usize,
    pub volume_systems: usize,
    pub volumes: usize,
    pub filesystems: usize,
    pub files: usize,
    pub carved_files: usize,
    /// `None` when block layout is not tracked
    pub layout_runs: Option<usize>,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Objects: {}", self.objects)?;
        writeln!(f, "  Images: {}", self.images)?;
        writeln!(f, "  Volume systems: {}", self.volume_systems)?;
        writeln!(f, "  Volumes: {}", self.volumes)?;
        writeln!(f, "  Filesystems: {}", self.filesystems)?;
        writeln!(f, "  Files: {} ({} carved)", self.files, self.carved_files)?;
        match self.layout_runs {
            Some(runs) => writeln!(f, "  Layout runs: {}", runs),
            None => writeln!(f, "  Layout runs: not tracked"),
        }
    }
}
