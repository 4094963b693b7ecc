//! File records - the per-file attribute sets reported by a filesystem walker
//!
//! A walker reports a file as a directory entry (`FsName`), an optional
//! metadata record (`FsMeta`) and, for multi-stream filesystems, the data
//! attribute being recorded (`FsAttr`). The name stored for a file is built
//! from the entry name and the attribute name by [`display_name`].

use crate::Result;
use serde::{Deserialize, Serialize};

/// Attribute type of the NTFS directory index root (`$INDEX_ROOT`).
pub const NTFS_IDXROOT_ATTR_TYPE: u32 = 0x90;

/// Attribute name NTFS synthesizes for directory index attributes.
pub const NTFS_IDXROOT_ATTR_NAME: &str = "$I30";

/// How a file record came to exist. Stored in `tsk_files.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    /// Found while walking a live filesystem
    FromFilesystem,
    /// Recovered from unallocated space
    Carved,
    /// Produced from another file (extraction, decompression)
    Derived,
}

impl FileCategory {
    pub fn code(&self) -> i64 {
        match self {
            FileCategory::FromFilesystem => 0,
            FileCategory::Carved => 1,
            FileCategory::Derived => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FileCategory::FromFilesystem),
            1 => Some(FileCategory::Carved),
            2 => Some(FileCategory::Derived),
            _ => None,
        }
    }
}

/// File type according to the directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameType {
    #[default]
    Undef,
    Fifo,
    Chr,
    Dir,
    Blk,
    Reg,
    Lnk,
    Sock,
    Shad,
    Wht,
    Virt,
}

impl NameType {
    /// Code stored in `tsk_files.dir_type`
    pub fn code(&self) -> i64 {
        match self {
            NameType::Undef => 0,
            NameType::Fifo => 1,
            NameType::Chr => 2,
            NameType::Dir => 3,
            NameType::Blk => 4,
            NameType::Reg => 5,
            NameType::Lnk => 6,
            NameType::Sock => 7,
            NameType::Shad => 8,
            NameType::Wht => 9,
            NameType::Virt => 10,
        }
    }
}

/// File type according to the metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    #[default]
    Undef,
    Reg,
    Dir,
    Fifo,
    Chr,
    Blk,
    Lnk,
    Shad,
    Sock,
    Wht,
    Virt,
}

impl MetaType {
    /// Code stored in `tsk_files.meta_type`
    pub fn code(&self) -> i64 {
        match self {
            MetaType::Undef => 0,
            MetaType::Reg => 1,
            MetaType::Dir => 2,
            MetaType::Fifo => 3,
            MetaType::Chr => 4,
            MetaType::Blk => 5,
            MetaType::Lnk => 6,
            MetaType::Shad => 7,
            MetaType::Sock => 8,
            MetaType::Wht => 9,
            MetaType::Virt => 10,
        }
    }
}

/// Directory entry allocation flags (`tsk_files.dir_flags`).
pub mod name_flags {
    pub const ALLOC: u32 = 0x01;
    pub const UNALLOC: u32 = 0x02;
}

/// Metadata record flags (`tsk_files.meta_flags`).
pub mod meta_flags {
    pub const ALLOC: u32 = 0x01;
    pub const UNALLOC: u32 = 0x02;
    pub const USED: u32 = 0x04;
}

/// Directory entry of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsName {
    pub name: String,
    /// Address of the file's own metadata record
    pub meta_addr: u64,
    /// Address of the parent directory's metadata record
    pub par_addr: u64,
    #[serde(default, rename = "type")]
    pub name_type: NameType,
    #[serde(default)]
    pub flags: u32,
}

/// Metadata record of a file. Timestamps are seconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsMeta {
    #[serde(rename = "type")]
    pub meta_type: MetaType,
    pub flags: u32,
    pub size: i64,
    pub crtime: i64,
    pub ctime: i64,
    pub atime: i64,
    pub mtime: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

/// Data attribute of a file (NTFS streams, HFS forks, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsAttr {
    #[serde(rename = "type")]
    pub attr_type: u32,
    pub id: u16,
    #[serde(default)]
    pub name: Option<String>,
}

impl FsAttr {
    /// Attribute name to append to the file name, if it carries meaning.
    ///
    /// The NTFS index root name is skipped: it is synthesized for every
    /// directory and says nothing about the file.
    pub fn visible_name(&self) -> Option<&str> {
        let name = self.name.as_deref()?;
        if self.attr_type == NTFS_IDXROOT_ATTR_TYPE && name == NTFS_IDXROOT_ATTR_NAME {
            return None;
        }
        Some(name)
    }
}

/// A file as reported by the walker.
///
/// Entries without a name (orphaned metadata) are legal but are not recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsFile {
    #[serde(default)]
    pub name: Option<FsName>,
    #[serde(default)]
    pub meta: Option<FsMeta>,
}

impl FsFile {
    pub fn new(name: FsName, meta: Option<FsMeta>) -> Self {
        Self { name: Some(name), meta }
    }

    /// Metadata with every numeric field zeroed when the record is missing
    pub fn meta_or_default(&self) -> FsMeta {
        self.meta.clone().unwrap_or_default()
    }
}

/// Double every single quote in `text`.
///
/// `'` delimits SQL text literals; names are stored in this escaped form.
pub fn escape_quotes(text: &str) -> Result<String> {
    let mut out = String::new();
    out.try_reserve(text.len() * 2)?;
    push_escaped(&mut out, text);
    Ok(out)
}

/// Build the stored name of a file: the escaped entry name, followed by
/// `:` and the escaped attribute name when the attribute has a visible name.
pub fn display_name(name: &str, attr: Option<&FsAttr>) -> Result<String> {
    let attr_name = attr.and_then(FsAttr::visible_name);
    let attr_len = attr_name.map_or(0, str::len);

    let mut out = String::new();
    out.try_reserve(2 * (name.len() + attr_len) + 1)?;
    push_escaped(&mut out, name);
    if let Some(attr_name) = attr_name.filter(|n| !n.is_empty()) {
        out.push(':');
        push_escaped(&mut out, attr_name);
    }
    Ok(out)
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(attr_type: u32, name: Option<&str>) -> FsAttr {
        FsAttr { attr_type, id: 3, name: name.map(str::to_string) }
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes("O'Brien").unwrap(), "O''Brien");
        assert_eq!(escape_quotes("plain.txt").unwrap(), "plain.txt");
        assert_eq!(escape_quotes("''").unwrap(), "''''");
    }

    #[test]
    fn test_escaping_twice_double_escapes() {
        let once = escape_quotes("it's").unwrap();
        let twice = escape_quotes(&once).unwrap();
        assert_eq!(once, "it''s");
        assert_eq!(twice, "it''''s");
    }

    #[test]
    fn test_display_name_without_attr() {
        assert_eq!(display_name("report.doc", None).unwrap(), "report.doc");
    }

    #[test]
    fn test_display_name_with_stream() {
        let ads = attr(0x80, Some("Zone.Identifier"));
        assert_eq!(display_name("setup.exe", Some(&ads)).unwrap(), "setup.exe:Zone.Identifier");
    }

    #[test]
    fn test_display_name_escapes_both_parts() {
        let ads = attr(0x80, Some("Bob's"));
        assert_eq!(display_name("O'Brien", Some(&ads)).unwrap(), "O''Brien:Bob''s");
    }

    #[test]
    fn test_display_name_skips_index_root() {
        let idx = attr(NTFS_IDXROOT_ATTR_TYPE, Some(NTFS_IDXROOT_ATTR_NAME));
        assert_eq!(display_name("Windows", Some(&idx)).unwrap(), "Windows");

        // Only the combination of type and name is synthetic
        let other = attr(0x80, Some(NTFS_IDXROOT_ATTR_NAME));
        assert_eq!(display_name("x", Some(&other)).unwrap(), "x:$I30");
    }

    #[test]
    fn test_display_name_unnamed_attr() {
        let data = attr(0x80, None);
        assert_eq!(display_name("data.bin", Some(&data)).unwrap(), "data.bin");
    }

    #[test]
    fn test_missing_meta_defaults_to_zero() {
        let file = FsFile::new(
            FsName {
                name: "orphan".to_string(),
                meta_addr: 40,
                par_addr: 5,
                name_type: NameType::Reg,
                flags: name_flags::UNALLOC,
            },
            None,
        );
        let meta = file.meta_or_default();
        assert_eq!(meta.size, 0);
        assert_eq!(meta.mtime, 0);
        assert_eq!(meta.meta_type.code(), 0);
    }

    #[test]
    fn test_file_category_codes() {
        assert_eq!(FileCategory::FromFilesystem.code(), 0);
        assert_eq!(FileCategory::Carved.code(), 1);
        assert_eq!(FileCategory::from_code(2), Some(FileCategory::Derived));
    }
}
