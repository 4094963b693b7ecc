//! Container metadata - images, volume systems, volumes and filesystems
//!
//! These are the raw attribute sets a volume/filesystem walker reports for
//! each container it opens. Type codes (`container_type`, `vs_type`,
//! `fs_type`) are the walker's native codes and are stored verbatim.

use serde::{Deserialize, Serialize};

/// A disk image (possibly split over several segment files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Image container format code (raw, split, EWF, ...)
    pub container_type: u32,
    /// Sector size in bytes
    pub sector_size: u32,
}

impl ImageInfo {
    pub fn new(container_type: u32, sector_size: u32) -> Self {
        Self { container_type, sector_size }
    }
}

/// A partition table found inside an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VsInfo {
    pub vs_type: u32,
    /// Byte offset of the volume system in the image
    pub offset: u64,
    pub block_size: u32,
}

/// One partition of a volume system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Index of the entry in the partition table
    pub addr: u32,
    /// First block of the partition, in volume system blocks
    pub start: u64,
    /// Length in volume system blocks
    pub len: u64,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub flags: u32,
}

/// A filesystem found in an image or volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsInfo {
    /// Byte offset of the filesystem in the image
    pub offset: u64,
    pub fs_type: u32,
    pub block_size: u32,
    pub block_count: u64,
    /// Metadata address of the root directory; files with this address
    /// hang off the filesystem object
    pub root_inum: u64,
    pub first_inum: u64,
    pub last_inum: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_optional_fields_default() {
        let vol: VolumeInfo = serde_json::from_str(r#"{"addr": 0, "start": 0, "len": 63}"#).unwrap();
        assert_eq!(vol.desc, "");
        assert_eq!(vol.flags, 0);
    }

    #[test]
    fn test_fs_info_requires_root_inum() {
        let missing = r#"{"offset": 0, "fs_type": 8, "block_size": 4096, "block_count": 10,
                          "first_inum": 1, "last_inum": 50}"#;
        assert!(serde_json::from_str::<FsInfo>(missing).is_err());
    }
}
