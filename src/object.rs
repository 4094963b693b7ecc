//! Object hierarchy types
//!
//! Every stored entity is first an object: a row in `tsk_objects` with an
//! engine-assigned id, an optional parent id and a type code.
//! - `Image`: root of a hierarchy, never has a parent
//! - `VolumeSystem`: partition table inside an image
//! - `Volume`: one partition
//! - `Filesystem`: filesystem inside an image or volume
//! - `File`: file or directory inside a filesystem

use serde::{Deserialize, Serialize};

/// Identifier assigned by the store to every object.
pub type ObjId = i64;

/// Type of a node in the object hierarchy.
///
/// The numeric codes are part of the persisted schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Image,
    VolumeSystem,
    Volume,
    Filesystem,
    File,
}

impl ObjectType {
    /// Code stored in `tsk_objects.type`
    pub fn code(&self) -> i64 {
        match self {
            ObjectType::Image => 0,
            ObjectType::VolumeSystem => 1,
            ObjectType::Volume => 2,
            ObjectType::Filesystem => 3,
            ObjectType::File => 4,
        }
    }

    /// Map a stored type code back to the enum
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ObjectType::Image),
            1 => Some(ObjectType::VolumeSystem),
            2 => Some(ObjectType::Volume),
            3 => Some(ObjectType::Filesystem),
            4 => Some(ObjectType::File),
            _ => None,
        }
    }

    /// Get the string representation of the object type
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Image => "image",
            ObjectType::VolumeSystem => "volume_system",
            ObjectType::Volume => "volume",
            ObjectType::Filesystem => "filesystem",
            ObjectType::File => "file",
        }
    }

    /// Types an object of this type may hang off; empty for roots
    pub fn parent_types(&self) -> &'static [ObjectType] {
        match self {
            ObjectType::Image => &[],
            ObjectType::VolumeSystem => &[ObjectType::Image],
            ObjectType::Volume => &[ObjectType::VolumeSystem],
            ObjectType::Filesystem => &[ObjectType::Image, ObjectType::Volume],
            ObjectType::File => &[ObjectType::Filesystem, ObjectType::File],
        }
    }

    /// Get all object types
    pub fn all() -> &'static [ObjectType] {
        &[
            ObjectType::Image,
            ObjectType::VolumeSystem,
            ObjectType::Volume,
            ObjectType::Filesystem,
            ObjectType::File,
        ]
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the object hierarchy as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRow {
    pub obj_id: ObjId,
    /// `None` only for images
    pub par_obj_id: Option<ObjId>,
    pub kind: ObjectType,
}

impl ObjectRow {
    pub fn is_root(&self) -> bool {
        self.par_obj_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_codes_roundtrip() {
        for kind in ObjectType::all() {
            assert_eq!(ObjectType::from_code(kind.code()), Some(*kind));
        }
        assert_eq!(ObjectType::from_code(5), None);
    }

    #[test]
    fn test_object_type_codes_are_stable() {
        assert_eq!(ObjectType::Image.code(), 0);
        assert_eq!(ObjectType::VolumeSystem.code(), 1);
        assert_eq!(ObjectType::Volume.code(), 2);
        assert_eq!(ObjectType::Filesystem.code(), 3);
        assert_eq!(ObjectType::File.code(), 4);
    }

    #[test]
    fn test_only_images_are_roots() {
        let roots: Vec<_> = ObjectType::all()
            .iter()
            .filter(|kind| kind.parent_types().is_empty())
            .collect();
        assert_eq!(roots, vec![&ObjectType::Image]);
        assert!(ObjectType::File.parent_types().contains(&ObjectType::File));
        assert!(!ObjectType::File.parent_types().contains(&ObjectType::Image));
    }
}
