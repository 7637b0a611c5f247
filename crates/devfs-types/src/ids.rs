//! Typed identifiers for mounts.
//!
//! `MountId` is the small integer handed out by the mount-id allocator.
//! Values are reused after release, so a `MountId` only names a mount while
//! that mount's record is alive; never persist one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a live devfs mount record.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountId(u32);

impl MountId {
    /// Wrap a raw allocator value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw integer.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MountId({})", self.0)
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<MountId> for u32 {
    fn from(id: MountId) -> Self {
        id.0
    }
}

/// Filesystem id as stamped on a generic mount: `[instance, fs type]`.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FsId {
    pub val: [u32; 2],
}

impl FsId {
    /// Build an fsid from a per-instance value and a filesystem type number.
    pub const fn new(instance: u32, fs_type: u32) -> Self {
        Self {
            val: [instance, fs_type],
        }
    }

    /// Filesystem type half of the id.
    pub const fn fs_type(&self) -> u32 {
        self.val[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_id_display() {
        let id = MountId::new(7);
        assert_eq!(id.to_string(), "7");
        assert_eq!(format!("{:?}", id), "MountId(7)");
        assert_eq!(u32::from(id), 7);
    }

    #[test]
    fn test_mount_id_ordering() {
        assert!(MountId::new(1) < MountId::new(2));
    }

    #[test]
    fn test_fsid_halves() {
        let fsid = FsId::new(3, 0x71);
        assert_eq!(fsid.val[0], 3);
        assert_eq!(fsid.fs_type(), 0x71);
    }
}
