//! Filesystem statistics.

use serde::{Deserialize, Serialize};

use crate::ids::FsId;

/// Size of a device block in bytes.
pub const DEV_BSIZE: u32 = 512;

/// Filesystem statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFs {
    /// Copy of the mount flags word.
    pub flags: u64,
    /// Fundamental block size.
    pub bsize: u32,
    /// Optimal transfer block size.
    pub iosize: u32,
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Total inodes.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Filesystem id.
    pub fsid: FsId,
    /// Filesystem type name.
    pub fstypename: String,
    /// Mounted-from name.
    pub mntfromname: String,
    /// Mounted-on path.
    pub mntonname: String,
}

impl Default for StatFs {
    fn default() -> Self {
        Self {
            flags: 0,
            bsize: DEV_BSIZE,
            iosize: DEV_BSIZE,
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            fsid: FsId::default(),
            fstypename: String::new(),
            mntfromname: String::new(),
            mntonname: String::new(),
        }
    }
}

impl StatFs {
    /// Total size in bytes implied by `blocks * bsize`.
    pub fn total_bytes(&self) -> u64 {
        self.blocks * u64::from(self.bsize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_block_size() {
        let st = StatFs::default();
        assert_eq!(st.bsize, DEV_BSIZE);
        assert_eq!(st.iosize, DEV_BSIZE);
        assert_eq!(st.total_bytes(), 0);
    }

    #[test]
    fn test_total_bytes() {
        let st = StatFs {
            blocks: 2,
            ..Default::default()
        };
        assert_eq!(st.total_bytes(), 1024);
    }
}
