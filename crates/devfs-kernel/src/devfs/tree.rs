//! Collaborators devfs calls out to.
//!
//! The device-node tree decides which nodes exist and which a ruleset lets a
//! mount see; the vnode cache owns vnodes. devfs only drives them through
//! these narrow interfaces.

use devfs_types::{MountId, RulesetNumber};

use super::record::MountData;
use crate::error::DevfsResult;
use crate::vfs::VnodeRef;

/// Inode number of a devfs root directory.
pub const DEVFS_ROOTINO: u64 = 2;

/// Handle to a directory entry in the device-node tree.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct DirHandle {
    /// Tree-private key.
    pub key: u64,
    /// Inode number.
    pub ino: u64,
}

/// The device-node tree.
///
/// Methods taking `&mut MountData` are called with the record's exclusive
/// lock held and must not try to take it again.
pub trait DeviceTree: Send + Sync {
    /// Create a directory entry for `mount`.
    fn mkdir(
        &self,
        mount: MountId,
        parent: Option<DirHandle>,
        name: &str,
        ino: u64,
    ) -> DevfsResult<DirHandle>;

    /// Produce (or reuse) a referenced, unlocked vnode for `dir`.
    ///
    /// Called with the record's shared lock held, so it must not block on
    /// vnode locks. A doomed cached vnode is never handed out again.
    fn alloc_vnode(&self, dir: DirHandle, mount: MountId) -> DevfsResult<VnodeRef>;

    /// Drop every entry belonging to the mount.
    fn cleanup(&self, dm: &mut MountData);

    /// Drop every ruleset binding of the mount.
    fn rules_cleanup(&self, dm: &mut MountData);

    /// Bind the mount to ruleset `rsnum`.
    fn ruleset_set(&self, rsnum: RulesetNumber, dm: &mut MountData);

    /// Re-evaluate visibility of existing nodes under the bound ruleset.
    fn ruleset_apply(&self, dm: &mut MountData);
}

/// The vnode cache.
pub trait VnodeCache: Send + Sync {
    /// Reclaim every vnode of `mount`.
    ///
    /// The root vnode may carry up to `rootrefs` references without counting
    /// as busy. Without `force`, any other referenced vnode refuses the
    /// flush with `Busy` and leaves everything in place.
    fn flush(&self, mount: MountId, rootrefs: u32, force: bool) -> DevfsResult<()>;
}
