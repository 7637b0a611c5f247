//! # devfs-kernel
//!
//! Mount lifecycle core of devfs, the device filesystem.
//!
//! Each devfs mount gets:
//! - A small integer id from a process-wide allocator, reused after the
//!   mount is destroyed
//! - A per-mount record ([`DevfsMount`]) behind a reader-writer lock
//! - A root directory in the device-node tree and a root vnode
//! - An optional ruleset, forced to the jail's ruleset for jailed callers
//!
//! The filesystem-type operations (mount, unmount, root, statfs, sysctl)
//! live on [`Devfs`], which implements [`VfsOps`]. The device-node tree and
//! the vnode cache are collaborators behind the [`DeviceTree`] and
//! [`VnodeCache`] traits; [`backends`] has in-memory versions of both.

pub mod backends;
pub mod config;
pub mod devfs;
pub mod error;
pub mod idalloc;
pub mod vfs;

pub use backends::{MemoryDeviceTree, MemoryVnodeCache};
pub use config::{DevfsConfig, DevfsState, EXPAND_SYMLINKS_ENV};
pub use devfs::{
    DEVFS_NAME, DEVFS_ROOTINO, DEVFS_TYPE_NUM, DeviceTree, Devfs, DevfsFlags, DevfsMount,
    DirHandle, MountData, VnodeCache,
};
pub use error::{DevfsError, DevfsResult};
pub use idalloc::{DEFAULT_ID_LIMIT, MountIdAllocator};
pub use vfs::{
    Cred, Credential, Mount, MountFlags, MountInfo, MountOptions, MountPrivate, MountTable,
    Prison, SysctlRequest, UnmountFlags, VfsOps, Vnode, VnodeRef,
};

pub use devfs_types::{
    DEV_BSIZE, FsCtlOp, FsId, LockMode, MountId, PrisonAllow, RulesetNumber, StatFs,
};
