//! The devfs mount core.
//!
//! Lifecycle of a mount:
//!
//! ```text
//! Unmounted ──mount──▶ Mounting ──root ok──▶ Mounted ──unmount──▶ Unmounting
//!                          │                  │  ▲                    │
//!                          └─ failure:        └──┘ update             ├─ flush busy:
//!                             full rollback                           │  stays Mounted
//!                                                                     ▼
//!                                                                 Destroyed
//! ```
//!
//! - [`Devfs`] - Filesystem type, implements [`VfsOps`](crate::vfs::VfsOps)
//! - [`DevfsMount`] - Per-mount record behind a reader-writer lock
//! - [`DeviceTree`] / [`VnodeCache`] - External collaborators
//! - [`policy`] - Option checks and ruleset selection

pub mod policy;
mod record;
mod tree;
mod vfsops;

pub use record::{DevfsFlags, DevfsMount, MountData};
pub use tree::{DEVFS_ROOTINO, DeviceTree, DirHandle, VnodeCache};
pub use vfsops::{DEVFS_NAME, DEVFS_TYPE_NUM, Devfs};
