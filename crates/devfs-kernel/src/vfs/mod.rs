//! Generic mount framework shim.
//!
//! The pieces of the surrounding VFS that devfs talks to:
//!
//! - [`VfsOps`] - Capability set a filesystem type implements
//! - [`Mount`] - Generic mount object with a filesystem-private data slot
//! - [`MountOptions`] - Ordered `-o` style option list
//! - [`MountTable`] - Routes mount requests and queries by mount point
//! - [`Vnode`] - Referenced, lockable node handle
//! - [`Credential`] - Caller capabilities and jail ruleset

mod cred;
mod mount;
mod ops;
mod options;
mod table;
mod vnode;

pub use cred::{Cred, Credential, Prison};
pub use mount::{Mount, MountFlags, MountPrivate};
pub use ops::{SysctlRequest, UnmountFlags, VfsOps};
pub use options::{GLOBAL_OPTS, MountOption, MountOptions};
pub use table::{MountInfo, MountTable};
pub use vnode::{Vnode, VnodeRef};
