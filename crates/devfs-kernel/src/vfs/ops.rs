//! Filesystem operations trait.
//!
//! The mount framework drives a filesystem type through this capability
//! set. devfs implements it once; the [`MountTable`](super::MountTable)
//! dispatches through it.

use std::sync::Arc;

use devfs_types::{FsCtlOp, LockMode, StatFs};

use super::cred::Credential;
use super::mount::Mount;
use super::vnode::VnodeRef;
use crate::error::{DevfsError, DevfsResult};

/// Unmount request flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmountFlags {
    /// Reclaim vnodes even if they are still referenced.
    pub force: bool,
}

impl UnmountFlags {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Output side of a filesystem control query.
///
/// Without a buffer the request only measures: `oldidx` ends up holding the
/// number of bytes the answer needs.
#[derive(Debug)]
pub struct SysctlRequest<'a> {
    old: Option<&'a mut [u8]>,
    oldidx: usize,
}

impl<'a> SysctlRequest<'a> {
    /// A request that only asks for the answer's length.
    pub fn measure() -> Self {
        Self {
            old: None,
            oldidx: 0,
        }
    }

    /// A request copying the answer into `buf`.
    pub fn with_buffer(buf: &'a mut [u8]) -> Self {
        Self {
            old: Some(buf),
            oldidx: 0,
        }
    }

    /// True if the caller supplied an output buffer.
    pub fn has_buffer(&self) -> bool {
        self.old.is_some()
    }

    /// Bytes produced (or needed, when only measuring).
    pub fn oldidx(&self) -> usize {
        self.oldidx
    }

    pub fn set_oldidx(&mut self, n: usize) {
        self.oldidx = n;
    }

    /// Copy `bytes` out at the current offset.
    ///
    /// The offset always advances so a caller can learn the needed size
    /// from a failed copy.
    pub fn out(&mut self, bytes: &[u8]) -> DevfsResult<()> {
        let start = self.oldidx;
        self.oldidx += bytes.len();
        let Some(buf) = self.old.as_deref_mut() else {
            return Ok(());
        };
        let end = start + bytes.len();
        if end > buf.len() {
            return Err(DevfsError::BufferTooSmall {
                needed: end,
                available: buf.len(),
            });
        }
        buf[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// Filesystem-type operations.
pub trait VfsOps: Send + Sync {
    /// Filesystem type name.
    fn name(&self) -> &'static str;

    /// Create a mount, or update one when `mp.flags().update` is set.
    fn mount(&self, mp: &Arc<Mount>, cred: &dyn Credential) -> DevfsResult<()>;

    /// Tear down a mount.
    fn unmount(&self, mp: &Mount, flags: UnmountFlags) -> DevfsResult<()>;

    /// Locked, referenced root vnode.
    fn root(&self, mp: &Mount, lock: LockMode) -> DevfsResult<VnodeRef>;

    /// Filesystem statistics.
    fn statfs(&self, mp: &Mount) -> DevfsResult<StatFs>;

    /// Filesystem control query.
    fn sysctl(&self, mp: &Mount, op: FsCtlOp, req: &mut SysctlRequest<'_>) -> DevfsResult<()>;
}
