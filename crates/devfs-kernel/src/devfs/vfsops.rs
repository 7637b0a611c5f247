//! devfs filesystem-type operations: mount, unmount, root, statfs, sysctl.

use std::sync::Arc;

use devfs_types::{DEV_BSIZE, FsCtlOp, FsId, LockMode, RulesetNumber, StatFs};

use super::policy;
use super::record::DevfsMount;
use super::tree::{DEVFS_ROOTINO, DeviceTree, VnodeCache};
use crate::config::DevfsState;
use crate::error::{DevfsError, DevfsResult};
use crate::vfs::{
    Credential, Mount, MountPrivate, SysctlRequest, UnmountFlags, VfsOps, VnodeRef,
};

/// Filesystem type name.
pub const DEVFS_NAME: &str = "devfs";

/// Filesystem type number, stamped into every devfs fsid.
pub const DEVFS_TYPE_NUM: u32 = 0x71;

/// Root vnode references owned by a mount (taken when the mount validates
/// its root).
const MOUNT_ROOT_REFS: u32 = 1;

/// The devfs filesystem type.
///
/// One instance serves any number of mounts; each mount's state lives in
/// its own [`DevfsMount`] record hung off the generic [`Mount`].
pub struct Devfs {
    state: Arc<DevfsState>,
    tree: Arc<dyn DeviceTree>,
    vnodes: Arc<dyn VnodeCache>,
}

impl std::fmt::Debug for Devfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Devfs").field("state", &self.state).finish()
    }
}

impl Devfs {
    pub fn new(
        state: Arc<DevfsState>,
        tree: Arc<dyn DeviceTree>,
        vnodes: Arc<dyn VnodeCache>,
    ) -> Self {
        Self {
            state,
            tree,
            vnodes,
        }
    }

    /// Process-wide state this filesystem was built with.
    pub fn state(&self) -> &Arc<DevfsState> {
        &self.state
    }

    fn record(mp: &Mount) -> DevfsResult<Arc<DevfsMount>> {
        mp.data::<DevfsMount>()
            .ok_or_else(|| DevfsError::not_mounted(mp.path().display().to_string()))
    }

    /// Update an existing mount in place.
    fn update(&self, mp: &Mount, rsnum: RulesetNumber) -> DevfsResult<()> {
        let fmp = Self::record(mp)?;
        policy::apply_aux_opts(mp, &mut fmp.write(), self.state.expand_symlinks());

        if !rsnum.is_none() {
            let mut dm = fmp.write();
            dm.ruleset = rsnum;
            self.tree.ruleset_set(rsnum, &mut dm);
            self.tree.ruleset_apply(&mut dm);
        }
        Ok(())
    }

    /// Unwind a fresh mount that failed after its record was attached.
    fn abort_mount(&self, mp: &Mount, fmp: &DevfsMount, cause: &DevfsError) {
        tracing::warn!(
            mount = %mp.path().display(),
            id = %fmp.id(),
            "devfs mount failed, rolling back: {}",
            cause
        );
        {
            let mut dm = fmp.write();
            self.tree.cleanup(&mut dm);
            dm.clear_rootdir();
            dm.clear_mount();
            if let Err(e) = dm.unhold() {
                tracing::error!("{}", e);
            }
        }
        mp.set_data(None);
        fmp.finalize();
    }
}

impl VfsOps for Devfs {
    fn name(&self) -> &'static str {
        DEVFS_NAME
    }

    #[tracing::instrument(
        skip(self, mp, cred),
        fields(mount = %mp.path().display()),
        name = "devfs.mount"
    )]
    fn mount(&self, mp: &Arc<Mount>, cred: &dyn Credential) -> DevfsResult<()> {
        let flags = mp.flags();
        if flags.rootfs {
            return Err(DevfsError::unsupported(format!(
                "{}: devfs cannot be the root filesystem",
                mp.path().display()
            )));
        }

        let rsnum = policy::effective_ruleset(mp, cred)?;

        if flags.update {
            return self.update(mp, rsnum);
        }
        if mp.has_data() {
            return Err(DevfsError::busy(format!(
                "{}: already carries a mounted filesystem",
                mp.path().display()
            )));
        }

        let idx = self.state.ids().allocate().inspect_err(|e| {
            tracing::warn!("{}: {}", mp.path().display(), e);
        })?;
        let fmp = DevfsMount::new(idx, Arc::clone(self.state.ids()));

        mp.update_flags(|f| {
            f.local = true;
            f.lookup_shared = true;
            f.extended_shared = true;
        });
        fmp.write().set_mount(mp);
        let private: MountPrivate = fmp.clone();
        mp.set_data(Some(private));
        mp.set_fsid(FsId::new(idx.get(), DEVFS_TYPE_NUM));

        policy::apply_aux_opts(mp, &mut fmp.write(), self.state.expand_symlinks());

        let rootdir = match self.tree.mkdir(idx, None, "", DEVFS_ROOTINO) {
            Ok(dir) => dir,
            Err(e) => {
                let e = match e {
                    e @ DevfsError::Internal(_) => e,
                    other => DevfsError::internal(other.to_string()),
                };
                self.abort_mount(mp, &fmp, &e);
                return Err(e);
            }
        };
        fmp.write().set_rootdir(rootdir);

        let rvp = match self.root(mp, LockMode::Exclusive) {
            Ok(vp) => vp,
            Err(e) => {
                self.abort_mount(mp, &fmp, &e);
                return Err(e);
            }
        };

        if !rsnum.is_none() {
            let mut dm = fmp.write();
            dm.ruleset = rsnum;
            self.tree.ruleset_set(rsnum, &mut dm);
        }

        // The reference stays with the mount; unmount's flush accounts for it.
        rvp.unlock();

        mp.set_fstypename(DEVFS_NAME);
        mp.set_mounted_from(DEVFS_NAME);
        tracing::debug!(id = %idx, ruleset = %rsnum, "devfs mounted");
        Ok(())
    }

    #[tracing::instrument(
        skip(self, mp),
        fields(mount = %mp.path().display()),
        name = "devfs.unmount"
    )]
    fn unmount(&self, mp: &Mount, flags: UnmountFlags) -> DevfsResult<()> {
        let fmp = Self::record(mp)?;
        let idx = fmp.id();
        {
            let mut dm = fmp.write();
            if dm.is_unmounted() {
                return Err(DevfsError::internal(format!(
                    "devfs mount {} already unmounted",
                    idx
                )));
            }
            if dm.is_unmounting() {
                return Err(DevfsError::busy(format!(
                    "devfs mount {} is already being unmounted",
                    idx
                )));
            }
            // Waits out root lookups in flight; later ones are refused.
            dm.set_unmounting(true);
        }

        if let Err(e) = self.vnodes.flush(idx, MOUNT_ROOT_REFS, flags.force) {
            fmp.write().set_unmounting(false);
            tracing::warn!(id = %idx, "unmount refused: {}", e);
            return Err(e);
        }

        let hold = {
            let mut dm = fmp.write();
            dm.set_unmounting(false);
            self.tree.cleanup(&mut dm);
            self.tree.rules_cleanup(&mut dm);
            dm.ruleset = RulesetNumber::NONE;
            dm.clear_rootdir();
            dm.clear_mount();
            dm.unhold()?
        };
        mp.set_data(None);

        if hold == 0 {
            fmp.finalize();
        } else {
            tracing::debug!(id = %idx, holders = hold, "devfs record outlives its mount");
        }
        Ok(())
    }

    #[tracing::instrument(
        skip(self, mp),
        fields(mount = %mp.path().display()),
        name = "devfs.root"
    )]
    fn root(&self, mp: &Mount, lock: LockMode) -> DevfsResult<VnodeRef> {
        let fmp = Self::record(mp)?;
        let vp = {
            let dm = fmp.read();
            let idx = dm.idx();
            if dm.is_unmounting() {
                return Err(DevfsError::not_mounted(format!(
                    "devfs mount {} is being unmounted",
                    idx
                )));
            }
            let rootdir = dm.rootdir().ok_or_else(|| {
                DevfsError::not_mounted(format!("devfs mount {} has no root", idx))
            })?;
            let vp = self.tree.alloc_vnode(rootdir, idx)?;
            vp.set_root();
            vp
        };

        // Blocking on the vnode lock happens outside the record lock.
        vp.lock(lock);
        if vp.is_doomed() {
            vp.unlock();
            vp.vrele();
            return Err(DevfsError::not_mounted(format!(
                "{}: root vnode reclaimed",
                mp.path().display()
            )));
        }
        Ok(vp)
    }

    fn statfs(&self, mp: &Mount) -> DevfsResult<StatFs> {
        Ok(StatFs {
            flags: 0,
            bsize: DEV_BSIZE,
            iosize: DEV_BSIZE,
            blocks: 2, // 1K to keep df happy
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            fsid: mp.fsid(),
            fstypename: DEVFS_NAME.to_string(),
            mntfromname: mp.mounted_from(),
            mntonname: mp.path().display().to_string(),
        })
    }

    fn sysctl(&self, mp: &Mount, op: FsCtlOp, req: &mut SysctlRequest<'_>) -> DevfsResult<()> {
        match op {
            FsCtlOp::MountOpts => {
                let fmp = Self::record(mp)?;
                let mntopts = if fmp.flags().expand_symlinks {
                    "expandsymlinks"
                } else {
                    ""
                };
                let mut bytes = Vec::with_capacity(mntopts.len() + 1);
                bytes.extend_from_slice(mntopts.as_bytes());
                bytes.push(0);

                if !req.has_buffer() {
                    req.set_oldidx(bytes.len());
                    return Ok(());
                }
                req.out(&bytes)
            }
            FsCtlOp::Other(n) => Err(DevfsError::not_supported(format!(
                "{}: fs control op {:#x}",
                mp.path().display(),
                n
            ))),
        }
    }
}
