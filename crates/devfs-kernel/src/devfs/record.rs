//! Per-mount devfs record.
//!
//! One [`DevfsMount`] exists per live devfs mount. Its reader-writer lock
//! guards every mutable field. The hold count starts at 1 for the mount
//! itself; collaborators that need the record to outlive an unmount take
//! extra holds. Whoever drops the count from 1 to 0 on an unmounted record
//! destroys it, which returns the mount id to the allocator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use devfs_types::{MountId, RulesetNumber};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::tree::DirHandle;
use crate::error::{DevfsError, DevfsResult};
use crate::idalloc::MountIdAllocator;
use crate::vfs::Mount;

/// Per-mount behavior flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevfsFlags {
    /// Expand symlinks on read.
    pub expand_symlinks: bool,
}

/// Mutable state of a devfs mount, reachable only through the record lock.
#[derive(Debug)]
pub struct MountData {
    idx: MountId,
    pub flags: DevfsFlags,
    pub ruleset: RulesetNumber,
    holdcnt: u32,
    rootdir: Option<DirHandle>,
    mount: Option<Weak<Mount>>,
    unmounting: bool,
}

impl MountData {
    /// Id of the owning record.
    pub fn idx(&self) -> MountId {
        self.idx
    }

    pub fn hold_count(&self) -> u32 {
        self.holdcnt
    }

    /// Root directory in the device-node tree.
    pub fn rootdir(&self) -> Option<DirHandle> {
        self.rootdir
    }

    /// The generic mount, if still attached and alive.
    pub fn mount(&self) -> Option<Arc<Mount>> {
        self.mount.as_ref().and_then(Weak::upgrade)
    }

    /// True once unmount has cleared the back-reference.
    pub fn is_unmounted(&self) -> bool {
        self.mount.is_none()
    }

    /// True while an unmount is flushing vnodes.
    pub fn is_unmounting(&self) -> bool {
        self.unmounting
    }

    pub(crate) fn set_unmounting(&mut self, on: bool) {
        self.unmounting = on;
    }

    pub(crate) fn set_mount(&mut self, mp: &Arc<Mount>) {
        self.mount = Some(Arc::downgrade(mp));
    }

    pub(crate) fn clear_mount(&mut self) {
        self.mount = None;
    }

    pub(crate) fn set_rootdir(&mut self, dir: DirHandle) {
        self.rootdir = Some(dir);
    }

    pub(crate) fn clear_rootdir(&mut self) {
        self.rootdir = None;
    }

    /// Decrement the hold count, returning the new value.
    pub(crate) fn unhold(&mut self) -> DevfsResult<u32> {
        self.holdcnt = self.holdcnt.checked_sub(1).ok_or_else(|| {
            DevfsError::internal(format!("devfs mount {}: hold count underflow", self.idx))
        })?;
        Ok(self.holdcnt)
    }
}

/// A devfs mount record.
#[derive(Debug)]
pub struct DevfsMount {
    idx: MountId,
    lock: RwLock<MountData>,
    ids: Arc<MountIdAllocator>,
    destroyed: AtomicBool,
}

impl DevfsMount {
    /// Create a record for a freshly allocated id, hold count 1.
    pub(crate) fn new(idx: MountId, ids: Arc<MountIdAllocator>) -> Arc<Self> {
        Arc::new(Self {
            idx,
            lock: RwLock::new(MountData {
                idx,
                flags: DevfsFlags::default(),
                ruleset: RulesetNumber::NONE,
                holdcnt: 1,
                rootdir: None,
                mount: None,
                unmounting: false,
            }),
            ids,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Mount id.
    pub fn id(&self) -> MountId {
        self.idx
    }

    /// Shared acquisition of the record lock.
    pub fn read(&self) -> RwLockReadGuard<'_, MountData> {
        self.lock.read()
    }

    /// Exclusive acquisition of the record lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, MountData> {
        self.lock.write()
    }

    pub fn hold_count(&self) -> u32 {
        self.read().holdcnt
    }

    pub fn flags(&self) -> DevfsFlags {
        self.read().flags
    }

    pub fn ruleset(&self) -> RulesetNumber {
        self.read().ruleset
    }

    pub fn is_unmounted(&self) -> bool {
        self.read().is_unmounted()
    }

    /// True once final destruction ran.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Retain the record.
    ///
    /// Fails once the count has reached zero, even if final destruction has
    /// not run yet.
    pub fn hold(&self) -> DevfsResult<()> {
        let mut dm = self.write();
        if dm.holdcnt == 0 || self.is_destroyed() {
            return Err(DevfsError::not_mounted(format!(
                "devfs mount {} already destroyed",
                self.idx
            )));
        }
        dm.holdcnt += 1;
        Ok(())
    }

    /// Release a hold taken with [`hold`](Self::hold).
    ///
    /// Returns `true` if this call destroyed the record. A mounted record
    /// never drops below the mount's own hold.
    pub fn drop_hold(&self) -> DevfsResult<bool> {
        let remaining = {
            let mut dm = self.write();
            if !dm.is_unmounted() && dm.holdcnt <= 1 {
                return Err(DevfsError::internal(format!(
                    "devfs mount {}: hold dropped below the mount's own reference",
                    self.idx
                )));
            }
            dm.unhold()?
        };
        if remaining == 0 {
            self.finalize();
            return Ok(true);
        }
        Ok(false)
    }

    /// Final destruction: runs once, returns the id to the allocator.
    pub(crate) fn finalize(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            tracing::error!("devfs mount {} destroyed twice", self.idx);
            return;
        }
        self.ids.release(self.idx);
        tracing::debug!("devfs mount {} destroyed", self.idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MountFlags;

    fn record() -> (Arc<MountIdAllocator>, Arc<DevfsMount>) {
        let ids = Arc::new(MountIdAllocator::new());
        let idx = ids.allocate().unwrap();
        (Arc::clone(&ids), DevfsMount::new(idx, ids))
    }

    #[test]
    fn test_new_record_defaults() {
        let (_, fmp) = record();
        assert_eq!(fmp.hold_count(), 1);
        assert_eq!(fmp.ruleset(), RulesetNumber::NONE);
        assert!(!fmp.flags().expand_symlinks);
        assert!(fmp.read().rootdir().is_none());
        assert!(!fmp.is_destroyed());
    }

    #[test]
    fn test_back_reference_is_weak() {
        let (_, fmp) = record();
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        fmp.write().set_mount(&mp);
        assert!(fmp.read().mount().is_some());
        assert!(!fmp.is_unmounted());

        drop(mp);
        assert!(fmp.read().mount().is_none());
        // Dangling but not cleared: still counts as mounted until unmount.
        assert!(!fmp.is_unmounted());
    }

    #[test]
    fn test_mounted_record_refuses_last_drop() {
        let (_, fmp) = record();
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        fmp.write().set_mount(&mp);
        assert!(matches!(fmp.drop_hold(), Err(DevfsError::Internal(_))));
        assert_eq!(fmp.hold_count(), 1);
    }

    #[test]
    fn test_last_holder_destroys() {
        let (ids, fmp) = record();
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        fmp.write().set_mount(&mp);
        fmp.hold().unwrap();
        assert_eq!(fmp.hold_count(), 2);

        // Simulate unmount dropping the mount's own hold.
        {
            let mut dm = fmp.write();
            dm.clear_mount();
            assert_eq!(dm.unhold().unwrap(), 1);
        }
        assert!(ids.is_allocated(fmp.id()));

        assert!(fmp.drop_hold().unwrap());
        assert!(fmp.is_destroyed());
        assert!(!ids.is_allocated(fmp.id()));
        assert!(fmp.hold().is_err());
    }

    #[test]
    fn test_hold_refused_between_last_drop_and_destroy() {
        let (ids, fmp) = record();
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        fmp.write().set_mount(&mp);

        // Unmount dropped the last hold but has not destroyed yet.
        {
            let mut dm = fmp.write();
            dm.clear_mount();
            assert_eq!(dm.unhold().unwrap(), 0);
        }
        assert!(!fmp.is_destroyed());
        assert!(matches!(fmp.hold(), Err(DevfsError::NotMounted(_))));
        assert_eq!(fmp.hold_count(), 0);

        fmp.finalize();
        assert!(!ids.is_allocated(fmp.id()));
        assert!(fmp.hold().is_err());
    }

    #[test]
    fn test_hold_drop_race_destroys_once() {
        use std::sync::Barrier;

        for _ in 0..200 {
            let (ids, fmp) = record();
            let mp = Mount::new("/dev", MountFlags::fresh(), None);
            fmp.write().set_mount(&mp);
            fmp.hold().unwrap();
            {
                let mut dm = fmp.write();
                dm.clear_mount();
                dm.unhold().unwrap();
            }

            let barrier = Arc::new(Barrier::new(2));
            let dropper = {
                let (fmp, barrier) = (Arc::clone(&fmp), Arc::clone(&barrier));
                std::thread::spawn(move || {
                    barrier.wait();
                    fmp.drop_hold().unwrap()
                })
            };
            barrier.wait();
            let held = fmp.hold().is_ok();
            assert!(dropper.join().unwrap() != held);

            if held {
                assert!(ids.is_allocated(fmp.id()));
                assert!(fmp.drop_hold().unwrap());
            }
            assert!(fmp.is_destroyed());
            assert!(!ids.is_allocated(fmp.id()));
        }
    }

    #[test]
    fn test_finalize_runs_once() {
        let (ids, fmp) = record();
        let other = ids.allocate().unwrap();
        fmp.finalize();
        let reused = ids.allocate().unwrap();
        assert_eq!(reused, fmp.id());
        fmp.finalize();
        assert!(ids.is_allocated(reused));
        assert!(ids.is_allocated(other));
    }
}
