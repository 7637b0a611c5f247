//! Vnode handles.
//!
//! Vnodes are owned by the vnode cache; this crate only needs a reference
//! count, a root marker, a reclaimed marker and a lock that can be held
//! across calls (the caller of `root` gets a locked vnode back and unlocks
//! it later).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use devfs_types::{LockMode, MountId};
use parking_lot::{Condvar, Mutex};

/// Shared vnode handle.
pub type VnodeRef = Arc<Vnode>;

#[derive(Debug, Default)]
struct LockState {
    exclusive: bool,
    shared: u32,
}

/// A filesystem node handle.
#[derive(Debug)]
pub struct Vnode {
    mount: MountId,
    ino: u64,
    usecount: AtomicU32,
    root: AtomicBool,
    doomed: AtomicBool,
    lock: Mutex<LockState>,
    unlocked: Condvar,
}

impl Vnode {
    /// Create an unreferenced, unlocked vnode.
    pub fn new(mount: MountId, ino: u64) -> VnodeRef {
        Arc::new(Self {
            mount,
            ino,
            usecount: AtomicU32::new(0),
            root: AtomicBool::new(false),
            doomed: AtomicBool::new(false),
            lock: Mutex::new(LockState::default()),
            unlocked: Condvar::new(),
        })
    }

    /// Mount this vnode belongs to.
    pub fn mount_id(&self) -> MountId {
        self.mount
    }

    /// Inode number.
    pub fn ino(&self) -> u64 {
        self.ino
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Take a reference. Returns the new count.
    pub fn vref(&self) -> u32 {
        self.usecount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop a reference. Returns the new count.
    pub fn vrele(&self) -> u32 {
        let prev = self
            .usecount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(n) => n - 1,
            Err(_) => {
                tracing::error!("vrele of unreferenced vnode {} on mount {}", self.ino, self.mount);
                0
            }
        }
    }

    /// Current reference count.
    pub fn usecount(&self) -> u32 {
        self.usecount.load(Ordering::Acquire)
    }

    // ========================================================================
    // Flags
    // ========================================================================

    /// Mark as the root of its filesystem.
    pub fn set_root(&self) {
        self.root.store(true, Ordering::Release);
    }

    /// True if this vnode is a filesystem root.
    pub fn is_root(&self) -> bool {
        self.root.load(Ordering::Acquire)
    }

    /// Mark as reclaimed; the cache will not hand it out again.
    pub fn doom(&self) {
        self.doomed.store(true, Ordering::Release);
    }

    /// True once reclaimed.
    pub fn is_doomed(&self) -> bool {
        self.doomed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Locking
    // ========================================================================

    /// Acquire the vnode lock, blocking while an incompatible holder exists.
    pub fn lock(&self, mode: LockMode) {
        let mut state = self.lock.lock();
        match mode {
            LockMode::Shared => {
                while state.exclusive {
                    self.unlocked.wait(&mut state);
                }
                state.shared += 1;
            }
            LockMode::Exclusive => {
                while state.exclusive || state.shared > 0 {
                    self.unlocked.wait(&mut state);
                }
                state.exclusive = true;
            }
        }
    }

    /// Release one hold of the vnode lock.
    pub fn unlock(&self) {
        let mut state = self.lock.lock();
        if state.exclusive {
            state.exclusive = false;
        } else if state.shared > 0 {
            state.shared -= 1;
        } else {
            tracing::error!("unlock of unlocked vnode {} on mount {}", self.ino, self.mount);
            return;
        }
        self.unlocked.notify_all();
    }

    /// Current lock state, if held.
    pub fn lock_mode(&self) -> Option<LockMode> {
        let state = self.lock.lock();
        if state.exclusive {
            Some(LockMode::Exclusive)
        } else if state.shared > 0 {
            Some(LockMode::Shared)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount() {
        let vp = Vnode::new(MountId::new(0), 2);
        assert_eq!(vp.vref(), 1);
        assert_eq!(vp.vref(), 2);
        assert_eq!(vp.vrele(), 1);
        assert_eq!(vp.vrele(), 0);
        assert_eq!(vp.vrele(), 0);
        assert_eq!(vp.usecount(), 0);
    }

    #[test]
    fn test_flags() {
        let vp = Vnode::new(MountId::new(1), 2);
        assert!(!vp.is_root());
        vp.set_root();
        assert!(vp.is_root());
        assert!(!vp.is_doomed());
        vp.doom();
        assert!(vp.is_doomed());
    }

    #[test]
    fn test_lock_modes() {
        let vp = Vnode::new(MountId::new(0), 2);
        assert_eq!(vp.lock_mode(), None);

        vp.lock(LockMode::Shared);
        vp.lock(LockMode::Shared);
        assert_eq!(vp.lock_mode(), Some(LockMode::Shared));
        vp.unlock();
        vp.unlock();
        assert_eq!(vp.lock_mode(), None);

        vp.lock(LockMode::Exclusive);
        assert_eq!(vp.lock_mode(), Some(LockMode::Exclusive));
        vp.unlock();
        assert_eq!(vp.lock_mode(), None);
    }

    #[test]
    fn test_exclusive_waits_for_release() {
        let vp = Vnode::new(MountId::new(0), 2);
        vp.lock(LockMode::Exclusive);

        let waiter = {
            let vp = Arc::clone(&vp);
            std::thread::spawn(move || {
                vp.lock(LockMode::Exclusive);
                vp.unlock();
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        vp.unlock();
        waiter.join().unwrap();
        assert_eq!(vp.lock_mode(), None);
    }
}
