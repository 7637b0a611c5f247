//! In-memory collaborators.
//!
//! Used for testing and as reference implementations of the device-node
//! tree and vnode cache interfaces. All state is ephemeral.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use devfs_types::{MountId, RulesetNumber};

use crate::devfs::{DeviceTree, DirHandle, MountData, VnodeCache};
use crate::error::{DevfsError, DevfsResult};
use crate::vfs::{Vnode, VnodeRef};

/// Vnode cache keeping every vnode registered per mount.
#[derive(Debug, Default)]
pub struct MemoryVnodeCache {
    vnodes: DashMap<MountId, Vec<VnodeRef>>,
}

impl MemoryVnodeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a vnode under its mount.
    pub fn register(&self, vp: &VnodeRef) {
        self.vnodes
            .entry(vp.mount_id())
            .or_default()
            .push(Arc::clone(vp));
    }

    /// Vnodes currently cached for `mount`.
    pub fn vnodes(&self, mount: MountId) -> Vec<VnodeRef> {
        self.vnodes
            .get(&mount)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Number of vnodes cached for `mount`.
    pub fn count(&self, mount: MountId) -> usize {
        self.vnodes.get(&mount).map(|list| list.len()).unwrap_or(0)
    }
}

impl VnodeCache for MemoryVnodeCache {
    fn flush(&self, mount: MountId, rootrefs: u32, force: bool) -> DevfsResult<()> {
        let list = self.vnodes(mount);

        if !force {
            for vp in &list {
                let allowed = if vp.is_root() { rootrefs } else { 0 };
                if vp.usecount() > allowed {
                    return Err(DevfsError::busy(format!(
                        "mount {}: vnode {} has {} references",
                        mount,
                        vp.ino(),
                        vp.usecount()
                    )));
                }
            }
        }

        self.vnodes.remove(&mount);
        for vp in list {
            if vp.is_root() {
                for _ in 0..rootrefs.min(vp.usecount()) {
                    vp.vrele();
                }
            }
            vp.doom();
        }
        Ok(())
    }
}

#[derive(Debug)]
struct DirNode {
    mount: MountId,
    parent: Option<u64>,
    name: String,
    ino: u64,
    vnode: Option<VnodeRef>,
}

#[derive(Debug, Default, Clone, Copy)]
struct RulesetBinding {
    ruleset: RulesetNumber,
    applied: u32,
}

/// Device-node tree holding directories and ruleset bindings in memory.
#[derive(Debug)]
pub struct MemoryDeviceTree {
    cache: Arc<MemoryVnodeCache>,
    dirs: DashMap<u64, DirNode>,
    rules: DashMap<MountId, RulesetBinding>,
    next_key: AtomicU64,
    fail_mkdir: AtomicBool,
    fail_alloc: AtomicBool,
}

impl MemoryDeviceTree {
    /// Create a tree whose vnodes are tracked by `cache`.
    pub fn new(cache: Arc<MemoryVnodeCache>) -> Self {
        Self {
            cache,
            dirs: DashMap::new(),
            rules: DashMap::new(),
            next_key: AtomicU64::new(1),
            fail_mkdir: AtomicBool::new(false),
            fail_alloc: AtomicBool::new(false),
        }
    }

    /// Make every following `mkdir` fail.
    pub fn fail_mkdir(&self, on: bool) {
        self.fail_mkdir.store(on, Ordering::Release);
    }

    /// Make every following `alloc_vnode` fail.
    pub fn fail_vnode_alloc(&self, on: bool) {
        self.fail_alloc.store(on, Ordering::Release);
    }

    /// Number of directories belonging to `mount`.
    pub fn dir_count(&self, mount: MountId) -> usize {
        self.dirs.iter().filter(|d| d.mount == mount).count()
    }

    /// Path of a directory, `/`-joined from the root.
    pub fn dir_path(&self, dir: DirHandle) -> Option<String> {
        let mut parts = Vec::new();
        let mut key = Some(dir.key);
        while let Some(k) = key {
            let node = self.dirs.get(&k)?;
            parts.push(node.name.clone());
            key = node.parent;
        }
        parts.reverse();
        Some(format!("/{}", parts.join("/").trim_start_matches('/')))
    }

    /// Ruleset bound to `mount`, if any.
    pub fn ruleset(&self, mount: MountId) -> Option<RulesetNumber> {
        self.rules.get(&mount).map(|b| b.ruleset)
    }

    /// How many times the ruleset of `mount` has been applied.
    pub fn applied_count(&self, mount: MountId) -> u32 {
        self.rules.get(&mount).map(|b| b.applied).unwrap_or(0)
    }
}

impl DeviceTree for MemoryDeviceTree {
    fn mkdir(
        &self,
        mount: MountId,
        parent: Option<DirHandle>,
        name: &str,
        ino: u64,
    ) -> DevfsResult<DirHandle> {
        if self.fail_mkdir.load(Ordering::Acquire) {
            return Err(DevfsError::internal(format!(
                "mount {}: cannot create directory {:?}",
                mount, name
            )));
        }
        if let Some(p) = parent {
            if !self.dirs.contains_key(&p.key) {
                return Err(DevfsError::internal(format!("stale parent directory {}", p.key)));
            }
        }

        let key = self.next_key.fetch_add(1, Ordering::AcqRel);
        self.dirs.insert(
            key,
            DirNode {
                mount,
                parent: parent.map(|p| p.key),
                name: name.to_string(),
                ino,
                vnode: None,
            },
        );
        Ok(DirHandle { key, ino })
    }

    fn alloc_vnode(&self, dir: DirHandle, mount: MountId) -> DevfsResult<VnodeRef> {
        if self.fail_alloc.load(Ordering::Acquire) {
            return Err(DevfsError::internal(format!(
                "mount {}: vnode allocation failed",
                mount
            )));
        }

        let vp = {
            let mut node = self
                .dirs
                .get_mut(&dir.key)
                .ok_or_else(|| DevfsError::internal(format!("stale directory {}", dir.key)))?;
            let cached = node.vnode.as_ref().filter(|vp| !vp.is_doomed()).cloned();
            match cached {
                Some(vp) => vp,
                None => {
                    let vp = Vnode::new(node.mount, node.ino);
                    self.cache.register(&vp);
                    node.vnode = Some(Arc::clone(&vp));
                    vp
                }
            }
        };

        vp.vref();
        Ok(vp)
    }

    fn cleanup(&self, dm: &mut MountData) {
        let mount = dm.idx();
        self.dirs.retain(|_, node| node.mount != mount);
    }

    fn rules_cleanup(&self, dm: &mut MountData) {
        self.rules.remove(&dm.idx());
    }

    fn ruleset_set(&self, rsnum: RulesetNumber, dm: &mut MountData) {
        self.rules.entry(dm.idx()).or_default().ruleset = rsnum;
    }

    fn ruleset_apply(&self, dm: &mut MountData) {
        self.rules.entry(dm.idx()).or_default().applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devfs::DEVFS_ROOTINO;

    fn tree() -> (Arc<MemoryVnodeCache>, MemoryDeviceTree) {
        let cache = Arc::new(MemoryVnodeCache::new());
        let tree = MemoryDeviceTree::new(Arc::clone(&cache));
        (cache, tree)
    }

    #[test]
    fn test_mkdir_and_path() {
        let (_, tree) = tree();
        let m = MountId::new(0);
        let root = tree.mkdir(m, None, "", DEVFS_ROOTINO).unwrap();
        let pts = tree.mkdir(m, Some(root), "pts", 10).unwrap();
        assert_eq!(tree.dir_count(m), 2);
        assert_eq!(tree.dir_path(pts).as_deref(), Some("/pts"));
        assert_eq!(tree.dir_path(root).as_deref(), Some("/"));
    }

    #[test]
    fn test_alloc_vnode_reuses_cached() {
        let (cache, tree) = tree();
        let m = MountId::new(3);
        let root = tree.mkdir(m, None, "", DEVFS_ROOTINO).unwrap();

        let a = tree.alloc_vnode(root, m).unwrap();
        let b = tree.alloc_vnode(root, m).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.usecount(), 2);
        assert_eq!(a.ino(), DEVFS_ROOTINO);
        assert_eq!(a.lock_mode(), None);
        assert_eq!(cache.count(m), 1);
    }

    #[test]
    fn test_alloc_vnode_failure_injection() {
        let (cache, tree) = tree();
        let m = MountId::new(0);
        let root = tree.mkdir(m, None, "", DEVFS_ROOTINO).unwrap();
        tree.fail_vnode_alloc(true);
        assert!(matches!(
            tree.alloc_vnode(root, m),
            Err(DevfsError::Internal(_))
        ));
        assert_eq!(cache.count(m), 0);
    }

    #[test]
    fn test_flush_busy_then_forced() {
        let (cache, tree) = tree();
        let m = MountId::new(0);
        let root = tree.mkdir(m, None, "", DEVFS_ROOTINO).unwrap();
        let vp = tree.alloc_vnode(root, m).unwrap();
        vp.set_root();

        // One reference is the mount's own.
        assert!(cache.flush(m, 1, false).is_ok());
        assert!(vp.is_doomed());
        assert_eq!(vp.usecount(), 0);
        assert_eq!(cache.count(m), 0);

        let fresh = tree.alloc_vnode(root, m).unwrap();
        assert!(!Arc::ptr_eq(&fresh, &vp));
        fresh.vref();
        assert!(matches!(cache.flush(m, 0, false), Err(DevfsError::Busy(_))));
        assert!(!fresh.is_doomed());
        assert!(cache.flush(m, 0, true).is_ok());
        assert!(fresh.is_doomed());
    }

    #[test]
    fn test_cleanup_scoped_to_mount() {
        let (_, tree) = tree();
        let a = MountId::new(0);
        let b = MountId::new(1);
        tree.mkdir(a, None, "", DEVFS_ROOTINO).unwrap();
        tree.mkdir(b, None, "", DEVFS_ROOTINO).unwrap();

        let ids = Arc::new(crate::idalloc::MountIdAllocator::new());
        let fmp = crate::devfs::DevfsMount::new(ids.allocate().unwrap(), ids);
        tree.ruleset_set(RulesetNumber::new(4), &mut fmp.write());
        tree.ruleset_apply(&mut fmp.write());
        assert_eq!(tree.ruleset(a), Some(RulesetNumber::new(4)));
        assert_eq!(tree.applied_count(a), 1);

        tree.cleanup(&mut fmp.write());
        tree.rules_cleanup(&mut fmp.write());
        assert_eq!(tree.dir_count(a), 0);
        assert_eq!(tree.dir_count(b), 1);
        assert_eq!(tree.ruleset(a), None);
    }
}
