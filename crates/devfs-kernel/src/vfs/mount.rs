//! The generic mount object.
//!
//! A [`Mount`] is what the mount framework hands a filesystem: where it is
//! attached, the framework flags, the new option list for this request, and
//! a private data slot the filesystem fills with its own per-mount record.
//! The filesystem record points back at the `Mount` weakly; the framework
//! owns the attachment, the filesystem owns its record.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use devfs_types::FsId;
use parking_lot::{Mutex, MutexGuard, RwLock};

use super::options::MountOptions;

/// Filesystem-private per-mount data, opaque to the framework.
pub type MountPrivate = Arc<dyn Any + Send + Sync>;

/// Framework-level mount flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountFlags {
    /// This is the process root filesystem.
    pub rootfs: bool,
    /// Request updates an existing mount rather than creating one.
    pub update: bool,
    /// Filesystem is local (not network-backed).
    pub local: bool,
    /// Lookups may run with shared vnode locks.
    pub lookup_shared: bool,
    /// Extended shared-lock operations allowed.
    pub extended_shared: bool,
}

impl MountFlags {
    /// Flags for a fresh mount request.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Flags for the process root filesystem.
    pub fn rootfs() -> Self {
        Self {
            rootfs: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct MountStat {
    fsid: FsId,
    fstypename: String,
    mntfromname: String,
}

/// A generic mount object.
#[derive(Debug)]
pub struct Mount {
    path: PathBuf,
    flags: Mutex<MountFlags>,
    optnew: Mutex<Option<MountOptions>>,
    opts: Mutex<MountOptions>,
    data: RwLock<Option<MountPrivate>>,
    request: Mutex<()>,
    stat: Mutex<MountStat>,
    errmsg: Mutex<Option<String>>,
}

impl Mount {
    /// Create a mount object for `path` carrying a new-option list.
    pub fn new(
        path: impl Into<PathBuf>,
        flags: MountFlags,
        optnew: Option<MountOptions>,
    ) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            flags: Mutex::new(flags),
            optnew: Mutex::new(optnew),
            opts: Mutex::new(MountOptions::new()),
            data: RwLock::new(None),
            request: Mutex::new(()),
            stat: Mutex::new(MountStat::default()),
            errmsg: Mutex::new(None),
        })
    }

    /// Mount point.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Flags and options
    // ========================================================================

    /// Snapshot of the framework flags.
    pub fn flags(&self) -> MountFlags {
        *self.flags.lock()
    }

    /// Mutate the framework flags under the mount interlock.
    pub fn update_flags(&self, f: impl FnOnce(&mut MountFlags)) {
        f(&mut self.flags.lock());
    }

    /// The option list of the request in progress, if any.
    pub fn optnew(&self) -> Option<MountOptions> {
        self.optnew.lock().clone()
    }

    /// Replace the option list of the request in progress.
    pub fn set_optnew(&self, opts: Option<MountOptions>) {
        *self.optnew.lock() = opts;
    }

    /// Options currently in effect.
    pub fn options(&self) -> MountOptions {
        self.opts.lock().clone()
    }

    /// Fold the request's option list into the active options and clear it.
    pub fn commit_options(&self) {
        if let Some(newer) = self.optnew.lock().take() {
            self.opts.lock().merge(&newer);
        }
    }

    // ========================================================================
    // Filesystem-private data
    // ========================================================================

    /// The filesystem record attached to this mount, if it is a `T`.
    pub fn data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let data = self.data.read().clone()?;
        data.downcast::<T>().ok()
    }

    /// True if a filesystem record is attached.
    pub fn has_data(&self) -> bool {
        self.data.read().is_some()
    }

    /// Attach or detach the filesystem record. Returns the previous one.
    pub fn set_data(&self, data: Option<MountPrivate>) -> Option<MountPrivate> {
        std::mem::replace(&mut *self.data.write(), data)
    }

    /// Serialize mount requests against this mount.
    ///
    /// Held by the framework from installing a request's options until they
    /// are committed or dropped, so `optnew` and the `update` flag always
    /// belong to one request.
    pub fn lock_request(&self) -> MutexGuard<'_, ()> {
        self.request.lock()
    }

    // ========================================================================
    // Statistics names and errors
    // ========================================================================

    pub fn fsid(&self) -> FsId {
        self.stat.lock().fsid
    }

    pub fn set_fsid(&self, fsid: FsId) {
        self.stat.lock().fsid = fsid;
    }

    pub fn fstypename(&self) -> String {
        self.stat.lock().fstypename.clone()
    }

    pub fn set_fstypename(&self, name: &str) {
        self.stat.lock().fstypename = name.to_string();
    }

    pub fn mounted_from(&self) -> String {
        self.stat.lock().mntfromname.clone()
    }

    pub fn set_mounted_from(&self, from: &str) {
        self.stat.lock().mntfromname = from.to_string();
    }

    /// Record a user-facing error message for the request in progress.
    pub fn set_error(&self, msg: impl Into<String>) {
        *self.errmsg.lock() = Some(msg.into());
    }

    /// Last recorded user-facing error message.
    pub fn error(&self) -> Option<String> {
        self.errmsg.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_update() {
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        assert!(!mp.flags().local);
        mp.update_flags(|f| f.local = true);
        assert!(mp.flags().local);
        assert!(MountFlags::rootfs().rootfs);
    }

    #[test]
    fn test_commit_options() {
        let mp = Mount::new(
            "/dev",
            MountFlags::fresh(),
            Some(MountOptions::parse("ruleset=3")),
        );
        mp.commit_options();
        assert!(mp.optnew().is_none());
        assert_eq!(mp.options().get("ruleset"), Some(Some("3")));

        mp.set_optnew(Some(MountOptions::parse("ruleset=4")));
        mp.commit_options();
        assert_eq!(mp.options().get("ruleset"), Some(Some("4")));
        assert_eq!(mp.options().len(), 1);
    }

    #[test]
    fn test_private_data_downcast() {
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        assert!(!mp.has_data());
        assert!(mp.data::<u32>().is_none());

        assert!(mp.set_data(Some(Arc::new(7u32))).is_none());
        assert!(mp.has_data());
        assert_eq!(mp.data::<u32>().as_deref(), Some(&7));
        assert!(mp.data::<String>().is_none());

        assert!(mp.set_data(None).is_some());
        assert!(!mp.has_data());
    }

    #[test]
    fn test_request_lock_excludes() {
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        let guard = mp.lock_request();
        assert!(mp.request.try_lock().is_none());
        drop(guard);
        assert!(mp.request.try_lock().is_some());
    }

    #[test]
    fn test_error_slot() {
        let mp = Mount::new("/dev", MountFlags::fresh(), None);
        assert!(mp.error().is_none());
        mp.set_error("invalid ruleset specification");
        assert_eq!(mp.error().as_deref(), Some("invalid ruleset specification"));
    }

    #[test]
    fn test_stat_names() {
        let mp = Mount::new("/jail/dev", MountFlags::fresh(), None);
        mp.set_fstypename("devfs");
        mp.set_mounted_from("devfs");
        mp.set_fsid(FsId::new(4, 0x71));
        assert_eq!(mp.fstypename(), "devfs");
        assert_eq!(mp.mounted_from(), "devfs");
        assert_eq!(mp.fsid(), FsId::new(4, 0x71));
        assert_eq!(mp.path(), Path::new("/jail/dev"));
    }
}
