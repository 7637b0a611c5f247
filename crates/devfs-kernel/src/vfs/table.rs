//! Mount table with longest-prefix routing.
//!
//! The framework side of mounting: owns [`Mount`] objects keyed by mount
//! point and drives each filesystem through [`VfsOps`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use devfs_types::{FsCtlOp, LockMode, StatFs};
use parking_lot::RwLock;

use super::cred::Credential;
use super::mount::{Mount, MountFlags};
use super::ops::{SysctlRequest, UnmountFlags, VfsOps};
use super::options::MountOptions;
use super::vnode::VnodeRef;
use crate::error::{DevfsError, DevfsResult};

/// Information about a mount point.
#[derive(Debug, Clone)]
pub struct MountInfo {
    /// The mount path (e.g., "/dev").
    pub path: PathBuf,
    /// Filesystem type name.
    pub fstype: String,
    /// Mounted-from name.
    pub from: String,
    /// Options in effect, `a,b=c` form.
    pub options: String,
}

struct MountEntry {
    mount: Arc<Mount>,
    fs: Arc<dyn VfsOps>,
}

/// Routes mount requests and queries to mounted filesystems.
///
/// Mount points are matched by longest prefix. For example, if `/dev` and
/// `/jail/www/dev` are both mounted, `/jail/www/dev/null` routes to the
/// `/jail/www/dev` mount.
pub struct MountTable {
    mounts: RwLock<BTreeMap<PathBuf, MountEntry>>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.mounts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTable {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Mount `fs` at `path`.
    ///
    /// A mount at `/` is flagged as the root filesystem. Mounting over an
    /// existing mount point fails with `Busy`.
    pub fn mount(
        &self,
        path: impl Into<PathBuf>,
        fs: Arc<dyn VfsOps>,
        opts: MountOptions,
        cred: &dyn Credential,
    ) -> DevfsResult<Arc<Mount>> {
        let path = Self::normalize_mount_path(path.into());
        let mut mounts = self.mounts.write();
        if mounts.contains_key(&path) {
            return Err(DevfsError::busy(format!(
                "{}: already mounted",
                path.display()
            )));
        }

        let flags = if path == Path::new("/") {
            MountFlags::rootfs()
        } else {
            MountFlags::fresh()
        };
        let mp = Mount::new(path.clone(), flags, Some(opts));
        fs.mount(&mp, cred)?;
        mp.commit_options();

        mounts.insert(
            path,
            MountEntry {
                mount: Arc::clone(&mp),
                fs,
            },
        );
        Ok(mp)
    }

    /// Update the mount at `path` with new options.
    ///
    /// Updates of one mount are serialized; each sees only its own options.
    pub fn update(
        &self,
        path: impl AsRef<Path>,
        opts: MountOptions,
        cred: &dyn Credential,
    ) -> DevfsResult<()> {
        let path = Self::normalize_mount_path(path.as_ref().to_path_buf());
        let mounts = self.mounts.read();
        let entry = mounts
            .get(&path)
            .ok_or_else(|| DevfsError::not_mounted(path.display().to_string()))?;

        let mp = &entry.mount;
        let _request = mp.lock_request();
        mp.set_optnew(Some(opts));
        mp.update_flags(|f| f.update = true);
        let result = entry.fs.mount(mp, cred);
        mp.update_flags(|f| f.update = false);
        match result {
            Ok(()) => {
                mp.commit_options();
                Ok(())
            }
            Err(e) => {
                mp.set_optnew(None);
                Err(e)
            }
        }
    }

    /// Unmount the filesystem at `path`.
    ///
    /// On failure the mount stays in the table untouched.
    pub fn unmount(&self, path: impl AsRef<Path>, force: bool) -> DevfsResult<()> {
        let path = Self::normalize_mount_path(path.as_ref().to_path_buf());
        let mut mounts = self.mounts.write();
        let entry = mounts
            .get(&path)
            .ok_or_else(|| DevfsError::not_mounted(path.display().to_string()))?;

        entry.fs.unmount(&entry.mount, UnmountFlags { force })?;
        mounts.remove(&path);
        Ok(())
    }

    /// The mount object at exactly `path`.
    pub fn lookup(&self, path: impl AsRef<Path>) -> DevfsResult<Arc<Mount>> {
        let path = Self::normalize_mount_path(path.as_ref().to_path_buf());
        self.mounts
            .read()
            .get(&path)
            .map(|e| Arc::clone(&e.mount))
            .ok_or_else(|| DevfsError::not_mounted(path.display().to_string()))
    }

    /// Root vnode of the filesystem covering `path`.
    pub fn root(&self, path: impl AsRef<Path>, lock: LockMode) -> DevfsResult<VnodeRef> {
        let (mp, fs, _) = self.find_mount(path.as_ref())?;
        fs.root(&mp, lock)
    }

    /// Statistics of the filesystem covering `path`.
    pub fn statfs(&self, path: impl AsRef<Path>) -> DevfsResult<StatFs> {
        let (mp, fs, _) = self.find_mount(path.as_ref())?;
        fs.statfs(&mp)
    }

    /// Run a control query against the filesystem covering `path`.
    ///
    /// Without a buffer returns the length the answer needs; with one,
    /// copies the answer and returns the bytes written.
    pub fn sysctl(
        &self,
        path: impl AsRef<Path>,
        op: FsCtlOp,
        buf: Option<&mut [u8]>,
    ) -> DevfsResult<usize> {
        let (mp, fs, _) = self.find_mount(path.as_ref())?;
        let mut req = match buf {
            Some(buf) => SysctlRequest::with_buffer(buf),
            None => SysctlRequest::measure(),
        };
        fs.sysctl(&mp, op, &mut req)?;
        Ok(req.oldidx())
    }

    /// List all current mounts.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        let mounts = self.mounts.read();
        mounts
            .iter()
            .map(|(path, entry)| MountInfo {
                path: path.clone(),
                fstype: entry.fs.name().to_string(),
                from: entry.mount.mounted_from(),
                options: entry.mount.options().to_string(),
            })
            .collect()
    }

    /// Normalize a mount path: ensure it starts with `/` and has no trailing slash.
    fn normalize_mount_path(path: PathBuf) -> PathBuf {
        let s = path.to_string_lossy();
        let s = s.trim_end_matches('/');
        if s.is_empty() {
            PathBuf::from("/")
        } else if !s.starts_with('/') {
            PathBuf::from(format!("/{}", s))
        } else {
            PathBuf::from(s)
        }
    }

    /// Find the mount covering a given path.
    ///
    /// Returns the mount, its filesystem and the path relative to it.
    fn find_mount(&self, path: &Path) -> DevfsResult<(Arc<Mount>, Arc<dyn VfsOps>, PathBuf)> {
        let normalized = Self::normalize_mount_path(path.to_path_buf());
        let mounts = self.mounts.read();

        // Deepest ancestor first, so the first hit is the longest match.
        let best = normalized
            .ancestors()
            .find_map(|candidate| mounts.get_key_value(candidate));

        match best {
            Some((mount_path, entry)) => {
                let relative = normalized
                    .strip_prefix(mount_path)
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                Ok((Arc::clone(&entry.mount), Arc::clone(&entry.fs), relative))
            }
            None => Err(DevfsError::not_mounted(path.display().to_string())),
        }
    }
}
