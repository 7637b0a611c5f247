//! Small selector enums shared across the mount surface.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// How a lock (vnode or mount record) is acquired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum LockMode {
    /// Many readers.
    #[strum(serialize = "shared", serialize = "read")]
    Shared,
    /// Single writer.
    #[default]
    #[strum(serialize = "exclusive", serialize = "write")]
    Exclusive,
}

impl LockMode {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filesystem control query.
///
/// Only [`FsCtlOp::MountOpts`] is understood by devfs; anything else is
/// carried as a raw operation number so the filesystem can refuse it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsCtlOp {
    /// Current mount options rendered as text.
    MountOpts,
    /// Any other operation, by number.
    Other(u32),
}

impl FsCtlOp {
    /// Wire number of the mount-options query.
    pub const MOUNTOPTS_NUMBER: u32 = 0x0001_0001;

    /// Decode a raw operation number.
    pub fn from_number(op: u32) -> Self {
        if op == Self::MOUNTOPTS_NUMBER {
            FsCtlOp::MountOpts
        } else {
            FsCtlOp::Other(op)
        }
    }

    /// Encode back to the raw operation number.
    pub fn number(&self) -> u32 {
        match self {
            FsCtlOp::MountOpts => Self::MOUNTOPTS_NUMBER,
            FsCtlOp::Other(op) => *op,
        }
    }
}

/// Capability tags a jail can be granted.
///
/// A credential outside any jail holds every capability.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum PrisonAllow {
    /// May mount filesystems at all.
    Mount,
    /// May mount devfs specifically.
    MountDevfs,
    /// May mount other synthetic filesystems (procfs, tmpfs, ...).
    MountSynthetic,
}

impl PrisonAllow {
    /// Parse from string (case-insensitive, `allow.` prefix optional).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.strip_prefix("allow.").unwrap_or(s);
        let s = s.replace('.', "_");
        <Self as FromStr>::from_str(&s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrisonAllow::Mount => "allow.mount",
            PrisonAllow::MountDevfs => "allow.mount.devfs",
            PrisonAllow::MountSynthetic => "allow.mount.synthetic",
        }
    }
}

impl std::fmt::Display for PrisonAllow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_mode_parse() {
        assert_eq!(LockMode::from_str("shared"), Some(LockMode::Shared));
        assert_eq!(LockMode::from_str("WRITE"), Some(LockMode::Exclusive));
        assert_eq!(LockMode::from_str("sideways"), None);
        assert_eq!(LockMode::default(), LockMode::Exclusive);
    }

    #[test]
    fn test_fsctl_op_numbers() {
        assert_eq!(
            FsCtlOp::from_number(FsCtlOp::MOUNTOPTS_NUMBER),
            FsCtlOp::MountOpts
        );
        assert_eq!(FsCtlOp::from_number(42), FsCtlOp::Other(42));
        assert_eq!(FsCtlOp::Other(42).number(), 42);
    }

    #[test]
    fn test_prison_allow_names() {
        assert_eq!(
            PrisonAllow::from_str("allow.mount.devfs"),
            Some(PrisonAllow::MountDevfs)
        );
        assert_eq!(PrisonAllow::from_str("mount"), Some(PrisonAllow::Mount));
        assert_eq!(PrisonAllow::from_str("allow.raw_sockets"), None);
        assert_eq!(PrisonAllow::MountDevfs.to_string(), "allow.mount.devfs");
    }
}
