//! devfs configuration and process-wide state.
//!
//! The expand-symlinks default comes from two places, evaluated once when
//! [`DevfsState`] is built:
//!
//! 1. the persistent configuration value (`expand_symlinks` in TOML), then
//! 2. the `VFS_DEVFS_EXPANDSYMLINKS` environment override.
//!
//! After that the effective value lives in the state container and can be
//! flipped at run time; the environment is never consulted again.
//!
//! ```toml
//! expand_symlinks = true
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{DevfsError, DevfsResult};
use crate::idalloc::MountIdAllocator;

/// Environment variable overriding the expand-symlinks default.
pub const EXPAND_SYMLINKS_ENV: &str = "VFS_DEVFS_EXPANDSYMLINKS";

/// Persistent devfs configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevfsConfig {
    /// Expand symlinks on read for mounts that do not say either way.
    #[serde(default)]
    pub expand_symlinks: bool,
}

impl DevfsConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> DevfsResult<Self> {
        toml::from_str(text)
            .map_err(|e| DevfsError::invalid_argument(format!("devfs config parse error: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> DevfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DevfsError::invalid_argument(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply the environment override, if set and well-formed.
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(EXPAND_SYMLINKS_ENV).ok();
        self.with_override(value.as_deref())
    }

    /// Apply an override value as read from the environment.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_override(mut self, value: Option<&str>) -> Self {
        if let Some(raw) = value {
            match parse_bool_tunable(raw) {
                Some(v) => self.expand_symlinks = v,
                None => tracing::warn!(
                    "ignoring {}={:?}: not a boolean",
                    EXPAND_SYMLINKS_ENV,
                    raw
                ),
            }
        }
        self
    }
}

/// Parse a tunable boolean: `0/1`, `true/false`, `yes/no`, `on/off`.
pub fn parse_bool_tunable(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Process-wide devfs state.
///
/// Built once at startup and shared as `Arc<DevfsState>` with every devfs
/// instance. Owns the mount-id allocator and the effective expand-symlinks
/// default.
#[derive(Debug)]
pub struct DevfsState {
    ids: Arc<MountIdAllocator>,
    expand_symlinks: AtomicBool,
}

impl Default for DevfsState {
    fn default() -> Self {
        Self::new(DevfsConfig::default())
    }
}

impl DevfsState {
    /// Build state from an already-resolved configuration.
    pub fn new(config: DevfsConfig) -> Self {
        Self::with_allocator(config, MountIdAllocator::new())
    }

    /// Build state from configuration plus the environment override.
    pub fn from_config_and_env(config: DevfsConfig) -> Self {
        Self::new(config.with_env_overrides())
    }

    /// Build state with a caller-provided allocator (bounded id spaces).
    pub fn with_allocator(config: DevfsConfig, ids: MountIdAllocator) -> Self {
        Self {
            ids: Arc::new(ids),
            expand_symlinks: AtomicBool::new(config.expand_symlinks),
        }
    }

    /// The shared mount-id allocator.
    pub fn ids(&self) -> &Arc<MountIdAllocator> {
        &self.ids
    }

    /// Current expand-symlinks default.
    pub fn expand_symlinks(&self) -> bool {
        self.expand_symlinks.load(Ordering::Acquire)
    }

    /// Change the expand-symlinks default; affects later mounts only.
    pub fn set_expand_symlinks(&self, on: bool) {
        self.expand_symlinks.store(on, Ordering::Release);
        tracing::debug!("vfs.devfs.expandsymlinks -> {}", on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_bool_tunable() {
        assert_eq!(parse_bool_tunable("1"), Some(true));
        assert_eq!(parse_bool_tunable(" ON "), Some(true));
        assert_eq!(parse_bool_tunable("no"), Some(false));
        assert_eq!(parse_bool_tunable("maybe"), None);
    }

    #[test]
    fn test_config_from_toml() {
        let config = DevfsConfig::from_toml_str("expand_symlinks = true").unwrap();
        assert!(config.expand_symlinks);

        let config = DevfsConfig::from_toml_str("").unwrap();
        assert!(!config.expand_symlinks);

        assert!(DevfsConfig::from_toml_str("expand_symlinks = \"sure\"").is_err());
    }

    #[test]
    fn test_config_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "expand_symlinks = true").unwrap();
        let config = DevfsConfig::load(file.path()).unwrap();
        assert!(config.expand_symlinks);
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = DevfsConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(DevfsError::InvalidArgument(_))));
    }

    #[test]
    fn test_override_wins_over_file() {
        let config = DevfsConfig {
            expand_symlinks: false,
        };
        assert!(config.clone().with_override(Some("1")).expand_symlinks);
        assert!(!config.clone().with_override(Some("junk")).expand_symlinks);
        assert!(!config.with_override(None).expand_symlinks);
    }

    #[test]
    fn test_state_runtime_toggle() {
        let state = DevfsState::new(DevfsConfig {
            expand_symlinks: true,
        });
        assert!(state.expand_symlinks());
        state.set_expand_symlinks(false);
        assert!(!state.expand_symlinks());
    }
}
