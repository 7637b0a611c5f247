//! devfs error types.

use std::io;
use thiserror::Error;

/// devfs error type.
///
/// Every variant carries the diagnostic text meant for the user (mount
/// point, offending value). Nothing is retried internally; callers get the
/// error as-is.
#[derive(Debug, Error)]
pub enum DevfsError {
    /// Operation not supported by this filesystem (root mount, export).
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// Caller lacks the capability, or a jail ruleset mismatch.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed or out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// References are still outstanding.
    #[error("resource busy: {0}")]
    Busy(String),

    /// Mount id space exhausted.
    #[error("mount id space exhausted")]
    Exhausted,

    /// Unknown filesystem control query.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// No live devfs record behind this mount or path.
    #[error("not mounted: {0}")]
    NotMounted(String),

    /// Caller-supplied output buffer cannot hold the result.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Unexpected failure from a collaborator.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DevfsError {
    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a Busy error.
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Create a NotSupported error.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Create a NotMounted error.
    pub fn not_mounted(msg: impl Into<String>) -> Self {
        Self::NotMounted(msg.into())
    }

    /// Create an Internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// BSD errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            DevfsError::Unsupported(_) => 45,       // EOPNOTSUPP
            DevfsError::PermissionDenied(_) => 1,   // EPERM
            DevfsError::InvalidArgument(_) => 22,   // EINVAL
            DevfsError::Busy(_) => 16,              // EBUSY
            DevfsError::Exhausted => 28,            // ENOSPC
            DevfsError::NotSupported(_) => 45,      // ENOTSUP
            DevfsError::NotMounted(_) => 22,        // EINVAL
            DevfsError::BufferTooSmall { .. } => 12, // ENOMEM
            DevfsError::Internal(_) => 5,           // EIO
        }
    }
}

/// Convert DevfsError to std::io::Error for compatibility.
impl From<DevfsError> for io::Error {
    fn from(e: DevfsError) -> Self {
        match e {
            DevfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            DevfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            DevfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            DevfsError::Busy(msg) => io::Error::new(io::ErrorKind::ResourceBusy, msg),
            DevfsError::Exhausted => {
                io::Error::new(io::ErrorKind::StorageFull, "mount id space exhausted")
            }
            DevfsError::NotSupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            DevfsError::NotMounted(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            e @ DevfsError::BufferTooSmall { .. } => {
                io::Error::new(io::ErrorKind::OutOfMemory, e.to_string())
            }
            DevfsError::Internal(msg) => io::Error::other(msg),
        }
    }
}

/// devfs result type.
pub type DevfsResult<T> = Result<T, DevfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(DevfsError::unsupported("/").errno(), 45);
        assert_eq!(DevfsError::permission_denied("jail").errno(), 1);
        assert_eq!(DevfsError::invalid_argument("ruleset").errno(), 22);
        assert_eq!(DevfsError::busy("/dev").errno(), 16);
        assert_eq!(DevfsError::Exhausted.errno(), 28);
    }

    #[test]
    fn test_io_conversion() {
        let err: io::Error = DevfsError::busy("/dev").into();
        assert_eq!(err.kind(), io::ErrorKind::ResourceBusy);

        let err: io::Error = DevfsError::permission_denied("jail").into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let err: io::Error = DevfsError::BufferTooSmall {
            needed: 15,
            available: 4,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_display_carries_context() {
        let err = DevfsError::invalid_argument("invalid ruleset specification: 70000");
        assert!(err.to_string().contains("70000"));
    }
}
