//! Shared value types for the devfs mount core.
//!
//! This crate is a leaf: plain identifiers and small enums that both the
//! mount core (`devfs-kernel`) and its callers pass around. It has **no
//! internal devfs dependencies**.
//!
//! # Key Types
//!
//! |--------------------|---------------------------------------------------|
//! | Type               | Purpose                                           |
//! |--------------------|---------------------------------------------------|
//! | [`MountId`]        | Small reusable integer naming a live devfs mount  |
//! | [`FsId`]           | Filesystem id stamped on the generic mount        |
//! | [`RulesetNumber`]  | Ruleset selector, 0..=65535 (0 = none)            |
//! | [`LockMode`]       | Shared or exclusive acquisition                   |
//! | [`FsCtlOp`]        | Filesystem control (sysctl) query selector        |
//! | [`PrisonAllow`]    | Capability tags a jail may be granted             |
//! | [`StatFs`]         | Filesystem statistics snapshot                    |
//! |--------------------|---------------------------------------------------|

mod ids;
mod ops;
mod ruleset;
mod statfs;

pub use ids::{FsId, MountId};
pub use ops::{FsCtlOp, LockMode, PrisonAllow};
pub use ruleset::{RulesetNumber, RulesetParseError};
pub use statfs::{DEV_BSIZE, StatFs};
