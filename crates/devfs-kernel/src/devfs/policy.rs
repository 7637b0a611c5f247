//! Mount option policy.
//!
//! Turns a mount request's options and the caller's credential into the
//! effective ruleset, and applies the symlink-expansion toggles to a record.

use devfs_types::{PrisonAllow, RulesetNumber};

use super::record::MountData;
use crate::error::{DevfsError, DevfsResult};
use crate::vfs::{Credential, Mount};

/// Option names devfs understands (each also admits its `no` form).
pub const DEVFS_OPTS: &[&str] = &["from", "export", "ruleset", "expandsymlinks"];

const RULESET_ERRMSG: &str = "invalid ruleset specification";

/// Check the caller and the request's options; return the ruleset to use.
///
/// `RulesetNumber::NONE` means no ruleset was asked for. A jailed caller
/// always gets its jail's ruleset.
pub fn effective_ruleset(mp: &Mount, cred: &dyn Credential) -> DevfsResult<RulesetNumber> {
    let path = mp.path().display();

    if !cred.prison_allows(PrisonAllow::MountDevfs) {
        return Err(DevfsError::permission_denied(format!(
            "{}: {} not granted",
            path,
            PrisonAllow::MountDevfs
        )));
    }

    let jail_rsnum = cred.jail_devfs_ruleset();
    let mut rsnum = RulesetNumber::NONE;

    if let Some(opts) = mp.optnew() {
        if let Err(bad) = opts.filter(DEVFS_OPTS) {
            return Err(DevfsError::invalid_argument(format!(
                "{}: unknown option {:?}",
                path, bad
            )));
        }

        if opts.contains("export") {
            return Err(DevfsError::unsupported(format!(
                "{}: devfs cannot be exported",
                path
            )));
        }

        if let Some(value) = opts.get("ruleset") {
            rsnum = match value.unwrap_or("").parse::<RulesetNumber>() {
                Ok(n) => n,
                Err(e) => {
                    mp.set_error(RULESET_ERRMSG);
                    return Err(DevfsError::invalid_argument(format!(
                        "{}: {}: {}",
                        path, RULESET_ERRMSG, e
                    )));
                }
            };
        }

        if let Some(pinned) = jail_rsnum {
            if !rsnum.is_none() && rsnum != pinned {
                return Err(DevfsError::permission_denied(format!(
                    "{}: ruleset {} requested, jail is pinned to {}",
                    path, rsnum, pinned
                )));
            }
        }
    }

    // Jails enforce their ruleset.
    if let Some(pinned) = jail_rsnum {
        rsnum = pinned;
    }

    Ok(rsnum)
}

/// Apply the expand/no-expand toggles of the request to the record.
///
/// `noexpandsymlinks` is evaluated after `expandsymlinks`, so with both
/// present the flag ends up cleared. With neither present on a fresh mount
/// the process-wide default applies; an update without either keeps the
/// current setting.
pub fn apply_aux_opts(mp: &Mount, dm: &mut MountData, default_expand: bool) {
    let mut seen = false;

    match mp.optnew() {
        None => tracing::debug!(
            mount = %mp.path().display(),
            "no new options on request"
        ),
        Some(opts) => {
            if opts.contains("expandsymlinks") {
                dm.flags.expand_symlinks = true;
                seen = true;
            }
            if opts.contains("noexpandsymlinks") {
                dm.flags.expand_symlinks = false;
                seen = true;
            }
        }
    }

    if !seen && !mp.flags().update && default_expand {
        tracing::debug!(mount = %mp.path().display(), "expandsymlinks from default");
        dm.flags.expand_symlinks = true;
    }

    tracing::debug!(
        mount = %mp.path().display(),
        "{}expandsymlinks",
        if dm.flags.expand_symlinks { "" } else { "no" }
    );
}
