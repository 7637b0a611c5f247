//! Caller credentials and jails.
//!
//! The mount path asks two questions of whoever is calling: may they mount
//! this filesystem at all, and if they are jailed, which devfs ruleset is
//! their jail pinned to.

use std::collections::HashSet;
use std::sync::Arc;

use devfs_types::{PrisonAllow, RulesetNumber};

/// What the mount path needs to know about its caller.
pub trait Credential: Send + Sync {
    /// True if the caller holds `allow`.
    fn prison_allows(&self, allow: PrisonAllow) -> bool;

    /// The jail's devfs ruleset, or `None` outside any jail.
    fn jail_devfs_ruleset(&self) -> Option<RulesetNumber>;

    /// True if the caller is inside a jail.
    fn is_jailed(&self) -> bool {
        self.jail_devfs_ruleset().is_some()
    }
}

/// A jail: name, pinned devfs ruleset and granted capabilities.
#[derive(Debug, Clone)]
pub struct Prison {
    name: String,
    devfs_ruleset: RulesetNumber,
    allow: HashSet<PrisonAllow>,
}

impl Prison {
    /// Create a jail with no capabilities granted.
    pub fn new(name: impl Into<String>, devfs_ruleset: RulesetNumber) -> Self {
        Self {
            name: name.into(),
            devfs_ruleset,
            allow: HashSet::new(),
        }
    }

    /// Grant a capability.
    pub fn allow(mut self, allow: PrisonAllow) -> Self {
        self.allow.insert(allow);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn devfs_ruleset(&self) -> RulesetNumber {
        self.devfs_ruleset
    }
}

/// A concrete credential: host or jailed.
#[derive(Debug, Clone, Default)]
pub struct Cred {
    prison: Option<Arc<Prison>>,
}

impl Cred {
    /// Unjailed credential holding every capability.
    pub fn host() -> Self {
        Self { prison: None }
    }

    /// Credential confined to `prison`.
    pub fn jailed(prison: Prison) -> Self {
        Self {
            prison: Some(Arc::new(prison)),
        }
    }

    pub fn prison(&self) -> Option<&Prison> {
        self.prison.as_deref()
    }
}

impl Credential for Cred {
    fn prison_allows(&self, allow: PrisonAllow) -> bool {
        match &self.prison {
            None => true,
            Some(prison) => prison.allow.contains(&allow),
        }
    }

    fn jail_devfs_ruleset(&self) -> Option<RulesetNumber> {
        self.prison.as_ref().map(|p| p.devfs_ruleset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_allows_everything() {
        let cred = Cred::host();
        assert!(cred.prison_allows(PrisonAllow::MountDevfs));
        assert!(!cred.is_jailed());
        assert_eq!(cred.jail_devfs_ruleset(), None);
    }

    #[test]
    fn test_jail_grants() {
        let cred = Cred::jailed(
            Prison::new("www", RulesetNumber::new(4)).allow(PrisonAllow::MountDevfs),
        );
        assert!(cred.is_jailed());
        assert!(cred.prison_allows(PrisonAllow::MountDevfs));
        assert!(!cred.prison_allows(PrisonAllow::MountSynthetic));
        assert_eq!(cred.jail_devfs_ruleset(), Some(RulesetNumber::new(4)));
        assert_eq!(cred.prison().map(Prison::name), Some("www"));
    }
}
