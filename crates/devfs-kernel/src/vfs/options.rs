//! Mount option lists.
//!
//! Options arrive as an ordered list of `name` or `name=value` pairs, the
//! same shape `mount -o` takes. Lookups return the last occurrence of a
//! name so that later options override earlier ones.

use std::fmt;

/// Names every filesystem accepts, owned by the mount framework itself.
pub const GLOBAL_OPTS: &[&str] = &["fstype", "fspath", "from", "errmsg", "ro", "rw", "update"];

/// One mount option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOption {
    pub name: String,
    pub value: Option<String>,
}

/// Ordered list of mount options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    opts: Vec<MountOption>,
}

impl MountOptions {
    /// Create an empty option list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a,b=c,d` text. Empty segments are skipped.
    pub fn parse(text: &str) -> Self {
        let opts = text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.split_once('=') {
                Some((name, value)) => MountOption {
                    name: name.trim().to_string(),
                    value: Some(value.trim().to_string()),
                },
                None => MountOption {
                    name: s.to_string(),
                    value: None,
                },
            })
            .collect();
        Self { opts }
    }

    /// Append a flag option.
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.opts.push(MountOption {
            name: name.into(),
            value: None,
        });
        self
    }

    /// Append a `name=value` option.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.push(MountOption {
            name: name.into(),
            value: Some(value.into()),
        });
        self
    }

    /// Look up an option.
    ///
    /// `None` if absent, `Some(None)` for a bare flag, `Some(Some(v))` for a
    /// valued option.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.opts
            .iter()
            .rev()
            .find(|o| o.name == name)
            .map(|o| o.value.as_deref())
    }

    /// True if the option is present, with or without a value.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Reject any option whose name is neither in `allowed`, a `no`-prefixed
    /// negation of an allowed name, nor a framework-global name.
    ///
    /// Returns the first offending name.
    pub fn filter(&self, allowed: &[&str]) -> Result<(), String> {
        let known = |name: &str| {
            allowed.contains(&name)
                || GLOBAL_OPTS.contains(&name)
                || name
                    .strip_prefix("no")
                    .is_some_and(|base| allowed.contains(&base) || GLOBAL_OPTS.contains(&base))
        };
        match self.opts.iter().find(|o| !known(&o.name)) {
            Some(bad) => Err(bad.name.clone()),
            None => Ok(()),
        }
    }

    /// Overlay `newer` on top of this list.
    ///
    /// A newer option replaces any older option of the same name and of its
    /// `no`-prefixed counterpart.
    pub fn merge(&mut self, newer: &MountOptions) {
        for opt in &newer.opts {
            let negation = negation_of(&opt.name);
            self.opts
                .retain(|o| o.name != opt.name && o.name != negation);
            self.opts.push(opt.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountOption> {
        self.opts.iter()
    }

    pub fn len(&self) -> usize {
        self.opts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }
}

/// `foo` <-> `nofoo`.
fn negation_of(name: &str) -> String {
    match name.strip_prefix("no") {
        Some(base) => base.to_string(),
        None => format!("no{}", name),
    }
}

impl fmt::Display for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for opt in &self.opts {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            match &opt.value {
                Some(v) => write!(f, "{}={}", opt.name, v)?,
                None => f.write_str(&opt.name)?,
            }
        }
        Ok(())
    }
}
