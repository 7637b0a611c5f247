//! Ruleset numbers.
//!
//! A ruleset is an externally defined visibility policy. Mounts refer to one
//! by number; `0` means "no explicit ruleset".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a ruleset specification was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesetParseError {
    /// Not an integer at all.
    #[error("ruleset is not a number: {0:?}")]
    NotANumber(String),

    /// An integer outside `0..=65535`.
    #[error("ruleset {0} out of range 0..=65535")]
    OutOfRange(i64),
}

/// A ruleset selector in `0..=65535`.
#[derive(Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulesetNumber(u16);

impl RulesetNumber {
    /// No explicit ruleset.
    pub const NONE: RulesetNumber = RulesetNumber(0);

    pub const fn new(n: u16) -> Self {
        Self(n)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// True for ruleset 0.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Validate a wide integer against the ruleset range.
    pub fn try_from_i64(n: i64) -> Result<Self, RulesetParseError> {
        u16::try_from(n)
            .map(Self)
            .map_err(|_| RulesetParseError::OutOfRange(n))
    }
}

impl FromStr for RulesetNumber {
    type Err = RulesetParseError;

    /// Decimal integer with optional sign and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i64 = s
            .trim()
            .parse()
            .map_err(|_| RulesetParseError::NotANumber(s.to_string()))?;
        Self::try_from_i64(n)
    }
}

impl fmt::Debug for RulesetNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RulesetNumber({})", self.0)
    }
}

impl fmt::Display for RulesetNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for RulesetNumber {
    fn from(n: u16) -> Self {
        Self(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_in_range() {
        assert_eq!("0".parse::<RulesetNumber>(), Ok(RulesetNumber::NONE));
        assert_eq!(" 5 ".parse::<RulesetNumber>(), Ok(RulesetNumber::new(5)));
        assert_eq!("+65535".parse::<RulesetNumber>(), Ok(RulesetNumber::new(65535)));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert_eq!(
            "70000".parse::<RulesetNumber>(),
            Err(RulesetParseError::OutOfRange(70000))
        );
        assert_eq!(
            "-1".parse::<RulesetNumber>(),
            Err(RulesetParseError::OutOfRange(-1))
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            "lots".parse::<RulesetNumber>(),
            Err(RulesetParseError::NotANumber(_))
        ));
        assert!(matches!(
            "".parse::<RulesetNumber>(),
            Err(RulesetParseError::NotANumber(_))
        ));
        assert!(matches!(
            "12abc".parse::<RulesetNumber>(),
            Err(RulesetParseError::NotANumber(_))
        ));
    }

    #[test]
    fn test_none() {
        assert!(RulesetNumber::NONE.is_none());
        assert!(!RulesetNumber::new(3).is_none());
        assert_eq!(RulesetNumber::default(), RulesetNumber::NONE);
    }
}
