//! Identifier rules: canonical ids and schema versions.
//!
//! Both types reject bad input outright. Nothing here truncates, trims or
//! normalises casing.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Constraint;

pub const CANON_ID_MIN_LEN: usize = 3;
pub const CANON_ID_MAX_LEN: usize = 160;

static CANON_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9:_-]+$").unwrap());

static SCHEMA_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is too short: {len} chars, minimum {min}")]
    TooShort { len: usize, min: usize },

    #[error("identifier is too long: {len} chars, maximum {max}")]
    TooLong { len: usize, max: usize },

    #[error("invalid character '{ch}' at position {position}; allowed: A-Z 0-9 : _ -")]
    InvalidCharacter { ch: char, position: usize },

    #[error("invalid schema version '{0}': expected MAJOR.MINOR.PATCH digits only")]
    InvalidVersion(String),
}

impl IdentifierError {
    pub fn constraint(&self) -> Constraint {
        match self {
            Self::TooShort { .. } => Constraint::MinLength,
            Self::TooLong { .. } => Constraint::MaxLength,
            Self::InvalidCharacter { .. } => Constraint::InvalidCharacter,
            Self::InvalidVersion(_) => Constraint::Pattern,
        }
    }
}

// ── CanonId ───────────────────────────────────────────────────

/// Stable uppercase token, 3–160 chars of `[A-Z0-9:_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonId(String);

impl CanonId {
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let len = s.chars().count();
        if len < CANON_ID_MIN_LEN {
            return Err(IdentifierError::TooShort {
                len,
                min: CANON_ID_MIN_LEN,
            });
        }
        if len > CANON_ID_MAX_LEN {
            return Err(IdentifierError::TooLong {
                len,
                max: CANON_ID_MAX_LEN,
            });
        }
        if !CANON_ID_RE.is_match(s) {
            // Report the first character outside the class
            if let Some((position, ch)) = s
                .chars()
                .enumerate()
                .find(|(_, c)| !matches!(c, 'A'..='Z' | '0'..='9' | ':' | '_' | '-'))
            {
                return Err(IdentifierError::InvalidCharacter { ch, position });
            }
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CanonId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CanonId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonId> for String {
    fn from(id: CanonId) -> Self {
        id.0
    }
}

// ── SchemaVersion ─────────────────────────────────────────────

/// Strict `major.minor.patch`. No pre-release or build metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SchemaVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let invalid = || IdentifierError::InvalidVersion(s.to_string());
        let caps = SCHEMA_VERSION_RE.captures(s).ok_or_else(invalid)?;
        let part = |i: usize| -> Result<u64, IdentifierError> {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .ok_or_else(invalid)
        };
        Ok(Self {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
        })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SchemaVersion> for String {
    fn from(v: SchemaVersion) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canon_id_accepts_loose_class() {
        for ok in ["PARTY", "DOC:INVOICE", "SCHEMA-V1", "A_1", "ABC"] {
            assert!(CanonId::parse(ok).is_ok(), "{ok} should parse");
        }
    }

    #[test]
    fn canon_id_length_bounds() {
        assert_eq!(
            CanonId::parse("AB").unwrap_err(),
            IdentifierError::TooShort { len: 2, min: 3 }
        );
        let long = "A".repeat(161);
        assert_eq!(
            CanonId::parse(&long).unwrap_err(),
            IdentifierError::TooLong { len: 161, max: 160 }
        );
        assert!(CanonId::parse(&"A".repeat(160)).is_ok());
    }

    #[test]
    fn canon_id_reports_first_bad_character() {
        let err = CanonId::parse("PARty").unwrap_err();
        assert_eq!(err, IdentifierError::InvalidCharacter { ch: 't', position: 3 });
        assert_eq!(err.constraint(), Constraint::InvalidCharacter);
    }

    #[test]
    fn canon_id_never_normalises_case() {
        assert!(CanonId::parse("party").is_err());
    }

    #[test]
    fn canon_id_serde_rejects_invalid() {
        let ok: CanonId = serde_json::from_str("\"PARTY\"").unwrap();
        assert_eq!(ok.as_str(), "PARTY");
        assert!(serde_json::from_str::<CanonId>("\"pa\"").is_err());
    }

    #[test]
    fn schema_version_strict() {
        assert_eq!(SchemaVersion::parse("1.2.3").unwrap(), SchemaVersion::new(1, 2, 3));
        assert_eq!(SchemaVersion::parse("0.0.0").unwrap().to_string(), "0.0.0");
        for bad in ["1.2", "1.2.3-beta", "1.2.3+build", "v1.2.3", "01.2.3", "1.2.x", ""] {
            assert!(SchemaVersion::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn schema_version_orders_numerically() {
        assert!(SchemaVersion::new(1, 10, 0) > SchemaVersion::new(1, 9, 9));
    }

    #[test]
    fn schema_version_serde_as_string() {
        let v = SchemaVersion::new(2, 0, 1);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"2.0.1\"");
        let back: SchemaVersion = serde_json::from_str("\"2.0.1\"").unwrap();
        assert_eq!(back, v);
    }
}
