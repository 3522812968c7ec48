//! Typed attribute values used in capability matching
//!
//! Capabilities carry attribute maps and requirement filters compare against
//! them. Values are typed so comparisons are well defined; version values get
//! semantic ordering instead of string ordering.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for version parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version format: {0} (expected major.minor.patch)")]
    Format(String),

    #[error("Invalid version segment: {0}")]
    Segment(String),
}

/// Represents a semantic version (major.minor.patch with optional pre-release)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
        }
    }

    /// Parse a version string into a Version
    ///
    /// Supports formats like:
    /// - "1.0.0"
    /// - "1.2" (patch defaults to 0)
    /// - "2.0.0-beta.1"
    pub fn parse(version_str: &str) -> Result<Self, VersionError> {
        let version_str = version_str.trim();

        // Split on '-' for pre-release
        let (version_part, pre_release) = if let Some(pos) = version_str.find('-') {
            (
                &version_str[..pos],
                Some(version_str[pos + 1..].to_string()),
            )
        } else {
            (version_str, None)
        };

        let parts: Vec<&str> = version_part.split('.').collect();
        if parts.is_empty() || parts.len() > 3 || parts[0].is_empty() {
            return Err(VersionError::Format(version_str.to_string()));
        }

        let mut segments = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            segments[i] = part
                .parse::<u64>()
                .map_err(|_| VersionError::Segment(part.to_string()))?;
        }

        Ok(Self {
            major: segments[0],
            minor: segments[1],
            patch: segments[2],
            pre_release,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => match self.minor.cmp(&other.minor) {
                Ordering::Equal => match self.patch.cmp(&other.patch) {
                    Ordering::Equal => {
                        // Pre-release versions are considered less than release versions
                        match (&self.pre_release, &other.pre_release) {
                            (None, None) => Ordering::Equal,
                            (Some(_), None) => Ordering::Less,
                            (None, Some(_)) => Ordering::Greater,
                            (Some(a), Some(b)) => a.cmp(b),
                        }
                    }
                    other => other,
                },
                other => other,
            },
            other => other,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A typed attribute value carried by a capability
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Version(Version),
    List(Vec<AttrValue>),
}

impl AttrValue {
    fn as_version(&self) -> Option<Version> {
        match self {
            AttrValue::Version(v) => Some(v.clone()),
            AttrValue::Str(s) => Version::parse(s).ok(),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Order two values for filter comparison
    ///
    /// Same-typed values compare directly. A string on either side is coerced
    /// to the other side's type where possible. Returns `None` when the pair
    /// cannot be ordered (the malformed-filter case for `<`/`>` operators).
    pub fn compare(&self, other: &AttrValue) -> Option<Ordering> {
        match (self, other) {
            (AttrValue::Int(a), AttrValue::Int(b)) => Some(a.cmp(b)),
            (AttrValue::Version(a), AttrValue::Version(b)) => Some(a.cmp(b)),
            (AttrValue::Bool(a), AttrValue::Bool(b)) => Some(a.cmp(b)),
            (AttrValue::Str(a), AttrValue::Str(b)) => Some(a.cmp(b)),
            (AttrValue::Version(a), other) => other.as_version().map(|b| a.cmp(&b)),
            (this, AttrValue::Version(b)) => this.as_version().map(|a| a.cmp(b)),
            (AttrValue::Int(a), other) => other.as_int().map(|b| a.cmp(&b)),
            (this, AttrValue::Int(b)) => this.as_int().map(|a| a.cmp(b)),
            (AttrValue::Bool(a), other) => other.as_bool().map(|b| a.cmp(&b)),
            (this, AttrValue::Bool(b)) => this.as_bool().map(|a| a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as used by `=` filters
    ///
    /// A list attribute matches when any of its elements matches.
    /// Mismatched types that cannot be coerced simply do not match.
    pub fn matches_eq(&self, other: &AttrValue) -> bool {
        if let AttrValue::List(items) = self {
            return items.iter().any(|v| v.matches_eq(other));
        }
        self == other || self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Version(v) => write!(f, "{}", v),
            AttrValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<Version> for AttrValue {
    fn from(value: Version) -> Self {
        AttrValue::Version(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));

        let v = Version::parse("2.1").unwrap();
        assert_eq!(v, Version::new(2, 1, 0));

        let v = Version::parse("1.0.0-beta.1").unwrap();
        assert_eq!(v.pre_release, Some("beta.1".to_string()));

        assert!(Version::parse("not-a-version").is_err());
        assert!(Version::parse("1.x.0").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let v100 = Version::parse("1.0.0").unwrap();
        let v110 = Version::parse("1.1.0").unwrap();
        let v200 = Version::parse("2.0.0").unwrap();
        let v200_beta = Version::parse("2.0.0-beta").unwrap();

        assert!(v100 < v110);
        assert!(v110 < v200);
        assert!(v200_beta < v200);
        assert_eq!(v100.cmp(&Version::new(1, 0, 0)), Ordering::Equal);
    }

    #[test]
    fn test_version_display_roundtrip() {
        for s in ["1.2.3", "0.1.0", "3.0.0-rc.1"] {
            assert_eq!(Version::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_compare_coerces_strings() {
        let attr = AttrValue::Version(Version::new(1, 2, 0));
        let literal = AttrValue::Str("1.1.0".to_string());
        assert_eq!(attr.compare(&literal), Some(Ordering::Greater));

        let attr = AttrValue::Int(10);
        let literal = AttrValue::Str("9".to_string());
        assert_eq!(attr.compare(&literal), Some(Ordering::Greater));

        let attr = AttrValue::Bool(true);
        let literal = AttrValue::Str("maybe".to_string());
        assert_eq!(attr.compare(&literal), None);
    }

    #[test]
    fn test_list_equality_matches_any_element() {
        let attr = AttrValue::List(vec![
            AttrValue::Str("tcp".to_string()),
            AttrValue::Str("udp".to_string()),
        ]);
        assert!(attr.matches_eq(&AttrValue::Str("udp".to_string())));
        assert!(!attr.matches_eq(&AttrValue::Str("sctp".to_string())));
    }
}
