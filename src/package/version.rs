//! Version model for repository tags.
//!
//! Tags are parsed into a numeric value (`1.2.3` -> `[1, 2, 3]`) and an
//! optional prerelease suffix (`-rc.1` -> `["rc", "1"]`). Ordering rules:
//!
//! - A value with more segments is greater, whatever the segments hold
//!   (`1.0.0.0 > 9.9.9`). There is no zero padding.
//! - At equal value, a version without suffix is greater than one with.
//! - Between two suffixed versions, more tokens wins; at equal token count
//!   the `.`-joined suffixes compare lexicographically.

use anyhow::Result;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::InvalidVersionError;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?([0-9]+(?:\.[0-9]+)*)(\.?[0-9A-Za-z.\-]+)?$").expect("valid version regex")
});

/// Accumulator seed for [`find_latest`]; returned when nothing parses.
const ZERO_VERSION: &str = "0.0.0";

/// A parsed tag.
#[derive(Debug, Clone)]
pub struct Version {
    /// The tag exactly as it was given.
    pub original: String,
    pub value: Vec<u64>,
    /// `Some` iff the tag is a prerelease.
    pub suffix: Option<Vec<String>>,
}

impl Version {
    pub fn parse(expr: &str) -> Result<Self, InvalidVersionError> {
        if expr.is_empty() {
            return Err(InvalidVersionError::new("Version is empty"));
        }
        if expr.contains("..") {
            return Err(InvalidVersionError::new(format!(
                "Repeated dots in version: {}",
                expr
            )));
        }
        let captures = VERSION_RE
            .captures(expr)
            .ok_or_else(|| InvalidVersionError::new(format!("Invalid version format: {}", expr)))?;

        let value = parse_segments(&captures[1])?;
        let suffix = match captures.get(2) {
            Some(m) => Some(parse_suffix(m.as_str())?),
            None => None,
        };

        Ok(Self {
            original: expr.to_string(),
            value,
            suffix,
        })
    }

    pub fn is_stable(&self) -> bool {
        self.suffix.is_none()
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        if self.value.len() != other.value.len() {
            return self.value.len().cmp(&other.value.len());
        }
        match self.value.cmp(&other.value) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (&self.suffix, &other.suffix) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => left
                .len()
                .cmp(&right.len())
                .then_with(|| left.join(".").cmp(&right.join("."))),
        }
    }
}

fn parse_segments(segments: &str) -> Result<Vec<u64>, InvalidVersionError> {
    segments
        .split('.')
        .map(|segment| {
            segment.parse::<u64>().map_err(|_| {
                InvalidVersionError::new(format!("Invalid segments value: {}", segments))
            })
        })
        .collect()
}

fn parse_suffix(suffix: &str) -> Result<Vec<String>, InvalidVersionError> {
    let stripped = suffix
        .strip_prefix('-')
        .or_else(|| suffix.strip_prefix('.'))
        .unwrap_or(suffix);
    if stripped.is_empty() {
        return Err(InvalidVersionError::new(format!(
            "Invalid suffix: {}",
            suffix
        )));
    }
    Ok(stripped.split('.').map(String::from).collect())
}

impl FromStr for Version {
    type Err = InvalidVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

// Equality follows `compare`, so `v1.0.0 == 1.0.0`.
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

/// Pick the greatest tag, skipping tags that do not parse.
///
/// Returns `"0.0.0"` when no tag parses (or no stable tag exists while
/// `stable_only` is set).
pub fn find_latest<S: AsRef<str>>(tags: &[S], stable_only: bool) -> String {
    let seed = Version {
        original: ZERO_VERSION.to_string(),
        value: vec![0, 0, 0],
        suffix: None,
    };
    tags.iter()
        .filter_map(|tag| Version::parse(tag.as_ref()).ok())
        .filter(|v| !stable_only || v.is_stable())
        .fold(seed, |latest, candidate| {
            if candidate.compare(&latest) == Ordering::Greater {
                candidate
            } else {
                latest
            }
        })
        .original
}
