//! Semantic versions and version constraints
//!
//! Constraint syntax is a comma separated intersection of comparators:
//! `=1.2.0`, `>1.0`, `>=1.0`, `<2.0`, `<=2.0`, `^1.2`, `~1.2`, a bare version
//! (exact match), or `*` / `latest` (anything).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{NccError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<String>,
    pub build: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    fn same_release(&self, other: &Version) -> bool {
        (self.major, self.minor, self.patch) == (other.major, other.minor, other.patch)
    }
}

impl FromStr for Version {
    type Err = NccError;

    fn from_str(raw: &str) -> Result<Self> {
        let (version, _) = parse_partial(raw)?;
        Ok(version)
    }
}

/// Parse a version, reporting how many numeric parts were written
///
/// `1` and `1.2` are accepted and zero-filled; the count lets `^` and `~`
/// treat a partial version as a range.
fn parse_partial(raw: &str) -> Result<(Version, usize)> {
    let invalid = |why: &str| NccError::Validation {
        message: format!("invalid version '{raw}': {why}"),
    };

    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let (rest, build) = match trimmed.split_once('+') {
        Some((rest, build)) if !build.is_empty() => (rest, Some(build.to_string())),
        Some(_) => return Err(invalid("empty build metadata")),
        None => (trimmed, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => {
            let ids: Vec<String> = pre.split('.').map(str::to_string).collect();
            if ids.iter().any(|id| {
                id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            }) {
                return Err(invalid("bad pre-release identifier"));
            }
            (core, ids)
        }
        None => (rest, Vec::new()),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid("expected major[.minor[.patch]]"));
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("components must be numbers"));
        }
        *slot = part.parse().map_err(|_| invalid("component too large"))?;
    }

    Ok((
        Version {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            build,
        },
        parts.len(),
    ))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| compare_pre(&self.pre, &other.pre))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Semver pre-release precedence; a release sorts after its pre-releases
fn compare_pre(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b) {
        let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Caret,
    Tilde,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
    /// Number of numeric parts written (1 to 3)
    parts: usize,
}

impl Comparator {
    fn matches(&self, v: &Version) -> bool {
        let bound = &self.version;
        match self.op {
            Op::Exact => v.cmp(bound) == Ordering::Equal,
            Op::Greater => v > bound,
            Op::GreaterEq => v >= bound,
            Op::Less => v < bound,
            Op::LessEq => v <= bound,
            Op::Caret => v >= bound && *v < self.caret_upper(),
            Op::Tilde => v >= bound && *v < self.tilde_upper(),
        }
    }

    /// `^1.2.3` -> `<2.0.0`, `^0.2.3` -> `<0.3.0`, `^0.0.3` -> `<0.0.4`
    fn caret_upper(&self) -> Version {
        let b = &self.version;
        if b.major > 0 || self.parts == 1 {
            Version::new(b.major + 1, 0, 0)
        } else if b.minor > 0 || self.parts == 2 {
            Version::new(0, b.minor + 1, 0)
        } else {
            Version::new(0, 0, b.patch + 1)
        }
    }

    /// `~1.2.3` -> `<1.3.0`, `~1` -> `<2.0.0`
    fn tilde_upper(&self) -> Version {
        let b = &self.version;
        if self.parts == 1 {
            Version::new(b.major + 1, 0, 0)
        } else {
            Version::new(b.major, b.minor + 1, 0)
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Exact => "=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Caret => "^",
            Op::Tilde => "~",
        };
        let b = &self.version;
        match self.parts {
            1 if !b.is_prerelease() => write!(f, "{op}{}", b.major),
            2 if !b.is_prerelease() => write!(f, "{op}{}.{}", b.major, b.minor),
            _ => write!(f, "{op}{b}"),
        }
    }
}

/// Intersection of comparators; empty means any version
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionReq {
    comparators: Vec<Comparator>,
}

impl VersionReq {
    /// Matches every release version
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(version: &Version) -> Self {
        Self {
            comparators: vec![Comparator {
                op: Op::Exact,
                version: version.clone(),
                parts: 3,
            }],
        }
    }

    pub fn is_any(&self) -> bool {
        self.comparators.is_empty()
    }

    pub fn matches(&self, version: &Version) -> bool {
        if !self.comparators.iter().all(|c| c.matches(version)) {
            return false;
        }
        // Pre-releases only satisfy constraints that opt into the same release
        !version.is_prerelease()
            || self
                .comparators
                .iter()
                .any(|c| c.version.is_prerelease() && c.version.same_release(version))
    }

    /// Every constraint in `reqs` holds at once
    pub fn matches_all<'a>(reqs: impl IntoIterator<Item = &'a VersionReq>, version: &Version) -> bool {
        reqs.into_iter().all(|r| r.matches(version))
    }
}

impl FromStr for VersionReq {
    type Err = NccError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::any());
        }

        let mut comparators = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            if part == "*" {
                continue;
            }
            let (op, rest) = split_op(part);
            if rest.trim().is_empty() {
                return Err(NccError::Validation {
                    message: format!("invalid version constraint '{raw}'"),
                });
            }
            let (version, parts) = parse_partial(rest)?;
            comparators.push(Comparator { op, version, parts });
        }
        Ok(Self { comparators })
    }
}

fn split_op(part: &str) -> (Op, &str) {
    for (prefix, op) in [
        (">=", Op::GreaterEq),
        ("<=", Op::LessEq),
        (">", Op::Greater),
        ("<", Op::Less),
        ("=", Op::Exact),
        ("^", Op::Caret),
        ("~", Op::Tilde),
    ] {
        if let Some(rest) = part.strip_prefix(prefix) {
            return (op, rest);
        }
    }
    (Op::Exact, part)
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparators.is_empty() {
            return write!(f, "*");
        }
        for (i, c) in self.comparators.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl Serialize for VersionReq {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionReq {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
