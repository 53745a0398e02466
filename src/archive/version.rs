//! Weak-ordered version tokens and best-match constraints.
//!
//! Versions here are package-manager-style tokens, not SemVer: segments are
//! compared numerically when both sides are numeric and lexicographically
//! otherwise, and a longer version wins an equal prefix. Constraints select
//! the greatest matching version, with `x`/`X`/`*` as wildcard segments.

use std::cmp::Ordering;
use std::fmt;

/// A dot-separated version token with weak ordering.
///
/// Equality follows the weak ordering, so `1.0` and `1.00` are equal even
/// though their raw tokens differ.
#[derive(Debug, Clone)]
pub struct Version(String);

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// One version segment, numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Text(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => Segment::Num(n),
            Err(_) => Segment::Text(raw.to_string()),
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            // Mixed or textual segments fall back to lexicographic order
            // on the raw text.
            (a, b) => a.raw().cmp(&b.raw()),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Segment {
    fn raw(&self) -> String {
        match self {
            Segment::Num(n) => n.to_string(),
            Segment::Text(t) => t.clone(),
        }
    }
}

impl Version {
    /// Wraps a raw version token.
    pub fn new(token: impl Into<String>) -> Self {
        Version(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> Vec<Segment> {
        self.0.split('.').map(Segment::parse).collect()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.segments();
        let b = other.segments();
        for (sa, sb) in a.iter().zip(b.iter()) {
            match sa.cmp(sb) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        // Equal prefix: the longer version is the later one.
        a.len().cmp(&b.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A best-match version constraint.
///
/// A constraint is a dot-separated token whose segments are either literals or
/// the wildcard `x`, `X`, or `*`. A version matches when every constraint
/// segment equals (numeric-aware) or wildcards the corresponding version
/// segment; the version may carry extra trailing segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint(String);

impl Constraint {
    /// Wraps a raw constraint token.
    pub fn new(token: impl Into<String>) -> Self {
        Constraint(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_wildcard(segment: &str) -> bool {
        matches!(segment, "x" | "X" | "*")
    }

    /// Whether `version` satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        let wanted: Vec<&str> = self.0.split('.').collect();
        let got: Vec<&str> = version.as_str().split('.').collect();
        if got.len() < wanted.len() {
            return false;
        }
        wanted.iter().zip(got.iter()).all(|(w, g)| {
            Self::is_wildcard(w) || Segment::parse(w) == Segment::parse(g)
        })
    }

    /// A filesystem glob over-approximating this constraint.
    ///
    /// Wildcard segments become `*`, and a trailing `*` admits versions with
    /// extra segments; callers must still filter with [`Constraint::matches`].
    pub fn glob_pattern(&self) -> String {
        let mut pattern = self
            .0
            .split('.')
            .map(|s| if Self::is_wildcard(s) { "*" } else { s })
            .collect::<Vec<_>>()
            .join(".");
        if !pattern.ends_with('*') {
            pattern.push('*');
        }
        pattern
    }

    /// The greatest version in `candidates` satisfying this constraint.
    pub fn best<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates
            .into_iter()
            .filter(|v| self.matches(v))
            .max_by(|a, b| a.cmp(b))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
