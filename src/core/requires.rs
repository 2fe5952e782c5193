//! Supported-interpreter ranges.
//!
//! Each member declares the interpreter versions it supports; the merged
//! distribution supports their intersection. Ranges are semver comparator
//! lists, so intersection is comparator concatenation, and unsatisfiability
//! is decided by interval analysis over the comparators' bounds.

use std::fmt;

use semver::{Comparator, Op, Version, VersionReq};

/// An interpreter version range, e.g. `>=3.8, <3.12`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiresPython {
    req: VersionReq,
}

impl RequiresPython {
    /// Parse a range string.
    pub fn parse(input: &str) -> Result<Self, String> {
        let req = VersionReq::parse(input).map_err(|e| e.to_string())?;
        Ok(RequiresPython { req })
    }

    /// Intersect with another range.
    ///
    /// Comparators are concatenated in argument order and exact duplicates
    /// dropped, so folding members in resolution order is deterministic.
    pub fn intersect(&self, other: &RequiresPython) -> RequiresPython {
        let mut comparators = self.req.comparators.clone();
        for comparator in &other.req.comparators {
            if !comparators.contains(comparator) {
                comparators.push(comparator.clone());
            }
        }
        RequiresPython {
            req: VersionReq { comparators },
        }
    }

    /// Whether no version at all can satisfy the range.
    ///
    /// Decided statically from each comparator's interval: the greatest
    /// lower bound must not exceed the least upper bound.
    pub fn is_unsatisfiable(&self) -> bool {
        let mut lower = Bound::Open;
        let mut upper = Bound::Open;

        for comparator in &self.req.comparators {
            let (lo, hi) = comparator_interval(comparator);
            lower = lower.tighter_lower(lo);
            upper = upper.tighter_upper(hi);
        }

        match (&lower, &upper) {
            (Bound::At { version: lo, inclusive: lo_inc }, Bound::At { version: hi, inclusive: hi_inc }) => {
                lo > hi || (lo == hi && !(*lo_inc && *hi_inc))
            }
            _ => false,
        }
    }
}

impl fmt::Display for RequiresPython {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.req)
    }
}

/// One side of a comparator's version interval.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Bound {
    /// Unbounded on this side
    Open,
    At { version: Version, inclusive: bool },
}

impl Bound {
    fn included(version: Version) -> Self {
        Bound::At {
            version,
            inclusive: true,
        }
    }

    fn excluded(version: Version) -> Self {
        Bound::At {
            version,
            inclusive: false,
        }
    }

    fn tighter_lower(self, other: Bound) -> Bound {
        match (&self, &other) {
            (Bound::Open, _) => other,
            (_, Bound::Open) => self,
            (
                Bound::At { version: a, inclusive: a_inc },
                Bound::At { version: b, inclusive: b_inc },
            ) => {
                if a > b || (a == b && (!a_inc || *b_inc)) {
                    self
                } else {
                    other
                }
            }
        }
    }

    fn tighter_upper(self, other: Bound) -> Bound {
        match (&self, &other) {
            (Bound::Open, _) => other,
            (_, Bound::Open) => self,
            (
                Bound::At { version: a, inclusive: a_inc },
                Bound::At { version: b, inclusive: b_inc },
            ) => {
                if a < b || (a == b && (!a_inc || *b_inc)) {
                    self
                } else {
                    other
                }
            }
        }
    }
}

fn ver(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

/// The `[lower, upper]` interval a single comparator admits, following the
/// semver crate's partial-version semantics (`>3.8` admits nothing in
/// `3.8.*`, `=3.8` admits all of it, and so on).
fn comparator_interval(c: &Comparator) -> (Bound, Bound) {
    let major = c.major;
    match (c.op, c.minor, c.patch) {
        (Op::Exact, None, _) => (
            Bound::included(ver(major, 0, 0)),
            Bound::excluded(ver(major + 1, 0, 0)),
        ),
        (Op::Exact, Some(minor), None) => (
            Bound::included(ver(major, minor, 0)),
            Bound::excluded(ver(major, minor + 1, 0)),
        ),
        (Op::Exact, Some(minor), Some(patch)) => {
            let mut version = ver(major, minor, patch);
            version.pre = c.pre.clone();
            (Bound::included(version.clone()), Bound::included(version))
        }

        (Op::Greater, None, _) => (Bound::included(ver(major + 1, 0, 0)), Bound::Open),
        (Op::Greater, Some(minor), None) => {
            (Bound::included(ver(major, minor + 1, 0)), Bound::Open)
        }
        (Op::Greater, Some(minor), Some(patch)) => {
            let mut version = ver(major, minor, patch);
            version.pre = c.pre.clone();
            (Bound::excluded(version), Bound::Open)
        }

        (Op::GreaterEq, None, _) => (Bound::included(ver(major, 0, 0)), Bound::Open),
        (Op::GreaterEq, Some(minor), None) => {
            (Bound::included(ver(major, minor, 0)), Bound::Open)
        }
        (Op::GreaterEq, Some(minor), Some(patch)) => {
            let mut version = ver(major, minor, patch);
            version.pre = c.pre.clone();
            (Bound::included(version), Bound::Open)
        }

        (Op::Less, None, _) => (Bound::Open, Bound::excluded(ver(major, 0, 0))),
        (Op::Less, Some(minor), None) => (Bound::Open, Bound::excluded(ver(major, minor, 0))),
        (Op::Less, Some(minor), Some(patch)) => {
            let mut version = ver(major, minor, patch);
            version.pre = c.pre.clone();
            (Bound::Open, Bound::excluded(version))
        }

        (Op::LessEq, None, _) => (Bound::Open, Bound::excluded(ver(major + 1, 0, 0))),
        (Op::LessEq, Some(minor), None) => {
            (Bound::Open, Bound::excluded(ver(major, minor + 1, 0)))
        }
        (Op::LessEq, Some(minor), Some(patch)) => {
            let mut version = ver(major, minor, patch);
            version.pre = c.pre.clone();
            (Bound::Open, Bound::included(version))
        }

        (Op::Tilde, None, _) => (
            Bound::included(ver(major, 0, 0)),
            Bound::excluded(ver(major + 1, 0, 0)),
        ),
        (Op::Tilde, Some(minor), None) => (
            Bound::included(ver(major, minor, 0)),
            Bound::excluded(ver(major, minor + 1, 0)),
        ),
        (Op::Tilde, Some(minor), Some(patch)) => {
            let mut version = ver(major, minor, patch);
            version.pre = c.pre.clone();
            (
                Bound::included(version),
                Bound::excluded(ver(major, minor + 1, 0)),
            )
        }

        (Op::Caret, minor, patch) => caret_interval(c, major, minor, patch),

        (Op::Wildcard, None, _) => (
            Bound::included(ver(major, 0, 0)),
            Bound::excluded(ver(major + 1, 0, 0)),
        ),
        (Op::Wildcard, Some(minor), _) => (
            Bound::included(ver(major, minor, 0)),
            Bound::excluded(ver(major, minor + 1, 0)),
        ),

        // semver has no other ops today; treat anything new as unbounded
        // rather than reporting a spurious empty intersection
        _ => (Bound::Open, Bound::Open),
    }
}

fn caret_interval(
    c: &Comparator,
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
) -> (Bound, Bound) {
    let mut low = ver(major, minor.unwrap_or(0), patch.unwrap_or(0));
    low.pre = c.pre.clone();

    let high = if major > 0 {
        ver(major + 1, 0, 0)
    } else {
        match (minor, patch) {
            (None, _) => ver(1, 0, 0),
            (Some(0), None) => ver(0, 1, 0),
            (Some(minor), None) => ver(0, minor + 1, 0),
            (Some(0), Some(patch)) => ver(0, 0, patch + 1),
            (Some(minor), Some(_)) => ver(0, minor + 1, 0),
        }
    };

    (Bound::included(low), Bound::excluded(high))
}
