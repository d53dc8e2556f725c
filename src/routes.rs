//! Route-to-price matching.
//!
//! A [`RoutePattern`] is `"METHOD /path"` where a path segment may be the
//! single-segment wildcard `*`. A `*` matches exactly one segment, never a
//! suffix; `"GET /premium/*"` matches `/premium/a` but not `/premium/a/b`.
//! Exact patterns always win over wildcard patterns; among wildcard
//! patterns the first declared match wins.

use std::{
    fmt::Display,
    str::FromStr,
};

use bon::Builder;
use http::Method;

use crate::types::{AmountValue, Asset};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// A parsed `"METHOD /path"` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    method: Method,
    segments: Vec<Segment>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoutePatternError {
    #[error("pattern must be \"METHOD /path\", got {0:?}")]
    MissingMethod(String),

    #[error("invalid HTTP method in pattern: {0:?}")]
    InvalidMethod(String),

    #[error("path must start with '/', got {0:?}")]
    RelativePath(String),

    #[error("path contains an empty segment: {0:?}")]
    EmptySegment(String),

    #[error("at most one wildcard segment is allowed: {0:?}")]
    MultipleWildcards(String),
}

impl RoutePattern {
    /// True when the pattern contains no wildcard segment.
    pub fn is_exact(&self) -> bool {
        !self.segments.contains(&Segment::Wildcard)
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if *method != self.method {
            return false;
        }
        let segments = split_path(path);
        if segments.len() != self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(segments)
            .all(|(pattern, actual)| match pattern {
                Segment::Literal(expected) => expected == actual,
                Segment::Wildcard => true,
            })
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

impl FromStr for RoutePattern {
    type Err = RoutePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (method, path) = s
            .split_once(' ')
            .ok_or_else(|| RoutePatternError::MissingMethod(s.to_string()))?;
        let method = Method::from_str(method)
            .map_err(|_| RoutePatternError::InvalidMethod(method.to_string()))?;
        if !path.starts_with('/') {
            return Err(RoutePatternError::RelativePath(path.to_string()));
        }

        let mut segments = Vec::new();
        for raw in split_path(path) {
            if raw.is_empty() {
                return Err(RoutePatternError::EmptySegment(path.to_string()));
            }
            segments.push(match raw {
                "*" => Segment::Wildcard,
                literal => Segment::Literal(literal.to_string()),
            });
        }
        let wildcards = segments
            .iter()
            .filter(|s| **s == Segment::Wildcard)
            .count();
        if wildcards > 1 {
            return Err(RoutePatternError::MultipleWildcards(path.to_string()));
        }

        Ok(RoutePattern { method, segments })
    }
}

impl Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} /", self.method)?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match segment {
                Segment::Literal(literal) => write!(f, "{literal}")?,
                Segment::Wildcard => write!(f, "*")?,
            }
        }
        Ok(())
    }
}

/// Price attached to a protected route. Immutable once loaded.
#[derive(Builder, Debug, Clone)]
pub struct PriceSpec {
    pub pattern: RoutePattern,
    #[builder(into)]
    pub amount: AmountValue,
    #[builder(default)]
    pub asset: Asset,
    #[builder(into)]
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteTableError {
    /// An empty table would silently make every route free.
    #[error("route table must not be empty")]
    Empty,

    #[error("duplicate route pattern: {0}")]
    DuplicatePattern(String),
}

/// The set of priced routes, validated once at startup.
///
/// Requests that match no entry pass through unpriced, so table
/// validation happens here rather than per request.
#[derive(Debug, Clone)]
pub struct RouteTable {
    specs: Vec<PriceSpec>,
}

impl RouteTable {
    pub fn new(specs: Vec<PriceSpec>) -> Result<Self, RouteTableError> {
        if specs.is_empty() {
            return Err(RouteTableError::Empty);
        }
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|other| other.pattern == spec.pattern) {
                return Err(RouteTableError::DuplicatePattern(spec.pattern.to_string()));
            }
        }
        Ok(RouteTable { specs })
    }

    /// Resolve a request to its price, or `None` for free pass-through.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<&PriceSpec> {
        self.specs
            .iter()
            .filter(|spec| spec.pattern.is_exact())
            .find(|spec| spec.pattern.matches(method, path))
            .or_else(|| {
                self.specs
                    .iter()
                    .filter(|spec| !spec.pattern.is_exact())
                    .find(|spec| spec.pattern.matches(method, path))
            })
    }
}
