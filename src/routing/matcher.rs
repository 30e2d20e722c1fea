//! Route matching logic.
//!
//! # Responsibilities
//! - Match exact paths and path prefixes (case-sensitive)
//! - Match registered management API paths
//! - Recognise client-side routed SPA paths
//!
//! # Design Decisions
//! - Matchers only look at the request path
//! - No regex to guarantee O(n) matching

use std::sync::Arc;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;

    /// The path this matcher accepts, if it accepts exactly one.
    fn exact_path(&self) -> Option<&str> {
        None
    }
}

/// Matches a single path exactly.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    path: String,
}

impl ExactMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path
    }

    fn exact_path(&self) -> Option<&str> {
        Some(&self.path)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// One segment of a registered route path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{name}`: exactly one non-empty segment.
    Param,
    /// `{*name}`: the rest of the path.
    CatchAll,
}

/// A route path in axum syntax, compiled for segment-wise matching.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .skip(1)
            .map(|seg| {
                if seg.starts_with("{*") && seg.ends_with('}') {
                    Segment::CatchAll
                } else if seg.starts_with('{') && seg.ends_with('}') && seg.len() > 2 {
                    Segment::Param
                } else {
                    Segment::Literal(seg.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    fn matches(&self, path: &str) -> bool {
        let mut parts = path.split('/').skip(1);
        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return true,
                Segment::Param => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(lit) => match parts.next() {
                    Some(part) if part == lit => {}
                    _ => return false,
                },
            }
        }
        parts.next().is_none()
    }
}

/// Matches paths under the API namespace that have a registered handler.
///
/// Registered paths may carry `{param}` and `{*rest}` segments. Unregistered
/// paths under the namespace fall through to later rules.
#[derive(Debug, Clone)]
pub struct ApiMatcher {
    prefix: String,
    patterns: Arc<Vec<RoutePattern>>,
}

impl ApiMatcher {
    pub fn new(prefix: impl Into<String>, paths: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefix: prefix.into(),
            patterns: Arc::new(paths.into_iter().map(|p| RoutePattern::parse(&p)).collect()),
        }
    }
}

impl Matcher for ApiMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix) && self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Matches "virtual" SPA routes owned by the client-side router.
///
/// A virtual route lives under the namespace, has no file extension and
/// exactly two separators (`/mgmt/dashboard`), so nested assets such as
/// `/mgmt/static/js/app.js` are never shadowed.
#[derive(Debug, Clone)]
pub struct SpaVirtualMatcher {
    prefix: String,
}

impl SpaVirtualMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for SpaVirtualMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
            && !path.contains('.')
            && path.matches('/').count() == 2
    }
}
