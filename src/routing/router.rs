//! Route lookup and dispatch decision.
//!
//! # Responsibilities
//! - Store route rules in registration order
//! - Resolve a request path to exactly one action
//! - Reject duplicate exact-path rules at construction
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan, first match wins
//! - No match resolves to the proxy, never to a silent 404

use crate::routing::matcher::{
    ApiMatcher, ExactMatcher, Matcher, PathPrefixMatcher, SpaVirtualMatcher,
};

/// Namespace of the management API.
pub const MGMT_API_PREFIX: &str = "/terraform/v1/mgmt/";
/// Namespace of downloadable source files.
pub const SOURCES_PREFIX: &str = "/terraform/v1/sources/";
/// Namespace of the management console SPA.
pub const SPA_PREFIX: &str = "/mgmt/";

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Dispatch to the management API router.
    Api,
    /// Serve a file from the sources directory.
    Sources,
    /// Return the SPA HTML shell.
    SpaShell,
    /// Serve SPA build assets.
    SpaAssets,
    /// Answer with a 302.
    Redirect(Redirect),
    /// Forward to an upstream.
    Proxy,
}

/// A redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub preserve_query: bool,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            preserve_query: false,
        }
    }

    pub fn with_query(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            preserve_query: true,
        }
    }

    /// The `Location` value for a request carrying `query`.
    pub fn location_for(&self, query: Option<&str>) -> String {
        match query {
            Some(q) if self.preserve_query && !q.is_empty() => {
                format!("{}?{}", self.location, q)
            }
            _ => self.location.clone(),
        }
    }
}

/// Errors raised while building a route table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("exact path {path:?} registered by both {first:?} and {second:?}")]
    DuplicateExactPath {
        path: String,
        first: String,
        second: String,
    },
}

/// A single rule: predicate → action.
#[derive(Debug)]
pub struct RouteRule {
    pub name: String,
    matcher: Box<dyn Matcher>,
    pub action: RouteAction,
}

/// Ordered set of route rules.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Its position is its priority.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        matcher: impl Matcher + 'static,
        action: RouteAction,
    ) -> Result<(), RouteTableError> {
        let name = name.into();
        if let Some(path) = matcher.exact_path() {
            if let Some(existing) = self
                .rules
                .iter()
                .find(|r| r.matcher.exact_path() == Some(path))
            {
                return Err(RouteTableError::DuplicateExactPath {
                    path: path.to_string(),
                    first: existing.name.clone(),
                    second: name,
                });
            }
        }

        self.rules.push(RouteRule {
            name,
            matcher: Box::new(matcher),
            action,
        });
        Ok(())
    }

    /// The gateway's fixed rule list.
    pub fn standard(api_paths: impl IntoIterator<Item = String>) -> Result<Self, RouteTableError> {
        let mut table = Self::new();
        table.push("api", ApiMatcher::new(MGMT_API_PREFIX, api_paths), RouteAction::Api)?;
        table.push("sources", PathPrefixMatcher::new(SOURCES_PREFIX), RouteAction::Sources)?;
        table.push("spa-shell", SpaVirtualMatcher::new(SPA_PREFIX), RouteAction::SpaShell)?;
        table.push("spa-assets", PathPrefixMatcher::new(SPA_PREFIX), RouteAction::SpaAssets)?;
        table.push("home", ExactMatcher::new("/"), RouteAction::Redirect(Redirect::to(SPA_PREFIX)))?;
        table.push(
            "home-index",
            ExactMatcher::new("/index.html"),
            RouteAction::Redirect(Redirect::to(SPA_PREFIX)),
        )?;
        table.push(
            "console",
            ExactMatcher::new("/console"),
            RouteAction::Redirect(Redirect::with_query("/console/")),
        )?;
        table.push(
            "players",
            ExactMatcher::new("/players"),
            RouteAction::Redirect(Redirect::with_query("/players/")),
        )?;
        Ok(table)
    }

    /// Resolve a path. Unmatched paths go to the proxy.
    pub fn resolve(&self, path: &str) -> &RouteAction {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(path))
            .map(|r| &r.action)
            .unwrap_or(&RouteAction::Proxy)
    }

    /// Name of the first matching rule, for logging.
    pub fn rule_name(&self, path: &str) -> &str {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(path))
            .map(|r| r.name.as_str())
            .unwrap_or("proxy")
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
