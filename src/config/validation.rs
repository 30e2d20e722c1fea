//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Proxy targets: catch-all present, prefixes well-formed and unique, targets are HTTP URLs
//! - Validate value ranges (timeouts > 0)
//!
//! Returns all validation errors, not just the first.

use std::collections::HashSet;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no catch-all upstream with prefix \"/\"")]
    MissingCatchAll,

    #[error("upstream prefix {0:?} must start and end with '/'")]
    MalformedPrefix(String),

    #[error("upstream prefix {0:?} is configured more than once")]
    DuplicatePrefix(String),

    #[error("upstream target {target:?} is invalid: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("timeout {0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("interval {0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Validate a configuration: `GatewayConfig → Result<(), Vec<ValidationError>>`.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for upstream in &config.upstreams {
        if !upstream.prefix.starts_with('/') || !upstream.prefix.ends_with('/') {
            errors.push(ValidationError::MalformedPrefix(upstream.prefix.clone()));
        }
        if !seen.insert(upstream.prefix.as_str()) {
            errors.push(ValidationError::DuplicatePrefix(upstream.prefix.clone()));
        }
        match Url::parse(&upstream.target) {
            Ok(url) if url.scheme() != "http" => errors.push(ValidationError::InvalidTarget {
                target: upstream.target.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            }),
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::InvalidTarget {
                target: upstream.target.clone(),
                reason: "missing host".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidTarget {
                target: upstream.target.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if !seen.contains("/") {
        errors.push(ValidationError::MissingCatchAll);
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    }
    if config.workers.releases_interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval("releases_interval_secs"));
    }
    if config.workers.market_interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval("market_interval_secs"));
    }
    if config.workers.crontab.iter().any(|job| job.interval_secs == 0) {
        errors.push(ValidationError::ZeroInterval("crontab.interval_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
