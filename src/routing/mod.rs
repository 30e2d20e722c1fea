//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RouteAction (api / static / spa / redirect / proxy)
//!
//! Route Compilation (at startup):
//!     registered API paths
//!     → fixed rule list in priority order
//!     → duplicate exact paths rejected
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use router::{Redirect, RouteAction, RouteTable, RouteTableError};
