//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → Start serving → Spawn worker supervisor
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Server drains connections → Workers observe and exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Workers start only after the listener is bound
//! - A failed worker degrades the gateway; it stops the process only when
//!   `workers.exit_on_failure` is set

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
