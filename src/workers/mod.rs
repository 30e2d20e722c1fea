//! Background worker subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor::run (after the listener is bound)
//!     → spawn each Worker on its own task (concurrently)
//!     → worker publishes WorkerMessage { metadata } through its Outbox
//!     → supervisor applies it to RuntimeState (per-worker MergeRule)
//!     → worker exits: code 0 completes, non-zero fails Supervisor::run
//!
//! API handlers
//!     → read RuntimeState (missing keys are "unknown")
//! ```
//!
//! # Design Decisions
//! - Workers share nothing with the server; messages and exit codes only
//! - Last write wins per key
//! - Each worker runs once per process lifetime

pub mod crontab;
pub mod market;
pub mod message;
pub mod releases;
pub mod state;
pub mod supervisor;
pub mod worker;

pub use message::{Outbox, WorkerContext, WorkerMessage};
pub use state::{LifecycleState, MarketEntry, MergeRule, RuntimeState, WorkerDescriptor};
pub use supervisor::{Supervisor, SupervisorError};
pub use worker::{Worker, WorkerError, WorkerFn};
