//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware chain, dispatch)
//!     → request.rs (request ID generation and propagation)
//!     → [route table picks an action]
//!     → static_files.rs | proxy.rs | api handlers
//!     → response.rs (error boundary, JSON envelopes)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::AppError;
pub use server::HttpServer;
