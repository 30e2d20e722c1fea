//! Management gateway library: routing, reverse proxy and worker supervision.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod workers;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
