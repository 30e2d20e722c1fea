//! Management API.
//!
//! Handlers register themselves on an `ApiRoutes` builder in a fixed order.
//! Each registered path is claimed by the gateway's API route rule; anything
//! else under the API namespace falls through to the remaining rules.

pub mod auth;
pub mod system;

use std::sync::Arc;

use axum::{middleware, routing::MethodRouter, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::workers::RuntimeState;

/// State shared by management handlers.
#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<RuntimeState>,
    pub token: Option<String>,
}

/// Ordered registration of management endpoints.
pub struct ApiRoutes {
    public: Router<ApiState>,
    protected: Router<ApiState>,
    protected_count: usize,
    paths: Vec<String>,
}

impl ApiRoutes {
    pub fn new() -> Self {
        Self {
            public: Router::new(),
            protected: Router::new(),
            protected_count: 0,
            paths: Vec::new(),
        }
    }

    /// The gateway's built-in endpoints.
    pub fn standard() -> Self {
        Self::new().register(system::handle)
    }

    /// Endpoint reachable without a token.
    pub fn public(mut self, path: &str, route: MethodRouter<ApiState>) -> Self {
        self.public = self.public.route(path, route);
        self.paths.push(path.to_string());
        self
    }

    /// Endpoint behind the token check.
    pub fn protected(mut self, path: &str, route: MethodRouter<ApiState>) -> Self {
        self.protected = self.protected.route(path, route);
        self.protected_count += 1;
        self.paths.push(path.to_string());
        self
    }

    /// Apply a handler module's registrations.
    pub fn register<F>(self, handler: F) -> Self
    where
        F: FnOnce(ApiRoutes) -> ApiRoutes,
    {
        handler(self)
    }

    /// Registered paths, in registration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn into_router(self, state: ApiState, max_body_size: usize) -> Router {
        let mut router = self.public;
        // route_layer on a router without routes panics.
        if self.protected_count > 0 {
            router = router.merge(
                self.protected
                    .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_token)),
            );
        }

        router
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .with_state(state)
    }
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self::new()
    }
}
