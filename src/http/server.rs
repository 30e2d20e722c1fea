//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the middleware chain
//! - Wire the error boundary, request IDs, CORS and tracing
//! - Dispatch every request through the route table
//! - Serve static content, SPA shell, redirects
//! - Forward everything else to the upstreams

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::api::{ApiRoutes, ApiState};
use crate::config::GatewayConfig;
use crate::http::proxy::{Forwarder, ProxyError};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::{ensure_error_body, error_boundary, panic_response, AppError};
use crate::http::static_files::{SpaShell, StaticMount};
use crate::routing::router::{SOURCES_PREFIX, SPA_PREFIX};
use crate::routing::{RouteAction, RouteTable, RouteTableError};
use crate::workers::RuntimeState;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub api: Router,
    pub sources: StaticMount,
    pub ui_assets: StaticMount,
    pub spa_shell: SpaShell,
    pub forwarder: Arc<Forwarder>,
    pub runtime: Arc<RuntimeState>,
}

/// Errors building the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("route table: {0}")]
    Routes(#[from] RouteTableError),

    #[error("proxy: {0}")]
    Proxy(#[from] ProxyError),
}

/// HTTP server for the management gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server with the built-in management endpoints.
    pub fn new(config: GatewayConfig, runtime: Arc<RuntimeState>) -> Result<Self, ServerError> {
        Self::with_api(config, runtime, ApiRoutes::standard())
    }

    /// Create a server with a custom set of management endpoints.
    pub fn with_api(
        config: GatewayConfig,
        runtime: Arc<RuntimeState>,
        api: ApiRoutes,
    ) -> Result<Self, ServerError> {
        let routes = Arc::new(RouteTable::standard(api.paths().iter().cloned())?);
        let forwarder = Arc::new(Forwarder::new(&config.upstreams, &config.timeouts)?);

        let api_state = ApiState {
            runtime: Arc::clone(&runtime),
            token: config.mgmt.token.clone(),
        };

        let state = AppState {
            routes,
            api: api.into_router(api_state, config.mgmt.max_body_size),
            sources: StaticMount::new(SOURCES_PREFIX, &config.paths.sources_dir),
            ui_assets: StaticMount::new(SPA_PREFIX, &config.paths.ui_dir),
            spa_shell: SpaShell::new(&config.paths.ui_dir),
            forwarder,
            runtime,
        };

        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(error_boundary))
            .layer(CorsLayer::permissive())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// The complete router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Resolve the request against the route table and execute the action.
async fn dispatch(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    let action = state.routes.resolve(&path).clone();

    tracing::debug!(
        request_id = %request.request_id(),
        method = %request.method(),
        path = %path,
        rule = %state.routes.rule_name(&path),
        "Dispatching request"
    );

    match action {
        RouteAction::Api => match state.api.clone().oneshot(request).await {
            Ok(response) => Ok(ensure_error_body(response).await),
            Err(never) => match never {},
        },
        RouteAction::Sources => state.sources.serve(request).await,
        RouteAction::SpaShell => state.spa_shell.serve().await,
        RouteAction::SpaAssets => state.ui_assets.serve(request).await,
        RouteAction::Redirect(redirect) => {
            let location = redirect.location_for(request.uri().query());
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
        RouteAction::Proxy => {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0);
            state
                .forwarder
                .forward(request, peer)
                .await
                .map_err(AppError::from)
        }
    }
}
