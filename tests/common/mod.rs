//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use mgmt_gateway::api::ApiRoutes;
use mgmt_gateway::config::{GatewayConfig, UpstreamConfig};
use mgmt_gateway::lifecycle::{startup, Shutdown};
use mgmt_gateway::workers::{RuntimeState, Supervisor};
use mgmt_gateway::HttpServer;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a raw TCP backend that answers every connection with a fixed body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Start an axum upstream that echoes the request back as JSON with status 201.
pub async fn start_echo_upstream() -> SocketAddr {
    async fn echo(request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        let headers: BTreeMap<String, String> = parts
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        (
            StatusCode::CREATED,
            [("x-upstream", "echo")],
            Json(json!({
                "method": parts.method.as_str(),
                "uri": parts.uri.to_string(),
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            })),
        )
            .into_response()
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, Router::new().fallback(echo)).await;
    });
    addr
}

/// Config with every upstream prefix pointed at the given backends.
pub fn gateway_config(api: SocketAddr, web: SocketAddr, ui_dir: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstreams = vec![
        UpstreamConfig::new("/api/", format!("http://{}", api)),
        UpstreamConfig::new("/rtc/", format!("http://{}", api)),
        UpstreamConfig::new("/", format!("http://{}", web)),
    ];
    config.paths.ui_dir = ui_dir.display().to_string();
    config.paths.sources_dir = ui_dir.join("sources").display().to_string();
    config.workers.containers.clear();
    config
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub runtime: Arc<RuntimeState>,
    pub task: JoinHandle<Result<(), startup::StartupError>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) -> Result<(), startup::StartupError> {
        self.shutdown.trigger();
        self.task.await.unwrap()
    }
}

/// Spawn a gateway with custom API routes and workers.
pub async fn spawn_gateway_with(
    config: GatewayConfig,
    api: ApiRoutes,
    workers: impl FnOnce(Supervisor) -> Supervisor,
) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let runtime = Arc::new(RuntimeState::new());

    let supervisor = workers(Supervisor::new(Arc::clone(&runtime), shutdown.clone()));
    let exit_on_failure = config.workers.exit_on_failure;
    let server = HttpServer::with_api(config, Arc::clone(&runtime), api).unwrap();

    let task = tokio::spawn(startup::serve(
        listener,
        server,
        supervisor,
        exit_on_failure,
        shutdown.clone(),
    ));

    // Give the accept loop a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        addr,
        shutdown,
        runtime,
        task,
    }
}

/// Spawn a gateway with the standard API and no workers.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    spawn_gateway_with(config, ApiRoutes::standard(), |s| s).await
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
