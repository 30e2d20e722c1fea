//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener from configuration
//! - Start the HTTP server, then the worker supervisor
//! - Decide what a worker failure means for the process

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::server::{HttpServer, ServerError};
use crate::lifecycle::Shutdown;
use crate::workers::{RuntimeState, Supervisor, SupervisorError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid listen address {0}")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("server failed: {0}")]
    Serve(#[source] io::Error),

    #[error(transparent)]
    Worker(#[from] SupervisorError),
}

/// Bind, serve and supervise until shutdown.
pub async fn run(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let addr = config.listener.socket_addr().ok_or_else(|| {
        StartupError::InvalidAddress(format!("{}:{}", config.listener.host, config.listener.port))
    })?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    let runtime = Arc::new(RuntimeState::new());
    let supervisor = Supervisor::from_config(&config.workers, Arc::clone(&runtime), shutdown.clone());
    let exit_on_failure = config.workers.exit_on_failure;
    let server = HttpServer::new(config, runtime)?;

    serve(listener, server, supervisor, exit_on_failure, shutdown).await
}

/// Serve on an already bound listener.
///
/// The supervisor is spawned once the server task is running and is never
/// awaited before traffic is accepted.
pub async fn serve(
    listener: TcpListener,
    server: HttpServer,
    supervisor: Supervisor,
    exit_on_failure: bool,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let addr = listener.local_addr().map_err(StartupError::Serve)?;
    tracing::info!(
        address = %addr,
        workers = ?supervisor.worker_names(),
        "Server listening on http://{}",
        addr
    );

    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));
    let mut workers = tokio::spawn(supervisor.run());

    tokio::select! {
        joined = &mut server_task => {
            if !shutdown.is_triggered() {
                tracing::error!("HTTP server stopped without a shutdown request");
            }
            // Stop the workers too.
            shutdown.trigger();
            return server_result(joined);
        }
        joined = &mut workers => match joined {
            Ok(Ok(())) => tracing::info!("All workers completed"),
            Ok(Err(e)) if exit_on_failure => {
                tracing::error!(error = %e, "Worker failed, shutting down");
                shutdown.trigger();
                server_result(server_task.await)?;
                return Err(e.into());
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Worker failed, continuing in degraded mode");
            }
            Err(e) => tracing::error!(error = %e, "Supervisor task aborted"),
        }
    }

    server_result(server_task.await)
}

fn server_result(joined: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), StartupError> {
    match joined {
        Ok(result) => result.map_err(StartupError::Serve),
        Err(e) => Err(StartupError::Serve(io::Error::other(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::workers::{WorkerContext, WorkerError, WorkerFn};
    use std::time::Duration;

    fn test_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.upstreams = vec![UpstreamConfig::new("/", "http://127.0.0.1:9")];
        config
    }

    fn failing_supervisor(runtime: &Arc<RuntimeState>, shutdown: &Shutdown) -> Supervisor {
        Supervisor::new(Arc::clone(runtime), shutdown.clone()).with_worker(WorkerFn::new(
            "releases",
            |_ctx: WorkerContext| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(WorkerError::new(1, "release feed unreachable"))
            },
        ))
    }

    #[tokio::test]
    async fn test_worker_failure_keeps_serving_in_degraded_mode() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let runtime = Arc::new(RuntimeState::new());
        let server = HttpServer::new(test_config(), Arc::clone(&runtime)).unwrap();

        let task = tokio::spawn(serve(
            listener,
            server,
            failing_supervisor(&runtime, &shutdown),
            false,
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let res = reqwest::get(format!("http://{}/terraform/v1/mgmt/versions", addr))
            .await
            .unwrap();
        assert_eq!(res.status(), 200);

        shutdown.trigger();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_worker_failure_stops_process_when_required() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();
        let runtime = Arc::new(RuntimeState::new());
        let server = HttpServer::new(test_config(), Arc::clone(&runtime)).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve(listener, server, failing_supervisor(&runtime, &shutdown), true, shutdown.clone()),
        )
        .await
        .unwrap();

        assert!(matches!(
            result,
            Err(StartupError::Worker(SupervisorError::WorkerExited { code: 1, .. }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_host() {
        let mut config = test_config();
        config.listener.host = "not a host".into();
        let result = run(config, Shutdown::new()).await;
        assert!(matches!(result, Err(StartupError::InvalidAddress(_))));
    }
}
