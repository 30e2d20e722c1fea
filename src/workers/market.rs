//! Container status collection.

use std::process::Stdio;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::process::Command;

use crate::config::WorkersConfig;
use crate::workers::message::{WorkerContext, WorkerMessage};
use crate::workers::state::MergeRule;
use crate::workers::worker::{Worker, WorkerError};

/// Polls `docker inspect` for each configured container and publishes
/// `{<container>: <state>}`. A missing container publishes `null`.
///
/// Failing to launch the docker binary at all is fatal (exit code 1).
pub struct MarketWorker {
    containers: Vec<String>,
    interval: Duration,
    docker: String,
}

impl MarketWorker {
    pub fn new(config: &WorkersConfig) -> Self {
        Self {
            containers: config.containers.clone(),
            interval: Duration::from_secs(config.market_interval_secs),
            docker: "docker".to_string(),
        }
    }

    /// Use another docker CLI binary.
    pub fn with_docker_binary(mut self, path: impl Into<String>) -> Self {
        self.docker = path.into();
        self
    }

    async fn inspect(&self, container: &str) -> std::io::Result<Value> {
        let output = Command::new(&self.docker)
            .args(["inspect", "--format", "{{json .State}}", container])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            tracing::debug!(container, exit_code = ?output.status.code(), "Container not found");
            return Ok(Value::Null);
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let raw = raw.trim();
        Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
    }

    async fn collect(self, mut ctx: WorkerContext) -> Result<(), WorkerError> {
        if self.containers.is_empty() {
            tracing::info!("No containers configured, container status collection disabled");
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut message = WorkerMessage::new();
                    for container in &self.containers {
                        let status = self.inspect(container).await.map_err(|e| {
                            WorkerError::new(1, format!("cannot run {}: {}", self.docker, e))
                        })?;
                        message = message.with(container.clone(), status);
                    }
                    if !ctx.outbox.send(message).await {
                        return Ok(());
                    }
                }
                _ = ctx.shutdown.recv() => {
                    tracing::debug!("Market worker received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}

impl Worker for MarketWorker {
    fn name(&self) -> &str {
        "market"
    }

    fn merge_rule(&self) -> MergeRule {
        MergeRule::Containers
    }

    fn run(self: Box<Self>, ctx: WorkerContext) -> BoxFuture<'static, Result<(), WorkerError>> {
        Box::pin(self.collect(ctx))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::workers::state::RuntimeState;
    use crate::workers::{Supervisor, SupervisorError};
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    fn config(containers: &[&str]) -> WorkersConfig {
        let mut config = WorkersConfig::default();
        config.containers = containers.iter().map(|c| c.to_string()).collect();
        config
    }

    #[tokio::test]
    async fn test_missing_docker_binary_is_fatal() {
        let state = Arc::new(RuntimeState::new());
        let worker = MarketWorker::new(&config(&["srs-server"]))
            .with_docker_binary("/nonexistent/docker");

        let result = Supervisor::new(Arc::clone(&state), Shutdown::new())
            .with_worker(worker)
            .run()
            .await;

        assert_eq!(
            result,
            Err(SupervisorError::WorkerExited {
                name: "market".into(),
                code: 1
            })
        );
        assert!(state.market().is_empty());
    }

    #[tokio::test]
    async fn test_publishes_container_states() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("docker");
        std::fs::write(
            &fake,
            "#!/bin/sh\nif [ \"$4\" = \"srs-server\" ]; then echo '{\"Status\":\"running\"}'; exit 0; fi\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let state = Arc::new(RuntimeState::new());
        let shutdown = Shutdown::new();
        let worker = MarketWorker::new(&config(&["srs-server", "redis"]))
            .with_docker_binary(fake.display().to_string());
        let run = tokio::spawn(
            Supervisor::new(Arc::clone(&state), shutdown.clone())
                .with_worker(worker)
                .run(),
        );

        for _ in 0..100 {
            if state.market().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(
            state.market_entry("srs-server").unwrap().container,
            json!({"Status": "running"})
        );
        assert_eq!(state.market_entry("redis").unwrap().container, Value::Null);

        shutdown.trigger();
        assert_eq!(run.await.unwrap(), Ok(()));
    }
}
