//! Release version polling.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::config::WorkersConfig;
use crate::workers::message::WorkerContext;
use crate::workers::worker::{Worker, WorkerError};

/// Domain key the release metadata is published under.
pub const RELEASES_KEY: &str = "releases";

/// Periodically fetches release metadata and publishes it whole.
///
/// A failed fetch keeps the previous snapshot; only a broken HTTP client is fatal.
pub struct ReleasesWorker {
    url: Option<String>,
    interval: Duration,
}

impl ReleasesWorker {
    pub fn new(config: &WorkersConfig) -> Self {
        Self {
            url: config.releases_url.clone(),
            interval: Duration::from_secs(config.releases_interval_secs),
        }
    }

    async fn fetch(client: &reqwest::Client, url: &str) -> Result<Value, reqwest::Error> {
        client.get(url).send().await?.error_for_status()?.json().await
    }

    async fn poll(self, mut ctx: WorkerContext) -> Result<(), WorkerError> {
        let Some(url) = self.url else {
            tracing::info!("No releases url configured, release check disabled");
            return Ok(());
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("mgmt-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkerError::new(1, format!("http client: {}", e)))?;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match Self::fetch(&client, &url).await {
                        Ok(releases) => {
                            tracing::debug!(url = %url, "Release metadata updated");
                            if !ctx.outbox.publish(RELEASES_KEY, releases).await {
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "Release check failed, keeping last snapshot");
                        }
                    }
                }
                _ = ctx.shutdown.recv() => {
                    tracing::debug!("Releases worker received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}

impl Worker for ReleasesWorker {
    fn name(&self) -> &str {
        "releases"
    }

    fn run(self: Box<Self>, ctx: WorkerContext) -> BoxFuture<'static, Result<(), WorkerError>> {
        Box::pin(self.poll(ctx))
    }
}
