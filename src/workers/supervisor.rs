//! Worker supervision.
//!
//! # Responsibilities
//! - Start every worker concurrently on its own task
//! - Relay worker messages into the runtime state
//! - Observe exits and surface non-zero codes
//!
//! # Design Decisions
//! - No restart policy: an exited worker stays exited
//! - The first non-zero exit fails `run`; the other workers keep running
//! - A panicking worker counts as exit code 1

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::{Id, JoinError, JoinSet};

use crate::config::WorkersConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::workers::crontab::CrontabWorker;
use crate::workers::market::MarketWorker;
use crate::workers::message::{Outbox, WorkerContext};
use crate::workers::releases::ReleasesWorker;
use crate::workers::state::RuntimeState;
use crate::workers::worker::{exit_code, Worker};

/// Messages buffered per worker before the worker waits on the supervisor.
const MAILBOX_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("worker #{name}: stopped with exit code {code}")]
    WorkerExited { name: String, code: i32 },
}

/// Launches workers and forwards their state.
pub struct Supervisor {
    state: Arc<RuntimeState>,
    shutdown: Shutdown,
    units: Vec<Box<dyn Worker>>,
}

impl Supervisor {
    pub fn new(state: Arc<RuntimeState>, shutdown: Shutdown) -> Self {
        Self {
            state,
            shutdown,
            units: Vec::new(),
        }
    }

    pub fn with_worker(mut self, worker: impl Worker) -> Self {
        self.units.push(Box::new(worker));
        self
    }

    /// The gateway's standard workers.
    pub fn from_config(config: &WorkersConfig, state: Arc<RuntimeState>, shutdown: Shutdown) -> Self {
        let supervisor = Self::new(state, shutdown)
            .with_worker(ReleasesWorker::new(config))
            .with_worker(CrontabWorker::new(config.crontab.clone()));

        if !config.use_docker {
            tracing::warn!("Running without docker, container status worker not started; start components manually");
            return supervisor;
        }

        supervisor.with_worker(MarketWorker::new(config))
    }

    /// Names of the registered workers, in start order.
    pub fn worker_names(&self) -> Vec<String> {
        self.units.iter().map(|w| w.name().to_string()).collect()
    }

    /// Run all workers. Resolves when all exited cleanly, or with the first failure.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let mut set = JoinSet::new();
        let mut names = HashMap::new();

        for worker in self.units {
            let name = worker.name().to_string();
            self.state.register_worker(&name);
            let handle = set.spawn(supervise(
                worker,
                Arc::clone(&self.state),
                self.shutdown.subscribe(),
            ));
            names.insert(handle.id(), name);
        }

        tracing::info!(workers = set.len(), "Worker supervisor started");

        while let Some(joined) = set.join_next().await {
            let (name, code) = match joined {
                Ok(exit) => exit,
                Err(e) => {
                    let exit = lost_supervision(&e, &names);
                    self.state.set_worker_exited(&exit.0, exit.1);
                    metrics::record_worker_exit(&exit.0, exit.1);
                    exit
                }
            };

            if code != 0 {
                // Remaining workers keep running and reporting.
                set.detach_all();
                return Err(SupervisorError::WorkerExited { name, code });
            }
        }

        Ok(())
    }
}

/// Exit reported for a supervision task that died itself.
fn lost_supervision(err: &JoinError, names: &HashMap<Id, String>) -> (String, i32) {
    let name = names
        .get(&err.id())
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    tracing::error!(worker = %name, error = %err, "Supervision task failed");
    (name, 1)
}

async fn supervise(
    worker: Box<dyn Worker>,
    state: Arc<RuntimeState>,
    shutdown: broadcast::Receiver<()>,
) -> (String, i32) {
    let name = worker.name().to_string();
    let rule = worker.merge_rule();
    let (tx, mut rx) = mpsc::channel(MAILBOX_CAPACITY);
    let ctx = WorkerContext {
        outbox: Outbox::new(tx),
        shutdown,
    };

    let mut handle = tokio::spawn(worker.run(ctx));
    state.set_worker_running(&name);
    tracing::debug!(worker = %name, "Worker started");

    let code = loop {
        tokio::select! {
            Some(message) = rx.recv() => state.apply(&name, rule, message),
            joined = &mut handle => {
                break match joined {
                    Ok(result) => {
                        if let Err(e) = &result {
                            tracing::error!(worker = %name, error = %e, "Worker failed");
                        }
                        exit_code(&result)
                    }
                    Err(e) => {
                        tracing::error!(worker = %name, error = %e, "Worker aborted");
                        1
                    }
                };
            }
        }
    };

    // Messages sent right before exiting are still applied.
    while let Ok(message) = rx.try_recv() {
        state.apply(&name, rule, message);
    }

    state.set_worker_exited(&name, code);
    metrics::record_worker_exit(&name, code);

    if code == 0 {
        tracing::info!(worker = %name, exit_code = code, "Worker exited");
    } else {
        tracing::error!(worker = %name, exit_code = code, "Worker exited with non-zero code");
    }

    (name, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::message::WorkerMessage;
    use crate::workers::state::{LifecycleState, MergeRule};
    use crate::workers::worker::{WorkerError, WorkerFn};
    use serde_json::json;
    use std::time::Duration;

    fn state_is_bad() -> bool {
        true
    }

    fn supervisor(state: &Arc<RuntimeState>) -> Supervisor {
        Supervisor::new(Arc::clone(state), Shutdown::new())
    }

    #[tokio::test]
    async fn test_messages_applied_and_clean_exit() {
        let state = Arc::new(RuntimeState::new());
        let result = supervisor(&state)
            .with_worker(WorkerFn::new("releases", |ctx: WorkerContext| async move {
                ctx.outbox.publish("releases", json!({"stable": "v5"})).await;
                Ok(())
            }))
            .run()
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(state.snapshot("releases"), Some(json!({"stable": "v5"})));
        let d = state.worker("releases").unwrap();
        assert_eq!(d.state, LifecycleState::ExitedOk);
        assert_eq!(d.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails_run() {
        let state = Arc::new(RuntimeState::new());
        let result = supervisor(&state)
            .with_worker(WorkerFn::new("crontab", |_ctx: WorkerContext| async move {
                Err(WorkerError::new(1, "job table corrupt"))
            }))
            .run()
            .await;

        assert_eq!(
            result,
            Err(SupervisorError::WorkerExited {
                name: "crontab".into(),
                code: 1
            })
        );
        assert_eq!(state.worker("crontab").unwrap().state, LifecycleState::ExitedError);
    }

    #[tokio::test]
    async fn test_panic_is_exit_code_one() {
        let state = Arc::new(RuntimeState::new());
        let result = supervisor(&state)
            .with_worker(WorkerFn::new("market", |_ctx: WorkerContext| async move {
                if state_is_bad() {
                    panic!("collector crashed");
                }
                Ok(())
            }))
            .run()
            .await;

        assert!(matches!(result, Err(SupervisorError::WorkerExited { code: 1, .. })));
    }

    #[tokio::test]
    async fn test_failed_supervision_task_is_exit_code_one() {
        let mut set = JoinSet::new();
        let handle = set.spawn(async {
            if state_is_bad() {
                panic!("supervision crashed");
            }
            (String::new(), 0)
        });
        let names = HashMap::from([(handle.id(), "market".to_string())]);

        let err = set.join_next().await.unwrap().unwrap_err();
        assert_eq!(lost_supervision(&err, &names), ("market".to_string(), 1));

        let empty = HashMap::new();
        assert_eq!(lost_supervision(&err, &empty), ("unknown".to_string(), 1));
    }

    #[tokio::test]
    async fn test_workers_start_concurrently() {
        let state = Arc::new(RuntimeState::new());
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel::<()>();

        // The first worker only finishes once the second one has run.
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            supervisor(&state)
                .with_worker(WorkerFn::new("waiter", |_ctx: WorkerContext| async move {
                    seen_rx.await.map_err(|_| WorkerError::new(1, "sender dropped"))
                }))
                .with_worker(WorkerFn::new("signaller", |_ctx: WorkerContext| async move {
                    let _ = seen_tx.send(());
                    Ok(())
                }))
                .run(),
        )
        .await
        .expect("workers blocked each other");

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_failure_leaves_other_workers_running() {
        let state = Arc::new(RuntimeState::new());
        let shutdown = Shutdown::new();

        let result = Supervisor::new(Arc::clone(&state), shutdown.clone())
            .with_worker(
                WorkerFn::new("market", |mut ctx: WorkerContext| async move {
                    ctx.outbox.publish("srs", json!({"Status": "running"})).await;
                    let _ = ctx.shutdown.recv().await;
                    Ok(())
                })
                .with_merge_rule(MergeRule::Containers),
            )
            .with_worker(WorkerFn::new("releases", |_ctx: WorkerContext| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(WorkerError::new(1, "fetch loop died"))
            }))
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(state.worker("market").unwrap().state, LifecycleState::Running);
        assert_eq!(
            state.market_entry("srs").unwrap().container,
            json!({"Status": "running"})
        );

        shutdown.trigger();
        for _ in 0..50 {
            if state.worker("market").unwrap().state == LifecycleState::ExitedOk {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state.worker("market").unwrap().state, LifecycleState::ExitedOk);
    }

    #[tokio::test]
    async fn test_docker_disabled_skips_market() {
        let state = Arc::new(RuntimeState::new());
        let mut config = WorkersConfig::default();
        config.use_docker = false;

        let s = Supervisor::from_config(&config, Arc::clone(&state), Shutdown::new());
        assert_eq!(s.worker_names(), vec!["releases".to_string(), "crontab".to_string()]);

        s.run().await.unwrap();
        assert!(state.worker("market").is_none());
        assert!(state.market().is_empty());
    }

    #[tokio::test]
    async fn test_docker_enabled_registers_market() {
        let config = WorkersConfig::default();
        let s = Supervisor::from_config(&config, Arc::new(RuntimeState::new()), Shutdown::new());
        assert_eq!(
            s.worker_names(),
            vec!["releases".to_string(), "crontab".to_string(), "market".to_string()]
        );
    }

    #[tokio::test]
    async fn test_market_messages_merge() {
        let state = Arc::new(RuntimeState::new());
        supervisor(&state)
            .with_worker(
                WorkerFn::new("market", |ctx: WorkerContext| async move {
                    ctx.outbox.publish("srs", json!({"Status": "running"})).await;
                    ctx.outbox
                        .send(WorkerMessage::single("redis", json!({"Status": "exited"})))
                        .await;
                    Ok(())
                })
                .with_merge_rule(MergeRule::Containers),
            )
            .run()
            .await
            .unwrap();

        assert_eq!(state.market().len(), 2);
        assert_eq!(state.market_entry("srs").unwrap().container["Status"], "running");
        assert_eq!(state.market_entry("redis").unwrap().container["Status"], "exited");
    }
}
