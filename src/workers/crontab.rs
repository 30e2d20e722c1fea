//! Scheduled maintenance jobs.

use std::process::Stdio;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::process::Command;
use tokio::time::Instant;

use crate::config::CronJobConfig;
use crate::workers::message::WorkerContext;
use crate::workers::worker::{Worker, WorkerError};

/// Runs each configured command on its own interval.
///
/// Jobs run one at a time. A failing job is logged and rescheduled.
pub struct CrontabWorker {
    jobs: Vec<CronJobConfig>,
}

impl CrontabWorker {
    pub fn new(jobs: Vec<CronJobConfig>) -> Self {
        Self { jobs }
    }

    async fn schedule(self, mut ctx: WorkerContext) -> Result<(), WorkerError> {
        if self.jobs.is_empty() {
            tracing::info!("No maintenance jobs configured");
            return Ok(());
        }

        let start = Instant::now();
        let mut next_runs: Vec<Instant> = vec![start; self.jobs.len()];

        loop {
            let (index, due) = next_runs
                .iter()
                .copied()
                .enumerate()
                .min_by_key(|(_, at)| *at)
                .unwrap_or((0, start));

            tokio::select! {
                _ = tokio::time::sleep_until(due) => {}
                _ = ctx.shutdown.recv() => {
                    tracing::debug!("Crontab worker received shutdown signal");
                    return Ok(());
                }
            }

            let job = &self.jobs[index];
            // Dropping the job future kills the child process.
            tokio::select! {
                _ = run_job(job) => {}
                _ = ctx.shutdown.recv() => {
                    tracing::info!(job = %job.name, "Maintenance job cancelled by shutdown");
                    return Ok(());
                }
            }
            next_runs[index] = Instant::now() + Duration::from_secs(job.interval_secs);
        }
    }
}

async fn run_job(job: &CronJobConfig) {
    tracing::debug!(job = %job.name, command = %job.command, "Running maintenance job");

    let output = Command::new(&job.command)
        .args(&job.args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            tracing::info!(job = %job.name, "Maintenance job finished");
        }
        Ok(out) => {
            tracing::warn!(
                job = %job.name,
                exit_code = ?out.status.code(),
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "Maintenance job failed"
            );
        }
        Err(e) => {
            tracing::warn!(job = %job.name, command = %job.command, error = %e, "Maintenance job could not start");
        }
    }
}

impl Worker for CrontabWorker {
    fn name(&self) -> &str {
        "crontab"
    }

    fn run(self: Box<Self>, ctx: WorkerContext) -> BoxFuture<'static, Result<(), WorkerError>> {
        Box::pin(self.schedule(ctx))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::workers::state::{LifecycleState, RuntimeState};
    use crate::workers::Supervisor;
    use std::sync::Arc;

    fn job(name: &str, command: &str, args: &[&str]) -> CronJobConfig {
        CronJobConfig {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_runs_jobs_and_survives_failures() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let script = format!("touch {}", marker.display());

        let jobs = vec![
            job("broken", "/nonexistent/cleanup", &[]),
            job("failing", "sh", &["-c", "exit 3"]),
            job("touch", "sh", &["-c", &script]),
        ];

        let state = Arc::new(RuntimeState::new());
        let shutdown = Shutdown::new();
        let run = tokio::spawn(
            Supervisor::new(Arc::clone(&state), shutdown.clone())
                .with_worker(CrontabWorker::new(jobs))
                .run(),
        );

        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
        assert_eq!(state.worker("crontab").unwrap().state, LifecycleState::Running);

        shutdown.trigger();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert_eq!(state.worker("crontab").unwrap().exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_running_job() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("started");
        let script = format!("touch {}; sleep 30", marker.display());

        let state = Arc::new(RuntimeState::new());
        let shutdown = Shutdown::new();
        let run = tokio::spawn(
            Supervisor::new(Arc::clone(&state), shutdown.clone())
                .with_worker(CrontabWorker::new(vec![job("slow", "sh", &["-c", &script])]))
                .run(),
        );

        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(marker.exists());

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("shutdown waited for the job")
            .unwrap();
        assert_eq!(result, Ok(()));
        assert_eq!(state.worker("crontab").unwrap().state, LifecycleState::ExitedOk);
    }
}
