//! Shared runtime state.
//!
//! # Responsibilities
//! - Hold the latest snapshot each worker published
//! - Track each worker's lifecycle
//!
//! # Design Decisions
//! - Injected via `Arc`, never a global
//! - Per-key atomic updates (`DashMap`), last write wins
//! - Only the supervisor mutates; readers tolerate missing keys

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use crate::workers::message::WorkerMessage;

/// How a worker's messages are folded into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Each key replaces the whole snapshot stored under it.
    Replace,
    /// Each key updates `market[key].container`, other keys untouched.
    Containers,
}

/// Lifecycle of a supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Starting,
    Running,
    ExitedOk,
    ExitedError,
}

/// Supervisor's view of one worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerDescriptor {
    pub name: String,
    pub state: LifecycleState,
    pub exit_code: Option<i32>,
    pub last_message: Option<WorkerMessage>,
}

/// Per-component market entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketEntry {
    /// Latest container status, `Null` when the container is absent.
    pub container: Value,
}

/// Process-wide state written by workers and read by API handlers.
#[derive(Debug, Default)]
pub struct RuntimeState {
    snapshots: DashMap<String, Value>,
    market: DashMap<String, MarketEntry>,
    workers: DashMap<String, WorkerDescriptor>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot for a domain key (e.g. "releases").
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.snapshots.get(key).map(|v| v.value().clone())
    }

    pub fn market_entry(&self, name: &str) -> Option<MarketEntry> {
        self.market.get(name).map(|e| e.value().clone())
    }

    /// Copy of all market entries.
    pub fn market(&self) -> Vec<(String, MarketEntry)> {
        let mut entries: Vec<_> = self
            .market
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn worker(&self, name: &str) -> Option<WorkerDescriptor> {
        self.workers.get(name).map(|d| d.value().clone())
    }

    /// Copy of all worker descriptors, sorted by name.
    pub fn workers(&self) -> Vec<WorkerDescriptor> {
        let mut all: Vec<_> = self.workers.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub(crate) fn apply(&self, worker: &str, rule: MergeRule, message: WorkerMessage) {
        for (key, payload) in &message.metadata {
            match rule {
                MergeRule::Replace => {
                    self.snapshots.insert(key.clone(), payload.clone());
                }
                MergeRule::Containers => {
                    self.market.entry(key.clone()).or_default().container = payload.clone();
                }
            }
        }

        if let Some(mut descriptor) = self.workers.get_mut(worker) {
            descriptor.last_message = Some(message);
        }
    }

    pub(crate) fn register_worker(&self, name: &str) {
        self.workers.insert(
            name.to_string(),
            WorkerDescriptor {
                name: name.to_string(),
                state: LifecycleState::Starting,
                exit_code: None,
                last_message: None,
            },
        );
    }

    pub(crate) fn set_worker_running(&self, name: &str) {
        if let Some(mut descriptor) = self.workers.get_mut(name) {
            descriptor.state = LifecycleState::Running;
        }
    }

    pub(crate) fn set_worker_exited(&self, name: &str, code: i32) {
        if let Some(mut descriptor) = self.workers.get_mut(name) {
            descriptor.exit_code = Some(code);
            descriptor.state = if code == 0 {
                LifecycleState::ExitedOk
            } else {
                LifecycleState::ExitedError
            };
        }
    }
}
