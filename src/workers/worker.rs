//! The unit of background execution.

use std::future::Future;

use futures_util::future::BoxFuture;

use crate::workers::message::WorkerContext;
use crate::workers::state::MergeRule;

/// A worker's non-zero exit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} (exit code {code})")]
pub struct WorkerError {
    pub code: i32,
    pub reason: String,
}

impl WorkerError {
    /// `code` 0 is bumped to 1: an error never reports success.
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code: if code == 0 { 1 } else { code },
            reason: reason.into(),
        }
    }
}

/// Exit code for a finished worker.
pub fn exit_code(result: &Result<(), WorkerError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code,
    }
}

/// An isolated background unit. It owns its state and talks to the
/// supervisor only through `WorkerContext`.
pub trait Worker: Send + 'static {
    fn name(&self) -> &str;

    fn merge_rule(&self) -> MergeRule {
        MergeRule::Replace
    }

    fn run(self: Box<Self>, ctx: WorkerContext) -> BoxFuture<'static, Result<(), WorkerError>>;
}

/// A worker built from a closure.
pub struct WorkerFn<F> {
    name: String,
    rule: MergeRule,
    f: F,
}

impl<F, Fut> WorkerFn<F>
where
    F: FnOnce(WorkerContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            rule: MergeRule::Replace,
            f,
        }
    }

    pub fn with_merge_rule(mut self, rule: MergeRule) -> Self {
        self.rule = rule;
        self
    }
}

impl<F, Fut> Worker for WorkerFn<F>
where
    F: FnOnce(WorkerContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn merge_rule(&self) -> MergeRule {
        self.rule
    }

    fn run(self: Box<Self>, ctx: WorkerContext) -> BoxFuture<'static, Result<(), WorkerError>> {
        Box::pin((self.f)(ctx))
    }
}
