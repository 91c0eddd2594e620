//! A computation that runs either at the wait point or on a background
//! task.

use crate::error::{Result, UpgradeError};
use std::future::Future;
use tokio::task::JoinHandle;

/// A deferred computation, claimed exactly once through
/// [`wait`](Deferred::wait).
///
/// The orchestrator runs at most one background task per concern; this
/// wraps the result so the consuming code does not care whether the
/// value is computed in the background or on the waiting task itself.
pub enum Deferred<T> {
    /// Runs on the waiting task when the result is claimed.
    Lazy(Box<dyn FnOnce() -> Result<T> + Send>),
    /// Already running on a background task.
    Task(JoinHandle<Result<T>>),
}

impl<T: Send + 'static> Deferred<T> {
    /// Defer the computation to the wait point.
    pub fn lazy<F>(compute: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Deferred::Lazy(Box::new(compute))
    }

    /// Start computing the value on a background task.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Deferred::Task(tokio::spawn(future))
    }

    /// Start a CPU-bound computation on the blocking thread pool.
    pub fn spawn_blocking<F>(compute: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Deferred::Task(tokio::task::spawn_blocking(compute))
    }

    /// Whether a background task is computing the value.
    pub fn is_spawned(&self) -> bool {
        matches!(self, Deferred::Task(_))
    }

    /// Resolve the value, running or awaiting the computation as needed.
    pub async fn wait(self) -> Result<T> {
        match self {
            Deferred::Lazy(compute) => compute(),
            Deferred::Task(handle) => match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(UpgradeError::Background(join_error.to_string())),
            },
        }
    }
}
