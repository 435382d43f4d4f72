//! Deferral of work to the next scheduling opportunity

use crate::core::errors::{EngineError, Result};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

pub type Deferred = Box<dyn FnOnce() + Send + 'static>;

/// Runs a closure asynchronously, never before `defer` returns.
///
/// Implementations must run deferred closures in the order they were
/// handed over.
pub trait Defer: Send + Sync {
    fn defer(&self, task: Deferred);
}

/// Tokio-backed [`Defer`]: one spawned task drains a FIFO queue.
#[derive(Debug, Clone)]
pub struct TokioDefer {
    tx: mpsc::UnboundedSender<Deferred>,
}

impl TokioDefer {
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn new() -> Self {
        Self::on(&Handle::current())
    }

    pub fn try_new() -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| EngineError::no_runtime("TokioDefer"))?;
        Ok(Self::on(&handle))
    }

    /// Drain the queue on the given runtime
    pub fn on(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Deferred>();
        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                task();
            }
        });
        Self { tx }
    }
}

impl Default for TokioDefer {
    fn default() -> Self {
        Self::new()
    }
}

impl Defer for TokioDefer {
    fn defer(&self, task: Deferred) {
        if self.tx.send(task).is_err() {
            warn!("deferred task dropped: runtime is shutting down");
        }
    }
}
