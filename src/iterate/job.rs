//! Workers, their completion handles and abort capabilities

use super::types::Key;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Cancels one in-flight job. Consumed on use, so it runs at most once.
pub struct Abort(Box<dyn FnOnce() + Send + 'static>);

impl Abort {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(cancel))
    }

    pub(crate) fn invoke(self) {
        (self.0)()
    }
}

impl fmt::Debug for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Abort(..)")
    }
}

impl From<tokio::task::AbortHandle> for Abort {
    fn from(handle: tokio::task::AbortHandle) -> Self {
        Abort::new(move || handle.abort())
    }
}

impl<R: Send + 'static> From<tokio::task::JoinHandle<R>> for Abort {
    fn from(handle: tokio::task::JoinHandle<R>) -> Self {
        Abort::new(move || handle.abort())
    }
}

/// Registry entry for a dispatched job
#[derive(Debug, Default)]
pub(crate) struct JobHandle {
    pub(crate) abort: Option<Abort>,
    /// False until the worker call has returned
    pub(crate) attached: bool,
}

/// Receiving end of a job completion.
pub(crate) trait Settle<V, E>: Send + Sync {
    fn settle(self: Arc<Self>, slot: usize, key: &Key, result: Result<V, E>);
}

/// Completion handle handed to the worker for one job.
///
/// Only the first completion of a still-registered job counts. Calling it
/// again, or after the run has terminated, is silently ignored.
pub struct Done<V, E> {
    slot: usize,
    key: Key,
    sink: Arc<dyn Settle<V, E>>,
}

impl<V, E> Clone for Done<V, E> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot,
            key: self.key.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<V, E> fmt::Debug for Done<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").field("key", &self.key).finish()
    }
}

impl<V, E> Done<V, E> {
    pub(crate) fn new(slot: usize, key: Key, sink: Arc<dyn Settle<V, E>>) -> Self {
        Self { slot, key, sink }
    }

    /// Key of the job this handle completes
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn complete(&self, result: Result<V, E>) {
        self.sink.clone().settle(self.slot, &self.key, result);
    }

    pub fn ok(&self, value: V) {
        self.complete(Ok(value));
    }

    pub fn fail(&self, error: E) {
        self.complete(Err(error));
    }
}

type ValueFn<T, V, E> = dyn Fn(T, Done<V, E>) -> Option<Abort> + Send + Sync;
type KeyedFn<T, V, E> = dyn Fn(T, Key, Done<V, E>) -> Option<Abort> + Send + Sync;

/// The function a run drives every item through.
///
/// The calling convention is fixed for the whole run: `Value` workers get
/// `(item, done)`, `Keyed` workers get `(item, key, done)`. A worker may hand
/// back an [`Abort`] to make its job interruptible.
pub enum Worker<T, V, E> {
    Value(Arc<ValueFn<T, V, E>>),
    Keyed(Arc<KeyedFn<T, V, E>>),
}

impl<T, V, E> Clone for Worker<T, V, E> {
    fn clone(&self) -> Self {
        match self {
            Worker::Value(f) => Worker::Value(f.clone()),
            Worker::Keyed(f) => Worker::Keyed(f.clone()),
        }
    }
}

impl<T, V, E> fmt::Debug for Worker<T, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Worker::{}", self.convention())
    }
}

impl<T, V, E> Worker<T, V, E> {
    pub fn value<F>(f: F) -> Self
    where
        F: Fn(T, Done<V, E>) -> Option<Abort> + Send + Sync + 'static,
    {
        Worker::Value(Arc::new(f))
    }

    pub fn keyed<F>(f: F) -> Self
    where
        F: Fn(T, Key, Done<V, E>) -> Option<Abort> + Send + Sync + 'static,
    {
        Worker::Keyed(Arc::new(f))
    }

    pub fn convention(&self) -> &'static str {
        match self {
            Worker::Value(_) => "value",
            Worker::Keyed(_) => "keyed",
        }
    }

    /// Invoke the worker for one job
    pub(crate) fn run(&self, item: T, key: Key, done: Done<V, E>) -> Option<Abort> {
        match self {
            Worker::Value(f) => f(item, done),
            Worker::Keyed(f) => f(item, key, done),
        }
    }
}

impl<T, V, E> Worker<T, V, E>
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    /// Run an async closure per item on the tokio runtime.
    ///
    /// Termination aborts the spawned task.
    pub fn spawn<F, Fut>(f: F) -> Self
    where
        F: Fn(T, Key) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Worker::keyed(move |item, key, done| {
            let job = f(item, key);
            let handle = tokio::spawn(async move {
                done.complete(job.await);
            });
            Some(handle.into())
        })
    }

    pub fn from_task(task: Arc<dyn Task<T, V, E>>) -> Self {
        Worker::spawn(move |item, key| {
            let task = task.clone();
            async move { task.run(item, key).await }
        })
    }
}

/// Async unit of work, adapted with [`Worker::from_task`]
#[async_trait]
pub trait Task<T: Send + 'static, V, E>: Send + Sync + 'static {
    async fn run(&self, item: T, key: Key) -> Result<V, E>;
}
