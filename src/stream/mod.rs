//! Streaming view of a run
//!
//! Each successful completion becomes an [`Entry`] on an
//! [`IterationStream`]. A failed run yields one `Err(RunFailure)` and then
//! ends; a finished or destroyed run just ends.

use crate::core::errors::{Outcome, RunFailure};
use crate::iterate::engine::{CompletionObserver, Discipline, Engine, Terminator};
use crate::iterate::job::Worker;
use crate::iterate::order::SortBy;
use crate::iterate::types::{Key, RunId, WorkList};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry<V> {
    pub key: Key,
    pub value: V,
}

enum Event<V, E> {
    Entry(Entry<V>),
    Failed(RunFailure<V, E>),
    End,
}

struct ChannelObserver<V, E> {
    tx: mpsc::UnboundedSender<Event<V, E>>,
}

impl<V, E> CompletionObserver<V> for ChannelObserver<V, E>
where
    V: Clone + Send,
    E: Send,
{
    fn on_entry(&self, key: &Key, value: &V) {
        // receiver gone means the stream was dropped
        let _ = self.tx.send(Event::Entry(Entry {
            key: key.clone(),
            value: value.clone(),
        }));
    }
}

fn terminal<V, E>(tx: &mpsc::UnboundedSender<Event<V, E>>, outcome: Outcome<V, E>) {
    let event = match outcome {
        Ok(_) => Event::End,
        Err(failure) => Event::Failed(failure),
    };
    let _ = tx.send(event);
}

/// Stream of the entries of one run.
///
/// Dropping the stream destroys the run.
pub struct IterationStream<V, E> {
    rx: mpsc::UnboundedReceiver<Event<V, E>>,
    terminator: Terminator,
    done: bool,
}

impl<V, E> IterationStream<V, E> {
    /// Stop the run. Entries already produced stay readable, then the stream
    /// ends without an error. Calling it again, or after the run ended, does
    /// nothing.
    pub fn destroy(&self) {
        self.terminator.terminate();
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }

    pub fn run_id(&self) -> RunId {
        self.terminator.run_id()
    }
}

impl<V, E> Stream for IterationStream<V, E> {
    type Item = Result<Entry<V>, RunFailure<V, E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Event::Entry(entry))) => Poll::Ready(Some(Ok(entry))),
            Poll::Ready(Some(Event::Failed(failure))) => {
                this.done = true;
                Poll::Ready(Some(Err(failure)))
            }
            Poll::Ready(Some(Event::End)) | Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
        }
    }
}

impl<V, E> Drop for IterationStream<V, E> {
    fn drop(&mut self) {
        self.terminator.terminate();
    }
}

impl Engine {
    /// Start a run and consume its results as a stream
    pub fn stream<T, V, E>(
        &self,
        discipline: Discipline<T>,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
    ) -> IterationStream<V, E>
    where
        T: Send + 'static,
        V: Clone + Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Arc::new(ChannelObserver { tx: tx.clone() });
        let terminator =
            self.start_observed(discipline, list, worker, observer, move |outcome| {
                terminal(&tx, outcome)
            });
        IterationStream {
            rx,
            terminator,
            done: false,
        }
    }

    /// Like [`Engine::stream`], also handing the final outcome to `callback`
    pub fn stream_with_callback<T, V, E, F>(
        &self,
        discipline: Discipline<T>,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
        callback: F,
    ) -> IterationStream<V, E>
    where
        T: Send + 'static,
        V: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Arc::new(ChannelObserver { tx: tx.clone() });
        let terminator =
            self.start_observed(discipline, list, worker, observer, move |outcome| {
                terminal(&tx, outcome.clone());
                callback(outcome);
            });
        IterationStream {
            rx,
            terminator,
            done: false,
        }
    }
}

/// Stream the results of a parallel run.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn parallel<T, V, E>(
    list: impl Into<WorkList<T>>,
    worker: Worker<T, V, E>,
) -> IterationStream<V, E>
where
    T: Send + 'static,
    V: Clone + Send + 'static,
    E: Send + 'static,
{
    Engine::current().stream(Discipline::Parallel, list, worker)
}

/// Stream the results of a serial run.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn serial<T, V, E>(
    list: impl Into<WorkList<T>>,
    worker: Worker<T, V, E>,
) -> IterationStream<V, E>
where
    T: Send + 'static,
    V: Clone + Send + 'static,
    E: Send + 'static,
{
    Engine::current().stream(Discipline::Serial, list, worker)
}

/// Stream the results of an ordered-serial run.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn serial_ordered<T, V, E>(
    list: impl Into<WorkList<T>>,
    worker: Worker<T, V, E>,
    sort_by: SortBy<T>,
) -> IterationStream<V, E>
where
    T: Send + 'static,
    V: Clone + Send + 'static,
    E: Send + 'static,
{
    Engine::current().stream(Discipline::Ordered(sort_by), list, worker)
}
