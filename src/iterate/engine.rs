//! Run driver shared by the parallel, serial and ordered-serial disciplines
//!
//! A run is started through an [`Engine`] (or the crate-level shortcuts) and
//! controlled through the [`Terminator`] it returns. All disciplines use the
//! same dispatch loop; they only differ in how many jobs may be in flight and
//! in which order keys are visited.

use super::defer::{Defer, TokioDefer};
use super::job::{Abort, Done, Settle, Worker};
use super::order::SortBy;
use super::state::IterationState;
use super::types::{Key, RunId, WorkList};
use crate::core::config::RunConfig;
use crate::core::errors::{EngineError, Outcome, Result, RunFailure};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

/// How a run dispatches its jobs
pub enum Discipline<T> {
    /// Every job dispatched up front (bounded by `RunConfig::max_in_flight`)
    Parallel,
    /// One job at a time in list order
    Serial,
    /// One job at a time in a precomputed order
    Ordered(SortBy<T>),
}

impl<T> Discipline<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Discipline::Parallel => "parallel",
            Discipline::Serial => "serial",
            Discipline::Ordered(_) => "serial_ordered",
        }
    }
}

impl<T> fmt::Debug for Discipline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Ordered(sort_by) => write!(f, "Ordered({:?})", sort_by),
            other => f.write_str(other.name()),
        }
    }
}

/// Final callback of a run
pub type Callback<V, E> = Box<dyn FnOnce(Outcome<V, E>) + Send + 'static>;

/// Listener notified of every successful completion, in the order the run
/// records them.
///
/// Called while the run's bookkeeping is locked: implementations must return
/// promptly and must not call back into the run (its `Terminator` included).
pub trait CompletionObserver<V>: Send + Sync {
    fn on_entry(&self, key: &Key, value: &V);
}

/// Lifecycle of a run. `Active` is left exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    /// Stopped by the terminator or by a worker error
    Terminated,
    /// Every job completed successfully
    Finished,
}

struct Inner<T, V, E> {
    state: IterationState<T, V>,
    phase: Phase,
    callback: Option<Callback<V, E>>,
    /// A dispatch loop is running
    pumping: bool,
}

struct RunCore<T, V, E> {
    id: RunId,
    label: Option<String>,
    discipline: &'static str,
    limit: usize,
    worker: Worker<T, V, E>,
    observer: Option<Arc<dyn CompletionObserver<V>>>,
    inner: Mutex<Inner<T, V, E>>,
}

type Fire<V, E> = (Callback<V, E>, Outcome<V, E>);

impl<T, V, E> RunCore<T, V, E>
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    /// Dispatch jobs until the discipline's in-flight bound is reached or the
    /// keys run out.
    ///
    /// Completions that arrive while a loop is already running (synchronous
    /// workers included) only update the state and leave the dispatching to
    /// that loop, so the stack does not grow with the list.
    fn pump(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            if inner.pumping {
                return;
            }
            inner.pumping = true;
        }

        loop {
            let (slot, key, item) = {
                let mut inner = self.inner.lock();
                let next = if inner.phase == Phase::Active && inner.state.in_flight() < self.limit {
                    inner.state.dispatch_next()
                } else {
                    None
                };
                match next {
                    Some(job) => job,
                    None => {
                        inner.pumping = false;
                        let fire = if inner.phase == Phase::Active && inner.state.is_drained() {
                            self.finish(&mut inner)
                        } else {
                            None
                        };
                        drop(inner);
                        if let Some((callback, outcome)) = fire {
                            callback(outcome);
                        }
                        return;
                    }
                }
            };

            debug!(run_id = %self.id, %key, discipline = self.discipline, "dispatching job");
            let done = Done::new(slot, key.clone(), self.clone() as Arc<dyn Settle<V, E>>);
            let abort = self.worker.run(item, key, done);

            let orphan = self.inner.lock().state.attach(slot, abort);
            if let Some(abort) = orphan {
                trace!(run_id = %self.id, slot, "aborting job terminated during dispatch");
                abort.invoke();
            }
        }
    }

    /// Seal a drained run. Caller holds the lock.
    fn finish(&self, inner: &mut Inner<T, V, E>) -> Option<Fire<V, E>> {
        inner.phase = Phase::Finished;
        let results = inner.state.take_results();
        info!(
            run_id = %self.id,
            label = ?self.label,
            discipline = self.discipline,
            completed = results.len(),
            "run finished"
        );
        inner.callback.take().map(|callback| (callback, Ok(results)))
    }

    fn terminate(&self) {
        let (aborts, fire) = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Active {
                trace!(run_id = %self.id, phase = ?inner.phase, "terminate ignored");
                return;
            }
            inner.phase = Phase::Terminated;
            let aborts = inner.state.abort_all();
            let results = inner.state.take_results();
            debug!(
                run_id = %self.id,
                label = ?self.label,
                aborted = aborts.len(),
                salvaged = results.len(),
                "run terminated"
            );
            (aborts, inner.callback.take().map(|callback| (callback, Ok(results))))
        };
        fire_all(aborts, fire);
    }
}

fn fire_all<V, E>(aborts: Vec<Abort>, fire: Option<Fire<V, E>>) {
    for abort in aborts {
        abort.invoke();
    }
    if let Some((callback, outcome)) = fire {
        callback(outcome);
    }
}

impl<T, V, E> Settle<V, E> for RunCore<T, V, E>
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    fn settle(self: Arc<Self>, slot: usize, key: &Key, result: std::result::Result<V, E>) {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::Active || !inner.state.is_registered(slot) {
            trace!(run_id = %self.id, %key, "completion ignored, job no longer registered");
            return;
        }

        match result {
            Ok(value) => {
                if let Some(observer) = &self.observer {
                    observer.on_entry(key, &value);
                }
                inner.state.settle_ok(slot, value);
                debug!(
                    run_id = %self.id,
                    %key,
                    in_flight = inner.state.in_flight(),
                    "job completed"
                );

                if inner.state.is_drained() {
                    let fire = self.finish(&mut inner);
                    drop(inner);
                    fire_all(Vec::new(), fire);
                } else {
                    drop(inner);
                    self.pump();
                }
            }
            Err(error) => {
                inner.state.settle_err(slot);
                inner.phase = Phase::Terminated;
                let aborts = inner.state.abort_all();
                let results = inner.state.take_results();
                warn!(
                    run_id = %self.id,
                    label = ?self.label,
                    %key,
                    aborted = aborts.len(),
                    salvaged = results.len(),
                    "job failed, terminating run"
                );
                let fire = inner
                    .callback
                    .take()
                    .map(|callback| (callback, Err(RunFailure::new(error, results))));
                drop(inner);
                fire_all(aborts, fire);
            }
        }
    }
}

/// Type-erased control surface of a run
trait Control: Send + Sync {
    fn terminate(&self);
    fn phase(&self) -> Phase;
    fn run_id(&self) -> RunId;
}

impl<T, V, E> Control for RunCore<T, V, E>
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    fn terminate(&self) {
        RunCore::terminate(self)
    }

    fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    fn run_id(&self) -> RunId {
        self.id
    }
}

/// Cancellation capability for one run.
///
/// The first call to [`terminate`](Terminator::terminate) aborts every
/// in-flight job, stops further dispatch and delivers the results collected
/// so far to the run's callback. Later calls, and calls after the run already
/// ended on its own, do nothing.
#[derive(Clone)]
pub struct Terminator {
    run: Arc<dyn Control>,
}

impl Terminator {
    pub fn terminate(&self) {
        self.run.terminate();
    }

    pub fn phase(&self) -> Phase {
        self.run.phase()
    }

    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Active
    }

    pub fn is_terminated(&self) -> bool {
        self.phase() == Phase::Terminated
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == Phase::Finished
    }

    pub fn run_id(&self) -> RunId {
        self.run.run_id()
    }
}

impl fmt::Debug for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminator")
            .field("run_id", &self.run_id())
            .field("phase", &self.phase())
            .finish()
    }
}

/// Future-based view of a run
pub struct RunHandle<V, E> {
    terminator: Terminator,
    outcome: oneshot::Receiver<Outcome<V, E>>,
}

impl<V, E> RunHandle<V, E> {
    pub fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }

    pub fn terminate(&self) {
        self.terminator.terminate();
    }

    /// Wait for the run's outcome
    pub async fn join(self) -> Result<Outcome<V, E>> {
        let run_id = self.terminator.run_id();
        self.outcome
            .await
            .map_err(|_| EngineError::abandoned(run_id.to_string()))
    }
}

/// Starts runs with a shared configuration and scheduler.
///
/// Every run started through the same engine (or its clones) defers its
/// first dispatch through one FIFO queue, so runs begin in the order they
/// were started. The free functions build a fresh engine per call and give
/// no such ordering between separate calls.
#[derive(Clone)]
pub struct Engine {
    config: RunConfig,
    defer: Arc<dyn Defer>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish()
    }
}

impl Engine {
    /// Engine deferring onto the current tokio runtime
    pub fn new(config: RunConfig) -> Result<Self> {
        let defer = TokioDefer::try_new()?;
        Self::with_defer(config, Arc::new(defer))
    }

    pub fn with_defer(config: RunConfig, defer: Arc<dyn Defer>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, defer })
    }

    /// Default engine on the current runtime with a scheduler of its own;
    /// panics outside a runtime.
    pub(crate) fn current() -> Self {
        Self {
            config: RunConfig::default(),
            defer: Arc::new(TokioDefer::new()),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Start a run. The first dispatch is deferred, so the callback never
    /// fires before this returns.
    pub fn start<T, V, E, F>(
        &self,
        discipline: Discipline<T>,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
        callback: F,
    ) -> Terminator
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        self.launch(discipline, list.into(), worker, Box::new(callback), None)
    }

    /// Start a run whose completions are also reported to `observer`
    pub fn start_observed<T, V, E, F>(
        &self,
        discipline: Discipline<T>,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
        observer: Arc<dyn CompletionObserver<V>>,
        callback: F,
    ) -> Terminator
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        self.launch(discipline, list.into(), worker, Box::new(callback), Some(observer))
    }

    pub fn parallel<T, V, E, F>(
        &self,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
        callback: F,
    ) -> Terminator
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        self.start(Discipline::Parallel, list, worker, callback)
    }

    pub fn serial<T, V, E, F>(
        &self,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
        callback: F,
    ) -> Terminator
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        self.start(Discipline::Serial, list, worker, callback)
    }

    pub fn serial_ordered<T, V, E, F>(
        &self,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
        sort_by: SortBy<T>,
        callback: F,
    ) -> Terminator
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Outcome<V, E>) + Send + 'static,
    {
        self.start(Discipline::Ordered(sort_by), list, worker, callback)
    }

    /// Start a run and get a handle to await its outcome
    pub fn spawn<T, V, E>(
        &self,
        discipline: Discipline<T>,
        list: impl Into<WorkList<T>>,
        worker: Worker<T, V, E>,
    ) -> RunHandle<V, E>
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        let (tx, outcome) = oneshot::channel();
        let terminator = self.start(discipline, list, worker, move |result| {
            let _ = tx.send(result);
        });
        RunHandle {
            terminator,
            outcome,
        }
    }

    fn launch<T, V, E>(
        &self,
        discipline: Discipline<T>,
        list: WorkList<T>,
        worker: Worker<T, V, E>,
        callback: Callback<V, E>,
        observer: Option<Arc<dyn CompletionObserver<V>>>,
    ) -> Terminator
    where
        T: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        let mut state = IterationState::new(list);
        let limit = match &discipline {
            Discipline::Parallel => self.config.parallel_limit(),
            Discipline::Serial => 1,
            Discipline::Ordered(sort_by) => {
                state.arrange(sort_by);
                1
            }
        };

        let core = Arc::new(RunCore {
            id: RunId::new(),
            label: self.config.label.clone(),
            discipline: discipline.name(),
            limit,
            worker,
            observer,
            inner: Mutex::new(Inner {
                state,
                phase: Phase::Active,
                callback: Some(callback),
                pumping: false,
            }),
        });

        {
            let inner = core.inner.lock();
            info!(
                run_id = %core.id,
                label = ?core.label,
                discipline = core.discipline,
                items = inner.state.len(),
                convention = core.worker.convention(),
                "run started"
            );
            if matches!(discipline, Discipline::Ordered(_)) {
                debug!(run_id = %core.id, order = ?inner.state.dispatch_order(), "dispatch order computed");
            }
        }

        let driver = core.clone();
        self.defer.defer(Box::new(move || driver.pump()));
        Terminator { run: core }
    }
}

/// Run `worker` over every item at once.
///
/// Runs started by separate calls have no relative start order; use one
/// [`Engine`] when that matters.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn parallel<T, V, E, F>(
    list: impl Into<WorkList<T>>,
    worker: Worker<T, V, E>,
    callback: F,
) -> Terminator
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Outcome<V, E>) + Send + 'static,
{
    Engine::current().parallel(list, worker, callback)
}

/// Run `worker` over one item at a time in list order.
///
/// Runs started by separate calls have no relative start order; use one
/// [`Engine`] when that matters.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn serial<T, V, E, F>(
    list: impl Into<WorkList<T>>,
    worker: Worker<T, V, E>,
    callback: F,
) -> Terminator
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Outcome<V, E>) + Send + 'static,
{
    Engine::current().serial(list, worker, callback)
}

/// Run `worker` over one item at a time in the order given by `sort_by`.
///
/// Runs started by separate calls have no relative start order; use one
/// [`Engine`] when that matters.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn serial_ordered<T, V, E, F>(
    list: impl Into<WorkList<T>>,
    worker: Worker<T, V, E>,
    sort_by: SortBy<T>,
    callback: F,
) -> Terminator
where
    T: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Outcome<V, E>) + Send + 'static,
{
    Engine::current().serial_ordered(list, worker, sort_by, callback)
}
