// Core infrastructure modules
pub mod core;

// Callback-driven engine and its streaming projection
pub mod iterate;
pub mod stream;

pub use crate::core::config::RunConfig;
pub use crate::core::errors::{EngineError, Outcome, Result, RunFailure};
pub use crate::core::logging;

pub use iterate::{
    ascending, descending, parallel, serial, serial_ordered, Abort, Callback, CompletionObserver,
    Defer, Deferred, Discipline, Done, Engine, Key, Phase, Results, RunHandle, RunId, SortBy, Task,
    TokioDefer, Terminator, WorkList, Worker,
};
pub use stream::{Entry, IterationStream};
