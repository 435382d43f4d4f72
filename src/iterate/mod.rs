//! Callback-driven iteration engine
//!
//! Drives a [`WorkList`] through a [`Worker`] under one of three disciplines
//! and reports either every result or the first error.

pub mod defer;
pub mod engine;
pub mod job;
pub mod order;
pub mod state;
pub mod types;

pub use defer::{Defer, Deferred, TokioDefer};
pub use engine::{
    parallel, serial, serial_ordered, Callback, CompletionObserver, Discipline, Engine, Phase,
    RunHandle, Terminator,
};
pub use job::{Abort, Done, Task, Worker};
pub use order::{ascending, descending, ItemComparator, KeyComparator, SortBy};
pub use state::IterationState;
pub use types::{Key, Results, RunId, WorkList};
