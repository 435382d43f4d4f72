//! Bookkeeping for one run

use super::job::{Abort, JobHandle};
use super::order::SortBy;
use super::types::{Key, Results, WorkList};
use std::collections::{HashMap, HashSet};

/// Cursor, job registry and results of one run.
///
/// Items are addressed by slot (their position in the original list). A slot
/// is in `jobs` exactly while its job is dispatched and not yet settled, and a
/// result is only recorded for a slot that is still registered.
#[derive(Debug)]
pub struct IterationState<T, V> {
    cursor: usize,
    order: Vec<usize>,
    keys: Vec<Key>,
    items: Vec<Option<T>>,
    jobs: HashMap<usize, JobHandle>,
    /// Jobs terminated while their worker call was still running
    orphaned: HashSet<usize>,
    results: Results<V>,
}

impl<T, V> IterationState<T, V> {
    pub fn new(list: WorkList<T>) -> Self {
        let mapping = list.is_mapping();
        let (keys, items) = list.into_parts();
        Self {
            cursor: 0,
            order: (0..keys.len()).collect(),
            keys,
            items: items.into_iter().map(Some).collect(),
            jobs: HashMap::new(),
            orphaned: HashSet::new(),
            results: Results::with_shape(mapping),
        }
    }

    /// Fix the dispatch order. Only meaningful before the first dispatch.
    pub fn arrange(&mut self, sort_by: &SortBy<T>) {
        debug_assert_eq!(self.cursor, 0, "dispatch order changed mid-run");
        self.order = sort_by.arrange(&self.keys, &self.items, self.results.is_mapping());
    }

    /// Keys in dispatch order
    pub fn dispatch_order(&self) -> Vec<Key> {
        self.order.iter().map(|&slot| self.keys[slot].clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, slot: usize) -> &Key {
        &self.keys[slot]
    }

    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    /// Every key has been dispatched
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.order.len()
    }

    /// Every key has been dispatched and settled
    pub fn is_drained(&self) -> bool {
        self.is_exhausted() && self.jobs.is_empty()
    }

    pub fn is_registered(&self, slot: usize) -> bool {
        self.jobs.contains_key(&slot)
    }

    /// Advance the cursor and register the next job.
    pub(crate) fn dispatch_next(&mut self) -> Option<(usize, Key, T)> {
        while self.cursor < self.order.len() {
            let slot = self.order[self.cursor];
            self.cursor += 1;
            if let Some(item) = self.items[slot].take() {
                self.jobs.insert(slot, JobHandle::default());
                return Some((slot, self.keys[slot].clone(), item));
            }
        }
        None
    }

    /// Store the abort a worker returned.
    ///
    /// Hands the abort back when the job was terminated while the worker was
    /// still running, so the caller can fire it. Jobs that already settled
    /// just drop it.
    pub(crate) fn attach(&mut self, slot: usize, abort: Option<Abort>) -> Option<Abort> {
        if let Some(job) = self.jobs.get_mut(&slot) {
            job.abort = abort;
            job.attached = true;
            return None;
        }
        if self.orphaned.remove(&slot) {
            return abort;
        }
        None
    }

    /// Record a successful completion. False if the slot was not registered.
    pub(crate) fn settle_ok(&mut self, slot: usize, value: V) -> bool {
        if self.jobs.remove(&slot).is_none() {
            return false;
        }
        self.results.insert(&self.keys[slot], value);
        true
    }

    /// Unregister a failed job. False if the slot was not registered.
    pub(crate) fn settle_err(&mut self, slot: usize) -> bool {
        self.jobs.remove(&slot).is_some()
    }

    /// Clear the registry, returning the aborts of every job still in flight
    /// in dispatch-slot order.
    pub(crate) fn abort_all(&mut self) -> Vec<Abort> {
        let mut jobs: Vec<(usize, JobHandle)> = self.jobs.drain().collect();
        jobs.sort_by_key(|(slot, _)| *slot);

        let mut aborts = Vec::with_capacity(jobs.len());
        for (slot, job) in jobs {
            if !job.attached {
                self.orphaned.insert(slot);
            }
            aborts.extend(job.abort);
        }
        aborts
    }

    pub fn results(&self) -> &Results<V> {
        &self.results
    }

    pub(crate) fn take_results(&mut self) -> Results<V> {
        let shape = Results::with_shape(self.results.is_mapping());
        std::mem::replace(&mut self.results, shape)
    }
}
