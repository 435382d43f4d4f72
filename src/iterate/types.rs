//! Keys, work lists and result containers
//!
//! Every discipline works over the same two shapes: an ordered sequence
//! (keys are positions) or a named mapping (keys are the names, in insertion
//! order).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Position or name of an item within its work list
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Index(_) => None,
            Key::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// The items a run iterates over.
///
/// The engine takes the list by value, so whatever the caller does to its own
/// collections afterwards cannot leak into a run in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkList<T> {
    Sequence(Vec<T>),
    Mapping(IndexMap<String, T>),
}

impl<T> WorkList<T> {
    pub fn len(&self) -> usize {
        match self {
            WorkList::Sequence(items) => items.len(),
            WorkList::Mapping(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, WorkList::Mapping(_))
    }

    /// Keys in list order
    pub fn keys(&self) -> Vec<Key> {
        match self {
            WorkList::Sequence(items) => (0..items.len()).map(Key::Index).collect(),
            WorkList::Mapping(items) => items.keys().cloned().map(Key::Name).collect(),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Key>, Vec<T>) {
        match self {
            WorkList::Sequence(items) => ((0..items.len()).map(Key::Index).collect(), items),
            WorkList::Mapping(items) => items
                .into_iter()
                .map(|(name, item)| (Key::Name(name), item))
                .unzip(),
        }
    }
}

impl<T> From<Vec<T>> for WorkList<T> {
    fn from(items: Vec<T>) -> Self {
        WorkList::Sequence(items)
    }
}

impl<T, const N: usize> From<[T; N]> for WorkList<T> {
    fn from(items: [T; N]) -> Self {
        WorkList::Sequence(items.into())
    }
}

impl<T> From<IndexMap<String, T>> for WorkList<T> {
    fn from(items: IndexMap<String, T>) -> Self {
        WorkList::Mapping(items)
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for WorkList<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        WorkList::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Results of a run, shaped like its input.
///
/// A sequence is sparse: `None` marks a key whose job never completed, and the
/// vector only extends as far as the highest completed index. A mapping holds
/// entries in completion order (comparison ignores order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Results<V> {
    Sequence(Vec<Option<V>>),
    Mapping(IndexMap<String, V>),
}

impl<V> Results<V> {
    pub(crate) fn with_shape(mapping: bool) -> Self {
        if mapping {
            Results::Mapping(IndexMap::new())
        } else {
            Results::Sequence(Vec::new())
        }
    }

    /// Empty results of the same shape as `list`
    pub fn empty_like<T>(list: &WorkList<T>) -> Self {
        Self::with_shape(list.is_mapping())
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Results::Mapping(_))
    }

    /// Number of completed entries
    pub fn len(&self) -> usize {
        match self {
            Results::Sequence(values) => values.iter().filter(|v| v.is_some()).count(),
            Results::Mapping(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Key) -> Option<&V> {
        match (self, key) {
            (Results::Sequence(values), Key::Index(index)) => values.get(*index)?.as_ref(),
            (Results::Mapping(values), Key::Name(name)) => values.get(name),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn insert(&mut self, key: &Key, value: V) {
        match (self, key) {
            (Results::Sequence(values), Key::Index(index)) => {
                if values.len() <= *index {
                    values.resize_with(*index + 1, || None);
                }
                values[*index] = Some(value);
            }
            (Results::Mapping(values), Key::Name(name)) => {
                values.insert(name.clone(), value);
            }
            (results, key) => {
                tracing::error!(
                    %key,
                    mapping = results.is_mapping(),
                    "key does not match result shape, value dropped"
                );
            }
        }
    }

    pub fn into_sequence(self) -> Option<Vec<Option<V>>> {
        match self {
            Results::Sequence(values) => Some(values),
            Results::Mapping(_) => None,
        }
    }

    pub fn into_mapping(self) -> Option<IndexMap<String, V>> {
        match self {
            Results::Sequence(_) => None,
            Results::Mapping(values) => Some(values),
        }
    }

    /// Values of a gap-free sequence
    pub fn into_dense(self) -> Option<Vec<V>> {
        self.into_sequence()?.into_iter().collect()
    }
}

/// Identifier attached to every log line of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
