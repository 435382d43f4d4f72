//! Dispatch order for ordered-serial runs

use super::types::Key;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type KeyComparator = Arc<dyn Fn(&Key, &Key) -> Ordering + Send + Sync>;
pub type ItemComparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// How an ordered-serial run arranges its keys before dispatch.
///
/// Sorting is stable: keys that compare equal keep their list order.
pub enum SortBy<T> {
    /// List order, no sorting
    Original,
    /// Natural order, see [`SortBy::ascending`]
    Natural {
        descending: bool,
        items: ItemComparator<T>,
    },
    Keys(KeyComparator),
    Items(ItemComparator<T>),
}

impl<T: Ord + 'static> SortBy<T> {
    /// Smallest first: sequences compare their items, mappings their names.
    ///
    /// Mappings over items without an order can use
    /// `SortBy::keys(ascending)` instead.
    pub fn ascending() -> Self {
        SortBy::Natural {
            descending: false,
            items: Arc::new(|a: &T, b: &T| a.cmp(b)),
        }
    }

    /// Largest first: sequences compare their items, mappings their names.
    pub fn descending() -> Self {
        SortBy::Natural {
            descending: true,
            items: Arc::new(|a: &T, b: &T| a.cmp(b)),
        }
    }
}

impl<T> SortBy<T> {
    pub fn keys<F>(cmp: F) -> Self
    where
        F: Fn(&Key, &Key) -> Ordering + Send + Sync + 'static,
    {
        SortBy::Keys(Arc::new(cmp))
    }

    pub fn items<F>(cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        SortBy::Items(Arc::new(cmp))
    }

    /// Slot indices in dispatch order.
    ///
    /// `items` must still hold every item (nothing dispatched yet).
    pub(crate) fn arrange(&self, keys: &[Key], items: &[Option<T>], mapping: bool) -> Vec<usize> {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        let by_item = |cmp: &ItemComparator<T>, a: usize, b: usize| match (&items[a], &items[b]) {
            (Some(x), Some(y)) => cmp(x, y),
            _ => Ordering::Equal,
        };
        match self {
            SortBy::Original => {}
            SortBy::Natural { descending: reverse, items: cmp } => match (mapping, *reverse) {
                (true, false) => order.sort_by(|&a, &b| ascending(&keys[a], &keys[b])),
                (true, true) => order.sort_by(|&a, &b| descending(&keys[a], &keys[b])),
                (false, false) => order.sort_by(|&a, &b| by_item(cmp, a, b)),
                (false, true) => order.sort_by(|&a, &b| by_item(cmp, b, a)),
            },
            SortBy::Keys(cmp) => order.sort_by(|&a, &b| cmp(&keys[a], &keys[b])),
            SortBy::Items(cmp) => order.sort_by(|&a, &b| by_item(cmp, a, b)),
        }
        order
    }
}

impl<T> Default for SortBy<T> {
    fn default() -> Self {
        SortBy::Original
    }
}

impl<T> Clone for SortBy<T> {
    fn clone(&self) -> Self {
        match self {
            SortBy::Original => SortBy::Original,
            SortBy::Natural { descending, items } => SortBy::Natural {
                descending: *descending,
                items: items.clone(),
            },
            SortBy::Keys(cmp) => SortBy::Keys(cmp.clone()),
            SortBy::Items(cmp) => SortBy::Items(cmp.clone()),
        }
    }
}

impl<T> fmt::Debug for SortBy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortBy::Original => "Original",
            SortBy::Natural { descending: false, .. } => "Ascending",
            SortBy::Natural { descending: true, .. } => "Descending",
            SortBy::Keys(_) => "Keys(..)",
            SortBy::Items(_) => "Items(..)",
        };
        f.write_str(name)
    }
}

/// Natural ascending key order
pub fn ascending(a: &Key, b: &Key) -> Ordering {
    a.cmp(b)
}

/// Natural descending key order
pub fn descending(a: &Key, b: &Key) -> Ordering {
    b.cmp(a)
}
