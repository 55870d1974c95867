use crate::{VariableId, VariableSet};
use parking_lot::RwLock;
use std::collections::HashMap;

/// The conditioning set that separated each pair of variables whose edge a search removed.
///
/// Pairs are unordered: `lookup(x, y)` and `lookup(y, x)` always agree.
pub struct SepsetMap<V: VariableId> {
    sepsets: RwLock<HashMap<(V, V), VariableSet<V>>>,
    return_empty_if_not_set: bool,
}

fn key<V: Ord>(x: V, y: V) -> (V, V) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

impl<V: VariableId> SepsetMap<V> {
    /// Creates an empty map. If `return_empty_if_not_set` is `true`, looking up a pair that was
    /// never recorded yields an empty set instead of `None`, which is what orientation rules that
    /// need a total function expect.
    pub fn new(return_empty_if_not_set: bool) -> Self {
        SepsetMap {
            sepsets: RwLock::new(HashMap::new()),
            return_empty_if_not_set,
        }
    }

    /// Records `sepset` for the pair `{x, y}` unless one is already recorded. Returns `true` if it
    /// was stored.
    pub fn record(&self, x: V, y: V, sepset: VariableSet<V>) -> bool {
        let mut sepsets = self.sepsets.write();
        match sepsets.entry(key(x, y)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(sepset);
                true
            }
        }
    }

    /// The sepset recorded for `{x, y}`.
    ///
    /// ```
    /// use stable_adjacency::{SepsetMap, VariableSet};
    ///
    /// let strict = SepsetMap::new(false);
    /// strict.record(2, 1, VariableSet::new(&[3]));
    /// assert_eq!(strict.lookup(1, 2), Some(VariableSet::new(&[3])));
    /// assert_eq!(strict.lookup(1, 3), None);
    ///
    /// let total = SepsetMap::<u8>::new(true);
    /// assert_eq!(total.lookup(1, 3), Some(VariableSet::empty()));
    /// ```
    pub fn lookup(&self, x: V, y: V) -> Option<VariableSet<V>> {
        match self.sepsets.read().get(&key(x, y)) {
            Some(sepset) => Some(sepset.clone()),
            None if self.return_empty_if_not_set => Some(VariableSet::empty()),
            None => None,
        }
    }

    /// Returns `true` if a sepset was recorded for `{x, y}`.
    pub fn contains(&self, x: V, y: V) -> bool {
        self.sepsets.read().contains_key(&key(x, y))
    }

    /// The number of pairs with a recorded sepset.
    pub fn len(&self) -> usize {
        self.sepsets.read().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.sepsets.read().is_empty()
    }

    /// Every recorded pair, smaller variable first, with its sepset, sorted by pair.
    pub fn pairs(&self) -> Vec<((V, V), VariableSet<V>)> {
        let mut pairs: Vec<_> = self
            .sepsets
            .read()
            .iter()
            .map(|(&pair, sepset)| (pair, sepset.clone()))
            .collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

impl<V: VariableId> std::fmt::Debug for SepsetMap<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.pairs()).finish()
    }
}
