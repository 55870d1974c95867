use crate::{VariableId, VariableSet};
use sorted_iter::SortedIterator;
use std::collections::HashMap;
use std::iter;

/// A sparse contingency table of observed frequencies over binary variables.
///
/// A variable is "on" in an observation if that variable appears in the variable-set key for that
/// observation, and "off" otherwise. As the number of variables increase, odds are that the total
/// number of observations is significantly less than the size of the possible state space, so not
/// all possible combinations of the variables need to be present in the table. Missing cells are
/// treated as zero.
///
/// # Panics
///
/// Various methods may panic if any cell in the table is negative or zero.
#[derive(Clone, PartialEq)]
pub struct Table<V: VariableId> {
    /// Each cell of the table is represented with a key identifying the set of variables which
    /// were on for that group of observations, and a value which is the number of observations
    /// with that particular configuration of variables.
    pub raw_data: HashMap<VariableSet<V>, f64>,
}

/// Summary statistics for a single [`Table`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct TableSummary {
    /// The [Shannon entropy][] of the table, measured in bits.
    ///
    /// [Shannon entropy]: https://en.wikipedia.org/wiki/Entropy_(information_theory)
    pub uncertainty: f64,

    /// The total count across all cells in the table.
    pub sample_size: f64,
}

impl iter::FromIterator<f64> for TableSummary {
    /// Creates a summary for a table whose non-zero cells are provided by the given iterator.
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut summary = TableSummary {
            uncertainty: 0.0,
            sample_size: 0.0,
        };
        for count in iter {
            summary.uncertainty -= count * count.log2();
            summary.sample_size += count;
        }
        if summary.sample_size > 0.0 {
            summary.uncertainty /= summary.sample_size;
            summary.uncertainty += summary.sample_size.log2();
        }
        summary
    }
}

impl<V: VariableId> std::fmt::Debug for Table<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.raw_data.iter()).finish()
    }
}

impl<V: VariableId> Default for Table<V> {
    fn default() -> Self {
        Table::new()
    }
}

impl<V: VariableId> Table<V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Table {
            raw_data: HashMap::new(),
        }
    }

    /// Creates an empty table with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Table {
            raw_data: HashMap::with_capacity(capacity),
        }
    }

    /// Add the given frequency to the specified cell.
    ///
    /// If the cell had not previously been set, it's treated like it was 0.
    ///
    /// # Panics
    ///
    /// This method panics if the count is not finite and positive.
    pub fn add_cell(&mut self, state: VariableSet<V>, count: f64) -> &mut Self {
        assert!(count > 0.0 && count.is_finite());
        *self.raw_data.entry(state).or_insert(0.0) += count;
        self
    }

    /// Returns a new table that is the projection of this table on a smaller set of variables.
    ///
    /// ```
    /// use stable_adjacency::{Table, VariableSet};
    ///
    /// let a = VariableSet::new(&[1]);
    /// let nil = VariableSet::new(&[]);
    ///
    /// let mut table = Table::new();
    /// table.add_cell(nil.clone(), 1.0);
    /// table.add_cell(a.clone(), 2.0);
    /// table.add_cell(VariableSet::new(&[2]), 3.0);
    /// table.add_cell(VariableSet::new(&[1, 2]), 2.0);
    ///
    /// assert_eq!(table.project(&a), *Table::new().add_cell(nil, 4.0).add_cell(a, 4.0));
    /// ```
    pub fn project(&self, on: &VariableSet<V>) -> Table<V> {
        // Don't preallocate for all 2**on.len() states; the data is typically sparse and the
        // state space may be far larger than memory.
        let mut projection = Table::with_capacity((1 << on.len().min(8)).min(self.raw_data.len()));

        // Reuse the same heap allocation for every projection to avoid hammering the allocator.
        let mut projected_state = Vec::with_capacity(on.len());
        for (state, count) in self.raw_data.iter() {
            projected_state.extend(state.iter().intersection(on.iter()));
            projection.add_cell(VariableSet::new(&projected_state), *count);
            projected_state.clear();
        }
        projection
    }

    /// Splits the observations by the states of `given`, and within each of those strata counts
    /// the four joint states of `x` and `y`.
    ///
    /// Counts are indexed by `2 * x_on + y_on`. Strata with no observations are absent.
    pub fn strata(
        &self,
        x: V,
        y: V,
        given: &VariableSet<V>,
    ) -> HashMap<VariableSet<V>, [f64; 4]> {
        let mut strata: HashMap<VariableSet<V>, [f64; 4]> = HashMap::new();
        let mut stratum = Vec::with_capacity(given.len());
        for (state, count) in self.raw_data.iter() {
            stratum.extend(state.iter().intersection(given.iter()));
            let cell = 2 * state.contains(x) as usize + state.contains(y) as usize;
            strata.entry(VariableSet::new(&stratum)).or_default()[cell] += *count;
            stratum.clear();
        }
        strata
    }

    /// Every variable which is on in at least one observation.
    pub fn variables(&self) -> VariableSet<V> {
        self.raw_data.keys().flat_map(|state| state.iter()).collect()
    }

    /// Compute a [`TableSummary`] over the current contents of this table.
    ///
    /// ```
    /// use stable_adjacency::{Table, VariableSet};
    ///
    /// let mut builder = Table::new();
    /// assert_eq!(builder.summary().uncertainty, 0.0);
    ///
    /// builder.add_cell(VariableSet::new(&[]), 1.0);
    /// builder.add_cell(VariableSet::new(&[1]), 1.0);
    /// assert_eq!(builder.summary().uncertainty, 1.0);
    /// assert_eq!(builder.summary().sample_size, 2.0);
    /// ```
    pub fn summary(&self) -> TableSummary {
        self.raw_data.values().copied().collect()
    }

    /// Shrinks the capacity of the table as much as possible.
    ///
    /// If you're going to access the contents of this table a lot, it's a good idea to call this
    /// method after you finish constructing it but before you start using it.
    pub fn shrink_to_fit(&mut self) {
        self.raw_data.shrink_to_fit();
    }
}
