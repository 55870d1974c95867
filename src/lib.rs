#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate provides a parallel implementation of the adjacency (skeleton) search that
//! constraint-based causal discovery algorithms such as PC and FCI start from, as described by:
//!
//! - Spirtes, Glymour, and Scheines, *Causation, Prediction, and Search*, 2nd ed., 2000
//! - Colombo and Maathuis, [Order-Independent Constraint-Based Causal Structure Learning][stable],
//!   2014
//!
//! [stable]: https://jmlr.org/papers/v15/colombo14a.html
//!
//! The search starts from a complete graph over the variables and removes the edge `x - y`
//! whenever an [`IndependenceTest`] reports `x` independent of `y` given some set of `x`'s or
//! `y`'s other neighbors. Conditioning sets grow one variable at a time ("depth"). Every depth
//! reads from a frozen copy of the adjacencies left by the previous depth, so the result does not
//! depend on which thread handles which pair, or in which order.
//!
//! ```
//! use stable_adjacency::{
//!     AdjacencySearch, DSeparation, Graph, NoKnowledge, SearchConfig, VariableSet,
//! };
//!
//! // 0 -> 1 -> 2: the only separation is 0 _||_ 2 | {1}.
//! let mut dag = Graph::new(&[0u8, 1, 2]);
//! dag.add_directed_edge(0, 1).unwrap();
//! dag.add_directed_edge(1, 2).unwrap();
//! let oracle = DSeparation::new(dag).unwrap();
//!
//! let search = AdjacencySearch::new(&[0, 1, 2], &oracle, &NoKnowledge, SearchConfig::default())
//!     .unwrap();
//! let outcome = search.search().unwrap();
//!
//! assert!(outcome.graph.is_adjacent(0, 1));
//! assert!(outcome.graph.is_adjacent(1, 2));
//! assert!(!outcome.graph.is_adjacent(0, 2));
//! assert_eq!(outcome.sepsets.lookup(0, 2), Some(VariableSet::new(&[1])));
//! ```

pub use sorted_iter;

use lasso::{LargeSpur, MicroSpur, MiniSpur, Spur};
use smallvec::SmallVec;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::sorted_iterator::SortedByItem;
use sorted_iter::SortedIterator;
use std::iter;

mod adjacency;
mod choose;
mod error;
mod graph;
mod knowledge;
mod oracle;
mod search;
mod sepset;
mod table;

pub use adjacency::{AdjacencyMap, AdjacencySnapshot};
pub use choose::{combination_count, Combinations, Product, Selections};
pub use error::{Error, Result, TestError, TestResult};
pub use graph::{Edge, Graph};
pub use knowledge::{possible_parent, EdgeKnowledge, Knowledge, NoKnowledge};
pub use oracle::{DSeparation, FnTest, GSquareTest, IndependenceTest, Judgement};
pub use search::{
    AdjacencySearch, Depth0Policy, SearchConfig, SearchOutcome, SearchState, UNBOUNDED_DEPTH,
};
pub use sepset::SepsetMap;
pub use table::{Table, TableSummary};

/// Types which can identify a variable during a search.
///
/// Identifiers are small `Copy` keys; names, if any, live wherever the caller keeps them (the
/// command-line driver uses a [`lasso`] interner). The search hands identifiers to worker threads,
/// hence the `Send + Sync` bound.
pub trait VariableId:
    Sized + Copy + std::hash::Hash + Ord + std::fmt::Debug + Send + Sync
{
    /// SmallVec contains two `usize` fields which overlap with the inline vector, so variable sets
    /// will have minimum size if this array occupies the same number of bytes.
    ///
    /// It can be declared like this for any implementation, or you can have the [`variable_id!`]
    /// macro do it for you.
    ///
    /// ```ignore
    /// use std::mem::size_of;
    /// type SmallArray = [Self; 2 * size_of::<usize>() / size_of::<Self>()];
    /// ```
    type SmallArray: smallvec::Array<Item = Self>
        + Clone
        + std::fmt::Debug
        + std::hash::Hash
        + Ord
        + Send
        + Sync;
}

/// Generates implementations of the [`VariableId`] trait which set the associated `SmallArray`
/// type to the biggest array that will fit within a [`SmallVec`][smallvec::SmallVec]'s minimum
/// size.
///
/// It also generates a test with the given `$testname` that checks that the generated definition
/// is as small as the smallest `SmallVec`.
///
/// For example, this library provides implementations for the basic unsigned integer types using
/// this declaration:
///
/// ```ignore
/// variable_id![unsigned_id_size, u8, u16, u32, u64, usize];
/// ```
#[macro_export]
macro_rules! variable_id {
    ($testname:ident, $($t:ty),*) => {
        $(
            impl $crate::VariableId for $t {
                type SmallArray = [
                    Self;
                    2 * ::std::mem::size_of::<usize>() / ::std::mem::size_of::<Self>()
                ];
            }
        )*

        #[cfg(test)]
        #[test]
        fn $testname() {
            use $crate::VariableSet;
            use smallvec::SmallVec;
            use std::mem::size_of;
            $(
                assert_eq!(
                    size_of::<VariableSet<$t>>(),
                    size_of::<SmallVec<[(); 0]>>()
                );
            )*
        }
    };
}

variable_id![lasso_id_size, LargeSpur, Spur, MiniSpur, MicroSpur];
variable_id![unsigned_id_size, u8, u16, u32, u64, usize];
variable_id![signed_id_size, i8, i16, i32, i64, isize];

/// A set of variables, kept sorted.
///
/// Conditioning sets, sepsets, and neighbor snapshots are all variable sets. This implementation
/// avoids heap allocations for sets containing a number of variables smaller than the length of
/// [`VariableId::SmallArray`], which covers the conditioning sets of almost every search.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VariableSet<V: VariableId>(SmallVec<V::SmallArray>);

impl<V: VariableId> VariableSet<V> {
    /// Creates a variable set containing the specified variables.
    ///
    /// It's okay if the provided slice contains duplicates.
    pub fn new(ids: &[V]) -> Self {
        let mut v = SmallVec::from_slice(ids);
        v.sort_unstable();
        v.dedup();
        VariableSet(v)
    }

    /// Creates a set with no variables in it.
    pub fn empty() -> Self {
        VariableSet(SmallVec::new())
    }

    /// The number of variables in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no variables in it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the variables in sorted order.
    pub fn as_slice(&self) -> &[V] {
        &self.0
    }

    /// Returns `true` if `variable` is in this set.
    pub fn contains(&self, variable: V) -> bool {
        self.0.binary_search(&variable).is_ok()
    }

    /// Returns an iterator over the variables which appear in this set.
    ///
    /// ```
    /// use stable_adjacency::VariableSet;
    ///
    /// let abc = VariableSet::new(&[2, 3, 1]);
    /// let mut it = abc.iter();
    /// assert_eq!(it.next(), Some(1));
    /// assert_eq!(it.next(), Some(2));
    /// assert_eq!(it.next(), Some(3));
    /// assert_eq!(it.next(), None);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = V> + SortedByItem + Clone + '_ {
        self.0.iter().copied().assume_sorted_by_item()
    }

    /// Returns `true` if `other` contains every variable that `self` does.
    ///
    /// ```
    /// use stable_adjacency::VariableSet;
    /// let nil = VariableSet::new(&[]);
    /// let one = VariableSet::new(&[1]);
    ///
    /// assert!(nil.is_subset(&one));
    /// assert!(nil.is_subset(&nil));
    /// assert!(one.is_subset(&one));
    /// assert!(!one.is_subset(&nil));
    /// ```
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().intersection(other.iter()).eq(self.iter())
    }

    /// Returns `true` if `self` contains every variable that `other` does.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns a copy of this set with `variable` removed, if it was present.
    ///
    /// ```
    /// use stable_adjacency::VariableSet;
    ///
    /// let abc = VariableSet::new(&[1, 2, 3]);
    /// assert_eq!(abc.without(2), VariableSet::new(&[1, 3]));
    /// assert_eq!(abc.without(7), abc);
    /// ```
    pub fn without(&self, variable: V) -> Self {
        let mut copy = self.clone();
        if let Ok(at) = copy.0.binary_search(&variable) {
            copy.0.remove(at);
        }
        copy
    }

    /// Returns a new set made of the variables at the given positions of this set.
    ///
    /// This is how an index choice from [`Combinations`] becomes a conditioning set.
    ///
    /// # Panics
    ///
    /// Panics if any position is out of range.
    ///
    /// ```
    /// use stable_adjacency::VariableSet;
    ///
    /// let pool = VariableSet::new(&[10, 20, 30, 40]);
    /// assert_eq!(pool.select(&[0, 2]), VariableSet::new(&[10, 30]));
    /// assert!(pool.select(&[]).is_empty());
    /// ```
    pub fn select(&self, positions: &[usize]) -> Self {
        positions.iter().map(|&at| self.0[at]).collect()
    }
}

impl<V: VariableId> Default for VariableSet<V> {
    fn default() -> Self {
        VariableSet::empty()
    }
}

impl<V: VariableId> std::fmt::Debug for VariableSet<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl<V: VariableId> iter::FromIterator<V> for VariableSet<V> {
    /// Creates a variable set containing the specified variables.
    ///
    /// It's okay if the provided iterator contains duplicates.
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut v = SmallVec::from_iter(iter);
        v.sort_unstable();
        v.dedup();
        VariableSet(v)
    }
}
