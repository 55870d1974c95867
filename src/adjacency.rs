use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::{VariableId, VariableSet};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeSet, HashMap};

/// The live candidate graph of a search: for every variable, the set of variables it is still
/// adjacent to.
///
/// Many workers remove edges at once. Each variable's neighbor set has its own lock, and an edge
/// is only ever added or removed with both endpoints locked, so `y` is a neighbor of `x` exactly
/// when `x` is a neighbor of `y`, whenever anyone can look. The pair is always locked in the order
/// the variables were given to [`AdjacencyMap::new`], so two workers can't deadlock on it.
pub struct AdjacencyMap<V: VariableId> {
    variables: Vec<V>,
    index: HashMap<V, usize>,
    neighbors: Vec<Mutex<BTreeSet<V>>>,
}

impl<V: VariableId> AdjacencyMap<V> {
    /// Creates a map in which every variable has no neighbors.
    pub fn new(variables: &[V]) -> Result<Self> {
        let mut index = HashMap::with_capacity(variables.len());
        for (i, &variable) in variables.iter().enumerate() {
            if index.insert(variable, i).is_some() {
                return Err(Error::DuplicateVariable(format!("{:?}", variable)));
            }
        }
        Ok(AdjacencyMap {
            variables: variables.to_vec(),
            index,
            neighbors: variables.iter().map(|_| Mutex::default()).collect(),
        })
    }

    /// The variables this map was created with, in their original order.
    pub fn variables(&self) -> &[V] {
        &self.variables
    }

    fn lock_pair(
        &self,
        x: V,
        y: V,
    ) -> Option<(MutexGuard<'_, BTreeSet<V>>, MutexGuard<'_, BTreeSet<V>>)> {
        let i = *self.index.get(&x)?;
        let j = *self.index.get(&y)?;
        if i == j {
            return None;
        }
        Some(if i < j {
            let first = self.neighbors[i].lock();
            (first, self.neighbors[j].lock())
        } else {
            let first = self.neighbors[j].lock();
            (self.neighbors[i].lock(), first)
        })
    }

    /// Makes `x` and `y` adjacent. Returns `true` if they weren't already.
    pub fn connect(&self, x: V, y: V) -> Result<bool> {
        let (mut of_x, mut of_y) = self.lock_pair(x, y).ok_or_else(|| {
            if x == y && self.index.contains_key(&x) {
                Error::SelfLoop(format!("{:?}", x))
            } else {
                let stranger = if self.index.contains_key(&x) { y } else { x };
                Error::UnknownVariable(format!("{:?}", stranger))
            }
        })?;
        let added = of_x.insert(y);
        of_y.insert(x);
        Ok(added)
    }

    /// Makes `x` and `y` non-adjacent. Returns `true` if this call is the one that removed the
    /// edge.
    ///
    /// Removing an edge that isn't there, including one between unknown variables, does nothing.
    pub fn disconnect(&self, x: V, y: V) -> bool {
        match self.lock_pair(x, y) {
            Some((mut of_x, mut of_y)) => {
                let removed = of_x.remove(&y);
                of_y.remove(&x);
                removed
            }
            None => false,
        }
    }

    /// Returns `true` if `x` and `y` are currently adjacent.
    pub fn is_adjacent(&self, x: V, y: V) -> bool {
        self.index
            .get(&x)
            .map_or(false, |&i| self.neighbors[i].lock().contains(&y))
    }

    /// A copy of `x`'s current neighbors, or `None` if `x` isn't in the map.
    pub fn neighbors(&self, x: V) -> Option<VariableSet<V>> {
        let i = *self.index.get(&x)?;
        let neighbors = self.neighbors[i].lock();
        Some(neighbors.iter().copied().collect())
    }

    /// The number of variables currently adjacent to `x`.
    pub fn degree(&self, x: V) -> usize {
        self.index
            .get(&x)
            .map_or(0, |&i| self.neighbors[i].lock().len())
    }

    /// The number of edges currently in the map.
    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(|set| set.lock().len()).sum::<usize>() / 2
    }

    /// Copies the current adjacencies into an immutable snapshot.
    ///
    /// Take snapshots between passes, while no worker is mutating the map; a snapshot taken
    /// during a pass still satisfies symmetry per pair but may mix earlier and later removals.
    pub fn snapshot(&self) -> AdjacencySnapshot<V> {
        AdjacencySnapshot {
            neighbors: self
                .variables
                .iter()
                .zip(&self.neighbors)
                .map(|(&v, set)| (v, set.lock().iter().copied().collect()))
                .collect(),
        }
    }

    /// Builds an undirected graph with one edge per current adjacency.
    pub fn to_graph(&self) -> Graph<V> {
        let mut graph = Graph::new(&self.variables);
        for (i, &x) in self.variables.iter().enumerate() {
            let neighbors = self.neighbors[i].lock().clone();
            for y in neighbors {
                if self.index[&y] > i {
                    // Both endpoints come from this map, so neither can be unknown.
                    let _ = graph.add_undirected_edge(x, y);
                }
            }
        }
        graph
    }

    /// Consumes the map, returning every variable's neighbors.
    pub fn into_map(self) -> HashMap<V, VariableSet<V>> {
        self.variables
            .into_iter()
            .zip(self.neighbors)
            .map(|(v, set)| (v, set.into_inner().into_iter().collect()))
            .collect()
    }
}

/// A frozen copy of an [`AdjacencyMap`], taken once per depth so that every pair tested during
/// that depth sees the same neighbors no matter what other workers have removed meanwhile.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjacencySnapshot<V: VariableId> {
    neighbors: HashMap<V, VariableSet<V>>,
}

impl<V: VariableId> AdjacencySnapshot<V> {
    /// `x`'s neighbors at the time of the snapshot, or `None` if `x` isn't in it.
    pub fn neighbors(&self, x: V) -> Option<&VariableSet<V>> {
        self.neighbors.get(&x)
    }

    /// Returns `true` if `x` and `y` were adjacent at the time of the snapshot.
    pub fn is_adjacent(&self, x: V, y: V) -> bool {
        self.neighbors.get(&x).map_or(false, |set| set.contains(y))
    }

    /// The number of neighbors `x` had at the time of the snapshot.
    pub fn degree(&self, x: V) -> usize {
        self.neighbors.get(&x).map_or(0, VariableSet::len)
    }
}
