use crate::error::{Error, Result};
use crate::{VariableId, VariableSet};
use std::collections::{BTreeSet, HashMap};

/// An edge between two variables of a [`Graph`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Edge<V> {
    /// `a -- b`, listed with `a` before `b` in the graph's node order.
    Undirected(V, V),
    /// `from --> to`.
    Directed(V, V),
}

impl<V: Copy> Edge<V> {
    /// The two variables this edge connects.
    pub fn endpoints(&self) -> (V, V) {
        match *self {
            Edge::Undirected(a, b) | Edge::Directed(a, b) => (a, b),
        }
    }
}

/// A graph over a fixed list of variables, where each pair of variables is joined by at most one
/// edge, either directed or undirected.
///
/// The same type serves as the skeleton a search produces (undirected edges only), as a
/// restriction on which pairs a search considers at all, as the reference structure for
/// local-Markov screening, and as the DAG behind [`DSeparation`][crate::DSeparation].
#[derive(Clone, Eq, PartialEq)]
pub struct Graph<V: VariableId> {
    nodes: Vec<V>,
    index: HashMap<V, usize>,
    children: Vec<BTreeSet<V>>,
    parents: Vec<BTreeSet<V>>,
    undirected: Vec<BTreeSet<V>>,
}

impl<V: VariableId> Graph<V> {
    /// Creates a graph with the given nodes and no edges.
    ///
    /// If a node is listed more than once, only its first position counts.
    pub fn new(nodes: &[V]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut kept = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if !index.contains_key(&node) {
                index.insert(node, kept.len());
                kept.push(node);
            }
        }
        let len = kept.len();
        Graph {
            nodes: kept,
            index,
            children: vec![BTreeSet::new(); len],
            parents: vec![BTreeSet::new(); len],
            undirected: vec![BTreeSet::new(); len],
        }
    }

    /// Creates a graph with an undirected edge between every pair of the given nodes.
    pub fn complete(nodes: &[V]) -> Self {
        let mut graph = Graph::new(nodes);
        for (i, set) in graph.undirected.iter_mut().enumerate() {
            set.extend(
                graph
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, &v)| v),
            );
        }
        graph
    }

    /// The nodes of this graph, in the order they were given.
    pub fn nodes(&self) -> &[V] {
        &self.nodes
    }

    /// Returns `true` if `node` is one of this graph's nodes.
    pub fn contains(&self, node: V) -> bool {
        self.index.contains_key(&node)
    }

    fn slot(&self, node: V) -> Result<usize> {
        self.index
            .get(&node)
            .copied()
            .ok_or_else(|| Error::UnknownVariable(format!("{:?}", node)))
    }

    fn slots(&self, a: V, b: V) -> Result<(usize, usize)> {
        let (i, j) = (self.slot(a)?, self.slot(b)?);
        if i == j {
            return Err(Error::SelfLoop(format!("{:?}", a)));
        }
        Ok((i, j))
    }

    /// Adds `a -- b`, replacing any edge already between them.
    pub fn add_undirected_edge(&mut self, a: V, b: V) -> Result<()> {
        let (i, j) = self.slots(a, b)?;
        self.remove_edge(a, b);
        self.undirected[i].insert(b);
        self.undirected[j].insert(a);
        Ok(())
    }

    /// Adds `from --> to`, replacing any edge already between them.
    pub fn add_directed_edge(&mut self, from: V, to: V) -> Result<()> {
        let (i, j) = self.slots(from, to)?;
        self.remove_edge(from, to);
        self.children[i].insert(to);
        self.parents[j].insert(from);
        Ok(())
    }

    /// Removes whatever edge joins `a` and `b`, returning `true` if there was one.
    pub fn remove_edge(&mut self, a: V, b: V) -> bool {
        let (i, j) = match self.slots(a, b) {
            Ok(slots) => slots,
            Err(_) => return false,
        };
        let mut removed = self.undirected[i].remove(&b);
        self.undirected[j].remove(&a);
        if self.children[i].remove(&b) {
            self.parents[j].remove(&a);
            removed = true;
        }
        if self.children[j].remove(&a) {
            self.parents[i].remove(&b);
            removed = true;
        }
        removed
    }

    /// Returns the edge between `a` and `b`, if any.
    pub fn edge(&self, a: V, b: V) -> Option<Edge<V>> {
        let (i, j) = self.slots(a, b).ok()?;
        if self.undirected[i].contains(&b) {
            Some(if i < j {
                Edge::Undirected(a, b)
            } else {
                Edge::Undirected(b, a)
            })
        } else if self.children[i].contains(&b) {
            Some(Edge::Directed(a, b))
        } else if self.children[j].contains(&a) {
            Some(Edge::Directed(b, a))
        } else {
            None
        }
    }

    /// Returns `true` if any edge joins `a` and `b`.
    pub fn is_adjacent(&self, a: V, b: V) -> bool {
        self.edge(a, b).is_some()
    }

    /// Every node joined to `node` by an edge of any kind.
    pub fn adjacent_nodes(&self, node: V) -> VariableSet<V> {
        match self.slot(node) {
            Ok(i) => self.undirected[i]
                .iter()
                .chain(&self.children[i])
                .chain(&self.parents[i])
                .copied()
                .collect(),
            Err(_) => VariableSet::empty(),
        }
    }

    /// The nodes with a directed edge into `node`.
    pub fn parents(&self, node: V) -> VariableSet<V> {
        self.slot(node)
            .map(|i| self.parents[i].iter().copied().collect())
            .unwrap_or_default()
    }

    /// The nodes with a directed edge out of `node`.
    pub fn children(&self, node: V) -> VariableSet<V> {
        self.slot(node)
            .map(|i| self.children[i].iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every node reachable from `node` along directed edges, including `node` itself.
    pub fn descendants(&self, node: V) -> VariableSet<V> {
        if !self.contains(node) {
            return VariableSet::empty();
        }
        let mut seen = BTreeSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if seen.insert(current) {
                stack.extend(&self.children[self.index[&current]]);
            }
        }
        seen.into_iter().collect()
    }

    /// Returns `true` if any edge is undirected.
    pub fn has_undirected_edges(&self) -> bool {
        self.undirected.iter().any(|set| !set.is_empty())
    }

    /// Returns `true` if following directed edges can never lead back to where it started.
    pub fn is_acyclic(&self) -> bool {
        let mut in_degree: Vec<usize> = self.parents.iter().map(BTreeSet::len).collect();
        let mut ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut visited = 0;
        while let Some(i) = ready.pop() {
            visited += 1;
            for child in &self.children[i] {
                let j = self.index[child];
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.push(j);
                }
            }
        }
        visited == self.nodes.len()
    }

    /// All edges, ordered by the position of their first endpoint in [`Graph::nodes`].
    pub fn edges(&self) -> Vec<Edge<V>> {
        let mut edges = Vec::new();
        for (i, &node) in self.nodes.iter().enumerate() {
            let mut out: Vec<(usize, Edge<V>)> = self.children[i]
                .iter()
                .map(|&child| (self.index[&child], Edge::Directed(node, child)))
                .chain(
                    self.undirected[i]
                        .iter()
                        .map(|&other| (self.index[&other], Edge::Undirected(node, other)))
                        .filter(|&(j, _)| j > i),
                )
                .collect();
            out.sort_unstable_by_key(|&(j, _)| j);
            edges.extend(out.into_iter().map(|(_, edge)| edge));
        }
        edges
    }

    /// The number of edges in the graph.
    pub fn num_edges(&self) -> usize {
        let directed: usize = self.children.iter().map(BTreeSet::len).sum();
        let undirected: usize = self.undirected.iter().map(BTreeSet::len).sum();
        directed + undirected / 2
    }
}

impl<V: VariableId> std::fmt::Debug for Graph<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        struct Shown<V>(Edge<V>);

        impl<V: std::fmt::Debug> std::fmt::Debug for Shown<V> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match &self.0 {
                    Edge::Undirected(a, b) => write!(f, "{:?} -- {:?}", a, b),
                    Edge::Directed(a, b) => write!(f, "{:?} --> {:?}", a, b),
                }
            }
        }

        f.debug_set()
            .entries(self.edges().into_iter().map(Shown))
            .finish()
    }
}
