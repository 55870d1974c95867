//! The depth-staged adjacency search.
//!
//! Depth 0 screens every pair of variables. Each later depth `d` takes a snapshot of the
//! adjacencies left by the previous depth and, for every pair still adjacent in the snapshot,
//! tries each size-`d` subset of either endpoint's other neighbors as a conditioning set. Pairs
//! are divided among workers by recursively halving the range of first variables until a range
//! is no bigger than the configured chunk size.
//!
//! Workers read only their own inputs and the snapshot, and write only to the live
//! [`AdjacencyMap`] and [`SepsetMap`]. Removing an edge twice changes nothing, so the outcome is
//! the same for any number of workers and any scheduling.

use crate::adjacency::{AdjacencyMap, AdjacencySnapshot};
use crate::choose::Combinations;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::knowledge::{possible_parent, Knowledge};
use crate::oracle::{IndependenceTest, Judgement};
use crate::sepset::SepsetMap;
use crate::{VariableId, VariableSet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// The depth an "unlimited" search stops at.
pub const UNBOUNDED_DEPTH: usize = 1000;

/// How depth 0 decides which pairs start out adjacent.
#[derive(Clone, Debug)]
pub enum Depth0Policy<V: VariableId> {
    /// Test every pair with an empty conditioning set.
    Unconditional,

    /// Use a reference graph to condition each pair on the local Markov boundary of one
    /// endpoint: its neighbors in the reference graph that aren't also its descendants there.
    ///
    /// A pair is kept without testing when either endpoint is a descendant of the other, or is
    /// already in the other's boundary. Otherwise it is removed if it tests independent given
    /// either endpoint's boundary.
    LocalMarkov(Graph<V>),
}

/// Search parameters.
#[derive(Clone, Debug)]
pub struct SearchConfig<V: VariableId> {
    /// The largest conditioning set to try, or -1 for no limit (in practice,
    /// [`UNBOUNDED_DEPTH`]).
    pub max_depth: i32,
    /// Whether to record a sepset for each removed edge.
    pub record_sepsets: bool,
    /// How depth 0 picks the initial adjacencies.
    pub depth0: Depth0Policy<V>,
    /// The most first-variable indices one worker handles without splitting further.
    pub chunk_size: usize,
    /// Number of worker threads, or `None` for one per hardware thread.
    pub threads: Option<usize>,
}

impl<V: VariableId> Default for SearchConfig<V> {
    fn default() -> Self {
        SearchConfig {
            max_depth: -1,
            record_sepsets: true,
            depth0: Depth0Policy::Unconditional,
            chunk_size: 100,
            threads: None,
        }
    }
}

impl<V: VariableId> SearchConfig<V> {
    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth < -1 {
            return Err(Error::InvalidDepth(self.max_depth));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidThreads);
        }
        Ok(())
    }

    /// The deepest depth this configuration allows.
    pub fn depth_limit(&self) -> usize {
        if self.max_depth < 0 {
            UNBOUNDED_DEPTH
        } else {
            self.max_depth as usize
        }
    }
}

/// Where a search is in its progression from depth to depth.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchState {
    /// Building the empty adjacency map.
    Initializing,
    /// Screening every pair.
    Depth0,
    /// Conditioning on sets of this size.
    Depth(usize),
    /// Finished.
    Done,
}

/// What a search found.
#[derive(Debug)]
pub struct SearchOutcome<V: VariableId> {
    /// The surviving adjacencies, as undirected edges.
    pub graph: Graph<V>,
    /// The conditioning set that removed each missing edge. Pairs removed without a recorded
    /// sepset look up as the empty set.
    pub sepsets: SepsetMap<V>,
    /// The last depth that was searched.
    pub depth: usize,
    /// The number of edges left after each depth, starting with depth 0.
    pub edges_by_depth: Vec<usize>,
    /// How many times the independence test was consulted.
    pub independence_tests: usize,
    /// How many of those consultations failed and were replaced by a default judgement.
    pub failed_tests: usize,
}

#[derive(Default)]
struct Counters {
    tests: AtomicUsize,
    failures: AtomicUsize,
}

struct Progress {
    depth: usize,
    edges_by_depth: Vec<usize>,
    tests: usize,
    failures: usize,
}

/// Everything a worker of one pass may touch: read-only inputs, plus the two shared structures it
/// writes to.
struct Pass<'a, V: VariableId, T> {
    variables: &'a [V],
    test: &'a T,
    adjacencies: &'a AdjacencyMap<V>,
    sepsets: &'a SepsetMap<V>,
    record_sepsets: bool,
    counters: &'a Counters,
    chunk_size: usize,
}

impl<V: VariableId, T: IndependenceTest<V>> Pass<'_, V, T> {
    /// Consults the test, substituting `on_failure` if it fails.
    fn independent(&self, x: V, y: V, given: &VariableSet<V>, on_failure: Judgement) -> bool {
        self.counters.tests.fetch_add(1, Ordering::Relaxed);
        match self.test.test(x, y, given) {
            Ok(judgement) => judgement.is_independent(),
            Err(error) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(?x, ?y, ?given, %error, fallback = ?on_failure, "independence test failed");
                on_failure.is_independent()
            }
        }
    }

    fn remove(&self, x: V, y: V, sepset: VariableSet<V>) {
        if self.adjacencies.disconnect(x, y) {
            debug!(?x, ?y, ?sepset, "removed edge");
        }
        if self.record_sepsets {
            self.sepsets.record(x, y, sepset);
        }
    }

    /// Splits `from..to` in half until it fits in a chunk, then hands each chunk to `work`.
    fn fan_out<F>(&self, from: usize, to: usize, work: &F)
    where
        F: Fn(usize, usize) + Sync,
    {
        if to - from <= self.chunk_size {
            work(from, to);
        } else {
            let mid = from + (to - from) / 2;
            rayon::join(
                || self.fan_out(from, mid, work),
                || self.fan_out(mid, to, work),
            );
        }
    }
}

/// Depth 0: decides, for every pair `(variables[i], variables[j])` with `i < j`, whether the pair
/// starts out adjacent. Each chunk `from..to` of `i` is screened by one worker.
struct Depth0Task<'a, V: VariableId, T> {
    pass: &'a Pass<'a, V, T>,
    policy: &'a Depth0Policy<V>,
    initial: Option<&'a Graph<V>>,
}

impl<V: VariableId, T: IndependenceTest<V>> Depth0Task<'_, V, T> {
    fn run(&self) {
        self.pass
            .fan_out(0, self.pass.variables.len(), &|from, to| self.screen(from, to));
    }

    fn screen(&self, from: usize, to: usize) {
        let variables = self.pass.variables;
        for i in from..to {
            let x = variables[i];
            for &y in &variables[i + 1..] {
                if let Some(initial) = self.initial {
                    if !initial.is_adjacent(x, y) {
                        continue;
                    }
                }

                let separated = match self.policy {
                    Depth0Policy::Unconditional => {
                        let empty = VariableSet::empty();
                        self.independent(x, y, &empty).then_some(empty)
                    }
                    Depth0Policy::LocalMarkov(reference) => self
                        .markov_separated(reference, x, y)
                        .or_else(|| self.markov_separated(reference, y, x)),
                };

                match separated {
                    Some(sepset) => self.pass.remove(x, y, sepset),
                    None => {
                        // Both variables come from the map's own variable list.
                        let _ = self.pass.adjacencies.connect(x, y);
                    }
                }
            }
        }
    }

    fn independent(&self, x: V, y: V, given: &VariableSet<V>) -> bool {
        // A failed test at this stage drops the edge.
        self.pass.independent(x, y, given, Judgement::Independent)
    }

    /// Returns `x`'s boundary if it separates `x` from `y`.
    fn markov_separated(&self, reference: &Graph<V>, x: V, y: V) -> Option<VariableSet<V>> {
        let descendants = reference.descendants(x);
        if descendants.contains(y) {
            return None;
        }
        let boundary: VariableSet<V> = reference
            .adjacent_nodes(x)
            .iter()
            .filter(|&v| !descendants.contains(v))
            .collect();
        if boundary.contains(y) {
            return None;
        }
        self.independent(x, y, &boundary).then_some(boundary)
    }
}

/// Depth `d >= 1`: for every pair `(variables[i], variables[j])` with `i < j` that is adjacent in
/// the snapshot, looks for a size-`d` separating set among either endpoint's other snapshot
/// neighbors.
struct DepthTask<'a, V: VariableId, T, K: ?Sized> {
    pass: &'a Pass<'a, V, T>,
    knowledge: &'a K,
    snapshot: &'a AdjacencySnapshot<V>,
    depth: usize,
}

impl<V, T, K> DepthTask<'_, V, T, K>
where
    V: VariableId,
    T: IndependenceTest<V>,
    K: Knowledge<V> + ?Sized,
{
    fn run(&self) {
        self.pass
            .fan_out(0, self.pass.variables.len(), &|from, to| self.condition(from, to));
    }

    fn condition(&self, from: usize, to: usize) {
        let variables = self.pass.variables;
        for i in from..to {
            let x = variables[i];
            for &y in &variables[i + 1..] {
                if !self.snapshot.is_adjacent(x, y) {
                    continue;
                }

                let sepset = self
                    .separating_set(x, y, &self.candidates(x, y))
                    .or_else(|| self.separating_set(x, y, &self.candidates(y, x)));
                if let Some(sepset) = sepset {
                    self.pass.remove(x, y, sepset);
                }
            }
        }
    }

    /// `x`'s snapshot neighbors other than `y` that may be parents of `x`.
    fn candidates(&self, x: V, y: V) -> VariableSet<V> {
        match self.snapshot.neighbors(x) {
            Some(neighbors) => neighbors
                .iter()
                .filter(|&z| z != y && possible_parent(self.knowledge, z, x))
                .collect(),
            None => VariableSet::empty(),
        }
    }

    /// Tries every size-`depth` subset of `pool` in lexicographic order and returns the first one
    /// that separates `x` from `y`.
    fn separating_set(&self, x: V, y: V, pool: &VariableSet<V>) -> Option<VariableSet<V>> {
        let mut choices = Combinations::new(pool.len(), self.depth).ok()?;
        while let Some(choice) = choices.next() {
            let given = pool.select(choice);
            // A failed test at this stage keeps the edge.
            if self.pass.independent(x, y, &given, Judgement::Dependent) {
                return Some(given);
            }
        }
        None
    }
}

/// Returns `true` if some variable still has more than `depth` neighbors besides any one partner,
/// which is what it takes for the next depth to have a conditioning set to try.
fn free_degree_exceeds<V: VariableId>(adjacencies: &AdjacencyMap<V>, depth: usize) -> bool {
    adjacencies
        .variables()
        .iter()
        .any(|&x| adjacencies.degree(x).saturating_sub(1) > depth)
}

/// A configured adjacency search over a fixed list of variables.
pub struct AdjacencySearch<V: VariableId, T, K> {
    variables: Vec<V>,
    test: T,
    knowledge: K,
    config: SearchConfig<V>,
    initial_graph: Option<Graph<V>>,
    pool: rayon::ThreadPool,
}

impl<V, T, K> AdjacencySearch<V, T, K>
where
    V: VariableId,
    T: IndependenceTest<V>,
    K: Knowledge<V>,
{
    /// Sets up a search. Fails, before any test runs, if the configuration is out of range or a
    /// variable is listed twice.
    pub fn new(variables: &[V], test: T, knowledge: K, config: SearchConfig<V>) -> Result<Self> {
        config.validate()?;
        let mut seen = std::collections::HashSet::with_capacity(variables.len());
        if let Some(&twice) = variables.iter().find(|&&v| !seen.insert(v)) {
            return Err(Error::DuplicateVariable(format!("{:?}", twice)));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.unwrap_or(0))
            .thread_name(|i| format!("adjacency-search-{}", i))
            .build()?;

        Ok(AdjacencySearch {
            variables: variables.to_vec(),
            test,
            knowledge,
            config,
            initial_graph: None,
            pool,
        })
    }

    /// Restricts depth 0 to the pairs adjacent in `graph`; every other pair starts out
    /// non-adjacent without being tested.
    pub fn with_initial_graph(mut self, graph: Graph<V>) -> Self {
        self.initial_graph = Some(graph);
        self
    }

    /// The variables being searched, in order.
    pub fn variables(&self) -> &[V] {
        &self.variables
    }

    /// The configuration this search was built with.
    pub fn config(&self) -> &SearchConfig<V> {
        &self.config
    }

    /// The number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs the search.
    pub fn search(&self) -> Result<SearchOutcome<V>> {
        let (adjacencies, sepsets, progress) = self.run()?;
        Ok(SearchOutcome {
            graph: adjacencies.to_graph(),
            sepsets,
            depth: progress.depth,
            edges_by_depth: progress.edges_by_depth,
            independence_tests: progress.tests,
            failed_tests: progress.failures,
        })
    }

    /// Runs the search, returning each variable's final neighbors instead of a graph.
    pub fn search_map_only(&self) -> Result<HashMap<V, VariableSet<V>>> {
        let (adjacencies, _, _) = self.run()?;
        Ok(adjacencies.into_map())
    }

    fn run(&self) -> Result<(AdjacencyMap<V>, SepsetMap<V>, Progress)> {
        let mut state = SearchState::Initializing;
        let limit = self.config.depth_limit();
        info!(
            variables = self.variables.len(),
            max_depth = limit,
            threads = self.threads(),
            "starting adjacency search"
        );

        let adjacencies = AdjacencyMap::new(&self.variables)?;
        let sepsets = SepsetMap::new(true);
        let counters = Counters::default();
        let pass = Pass {
            variables: &self.variables,
            test: &self.test,
            adjacencies: &adjacencies,
            sepsets: &sepsets,
            record_sepsets: self.config.record_sepsets,
            counters: &counters,
            chunk_size: self.config.chunk_size,
        };

        advance(&mut state, SearchState::Depth0);
        let screening = Depth0Task {
            pass: &pass,
            policy: &self.config.depth0,
            initial: self.initial_graph.as_ref(),
        };
        self.pool.install(|| screening.run());
        let mut edges_by_depth = vec![adjacencies.edge_count()];
        info!(depth = 0, edges = edges_by_depth[0], "finished depth");

        let mut depth = 0;
        while depth < limit && free_degree_exceeds(&adjacencies, depth) {
            depth += 1;
            advance(&mut state, SearchState::Depth(depth));
            let snapshot = adjacencies.snapshot();
            let task = DepthTask {
                pass: &pass,
                knowledge: &self.knowledge,
                snapshot: &snapshot,
                depth,
            };
            self.pool.install(|| task.run());
            let edges = adjacencies.edge_count();
            edges_by_depth.push(edges);
            info!(depth, edges, "finished depth");
        }

        advance(&mut state, SearchState::Done);
        let progress = Progress {
            depth,
            edges_by_depth,
            tests: counters.tests.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
        };
        info!(
            edges = adjacencies.edge_count(),
            tests = progress.tests,
            failed = progress.failures,
            "finished adjacency search"
        );
        Ok((adjacencies, sepsets, progress))
    }
}

fn advance(state: &mut SearchState, next: SearchState) {
    debug!(from = ?state, to = ?next, "search state");
    *state = next;
}
