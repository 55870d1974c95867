use parking_lot::Mutex;
use stable_adjacency::{
    AdjacencySearch, DSeparation, Depth0Policy, EdgeKnowledge, Error, Graph, IndependenceTest,
    Judgement, NoKnowledge, SearchConfig, TestError, TestResult, VariableSet,
};
use std::collections::{BTreeSet, HashMap};

const A: u8 = 0;
const B: u8 = 1;
const C: u8 = 2;
const D: u8 = 3;

/// Answers "independent" for exactly the listed triples, "dependent" otherwise, and remembers
/// every question it was asked.
#[derive(Default)]
struct Scripted {
    independent: Vec<(u8, u8, VariableSet<u8>)>,
    failing: Vec<(u8, u8, VariableSet<u8>)>,
    asked: Mutex<Vec<(u8, u8, VariableSet<u8>)>>,
}

impl Scripted {
    fn new(independent: &[(u8, u8, &[u8])]) -> Self {
        Scripted {
            independent: independent
                .iter()
                .map(|&(x, y, given)| (x, y, VariableSet::new(given)))
                .collect(),
            ..Scripted::default()
        }
    }

    fn failing(mut self, x: u8, y: u8, given: &[u8]) -> Self {
        self.failing.push((x, y, VariableSet::new(given)));
        self
    }

    fn lists(list: &[(u8, u8, VariableSet<u8>)], x: u8, y: u8, given: &VariableSet<u8>) -> bool {
        list.iter()
            .any(|(a, b, s)| s == given && ((*a, *b) == (x, y) || (*a, *b) == (y, x)))
    }

    fn asked_about(&self, x: u8, y: u8) -> Vec<VariableSet<u8>> {
        self.asked
            .lock()
            .iter()
            .filter(|(a, b, _)| (*a, *b) == (x, y) || (*a, *b) == (y, x))
            .map(|(_, _, given)| given.clone())
            .collect()
    }
}

impl IndependenceTest<u8> for Scripted {
    fn test(&self, x: u8, y: u8, given: &VariableSet<u8>) -> TestResult<Judgement> {
        self.asked.lock().push((x, y, given.clone()));
        if Self::lists(&self.failing, x, y, given) {
            return Err(TestError::NonConvergence("scripted failure".into()));
        }
        Ok(Self::lists(&self.independent, x, y, given).into())
    }
}

fn edges(graph: &Graph<u8>) -> BTreeSet<(u8, u8)> {
    graph
        .edges()
        .iter()
        .map(|edge| {
            let (a, b) = edge.endpoints();
            (a.min(b), a.max(b))
        })
        .collect()
}

fn scenario_a() -> Scripted {
    Scripted::new(&[(A, D, &[]), (B, C, &[A])])
}

#[test]
fn four_variable_scenario() {
    let oracle = scenario_a();
    let search =
        AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, SearchConfig::default()).unwrap();
    let outcome = search.search().unwrap();

    assert_eq!(
        edges(&outcome.graph),
        [(A, B), (A, C), (B, D), (C, D)].into_iter().collect()
    );
    assert_eq!(outcome.sepsets.lookup(A, D), Some(VariableSet::empty()));
    assert_eq!(outcome.sepsets.lookup(D, A), Some(VariableSet::empty()));
    assert_eq!(outcome.sepsets.lookup(B, C), Some(VariableSet::new(&[A])));
    assert_eq!(outcome.sepsets.len(), 2);
    assert_eq!(outcome.depth, 1);
    assert_eq!(outcome.edges_by_depth, [5, 4]);
    assert_eq!(outcome.failed_tests, 0);
    assert_eq!(outcome.independence_tests, oracle.asked.lock().len());
}

#[test]
fn first_independence_stops_the_pair() {
    // {D} would separate A and B as well, but {C} comes first.
    let oracle = Scripted::new(&[(A, B, &[C]), (A, B, &[D])]);
    let search =
        AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, SearchConfig::default()).unwrap();
    let outcome = search.search().unwrap();

    assert!(!outcome.graph.is_adjacent(A, B));
    assert_eq!(outcome.sepsets.lookup(A, B), Some(VariableSet::new(&[C])));
    // The empty set at depth 0, then {C} from A's side.
    assert_eq!(
        oracle.asked_about(A, B),
        [VariableSet::empty(), VariableSet::new(&[C])]
    );
}

#[test]
fn map_only_matches_the_graph() {
    let oracle = scenario_a();
    let search =
        AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, SearchConfig::default()).unwrap();
    let map = search.search_map_only().unwrap();

    let expected: HashMap<u8, VariableSet<u8>> = [
        (A, VariableSet::new(&[B, C])),
        (B, VariableSet::new(&[A, D])),
        (C, VariableSet::new(&[A, D])),
        (D, VariableSet::new(&[B, C])),
    ]
    .into_iter()
    .collect();
    assert_eq!(map, expected);
}

#[test]
fn depth_limit_stops_early() {
    let oracle = scenario_a();
    let config = SearchConfig {
        max_depth: 0,
        ..SearchConfig::default()
    };
    let search = AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, config).unwrap();
    let outcome = search.search().unwrap();

    assert_eq!(outcome.depth, 0);
    assert_eq!(outcome.graph.num_edges(), 5);
    assert!(outcome.graph.is_adjacent(B, C));
    assert!(oracle.asked.lock().iter().all(|(_, _, given)| given.is_empty()));
}

#[test]
fn forbidden_parents_leave_the_pool() {
    let oracle = scenario_a();
    let mut knowledge = EdgeKnowledge::new();
    knowledge.forbid(D, B);

    let search =
        AdjacencySearch::new(&[A, B, C, D], &oracle, &knowledge, SearchConfig::default()).unwrap();
    let outcome = search.search().unwrap();

    // A - B is still tested, but never given D.
    let asked = oracle.asked_about(A, B);
    assert!(asked.len() > 1);
    assert!(asked.iter().all(|given| !given.contains(D)));
    assert_eq!(
        edges(&outcome.graph),
        [(A, B), (A, C), (B, D), (C, D)].into_iter().collect()
    );
}

#[test]
fn skipping_sepsets_still_removes_edges() {
    let oracle = scenario_a();
    let config = SearchConfig {
        record_sepsets: false,
        ..SearchConfig::default()
    };
    let search = AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, config).unwrap();
    let outcome = search.search().unwrap();

    assert_eq!(outcome.graph.num_edges(), 4);
    assert!(outcome.sepsets.is_empty());
    // Unrecorded pairs still look up as separated by nothing.
    assert_eq!(outcome.sepsets.lookup(B, C), Some(VariableSet::empty()));
}

#[test]
fn failures_drop_edges_at_depth_zero() {
    let oracle = Scripted::new(&[]).failing(A, C, &[]);
    let search =
        AdjacencySearch::new(&[A, B, C], &oracle, NoKnowledge, SearchConfig::default()).unwrap();
    let outcome = search.search().unwrap();

    assert!(!outcome.graph.is_adjacent(A, C));
    assert!(outcome.graph.is_adjacent(A, B));
    assert!(outcome.graph.is_adjacent(B, C));
    assert_eq!(outcome.failed_tests, 1);
}

#[test]
fn failures_keep_edges_at_later_depths() {
    let oracle = Scripted::new(&[(B, C, &[A])]).failing(B, C, &[A]);
    let search =
        AdjacencySearch::new(&[A, B, C], &oracle, NoKnowledge, SearchConfig::default()).unwrap();
    let outcome = search.search().unwrap();

    assert_eq!(outcome.graph.num_edges(), 3);
    assert!(outcome.graph.is_adjacent(B, C));
    assert!(outcome.failed_tests >= 1);
    assert!(outcome.sepsets.is_empty());
}

#[test]
fn invalid_depth_fails_before_testing() {
    let oracle = scenario_a();
    let config = SearchConfig {
        max_depth: -2,
        ..SearchConfig::default()
    };
    let result = AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, config);
    assert!(matches!(result, Err(Error::InvalidDepth(-2))));
    assert!(oracle.asked.lock().is_empty());
}

#[test]
fn initial_graph_limits_depth_zero() {
    let oracle = Scripted::new(&[]);
    let mut initial = Graph::new(&[A, B, C]);
    initial.add_undirected_edge(A, B).unwrap();
    initial.add_undirected_edge(B, C).unwrap();

    let search = AdjacencySearch::new(&[A, B, C], &oracle, NoKnowledge, SearchConfig::default())
        .unwrap()
        .with_initial_graph(initial.clone());
    let outcome = search.search().unwrap();

    assert_eq!(outcome.graph, initial);
    // Two screening tests, then one conditioning test per surviving edge.
    assert_eq!(outcome.independence_tests, 4);
    assert!(oracle.asked_about(A, C).is_empty());
}

#[test]
fn local_markov_screening_uses_the_reference_boundary() {
    let mut chain = Graph::new(&[A, B, C]);
    chain.add_directed_edge(A, B).unwrap();
    chain.add_directed_edge(B, C).unwrap();
    let oracle = DSeparation::new(chain.clone()).unwrap();

    let config = SearchConfig {
        depth0: Depth0Policy::LocalMarkov(chain),
        ..SearchConfig::default()
    };
    let search = AdjacencySearch::new(&[A, B, C], &oracle, NoKnowledge, config).unwrap();
    let outcome = search.search().unwrap();

    assert_eq!(edges(&outcome.graph), [(A, B), (B, C)].into_iter().collect());
    assert_eq!(outcome.sepsets.lookup(A, C), Some(VariableSet::new(&[B])));
    assert_eq!(outcome.edges_by_depth[0], 2);
    // Only A _||_ C needed a test at depth 0; descendants and boundary members are kept untested.
    assert_eq!(outcome.independence_tests, 3);
}

#[test]
fn more_threads_than_work() {
    let oracle = scenario_a();
    let config = SearchConfig {
        threads: Some(8),
        chunk_size: 1,
        ..SearchConfig::default()
    };
    let search = AdjacencySearch::new(&[A, B, C, D], &oracle, NoKnowledge, config).unwrap();
    assert_eq!(search.threads(), 8);
    let outcome = search.search().unwrap();
    assert_eq!(outcome.graph.num_edges(), 4);
}

#[test]
fn tiny_universes() {
    let oracle = Scripted::new(&[]);
    for universe in [&[][..], &[A][..]] {
        let search =
            AdjacencySearch::new(universe, &oracle, NoKnowledge, SearchConfig::default()).unwrap();
        let outcome = search.search().unwrap();
        assert_eq!(outcome.graph.num_edges(), 0);
        assert_eq!(outcome.depth, 0);
    }
    assert!(oracle.asked.lock().is_empty());
}
