//! Property tests for the enumerators and for search invariants over random DAGs.

use proptest::prelude::*;
use stable_adjacency::{
    combination_count, AdjacencySearch, Combinations, DSeparation, Graph, NoKnowledge,
    SearchConfig, SearchOutcome, Selections,
};
use std::collections::BTreeSet;

/// A DAG over `0..n` with an edge `i --> j` for each `i < j` whose flag is set.
fn dag(n: usize, flags: &[bool]) -> Graph<u8> {
    let nodes: Vec<u8> = (0..n as u8).collect();
    let mut dag = Graph::new(&nodes);
    let mut flags = flags.iter();
    for i in 0..n as u8 {
        for j in i + 1..n as u8 {
            if flags.next() == Some(&true) {
                dag.add_directed_edge(i, j).unwrap();
            }
        }
    }
    dag
}

fn arb_dag() -> impl Strategy<Value = Graph<u8>> {
    (2usize..8).prop_flat_map(|n| {
        proptest::collection::vec(proptest::bool::weighted(0.3), n * (n - 1) / 2)
            .prop_map(move |flags| dag(n, &flags))
    })
}

fn skeleton(graph: &Graph<u8>) -> BTreeSet<(u8, u8)> {
    graph
        .edges()
        .iter()
        .map(|edge| {
            let (a, b) = edge.endpoints();
            (a.min(b), a.max(b))
        })
        .collect()
}

fn search(dag: &Graph<u8>, config: SearchConfig<u8>) -> SearchOutcome<u8> {
    let oracle = DSeparation::new(dag.clone()).unwrap();
    AdjacencySearch::new(dag.nodes(), &oracle, NoKnowledge, config)
        .unwrap()
        .search()
        .unwrap()
}

proptest! {
    #[test]
    fn combinations_are_counted_and_ordered(n in 0usize..10, k in 0usize..10) {
        prop_assume!(k <= n);
        let mut choices = Combinations::new(n, k).unwrap();
        let mut seen: Vec<Vec<usize>> = Vec::new();
        while let Some(choice) = choices.next() {
            prop_assert!(choice.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(choice.iter().all(|&i| i < n));
            if let Some(last) = seen.last() {
                prop_assert!(last.as_slice() < choice);
            }
            seen.push(choice.to_vec());
        }
        prop_assert_eq!(seen.len() as u128, combination_count(n, k));
    }

    #[test]
    fn selections_cover_every_tuple(n in 0usize..6) {
        let mut selections = Selections::new(n);
        let mut count = 0u128;
        let mut last: Option<Vec<usize>> = None;
        while let Some(tuple) = selections.next() {
            prop_assert_eq!(tuple.len(), n);
            prop_assert!(tuple.iter().all(|&i| i < n));
            if let Some(last) = &last {
                prop_assert!(last.as_slice() < tuple);
            }
            last = Some(tuple.to_vec());
            count += 1;
        }
        let expected = if n == 0 { 1 } else { (n as u128).pow(n as u32) };
        prop_assert_eq!(count, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn d_separation_recovers_the_skeleton(dag in arb_dag()) {
        let outcome = search(&dag, SearchConfig::default());
        prop_assert_eq!(skeleton(&outcome.graph), skeleton(&dag));
        for (x, y) in outcome.sepsets.pairs().into_iter().map(|(pair, _)| pair) {
            prop_assert!(!outcome.graph.is_adjacent(x, y));
        }
        prop_assert_eq!(outcome.failed_tests, 0);
    }

    #[test]
    fn recorded_sepsets_separate(dag in arb_dag()) {
        let oracle = DSeparation::new(dag.clone()).unwrap();
        let outcome = search(&dag, SearchConfig::default());
        for ((x, y), sepset) in outcome.sepsets.pairs() {
            prop_assert!(oracle.is_d_separated(x, y, &sepset));
            prop_assert!(!sepset.contains(x) && !sepset.contains(y));
        }
    }

    #[test]
    fn adjacency_is_symmetric(dag in arb_dag()) {
        let oracle = DSeparation::new(dag.clone()).unwrap();
        let map = AdjacencySearch::new(dag.nodes(), &oracle, NoKnowledge, SearchConfig::default())
            .unwrap()
            .search_map_only()
            .unwrap();
        for (&x, neighbors) in &map {
            prop_assert!(!neighbors.contains(x));
            for y in neighbors.iter() {
                prop_assert!(map[&y].contains(x));
            }
        }
    }

    #[test]
    fn deeper_searches_only_remove_edges(dag in arb_dag(), depth in 0i32..4) {
        let shallow = search(&dag, SearchConfig { max_depth: depth, ..SearchConfig::default() });
        let deep = search(&dag, SearchConfig { max_depth: depth + 1, ..SearchConfig::default() });
        prop_assert!(skeleton(&deep.graph).is_subset(&skeleton(&shallow.graph)));
        prop_assert!(shallow.edges_by_depth.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn result_does_not_depend_on_scheduling(dag in arb_dag()) {
        let serial = search(&dag, SearchConfig { threads: Some(1), ..SearchConfig::default() });
        let parallel = search(
            &dag,
            SearchConfig { threads: Some(4), chunk_size: 1, ..SearchConfig::default() },
        );
        prop_assert_eq!(&serial.graph, &parallel.graph);
        prop_assert_eq!(serial.sepsets.pairs(), parallel.sepsets.pairs());
        prop_assert_eq!(serial.edges_by_depth, parallel.edges_by_depth);
        prop_assert_eq!(serial.independence_tests, parallel.independence_tests);
    }

    #[test]
    fn search_terminates_within_bounds(dag in arb_dag(), max_depth in -1i32..4) {
        let n = dag.nodes().len();
        let outcome = search(&dag, SearchConfig { max_depth, ..SearchConfig::default() });
        let ceiling = if max_depth < 0 { n - 2 } else { (max_depth as usize).min(n - 2) };
        prop_assert!(outcome.depth <= ceiling);
        prop_assert_eq!(outcome.edges_by_depth.len(), outcome.depth + 1);
    }
}
