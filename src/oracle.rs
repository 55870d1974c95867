//! The conditional independence tests a search consults, and two implementations: an exact
//! d-separation oracle for a known DAG, and a G² test for binary data.

use crate::error::{Error, Result, TestError, TestResult};
use crate::graph::Graph;
use crate::table::Table;
use crate::{VariableId, VariableSet};
use statrs::distribution::{ChiSquared, Univariate};
use std::collections::{HashSet, VecDeque};

/// The answer to "is `x` independent of `y` given `z`?"
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Judgement {
    /// `x` and `y` are independent given `z`.
    Independent,
    /// `x` and `y` are dependent given `z`.
    Dependent,
}

impl Judgement {
    /// Returns `true` for [`Judgement::Independent`].
    pub fn is_independent(self) -> bool {
        self == Judgement::Independent
    }
}

impl From<bool> for Judgement {
    /// `true` means independent.
    fn from(independent: bool) -> Self {
        if independent {
            Judgement::Independent
        } else {
            Judgement::Dependent
        }
    }
}

/// A conditional independence test.
///
/// A search calls this from many worker threads at once, and never calls it with `x == y` or with
/// `x` or `y` in `given`.
pub trait IndependenceTest<V: VariableId>: Sync {
    /// Decides whether `x` and `y` are independent given every variable in `given`.
    fn test(&self, x: V, y: V, given: &VariableSet<V>) -> TestResult<Judgement>;
}

impl<V: VariableId, T: IndependenceTest<V> + ?Sized> IndependenceTest<V> for &T {
    fn test(&self, x: V, y: V, given: &VariableSet<V>) -> TestResult<Judgement> {
        (**self).test(x, y, given)
    }
}

/// Adapts a closure into an [`IndependenceTest`].
///
/// ```
/// use stable_adjacency::{FnTest, IndependenceTest, Judgement, TestError, VariableSet};
///
/// let test = FnTest(|x: u8, y: u8, _: &VariableSet<u8>| {
///     Ok::<_, TestError>(Judgement::from(x + y == 3))
/// });
/// assert_eq!(test.test(1, 2, &VariableSet::empty()).unwrap(), Judgement::Independent);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FnTest<F>(pub F);

impl<V, F> IndependenceTest<V> for FnTest<F>
where
    V: VariableId,
    F: Fn(V, V, &VariableSet<V>) -> TestResult<Judgement> + Sync,
{
    fn test(&self, x: V, y: V, given: &VariableSet<V>) -> TestResult<Judgement> {
        (self.0)(x, y, given)
    }
}

/// Answers independence questions exactly, by d-separation in a known DAG.
///
/// Searching with this oracle should recover the DAG's skeleton exactly.
#[derive(Clone, Debug)]
pub struct DSeparation<V: VariableId> {
    dag: Graph<V>,
}

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
enum Direction {
    /// Arrived from a child, travelling against the edge.
    Up,
    /// Arrived from a parent, travelling along the edge.
    Down,
}

impl<V: VariableId> DSeparation<V> {
    /// Wraps a DAG. Fails if the graph has undirected edges or a directed cycle.
    pub fn new(dag: Graph<V>) -> Result<Self> {
        if dag.has_undirected_edges() || !dag.is_acyclic() {
            return Err(Error::NotADag);
        }
        Ok(DSeparation { dag })
    }

    /// The DAG this oracle answers for.
    pub fn dag(&self) -> &Graph<V> {
        &self.dag
    }

    /// Returns `true` if `x` and `y` are d-separated by `given`.
    ///
    /// This is the reachability procedure from Koller and Friedman's *Probabilistic Graphical
    /// Models*, algorithm 3.1: walk active trails outward from `x` and see whether `y` turns up.
    pub fn is_d_separated(&self, x: V, y: V, given: &VariableSet<V>) -> bool {
        if given.contains(x) || given.contains(y) {
            return true;
        }

        // A collider passes a trail through if it, or any of its descendants, is observed.
        let mut opens_colliders = HashSet::new();
        let mut pending: Vec<V> = given.iter().collect();
        while let Some(v) = pending.pop() {
            if opens_colliders.insert(v) {
                pending.extend(self.dag.parents(v).iter());
            }
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((x, Direction::Up));
        while let Some((node, direction)) = queue.pop_front() {
            if !visited.insert((node, direction)) {
                continue;
            }
            if node == y {
                return false;
            }
            let observed = given.contains(node);
            match direction {
                Direction::Up if !observed => {
                    queue.extend(self.dag.parents(node).iter().map(|p| (p, Direction::Up)));
                    queue.extend(self.dag.children(node).iter().map(|c| (c, Direction::Down)));
                }
                Direction::Up => {}
                Direction::Down => {
                    if !observed {
                        queue.extend(self.dag.children(node).iter().map(|c| (c, Direction::Down)));
                    }
                    if opens_colliders.contains(&node) {
                        queue.extend(self.dag.parents(node).iter().map(|p| (p, Direction::Up)));
                    }
                }
            }
        }
        true
    }
}

impl<V: VariableId> IndependenceTest<V> for DSeparation<V> {
    fn test(&self, x: V, y: V, given: &VariableSet<V>) -> TestResult<Judgement> {
        for v in std::iter::once(x).chain(std::iter::once(y)).chain(given.iter()) {
            if !self.dag.contains(v) {
                return Err(TestError::UnknownVariable(format!("{:?}", v)));
            }
        }
        Ok(self.is_d_separated(x, y, given).into())
    }
}

/// A G² (likelihood-ratio) test of conditional independence for binary variables, computed from a
/// [`Table`] of observed frequencies.
///
/// Within each observed state of the conditioning variables, the 2×2 table of `x` against `y` is
/// compared with the table expected under independence. The statistics add up across strata, as
/// do their degrees of freedom, and the total is compared against a χ² distribution. A row or
/// column that is empty within a stratum contributes no degrees of freedom.
///
/// ```
/// use stable_adjacency::{GSquareTest, IndependenceTest, Judgement, Table, VariableSet};
///
/// // 1 and 2 almost always appear together.
/// let mut table = Table::new();
/// table
///     .add_cell(VariableSet::new(&[]), 40.0)
///     .add_cell(VariableSet::new(&[1, 2]), 40.0)
///     .add_cell(VariableSet::new(&[1]), 2.0)
///     .add_cell(VariableSet::new(&[2]), 3.0);
///
/// let test = GSquareTest::new(table, 0.05).unwrap();
/// assert_eq!(test.test(1, 2, &VariableSet::empty()).unwrap(), Judgement::Dependent);
/// ```
#[derive(Clone, Debug)]
pub struct GSquareTest<V: VariableId> {
    table: Table<V>,
    sample_size: f64,
    alpha: f64,
}

impl<V: VariableId> GSquareTest<V> {
    /// Creates a test that judges independence when the p-value exceeds `alpha`.
    pub fn new(table: Table<V>, alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::InvalidAlpha(alpha));
        }
        let sample_size = table.summary().sample_size;
        Ok(GSquareTest {
            table,
            sample_size,
            alpha,
        })
    }

    /// The significance level.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Returns the G² statistic and its degrees of freedom.
    pub fn statistic(
        &self,
        x: V,
        y: V,
        given: &VariableSet<V>,
    ) -> TestResult<(f64, f64)> {
        if self.sample_size <= 0.0 {
            return Err(TestError::EmptyData);
        }

        let relevant: VariableSet<V> = given.iter().chain([x, y]).collect();
        let strata = self.table.project(&relevant).strata(x, y, given);

        let mut g_square = 0.0;
        let mut degrees_of_freedom = 0.0;
        for counts in strata.values() {
            let total: f64 = counts.iter().sum();
            let rows = [counts[0] + counts[1], counts[2] + counts[3]];
            let columns = [counts[0] + counts[2], counts[1] + counts[3]];
            for (cell, &observed) in counts.iter().enumerate() {
                if observed > 0.0 {
                    let expected = rows[cell / 2] * columns[cell % 2] / total;
                    g_square += 2.0 * observed * (observed / expected).ln();
                }
            }
            let live_rows = rows.iter().filter(|&&n| n > 0.0).count();
            let live_columns = columns.iter().filter(|&&n| n > 0.0).count();
            degrees_of_freedom +=
                (live_rows.saturating_sub(1) * live_columns.saturating_sub(1)) as f64;
        }

        if !g_square.is_finite() {
            return Err(TestError::NonConvergence(format!(
                "G² statistic for {:?} and {:?} given {:?} is {}",
                x, y, given, g_square
            )));
        }
        Ok((g_square.max(0.0), degrees_of_freedom))
    }

    /// Returns the p-value for the null hypothesis that `x` and `y` are independent given `given`.
    ///
    /// With no degrees of freedom left, there is no evidence against independence and the p-value
    /// is 1.
    pub fn p_value(
        &self,
        x: V,
        y: V,
        given: &VariableSet<V>,
    ) -> TestResult<f64> {
        let (g_square, degrees_of_freedom) = self.statistic(x, y, given)?;
        if degrees_of_freedom == 0.0 {
            return Ok(1.0);
        }
        let chi2 = ChiSquared::new(degrees_of_freedom)
            .map_err(|e| TestError::NonConvergence(e.to_string()))?;
        Ok(1.0 - chi2.cdf(g_square))
    }
}

impl<V: VariableId> IndependenceTest<V> for GSquareTest<V> {
    fn test(&self, x: V, y: V, given: &VariableSet<V>) -> TestResult<Judgement> {
        Ok((self.p_value(x, y, given)? > self.alpha).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collider() -> DSeparation<u8> {
        // 1 -> 3 <- 2, 3 -> 4
        let mut dag = Graph::new(&[1, 2, 3, 4]);
        dag.add_directed_edge(1, 3).unwrap();
        dag.add_directed_edge(2, 3).unwrap();
        dag.add_directed_edge(3, 4).unwrap();
        DSeparation::new(dag).unwrap()
    }

    #[test]
    fn colliders_block_until_observed() {
        let oracle = collider();
        assert!(oracle.is_d_separated(1, 2, &VariableSet::empty()));
        assert!(!oracle.is_d_separated(1, 2, &VariableSet::new(&[3])));
        assert!(!oracle.is_d_separated(1, 2, &VariableSet::new(&[4])));
        assert!(!oracle.is_d_separated(1, 4, &VariableSet::empty()));
        assert!(oracle.is_d_separated(1, 4, &VariableSet::new(&[3])));
    }

    #[test]
    fn chains_and_forks_block_when_observed() {
        // 1 <- 2 -> 3 -> 4
        let mut dag = Graph::new(&[1u8, 2, 3, 4]);
        dag.add_directed_edge(2, 1).unwrap();
        dag.add_directed_edge(2, 3).unwrap();
        dag.add_directed_edge(3, 4).unwrap();
        let oracle = DSeparation::new(dag).unwrap();
        assert!(!oracle.is_d_separated(1, 4, &VariableSet::empty()));
        assert!(oracle.is_d_separated(1, 4, &VariableSet::new(&[2])));
        assert!(oracle.is_d_separated(1, 4, &VariableSet::new(&[3])));
        assert!(oracle.is_d_separated(1, 3, &VariableSet::new(&[2])));
    }

    #[test]
    fn refuses_cyclic_or_undirected_graphs() {
        let mut g = Graph::new(&[1u8, 2]);
        g.add_undirected_edge(1, 2).unwrap();
        assert!(matches!(DSeparation::new(g), Err(Error::NotADag)));
    }

    #[test]
    fn unknown_variables_are_test_errors() {
        let oracle = collider();
        assert!(matches!(
            oracle.test(1, 9, &VariableSet::empty()),
            Err(TestError::UnknownVariable(_))
        ));
    }

    fn strongly_related() -> Table<u8> {
        let mut table = Table::new();
        table
            .add_cell(VariableSet::new(&[]), 50.0)
            .add_cell(VariableSet::new(&[1, 2]), 50.0)
            .add_cell(VariableSet::new(&[1]), 5.0)
            .add_cell(VariableSet::new(&[2]), 5.0);
        table
    }

    #[test]
    fn g_square_detects_dependence() {
        let test = GSquareTest::new(strongly_related(), 0.01).unwrap();
        let (g, df) = test.statistic(1, 2, &VariableSet::empty()).unwrap();
        assert_eq!(df, 1.0);
        assert!(g > 50.0);
        assert!(test.p_value(1, 2, &VariableSet::empty()).unwrap() < 1e-6);
    }

    #[test]
    fn g_square_accepts_balanced_independence() {
        let mut table = Table::new();
        table
            .add_cell(VariableSet::new(&[]), 25.0)
            .add_cell(VariableSet::new(&[1u8]), 25.0)
            .add_cell(VariableSet::new(&[2]), 25.0)
            .add_cell(VariableSet::new(&[1, 2]), 25.0);
        let test = GSquareTest::new(table, 0.05).unwrap();
        let (g, _) = test.statistic(1, 2, &VariableSet::empty()).unwrap();
        assert!(g.abs() < 1e-9);
        assert_eq!(
            test.test(1, 2, &VariableSet::empty()).unwrap(),
            Judgement::Independent
        );
    }

    #[test]
    fn g_square_without_degrees_of_freedom_is_independent() {
        let mut table = Table::new();
        table.add_cell(VariableSet::new(&[1u8]), 10.0);
        let test = GSquareTest::new(table, 0.05).unwrap();
        assert_eq!(test.p_value(1, 2, &VariableSet::empty()).unwrap(), 1.0);
    }

    #[test]
    fn g_square_rejects_bad_inputs() {
        assert!(matches!(
            GSquareTest::new(strongly_related(), 1.5),
            Err(Error::InvalidAlpha(_))
        ));
        let empty = GSquareTest::<u8>::new(Table::new(), 0.05).unwrap();
        assert!(matches!(
            empty.test(1, 2, &VariableSet::empty()),
            Err(TestError::EmptyData)
        ));
    }
}
