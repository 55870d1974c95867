//! Error types for search setup and for independence tests.

use thiserror::Error;

/// Errors raised while configuring or starting a search.
///
/// Every one of these is reported before any independence test runs.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The maximum depth was negative, and not the "unbounded" sentinel.
    #[error("depth must be -1 (unlimited) or >= 0, got {0}")]
    InvalidDepth(i32),

    /// Work could never be split down to an empty chunk.
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    /// A worker pool with no workers was requested.
    #[error("thread count must be at least 1")]
    InvalidThreads,

    /// A combination was requested with more items than are available.
    #[error("cannot choose {k} of {n} items")]
    InvalidChoice {
        /// Number of items available.
        n: usize,
        /// Number of items to choose.
        k: usize,
    },

    /// A significance level outside the open interval (0, 1).
    #[error("significance level must be in (0, 1), got {0}")]
    InvalidAlpha(f64),

    /// The variable list named the same variable twice.
    #[error("variable {0} appears more than once")]
    DuplicateVariable(String),

    /// A variable that is not part of the graph or search.
    #[error("unknown variable {0}")]
    UnknownVariable(String),

    /// An edge from a variable to itself.
    #[error("variable {0} cannot be adjacent to itself")]
    SelfLoop(String),

    /// The graph handed to a d-separation oracle has undirected edges or a directed cycle.
    #[error("graph is not a directed acyclic graph")]
    NotADag,

    /// The worker pool could not be started.
    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A specialized `Result` for search setup.
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized `Result` for independence tests.
pub type TestResult<T> = std::result::Result<T, TestError>;

/// Failures reported by an [`IndependenceTest`][crate::IndependenceTest].
///
/// The search never propagates these; each stage substitutes its own default judgement and keeps
/// going.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TestError {
    /// There is no data to test against.
    #[error("no observations to test against")]
    EmptyData,

    /// The test statistic could not be computed.
    #[error("test did not converge: {0}")]
    NonConvergence(String),

    /// The test was asked about a variable it has never heard of.
    #[error("unknown variable {0}")]
    UnknownVariable(String),
}
