//! Non-recursive generators for the index tuples a search needs: combinations for conditioning
//! sets, and odometer-style products and selections.
//!
//! Each generator hands out a borrowed view of its internal buffer from `next`, so the borrow
//! checker is what stops a caller from holding on to a tuple while asking for the following one.
//! Copy it (`to_vec`) to keep it. Generators can't be rewound; build a new one instead.

use crate::error::{Error, Result};

/// Every way of choosing `k` of `n` items, as strictly increasing index arrays in lexicographic
/// order.
///
/// ```
/// use stable_adjacency::Combinations;
///
/// let mut choices = Combinations::new(4, 2).unwrap();
/// let mut seen = Vec::new();
/// while let Some(choice) = choices.next() {
///     seen.push(choice.to_vec());
/// }
/// assert_eq!(
///     seen,
///     [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]],
/// );
/// ```
///
/// Choosing nothing still produces one (empty) choice:
///
/// ```
/// use stable_adjacency::Combinations;
///
/// let mut choices = Combinations::new(3, 0).unwrap();
/// assert_eq!(choices.next(), Some(&[][..]));
/// assert_eq!(choices.next(), None);
/// ```
#[derive(Clone, Debug)]
pub struct Combinations {
    n: usize,
    choice: Vec<usize>,
    begun: bool,
}

impl Combinations {
    /// Creates a generator for `n` choose `k`.
    ///
    /// Fails if `k > n`, since there is no way to make such a choice.
    pub fn new(n: usize, k: usize) -> Result<Self> {
        if k > n {
            return Err(Error::InvalidChoice { n, k });
        }
        Ok(Combinations {
            n,
            choice: (0..k).collect(),
            begun: false,
        })
    }

    /// Returns the next choice, or `None` once every choice has been produced.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[usize]> {
        if !self.begun {
            self.begun = true;
            return Some(&self.choice);
        }

        // Position i can hold at most n - k + i, which leaves room for the positions after it.
        let k = self.choice.len();
        let slack = self.n - k;
        let at = (0..k).rev().find(|&i| self.choice[i] < slack + i)?;
        self.choice[at] += 1;
        for i in at + 1..k {
            self.choice[i] = self.choice[i - 1] + 1;
        }
        Some(&self.choice)
    }
}

/// Every tuple whose `i`-th entry ranges over `0..dims[i]`, in odometer order: the last entry
/// changes fastest.
///
/// ```
/// use stable_adjacency::Product;
///
/// let mut tuples = Product::new(&[2, 3]);
/// let mut seen = Vec::new();
/// while let Some(tuple) = tuples.next() {
///     seen.push(tuple.to_vec());
/// }
/// assert_eq!(seen, [[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]);
/// ```
#[derive(Clone, Debug)]
pub struct Product {
    dims: Vec<usize>,
    tuple: Vec<usize>,
    begun: bool,
}

impl Product {
    /// Creates a generator over the given dimensions.
    ///
    /// No dimensions at all yields a single empty tuple; any zero-sized dimension yields nothing.
    pub fn new(dims: &[usize]) -> Self {
        Product {
            dims: dims.to_vec(),
            tuple: vec![0; dims.len()],
            begun: false,
        }
    }

    /// Returns the next tuple, or `None` once every tuple has been produced.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[usize]> {
        if !self.begun {
            self.begun = true;
            if self.dims.contains(&0) {
                return None;
            }
            return Some(&self.tuple);
        }

        let at = (0..self.tuple.len())
            .rev()
            .find(|&i| self.tuple[i] + 1 < self.dims[i])?;
        self.tuple[at] += 1;
        for entry in &mut self.tuple[at + 1..] {
            *entry = 0;
        }
        Some(&self.tuple)
    }
}

/// Every length-`n` tuple of indices in `0..n`, with repetition, in odometer order.
///
/// For `n > 0` that is `n.pow(n)` tuples; for `n == 0` it is one empty tuple.
///
/// ```
/// use stable_adjacency::Selections;
///
/// let mut selections = Selections::new(2);
/// let mut seen = Vec::new();
/// while let Some(selection) = selections.next() {
///     seen.push(selection.to_vec());
/// }
/// assert_eq!(seen, [[0, 0], [0, 1], [1, 0], [1, 1]]);
/// ```
#[derive(Clone, Debug)]
pub struct Selections(Product);

impl Selections {
    /// Creates a generator for selections from `n` items.
    pub fn new(n: usize) -> Self {
        Selections(Product::new(&vec![n; n]))
    }

    /// Returns the next selection, or `None` once every selection has been produced.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[usize]> {
        self.0.next()
    }
}

/// The number of ways to choose `k` of `n` items, or 0 if `k > n`.
///
/// ```
/// use stable_adjacency::combination_count;
///
/// assert_eq!(combination_count(5, 2), 10);
/// assert_eq!(combination_count(5, 0), 1);
/// assert_eq!(combination_count(2, 5), 0);
/// ```
pub fn combination_count(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    // Each partial product is itself a binomial coefficient, so the division is always exact.
    (0..k).fold(1u128, |count, i| count * (n - i) as u128 / (i + 1) as u128)
}
