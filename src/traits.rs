//! Core trait definitions for per-bin scoring.
//!
//! Every partition-sum algorithm in this crate (the exact DP, the tree
//! enumeration, the recursive form, the multibin sampler and the HMM
//! forward–backward pass) is generic over the same two capabilities:
//! - [`BinScore`]: the log-weight of a single bin `[from, to]`,
//! - [`BinValue`]: a linear-scale per-bin quantity whose sum over the bins of
//!   a partition is averaged by the ratio extension.
//!
//! Closures `Fn(usize, usize) -> f64` implement both traits, so ad-hoc scores
//! can be passed as `&|i, j| ...`.

/// Log-weight of a bin.
///
/// Semantics:
/// - Bins are inclusive intervals `[from, to]` with `from <= to < L`.
/// - The returned value is a natural logarithm; `-∞` forbids the bin.
/// - Implementations must be pure: the algorithms may evaluate the same bin
///   any number of times and from several threads.
pub trait BinScore {
    /// Log-weight of bin `[from, to]`.
    fn score(&self, from: usize, to: usize) -> f64;
}

/// Linear-scale value attached to a bin.
pub trait BinValue {
    /// Value of bin `[from, to]`.
    fn value(&self, from: usize, to: usize) -> f64;
}

impl<F> BinScore for F
where
    F: Fn(usize, usize) -> f64,
{
    #[inline]
    fn score(&self, from: usize, to: usize) -> f64 {
        self(from, to)
    }
}

impl<F> BinValue for F
where
    F: Fn(usize, usize) -> f64,
{
    #[inline]
    fn value(&self, from: usize, to: usize) -> f64 {
        self(from, to)
    }
}

/// Dense `L x L` table of precomputed bin scores or values.
///
/// Only the upper triangle (`from <= to`) is read.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreTable {
    rows: Vec<Vec<f64>>,
}

impl ScoreTable {
    /// Wrap an `L x L` matrix.
    ///
    /// # Panics
    /// Panics if the matrix is not square.
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        let n = rows.len();
        assert!(
            rows.iter().all(|r| r.len() == n),
            "score table must be square"
        );
        Self { rows }
    }

    /// Tabulate `f` over every valid bin of `len` positions.
    pub fn tabulate<S: BinScore + ?Sized>(f: &S, len: usize) -> Self {
        let mut rows = vec![vec![f64::NEG_INFINITY; len]; len];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate().skip(i) {
                *cell = f.score(i, j);
            }
        }
        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl BinScore for ScoreTable {
    #[inline]
    fn score(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }
}

impl BinValue for ScoreTable {
    #[inline]
    fn value(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }
}

/// `f(i, j) + ε·h(i, j)`: the perturbed score used by the ratio extension.
pub struct Perturbed<'a, F: ?Sized, H: ?Sized> {
    pub score: &'a F,
    pub value: &'a H,
    pub epsilon: f64,
}

impl<F, H> BinScore for Perturbed<'_, F, H>
where
    F: BinScore + ?Sized,
    H: BinValue + ?Sized,
{
    #[inline]
    fn score(&self, from: usize, to: usize) -> f64 {
        let base = self.score.score(from, to);
        if base == f64::NEG_INFINITY {
            return base;
        }
        base + self.epsilon * self.value.value(from, to)
    }
}
