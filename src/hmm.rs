//! Forward–backward inference under a geometric break prior.
//!
//! Instead of a prior over the number of bins, each step from one position to
//! the next stays in the current bin with probability `ρ` and opens a new
//! bin with probability `1 − ρ`. A partition with bins of lengths
//! `n_1, …, n_m` therefore has prior `Π ρ^(n_b − 1) · (1 − ρ)^(m − 1)`.
//!
//! `α[j]` sums over partitions of `[0, j]` whose last bin ends at `j`, and
//! `β[j]` over partitions of `[j, L−1]` whose first bin starts at `j`. Queries
//! then swap the score of the bin covering a position for a query score,
//! mirroring the selectors of the DP path.

use crate::error::{BinningError, Result};
use crate::logspace::logadd;
use crate::traits::BinScore;

/// Forward and backward sums of one scoring function.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HmmBinning {
    rho: f64,
    ln_rho: f64,
    ln_break: f64,
    forward: Vec<f64>,
    backward: Vec<f64>,
}

impl HmmBinning {
    /// Run the forward and backward passes for `len` positions.
    pub fn new<S: BinScore + ?Sized>(f: &S, len: usize, rho: f64) -> Result<Self> {
        if !(rho > 0.0 && rho < 1.0) {
            return Err(BinningError::option(
                "rho",
                format!("must lie strictly between 0 and 1, got {rho}"),
            ));
        }
        if len == 0 {
            return Err(BinningError::dimension("sequence", "at least 1 position", 0));
        }
        #[cfg(feature = "tracing")]
        let span = tracing::info_span!("hmm_forward_backward", len, rho);
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let mut hmm = Self {
            rho,
            ln_rho: rho.ln(),
            ln_break: (-rho).ln_1p(),
            forward: vec![f64::NEG_INFINITY; len],
            backward: vec![f64::NEG_INFINITY; len],
        };
        for j in 0..len {
            hmm.forward[j] = hmm.forward_through(j, j, f);
        }
        for j in (0..len).rev() {
            let mut acc = hmm.ln_pow(len - j - 1) + f.score(j, len - 1);
            for k in (j + 1)..len {
                acc = logadd(
                    acc,
                    hmm.ln_pow(k - 1 - j) + hmm.ln_break + hmm.backward[k] + f.score(j, k - 1),
                );
            }
            hmm.backward[j] = acc;
        }
        Ok(hmm)
    }

    #[inline]
    fn ln_pow(&self, n: usize) -> f64 {
        if n == 0 {
            0.0
        } else {
            n as f64 * self.ln_rho
        }
    }

    /// Log-sum over partitions of `[0, to]` whose last bin covers `j`, scored
    /// by `q`.
    fn forward_through<Q: BinScore + ?Sized>(&self, j: usize, to: usize, q: &Q) -> f64 {
        let mut acc = self.ln_pow(to) + q.score(0, to);
        for k in 0..j {
            acc = logadd(
                acc,
                self.ln_pow(to - k - 1) + self.ln_break + self.forward[k] + q.score(k + 1, to),
            );
        }
        acc
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn forward(&self) -> &[f64] {
        &self.forward
    }

    pub fn backward(&self) -> &[f64] {
        &self.backward
    }

    /// `ln P(D) = α[L−1] = β[0]`.
    pub fn evidence(&self) -> f64 {
        self.forward[self.len() - 1]
    }

    /// For each position `j`, the log of the posterior expectation of
    /// `exp(q(b) − f(b))` for the bin `b` covering `j`.
    ///
    /// Every entry is `-∞` when no partition carries weight.
    pub fn forward_backward<Q: BinScore + ?Sized>(&self, q: &Q) -> Vec<f64> {
        (0..self.len()).map(|j| self.at_position(j, q)).collect()
    }

    /// Entry `j` of [`HmmBinning::forward_backward`].
    ///
    /// # Panics
    /// Panics if `j >= self.len()`.
    pub fn at_position<Q: BinScore + ?Sized>(&self, j: usize, q: &Q) -> f64 {
        let l = self.len();
        assert!(j < l, "position {j} out of range for {l} positions");
        let evidence = self.evidence();
        if evidence == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        let mut acc = self.forward_through(j, l - 1, q);
        for k in (j + 1)..l {
            acc = logadd(
                acc,
                self.ln_break + self.forward_through(j, k - 1, q) + self.backward[k],
            );
        }
        acc - evidence
    }

    /// Posterior probability that a bin starts at each position.
    ///
    /// Position 0 always starts a bin; the rest are 0 when no partition
    /// carries weight.
    pub fn break_probabilities(&self) -> Vec<f64> {
        let evidence = self.evidence();
        (0..self.len())
            .map(|pos| {
                if pos == 0 {
                    1.0
                } else if evidence == f64::NEG_INFINITY {
                    0.0
                } else {
                    (self.forward[pos - 1] + self.ln_break + self.backward[pos] - evidence).exp()
                }
            })
            .collect()
    }
}
