//! Consistency checks for the partition-sum engine.

use crate::error::Result;
use crate::logspace::OrderVector;
use crate::prombs::Prombs;
use crate::traits::BinScore;

/// Result of [`prombs_self_test`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelfTest {
    /// Per-order sums of the plain DP.
    pub plain: OrderVector,
    /// Per-order sums of the extension with `h = −f`.
    pub extension: OrderVector,
    /// `ln Σ_p Π_b exp f(b)`.
    pub evidence: f64,
    /// `ln Σ_p Π_b exp f(b) · Σ_b (−f(b))`.
    pub extension_total: f64,
}

impl SelfTest {
    /// Posterior mean of `−Σ_b f(b)`.
    pub fn mean(&self) -> f64 {
        (self.extension_total - self.evidence).exp()
    }
}

/// Run the DP and the ratio extension with a flat prior over all orders and
/// `h = −f`.
///
/// `f` must be non-positive wherever it is finite, as for log-probabilities;
/// otherwise the extension reports [`crate::BinningError::NegativeLogDifference`].
pub fn prombs_self_test<S: BinScore + ?Sized>(f: &S, len: usize, epsilon: f64) -> Result<SelfTest> {
    let prior = vec![0.0; len];
    let cutoff = len.saturating_sub(1);
    let mut engine = Prombs::new(len);
    let plain = engine.run(f, &prior, cutoff)?;
    let h = |i: usize, j: usize| -f.score(i, j);
    let extension = engine.run_ext(f, &h, &prior, cutoff, epsilon)?;
    let evidence = plain.log_sum();
    let extension_total = extension.log_sum();
    #[cfg(feature = "tracing")]
    tracing::info!(len, evidence, extension_total, "prombs self test");
    Ok(SelfTest {
        plain,
        extension,
        evidence,
        extension_total,
    })
}
