//! Exact partition sums over contiguous binnings.
//!
//! For a sequence of `L` positions, [`Prombs::run`] computes for every model
//! order `k` the log-sum over all partitions into exactly `k + 1` contiguous
//! bins of the product of bin weights:
//!
//! ```text
//! S_0(j) = f(0, j)
//! S_k(j) = logsum_{i = k-1}^{j-1} S_{k-1}(i) + f(i+1, j)
//! result[k] = S_k(L-1) + g[k]
//! ```
//!
//! Orders above the cutoff are pruned. When the prior gives them zero mass
//! this is exact, since their contribution is zero whatever their evidence.
//!
//! The ratio extension ([`Prombs::run_ext`]) layers the epsilon-perturbation
//! trick on the same recurrence to compute `Σ_p w(p) · Σ_{b ∈ p} h(b)` per
//! order without dividing two nearly equal sums.

use crate::error::{BinningError, Result};
use crate::logspace::{logadd, logsub, OrderVector};
use crate::traits::{BinScore, BinValue, Perturbed};

/// Reusable DP engine owning its work matrix.
///
/// One instance is the private scratch of a single worker: it is filled
/// completely on every run, so results never depend on what it computed
/// before.
///
/// ```
/// use bayes_binning::prombs::Prombs;
///
/// // Four positions, every bin weighs 1: 2^3 partitions in total.
/// let mut engine = Prombs::new(4);
/// let result = engine.run(&|_i: usize, _j: usize| 0.0, &[0.0; 4], 3).unwrap();
/// assert!((result.log_sum() - 8f64.ln()).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct Prombs {
    len: usize,
    ak: Vec<f64>,
    prev: Vec<f64>,
    cur: Vec<f64>,
}

impl Prombs {
    /// Allocate scratch for sequences of `len` positions.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ak: vec![f64::NEG_INFINITY; len * len],
            prev: vec![f64::NEG_INFINITY; len],
            cur: vec![f64::NEG_INFINITY; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Per-order log partition sums for score `f`, log prior `prior` and
    /// largest computed order `cutoff`.
    pub fn run<S: BinScore + ?Sized>(
        &mut self,
        f: &S,
        prior: &[f64],
        cutoff: usize,
    ) -> Result<OrderVector> {
        let l = self.len;
        if prior.len() != l {
            return Err(BinningError::dimension("prior", l, prior.len()));
        }
        let mut result = OrderVector::zeros(l, cutoff);
        if l == 0 {
            return Ok(result);
        }
        let m = result.cutoff();
        #[cfg(feature = "tracing")]
        let span = tracing::trace_span!("prombs", len = l, cutoff = m);
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        for i in 0..l {
            for j in i..l {
                self.ak[i * l + j] = f.score(i, j);
            }
        }
        self.prev.copy_from_slice(&self.ak[..l]);
        result.set(0, self.prev[l - 1] + prior[0]);

        for k in 1..=m {
            self.cur[..k].fill(f64::NEG_INFINITY);
            for j in k..l {
                let mut acc = f64::NEG_INFINITY;
                for i in (k - 1)..j {
                    acc = logadd(acc, self.prev[i] + self.ak[(i + 1) * l + j]);
                }
                self.cur[j] = acc;
            }
            std::mem::swap(&mut self.prev, &mut self.cur);
            result.set(k, self.prev[l - 1] + prior[k]);
        }
        Ok(result)
    }

    /// Ratio extension: per order, the log of `Σ_p w(p) · Σ_{b ∈ p} h(b)`.
    ///
    /// `h` must be non-negative on every admissible bin; split signed values
    /// into two non-negative parts (see [`Prombs::expectation`]).
    pub fn run_ext<S, H>(
        &mut self,
        f: &S,
        h: &H,
        prior: &[f64],
        cutoff: usize,
        epsilon: f64,
    ) -> Result<OrderVector>
    where
        S: BinScore + ?Sized,
        H: BinValue + ?Sized,
    {
        let without = self.run(f, prior, cutoff)?;
        let perturbed = Perturbed {
            score: f,
            value: h,
            epsilon,
        };
        let with = self.run(&perturbed, prior, cutoff)?;
        ratio_extension(&with, &without, epsilon)
    }

    /// Posterior expectation of `Σ_{b ∈ p} h(b)`, for `h` of either sign.
    ///
    /// Orders without prior mass are excluded. Returns `0` when no partition
    /// carries weight.
    pub fn expectation<S, H>(
        &mut self,
        f: &S,
        h: &H,
        prior: &[f64],
        cutoff: usize,
        epsilon: f64,
    ) -> Result<f64>
    where
        S: BinScore + ?Sized,
        H: BinValue + ?Sized,
    {
        expectation_by(|s| self.run(s, prior, cutoff), f, h, prior, epsilon)
    }
}

/// Signed expectation of `Σ_{b ∈ p} h(b)` with any partition-sum runner.
///
/// `h` is split into its positive and negative parts, each handled by the
/// ratio extension, so neither perturbed run can fall below the base run.
/// Orders without prior mass are excluded. Returns `0` when no partition
/// carries weight.
pub fn expectation_by<R, S, H>(mut run: R, f: &S, h: &H, prior: &[f64], epsilon: f64) -> Result<f64>
where
    R: FnMut(&dyn BinScore) -> Result<OrderVector>,
    S: BinScore + ?Sized,
    H: BinValue + ?Sized,
{
    let base = run(&|i: usize, j: usize| f.score(i, j))?;
    let mass = |k: usize| prior[k] > f64::NEG_INFINITY;
    let evidence = base.log_sum_where(mass);
    if evidence == f64::NEG_INFINITY {
        return Ok(0.0);
    }
    let positive = |i: usize, j: usize| h.value(i, j).max(0.0);
    let negative = |i: usize, j: usize| (-h.value(i, j)).max(0.0);
    let mut part = |value: &dyn BinValue| -> Result<f64> {
        let perturbed = Perturbed {
            score: f,
            value,
            epsilon,
        };
        let with = run(&perturbed)?;
        let ext = ratio_extension(&with, &base, epsilon)?;
        Ok((ext.log_sum_where(mass) - evidence).exp())
    };
    Ok(part(&positive)? - part(&negative)?)
}

/// Combine a perturbed and an unperturbed run:
/// `logsub(with, without) − ln ε` per computed order.
///
/// Entries where the perturbation vanished (equal within rounding) map to
/// `-∞`. A perturbed entry clearly below the unperturbed one means `h` was
/// negative somewhere and is reported as [`BinningError::NegativeLogDifference`].
pub fn ratio_extension(
    with: &OrderVector,
    without: &OrderVector,
    epsilon: f64,
) -> Result<OrderVector> {
    if with.len() != without.len() {
        return Err(BinningError::dimension(
            "perturbed result",
            without.len(),
            with.len(),
        ));
    }
    let ln_eps = epsilon.ln();
    let mut result = OrderVector::zeros(without.len(), without.cutoff());
    for (k, b) in without.iter() {
        let a = with.get(k).unwrap_or(f64::NEG_INFINITY);
        let tolerance = 64.0 * f64::EPSILON * b.abs().max(1.0);
        let value = if a == b || (a < b && b - a <= tolerance) {
            f64::NEG_INFINITY
        } else {
            logsub(a, b)? - ln_eps
        };
        result.set(k, value);
    }
    Ok(result)
}

/// One-shot [`Prombs::run`]; the sequence length is taken from `prior`.
pub fn prombs<S: BinScore + ?Sized>(f: &S, prior: &[f64], cutoff: usize) -> Result<OrderVector> {
    Prombs::new(prior.len()).run(f, prior, cutoff)
}

/// One-shot [`Prombs::run_ext`].
pub fn prombs_ext<S, H>(
    f: &S,
    h: &H,
    prior: &[f64],
    cutoff: usize,
    epsilon: f64,
) -> Result<OrderVector>
where
    S: BinScore + ?Sized,
    H: BinValue + ?Sized,
{
    Prombs::new(prior.len()).run_ext(f, h, prior, cutoff, epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width(i: usize, j: usize) -> f64 {
        -((j - i + 1) as f64)
    }

    #[test]
    fn two_positions_worked_example() {
        let r = prombs(&width, &[0.0, 0.0], 1).unwrap();
        assert_eq!(r.get(0), Some(-2.0));
        assert_eq!(r.get(1), Some(-2.0));
        assert!((r.log_sum() - (-2.0 + 2f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn counts_compositions_per_order() {
        // With unit weights, order k sums C(L-1, k) partitions.
        let r = prombs(&|_: usize, _: usize| 0.0, &[0.0; 5], 4).unwrap();
        let binom = [1.0f64, 4.0, 6.0, 4.0, 1.0];
        for (k, v) in r.iter() {
            assert!((v - binom[k].ln()).abs() < 1e-12, "order {k}");
        }
    }

    #[test]
    fn cutoff_prunes_higher_orders() {
        let r = prombs(&|_: usize, _: usize| 0.0, &[0.0; 5], 1).unwrap();
        assert_eq!(r.cutoff(), 1);
        assert_eq!(r.get(2), None);
        assert!((r.log_sum() - 5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn forbidden_bins_never_contribute() {
        // Forbid the single full bin; only the two-bin partition remains.
        let f = |i: usize, j: usize| if i == 0 && j == 1 { f64::NEG_INFINITY } else { 0.0 };
        let r = prombs(&f, &[0.0, 0.0], 1).unwrap();
        assert_eq!(r.get(0), Some(f64::NEG_INFINITY));
        assert_eq!(r.get(1), Some(0.0));
    }

    #[test]
    fn scratch_reuse_is_idempotent() {
        let mut engine = Prombs::new(6);
        let a = engine.run(&width, &[0.0; 6], 5).unwrap();
        let _ = engine.run(&|_: usize, _: usize| 3.0, &[0.0; 6], 2).unwrap();
        let b = engine.run(&width, &[0.0; 6], 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prior_length_is_checked() {
        let mut engine = Prombs::new(3);
        assert!(matches!(
            engine.run(&width, &[0.0; 2], 2),
            Err(BinningError::Dimension { .. })
        ));
    }

    #[test]
    fn extension_of_constant_counts_bins() {
        let c = 0.7;
        let h = |_: usize, _: usize| c;
        let plain = prombs(&width, &[0.0; 4], 3).unwrap();
        let ext = prombs_ext(&width, &h, &[0.0; 4], 3, 1e-6).unwrap();
        for (k, v) in ext.iter() {
            let expected = plain.get(k).unwrap() + (c * (k + 1) as f64).ln();
            assert!((v - expected).abs() < 1e-4, "order {k}: {v} vs {expected}");
        }
    }

    #[test]
    fn extension_of_zero_saturates() {
        let h = |_: usize, _: usize| 0.0;
        let ext = prombs_ext(&width, &h, &[0.0; 3], 2, 1e-5).unwrap();
        assert!(ext.iter().all(|(_, v)| v == f64::NEG_INFINITY));
    }

    #[test]
    fn extension_rejects_negative_values() {
        let h = |_: usize, _: usize| -1.0;
        assert!(matches!(
            prombs_ext(&width, &h, &[0.0; 3], 2, 1e-3),
            Err(BinningError::NegativeLogDifference { .. })
        ));
    }

    #[test]
    fn signed_expectation() {
        // Single-bin model: E[h] is h(0, L-1).
        let mut engine = Prombs::new(3);
        let h = |i: usize, j: usize| if i == 0 && j == 2 { -2.5 } else { 9.0 };
        let e = engine
            .expectation(&width, &h, &[0.0, f64::NEG_INFINITY, f64::NEG_INFINITY], 0, 1e-6)
            .unwrap();
        assert!((e + 2.5).abs() < 1e-4);
    }
}
