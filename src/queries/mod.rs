//! Posterior queries built on the partition sums.
//!
//! Every query is a scoring strategy: it swaps the score of some bins for a
//! query score and compares the resulting partition sum with the evidence.
//! [`Evaluator`] hides which algorithm computes those sums, and
//! [`Evaluator::per_position`] fans a position-indexed query out over the
//! worker threads.

pub mod break_prob;
pub mod density;
pub mod entropy;
pub mod evidence;
pub mod moment;
pub mod utility;

use crate::error::{BinningError, Result};
use crate::hmm::HmmBinning;
use crate::logspace::OrderVector;
use crate::mgs::MultibinSampler;
use crate::options::Algorithm;
use crate::parallel::fan_out;
use crate::prombs::{expectation_by, Prombs};
use crate::traits::{BinScore, BinValue};
use crate::tree::prombs_tree;

/// Score `query` on bins covering `pos`, `base` elsewhere.
pub struct AtPosition<'a, B: ?Sized, Q: ?Sized> {
    pub base: &'a B,
    pub query: &'a Q,
    pub pos: usize,
}

impl<B, Q> BinScore for AtPosition<'_, B, Q>
where
    B: BinScore + ?Sized,
    Q: BinScore + ?Sized,
{
    #[inline]
    fn score(&self, from: usize, to: usize) -> f64 {
        if from <= self.pos && self.pos <= to {
            self.query.score(from, to)
        } else {
            self.base.score(from, to)
        }
    }
}

/// `q − f` per bin, so that averaging `exp(Σ_b)` over posterior samples of
/// `f` estimates `Z_q / Z_f`.
struct Ratio<'a, B: ?Sized, Q: ?Sized> {
    base: &'a B,
    query: &'a Q,
}

impl<B, Q> BinScore for Ratio<'_, B, Q>
where
    B: BinScore + ?Sized,
    Q: BinScore + ?Sized,
{
    fn score(&self, from: usize, to: usize) -> f64 {
        let b = self.base.score(from, to);
        if b == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        self.query.score(from, to) - b
    }
}

/// Backend computing partition sums for the queries.
#[derive(Clone, Copy, Debug)]
pub enum Evaluator<'a> {
    /// Forward DP with per-worker scratch.
    Exact {
        prior: &'a [f64],
        cutoff: usize,
        evidence: f64,
    },
    /// Depth-first enumeration.
    Tree {
        prior: &'a [f64],
        cutoff: usize,
        evidence: f64,
    },
    /// Averages over retained multibin samples.
    Sampler(&'a MultibinSampler),
    /// Forward–backward under the geometric prior.
    Hmm(&'a HmmBinning),
}

impl<'a> Evaluator<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            Evaluator::Exact { .. } => Algorithm::Exact.name(),
            Evaluator::Tree { .. } => Algorithm::Tree.name(),
            Evaluator::Sampler(_) => Algorithm::Sampler.name(),
            Evaluator::Hmm(_) => "hmm",
        }
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        match self {
            Evaluator::Exact { prior, .. } | Evaluator::Tree { prior, .. } => prior.len(),
            Evaluator::Sampler(s) => s.len(),
            Evaluator::Hmm(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `ln P(D)`; not available from samples.
    pub fn evidence(&self) -> Option<f64> {
        match self {
            Evaluator::Exact { evidence, .. } | Evaluator::Tree { evidence, .. } => Some(*evidence),
            Evaluator::Sampler(_) => None,
            Evaluator::Hmm(h) => Some(h.evidence()),
        }
    }

    /// Fresh scratch for one worker.
    pub fn scratch(&self) -> Prombs {
        match self {
            Evaluator::Exact { prior, .. } => Prombs::new(prior.len()),
            _ => Prombs::new(0),
        }
    }

    fn unsupported(&self, query: &'static str) -> BinningError {
        BinningError::Unsupported {
            query,
            algorithm: self.name(),
        }
    }

    /// Per-order sums for score `q` (exact and tree only).
    pub fn orders<Q: BinScore + ?Sized>(&self, scratch: &mut Prombs, q: &Q) -> Result<OrderVector> {
        match *self {
            Evaluator::Exact { prior, cutoff, .. } => scratch.run(q, prior, cutoff),
            Evaluator::Tree { prior, cutoff, .. } => prombs_tree(q, prior, cutoff),
            _ => Err(self.unsupported("per-order partition sums")),
        }
    }

    /// `ln(Z_q / Z_f)` where `Z` sums over every partition with prior mass.
    pub fn log_ratio<B, Q>(&self, scratch: &mut Prombs, base: &B, q: &Q) -> Result<f64>
    where
        B: BinScore + ?Sized,
        Q: BinScore + ?Sized,
    {
        match *self {
            Evaluator::Exact { prior, evidence, .. } | Evaluator::Tree { prior, evidence, .. } => {
                if evidence == f64::NEG_INFINITY {
                    return Ok(f64::NEG_INFINITY);
                }
                let r = self.orders(scratch, q)?;
                Ok(r.log_sum_where(|k| prior[k] > f64::NEG_INFINITY) - evidence)
            }
            Evaluator::Sampler(s) => Ok(s.evaluate(&Ratio { base, query: q }).log_sum()),
            Evaluator::Hmm(h) => {
                if h.evidence() == f64::NEG_INFINITY {
                    return Ok(f64::NEG_INFINITY);
                }
                let other = HmmBinning::new(q, h.len(), h.rho())?;
                Ok(other.evidence() - h.evidence())
            }
        }
    }

    /// For every position `pos`, `ln(Z_{q@pos} / Z_f)` where `q` replaces the
    /// score of the bins covering `pos`.
    pub fn per_position<B, Q>(&self, threads: usize, base: &B, query: &Q) -> Result<Vec<f64>>
    where
        B: BinScore + Sync + ?Sized,
        Q: BinScore + Sync + ?Sized,
    {
        if let Evaluator::Hmm(h) = self {
            return fan_out(h.len(), threads, || (), |pos, _| Ok(h.at_position(pos, query)));
        }
        fan_out(
            self.len(),
            threads,
            || self.scratch(),
            |pos, scratch| {
                let q = AtPosition { base, query, pos };
                self.log_ratio(scratch, base, &q)
            },
        )
    }

    /// [`Evaluator::per_position`] for a single position.
    pub fn at<B, Q>(&self, pos: usize, base: &B, query: &Q) -> Result<f64>
    where
        B: BinScore + ?Sized,
        Q: BinScore + ?Sized,
    {
        let len = self.len();
        if pos >= len {
            return Err(BinningError::dimension(
                "position",
                format!("less than {len}"),
                pos,
            ));
        }
        if let Evaluator::Hmm(h) = self {
            return Ok(h.at_position(pos, query));
        }
        let mut scratch = self.scratch();
        self.log_ratio(&mut scratch, base, &AtPosition { base, query, pos })
    }

    /// Posterior expectation of `Σ_b h(b)` under score `f` (exact and tree
    /// only).
    pub fn expectation<S, H>(&self, scratch: &mut Prombs, f: &S, h: &H, epsilon: f64) -> Result<f64>
    where
        S: BinScore + ?Sized,
        H: BinValue + ?Sized,
    {
        match *self {
            Evaluator::Exact { prior, cutoff, .. } => {
                expectation_by(|s| scratch.run(s, prior, cutoff), f, h, prior, epsilon)
            }
            Evaluator::Tree { prior, cutoff, .. } => {
                expectation_by(|s| prombs_tree(s, prior, cutoff), f, h, prior, epsilon)
            }
            _ => Err(self.unsupported("ratio-extension expectation")),
        }
    }
}

/// `exp(x)`, with `-∞` and NaN mapped to 0.
pub(crate) fn ratio_to_linear(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prombs::prombs;

    fn f(i: usize, j: usize) -> f64 {
        -0.3 * ((j - i + 1) as f64) - (i % 2) as f64 * 0.1
    }

    #[test]
    fn exact_and_tree_agree_per_position() {
        let prior = vec![0.0; 5];
        let evidence = prombs(&f, &prior, 4).unwrap().log_sum();
        let exact = Evaluator::Exact {
            prior: &prior,
            cutoff: 4,
            evidence,
        };
        let tree = Evaluator::Tree {
            prior: &prior,
            cutoff: 4,
            evidence,
        };
        let q = |i: usize, j: usize| f(i, j) + 0.5;
        let a = exact.per_position(2, &f, &q).unwrap();
        let b = tree.per_position(1, &f, &q).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-10);
            // Exactly one bin covers each position.
            assert!((x - 0.5).abs() < 1e-10);
        }
    }

    #[test]
    fn sampler_ratio_matches_exact_for_constant_shift() {
        let prior = vec![0.0; 4];
        let s = MultibinSampler::sample(&f, &prior, 10, 200, 1).unwrap();
        let eval = Evaluator::Sampler(&s);
        let q = |i: usize, j: usize| f(i, j) + 0.25;
        let mut scratch = eval.scratch();
        // Every partition gains exactly one shifted bin at position 0.
        let at0 = AtPosition {
            base: &f,
            query: &q,
            pos: 0,
        };
        let r = eval.log_ratio(&mut scratch, &f, &at0).unwrap();
        assert!((r - 0.25).abs() < 1e-10);
        assert_eq!(eval.evidence(), None);
        assert!(matches!(
            eval.expectation(&mut scratch, &f, &|_: usize, _: usize| 1.0, 1e-5),
            Err(BinningError::Unsupported { .. })
        ));
    }

    #[test]
    fn hmm_ratio_of_identical_scores_is_zero() {
        let h = HmmBinning::new(&f, 4, 0.5).unwrap();
        let eval = Evaluator::Hmm(&h);
        let mut scratch = eval.scratch();
        assert!(eval.log_ratio(&mut scratch, &f, &f).unwrap().abs() < 1e-12);
        assert!(eval.per_position(1, &f, &f).unwrap().iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn hmm_positions_agree_across_threads() {
        let h = HmmBinning::new(&f, 6, 0.3).unwrap();
        let eval = Evaluator::Hmm(&h);
        let q = |i: usize, j: usize| f(i, j) - 0.1 * (j - i) as f64;
        let one = eval.per_position(1, &f, &q).unwrap();
        let three = eval.per_position(3, &f, &q).unwrap();
        assert_eq!(one, three);
        assert_eq!(eval.at(4, &f, &q).unwrap(), one[4]);
        assert!(eval.at(6, &f, &q).is_err());
    }

    #[test]
    fn hmm_without_weight_reports_log_zero() {
        let forbidden = |_: usize, _: usize| f64::NEG_INFINITY;
        let h = HmmBinning::new(&forbidden, 3, 0.5).unwrap();
        let eval = Evaluator::Hmm(&h);
        let mut scratch = eval.scratch();
        let q = |_: usize, _: usize| 0.0;
        assert_eq!(eval.log_ratio(&mut scratch, &forbidden, &q).unwrap(), f64::NEG_INFINITY);
        assert!(eval
            .per_position(2, &forbidden, &q)
            .unwrap()
            .iter()
            .all(|&v| v == f64::NEG_INFINITY));
    }

    #[test]
    fn conversions() {
        assert_eq!(ratio_to_linear(f64::NEG_INFINITY), 0.0);
        assert_eq!(ratio_to_linear(f64::NAN), 0.0);
    }
}
