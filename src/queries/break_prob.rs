//! Posterior probability that a bin starts at a position.

use crate::error::Result;
use crate::parallel::fan_out;
use crate::queries::{ratio_to_linear, Evaluator};
use crate::traits::BinScore;

/// `f` with every bin that crosses the boundary before `pos` forbidden, i.e.
/// bins `[i, j]` with `i < pos <= j`.
pub struct BreakAt<'a, S: ?Sized> {
    pub base: &'a S,
    pub pos: usize,
}

impl<S: BinScore + ?Sized> BinScore for BreakAt<'_, S> {
    #[inline]
    fn score(&self, from: usize, to: usize) -> f64 {
        if from < self.pos && self.pos <= to {
            f64::NEG_INFINITY
        } else {
            self.base.score(from, to)
        }
    }
}

/// Break probability at every position. Position 0 always starts a bin.
pub fn break_probabilities<S>(eval: &Evaluator<'_>, threads: usize, f: &S) -> Result<Vec<f64>>
where
    S: BinScore + Sync + ?Sized,
{
    match eval {
        Evaluator::Sampler(s) => Ok(s.break_probabilities()),
        Evaluator::Hmm(h) => Ok(h.break_probabilities()),
        _ => fan_out(
            eval.len(),
            threads,
            || eval.scratch(),
            |pos, scratch| {
                if pos == 0 {
                    return Ok(1.0);
                }
                let q = BreakAt { base: f, pos };
                Ok(ratio_to_linear(eval.log_ratio(scratch, f, &q)?))
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prombs::prombs;

    #[test]
    fn uniform_partitions_break_half_the_time() {
        let f = |_: usize, _: usize| 0.0;
        let prior = vec![0.0; 5];
        let evidence = prombs(&f, &prior, 4).unwrap().log_sum();
        let eval = Evaluator::Exact {
            prior: &prior,
            cutoff: 4,
            evidence,
        };
        let bp = break_probabilities(&eval, 1, &f).unwrap();
        assert_eq!(bp[0], 1.0);
        for p in &bp[1..] {
            assert!((p - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn single_bin_prior_never_breaks() {
        let f = |i: usize, j: usize| -((j - i) as f64);
        let prior = vec![0.0, f64::NEG_INFINITY, f64::NEG_INFINITY];
        let evidence = prombs(&f, &prior, 0).unwrap().log_sum();
        let eval = Evaluator::Tree {
            prior: &prior,
            cutoff: 0,
            evidence,
        };
        assert_eq!(break_probabilities(&eval, 1, &f).unwrap(), vec![1.0, 0.0, 0.0]);
    }
}
