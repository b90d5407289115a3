//! Partition sums by direct enumeration.
//!
//! Walks the binary "break here / continue the bin" decision tree over the
//! `L - 1` candidate boundaries depth first, with an explicit stack so the
//! depth is bounded by heap memory rather than the native call stack.
//! Branches whose break count exceeds the cutoff, or whose weight is already
//! zero, are cut. The cost is exponential in `L`; use it to validate the DP or
//! for small inputs.

use crate::error::{BinningError, Result};
use crate::logspace::{logadd, OrderVector};
use crate::traits::BinScore;

#[derive(Clone, Copy, Debug)]
struct Frame {
    /// First position of the open bin.
    from: usize,
    /// Position currently being decided.
    pos: usize,
    breaks: usize,
    /// Log weight of the bins closed so far.
    partial: f64,
}

/// Same contract as [`crate::prombs::prombs`], computed by enumeration.
pub fn prombs_tree<S: BinScore + ?Sized>(
    f: &S,
    prior: &[f64],
    cutoff: usize,
) -> Result<OrderVector> {
    let l = prior.len();
    let mut result = OrderVector::zeros(l, cutoff);
    if l == 0 {
        return Ok(result);
    }
    let m = result.cutoff();
    #[cfg(feature = "tracing")]
    let span = tracing::trace_span!("prombs_tree", len = l, cutoff = m);
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut sums = vec![f64::NEG_INFINITY; m + 1];
    let mut stack = Vec::with_capacity(l + 1);
    stack.push(Frame {
        from: 0,
        pos: 0,
        breaks: 0,
        partial: 0.0,
    });

    while let Some(frame) = stack.pop() {
        if frame.pos == l - 1 {
            let total = frame.partial + f.score(frame.from, l - 1);
            sums[frame.breaks] = logadd(sums[frame.breaks], total);
            continue;
        }
        stack.push(Frame {
            pos: frame.pos + 1,
            ..frame
        });
        if frame.breaks < m {
            let closed = f.score(frame.from, frame.pos);
            if closed > f64::NEG_INFINITY {
                stack.push(Frame {
                    from: frame.pos + 1,
                    pos: frame.pos + 1,
                    breaks: frame.breaks + 1,
                    partial: frame.partial + closed,
                });
            }
        }
    }

    for (k, s) in sums.into_iter().enumerate() {
        result.set(k, s + prior[k]);
    }
    Ok(result)
}

/// Absolute difference between the DP and the enumerated evidence.
///
/// Both aggregate only the orders the prior gives mass to.
pub fn cross_validate<S: BinScore + ?Sized>(f: &S, prior: &[f64], cutoff: usize) -> Result<f64> {
    let exact = crate::prombs::prombs(f, prior, cutoff)?;
    let tree = prombs_tree(f, prior, cutoff)?;
    if exact.len() != tree.len() {
        return Err(BinningError::dimension("tree result", exact.len(), tree.len()));
    }
    let mass = |k: usize| prior[k] > f64::NEG_INFINITY;
    let a = exact.log_sum_where(mass);
    let b = tree.log_sum_where(mass);
    if a == b {
        return Ok(0.0);
    }
    Ok((a - b).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prombs::prombs;

    #[test]
    fn enumerates_all_partitions() {
        let r = prombs_tree(&|_: usize, _: usize| 0.0, &[0.0; 4], 3).unwrap();
        assert!((r.log_sum() - 8f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn matches_dp_per_order() {
        let f = |i: usize, j: usize| ((i * 7 + j * 3) % 5) as f64 * -0.3;
        let prior = [0.0, -1.0, -0.5, -2.0, -0.1, -0.7];
        for cutoff in 0..6 {
            let dp = prombs(&f, &prior, cutoff).unwrap();
            let tree = prombs_tree(&f, &prior, cutoff).unwrap();
            for (k, v) in dp.iter() {
                let t = tree.get(k).unwrap();
                assert!((v - t).abs() < 1e-10, "cutoff {cutoff}, order {k}");
            }
        }
    }

    #[test]
    fn deep_sequences_do_not_overflow_the_stack() {
        // Cutoff 0 keeps the tree linear, but the depth is still L.
        let l = 50_000;
        let prior = vec![0.0; l];
        let r = prombs_tree(&|i: usize, j: usize| -((j - i) as f64), &prior, 0).unwrap();
        assert_eq!(r.get(0), Some(-((l - 1) as f64)));
    }

    #[test]
    fn cross_validation_agrees() {
        let f = |i: usize, j: usize| -(((j - i + 1) as f64).sqrt());
        let d = cross_validate(&f, &[0.0; 7], 6).unwrap();
        assert!(d < 1e-10);
    }

    #[test]
    fn forbidden_bins_prune_branches() {
        let f = |i: usize, j: usize| if i == j { f64::NEG_INFINITY } else { 0.0 };
        let r = prombs_tree(&f, &[0.0; 4], 3).unwrap();
        // Only [0,3] and [0,1][2,3] avoid singletons.
        assert!((r.log_sum() - 2f64.ln()).abs() < 1e-12);
    }
}
