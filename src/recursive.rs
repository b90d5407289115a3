//! Top-down memoized partition sum.
//!
//! `R(j)` is the log-sum over every partition of `[0, j]`, regardless of the
//! number of bins:
//!
//! ```text
//! R(j) = logadd(f(0, j), logsum_{i < j} R(i) + f(i+1, j))
//! ```
//!
//! No model prior and no order pruning are applied, so `R(L-1)` equals the
//! DP evidence under a prior of zero on every order. The recursion is driven
//! by an explicit stack.

use crate::logspace::logadd;
use crate::traits::BinScore;

struct Frame {
    j: usize,
    /// Next dependency `R(next)` to check.
    next: usize,
}

/// `R(len - 1)`, or `-∞` for an empty sequence.
pub fn prombs_rec<S: BinScore + ?Sized>(len: usize, f: &S) -> f64 {
    if len == 0 {
        return f64::NEG_INFINITY;
    }
    let mut memo: Vec<Option<f64>> = vec![None; len];
    let mut stack = vec![Frame { j: len - 1, next: 0 }];

    while let Some(top) = stack.last_mut() {
        while top.next < top.j && memo[top.next].is_some() {
            top.next += 1;
        }
        if top.next < top.j {
            let dep = top.next;
            stack.push(Frame { j: dep, next: 0 });
            continue;
        }
        let j = top.j;
        let mut acc = f.score(0, j);
        for (i, r) in memo.iter().enumerate().take(j) {
            if let Some(r) = r {
                acc = logadd(acc, r + f.score(i + 1, j));
            }
        }
        memo[j] = Some(acc);
        stack.pop();
    }
    memo[len - 1].unwrap_or(f64::NEG_INFINITY)
}
