//! Posterior moments of the event probability at each position.
//!
//! The `n`-th moment of `p_which` at `pos` is the ratio of the evidence with
//! `n` extra events of type `which` injected at `pos` to the plain evidence.

use crate::error::Result;
use crate::model::{AddEvent, DirichletModel};
use crate::queries::{ratio_to_linear, Evaluator};
use crate::traits::BinScore;

/// Covering-bin score with `n` events of `which` added.
pub(crate) fn with_events(model: &DirichletModel<'_>, from: usize, to: usize, n: f64, which: usize) -> f64 {
    model
        .with_event(AddEvent { pos: from, n, which })
        .score(from, to)
}

/// `moments[n - 1][pos] = E[p_which^n | D]` for `n = 1..=n_moments`.
pub fn moments(
    eval: &Evaluator<'_>,
    threads: usize,
    model: &DirichletModel<'_>,
    n_moments: usize,
    which: usize,
) -> Result<Vec<Vec<f64>>> {
    model.data().check_event(which)?;
    let mut out = Vec::with_capacity(n_moments);
    for n in 1..=n_moments {
        #[cfg(feature = "tracing")]
        tracing::debug!(moment = n, total = n_moments, "computing moment");
        let q = |i: usize, j: usize| with_events(model, i, j, n as f64, which);
        let logs = eval.per_position(threads, model, &q)?;
        out.push(logs.into_iter().map(ratio_to_linear).collect());
    }
    Ok(out)
}
