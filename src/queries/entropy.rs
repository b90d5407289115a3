//! Entropies of the binning posterior.
//!
//! Both quantities are posterior expectations of a per-bin value and are
//! computed with the ratio extension, so they need an evaluator with exact
//! per-order sums.

use crate::error::Result;
use crate::model::{AddEvent, DirichletModel};
use crate::parallel::fan_out;
use crate::prombs::Prombs;
use crate::queries::utility::Positions;
use crate::queries::Evaluator;
use crate::traits::BinScore;

/// Entropy of the posterior over multibins,
/// `H = ln Z − Σ_k P(k | D) g[k] − E[Σ_b f(b)]`.
pub fn multibin_entropy(
    eval: &Evaluator<'_>,
    model: &DirichletModel<'_>,
    prior: &[f64],
    epsilon: f64,
) -> Result<f64> {
    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!("multibin_entropy", algorithm = eval.name());
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut scratch = eval.scratch();
    let orders = eval.orders(&mut scratch, model)?;
    let ln_z = orders.log_sum_where(|k| prior[k] > f64::NEG_INFINITY);
    if ln_z == f64::NEG_INFINITY {
        return Ok(0.0);
    }
    let prior_term: f64 = orders
        .iter()
        .filter(|&(k, v)| prior[k] > f64::NEG_INFINITY && v > f64::NEG_INFINITY)
        .map(|(k, v)| (v - ln_z).exp() * prior[k])
        .sum();
    let score = |i: usize, j: usize| model.score(i, j);
    let mean_score = eval.expectation(&mut scratch, model, &score, epsilon)?;
    Ok(ln_z - prior_term - mean_score)
}

/// Expected sum of the bins' posterior differential entropies, `E[Σ_b H(b)]`.
pub fn differential_entropy(
    eval: &Evaluator<'_>,
    scratch: &mut Prombs,
    model: &DirichletModel<'_>,
    epsilon: f64,
) -> Result<f64> {
    let h = |i: usize, j: usize| model.bin_entropy(i, j);
    eval.expectation(scratch, model, &h, epsilon)
}

/// Expected reduction of the differential entropy when one more event is
/// observed at each position, weighted by the predictive `expectation`.
pub(crate) fn entropy_utility(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
    expectation: &[Vec<f64>],
    epsilon: f64,
) -> Result<Vec<f64>> {
    let mut scratch = eval.scratch();
    let current = differential_entropy(eval, &mut scratch, model, epsilon)?;
    let at = |pos: usize, slot: usize, scratch: &mut Prombs| -> Result<f64> {
        let mut u = current;
        for (e, x) in expectation.iter().enumerate() {
            if x[slot] == 0.0 {
                continue;
            }
            let added = model.with_event(AddEvent { pos, n: 1.0, which: e });
            u -= x[slot] * differential_entropy(eval, scratch, &added, epsilon)?;
        }
        Ok(u)
    };
    match positions {
        Positions::All { threads } => fan_out(
            eval.len(),
            threads,
            || eval.scratch(),
            |pos, scratch| at(pos, pos, scratch),
        ),
        Positions::One(pos) => Ok(vec![at(pos, 0, &mut scratch)?]),
    }
}
