//! Expected utility of taking one more observation at a position.
//!
//! Besides the utility itself every kind reports the predictive
//! expectation `P(next event = e | D, pos)` for each event type.

use statrs::function::gamma::digamma;

use crate::error::Result;
use crate::model::{AddEvent, DirichletModel};
use crate::options::UtilityKind;
use crate::queries::entropy::entropy_utility;
use crate::queries::moment::with_events;
use crate::queries::{ratio_to_linear, Evaluator};
use crate::traits::BinScore;

/// Positions a utility is evaluated at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Positions {
    /// Every position, fanned out over `threads` workers.
    All { threads: usize },
    One(usize),
}

/// Utility values and per-event predictive expectations.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Utility {
    /// One value per evaluated position.
    pub utility: Vec<f64>,
    /// `expectation[e][i]`: predictive probability of event `e` at the
    /// `i`-th evaluated position.
    pub expectation: Vec<Vec<f64>>,
}

/// Log ratios `ln(Z_{q@pos} / Z_f)` at the requested positions.
pub(crate) fn ratios<Q>(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
    q: &Q,
) -> Result<Vec<f64>>
where
    Q: BinScore + Sync + ?Sized,
{
    match positions {
        Positions::All { threads } => eval.per_position(threads, model, q),
        Positions::One(pos) => Ok(vec![eval.at(pos, model, q)?]),
    }
}

/// Predictive probability of each event at the requested positions.
pub fn expectations(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
) -> Result<Vec<Vec<f64>>> {
    let mut out = Vec::with_capacity(model.data().events());
    for e in 0..model.data().events() {
        let q = |i: usize, j: usize| with_events(model, i, j, 1.0, e);
        let logs = ratios(eval, positions, model, &q)?;
        out.push(logs.into_iter().map(ratio_to_linear).collect());
    }
    Ok(out)
}

/// Covering-bin score with one event `e` added, weighted by the predictive
/// loss `−ln P(e | bin)` of the recorded data.
fn predictive_loss(model: &DirichletModel<'_>, i: usize, j: usize, e: usize) -> f64 {
    with_events(model, i, j, 1.0, e) + (-model.ln_predictive(i, j, e)).ln()
}

/// As [`predictive_loss`] with the posterior expected loss
/// `−(ψ(c_e) − ψ(Σ c))` after the event.
fn expected_loss(model: &DirichletModel<'_>, i: usize, j: usize, e: usize) -> f64 {
    let added = model.with_event(AddEvent { pos: i, n: 1.0, which: e });
    let c = added.posterior_counts(i, j);
    let total: f64 = c.iter().sum();
    added.score(i, j) + (-(digamma(c[e]) - digamma(total))).ln()
}

fn kl_component(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
    out: &mut [f64],
) -> Result<()> {
    for e in 0..model.data().events() {
        let f1 = |i: usize, j: usize| predictive_loss(model, i, j, e);
        let f2 = |i: usize, j: usize| expected_loss(model, i, j, e);
        let a = ratios(eval, positions, model, &f1)?;
        let b = ratios(eval, positions, model, &f2)?;
        for ((u, a), b) in out.iter_mut().zip(a).zip(b) {
            *u += ratio_to_linear(a) - ratio_to_linear(b);
        }
    }
    Ok(())
}

fn kl_multibin(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
    expectation: &[Vec<f64>],
    out: &mut [f64],
) -> Result<()> {
    for (e, x) in expectation.iter().enumerate() {
        let f1 = |i: usize, j: usize| predictive_loss(model, i, j, e);
        let a = ratios(eval, positions, model, &f1)?;
        for ((u, a), &x) in out.iter_mut().zip(a).zip(x) {
            let x_ln_x = if x > 0.0 { x * x.ln() } else { 0.0 };
            *u += -ratio_to_linear(a) - x_ln_x;
        }
    }
    Ok(())
}

fn effective_counts(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
    with_pseudo_counts: bool,
    out: &mut [f64],
) -> Result<()> {
    let q = |i: usize, j: usize| {
        let n = if with_pseudo_counts {
            model.posterior_counts(i, j).iter().sum()
        } else {
            model.observed_total(i, j)
        };
        n.ln() + model.score(i, j)
    };
    let a = ratios(eval, positions, model, &q)?;
    for (u, a) in out.iter_mut().zip(a) {
        *u = -ratio_to_linear(a);
    }
    Ok(())
}

/// Evaluate utility `kind` at `positions`.
pub fn utility(
    eval: &Evaluator<'_>,
    positions: Positions,
    model: &DirichletModel<'_>,
    kind: UtilityKind,
    epsilon: f64,
) -> Result<Utility> {
    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!("utility", kind = kind.name());
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let expectation = expectations(eval, positions, model)?;
    let n = match positions {
        Positions::All { .. } => eval.len(),
        Positions::One(_) => 1,
    };
    let mut utility = vec![0.0; n];
    match kind {
        UtilityKind::KlComponent => kl_component(eval, positions, model, &mut utility)?,
        UtilityKind::KlMultibin => {
            kl_multibin(eval, positions, model, &expectation, &mut utility)?
        }
        UtilityKind::Kl => {
            kl_component(eval, positions, model, &mut utility)?;
            kl_multibin(eval, positions, model, &expectation, &mut utility)?;
        }
        UtilityKind::EffectiveCounts => {
            effective_counts(eval, positions, model, false, &mut utility)?
        }
        UtilityKind::EffectivePosteriorCounts => {
            effective_counts(eval, positions, model, true, &mut utility)?
        }
        UtilityKind::Entropy => {
            utility = entropy_utility(eval, positions, model, &expectation, epsilon)?;
        }
    }
    Ok(Utility {
        utility,
        expectation,
    })
}
