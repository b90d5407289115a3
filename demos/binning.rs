//! Example: Bayesian binning of a short two-event sequence.
//!
//! Run with:
//! `cargo run --example binning`
//!
//! Event 0 dominates the first four positions and event 1 the last four, so
//! the break probability should peak at position 4.

use bayes_binning::{BinData, Binning, BinningOptions};

fn main() -> bayes_binning::Result<()> {
    let first = [5.0, 4.0, 6.0, 5.0, 1.0, 0.0, 1.0, 2.0];
    let second = [1.0, 2.0, 0.0, 1.0, 5.0, 6.0, 4.0, 5.0];
    let len = first.len();

    let data = BinData::from_observations(
        &[first.to_vec(), second.to_vec()],
        &[vec![1.0; len], vec![1.0; len]],
        vec![1.0; len],
    )?;
    let opts = BinningOptions::builder()
        .with_model_posterior()
        .with_break_probabilities()
        .with_moments(2)
        .build()?;

    let result = Binning::new(&data, opts)?.run()?;

    if let Some(evidence) = result.evidence {
        println!("ln P(D) = {evidence:.4}");
    }
    if let Some(posterior) = &result.model_posterior {
        let (k, p) = posterior
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap_or((0, &0.0));
        println!("most probable number of bins: {} (p = {p:.3})", k + 1);
    }

    println!("pos  P(break)  E[p0]   sd[p0]");
    let breaks = result.break_probabilities.unwrap_or_default();
    for pos in 0..len {
        let mean = result.moments[0][pos];
        let sd = (result.moments[1][pos] - mean * mean).max(0.0).sqrt();
        println!("{pos:>3}  {:>8.3}  {mean:.3}  {sd:.3}", breaks[pos]);
    }
    Ok(())
}
