//! Evidence and posterior over the number of bins.

use crate::logspace::OrderVector;

/// `ln P(D)`: log-sum of the per-order sums over orders with prior mass.
pub fn evidence(orders: &OrderVector, prior: &[f64]) -> f64 {
    orders.log_sum_where(|k| prior.get(k).map_or(false, |&g| g > f64::NEG_INFINITY))
}

/// `P(k + 1 bins | D)` for every order; orders without prior mass or beyond
/// the cutoff are 0.
pub fn model_posterior(orders: &OrderVector, prior: &[f64], evidence: f64) -> Vec<f64> {
    (0..orders.len())
        .map(|k| match orders.get(k) {
            Some(v) if prior[k] > f64::NEG_INFINITY && evidence > f64::NEG_INFINITY => {
                (v - evidence).exp()
            }
            _ => 0.0,
        })
        .collect()
}
