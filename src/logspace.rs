//! Log-space arithmetic and the per-model-order result vector.
//!
//! All probabilities handled by the engine are natural logarithms. `-∞`
//! encodes probability zero and flows through [`logadd`] without producing
//! NaN.

use crate::error::{BinningError, Result};

/// `ln(exp(a) + exp(b))`, stable for arguments of any magnitude.
#[inline]
pub fn logadd(a: f64, b: f64) -> f64 {
    if a < b {
        if a == f64::NEG_INFINITY {
            b
        } else {
            b + (a - b).exp().ln_1p()
        }
    } else if b == f64::NEG_INFINITY {
        a
    } else {
        a + (b - a).exp().ln_1p()
    }
}

/// `ln(exp(a) - exp(b))`.
///
/// Returns `-∞` for `a == b` and an error if `b > a`, where the difference
/// would be negative.
#[inline]
pub fn logsub(a: f64, b: f64) -> Result<f64> {
    if b == f64::NEG_INFINITY {
        Ok(a)
    } else if b > a {
        Err(BinningError::NegativeLogDifference { a, b })
    } else if a == b {
        Ok(f64::NEG_INFINITY)
    } else {
        Ok(a + (-(b - a).exp()).ln_1p())
    }
}

/// Log-sum-exp of an arbitrary sequence; `-∞` for an empty one.
pub fn log_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().fold(f64::NEG_INFINITY, logadd)
}

/// Per-model-order result of a partition sum.
///
/// Entry `k` is the log-sum over all partitions that use exactly `k + 1`
/// bins. Only orders `0..=cutoff` were computed; reading beyond the cutoff
/// yields `None` so that pruned entries can never leak into an aggregate.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderVector {
    values: Vec<f64>,
    cutoff: usize,
}

impl OrderVector {
    /// All computed entries set to `-∞`.
    pub fn zeros(len: usize, cutoff: usize) -> Self {
        let cutoff = cutoff.min(len.saturating_sub(1));
        Self {
            values: vec![f64::NEG_INFINITY; len],
            cutoff,
        }
    }

    /// Number of positions `L` (and therefore of possible model orders).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest model order (0-indexed) that was computed.
    #[inline]
    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    /// Entry for model order `k`, or `None` if `k` was pruned.
    #[inline]
    pub fn get(&self, k: usize) -> Option<f64> {
        if k <= self.cutoff {
            self.values.get(k).copied()
        } else {
            None
        }
    }

    /// `(order, value)` pairs over the computed range.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .copied()
            .enumerate()
            .take(self.cutoff + 1)
    }

    /// Dense view; pruned entries read as `-∞`.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Log-sum over computed entries for which `include(k)` holds.
    pub fn log_sum_where<F: Fn(usize) -> bool>(&self, include: F) -> f64 {
        log_sum(self.iter().filter(|&(k, _)| include(k)).map(|(_, v)| v))
    }

    /// Log-sum over every computed entry.
    pub fn log_sum(&self) -> f64 {
        self.log_sum_where(|_| true)
    }

    #[inline]
    pub(crate) fn set(&mut self, k: usize, value: f64) {
        debug_assert!(k <= self.cutoff, "order {k} beyond cutoff {}", self.cutoff);
        self.values[k] = value;
    }

    #[inline]
    pub(crate) fn accumulate(&mut self, k: usize, value: f64) {
        debug_assert!(k <= self.cutoff, "order {k} beyond cutoff {}", self.cutoff);
        self.values[k] = logadd(self.values[k], value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logadd_identity_and_symmetry() {
        assert_eq!(logadd(1.5, f64::NEG_INFINITY), 1.5);
        assert_eq!(logadd(f64::NEG_INFINITY, 1.5), 1.5);
        assert_eq!(
            logadd(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
        assert_eq!(logadd(-3.0, 2.0), logadd(2.0, -3.0));
        let v = logadd(2.0f64.ln(), 3.0f64.ln());
        assert!((v - 5.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn logadd_large_magnitudes_do_not_overflow() {
        let v = logadd(1000.0, 1000.0);
        assert!((v - (1000.0 + 2.0f64.ln())).abs() < 1e-9);
        let v = logadd(-1000.0, -1000.0);
        assert!((v - (-1000.0 + 2.0f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn logsub_cases() {
        let v = logsub(5.0f64.ln(), 3.0f64.ln()).unwrap();
        assert!((v - 2.0f64.ln()).abs() < 1e-12);
        assert_eq!(logsub(1.0, 1.0).unwrap(), f64::NEG_INFINITY);
        assert_eq!(logsub(1.0, f64::NEG_INFINITY).unwrap(), 1.0);
        assert!(matches!(
            logsub(1.0, 2.0),
            Err(BinningError::NegativeLogDifference { .. })
        ));
    }

    #[test]
    fn order_vector_hides_pruned_entries() {
        let mut v = OrderVector::zeros(4, 1);
        v.set(0, 0.0);
        v.set(1, 0.0);
        assert_eq!(v.get(2), None);
        assert_eq!(v.iter().count(), 2);
        assert!((v.log_sum() - 2.0f64.ln()).abs() < 1e-12);
        assert_eq!(v.log_sum_where(|k| k == 1), 0.0);
        assert_eq!(v.as_slice()[3], f64::NEG_INFINITY);
    }

    #[test]
    fn cutoff_is_clamped_to_length() {
        let v = OrderVector::zeros(3, 10);
        assert_eq!(v.cutoff(), 2);
        let empty = OrderVector::zeros(0, 0);
        assert!(empty.is_empty());
        assert_eq!(empty.log_sum(), f64::NEG_INFINITY);
    }
}
