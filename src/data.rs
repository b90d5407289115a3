//! Immutable problem data shared by every query.
//!
//! [`BinData`] holds the per-event sufficient statistics, the Dirichlet
//! pseudo-counts, the gate matrix and the model-order prior. It is validated
//! once on construction and afterwards only read, so it can be shared across
//! worker threads by reference without locking.

use statrs::function::factorial::ln_binomial;

use crate::error::{BinningError, Result};

/// Prior over the number of bins, on log scale.
///
/// Entry `k` is the log prior mass of partitions using exactly `k + 1` bins.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelPrior {
    log: Vec<f64>,
}

impl ModelPrior {
    /// Size-based prior: `beta[k]` is the mass on `k + 1` bins, spread
    /// uniformly over the `C(L-1, k)` partitions of that size.
    pub fn from_beta(beta: &[f64]) -> Self {
        let n = beta.len().saturating_sub(1) as u64;
        let log = beta
            .iter()
            .enumerate()
            .map(|(k, &b)| {
                if b <= 0.0 {
                    f64::NEG_INFINITY
                } else {
                    b.ln() - ln_binomial(n, k as u64)
                }
            })
            .collect();
        Self { log }
    }

    /// Prior given directly per partition on log scale (no binomial normalization).
    pub fn from_log(log: Vec<f64>) -> Self {
        Self { log }
    }

    /// Every partition gets weight one, regardless of its size.
    pub fn uniform(len: usize) -> Self {
        Self {
            log: vec![0.0; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Log prior of model order `k`.
    #[inline]
    pub fn ln(&self, k: usize) -> f64 {
        self.log[k]
    }

    /// Whether order `k` carries nonzero prior mass.
    #[inline]
    pub fn has_mass(&self, k: usize) -> bool {
        self.log.get(k).map_or(false, |&v| v > f64::NEG_INFINITY)
    }

    /// Largest model order with nonzero prior mass (0 if there is none).
    ///
    /// Orders above this value contribute exactly zero, so the partition
    /// sum may stop there.
    pub fn cutoff(&self) -> usize {
        (0..self.log.len())
            .rev()
            .find(|&k| self.has_mass(k))
            .unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.log
    }
}

/// Validated, immutable input of a binning computation.
#[derive(Clone, Debug)]
pub struct BinData {
    len: usize,
    counts: Vec<Vec<Vec<f64>>>,
    alpha: Vec<Vec<Vec<f64>>>,
    gamma: Vec<Vec<f64>>,
    beta: Vec<f64>,
    prior: ModelPrior,
}

impl BinData {
    /// Build from raw matrices.
    ///
    /// - `counts[e][i][j]`: count of event `e` accumulated over bin `[i, j]`,
    /// - `alpha[e][i][j]`: Dirichlet pseudo-count of event `e` for bin `[i, j]`,
    /// - `beta[k]`: prior mass on `k + 1` bins,
    /// - `gamma[i][j]`: bin weight, `0` forbids the bin.
    ///
    /// Every matrix must be `L x L` and upper triangular; counts, pseudo-counts
    /// and gates must be finite and non-negative, and pseudo-counts strictly
    /// positive wherever the gate allows the bin.
    pub fn new(
        counts: Vec<Vec<Vec<f64>>>,
        alpha: Vec<Vec<Vec<f64>>>,
        beta: Vec<f64>,
        gamma: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if counts.is_empty() {
            return Err(BinningError::dimension("counts", "at least one event", "0"));
        }
        if alpha.len() != counts.len() {
            return Err(BinningError::dimension(
                "alpha",
                format!("{} event matrices", counts.len()),
                alpha.len(),
            ));
        }
        let len = counts[0].len();
        if len == 0 {
            return Err(BinningError::dimension("counts[0]", "at least 1x1", "0x0"));
        }
        for (e, m) in counts.iter().enumerate() {
            check_matrix(&format!("counts[{e}]"), m, len)?;
        }
        for (e, m) in alpha.iter().enumerate() {
            check_matrix(&format!("alpha[{e}]"), m, len)?;
        }
        check_matrix("gamma", &gamma, len)?;
        if beta.len() != len {
            return Err(BinningError::dimension("beta", len, beta.len()));
        }
        if let Some((k, &b)) = beta
            .iter()
            .enumerate()
            .find(|(_, b)| !b.is_finite() || **b < 0.0)
        {
            return Err(BinningError::InvalidValue {
                what: "beta".into(),
                row: k,
                col: 0,
                value: b,
            });
        }
        // Dirichlet pseudo-counts must be positive on every admissible bin.
        for (e, m) in alpha.iter().enumerate() {
            for i in 0..len {
                for j in i..len {
                    if gamma[i][j] > 0.0 && m[i][j] <= 0.0 {
                        return Err(BinningError::InvalidValue {
                            what: format!("alpha[{e}]"),
                            row: i,
                            col: j,
                            value: m[i][j],
                        });
                    }
                }
            }
        }
        let prior = ModelPrior::from_beta(&beta);
        Ok(Self {
            len,
            counts,
            alpha,
            gamma,
            beta,
            prior,
        })
    }

    /// Build from per-position observations.
    ///
    /// `observations[e][t]` is the count of event `e` at position `t` and
    /// `pseudo_counts[e][t]` its prior pseudo-count. Bin statistics are the
    /// sums over the covered positions and every bin is allowed.
    pub fn from_observations(
        observations: &[Vec<f64>],
        pseudo_counts: &[Vec<f64>],
        beta: Vec<f64>,
    ) -> Result<Self> {
        if observations.is_empty() {
            return Err(BinningError::dimension(
                "observations",
                "at least one event",
                "0",
            ));
        }
        let len = observations[0].len();
        if pseudo_counts.len() != observations.len() {
            return Err(BinningError::dimension(
                "pseudo_counts",
                format!("{} events", observations.len()),
                pseudo_counts.len(),
            ));
        }
        for (e, row) in observations.iter().chain(pseudo_counts).enumerate() {
            if row.len() != len {
                return Err(BinningError::dimension(
                    format!("observation row {e}"),
                    len,
                    row.len(),
                ));
            }
        }
        let counts = observations.iter().map(|x| cumulate(x)).collect();
        let alpha = pseudo_counts.iter().map(|x| cumulate(x)).collect();
        let gamma = (0..len)
            .map(|i| (0..len).map(|j| if j >= i { 1.0 } else { 0.0 }).collect())
            .collect();
        Self::new(counts, alpha, beta, gamma)
    }

    /// Number of positions `L`.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: construction rejects `L = 0`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of event types `K`.
    #[inline]
    pub fn events(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn count(&self, event: usize, from: usize, to: usize) -> f64 {
        self.counts[event][from][to]
    }

    #[inline]
    pub fn alpha(&self, event: usize, from: usize, to: usize) -> f64 {
        self.alpha[event][from][to]
    }

    #[inline]
    pub fn gamma(&self, from: usize, to: usize) -> f64 {
        self.gamma[from][to]
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Log prior over model orders, derived from `beta` unless replaced.
    pub fn prior(&self) -> &ModelPrior {
        &self.prior
    }

    /// Replace the prior derived from `beta`, e.g. with [`ModelPrior::uniform`].
    pub fn with_prior(mut self, prior: ModelPrior) -> Result<Self> {
        if prior.len() != self.len {
            return Err(BinningError::dimension("prior", self.len, prior.len()));
        }
        if let Some(k) = prior.as_slice().iter().position(|g| g.is_nan() || *g == f64::INFINITY) {
            return Err(BinningError::InvalidValue {
                what: "prior".into(),
                row: k,
                col: 0,
                value: prior.ln(k),
            });
        }
        self.prior = prior;
        Ok(self)
    }

    /// Reject an event index that does not exist.
    pub fn check_event(&self, which: usize) -> Result<()> {
        if which < self.events() {
            Ok(())
        } else {
            Err(BinningError::InvalidEvent {
                which,
                events: self.events(),
            })
        }
    }
}

fn check_matrix(what: &str, m: &[Vec<f64>], len: usize) -> Result<()> {
    if m.len() != len {
        return Err(BinningError::dimension(
            what,
            format!("{len}x{len}"),
            format!("{} rows", m.len()),
        ));
    }
    for (i, row) in m.iter().enumerate() {
        if row.len() != len {
            return Err(BinningError::dimension(
                what,
                format!("{len}x{len}"),
                format!("row {i} of length {}", row.len()),
            ));
        }
        for (j, &v) in row.iter().enumerate() {
            if j < i {
                if v != 0.0 {
                    return Err(BinningError::NotUpperTriangular {
                        what: what.to_string(),
                        row: i,
                        col: j,
                    });
                }
            } else if !v.is_finite() || v < 0.0 {
                return Err(BinningError::InvalidValue {
                    what: what.to_string(),
                    row: i,
                    col: j,
                    value: v,
                });
            }
        }
    }
    Ok(())
}

/// `m[i][j] = Σ_{t=i..=j} x[t]` for `i <= j`, zero below the diagonal.
fn cumulate(x: &[f64]) -> Vec<Vec<f64>> {
    let len = x.len();
    let mut m = vec![vec![0.0; len]; len];
    for i in 0..len {
        let mut acc = 0.0;
        for j in i..len {
            acc += x[j];
            m[i][j] = acc;
        }
    }
    m
}
