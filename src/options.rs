//! Computation options and their builder.

use crate::error::{BinningError, Result};

/// Partition-sum algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Exact forward DP.
    #[default]
    Exact,
    /// Exact depth-first enumeration.
    Tree,
    /// Multibin Gibbs sampling.
    Sampler,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Exact => "exact",
            Algorithm::Tree => "tree",
            Algorithm::Sampler => "sampler",
        }
    }
}

impl TryFrom<i64> for Algorithm {
    type Error = BinningError;

    /// `0` exact DP, `1` tree enumeration, `2` MCMC.
    fn try_from(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(Algorithm::Exact),
            1 => Ok(Algorithm::Tree),
            2 => Ok(Algorithm::Sampler),
            other => Err(BinningError::InvalidAlgorithm(other)),
        }
    }
}

/// Sampling utility to evaluate at every position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UtilityKind {
    /// Expected KL divergence between the bin component posteriors before
    /// and after one more observation.
    KlComponent,
    /// Expected KL divergence of the multibin posterior.
    KlMultibin,
    /// Sum of [`UtilityKind::KlComponent`] and [`UtilityKind::KlMultibin`].
    Kl,
    /// Negative expected number of observations in the covering bin.
    EffectiveCounts,
    /// As [`UtilityKind::EffectiveCounts`], including pseudo-counts.
    EffectivePosteriorCounts,
    /// Expected reduction of the summed bin differential entropies.
    Entropy,
}

impl UtilityKind {
    pub fn name(self) -> &'static str {
        match self {
            UtilityKind::KlComponent => "kl component utility",
            UtilityKind::KlMultibin => "kl multibin utility",
            UtilityKind::Kl => "kl utility",
            UtilityKind::EffectiveCounts => "effective counts",
            UtilityKind::EffectivePosteriorCounts => "effective posterior counts",
            UtilityKind::Entropy => "entropy utility",
        }
    }
}

/// Grid of probability values at which marginal densities are evaluated.
///
/// Point `s` is `s · step`. Points outside `[from, to]`, and the boundary
/// values 0 and 1, report density 0.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DensityGrid {
    pub step: f64,
    pub from: f64,
    pub to: f64,
}

impl Default for DensityGrid {
    fn default() -> Self {
        Self {
            step: 0.01,
            from: 0.0,
            to: 1.0,
        }
    }
}

impl DensityGrid {
    /// Number of grid points covering `[0, 1]`.
    pub fn len(&self) -> usize {
        (1.0 / self.step).round() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn point(&self, s: usize) -> f64 {
        s as f64 * self.step
    }

    /// Whether the density is evaluated at `p`.
    pub fn admits(&self, p: f64) -> bool {
        self.from <= p && p <= self.to && p != 0.0 && p != 1.0
    }
}

/// Everything a [`crate::Binning`] run computes and how.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinningOptions {
    /// Worker threads for per-position queries.
    pub threads: usize,
    /// Perturbation size of the ratio extension.
    pub epsilon: f64,
    pub algorithm: Algorithm,
    /// Discarded sweeps of the sampler.
    pub burn_in: usize,
    /// Recorded sweeps of the sampler.
    pub samples: usize,
    /// Event whose moments and densities are reported.
    pub which: usize,
    /// Number of moments per position (`0` disables them).
    pub n_moments: usize,
    /// Density grid; `None` disables densities.
    pub density: Option<DensityGrid>,
    pub break_probabilities: bool,
    pub model_posterior: bool,
    /// Entropy of the posterior over partitions.
    pub entropy: bool,
    pub utility: Option<UtilityKind>,
    /// Continuation probability of the geometric prior; switches to the
    /// forward–backward path when set.
    pub rho: Option<f64>,
    pub seed: u64,
    pub ln_gamma_cache: bool,
}

impl Default for BinningOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            epsilon: 1e-5,
            algorithm: Algorithm::Exact,
            burn_in: 100,
            samples: 2000,
            which: 0,
            n_moments: 0,
            density: None,
            break_probabilities: false,
            model_posterior: false,
            entropy: false,
            utility: None,
            rho: None,
            seed: 0,
            ln_gamma_cache: false,
        }
    }
}

impl BinningOptions {
    pub fn builder() -> BinningOptionsBuilder {
        BinningOptionsBuilder::new()
    }

    /// Check every option against its admissible range.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(BinningError::option("threads", "must be at least 1"));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(BinningError::option(
                "epsilon",
                format!("must be positive and finite, got {}", self.epsilon),
            ));
        }
        if self.algorithm == Algorithm::Sampler && self.samples == 0 {
            return Err(BinningError::option("samples", "must be positive"));
        }
        if let Some(grid) = &self.density {
            if !(grid.step > 0.0 && grid.step <= 1.0) {
                return Err(BinningError::option(
                    "density_step",
                    format!("must lie in (0, 1], got {}", grid.step),
                ));
            }
            if !(0.0 <= grid.from && grid.from <= grid.to && grid.to <= 1.0) {
                return Err(BinningError::option(
                    "density_range",
                    format!("[{}, {}] is not a sub-interval of [0, 1]", grid.from, grid.to),
                ));
            }
        }
        if let Some(rho) = self.rho {
            if !(rho > 0.0 && rho < 1.0) {
                return Err(BinningError::option(
                    "rho",
                    format!("must lie strictly between 0 and 1, got {rho}"),
                ));
            }
        }
        Ok(())
    }
}

/// Consuming builder for [`BinningOptions`].
///
/// ```
/// use bayes_binning::options::{Algorithm, BinningOptionsBuilder};
///
/// let opts = BinningOptionsBuilder::new()
///     .with_threads(4)
///     .with_algorithm(Algorithm::Tree)
///     .with_moments(2)
///     .with_break_probabilities()
///     .build()
///     .unwrap();
/// assert_eq!(opts.threads, 4);
/// assert_eq!(opts.n_moments, 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct BinningOptionsBuilder {
    opts: BinningOptions,
}

impl BinningOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.opts.threads = threads;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.opts.epsilon = epsilon;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.opts.algorithm = algorithm;
        self
    }

    /// Select the sampler with the given burn-in and sample counts.
    pub fn with_samples(mut self, burn_in: usize, samples: usize) -> Self {
        self.opts.algorithm = Algorithm::Sampler;
        self.opts.burn_in = burn_in;
        self.opts.samples = samples;
        self
    }

    pub fn with_which(mut self, which: usize) -> Self {
        self.opts.which = which;
        self
    }

    pub fn with_moments(mut self, n: usize) -> Self {
        self.opts.n_moments = n;
        self
    }

    pub fn with_density(mut self, step: f64) -> Self {
        let grid = self.opts.density.unwrap_or_default();
        self.opts.density = Some(DensityGrid { step, ..grid });
        self
    }

    pub fn with_density_range(mut self, from: f64, to: f64) -> Self {
        let grid = self.opts.density.unwrap_or_default();
        self.opts.density = Some(DensityGrid { from, to, ..grid });
        self
    }

    pub fn with_break_probabilities(mut self) -> Self {
        self.opts.break_probabilities = true;
        self
    }

    pub fn with_model_posterior(mut self) -> Self {
        self.opts.model_posterior = true;
        self
    }

    pub fn with_entropy(mut self) -> Self {
        self.opts.entropy = true;
        self
    }

    pub fn with_utility(mut self, kind: UtilityKind) -> Self {
        self.opts.utility = Some(kind);
        self
    }

    pub fn with_effective_counts(self) -> Self {
        self.with_utility(UtilityKind::EffectiveCounts)
    }

    pub fn with_hmm(mut self, rho: f64) -> Self {
        self.opts.rho = Some(rho);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.opts.seed = seed;
        self
    }

    pub fn with_ln_gamma_cache(mut self) -> Self {
        self.opts.ln_gamma_cache = true;
        self
    }

    pub fn build(self) -> Result<BinningOptions> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}
