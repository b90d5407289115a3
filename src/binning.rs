//! Orchestration of one binning computation.
//!
//! [`Binning`] validates the data against the options once, computes the
//! partition sums with the selected backend and then runs each requested
//! query against them.

use crate::data::BinData;
use crate::error::{BinningError, Result};
use crate::hmm::HmmBinning;
use crate::logspace::OrderVector;
use crate::mgs::MultibinSampler;
use crate::model::{Context, DirichletModel};
use crate::options::{Algorithm, BinningOptions, UtilityKind};
use crate::prombs::Prombs;
use crate::queries::break_prob::break_probabilities;
use crate::queries::density::density;
use crate::queries::entropy::multibin_entropy;
use crate::queries::evidence::{evidence, model_posterior};
use crate::queries::moment::moments;
use crate::queries::utility::{utility, Positions, Utility};
use crate::queries::Evaluator;
use crate::tree::prombs_tree;

/// Everything one run computed. Queries that were not requested are `None`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinningResult {
    /// `ln P(D)`; `None` under the sampler, which only estimates ratios.
    pub evidence: Option<f64>,
    /// `model_posterior[k] = P(k + 1 bins | D)`.
    pub model_posterior: Option<Vec<f64>>,
    pub break_probabilities: Option<Vec<f64>>,
    /// `moments[n - 1][pos]`; empty when no moments were requested.
    pub moments: Vec<Vec<f64>>,
    /// `density[pos][s]` over the configured grid.
    pub density: Option<Vec<Vec<f64>>>,
    /// Entropy of the posterior over partitions.
    pub entropy: Option<f64>,
    pub utility: Option<Utility>,
    /// Histogram of sampled bin counts.
    pub sampler_counts: Option<Vec<u64>>,
}

/// Partition sums in the form each backend produces them.
enum Backend {
    Exact { orders: OrderVector, evidence: f64 },
    Tree { orders: OrderVector, evidence: f64 },
    Sampler(MultibinSampler),
    Hmm(HmmBinning),
}

impl Backend {
    fn evaluator<'b>(&'b self, prior: &'b [f64], cutoff: usize) -> Evaluator<'b> {
        match self {
            Backend::Exact { evidence, .. } => Evaluator::Exact {
                prior,
                cutoff,
                evidence: *evidence,
            },
            Backend::Tree { evidence, .. } => Evaluator::Tree {
                prior,
                cutoff,
                evidence: *evidence,
            },
            Backend::Sampler(s) => Evaluator::Sampler(s),
            Backend::Hmm(h) => Evaluator::Hmm(h),
        }
    }
}

/// A validated binning problem ready to run.
///
/// ```
/// use bayes_binning::{BinData, Binning, BinningOptions};
///
/// let data = BinData::from_observations(
///     &[vec![4.0, 5.0, 0.0, 1.0], vec![0.0, 1.0, 5.0, 4.0]],
///     &[vec![1.0; 4], vec![1.0; 4]],
///     vec![1.0; 4],
/// )
/// .unwrap();
/// let opts = BinningOptions::builder()
///     .with_moments(1)
///     .with_break_probabilities()
///     .build()
///     .unwrap();
/// let result = Binning::new(&data, opts).unwrap().run().unwrap();
/// let bp = result.break_probabilities.unwrap();
/// // The switch between positions 1 and 2 is the most likely boundary.
/// assert!(bp[2] > bp[1] && bp[2] > bp[3]);
/// assert!(result.moments[0][0] > 0.5 && result.moments[0][3] < 0.5);
/// ```
pub struct Binning<'a> {
    data: &'a BinData,
    options: BinningOptions,
    ctx: Context,
}

impl<'a> Binning<'a> {
    /// Validate `options` against `data`.
    pub fn new(data: &'a BinData, options: BinningOptions) -> Result<Self> {
        options.validate()?;
        data.check_event(options.which)?;
        let hmm = options.rho.is_some();
        if hmm && options.algorithm != Algorithm::Exact {
            return Err(BinningError::option(
                "rho",
                format!(
                    "the forward-backward path replaces the {} algorithm",
                    options.algorithm.name()
                ),
            ));
        }
        let ratio_only = hmm || options.algorithm == Algorithm::Sampler;
        let algorithm = if hmm { "hmm" } else { options.algorithm.name() };
        if ratio_only && options.entropy {
            return Err(BinningError::Unsupported {
                query: "multibin entropy",
                algorithm,
            });
        }
        if ratio_only && options.utility == Some(UtilityKind::Entropy) {
            return Err(BinningError::Unsupported {
                query: "entropy utility",
                algorithm,
            });
        }
        if hmm && options.model_posterior {
            return Err(BinningError::Unsupported {
                query: "model posterior",
                algorithm,
            });
        }
        let ctx = if options.ln_gamma_cache {
            Context::with_ln_gamma_cache()
        } else {
            Context::new()
        };
        Ok(Self { data, options, ctx })
    }

    pub fn data(&self) -> &'a BinData {
        self.data
    }

    pub fn options(&self) -> &BinningOptions {
        &self.options
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn model(&self) -> DirichletModel<'_> {
        DirichletModel::new(self.data, &self.ctx)
    }

    fn backend(&self, model: &DirichletModel<'_>) -> Result<Backend> {
        let prior = self.data.prior();
        let cutoff = prior.cutoff();
        if let Some(rho) = self.options.rho {
            return Ok(Backend::Hmm(HmmBinning::new(model, self.data.len(), rho)?));
        }
        Ok(match self.options.algorithm {
            Algorithm::Exact => {
                let orders = Prombs::new(self.data.len()).run(model, prior.as_slice(), cutoff)?;
                let evidence = evidence(&orders, prior.as_slice());
                Backend::Exact { orders, evidence }
            }
            Algorithm::Tree => {
                let orders = prombs_tree(model, prior.as_slice(), cutoff)?;
                let evidence = evidence(&orders, prior.as_slice());
                Backend::Tree { orders, evidence }
            }
            Algorithm::Sampler => Backend::Sampler(MultibinSampler::sample(
                model,
                prior.as_slice(),
                self.options.burn_in,
                self.options.samples,
                self.options.seed,
            )?),
        })
    }

    /// Compute every requested query.
    pub fn run(&self) -> Result<BinningResult> {
        let opts = &self.options;
        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "binning_run",
            len = self.data.len(),
            events = self.data.events(),
            algorithm = if opts.rho.is_some() { "hmm" } else { opts.algorithm.name() },
            threads = opts.threads
        );
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let model = self.model();
        let prior = self.data.prior().as_slice();
        let backend = self.backend(&model)?;
        let eval = backend.evaluator(prior, self.data.prior().cutoff());
        let mut result = BinningResult {
            evidence: eval.evidence(),
            ..BinningResult::default()
        };
        #[cfg(feature = "tracing")]
        tracing::info!(evidence = ?result.evidence, "partition sums ready");

        if opts.model_posterior {
            result.model_posterior = Some(match &backend {
                Backend::Exact { orders, evidence } | Backend::Tree { orders, evidence } => {
                    model_posterior(orders, prior, *evidence)
                }
                Backend::Sampler(s) => s.model_posterior(),
                Backend::Hmm(_) => {
                    return Err(BinningError::Unsupported {
                        query: "model posterior",
                        algorithm: "hmm",
                    })
                }
            });
        }
        if let Backend::Sampler(s) = &backend {
            result.sampler_counts = Some(s.counts().to_vec());
        }
        if opts.break_probabilities {
            result.break_probabilities = Some(break_probabilities(&eval, opts.threads, &model)?);
        }
        if opts.n_moments > 0 {
            result.moments = moments(&eval, opts.threads, &model, opts.n_moments, opts.which)?;
        }
        if let Some(grid) = &opts.density {
            result.density = Some(density(&eval, opts.threads, &model, grid, opts.which)?);
        }
        if opts.entropy {
            result.entropy = Some(multibin_entropy(&eval, &model, prior, opts.epsilon)?);
        }
        if let Some(kind) = opts.utility {
            let positions = Positions::All {
                threads: opts.threads,
            };
            result.utility = Some(utility(&eval, positions, &model, kind, opts.epsilon)?);
        }
        Ok(result)
    }

    /// Utility of one more observation at `pos` alone; uses the configured
    /// utility kind, or the KL utility when none is set.
    pub fn utility_at(&self, pos: usize) -> Result<Utility> {
        let model = self.model();
        let backend = self.backend(&model)?;
        let eval = backend.evaluator(self.data.prior().as_slice(), self.data.prior().cutoff());
        let kind = self.options.utility.unwrap_or(UtilityKind::Kl);
        utility(&eval, Positions::One(pos), &model, kind, self.options.epsilon)
    }
}
