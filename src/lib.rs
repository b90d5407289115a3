//! Bayesian binning
//!
//! This crate computes model-averaged posterior quantities over every way of
//! partitioning a sequence of `L` ordered positions into contiguous bins.
//! Each bin contributes an independent Dirichlet-multinomial marginal
//! likelihood and partitions are weighted by a prior over the number of bins.
//!
//! ## Core idea
//! 1. Describe the data as cumulative event counts per bin ([`BinData`]).
//! 2. Choose what to compute with [`BinningOptions`].
//! 3. Let [`Binning`] sum over all `2^(L−1)` partitions in `O(L³)` with the
//!    forward DP ([`prombs`]) and derive each query as a ratio of two such
//!    sums.
//!
//! Alternatives to the DP are a depth-first enumeration ([`tree`]), a
//! multibin Gibbs sampler ([`mgs`]) and forward–backward inference under a
//! geometric break prior ([`hmm`]). Per-position queries are fanned out over
//! worker threads by [`parallel::fan_out`].
//!
//! ## Quick start
//! ```
//! use bayes_binning::{BinData, Binning, BinningOptions};
//!
//! // Two event types observed at six positions, one trial each.
//! let data = BinData::from_observations(
//!     &[vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]],
//!     &[vec![1.0; 6], vec![1.0; 6]],
//!     vec![1.0; 6],
//! )
//! .unwrap();
//! let opts = BinningOptions::builder()
//!     .with_model_posterior()
//!     .with_moments(1)
//!     .build()
//!     .unwrap();
//! let result = Binning::new(&data, opts).unwrap().run().unwrap();
//! assert!(result.evidence.unwrap() < 0.0);
//! let posterior = result.model_posterior.unwrap();
//! assert!((posterior.iter().sum::<f64>() - 1.0).abs() < 1e-10);
//! assert!(result.moments[0][0] > result.moments[0][5]);
//! ```
//!
//! ## Scoring functions
//! Every algorithm takes the per-bin score through the [`BinScore`] trait,
//! which plain closures implement, so the engines can be used with any
//! product-partition model:
//! ```
//! use bayes_binning::prombs::prombs;
//!
//! let orders = prombs(&|i: usize, j: usize| -((j - i + 1) as f64), &[0.0; 3], 2).unwrap();
//! assert_eq!(orders.len(), 3);
//! ```

pub mod binning;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod hmm;
pub mod logspace;
pub mod mgs;
pub mod model;
pub mod options;
pub mod parallel;
pub mod prombs;
pub mod queries;
pub mod recursive;
pub mod traits;
pub mod tree;

pub use crate::binning::{Binning, BinningResult};
pub use crate::data::{BinData, ModelPrior};
pub use crate::error::{BinningError, Result};
pub use crate::logspace::OrderVector;
pub use crate::model::{Context, DirichletModel};
pub use crate::options::{Algorithm, BinningOptions, BinningOptionsBuilder, DensityGrid, UtilityKind};
pub use crate::traits::{BinScore, BinValue};
