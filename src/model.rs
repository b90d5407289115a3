//! Dirichlet-multinomial bin model and its evaluation context.
//!
//! [`DirichletModel`] is the default [`BinScore`]: the log marginal likelihood
//! of the events inside a bin under a Dirichlet prior, weighted by the gate
//! matrix. Query selectors ([`AddEvent`], [`FixProb`]) are attached to a model
//! value rather than threaded through shared mutable state, so every worker
//! builds its own selected model from the shared [`BinData`].

use std::collections::HashMap;

use parking_lot::RwLock;
use statrs::function::gamma::{digamma, ln_gamma};

use crate::data::BinData;
use crate::traits::BinScore;

/// Memo table for `ln Γ`, keyed by the bit pattern of the argument.
///
/// Reads take a shared lock; a miss computes the value outside the lock and
/// inserts it under the exclusive lock.
#[derive(Debug, Default)]
pub struct LnGammaCache {
    map: RwLock<HashMap<u64, f64>>,
}

impl LnGammaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ln_gamma(&self, x: f64) -> f64 {
        let key = x.to_bits();
        if let Some(&v) = self.map.read().get(&key) {
            return v;
        }
        let v = ln_gamma(x);
        self.map.write().insert(key, v);
        v
    }

    /// Number of memoized arguments.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluation context passed by reference into every entry point.
///
/// Holds the state the computation may share across threads besides the
/// problem data itself. Results never depend on it, only throughput does.
#[derive(Debug, Default)]
pub struct Context {
    cache: Option<LnGammaCache>,
}

impl Context {
    /// Context without memoization.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that memoizes `ln Γ` evaluations.
    pub fn with_ln_gamma_cache() -> Self {
        Self {
            cache: Some(LnGammaCache::new()),
        }
    }

    pub fn cache(&self) -> Option<&LnGammaCache> {
        self.cache.as_ref()
    }

    #[inline]
    pub fn ln_gamma(&self, x: f64) -> f64 {
        match &self.cache {
            Some(cache) => cache.ln_gamma(x),
            None => ln_gamma(x),
        }
    }

    /// Log multivariate Beta function `Σ ln Γ(p_e) − ln Γ(Σ p_e)`.
    pub fn ln_beta(&self, p: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut acc = 0.0;
        for &x in p {
            sum += x;
            acc += self.ln_gamma(x);
        }
        acc - self.ln_gamma(sum)
    }
}

/// Inject `n` extra observations of event `which` into every bin covering `pos`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AddEvent {
    pub pos: usize,
    pub n: f64,
    pub which: usize,
}

/// Clamp the success probability of event `which` to `value` in every bin
/// covering `pos`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixProb {
    pub pos: usize,
    pub value: f64,
    pub which: usize,
}

/// Dirichlet-multinomial bin score with optional query selectors.
#[derive(Clone, Copy, Debug)]
pub struct DirichletModel<'a> {
    data: &'a BinData,
    ctx: &'a Context,
    add_event: Option<AddEvent>,
    fix_prob: Option<FixProb>,
}

impl<'a> DirichletModel<'a> {
    pub fn new(data: &'a BinData, ctx: &'a Context) -> Self {
        Self {
            data,
            ctx,
            add_event: None,
            fix_prob: None,
        }
    }

    pub fn with_event(mut self, event: AddEvent) -> Self {
        self.add_event = Some(event);
        self
    }

    pub fn with_fixed(mut self, fixed: FixProb) -> Self {
        self.fix_prob = Some(fixed);
        self
    }

    pub fn data(&self) -> &'a BinData {
        self.data
    }

    pub fn context(&self) -> &'a Context {
        self.ctx
    }

    pub fn add_event(&self) -> Option<AddEvent> {
        self.add_event
    }

    /// Posterior pseudo-counts `c + α` of bin `[from, to]`, including any
    /// injected events.
    pub fn posterior_counts(&self, from: usize, to: usize) -> Vec<f64> {
        let mut c: Vec<f64> = (0..self.data.events())
            .map(|e| self.data.count(e, from, to) + self.data.alpha(e, from, to))
            .collect();
        if let Some(ev) = self.add_event {
            if from <= ev.pos && ev.pos <= to {
                c[ev.which] += ev.n;
            }
        }
        c
    }

    pub fn prior_counts(&self, from: usize, to: usize) -> Vec<f64> {
        (0..self.data.events())
            .map(|e| self.data.alpha(e, from, to))
            .collect()
    }

    /// Observed events in the bin plus any injected ones.
    pub fn observed_total(&self, from: usize, to: usize) -> f64 {
        let mut n: f64 = (0..self.data.events())
            .map(|e| self.data.count(e, from, to))
            .sum();
        if let Some(ev) = self.add_event {
            if from <= ev.pos && ev.pos <= to {
                n += ev.n;
            }
        }
        n
    }

    /// Log predictive probability of event `which` in bin `[from, to]` given
    /// the recorded data only (injected events are ignored).
    pub fn ln_predictive(&self, from: usize, to: usize, which: usize) -> f64 {
        let total: f64 = (0..self.data.events())
            .map(|e| self.data.count(e, from, to) + self.data.alpha(e, from, to))
            .sum();
        (self.data.count(which, from, to) + self.data.alpha(which, from, to)).ln() - total.ln()
    }

    /// Differential entropy of the bin's Dirichlet posterior.
    pub fn bin_entropy(&self, from: usize, to: usize) -> f64 {
        let c = self.posterior_counts(from, to);
        let k = c.len() as f64;
        let n: f64 = c.iter().sum();
        let s: f64 = c.iter().map(|&x| (x - 1.0) * digamma(x)).sum();
        self.ctx.ln_beta(&c) + (n - k) * digamma(n) - s
    }
}

impl BinScore for DirichletModel<'_> {
    fn score(&self, from: usize, to: usize) -> f64 {
        let gamma = self.data.gamma(from, to);
        if gamma == 0.0 {
            return f64::NEG_INFINITY;
        }
        let c = self.posterior_counts(from, to);
        let a = self.prior_counts(from, to);
        let mut s = gamma.ln() + self.ctx.ln_beta(&c) - self.ctx.ln_beta(&a);
        if let Some(fp) = self.fix_prob {
            if from <= fp.pos && fp.pos <= to {
                // Marginal Beta density of the selected component at `value`.
                let hit = c[fp.which];
                let rest = c.iter().sum::<f64>() - hit;
                s += (hit - 1.0) * fp.value.ln() + (rest - 1.0) * (-fp.value).ln_1p()
                    - self.ctx.ln_beta(&[hit, rest]);
            }
        }
        s
    }
}
