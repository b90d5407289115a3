//! Multibin Gibbs sampler.
//!
//! A stochastic alternative to the exact DP for long sequences. The state is
//! a [`Multibin`], a bitset over the `L - 1` candidate breaks; break `i` means
//! a bin ends at position `i`. One sweep visits every candidate break in a
//! fresh random order and resamples it from its exact conditional given all
//! other breaks.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{BinningError, Result};
use crate::logspace::{logadd, OrderVector};
use crate::traits::BinScore;

const WORD: usize = 64;

/// Set of breaks of a partition of `len` positions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Multibin {
    len: usize,
    words: Vec<u64>,
    breaks: usize,
}

impl Multibin {
    /// Single bin covering all positions.
    pub fn new(len: usize) -> Self {
        let candidates = len.saturating_sub(1);
        Self {
            len,
            words: vec![0; candidates.div_ceil(WORD).max(1)],
            breaks: 0,
        }
    }

    /// Partition with `k` breaks spread evenly over the sequence.
    pub fn evenly_spaced(len: usize, k: usize) -> Self {
        let mut mb = Self::new(len);
        let k = k.min(mb.n_candidates());
        for i in 0..k {
            mb.insert((i + 1) * len / (k + 1) - 1);
        }
        mb
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of candidate break positions, `L - 1`.
    #[inline]
    pub fn n_candidates(&self) -> usize {
        self.len.saturating_sub(1)
    }

    #[inline]
    pub fn n_breaks(&self) -> usize {
        self.breaks
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.breaks + 1
    }

    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        i < self.n_candidates() && self.words[i / WORD] & (1 << (i % WORD)) != 0
    }

    /// Add break `i`; returns whether it was newly inserted.
    pub fn insert(&mut self, i: usize) -> bool {
        if i >= self.n_candidates() || self.contains(i) {
            return false;
        }
        self.words[i / WORD] |= 1 << (i % WORD);
        self.breaks += 1;
        true
    }

    /// Remove break `i`; returns whether it was present.
    pub fn remove(&mut self, i: usize) -> bool {
        if !self.contains(i) {
            return false;
        }
        self.words[i / WORD] &= !(1 << (i % WORD));
        self.breaks -= 1;
        true
    }

    pub fn toggle(&mut self, i: usize) {
        if !self.remove(i) {
            self.insert(i);
        }
    }

    /// Largest break strictly below `pos`.
    pub fn prev_break(&self, pos: usize) -> Option<usize> {
        if pos == 0 || self.n_candidates() == 0 {
            return None;
        }
        let end = (pos - 1).min(self.n_candidates() - 1);
        let mut w = end / WORD;
        let shift = end % WORD;
        let mask = if shift == WORD - 1 {
            !0
        } else {
            (1u64 << (shift + 1)) - 1
        };
        let mut word = self.words[w] & mask;
        loop {
            if word != 0 {
                return Some(w * WORD + (WORD - 1 - word.leading_zeros() as usize));
            }
            if w == 0 {
                return None;
            }
            w -= 1;
            word = self.words[w];
        }
    }

    /// Smallest break strictly above `pos`.
    pub fn next_break(&self, pos: usize) -> Option<usize> {
        let start = pos + 1;
        if start >= self.n_candidates() {
            return None;
        }
        let mut w = start / WORD;
        let mut word = self.words[w] & (!0u64 << (start % WORD));
        loop {
            if word != 0 {
                let b = w * WORD + word.trailing_zeros() as usize;
                return (b < self.n_candidates()).then_some(b);
            }
            w += 1;
            if w >= self.words.len() {
                return None;
            }
            word = self.words[w];
        }
    }

    /// Breaks in increasing order.
    pub fn breaks(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(w * WORD + bit)
            })
        })
    }

    /// Bins `(from, to)` from left to right.
    pub fn bins(&self) -> Vec<(usize, usize)> {
        if self.len == 0 {
            return Vec::new();
        }
        let mut bins = Vec::with_capacity(self.n_bins());
        let mut from = 0;
        for b in self.breaks() {
            bins.push((from, b));
            from = b + 1;
        }
        bins.push((from, self.len - 1));
        bins
    }

    /// Log weight `Σ_b f(b)` of the partition.
    pub fn score<S: BinScore + ?Sized>(&self, f: &S) -> f64 {
        self.bins().into_iter().map(|(i, j)| f.score(i, j)).sum()
    }
}

/// Single-site Gibbs kernel over [`Multibin`] states.
pub struct MultibinGibbs<'a, S: ?Sized> {
    f: &'a S,
    prior: &'a [f64],
    state: Multibin,
    order: Vec<usize>,
    rng: StdRng,
}

impl<'a, S: BinScore + ?Sized> MultibinGibbs<'a, S> {
    /// Start from the smallest model order with prior mass, breaks evenly
    /// spaced.
    pub fn new(f: &'a S, prior: &'a [f64], seed: u64) -> Result<Self> {
        let len = prior.len();
        let k = prior
            .iter()
            .position(|&g| g > f64::NEG_INFINITY)
            .ok_or_else(|| BinningError::option("beta", "no model order has prior mass"))?;
        let state = Multibin::evenly_spaced(len, k);
        Ok(Self {
            f,
            prior,
            state,
            order: (0..len.saturating_sub(1)).collect(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn state(&self) -> &Multibin {
        &self.state
    }

    /// Resample break `pos` conditional on all others.
    pub fn step(&mut self, pos: usize) {
        let l = self.state.len();
        let from = self.state.prev_break(pos).map_or(0, |b| b + 1);
        let to = self.state.next_break(pos).unwrap_or(l - 1);
        let others = self.state.n_breaks() - usize::from(self.state.contains(pos));
        let g = |k: usize| self.prior.get(k).copied().unwrap_or(f64::NEG_INFINITY);

        let on = self.f.score(from, pos) + self.f.score(pos + 1, to) + g(others + 1);
        let off = self.f.score(from, to) + g(others);
        let total = logadd(on, off);
        if total == f64::NEG_INFINITY {
            // Neither state is admissible: keep the current one.
            return;
        }
        let p_on = (on - total).exp();
        if self.rng.gen::<f64>() < p_on {
            self.state.insert(pos);
        } else {
            self.state.remove(pos);
        }
    }

    /// Visit every candidate break once, in random order.
    pub fn sweep(&mut self) {
        let mut order = std::mem::take(&mut self.order);
        order.shuffle(&mut self.rng);
        for &pos in &order {
            self.step(pos);
        }
        self.order = order;
    }
}

/// Samples retained after burn-in and the statistics derived from them.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultibinSampler {
    len: usize,
    samples: Vec<Multibin>,
    counts: Vec<u64>,
    starts: Vec<u64>,
}

impl MultibinSampler {
    /// Run `burn_in` discarded sweeps, then record the state after each of
    /// `samples` further sweeps.
    pub fn sample<S: BinScore + ?Sized>(
        f: &S,
        prior: &[f64],
        burn_in: usize,
        samples: usize,
        seed: u64,
    ) -> Result<Self> {
        if samples == 0 {
            return Err(BinningError::option("samples", "must be positive"));
        }
        let len = prior.len();
        #[cfg(feature = "tracing")]
        let span = tracing::info_span!("mgs_sample", len, burn_in, samples);
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let mut chain = MultibinGibbs::new(f, prior, seed)?;
        for _ in 0..burn_in {
            chain.sweep();
        }
        let mut out = Self {
            len,
            samples: Vec::with_capacity(samples),
            counts: vec![0; len],
            starts: vec![0; len],
        };
        for _ in 0..samples {
            chain.sweep();
            let state = chain.state();
            // States without posterior weight are never recorded.
            let prior_k = prior.get(state.n_bins() - 1).copied().unwrap_or(f64::NEG_INFINITY);
            if state.score(f) + prior_k > f64::NEG_INFINITY {
                out.record(state.clone());
            }
        }
        #[cfg(feature = "tracing")]
        {
            if out.samples.is_empty() {
                tracing::warn!(samples, "chain never reached a partition with positive weight");
            } else {
                tracing::debug!(
                    kept = out.samples.len(),
                    mean_bins = out.samples.iter().map(Multibin::n_bins).sum::<usize>() as f64
                        / out.samples.len() as f64,
                    "sampling finished"
                );
            }
        }
        Ok(out)
    }

    fn record(&mut self, state: Multibin) {
        if self.len > 0 {
            self.counts[state.n_bins() - 1] += 1;
            self.starts[0] += 1;
            for b in state.breaks() {
                self.starts[b + 1] += 1;
            }
        }
        self.samples.push(state);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[Multibin] {
        &self.samples
    }

    /// Histogram over model orders: entry `k` counts samples with `k + 1` bins.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Fraction of samples per model order; all zero without samples.
    pub fn model_posterior(&self) -> Vec<f64> {
        let n = self.samples.len() as f64;
        self.counts
            .iter()
            .map(|&c| if c == 0 { 0.0 } else { c as f64 / n })
            .collect()
    }

    /// Fraction of samples in which a bin starts at each position.
    ///
    /// Position 0 always starts a bin, even without samples.
    pub fn break_probabilities(&self) -> Vec<f64> {
        let n = self.samples.len() as f64;
        self.starts
            .iter()
            .enumerate()
            .map(|(pos, &c)| match (pos, c) {
                (0, _) => 1.0,
                (_, 0) => 0.0,
                _ => c as f64 / n,
            })
            .collect()
    }

    /// Per-order `ln (1/N Σ_{samples of order k} exp(Σ_b f(b)))`.
    ///
    /// The log-sum over orders is the sample mean of `exp(Σ_b f(b))`.
    pub fn evaluate<S: BinScore + ?Sized>(&self, f: &S) -> OrderVector {
        let mut result = OrderVector::zeros(self.len, self.len.saturating_sub(1));
        let ln_n = (self.samples.len() as f64).ln();
        for s in &self.samples {
            result.accumulate(s.n_bins() - 1, s.score(f) - ln_n);
        }
        result
    }
}
