//! Per-position fan-out over worker threads.
//!
//! Each of the `len` positions is an independent task. Tasks run in batches
//! of `threads`; every task gets scratch from `init` that no other task sees
//! and writes only its own output slot, so results do not depend on
//! scheduling. With the `parallel` feature the batches run on a rayon pool of
//! exactly `threads` workers, built per call; without it they run in order on
//! the calling thread.

use crate::error::Result;
#[cfg(feature = "parallel")]
use crate::error::BinningError;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Evaluate `task(pos, scratch)` for every `pos` in `0..len`.
///
/// The first task error aborts the remaining batches and is returned.
/// Failing to start the worker pool yields [`BinningError::ThreadPool`];
/// calling again with `threads = 1` runs the same work sequentially.
pub fn fan_out<T, W, I, F>(len: usize, threads: usize, init: I, task: F) -> Result<Vec<T>>
where
    T: Send,
    I: Fn() -> W + Sync,
    F: Fn(usize, &mut W) -> Result<T> + Sync,
{
    let threads = threads.max(1);
    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!("fan_out", len, threads);
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    if threads == 1 || len <= 1 {
        let mut scratch = init();
        return (0..len)
            .map(|pos| {
                #[cfg(feature = "tracing")]
                tracing::debug!(position = pos, total = len, "evaluating position");
                task(pos, &mut scratch)
            })
            .collect();
    }
    run_batches(len, threads, init, task)
}

#[cfg(feature = "parallel")]
fn run_batches<T, W, I, F>(len: usize, threads: usize, init: I, task: F) -> Result<Vec<T>>
where
    T: Send,
    I: Fn() -> W + Sync,
    F: Fn(usize, &mut W) -> Result<T> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| BinningError::ThreadPool(e.to_string()))?;
    let mut out = Vec::with_capacity(len);
    for (batch, start) in (0..len).step_by(threads).enumerate() {
        let end = (start + threads).min(len);
        #[cfg(feature = "tracing")]
        tracing::debug!(batch, start, end, total = len, "running batch");
        #[cfg(not(feature = "tracing"))]
        let _ = batch;
        let results: Vec<Result<T>> = pool.install(|| {
            (start..end)
                .into_par_iter()
                .map_init(&init, |scratch, pos| task(pos, scratch))
                .collect()
        });
        for r in results {
            out.push(r?);
        }
    }
    Ok(out)
}

#[cfg(not(feature = "parallel"))]
fn run_batches<T, W, I, F>(len: usize, _threads: usize, init: I, task: F) -> Result<Vec<T>>
where
    T: Send,
    I: Fn() -> W + Sync,
    F: Fn(usize, &mut W) -> Result<T> + Sync,
{
    let mut scratch = init();
    (0..len).map(|pos| task(pos, &mut scratch)).collect()
}
