//! Independent replicate runs.
//!
//! Each replicate builds, runs, and summarizes its own [`Sim`][crate::Sim]
//! inside the closure, so registries, allocators, and arrays are never
//! shared.  With the `parallel` feature the replicates run on Rayon's thread
//! pool; results come back in seed order either way.

use tracing::info;

use crate::SimResult;

/// Run `run(seed)` once per seed and collect the results in seed order.
///
/// A failing replicate does not stop the others.
pub fn run_replicates<R, F>(seeds: &[u64], run: F) -> Vec<SimResult<R>>
where
    R: Send,
    F: Fn(u64) -> SimResult<R> + Sync + Send,
{
    info!(replicates = seeds.len(), "running replicates");

    #[cfg(not(feature = "parallel"))]
    {
        seeds.iter().map(|&seed| run(seed)).collect()
    }

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        seeds.par_iter().map(|&seed| run(seed)).collect()
    }
}

/// Consecutive replicate seeds starting at `base`.
pub fn replicate_seeds(base: u64, n: usize) -> Vec<u64> {
    (0..n as u64).map(|i| base.wrapping_add(i)).collect()
}
