//! Parallel Monte Carlo trial runner.
//!
//! Trials are split into fixed-size chunks and spread over the rayon pool.
//! Every trial draws from its own `StdRng` seeded from (base seed, trial
//! index), so a run is reproducible no matter how work is scheduled. Chunk
//! tallies are merged in chunk order, which keeps float accumulators
//! bit-identical between runs too.
//!
//! A deadline is checked before each trial. The first trial always runs, so
//! a budgeted run never comes back empty.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Trials handled by one rayon task
pub const TRIALS_PER_CHUNK: usize = 64;

/// Per-run accumulator. Each chunk fills its own, then they are merged.
pub trait Tally: Send + Sized {
    fn merge(&mut self, other: Self);
}

#[derive(Debug, Clone, Copy)]
pub struct TrialPlan {
    pub simulations: u32,
    pub seed: u64,
    pub deadline: Option<Instant>,
}

impl TrialPlan {
    pub fn new(simulations: u32, seed: u64) -> Self {
        Self {
            simulations,
            seed,
            deadline: None,
        }
    }

    /// Stop starting new trials once `budget` has elapsed from now
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.deadline = budget.map(|b| Instant::now() + b);
        self
    }

    #[inline]
    fn expired(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

#[derive(Debug, Clone)]
pub struct TrialRun<T> {
    pub tally: T,
    pub completed: u32,
    pub requested: u32,
}

impl<T> TrialRun<T> {
    /// An empty plan never counts as complete
    pub fn is_complete(&self) -> bool {
        self.requested > 0 && self.completed >= self.requested
    }
}

/// Use the caller's seed, or draw a fresh one
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Seed for one trial (splitmix64 finalizer over base + index)
#[inline]
pub fn trial_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Run `plan.simulations` trials of `trial` in parallel.
///
/// `init` builds an empty tally; `trial` records one simulated outcome into
/// it using the supplied RNG.
pub fn run_trials<T, I, F>(plan: &TrialPlan, init: I, trial: F) -> TrialRun<T>
where
    T: Tally,
    I: Fn() -> T + Sync,
    F: Fn(&mut T, &mut StdRng) + Sync,
{
    let started = Instant::now();
    let total = plan.simulations as usize;
    let chunks = total.div_ceil(TRIALS_PER_CHUNK);

    let partials: Vec<(T, u32)> = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let mut tally = init();
            let mut done = 0u32;
            let start = chunk * TRIALS_PER_CHUNK;
            let end = (start + TRIALS_PER_CHUNK).min(total);

            for idx in start..end {
                if idx > 0 && plan.expired() {
                    break;
                }
                let mut rng = StdRng::seed_from_u64(trial_seed(plan.seed, idx as u64));
                trial(&mut tally, &mut rng);
                done += 1;
            }
            (tally, done)
        })
        .collect();

    let mut tally = init();
    let mut completed = 0u32;
    for (partial, done) in partials {
        tally.merge(partial);
        completed += done;
    }

    let run = TrialRun {
        tally,
        completed,
        requested: plan.simulations,
    };

    if run.completed >= run.requested {
        debug!(
            "Completed {} trials in {:?}",
            run.completed,
            started.elapsed()
        );
    } else {
        warn!(
            "Time budget exhausted: {}/{} trials completed in {:?}",
            run.completed,
            run.requested,
            started.elapsed()
        );
    }

    run
}
