//! Executor: concurrent fan-out/fan-in of one batch of remote calls
//!
//! A batch is a fixed, ordered sequence of inputs. [`BatchExecutor`] spawns one
//! worker task per input, waits for every one of them and hands back a
//! [`BatchResult`] whose outcomes are addressed by the index of the input that
//! produced them.
//!
//! # High-level flow
//! 1. A `Semaphore` sized to `concurrency` is created. It is the only thing
//!    shared between workers and bounds how many calls are open at once.
//! 2. One worker per input is spawned. Each worker:
//!    - waits for a permit, giving up with `Cancelled` if shutdown is raised
//!      first,
//!    - calls the operation once, under the optional per-call deadline and
//!      against an abort of shutdown,
//!    - returns its `Outcome` from the task. Nothing is written to shared state.
//! 3. The caller joins every handle. Each outcome lands in the pre-sized slot
//!    matching its input index; a worker that panicked gets a `Panicked`
//!    failure in its slot.
//! 4. Totals are reduced single-threaded over the slots in ascending order,
//!    after the join barrier.
//!
//! # Notes about correctness
//! - Because workers never touch a shared accumulator, `summed_duration` and
//!   `failure_count` are exact no matter how the workers interleave.
//! - `wall_clock` is taken from just before the first spawn to just after the
//!   join, so it covers time spent waiting for permits too.
//! - Calls already in flight when shutdown is raised are allowed to finish; only
//!   workers that have not started their call are cancelled. Escalating to an
//!   abort races every running call against the signal and records the losers
//!   as `Cancelled`, with the time they had already spent.
pub mod batch;
pub use batch::BatchExecutor;

use std::time::Duration;

use crate::{aggregate::BatchStats, metric::Outcome};

/// Everything a batch produced.
///
/// `outcomes` has exactly one entry per input, `outcomes[i].slot == i`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    pub outcomes: Vec<Outcome<T>>,
    /// Elapsed time for the whole batch, dispatch to join.
    pub wall_clock: Duration,
    pub stats: BatchStats,
}

impl<T> BatchResult<T> {
    pub fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            wall_clock: Duration::ZERO,
            stats: BatchStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Sum of every individual call duration.
    pub fn summed_duration(&self) -> Duration {
        self.stats.summed_duration
    }

    pub fn failure_count(&self) -> usize {
        self.stats.failure_count
    }

    /// Successful values with their slot, in slot order.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.value().map(|v| (o.slot, v)))
    }
}
