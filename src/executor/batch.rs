use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinHandle},
    time::Instant,
};
use typed_builder::TypedBuilder;

use super::BatchResult;
use crate::{
    aggregate::{Aggregate, BatchStats},
    metric::Outcome,
    operation::{OperationError, RemoteOperation, Sample},
    shutdown::Shutdown,
};
use workers::*;

/// Runs one batch of remote calls concurrently and collects their outcomes.
///
/// - One worker task per input; no ordering between workers.
/// - `concurrency` bounds how many calls are open at the same time, so the
///   batch size does not dictate the number of simultaneous connections.
/// - `call_timeout` puts a deadline on every call. A call that misses it is
///   reported as [`OperationError::Timeout`] instead of stalling the batch.
/// - `shutdown` cancels workers that have not started their call yet. Once it
///   is escalated to an abort, calls in flight are cut off too.
///
/// # Tuning Knobs
///
/// - `concurrency`: defaults to `num_cpus * 120`, which suits I/O bound calls.
///   Lower it when the remote service is rate limited.
/// - `call_timeout`: none by default, meaning a hung call blocks its batch
///   until it returns or shutdown is aborted.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BatchExecutor {
    /// Maximum number of calls in flight at once.
    #[builder(default = default_concurrency())]
    pub concurrency: usize,
    /// Deadline for every individual call.
    #[builder(default, setter(strip_option))]
    pub call_timeout: Option<Duration>,
    /// Signal that stops workers from starting new calls.
    #[builder(default, setter(strip_option))]
    pub shutdown: Option<Shutdown>,
}

/// 120 workers per cpu suits I/O bound calls.
pub fn default_concurrency() -> usize {
    num_cpus::get() * 120
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BatchExecutor {
    /// Execute `operation` once for every input and block until all workers
    /// are done.
    ///
    /// The returned result always holds exactly `inputs.len()` outcomes, one
    /// per slot, failed or not.
    pub async fn execute<I, Op>(
        &self,
        inputs: Vec<I>,
        operation: &Arc<Op>,
    ) -> BatchResult<Op::Output>
    where
        I: Send + Sync + 'static,
        Op: RemoteOperation<I> + 'static,
    {
        self.execute_shared(inputs.into(), operation).await
    }

    /// Like [`execute`](Self::execute), for inputs that are reused across
    /// batches. Workers borrow from the shared slice, nothing is copied.
    pub async fn execute_shared<I, Op>(
        &self,
        inputs: Arc<[I]>,
        operation: &Arc<Op>,
    ) -> BatchResult<Op::Output>
    where
        I: Send + Sync + 'static,
        Op: RemoteOperation<I> + 'static,
    {
        if inputs.is_empty() {
            return BatchResult::empty();
        }

        let size = inputs.len();
        let ctx = WorkerContext {
            permits: Arc::new(Semaphore::new(
                self.concurrency.clamp(1, Semaphore::MAX_PERMITS),
            )),
            call_timeout: self.call_timeout,
            shutdown: self.shutdown.clone(),
        };

        tracing::debug!(size, concurrency = self.concurrency, "Dispatching batch...");
        let start = Instant::now();
        let handles = spawn_workers(&ctx, &inputs, operation);
        let joined = join_all(handles).await;
        let wall_clock = start.elapsed();

        let outcomes = assemble_slots(size, joined);
        let mut stats = BatchStats::default();
        stats.aggregate(&outcomes);

        tracing::debug!(
            size,
            failures = stats.failure_count,
            ?wall_clock,
            summed = ?stats.summed_duration,
            "Batch finished"
        );

        BatchResult {
            outcomes,
            wall_clock,
            stats,
        }
    }
}

/// Worker spawning and slot assembly for [`BatchExecutor`].
mod workers {
    use super::*;

    /// State every worker of one batch gets a copy of.
    #[derive(Clone)]
    pub struct WorkerContext {
        pub permits: Arc<Semaphore>,
        pub call_timeout: Option<Duration>,
        pub shutdown: Option<Shutdown>,
    }

    impl WorkerContext {
        async fn shutdown_raised(&mut self) {
            match self.shutdown.as_mut() {
                Some(shutdown) => shutdown.wait().await,
                None => std::future::pending().await,
            }
        }

        async fn abort_raised(&mut self) {
            match self.shutdown.as_mut() {
                Some(shutdown) => shutdown.wait_abort().await,
                None => std::future::pending().await,
            }
        }

        fn is_shutting_down(&self) -> bool {
            self.shutdown.as_ref().is_some_and(Shutdown::is_triggered)
        }
    }

    /// Spawns one task per input. Handle `i` belongs to slot `i`.
    pub fn spawn_workers<I, Op>(
        ctx: &WorkerContext,
        inputs: &Arc<[I]>,
        operation: &Arc<Op>,
    ) -> Vec<JoinHandle<Outcome<Op::Output>>>
    where
        I: Send + Sync + 'static,
        Op: RemoteOperation<I> + 'static,
    {
        (0..inputs.len())
            .map(|slot| {
                let ctx = ctx.clone();
                let inputs = Arc::clone(inputs);
                let operation = Arc::clone(operation);
                tokio::spawn(run_worker(ctx, slot, inputs, operation))
            })
            .collect()
    }

    async fn run_worker<I, Op>(
        mut ctx: WorkerContext,
        slot: usize,
        inputs: Arc<[I]>,
        operation: Arc<Op>,
    ) -> Outcome<Op::Output>
    where
        I: Send + Sync + 'static,
        Op: RemoteOperation<I> + 'static,
    {
        let permits = Arc::clone(&ctx.permits);
        let permit = tokio::select! {
            biased;
            _ = ctx.shutdown_raised() => None,
            permit = permits.acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            tracing::debug!(slot, "Worker cancelled before its call.");
            return Outcome::failed(slot, OperationError::Cancelled, Duration::ZERO);
        };
        // The permit may have been granted in the same instant shutdown was raised.
        if ctx.is_shutting_down() {
            tracing::debug!(slot, "Worker cancelled before its call.");
            return Outcome::failed(slot, OperationError::Cancelled, Duration::ZERO);
        }

        let input = &inputs[slot];
        let call_timeout = ctx.call_timeout;
        let started = Instant::now();
        let call = async {
            match call_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation.call(input)).await {
                    Ok(sample) => sample,
                    Err(_) => {
                        tracing::warn!(slot, ?limit, "Call exceeded its deadline.");
                        Sample::failed(OperationError::Timeout(limit), limit)
                    }
                },
                None => operation.call(input).await,
            }
        };
        let sample = tokio::select! {
            biased;
            _ = ctx.abort_raised() => {
                tracing::warn!(slot, "Call aborted while in flight.");
                Sample::failed(OperationError::Cancelled, started.elapsed())
            }
            sample = call => sample,
        };

        if let Err(e) = &sample.value {
            tracing::debug!(slot, error = %e, "Call failed.");
        }
        Outcome::from_sample(slot, sample)
    }

    /// Places every joined outcome into its own slot of a pre-sized container.
    ///
    /// `joined[i]` is the join result of the worker spawned for slot `i`; a
    /// worker that panicked is recorded as a failure in that slot.
    pub fn assemble_slots<T>(
        size: usize,
        joined: Vec<Result<Outcome<T>, JoinError>>,
    ) -> Vec<Outcome<T>> {
        let mut slots: Vec<Option<Outcome<T>>> = (0..size).map(|_| None).collect();

        for (spawned, res) in joined.into_iter().enumerate() {
            match res {
                Ok(outcome) => {
                    let slot = outcome.slot;
                    slots[slot] = Some(outcome);
                }
                Err(e) => {
                    tracing::error!(slot = spawned, "Worker panicked with error: {e}");
                    slots[spawned] = Some(Outcome::failed(
                        spawned,
                        OperationError::Panicked(e.to_string()),
                        Duration::ZERO,
                    ));
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(slot, outcome)| {
                outcome.unwrap_or_else(|| {
                    Outcome::failed(
                        slot,
                        OperationError::Panicked("worker produced no outcome".into()),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }
}
