use std::{sync::Arc, time::Duration};

use chrono::Utc;
use typed_builder::TypedBuilder;

use crate::{
    api::{Account, Balance},
    executor::BatchExecutor,
    operation::RemoteOperation,
    report::{Reporter, RoundReport},
    shutdown::Shutdown,
};

/// What a finished measurement loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub rounds: usize,
    pub failed_calls: usize,
    pub report_failures: usize,
}

/// Polls every account once per round, hands each round to the reporter and
/// waits `interval` before starting the next one.
///
/// Rounds never overlap: round `n + 1` is dispatched only after round `n`
/// has been reported. The loop ends after `rounds` rounds when a limit is set,
/// or once `shutdown` is raised. A round that is running when shutdown
/// arrives still gets reported.
#[derive(TypedBuilder)]
pub struct MeasurementCycle<Op, R> {
    executor: BatchExecutor,
    operation: Arc<Op>,
    reporter: R,
    /// Pause between the end of one round and the start of the next.
    #[builder(default = Duration::from_secs(1))]
    interval: Duration,
    /// Stop after this many rounds, `None` runs until shutdown.
    #[builder(default)]
    rounds: Option<usize>,
    shutdown: Shutdown,
}

impl<Op, R> MeasurementCycle<Op, R>
where
    Op: RemoteOperation<Account, Output = Balance> + 'static,
    R: Reporter,
{
    /// Runs rounds over `accounts`. The same slice is handed to every round,
    /// accounts are never copied between rounds.
    pub async fn run(&self, accounts: Arc<[Account]>) -> CycleSummary {
        let mut shutdown = self.shutdown.clone();
        let mut summary = CycleSummary::default();
        tracing::info!(
            accounts = accounts.len(),
            interval = ?self.interval,
            "Starting measurement rounds..."
        );

        loop {
            if self.rounds.is_some_and(|limit| summary.rounds >= limit) {
                break;
            }
            if shutdown.is_triggered() {
                tracing::info!("Shutdown requested, not starting another round.");
                break;
            }

            let round = summary.rounds;
            let started_at = Utc::now();
            let batch = self
                .executor
                .execute_shared(Arc::clone(&accounts), &self.operation)
                .await;
            let report = RoundReport::new(round, started_at, &accounts, &batch);

            tracing::info!(
                round,
                wall_clock = ?report.wall_clock,
                summed = ?report.summed_duration,
                failures = report.failure_count,
                "Round finished"
            );
            if report.failure_count > 0 {
                let missing: Vec<&str> = report.missing().collect();
                tracing::warn!(round, ?missing, "Balances missing for some accounts");
            }

            if let Err(e) = self.reporter.report(&report).await {
                tracing::error!(round, "Failed to report round, continuing: {e}");
                summary.report_failures += 1;
            }
            summary.rounds += 1;
            summary.failed_calls += report.failure_count;

            if self.rounds.is_some_and(|limit| summary.rounds >= limit) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => {
                    tracing::info!(round, "Shutdown requested during pause.");
                    break;
                }
            }
        }

        tracing::info!(
            rounds = summary.rounds,
            failed_calls = summary.failed_calls,
            report_failures = summary.report_failures,
            "Measurement stopped"
        );
        summary
    }
}
