use std::{
    fmt::Write as _,
    future::Future,
    io::ErrorKind,
    path::PathBuf,
    time::Duration,
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use crate::{
    api::{Account, Balance},
    executor::BatchResult,
};

pub const CSV_HEADER: &str = "Username,Balance,ActualDuration,SumDuration";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report sink rejected the round: {0}")]
    Sink(String),
}

/// One line of a round report.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRow {
    pub username: String,
    /// `None` when the lookup for this account failed.
    pub balance: Option<f64>,
}

/// The processed form of one measurement round.
///
/// A report is pure data; writing it anywhere is the job of a [`Reporter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: usize,
    pub started_at: DateTime<Utc>,
    pub rows: Vec<RoundRow>,
    pub wall_clock: Duration,
    pub summed_duration: Duration,
    pub failure_count: usize,
}

impl RoundReport {
    /// Pairs every outcome with the account it was issued for, using the
    /// outcome's slot rather than its position.
    pub fn new(
        round: usize,
        started_at: DateTime<Utc>,
        accounts: &[Account],
        batch: &BatchResult<Balance>,
    ) -> Self {
        let rows = batch
            .outcomes
            .iter()
            .filter_map(|o| {
                accounts.get(o.slot).map(|account| RoundRow {
                    username: account.username.clone(),
                    balance: o.value().map(|b| b.value),
                })
            })
            .collect();

        Self {
            round,
            started_at,
            rows,
            wall_clock: batch.wall_clock,
            summed_duration: batch.summed_duration(),
            failure_count: batch.failure_count(),
        }
    }

    /// Usernames whose balance is missing from this round.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter(|r| r.balance.is_none())
            .map(|r| r.username.as_str())
    }

    /// Renders the report as comma separated values, header first.
    ///
    /// Missing balances are left empty. Durations use their `Debug` form,
    /// e.g. `12.5ms`.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(64 * (self.rows.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for row in &self.rows {
            let balance = row.balance.map(|b| format!("{b:.6}")).unwrap_or_default();
            // Writing into a String cannot fail.
            let _ = writeln!(
                out,
                "{},{},{:?},{:?}",
                csv_field(&row.username),
                balance,
                self.wall_clock,
                self.summed_duration
            );
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// A [`Reporter`] consumes a [`RoundReport`] and persists or displays it.
///
/// Reporters are the I/O boundary of a measurement round. A failing reporter
/// never stops the measurement loop; the error is logged and the next round
/// runs as usual.
pub trait Reporter {
    fn report(&self, report: &RoundReport) -> impl Future<Output = Result<(), ReportError>> + Send;
}

/// Writes every round to its own `log_<unix seconds>.csv` file in `dir`.
///
/// When two rounds land in the same second the later file gets a `_<n>`
/// suffix, so no round overwrites another.
#[derive(Debug, Clone)]
pub struct CsvReporter {
    dir: PathBuf,
}

impl CsvReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidate(&self, stamp: i64, attempt: usize) -> PathBuf {
        let name = match attempt {
            0 => format!("log_{stamp}.csv"),
            n => format!("log_{stamp}_{n}.csv"),
        };
        self.dir.join(name)
    }

    async fn create_unique(&self, stamp: i64) -> Result<(PathBuf, tokio::fs::File), ReportError> {
        let mut attempt = 0;
        loop {
            let path = self.candidate(stamp, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(ReportError::Io { path, source }),
            }
        }
    }
}

impl Reporter for CsvReporter {
    async fn report(&self, report: &RoundReport) -> Result<(), ReportError> {
        let (path, mut file) = self.create_unique(report.started_at.timestamp()).await?;
        let body = report.to_csv();

        let written = async {
            file.write_all(body.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(source) = written {
            return Err(ReportError::Io { path, source });
        }

        tracing::info!(
            round = report.round,
            rows = report.rows.len(),
            path = %path.display(),
            "Round report written"
        );
        Ok(())
    }
}
