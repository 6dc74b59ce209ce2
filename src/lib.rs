//! Rollcall, a synthetic load generator for a remote account service.
//!
//! Rollcall registers a batch of throwaway accounts, then polls the balance of
//! every one of them in rounds, measuring each call and every round as a whole.
//! Each round is written out as its own report.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`RemoteOperation`]: one network round trip for one input. Registration and
//!   balance lookup are the two operations shipped in [`api`].
//! - [`BatchExecutor`]: fans a fixed batch of inputs out to concurrent workers
//!   and fans their [`Outcome`]s back in, one per input slot. This is where all
//!   the concurrency lives.
//! - [`Aggregate`]: folds outcomes into [`BatchStats`] after every worker of a
//!   batch is done, so totals are exact without any shared accumulator.
//! - [`bootstrap`]: registers the working set of [`Account`]s once.
//! - [`MeasurementCycle`]: repeats batches of balance lookups over the accounts,
//!   one round at a time, until a round limit or shutdown.
//! - [`Reporter`]: consumes a [`RoundReport`] and persists it somewhere. The
//!   built-in [`CsvReporter`] writes one CSV file per round.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use rollcall::{
//!     ApiClient, BalanceOperation, BatchExecutor, CsvReporter, MeasurementCycle,
//!     RegisterOperation, bootstrap, shutdown_channel,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     // Build the client once; clones share its connection pool.
//!     let client = ApiClient::new("http://localhost:8080".parse().unwrap());
//!     let (_trigger, shutdown) = shutdown_channel();
//!     let executor = BatchExecutor::builder()
//!         .concurrency(64)
//!         .call_timeout(Duration::from_secs(5))
//!         .shutdown(shutdown.clone())
//!         .build();
//!
//!     let register = Arc::new(RegisterOperation::new(client.clone()));
//!     let accounts = bootstrap(100, &executor, &register).await;
//!
//!     MeasurementCycle::builder()
//!         .executor(executor)
//!         .operation(Arc::new(BalanceOperation::new(client, "gas")))
//!         .reporter(CsvReporter::new("."))
//!         .rounds(Some(10))
//!         .shutdown(shutdown)
//!         .build()
//!         .run(accounts.into())
//!         .await;
//! }
//! ```

/// Account service wire types and HTTP operations
pub mod api;
/// Batch totals
pub mod aggregate;
/// One-time account registration
pub mod bootstrap;
/// Command line and environment configuration
pub mod config;
/// Repeated measurement rounds
pub mod cycle;
/// Concurrent batch execution
pub mod executor;
/// Per-call outcomes
pub mod metric;
/// The remote call contract
pub mod operation;
/// Round reports and reporters
pub mod report;
/// Cooperative shutdown signal
pub mod shutdown;

pub use aggregate::{Aggregate, BatchStats};
pub use api::{
    Account, ApiClient, Balance, BalanceOperation, RegisterOperation, RegistrationRequest,
};
pub use bootstrap::bootstrap;
pub use cycle::{CycleSummary, MeasurementCycle};
pub use executor::{BatchExecutor, BatchResult};
pub use metric::{Metric, Outcome};
pub use operation::{OperationError, RemoteOperation, Sample};
pub use report::{CsvReporter, ReportError, Reporter, RoundReport, RoundRow};
pub use shutdown::{Shutdown, ShutdownTrigger, shutdown_channel};
