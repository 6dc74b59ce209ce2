use std::{path::PathBuf, time::Duration};

use anyhow::{Context, bail, ensure};
use clap::Parser;
use reqwest::Url;

use crate::{
    executor::{BatchExecutor, batch::default_concurrency},
    shutdown::Shutdown,
};

/// Registers a batch of synthetic accounts, then polls their balances in
/// rounds and writes one CSV report per round.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Number of accounts to register before polling.
    #[arg(long, env = "ROLLCALL_ACCOUNTS", default_value_t = 500)]
    pub accounts: usize,

    /// Base URL of the account service.
    #[arg(long, env = "ROLLCALL_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Token whose balance is polled.
    #[arg(long, env = "ROLLCALL_TOKEN", default_value = "gas")]
    pub token: String,

    /// Pause between rounds, in milliseconds.
    #[arg(long, env = "ROLLCALL_INTERVAL_MS", default_value_t = 1000)]
    pub interval_ms: u64,

    /// Maximum number of calls in flight at once. Defaults to 120 per cpu.
    #[arg(long, env = "ROLLCALL_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Deadline for a single call, in milliseconds. No deadline when unset.
    #[arg(long, env = "ROLLCALL_CALL_TIMEOUT_MS")]
    pub call_timeout_ms: Option<u64>,

    /// Directory the round reports are written to.
    #[arg(long, env = "ROLLCALL_REPORT_DIR", default_value = ".")]
    pub report_dir: PathBuf,

    /// Stop after this many rounds. Runs until interrupted when unset.
    #[arg(long, env = "ROLLCALL_ROUNDS")]
    pub rounds: Option<usize>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub accounts: usize,
    pub base_url: Url,
    pub token: String,
    pub interval: Duration,
    pub concurrency: usize,
    pub call_timeout: Option<Duration>,
    pub report_dir: PathBuf,
    pub rounds: Option<usize>,
}

impl Settings {
    pub fn executor(&self, shutdown: Shutdown) -> BatchExecutor {
        BatchExecutor {
            concurrency: self.concurrency,
            call_timeout: self.call_timeout,
            shutdown: Some(shutdown),
        }
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        ensure!(args.accounts > 0, "--accounts must be at least 1");
        ensure!(!args.token.trim().is_empty(), "--token must not be empty");

        let base_url = Url::parse(&args.base_url)
            .with_context(|| format!("invalid --base-url {:?}", args.base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!("--base-url must use http or https, got {}", base_url.scheme());
        }

        let concurrency = match args.concurrency {
            Some(0) => bail!("--concurrency must be at least 1"),
            Some(n) => n,
            None => default_concurrency(),
        };
        let call_timeout = match args.call_timeout_ms {
            Some(0) => bail!("--call-timeout-ms must be at least 1"),
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };
        if args.rounds == Some(0) {
            bail!("--rounds must be at least 1");
        }

        Ok(Self {
            accounts: args.accounts,
            base_url,
            token: args.token,
            interval: Duration::from_millis(args.interval_ms),
            concurrency,
            call_timeout,
            report_dir: args.report_dir,
            rounds: args.rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<Settings> {
        let argv = std::iter::once("rollcall").chain(extra.iter().copied());
        Settings::try_from(Args::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_match_the_reference_setup() {
        let settings = parse(&[]).unwrap();

        assert_eq!(settings.accounts, 500);
        assert_eq!(settings.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(settings.token, "gas");
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.concurrency, default_concurrency());
        assert_eq!(settings.call_timeout, None);
        assert_eq!(settings.rounds, None);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = parse(&[
            "--accounts",
            "20",
            "--base-url",
            "https://accounts.internal:9443",
            "--token",
            "gold",
            "--interval-ms",
            "250",
            "--concurrency",
            "8",
            "--call-timeout-ms",
            "1500",
            "--report-dir",
            "/tmp/reports",
            "--rounds",
            "3",
        ])
        .unwrap();

        assert_eq!(settings.accounts, 20);
        assert_eq!(settings.token, "gold");
        assert_eq!(settings.interval, Duration::from_millis(250));
        assert_eq!(settings.concurrency, 8);
        assert_eq!(settings.call_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(settings.report_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(settings.rounds, Some(3));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--accounts", "0"]).is_err());
        assert!(parse(&["--concurrency", "0"]).is_err());
        assert!(parse(&["--call-timeout-ms", "0"]).is_err());
        assert!(parse(&["--rounds", "0"]).is_err());
        assert!(parse(&["--token", " "]).is_err());
        assert!(parse(&["--base-url", "not a url"]).is_err());
        assert!(parse(&["--base-url", "ftp://example.com"]).is_err());
    }

    #[test]
    fn executor_carries_limits() {
        let settings = parse(&["--concurrency", "4", "--call-timeout-ms", "100"]).unwrap();
        let (_trigger, shutdown) = crate::shutdown::shutdown_channel();
        let executor = settings.executor(shutdown);

        assert_eq!(executor.concurrency, 4);
        assert_eq!(executor.call_timeout, Some(Duration::from_millis(100)));
        assert!(executor.shutdown.is_some());
    }
}
