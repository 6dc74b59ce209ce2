use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use rollcall::{
    Account, ApiClient, BalanceOperation, CsvReporter, MeasurementCycle, RegisterOperation,
    Shutdown, ShutdownTrigger, bootstrap,
    config::{Args, Settings},
    shutdown_channel,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::try_from(Args::parse())?;
    tracing::info!(?settings, "Starting rollcall");

    tokio::fs::create_dir_all(&settings.report_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create report directory {}",
                settings.report_dir.display()
            )
        })?;

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(watch_interrupts(trigger));

    // NEVER build clients per call, clones share one connection pool
    let client = ApiClient::new(settings.base_url.clone());
    let executor = settings.executor(shutdown.clone());

    let register = Arc::new(RegisterOperation::new(client.clone()));
    let accounts = bootstrap(settings.accounts, &executor, &register).await;
    if !should_measure(&accounts, &shutdown, &settings)? {
        return Ok(());
    }

    let summary = MeasurementCycle::builder()
        .executor(executor)
        .operation(Arc::new(BalanceOperation::new(client, settings.token.clone())))
        .reporter(CsvReporter::new(settings.report_dir.clone()))
        .interval(settings.interval)
        .rounds(settings.rounds)
        .shutdown(shutdown)
        .build()
        .run(accounts.into())
        .await;

    tracing::info!(?summary, "Done");
    Ok(())
}

/// First Ctrl-C drains, the second aborts calls in flight, the third exits.
async fn watch_interrupts(trigger: ShutdownTrigger) {
    let mut presses = 0;
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to listen for Ctrl-C: {e}");
            return;
        }
        presses += 1;
        match presses {
            1 => {
                tracing::info!("Interrupted, finishing the current round...");
                tracing::info!("Press Ctrl-C again to abort calls in flight.");
                trigger.trigger();
            }
            2 => {
                tracing::warn!("Interrupted again, aborting calls in flight...");
                trigger.abort();
            }
            _ => std::process::exit(130),
        }
    }
}

/// Whether bootstrapping left anything to measure. An empty working set is an
/// error unless the user interrupted the run while it was registering.
fn should_measure(
    accounts: &[Account],
    shutdown: &Shutdown,
    settings: &Settings,
) -> anyhow::Result<bool> {
    if shutdown.is_triggered() {
        let registered = accounts.len();
        tracing::info!(registered, "Interrupted while registering, exiting.");
        return Ok(false);
    }
    if accounts.is_empty() {
        bail!("no account could be registered against {}", settings.base_url);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::try_from(Args::parse_from(["rollcall"])).unwrap()
    }

    fn account() -> Account {
        Account {
            username: "ann".into(),
            email: "ann@example.com".into(),
            access_token: "t-ann".into(),
        }
    }

    #[test]
    fn interrupted_bootstrap_exits_cleanly() {
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();

        assert!(!should_measure(&[], &shutdown, &settings()).unwrap());
        assert!(!should_measure(&[account()], &shutdown, &settings()).unwrap());
    }

    #[test]
    fn empty_bootstrap_without_interrupt_is_an_error() {
        let (_trigger, shutdown) = shutdown_channel();

        let err = should_measure(&[], &shutdown, &settings()).unwrap_err();
        assert!(err.to_string().contains("no account could be registered"));
        assert!(should_measure(&[account()], &shutdown, &settings()).unwrap());
    }
}
