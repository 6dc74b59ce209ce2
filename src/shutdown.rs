use tokio::sync::watch::{self, Receiver, Sender};

/// How far shutdown has progressed. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Running,
    /// No new calls start, calls in flight finish.
    Draining,
    /// Calls in flight are cut off as well.
    Aborting,
}

/// Creates a linked pair: the [`ShutdownTrigger`] raises the signal, every
/// clone of the [`Shutdown`] observes it.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(Phase::Running);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Raises the shutdown signal. Raising it more than once is harmless.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: Sender<Phase>,
}

impl ShutdownTrigger {
    /// Graceful shutdown: nothing new is started, running calls are left alone.
    pub fn trigger(&self) {
        self.tx.send_if_modified(|phase| {
            if *phase < Phase::Draining {
                *phase = Phase::Draining;
                true
            } else {
                false
            }
        });
    }

    /// Forceful shutdown: implies [`trigger`](Self::trigger) and also cuts off
    /// calls that are still in flight.
    pub fn abort(&self) {
        self.tx.send_replace(Phase::Aborting);
    }
}

/// Observer side of the shutdown signal, cheap to clone into workers.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Receiver<Phase>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() >= Phase::Draining
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow() == Phase::Aborting
    }

    /// Resolves once the signal is raised.
    ///
    /// A trigger dropped without firing never resolves this future.
    pub async fn wait(&mut self) {
        self.wait_for(Phase::Draining).await
    }

    /// Resolves once shutdown is escalated to an abort.
    pub async fn wait_abort(&mut self) {
        self.wait_for(Phase::Aborting).await
    }

    async fn wait_for(&mut self, phase: Phase) {
        if self.rx.wait_for(|p| *p >= phase).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn clones_observe_trigger() {
        let (trigger, shutdown) = shutdown_channel();
        let mut observer = shutdown.clone();
        assert!(!shutdown.is_triggered());

        trigger.trigger();
        observer.wait().await;
        assert!(shutdown.is_triggered());
        assert!(!shutdown.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_is_not_a_shutdown() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);

        let waited = tokio::time::timeout(Duration::from_secs(1), shutdown.wait()).await;
        assert!(waited.is_err());
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_trigger_does_not_abort() {
        let (trigger, mut shutdown) = shutdown_channel();
        trigger.trigger();

        let waited = tokio::time::timeout(Duration::from_secs(1), shutdown.wait_abort()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn abort_implies_trigger_and_sticks() {
        let (trigger, mut shutdown) = shutdown_channel();
        trigger.abort();
        trigger.trigger();

        shutdown.wait().await;
        shutdown.wait_abort().await;
        assert!(shutdown.is_triggered());
        assert!(shutdown.is_aborted());
    }
}
