//! Coordinated process shutdown.
//!
//! State machine: `Running -> DrainRequested -> Draining -> Stopped`.
//! A termination signal stops new connections; in-flight requests get a
//! bounded grace period; the drain barrier then blocks until every
//! outstanding one-shot worker has finished. Persistent workers are
//! abandoned at exit.

use crate::supervisor::Supervisor;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// Fixed ceiling for in-flight request completion.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownState {
    Running,
    DrainRequested,
    Draining,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("In-flight requests did not complete within the {0:?} grace period")]
    GracePeriodExceeded(Duration),

    #[error("Server failed during drain: {0}")]
    Server(String),
}

pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            state,
            grace_period,
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Observe state transitions, e.g. from tests or a health endpoint.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Move `Running -> DrainRequested`. Idempotent; later states are
    /// never rewound.
    pub fn request_drain(&self) {
        self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::DrainRequested;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once a drain has been requested. Handed to the server's
    /// graceful-shutdown hook, so it must not borrow `self`.
    pub fn drain_requested(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.state.subscribe();
        async move {
            // Closed sender means the coordinator is gone; treat it as a
            // drain request rather than serving forever.
            let _ = rx
                .wait_for(|state| *state >= ShutdownState::DrainRequested)
                .await;
        }
    }

    /// Spawn the termination-signal listener (SIGINT/SIGTERM).
    pub fn listen_for_signals(&self) {
        let state = self.state.clone();
        tokio::spawn(async move {
            wait_for_termination_signal().await;
            state.send_if_modified(|state| {
                if *state == ShutdownState::Running {
                    *state = ShutdownState::DrainRequested;
                    true
                } else {
                    false
                }
            });
        });
    }

    /// Drive the shutdown sequence to its terminal state.
    ///
    /// Blocks until a drain is requested, gives the server task up to the
    /// grace period to finish in-flight requests, then blocks on the
    /// supervisor's drain barrier. Reports success or the first error
    /// encountered; an exceeded grace period is an error, not a hang.
    pub async fn wait(
        &self,
        server: JoinHandle<std::io::Result<()>>,
        supervisor: &Supervisor,
    ) -> Result<(), ShutdownError> {
        let mut server = server;
        let mut first_error = None;

        tokio::select! {
            _ = self.drain_requested() => {
                tracing::info!("Shutdown requested, draining connections");
                match timeout(self.grace_period, &mut server).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(e))) => first_error = Some(ShutdownError::Server(e.to_string())),
                    Ok(Err(join_err)) => {
                        first_error = Some(ShutdownError::Server(join_err.to_string()))
                    }
                    Err(_) => {
                        first_error = Some(ShutdownError::GracePeriodExceeded(self.grace_period))
                    }
                }
            }
            result = &mut server => {
                // The server stopped without a drain request; still drain
                // workers before reporting.
                tracing::error!("Server exited before shutdown was requested");
                self.request_drain();
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => first_error = Some(ShutdownError::Server(e.to_string())),
                    Err(join_err) => first_error = Some(ShutdownError::Server(join_err.to_string())),
                }
            }
        }

        self.state.send_replace(ShutdownState::Draining);
        tracing::info!(
            pending = supervisor.pending(),
            "Waiting for background tasks"
        );
        supervisor.wait().await;

        self.state.send_replace(ShutdownState::Stopped);
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received ctrl-c");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn completed_server() -> JoinHandle<std::io::Result<()>> {
        tokio::spawn(async { Ok(()) })
    }

    #[tokio::test(start_paused = true)]
    async fn states_advance_in_order() {
        let coordinator = ShutdownCoordinator::default();
        let supervisor = Supervisor::new();

        assert_eq!(coordinator.state(), ShutdownState::Running);

        // Observe the Draining phase from a subscriber while wait runs.
        let mut rx = coordinator.subscribe();
        let observed_draining = tokio::spawn(async move {
            rx.wait_for(|state| *state >= ShutdownState::Draining)
                .await
                .is_ok()
        });

        coordinator.request_drain();
        assert_eq!(coordinator.state(), ShutdownState::DrainRequested);

        coordinator.wait(completed_server(), &supervisor).await.unwrap();
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
        assert!(observed_draining.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn request_drain_is_idempotent_and_never_rewinds() {
        let coordinator = ShutdownCoordinator::default();

        coordinator.request_drain();
        assert_eq!(coordinator.state(), ShutdownState::DrainRequested);
        coordinator.request_drain();
        assert_eq!(coordinator.state(), ShutdownState::DrainRequested);

        coordinator.state.send_replace(ShutdownState::Stopped);
        coordinator.request_drain();
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_all_one_shot_workers() {
        let coordinator = ShutdownCoordinator::default();
        let supervisor = Supervisor::new();
        let completed = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let completed = Arc::clone(&completed);
            supervisor.in_background("in-flight work", async move {
                sleep(Duration::from_secs(10 * (i + 1))).await;
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }

        coordinator.request_drain();
        coordinator.wait(completed_server(), &supervisor).await.unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_wait_for_persistent_workers() {
        let coordinator = ShutdownCoordinator::default();
        let supervisor = Supervisor::new();

        supervisor.start_process("recurring sweep", async {
            std::future::pending::<()>().await;
        });

        coordinator.request_drain();
        coordinator.wait(completed_server(), &supervisor).await.unwrap();
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn grace_period_exceeded_is_an_error_not_a_hang() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(30));
        let supervisor = Supervisor::new();

        let stuck_server: JoinHandle<std::io::Result<()>> = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        });

        coordinator.request_drain();
        let err = coordinator.wait(stuck_server, &supervisor).await.unwrap_err();

        assert!(matches!(err, ShutdownError::GracePeriodExceeded(_)));
        // Worker draining still ran to completion.
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn server_failure_before_signal_still_drains_workers() {
        let coordinator = ShutdownCoordinator::default();
        let supervisor = Supervisor::new();
        let completed = Arc::new(AtomicUsize::new(0));

        let completed_clone = Arc::clone(&completed);
        supervisor.in_background("in-flight work", async move {
            sleep(Duration::from_secs(5)).await;
            completed_clone.fetch_add(1, Ordering::SeqCst);
        });

        let failing_server: JoinHandle<std::io::Result<()>> = tokio::spawn(async {
            Err(std::io::Error::other("listener blew up"))
        });

        let err = coordinator
            .wait(failing_server, &supervisor)
            .await
            .unwrap_err();

        assert!(matches!(err, ShutdownError::Server(_)));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_requested_resolves_for_late_subscribers() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.request_drain();

        // Subscribing after the transition must still resolve immediately.
        coordinator.drain_requested().await;
    }
}
