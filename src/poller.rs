//! Deletion confirmation.
//!
//! Deletes on the control plane are asynchronous and the delete call itself
//! often times out at the edge while the teardown carries on. A timed-out
//! delete is therefore treated as provisionally accepted and confirmed by
//! polling `get` until the resource reports not-found:
//!
//! ```text
//! Initiated -> Polling -> Confirmed
//!                      -> TimedOut   (deadline elapsed)
//!                      -> Cancelled  (caller token fired)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollerSettings;
use crate::error::{HalldyllError, ReconcileError, Result};
use crate::gateway::{RemoteGateway, ResourceId};

/// Source of time for the poller.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspends for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer. Honors paused time in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Delete issued.
    Initiated,
    /// Waiting for not-found.
    Polling,
    /// Resource confirmed gone.
    Confirmed,
    /// Deadline elapsed.
    TimedOut,
    /// Caller cancelled.
    Cancelled,
}

/// Outcome of a confirmed deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionReport {
    /// Number of `get` calls issued.
    pub polls: u32,
    /// Time from the delete call to confirmation.
    pub elapsed: Duration,
    /// Whether the delete call timed out and was accepted provisionally.
    pub provisional: bool,
}

/// Confirms deletions by polling.
#[derive(Debug, Clone)]
pub struct DeletionPoller<C: Clock = TokioClock> {
    interval: Duration,
    deadline: Duration,
    timeout_hint: Duration,
    clock: C,
}

impl DeletionPoller {
    /// Creates a poller on the tokio clock.
    #[must_use]
    pub fn new(settings: &PollerSettings) -> Self {
        Self::with_clock(settings, TokioClock)
    }
}

impl<C: Clock> DeletionPoller<C> {
    /// Creates a poller on the given clock.
    #[must_use]
    pub fn with_clock(settings: &PollerSettings, clock: C) -> Self {
        Self {
            interval: settings.interval(),
            deadline: settings.deadline(),
            timeout_hint: settings.delete_timeout_hint(),
            clock,
        }
    }

    /// Deletes `id` and waits until the control plane confirms it is gone.
    ///
    /// # Errors
    ///
    /// - `ReconcileError::PollTimeout` if the deadline elapses first
    /// - `ReconcileError::Cancelled` if `cancel` fires
    /// - the delete call's own error if it is neither a timeout nor not-found
    pub async fn run<G: RemoteGateway + ?Sized>(
        &self,
        gateway: &G,
        id: &ResourceId,
        cancel: &CancellationToken,
    ) -> Result<DeletionReport> {
        let started = self.clock.now();
        enter(id, PollState::Initiated);

        let deleted = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                enter(id, PollState::Cancelled);
                return Err(cancelled(id, "cancelled during delete request"));
            }
            result = gateway.delete(id, self.timeout_hint) => result,
        };

        let provisional = match deleted {
            Ok(()) => false,
            Err(e) if e.is_not_found() => {
                enter(id, PollState::Confirmed);
                info!("Deployment {id} was already gone");
                return Ok(DeletionReport {
                    polls: 0,
                    elapsed: self.elapsed(started),
                    provisional: false,
                });
            }
            Err(e) if e.is_timeout() => {
                info!("Delete of {id} timed out, confirming by polling: {e}");
                true
            }
            Err(e) => return Err(e),
        };

        enter(id, PollState::Polling);
        let mut polls: u32 = 0;

        loop {
            let remaining = self.deadline.saturating_sub(self.elapsed(started));
            let observed = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    enter(id, PollState::Cancelled);
                    return Err(cancelled(id, &format!("cancelled after {polls} polls")));
                }
                result = gateway.get(id) => Some(result),
                () = self.clock.sleep(remaining) => None,
            };
            polls += 1;

            match observed {
                Some(Err(e)) if e.is_not_found() => {
                    let elapsed = self.elapsed(started);
                    enter(id, PollState::Confirmed);
                    info!("Deletion of {id} confirmed after {polls} polls in {elapsed:?}");
                    return Ok(DeletionReport {
                        polls,
                        elapsed,
                        provisional,
                    });
                }
                Some(Ok(_)) => debug!("Deployment {id} still present (poll {polls})"),
                Some(Err(e)) => warn!("Transient error while confirming deletion of {id}: {e}"),
                None => debug!("Poll {polls} of {id} still in flight at deadline"),
            }

            let elapsed = self.elapsed(started);
            if elapsed >= self.deadline {
                enter(id, PollState::TimedOut);
                return Err(ReconcileError::PollTimeout {
                    resource: id.to_string(),
                    waited_secs: elapsed.as_secs(),
                    polls,
                }
                .into());
            }

            let wait = self.interval.min(self.deadline - elapsed);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    enter(id, PollState::Cancelled);
                    return Err(cancelled(id, &format!("cancelled after {polls} polls")));
                }
                () = self.clock.sleep(wait) => {}
            }
        }
    }

    fn elapsed(&self, started: Instant) -> Duration {
        self.clock.now().saturating_duration_since(started)
    }
}

fn enter(id: &ResourceId, state: PollState) {
    debug!("Deletion of {id}: {state}");
}

fn cancelled(id: &ResourceId, reason: &str) -> HalldyllError {
    ReconcileError::Cancelled {
        resource: id.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Initiated => "initiated",
            Self::Polling => "polling",
            Self::Confirmed => "confirmed",
            Self::TimedOut => "timed out",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{state}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceKind;
    use crate::error::GatewayError;
    use crate::gateway::RemoteDeployment;
    use crate::gateway::fake::{FakeGateway, Scripted};
    use tokio_test::{assert_err, assert_ok};

    fn settings() -> PollerSettings {
        PollerSettings {
            interval_secs: 10,
            deadline_secs: 300,
            delete_timeout_hint_secs: 5,
        }
    }

    fn id() -> ResourceId {
        ResourceId::new(ResourceKind::Deployment, "dep-1")
    }

    fn present() -> Scripted {
        Scripted::Found(RemoteDeployment::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_delete_confirmed_by_polling() {
        let gateway = FakeGateway::new()
            .with_delete(Scripted::Timeout)
            .with_gets([present(), present(), Scripted::NotFound]);

        let report = DeletionPoller::new(&settings())
            .run(&gateway, &id(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.polls, 3);
        assert_eq!(report.elapsed, Duration::from_secs(20));
        assert!(report.provisional);
        assert_eq!(gateway.get_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_exactly_n_intervals() {
        for n in [1_usize, 4, 7] {
            let gateway = FakeGateway::new()
                .with_gets(std::iter::repeat_with(present).take(n))
                .with_get_default(Scripted::NotFound);

            let report = DeletionPoller::new(&settings())
                .run(&gateway, &id(), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(report.elapsed, Duration::from_secs(10 * n as u64));
            assert_eq!(report.polls as usize, n + 1);
            assert_eq!(gateway.get_count(), n + 1);
            assert!(!report.provisional);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_gone_times_out_at_deadline() {
        let gateway = FakeGateway::new().with_get_default(present());
        let started = Instant::now();

        let err = DeletionPoller::new(&settings())
            .run(&gateway, &id(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(300));
        match err {
            HalldyllError::Reconcile(ReconcileError::PollTimeout {
                waited_secs, polls, ..
            }) => {
                assert_eq!(waited_secs, 300);
                assert_eq!(polls, 31);
            }
            other => panic!("expected poll timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_get_is_bounded_by_deadline() {
        let mut settings = settings();
        settings.deadline_secs = 30;
        let gateway = FakeGateway::new()
            .with_get_delay(Duration::from_secs(100))
            .with_get_default(present());
        let started = Instant::now();

        let err = DeletionPoller::new(&settings)
            .run(&gateway, &id(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HalldyllError::Reconcile(ReconcileError::PollTimeout { .. })
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_errors_keep_polling() {
        let gateway = FakeGateway::new().with_gets([Scripted::Fail(500), Scripted::NotFound]);

        let report = DeletionPoller::new(&settings())
            .run(&gateway, &id(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.polls, 2);
        assert_eq!(report.elapsed, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_gone_confirms_without_polling() {
        let gateway = FakeGateway::new().with_delete(Scripted::NotFound);

        let report = assert_ok!(
            DeletionPoller::new(&settings())
                .run(&gateway, &id(), &CancellationToken::new())
                .await
        );

        assert_eq!(report.polls, 0);
        assert_eq!(gateway.get_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_delete_errors_are_fatal() {
        let gateway = FakeGateway::new().with_delete(Scripted::Fail(500));

        let err = assert_err!(
            DeletionPoller::new(&settings())
                .run(&gateway, &id(), &CancellationToken::new())
                .await
        );

        assert!(matches!(
            err,
            HalldyllError::Gateway(GatewayError::ApiRequestFailed { status: 500, .. })
        ));
        assert_eq!(gateway.get_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep() {
        let gateway = FakeGateway::new().with_get_default(present());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });
        let started = Instant::now();

        let err = DeletionPoller::new(&settings())
            .run(&gateway, &id(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HalldyllError::Reconcile(ReconcileError::Cancelled { .. })
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(gateway.get_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_get() {
        let gateway = FakeGateway::new()
            .with_get_delay(Duration::from_secs(60))
            .with_get_default(present());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let started = Instant::now();

        let err = DeletionPoller::new(&settings())
            .run(&gateway, &id(), &cancel)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled after 0 polls"));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }
}
