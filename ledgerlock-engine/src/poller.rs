//! Adaptive polling toward a target ledger time
//!
//! The ledger clock can only be observed, never awaited, so reaching a
//! deadline means sleeping between queries. Far from the target the poller
//! sleeps in capped strides; inside the threshold it polls densely to
//! avoid overshooting. Transient clock failures are retried on a fixed
//! backoff up to a consecutive-failure bound. Every sleep races the
//! cancellation signal.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::clock::LedgerClock;
use crate::error::EscrowError;
use crate::time_codec::LedgerEpoch;
use crate::EscrowResult;

/// Polling policy. The thresholds are policy, not protocol, so they are
/// configuration with the observed ledger's values as defaults.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Remaining time above which the poller sleeps in capped strides
    pub far_threshold: Duration,
    /// Dense polling interval near the deadline
    pub near_interval: Duration,
    /// Sleep between retries after a failed clock query
    pub error_backoff: Duration,
    /// Consecutive failures after which `ClockUnavailable` is surfaced
    pub max_consecutive_errors: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            far_threshold: Duration::from_secs(10),
            near_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            max_consecutive_errors: 6,
        }
    }
}

/// Transient bookkeeping for one `wait_until` call
#[derive(Debug)]
struct PollState {
    target: LedgerEpoch,
    last_observed: Option<LedgerEpoch>,
    consecutive_errors: u32,
}

/// Blocks a flow until the ledger clock reaches a target epoch
pub struct AdaptivePoller {
    config: PollerConfig,
}

impl AdaptivePoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    /// Wait until `clock` reports a time at or past `target`.
    ///
    /// Returns immediately (without sleeping) when the target is already
    /// reached, so repeated calls after the fact are cheap. Fails with
    /// `ClockUnavailable` after the configured number of consecutive
    /// query failures, or `Cancelled` within one interval of the signal
    /// being raised. There is no overall timeout: deadlines are
    /// externally defined, and callers wanting one supply cancellation.
    pub async fn wait_until(
        &self,
        target: LedgerEpoch,
        clock: &LedgerClock,
        cancel: &mut CancelSignal,
    ) -> EscrowResult<()> {
        let mut state = PollState {
            target,
            last_observed: None,
            consecutive_errors: 0,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(EscrowError::Cancelled);
            }

            match clock.now().await {
                Ok(observed) => {
                    state.last_observed = Some(observed);
                    state.consecutive_errors = 0;

                    if observed >= state.target {
                        debug!(%observed, target = %state.target, "target ledger time reached");
                        return Ok(());
                    }

                    let remaining = state.target - observed;
                    let stride = if remaining > self.config.far_threshold.as_secs() as i64 {
                        Duration::from_secs(remaining as u64).min(self.config.far_threshold)
                    } else {
                        self.config.near_interval
                    };
                    debug!(%observed, target = %state.target, remaining, ?stride, "ledger time not reached, sleeping");
                    self.sleep_or_cancel(stride, cancel).await?;
                }
                Err(err) => {
                    state.consecutive_errors += 1;
                    warn!(
                        consecutive = state.consecutive_errors,
                        last_observed = ?state.last_observed,
                        "ledger clock query failed: {err}"
                    );

                    if state.consecutive_errors >= self.config.max_consecutive_errors {
                        return Err(EscrowError::clock_unavailable(format!(
                            "{} consecutive clock failures, last: {err}",
                            state.consecutive_errors
                        )));
                    }
                    self.sleep_or_cancel(self.config.error_backoff, cancel).await?;
                }
            }
        }
    }

    async fn sleep_or_cancel(
        &self,
        duration: Duration,
        cancel: &mut CancelSignal,
    ) -> EscrowResult<()> {
        tokio::select! {
            _ = sleep(duration) => Ok(()),
            _ = cancel.cancelled() => Err(EscrowError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::cancel::CancelHandle;
    use crate::ledger::LedgerGateway;
    use crate::models::{EscrowIntent, SettlementResult};
    use crate::sim::{SimulatedLedger, SimulatedLedgerConfig};
    use crate::time_codec;

    struct ScriptedClockGateway {
        raw: Result<String, String>,
        calls: AtomicU32,
    }

    impl ScriptedClockGateway {
        fn ok(raw: &str) -> Self {
            Self {
                raw: Ok(raw.to_string()),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(cause: &str) -> Self {
            Self {
                raw: Err(cause.to_string()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LedgerGateway for ScriptedClockGateway {
        async fn server_time(&self) -> EscrowResult<String> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.raw
                .clone()
                .map_err(EscrowError::clock_unavailable)
        }

        async fn submit_escrow_create(
            &self,
            _intent: &EscrowIntent,
        ) -> EscrowResult<SettlementResult> {
            unreachable!("poller tests never submit")
        }

        async fn submit_escrow_finish(
            &self,
            _owner: &str,
            _offer_sequence: u32,
        ) -> EscrowResult<SettlementResult> {
            unreachable!("poller tests never submit")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_idempotent_when_target_passed() {
        let gateway = Arc::new(ScriptedClockGateway::ok("2026-Jan-08 14:48:23 UTC"));
        let clock = LedgerClock::new(gateway.clone());
        let poller = AdaptivePoller::new(PollerConfig::default());

        let observed = time_codec::to_ledger_epoch(
            time_codec::parse_server_time("2026-Jan-08 14:48:23 UTC").unwrap(),
        );
        let target = observed + (-5);

        let before = tokio::time::Instant::now();
        poller
            .wait_until(target, &clock, &mut CancelSignal::never())
            .await
            .unwrap();

        // single query, no sleep
        assert_eq!(gateway.calls.load(Ordering::Relaxed), 1);
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_advances_to_future_target() {
        let ledger = Arc::new(SimulatedLedger::new(SimulatedLedgerConfig::default()));
        let clock = LedgerClock::new(ledger.clone());
        let poller = AdaptivePoller::new(PollerConfig::default());

        let target = time_codec::to_ledger_epoch(ledger.ledger_time()) + 30;
        let before = tokio::time::Instant::now();
        poller
            .wait_until(target, &clock, &mut CancelSignal::never())
            .await
            .unwrap();

        let elapsed = before.elapsed();
        assert!(elapsed >= Duration::from_secs(30), "elapsed {elapsed:?}");
        // near the deadline the stride drops to the dense interval, so the
        // overshoot stays within one of them
        assert!(elapsed <= Duration::from_secs(34), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_are_bounded() {
        let gateway = Arc::new(ScriptedClockGateway::failing("connection refused"));
        let clock = LedgerClock::new(gateway.clone());
        let poller = AdaptivePoller::new(PollerConfig {
            max_consecutive_errors: 3,
            ..PollerConfig::default()
        });

        let err = poller
            .wait_until(LedgerEpoch::new(0), &clock, &mut CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, EscrowError::ClockUnavailable(_)));
        assert_eq!(gateway.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_unblocks_within_one_interval() {
        let ledger = Arc::new(SimulatedLedger::new(SimulatedLedgerConfig::default()));
        let target = time_codec::to_ledger_epoch(ledger.ledger_time()) + 60;

        let handle = CancelHandle::new();
        let mut signal = handle.signal();
        let before = tokio::time::Instant::now();

        let waiter = tokio::spawn(async move {
            let clock = LedgerClock::new(ledger);
            let poller = AdaptivePoller::new(PollerConfig::default());
            poller.wait_until(target, &clock, &mut signal).await
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, EscrowError::Cancelled));
        assert!(before.elapsed() < Duration::from_secs(60));
    }
}
