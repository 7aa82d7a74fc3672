//! Ledger clock reads
//!
//! Thin wrapper over the gateway's server-time capability: every call is
//! a fresh remote query followed by a parse, with both failure kinds
//! folded into `ClockUnavailable`. Staleness and retry are the caller's
//! concern (see [`crate::poller`]).

use std::sync::Arc;

use tracing::debug;

use crate::error::EscrowError;
use crate::ledger::LedgerGateway;
use crate::time_codec::{self, LedgerEpoch};
use crate::EscrowResult;

/// Reads the ledger's own clock as a ledger epoch
pub struct LedgerClock {
    gateway: Arc<dyn LedgerGateway>,
}

impl LedgerClock {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Current ledger time. No caching, no internal retry.
    pub async fn now(&self) -> EscrowResult<LedgerEpoch> {
        let raw = self
            .gateway
            .server_time()
            .await
            .map_err(|err| EscrowError::clock_unavailable(err.to_string()))?;

        let instant = time_codec::parse_server_time(&raw)
            .map_err(|err| EscrowError::clock_unavailable(err.to_string()))?;

        let epoch = time_codec::to_ledger_epoch(instant);
        debug!(%raw, %epoch, "ledger clock read");
        Ok(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use crate::models::{EscrowIntent, SettlementResult};

    struct FixedTimeGateway {
        raw: Result<String, String>,
    }

    #[async_trait]
    impl LedgerGateway for FixedTimeGateway {
        async fn server_time(&self) -> EscrowResult<String> {
            self.raw
                .clone()
                .map_err(EscrowError::clock_unavailable)
        }

        async fn submit_escrow_create(
            &self,
            _intent: &EscrowIntent,
        ) -> EscrowResult<SettlementResult> {
            unreachable!("clock tests never submit")
        }

        async fn submit_escrow_finish(
            &self,
            _owner: &str,
            _offer_sequence: u32,
        ) -> EscrowResult<SettlementResult> {
            unreachable!("clock tests never submit")
        }
    }

    #[tokio::test]
    async fn test_now_parses_server_time() {
        let gateway = Arc::new(FixedTimeGateway {
            raw: Ok("2026-Jan-08 14:48:23.601094 UTC".to_string()),
        });
        let clock = LedgerClock::new(gateway);

        let expected =
            time_codec::to_ledger_epoch(Utc.with_ymd_and_hms(2026, 1, 8, 14, 48, 23).unwrap());
        assert_eq!(clock.now().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_query_failure_maps_to_clock_unavailable() {
        let gateway = Arc::new(FixedTimeGateway {
            raw: Err("connection refused".to_string()),
        });
        let clock = LedgerClock::new(gateway);

        match clock.now().await.unwrap_err() {
            EscrowError::ClockUnavailable(cause) => assert!(cause.contains("connection refused")),
            other => panic!("expected ClockUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_parse_failure_maps_to_clock_unavailable() {
        let gateway = Arc::new(FixedTimeGateway {
            raw: Ok("not a timestamp".to_string()),
        });
        let clock = LedgerClock::new(gateway);

        match clock.now().await.unwrap_err() {
            EscrowError::ClockUnavailable(cause) => assert!(cause.contains("not a timestamp")),
            other => panic!("expected ClockUnavailable, got {other:?}"),
        }
    }
}
