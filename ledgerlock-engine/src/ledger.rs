//! Collaborator boundary toward the external ledger
//!
//! The orchestrator needs exactly three capabilities from the outside
//! world: read the ledger's own clock, submit an escrow creation, and
//! submit an escrow finish. Everything behind them (transport, signing,
//! wallets) is someone else's concern.

use async_trait::async_trait;

use crate::models::{EscrowIntent, SettlementResult};
use crate::EscrowResult;

/// The three ledger capabilities the escrow flow depends on.
///
/// Implementations must be safe to share across flows; each submission
/// call is invoked at most once per flow and never retried by the core.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current server-reported ledger time as raw text, in one of the
    /// formats [`crate::time_codec::parse_server_time`] accepts
    async fn server_time(&self) -> EscrowResult<String>;

    /// Submit an escrow creation and wait for its settlement
    async fn submit_escrow_create(&self, intent: &EscrowIntent) -> EscrowResult<SettlementResult>;

    /// Submit an escrow finish for `offer_sequence` held by `owner` and
    /// wait for its settlement
    async fn submit_escrow_finish(
        &self,
        owner: &str,
        offer_sequence: u32,
    ) -> EscrowResult<SettlementResult>;
}
