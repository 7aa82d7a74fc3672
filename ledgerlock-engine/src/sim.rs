//! In-process simulated ledger
//!
//! Stands in for the real ledger node behind [`LedgerGateway`]: reports
//! server time in the remote source's textual format, allocates
//! sequences, tracks open escrow entries, and refuses finishes that
//! arrive early or reference an unknown sequence. The clock is anchored
//! at construction and advances with the tokio clock, so paused-time
//! tests fast-forward it. Used by the demo CLI and the engine's own
//! integration-style tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::ledger::LedgerGateway;
use crate::models::{EntryChange, EscrowIntent, SettlementResult, ESCROW_ENTRY_TYPE};
use crate::time_codec::{self, LedgerEpoch};
use crate::EscrowResult;

/// Server time format the simulation reports, matching the remote source
const SERVER_TIME_FORMAT: &str = "%Y-%b-%d %H:%M:%S%.6f UTC";

/// Configuration for the simulated ledger
#[derive(Debug, Clone)]
pub struct SimulatedLedgerConfig {
    /// First transaction sequence to allocate
    pub start_sequence: u32,
    /// Inject a failure reason into every create settlement
    pub create_failure: Option<String>,
    /// Inject a failure reason into every finish settlement
    pub finish_failure: Option<String>,
}

impl Default for SimulatedLedgerConfig {
    fn default() -> Self {
        Self {
            start_sequence: 1,
            create_failure: None,
            finish_failure: None,
        }
    }
}

/// In-process ledger implementing the gateway boundary
pub struct SimulatedLedger {
    config: SimulatedLedgerConfig,
    anchor_wall: DateTime<Utc>,
    anchor_mono: Instant,
    next_sequence: AtomicU32,
    /// Open escrow entries (sequence -> finish deadline)
    open_escrows: RwLock<HashMap<u32, LedgerEpoch>>,
    time_queries: AtomicU32,
}

impl SimulatedLedger {
    pub fn new(config: SimulatedLedgerConfig) -> Self {
        let start_sequence = config.start_sequence;
        Self {
            config,
            anchor_wall: Utc::now(),
            anchor_mono: Instant::now(),
            next_sequence: AtomicU32::new(start_sequence),
            open_escrows: RwLock::new(HashMap::new()),
            time_queries: AtomicU32::new(0),
        }
    }

    /// Current simulated ledger time
    pub fn ledger_time(&self) -> DateTime<Utc> {
        let elapsed = self.anchor_mono.elapsed();
        self.anchor_wall + chrono::Duration::microseconds(elapsed.as_micros() as i64)
    }

    /// How many times the server clock has been queried
    pub fn time_query_count(&self) -> u32 {
        self.time_queries.load(Ordering::Relaxed)
    }

    /// Number of escrow entries currently held open
    pub async fn open_escrow_count(&self) -> usize {
        self.open_escrows.read().await.len()
    }

    fn allocate_sequence(&self) -> u32 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn tx_hash() -> String {
        Uuid::new_v4().simple().to_string().to_uppercase()
    }

    fn rejection(sequence: u32, tx_id: String, reason: String) -> SettlementResult {
        SettlementResult {
            success: false,
            failure_reason: Some(reason),
            effects: Vec::new(),
            submitted_sequence: sequence,
            tx_id,
            metadata: None,
        }
    }
}

#[async_trait]
impl LedgerGateway for SimulatedLedger {
    async fn server_time(&self) -> EscrowResult<String> {
        self.time_queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.ledger_time().format(SERVER_TIME_FORMAT).to_string())
    }

    async fn submit_escrow_create(&self, intent: &EscrowIntent) -> EscrowResult<SettlementResult> {
        let sequence = self.allocate_sequence();
        let tx_id = Self::tx_hash();

        if let Some(reason) = &self.config.create_failure {
            return Ok(Self::rejection(sequence, tx_id, reason.clone()));
        }

        self.open_escrows
            .write()
            .await
            .insert(sequence, intent.finish_after);
        info!(
            sequence,
            amount = %intent.amount,
            destination = %intent.destination,
            "simulated ledger holding escrow"
        );

        Ok(SettlementResult {
            success: true,
            failure_reason: None,
            effects: vec![EntryChange::Created {
                entry_type: ESCROW_ENTRY_TYPE.to_string(),
                sequence: Some(sequence),
            }],
            submitted_sequence: sequence,
            tx_id,
            metadata: Some(serde_json::json!({ "engine_result": "tesSUCCESS" })),
        })
    }

    async fn submit_escrow_finish(
        &self,
        owner: &str,
        offer_sequence: u32,
    ) -> EscrowResult<SettlementResult> {
        let submitted_sequence = self.allocate_sequence();
        let tx_id = Self::tx_hash();

        if let Some(reason) = &self.config.finish_failure {
            return Ok(Self::rejection(submitted_sequence, tx_id, reason.clone()));
        }

        let mut open = self.open_escrows.write().await;
        let Some(finish_after) = open.get(&offer_sequence).copied() else {
            return Ok(Self::rejection(
                submitted_sequence,
                tx_id,
                format!("no escrow with sequence {offer_sequence} held by {owner}"),
            ));
        };

        let now = time_codec::to_ledger_epoch(self.ledger_time());
        if now < finish_after {
            return Ok(Self::rejection(
                submitted_sequence,
                tx_id,
                format!("finish_after {finish_after} not reached at ledger time {now}"),
            ));
        }

        open.remove(&offer_sequence);
        info!(sequence = offer_sequence, owner, "simulated ledger released escrow");

        Ok(SettlementResult {
            success: true,
            failure_reason: None,
            effects: vec![EntryChange::Deleted {
                entry_type: ESCROW_ENTRY_TYPE.to_string(),
            }],
            submitted_sequence,
            tx_id,
            metadata: Some(serde_json::json!({ "engine_result": "tesSUCCESS" })),
        })
    }
}
