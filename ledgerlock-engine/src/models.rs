//! Core data models for escrow orchestration
//!
//! This module contains the escrow intent and handle, the settlement
//! shapes the ledger collaborators return, and the lifecycle state
//! machine definitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;
use crate::time_codec::{self, LedgerEpoch};
use crate::EscrowResult;

/// Ledger entry type identifying an escrow hold
pub const ESCROW_ENTRY_TYPE: &str = "Escrow";

/// A validated request for a time-locked transfer.
///
/// Construction is the only way to obtain one, so every intent that
/// reaches a submission call already satisfies the deadline ordering
/// invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowIntent {
    pub amount: Decimal,
    pub source: String,
    pub destination: String,
    pub finish_after: LedgerEpoch,
    pub cancel_after: LedgerEpoch,
}

impl EscrowIntent {
    /// Build an intent from deadline instants, validating before any
    /// submission can happen: amount positive, both parties named,
    /// `finish_after` strictly in the future and strictly before
    /// `cancel_after`.
    pub fn new(
        amount: Decimal,
        source: String,
        destination: String,
        finish_at: DateTime<Utc>,
        cancel_at: DateTime<Utc>,
    ) -> EscrowResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(EscrowError::creation_failed(
                "escrow amount must be greater than 0",
            ));
        }

        if source.trim().is_empty() || destination.trim().is_empty() {
            return Err(EscrowError::creation_failed(
                "source and destination accounts are required",
            ));
        }

        if finish_at <= Utc::now() {
            return Err(EscrowError::creation_failed(
                "finish_after must be strictly in the future",
            ));
        }

        let finish_after = time_codec::to_ledger_epoch(finish_at);
        let cancel_after = time_codec::to_ledger_epoch(cancel_at);

        if finish_after >= cancel_after {
            return Err(EscrowError::creation_failed(
                "finish_after must be strictly before cancel_after",
            ));
        }

        Ok(Self {
            amount,
            source,
            destination,
            finish_after,
            cancel_after,
        })
    }
}

/// Identifies one escrow entry on the ledger after successful creation.
///
/// Owned exclusively by the flow that created it; the sequence is what the
/// later finish submission must reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowHandle {
    pub sequence: u32,
    pub create_tx: String,
}

/// One structured ledger-entry change from a settlement's effect list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum EntryChange {
    Created {
        entry_type: String,
        sequence: Option<u32>,
    },
    Modified {
        entry_type: String,
    },
    Deleted {
        entry_type: String,
    },
}

/// Asynchronous confirmation that a submitted operation was applied
/// (or rejected) by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub success: bool,
    pub failure_reason: Option<String>,
    pub effects: Vec<EntryChange>,
    pub submitted_sequence: u32,
    pub tx_id: String,
    pub metadata: Option<serde_json::Value>,
}

impl SettlementResult {
    /// Sequence assigned to a newly-created escrow entry, if the effect
    /// list reports one. Callers fall back to [`Self::submitted_sequence`]
    /// when the effects are absent or unhelpful.
    pub fn created_escrow_sequence(&self) -> Option<u32> {
        self.effects.iter().find_map(|effect| match effect {
            EntryChange::Created {
                entry_type,
                sequence,
            } if entry_type == ESCROW_ENTRY_TYPE => *sequence,
            _ => None,
        })
    }

    /// Failure reason text for reporting
    pub fn failure_message(&self) -> &str {
        self.failure_reason.as_deref().unwrap_or("unknown failure")
    }
}

/// Parameters for one orchestration run: deadline offsets are relative to
/// the moment the flow starts.
#[derive(Debug, Clone)]
pub struct EscrowRequest {
    pub amount: Decimal,
    pub source: String,
    pub destination: String,
    pub finish_after: chrono::Duration,
    pub cancel_after: chrono::Duration,
}

/// Lifecycle stage of an escrow flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStage {
    /// Validating the intent and submitting the create transaction
    Created,
    /// Polling the ledger clock toward the finish deadline
    AwaitingDeadline,
    /// Submitting the finish transaction
    Releasing,
    /// Funds released
    Completed,
    /// Flow ended on an unrecoverable error
    Failed,
}

impl FlowStage {
    /// Check if this is a terminal stage (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the lifecycle permits moving from this stage to `next`.
    /// No transition skips a stage; `Failed` is reachable from any
    /// non-terminal stage.
    pub fn permits(&self, next: FlowStage) -> bool {
        matches!(
            (self, next),
            (Self::Created, FlowStage::AwaitingDeadline)
                | (Self::AwaitingDeadline, FlowStage::Releasing)
                | (Self::Releasing, FlowStage::Completed)
                | (Self::Created, FlowStage::Failed)
                | (Self::AwaitingDeadline, FlowStage::Failed)
                | (Self::Releasing, FlowStage::Failed)
        )
    }
}

/// State of one escrow flow, carrying only the data valid in that state
#[derive(Debug)]
pub enum FlowState {
    Created {
        request: EscrowRequest,
    },
    AwaitingDeadline {
        intent: EscrowIntent,
        handle: EscrowHandle,
    },
    Releasing {
        intent: EscrowIntent,
        handle: EscrowHandle,
    },
    Completed {
        create_tx: String,
        finish_tx: String,
    },
    Failed {
        error: EscrowError,
        last_stage: FlowStage,
    },
}

impl FlowState {
    pub fn stage(&self) -> FlowStage {
        match self {
            Self::Created { .. } => FlowStage::Created,
            Self::AwaitingDeadline { .. } => FlowStage::AwaitingDeadline,
            Self::Releasing { .. } => FlowStage::Releasing,
            Self::Completed { .. } => FlowStage::Completed,
            Self::Failed { .. } => FlowStage::Failed,
        }
    }
}

/// Terminal report of one orchestration run
#[derive(Debug)]
pub enum EscrowOutcome {
    /// Funds released; both transaction identifiers are reported
    Completed { create_tx: String, finish_tx: String },
    /// The flow ended on an error; `last_stage` names the step that failed
    Failed {
        error: EscrowError,
        last_stage: FlowStage,
    },
}

impl EscrowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn intent_with_offsets(finish_secs: i64, cancel_secs: i64) -> EscrowResult<EscrowIntent> {
        let now = Utc::now();
        EscrowIntent::new(
            Decimal::new(25, 0),
            "rClient".to_string(),
            "rFreelancer".to_string(),
            now + Duration::seconds(finish_secs),
            now + Duration::seconds(cancel_secs),
        )
    }

    #[test]
    fn test_intent_accepts_ordered_future_deadlines() {
        let intent = intent_with_offsets(30, 120).unwrap();
        assert!(intent.finish_after < intent.cancel_after);
    }

    #[test]
    fn test_intent_rejects_unordered_deadlines() {
        assert!(matches!(
            intent_with_offsets(120, 30),
            Err(EscrowError::CreationFailed(_))
        ));
        // equal deadlines are rejected too
        assert!(matches!(
            intent_with_offsets(30, 30),
            Err(EscrowError::CreationFailed(_))
        ));
    }

    #[test]
    fn test_intent_rejects_past_finish_deadline() {
        assert!(matches!(
            intent_with_offsets(-10, 120),
            Err(EscrowError::CreationFailed(_))
        ));
    }

    #[test]
    fn test_intent_rejects_nonpositive_amount() {
        let now = Utc::now();
        let result = EscrowIntent::new(
            Decimal::ZERO,
            "rClient".to_string(),
            "rFreelancer".to_string(),
            now + Duration::seconds(30),
            now + Duration::seconds(120),
        );
        assert!(matches!(result, Err(EscrowError::CreationFailed(_))));
    }

    fn settlement_with_effects(effects: Vec<EntryChange>) -> SettlementResult {
        SettlementResult {
            success: true,
            failure_reason: None,
            effects,
            submitted_sequence: 99,
            tx_id: "ABC123".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_sequence_extracted_from_created_escrow_entry() {
        let settlement = settlement_with_effects(vec![
            EntryChange::Modified {
                entry_type: "AccountRoot".to_string(),
            },
            EntryChange::Created {
                entry_type: ESCROW_ENTRY_TYPE.to_string(),
                sequence: Some(7),
            },
        ]);
        assert_eq!(settlement.created_escrow_sequence(), Some(7));
    }

    #[test]
    fn test_sequence_extraction_skips_other_entry_types() {
        let settlement = settlement_with_effects(vec![EntryChange::Created {
            entry_type: "DirectoryNode".to_string(),
            sequence: Some(7),
        }]);
        assert_eq!(settlement.created_escrow_sequence(), None);
    }

    #[test]
    fn test_sequence_extraction_empty_effects() {
        let settlement = settlement_with_effects(Vec::new());
        assert_eq!(settlement.created_escrow_sequence(), None);
        assert_eq!(settlement.submitted_sequence, 99);
    }

    #[test]
    fn test_stage_transition_table() {
        assert!(FlowStage::Created.permits(FlowStage::AwaitingDeadline));
        assert!(FlowStage::AwaitingDeadline.permits(FlowStage::Releasing));
        assert!(FlowStage::Releasing.permits(FlowStage::Completed));
        assert!(FlowStage::AwaitingDeadline.permits(FlowStage::Failed));

        // no stage skipping, no transitions out of terminal stages
        assert!(!FlowStage::Created.permits(FlowStage::Releasing));
        assert!(!FlowStage::Created.permits(FlowStage::Completed));
        assert!(!FlowStage::Completed.permits(FlowStage::Failed));
        assert!(!FlowStage::Failed.permits(FlowStage::Created));
    }
}
