//! Escrow lifecycle orchestration
//!
//! Drives one flow through `Created -> AwaitingDeadline -> Releasing` to a
//! terminal outcome. Each step is a transition over [`FlowState`]; the
//! run loop applies steps until a terminal state is reached and reports
//! it. Submissions are invoked exactly once per flow: a resubmission
//! could double-spend or double-release, so no step retries them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::clock::LedgerClock;
use crate::error::EscrowError;
use crate::ledger::LedgerGateway;
use crate::models::{EscrowHandle, EscrowIntent, EscrowOutcome, EscrowRequest, FlowStage, FlowState};
use crate::poller::{AdaptivePoller, PollerConfig};

/// Configuration for the orchestrator
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Deadline polling policy
    pub poller: PollerConfig,
}

/// Coordinates the create -> wait -> release protocol against one ledger
pub struct EscrowOrchestrator {
    gateway: Arc<dyn LedgerGateway>,
    clock: LedgerClock,
    poller: AdaptivePoller,
}

impl EscrowOrchestrator {
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: OrchestratorConfig) -> Self {
        let clock = LedgerClock::new(Arc::clone(&gateway));
        Self {
            gateway,
            clock,
            poller: AdaptivePoller::new(config.poller),
        }
    }

    /// Run one escrow flow to its terminal outcome.
    ///
    /// Never returns an ambiguous state: the outcome either carries both
    /// transaction identifiers or names the step that failed and why.
    pub async fn run(&self, request: EscrowRequest, mut cancel: CancelSignal) -> EscrowOutcome {
        let flow_id = Uuid::new_v4();
        info!(
            %flow_id,
            amount = %request.amount,
            source = %request.source,
            destination = %request.destination,
            "starting escrow flow"
        );

        let mut state = FlowState::Created { request };
        loop {
            let stage = state.stage();
            state = self.step(state, &mut cancel, flow_id).await;
            debug_assert!(stage.permits(state.stage()));
            if state.stage().is_terminal() {
                break;
            }
        }

        match state {
            FlowState::Completed {
                create_tx,
                finish_tx,
            } => {
                info!(%flow_id, %create_tx, %finish_tx, "escrow flow completed");
                EscrowOutcome::Completed {
                    create_tx,
                    finish_tx,
                }
            }
            FlowState::Failed { error, last_stage } => {
                warn!(%flow_id, ?last_stage, "escrow flow failed: {error}");
                EscrowOutcome::Failed { error, last_stage }
            }
            // the run loop only exits on a terminal stage
            other => unreachable!("non-terminal state after run loop: {:?}", other.stage()),
        }
    }

    async fn step(
        &self,
        state: FlowState,
        cancel: &mut CancelSignal,
        flow_id: Uuid,
    ) -> FlowState {
        match state {
            FlowState::Created { request } => self.create(request, cancel, flow_id).await,
            FlowState::AwaitingDeadline { intent, handle } => {
                self.await_deadline(intent, handle, cancel, flow_id).await
            }
            FlowState::Releasing { intent, handle } => self.release(intent, handle, flow_id).await,
            terminal => terminal,
        }
    }

    /// Created: validate the intent, submit the creation, extract the
    /// on-ledger sequence from the settlement effects
    async fn create(
        &self,
        request: EscrowRequest,
        cancel: &mut CancelSignal,
        flow_id: Uuid,
    ) -> FlowState {
        if cancel.is_cancelled() {
            return fail(FlowStage::Created, EscrowError::Cancelled);
        }

        let now = Utc::now();
        let intent = match EscrowIntent::new(
            request.amount,
            request.source,
            request.destination,
            now + request.finish_after,
            now + request.cancel_after,
        ) {
            Ok(intent) => intent,
            Err(error) => return fail(FlowStage::Created, error),
        };

        info!(
            %flow_id,
            finish_after = %intent.finish_after,
            cancel_after = %intent.cancel_after,
            "submitting escrow create"
        );

        let settlement = match self.gateway.submit_escrow_create(&intent).await {
            Ok(settlement) => settlement,
            Err(err) => {
                return fail(
                    FlowStage::Created,
                    EscrowError::creation_failed(err.to_string()),
                )
            }
        };

        if !settlement.success {
            return fail(
                FlowStage::Created,
                EscrowError::creation_failed(settlement.failure_message()),
            );
        }

        let sequence = settlement
            .created_escrow_sequence()
            .unwrap_or(settlement.submitted_sequence);
        let handle = EscrowHandle {
            sequence,
            create_tx: settlement.tx_id,
        };
        info!(%flow_id, sequence, create_tx = %handle.create_tx, "escrow created");

        FlowState::AwaitingDeadline { intent, handle }
    }

    /// AwaitingDeadline: poll the ledger clock toward the finish deadline
    async fn await_deadline(
        &self,
        intent: EscrowIntent,
        handle: EscrowHandle,
        cancel: &mut CancelSignal,
        flow_id: Uuid,
    ) -> FlowState {
        info!(%flow_id, target = %intent.finish_after, "waiting for ledger time to pass finish_after");

        match self
            .poller
            .wait_until(intent.finish_after, &self.clock, cancel)
            .await
        {
            Ok(()) => {
                info!(%flow_id, "finish deadline reached");
                FlowState::Releasing { intent, handle }
            }
            Err(EscrowError::Cancelled) => fail(FlowStage::AwaitingDeadline, EscrowError::Cancelled),
            Err(err) => fail(
                FlowStage::AwaitingDeadline,
                EscrowError::deadline_wait(err.to_string()),
            ),
        }
    }

    /// Releasing: submit the finish referencing the held sequence
    async fn release(&self, intent: EscrowIntent, handle: EscrowHandle, flow_id: Uuid) -> FlowState {
        info!(%flow_id, sequence = handle.sequence, "submitting escrow finish");

        let settlement = match self
            .gateway
            .submit_escrow_finish(&intent.source, handle.sequence)
            .await
        {
            Ok(settlement) => settlement,
            Err(err) => {
                return fail(
                    FlowStage::Releasing,
                    EscrowError::finish_failed(err.to_string()),
                )
            }
        };

        if !settlement.success {
            return fail(
                FlowStage::Releasing,
                EscrowError::finish_failed(settlement.failure_message()),
            );
        }

        info!(%flow_id, finish_tx = %settlement.tx_id, "funds released");
        FlowState::Completed {
            create_tx: handle.create_tx,
            finish_tx: settlement.tx_id,
        }
    }
}

fn fail(last_stage: FlowStage, error: EscrowError) -> FlowState {
    FlowState::Failed { error, last_stage }
}
