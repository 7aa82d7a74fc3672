//! Ledger-time synchronization and escrow lifecycle orchestration
//!
//! This crate coordinates a conditional, time-locked transfer held by an
//! external ledger. The ledger is the only authority on its own clock, so
//! the hard part is observing that clock correctly:
//! - parsing the heterogeneous textual timestamps the ledger reports
//! - converting between UTC instants and the ledger's native epoch
//! - adaptively polling until a target ledger time is reached
//! - sequencing the create -> wait -> release protocol with explicit
//!   success/failure semantics and prompt cancellation

pub mod cancel;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod poller;
pub mod sim;
pub mod time_codec;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
