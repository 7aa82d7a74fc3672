//! Ledgerlock CLI - runs one time-locked escrow flow end to end
//!
//! Wraps the engine around the in-process simulated ledger: create the
//! escrow, wait for ledger time to pass the finish deadline, release the
//! funds. Exit code 0 on completion, non-zero on failure; Ctrl-C cancels
//! the flow promptly instead of leaving it blocked on the deadline wait.

mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{warn, Level};

use ledgerlock_engine::cancel::CancelHandle;
use ledgerlock_engine::models::{EscrowOutcome, EscrowRequest};
use ledgerlock_engine::orchestrator::{EscrowOrchestrator, OrchestratorConfig};
use ledgerlock_engine::sim::{SimulatedLedger, SimulatedLedgerConfig};

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "ledgerlock", about = "Run a time-locked escrow flow against the simulated ledger")]
struct Cli {
    /// Amount to lock in escrow
    #[arg(long, default_value = "25.0")]
    amount: Decimal,

    /// Funding account (the escrow owner)
    #[arg(long, default_value = "rClient")]
    source: String,

    /// Receiving account
    #[arg(long, default_value = "rFreelancer")]
    destination: String,

    /// Seconds from now after which the escrow becomes finishable
    #[arg(long, default_value_t = 30)]
    finish_after: i64,

    /// Seconds from now after which the escrow becomes cancelable
    #[arg(long, default_value_t = 120)]
    cancel_after: i64,

    /// Optional settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match run(cli).await {
        Ok(outcome) => report(&outcome),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<EscrowOutcome> {
    let settings = Settings::load(cli.config.as_deref())?;

    let ledger = Arc::new(SimulatedLedger::new(SimulatedLedgerConfig::default()));
    let orchestrator = EscrowOrchestrator::new(
        ledger,
        OrchestratorConfig {
            poller: settings.poller.to_config(),
        },
    );

    let handle = CancelHandle::new();
    let signal = handle.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling escrow flow");
            handle.cancel();
        }
    });

    let request = EscrowRequest {
        amount: cli.amount,
        source: cli.source,
        destination: cli.destination,
        finish_after: chrono::Duration::seconds(cli.finish_after),
        cancel_after: chrono::Duration::seconds(cli.cancel_after),
    };

    Ok(orchestrator.run(request, signal).await)
}

fn report(outcome: &EscrowOutcome) -> ExitCode {
    match outcome {
        EscrowOutcome::Completed {
            create_tx,
            finish_tx,
        } => {
            println!("escrow completed");
            println!("  create tx: {create_tx}");
            println!("  finish tx: {finish_tx}");
            ExitCode::SUCCESS
        }
        EscrowOutcome::Failed { error, last_stage } => {
            eprintln!("escrow failed during {last_stage:?}: {error}");
            ExitCode::FAILURE
        }
    }
}
