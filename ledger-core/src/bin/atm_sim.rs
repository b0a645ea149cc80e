//! ATM simulation binary
//!
//! Loads configuration from the TOML file named by `ATM_CONFIG`, or from
//! `ATM_*` environment variables, runs the simulation and exits non-zero
//! if the post-run audit fails.

use anyhow::Context;
use ledger_core::{config::ReportFormat, Config, Simulation, SimulationReport};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ATM ledger simulation");

    // Load configuration
    let config = match std::env::var("ATM_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("reading ATM_* environment")?,
    };
    let report_config = config.report.clone();

    let simulation = Arc::new(Simulation::new(config)?);

    // Actors are OS threads; keep them off the async workers
    let runner = Arc::clone(&simulation);
    let mut run = tokio::task::spawn_blocking(move || runner.run());

    let report = tokio::select! {
        joined = &mut run => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping ATM actors");
            simulation.stop();
            run.await??
        }
    };

    match report_config.format {
        ReportFormat::Json => println!("{}", report.to_json()?),
        ReportFormat::Text => log_summary(&report),
    }

    if report_config.print_metrics {
        print!("{}", simulation.ledger().metrics().render()?);
    }

    if !report.passed() {
        anyhow::bail!(
            "audit failed: total {} expected {}",
            report.final_total,
            report.audit.expected_total()
        );
    }

    tracing::info!("PASS: total money accounted for");
    Ok(())
}

fn log_summary(report: &SimulationReport) {
    for account in &report.audit.accounts {
        if account.is_consistent() {
            tracing::info!(
                "Account {}: {} (deposited {}, withdrawn {}, {} refused)",
                account.account,
                account.balance,
                account.deposited,
                account.withdrawn,
                account.failed_withdrawals
            );
        } else {
            tracing::error!(
                "Account {}: expected {}, actual {}",
                account.account,
                account.replayed_balance,
                account.balance
            );
        }
    }

    for actor in &report.actors {
        tracing::info!(
            "ATM {}: {} successful, {} failed ({} insufficient funds, {} session timeouts)",
            actor.actor_id,
            actor.successful_ops,
            actor.failed_ops,
            actor.insufficient_funds,
            actor.timed_out
        );
    }

    tracing::info!(
        "Total money: {} -> {} (difference {}), peak sessions {}/{}",
        report.initial_total,
        report.final_total,
        report.final_total - report.initial_total,
        report.peak_sessions,
        report.session_permits
    );
}
