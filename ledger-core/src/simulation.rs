//! Multi-threaded ATM simulation
//!
//! Spawns one named OS thread per ATM actor against a shared [`Ledger`].
//! Every operation runs inside an ATM "session" admitted by a
//! [`CountingSemaphore`], which caps how many ATMs talk to the ledger at
//! once. When all actors finish, the ledger is audited and the run is
//! summarized in a [`SimulationReport`].
//!
//! ```text
//!  atm-0 ─┐                       ┌─► Account 0 (ReentrantLock)
//!  atm-1 ─┼─► session semaphore ──┼─► Account 1
//!  atm-2 ─┘   (K permits)         └─► ...
//! ```

use crate::{
    config::Config,
    ledger::{Ledger, LedgerAudit},
    types::Total,
    workload::{Actor, ActorReport},
    Error, Result,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use sync_primitives::CountingSemaphore;

/// A configured simulation run
#[derive(Debug)]
pub struct Simulation {
    config: Config,
    ledger: Arc<Ledger>,
    sessions: CountingSemaphore,
    active_sessions: AtomicUsize,
    peak_sessions: AtomicUsize,
    stop: AtomicBool,
}

impl Simulation {
    /// Validate the configuration and build the ledger and session gate
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let ledger = Arc::new(Ledger::from_config(&config.ledger)?);
        let sessions = CountingSemaphore::with_policy(
            config.workload.session_permits,
            config.workload.release_policy,
        )?;

        Ok(Self {
            config,
            ledger,
            sessions,
            active_sessions: AtomicUsize::new(0),
            peak_sessions: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        })
    }

    /// Shared ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Session gate
    pub fn sessions(&self) -> &CountingSemaphore {
        &self.sessions
    }

    /// Ask running actors to stop after their current operation
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Run all actors to completion and audit the ledger
    pub fn run(&self) -> Result<SimulationReport> {
        let workload = &self.config.workload;
        let started = Instant::now();
        let initial_total = self.ledger.get_total_consistent();

        tracing::info!(
            "Starting {} ATM actors x {} operations ({} session permits, {} release)",
            workload.actors,
            workload.operations_per_actor,
            workload.session_permits,
            workload.release_policy
        );

        let actors = thread::scope(|s| -> Result<Vec<ActorReport>> {
            let mut handles = Vec::with_capacity(workload.actors);
            for actor_id in 0..workload.actors {
                let handle = thread::Builder::new()
                    .name(format!("atm-{}", actor_id))
                    .spawn_scoped(s, move || self.run_actor(actor_id))?;
                handles.push(handle);
            }

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| Error::Concurrency("ATM actor thread panicked".to_string()))
                })
                .collect()
        })?;

        let audit = self.ledger.audit();
        let final_total = self.ledger.get_total();

        let report = SimulationReport {
            initial_total,
            final_total,
            session_permits: self.sessions.initial_permits(),
            peak_sessions: self.peak_sessions.load(Ordering::SeqCst),
            semaphore_timeouts: actors.iter().map(|a| a.timed_out).sum(),
            stopped_early: self.stop.load(Ordering::SeqCst),
            elapsed_ms: started.elapsed().as_millis() as u64,
            actors,
            audit,
        };

        tracing::info!(
            "Simulation finished in {}ms: total {} -> {} ({} successful, {} failed)",
            report.elapsed_ms,
            report.initial_total,
            report.final_total,
            report.successful_ops(),
            report.failed_ops()
        );

        Ok(report)
    }

    fn run_actor(&self, actor_id: usize) -> ActorReport {
        let workload = &self.config.workload;
        let rng = match workload.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(actor_id as u64)),
            None => StdRng::from_entropy(),
        };
        let mut actor = Actor::new(actor_id, &self.ledger, workload, rng);

        for i in 0..workload.operations_per_actor {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!("[ATM {}] stopping after {} operations", actor_id, i);
                break;
            }

            match self.sessions.acquire_permit(Some(workload.session_timeout())) {
                Some(_permit) => {
                    self.enter_session();
                    let _ = actor.step();
                    self.active_sessions.fetch_sub(1, Ordering::SeqCst);
                }
                None => {
                    tracing::debug!("[ATM {}] session timed out at operation {}", actor_id, i);
                    self.ledger.metrics().record_semaphore_timeout();
                    actor.record_timeout();
                }
            }

            if !workload.pace().is_zero() {
                thread::sleep(workload.pace());
            }
        }

        let report = actor.into_report();
        tracing::info!(
            "[ATM {}] {} successful, {} failed",
            actor_id,
            report.successful_ops,
            report.failed_ops
        );
        report
    }

    fn enter_session(&self) {
        let now = self.active_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_sessions.fetch_max(now, Ordering::SeqCst);
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Ledger total before any actor ran
    pub initial_total: Total,
    /// Ledger total after all actors joined
    pub final_total: Total,
    /// Session semaphore capacity
    pub session_permits: usize,
    /// Most sessions observed open at once
    pub peak_sessions: usize,
    /// Operations abandoned waiting for a session
    pub semaphore_timeouts: u64,
    /// Whether [`Simulation::stop`] cut the run short
    pub stopped_early: bool,
    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
    /// Per-actor tallies
    pub actors: Vec<ActorReport>,
    /// Post-run ledger audit
    pub audit: LedgerAudit,
}

impl SimulationReport {
    /// Committed operations across all actors
    pub fn successful_ops(&self) -> u64 {
        self.actors.iter().map(|a| a.successful_ops).sum()
    }

    /// Failed operations across all actors
    pub fn failed_ops(&self) -> u64 {
        self.actors.iter().map(|a| a.failed_ops).sum()
    }

    /// Net change reported by the actors themselves
    pub fn actor_net_flow(&self) -> Total {
        self.actors.iter().map(|a| a.deposited - a.withdrawn).sum()
    }

    /// Pretty-printed JSON rendering
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Conservation, per-account consistency and the session bound all hold
    pub fn passed(&self) -> bool {
        self.audit.passed()
            && self.final_total == self.audit.expected_total()
            && self.final_total == self.initial_total + self.actor_net_flow()
            && self.peak_sessions <= self.session_permits
    }
}
