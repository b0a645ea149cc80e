//! Configuration for the ledger and the ATM simulation

use crate::{types::Balance, Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use sync_primitives::ReleasePolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger shape
    pub ledger: LedgerConfig,

    /// ATM workload
    pub workload: WorkloadConfig,

    /// Report output
    pub report: ReportConfig,
}

/// Ledger shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of accounts (ids `0..num_accounts`)
    pub num_accounts: u32,

    /// Opening balance of every account
    pub initial_balance: Balance,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            num_accounts: 10,
            initial_balance: 1000,
        }
    }
}

/// ATM workload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Concurrent ATM actors (one OS thread each)
    pub actors: usize,

    /// Operations issued by each actor
    pub operations_per_actor: usize,

    /// Smallest random amount (inclusive)
    pub min_amount: Balance,

    /// Largest random amount (inclusive)
    pub max_amount: Balance,

    /// Pause between operations (milliseconds)
    pub pace_ms: u64,

    /// RNG seed; actor `i` uses `seed + i`. Entropy when unset.
    pub seed: Option<u64>,

    /// Concurrent ATM sessions allowed by the session semaphore
    pub session_permits: i64,

    /// How long an actor waits for a session permit (milliseconds)
    pub session_timeout_ms: u64,

    /// Release policy of the session semaphore
    pub release_policy: ReleasePolicy,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            actors: 3,
            operations_per_actor: 100,
            min_amount: 10,
            max_amount: 500,
            pace_ms: 10,
            seed: None,
            session_permits: 2,
            session_timeout_ms: 3_000,
            release_policy: ReleasePolicy::Permissive,
        }
    }
}

impl WorkloadConfig {
    /// Pause between operations
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    /// Session permit wait limit
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Human-readable log lines
    #[default]
    Text,
    /// Full report as JSON on stdout
    Json,
}

/// Report configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format
    pub format: ReportFormat,

    /// Print the Prometheus text exposition after the run
    pub print_metrics: bool,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(n) = env_var("ATM_ACCOUNTS")? {
            config.ledger.num_accounts = n;
        }
        if let Some(balance) = env_var("ATM_INITIAL_BALANCE")? {
            config.ledger.initial_balance = balance;
        }
        if let Some(actors) = env_var("ATM_ACTORS")? {
            config.workload.actors = actors;
        }
        if let Some(ops) = env_var("ATM_OPERATIONS")? {
            config.workload.operations_per_actor = ops;
        }
        if let Some(seed) = env_var("ATM_SEED")? {
            config.workload.seed = Some(seed);
        }
        if let Some(pace) = env_var("ATM_PACE_MS")? {
            config.workload.pace_ms = pace;
        }
        if let Some(permits) = env_var("ATM_SESSION_PERMITS")? {
            config.workload.session_permits = permits;
        }
        if let Ok(policy) = std::env::var("ATM_RELEASE_POLICY") {
            config.workload.release_policy = ReleasePolicy::parse(&policy)
                .ok_or_else(|| Error::Config(format!("Unknown release policy: {}", policy)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulation cannot run
    pub fn validate(&self) -> Result<()> {
        if self.ledger.num_accounts == 0 {
            return Err(Error::Config("num_accounts must be at least 1".to_string()));
        }
        if self.ledger.initial_balance < 0 {
            return Err(Error::Config(format!(
                "initial_balance must be >= 0, got {}",
                self.ledger.initial_balance
            )));
        }
        if self
            .ledger
            .initial_balance
            .checked_mul(Balance::from(self.ledger.num_accounts))
            .is_none()
        {
            return Err(Error::Config(format!(
                "{} accounts at {} each overflow the opening total",
                self.ledger.num_accounts, self.ledger.initial_balance
            )));
        }

        let workload = &self.workload;
        if workload.actors == 0 {
            return Err(Error::Config("actors must be at least 1".to_string()));
        }
        if workload.min_amount <= 0 {
            return Err(Error::Config(format!(
                "min_amount must be positive, got {}",
                workload.min_amount
            )));
        }
        if workload.min_amount > workload.max_amount {
            return Err(Error::Config(format!(
                "min_amount {} exceeds max_amount {}",
                workload.min_amount, workload.max_amount
            )));
        }
        if workload.session_permits <= 0 {
            return Err(Error::Config(format!(
                "session_permits must be at least 1, got {}",
                workload.session_permits
            )));
        }

        Ok(())
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value for {}: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ledger.num_accounts, 10);
        assert_eq!(config.ledger.initial_balance, 1000);
        assert_eq!(config.workload.actors, 3);
        assert_eq!(config.workload.operations_per_actor, 100);
        assert_eq!((config.workload.min_amount, config.workload.max_amount), (10, 500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[ledger]
num_accounts = 4

[workload]
actors = 8
seed = 42
release_policy = "strict"

[report]
format = "json"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.ledger.num_accounts, 4);
        assert_eq!(config.ledger.initial_balance, 1000);
        assert_eq!(config.workload.actors, 8);
        assert_eq!(config.workload.seed, Some(42));
        assert_eq!(config.workload.release_policy, ReleasePolicy::Strict);
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ledger = 12").unwrap();
        assert!(matches!(Config::from_file(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("atm.toml");
        assert!(matches!(Config::from_file(&missing), Err(Error::Io(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.ledger.num_accounts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ledger.initial_balance = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ledger.initial_balance = Balance::MAX / 4;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.workload.min_amount = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workload.min_amount = 600;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workload.actors = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workload.session_permits = 0;
        assert!(config.validate().is_err());
    }
}
