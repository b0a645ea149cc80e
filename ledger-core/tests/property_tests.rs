//! Property-based and concurrency tests for ledger invariants
//!
//! These tests verify the critical invariants:
//! - Money conservation: balance == initial + Σ(deposits) − Σ(withdrawals)
//! - No overdraft: balances never go negative
//! - Linearizability: per-account logs are gap-free and chained
//! - Isolation: a failed operation never disturbs other state

use ledger_core::{
    config::WorkloadConfig,
    workload::{run_actor, Operation},
    AccountId, Config, Error, Ledger, Simulation, Total, TransactionKind,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread;

/// Strategy for generating a single ATM operation on a small ledger
fn operation_strategy(accounts: u32) -> impl Strategy<Value = Operation> {
    (0..accounts, -50i64..600, any::<bool>()).prop_map(|(account, amount, deposit)| {
        let account = AccountId::new(account);
        if deposit {
            Operation::Deposit { account, amount }
        } else {
            Operation::Withdraw { account, amount }
        }
    })
}

/// Sum committed deposits and withdrawals straight from the logs
fn log_flows(ledger: &Ledger) -> (Total, Total) {
    let mut deposited = 0;
    let mut withdrawn = 0;
    for account in ledger.accounts() {
        for record in account.transactions() {
            match record.kind {
                TransactionKind::Deposit => deposited += Total::from(record.amount),
                TransactionKind::Withdraw => withdrawn += Total::from(record.amount),
                TransactionKind::FailedWithdraw => {}
            }
        }
    }
    (deposited, withdrawn)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a sequential history keeps every account equal to its replay
    #[test]
    fn prop_sequential_history_conserves_money(
        ops in prop::collection::vec(operation_strategy(4), 1..200)
    ) {
        let ledger = Ledger::new(4, 500).unwrap();
        let mut expected = vec![500i64; 4];

        for op in &ops {
            let idx = op.account().get() as usize;
            match op.apply(&ledger) {
                Ok(balance) => {
                    match op {
                        Operation::Deposit { amount, .. } => expected[idx] += amount,
                        Operation::Withdraw { amount, .. } => expected[idx] -= amount,
                    }
                    prop_assert_eq!(balance, expected[idx]);
                }
                Err(Error::Validation(_)) => prop_assert!(op.amount() <= 0),
                Err(Error::InsufficientFunds { available, requested, .. }) => {
                    prop_assert_eq!(available, expected[idx]);
                    prop_assert!(requested > available);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        for (idx, want) in expected.iter().enumerate() {
            let balance = ledger.get_balance(AccountId::new(idx as u32)).unwrap();
            prop_assert_eq!(balance, *want);
            prop_assert!(balance >= 0);
        }
        prop_assert!(ledger.audit().passed());
    }

    /// Property: non-positive amounts are refused and leave no trace
    #[test]
    fn prop_non_positive_amounts_rejected(amount in i64::MIN..=0) {
        let ledger = Ledger::new(1, 100).unwrap();
        let id = AccountId::new(0);

        prop_assert!(matches!(ledger.deposit(id, amount), Err(Error::Validation(_))));
        prop_assert!(matches!(ledger.withdraw(id, amount), Err(Error::Validation(_))));
        prop_assert_eq!(ledger.get_balance(id).unwrap(), 100);
        prop_assert!(ledger.account(id).unwrap().transactions().is_empty());
    }

    /// Property: any seeded workload conserves money
    #[test]
    fn prop_seeded_workload_conserves(seed in any::<u64>(), ops in 1usize..150) {
        let ledger = Ledger::new(5, 200).unwrap();
        let config = WorkloadConfig {
            operations_per_actor: ops,
            ..WorkloadConfig::default()
        };

        let report = run_actor(&ledger, 0, StdRng::seed_from_u64(seed), &config, || {});

        prop_assert_eq!(report.total_ops(), ops as u64);
        prop_assert_eq!(
            ledger.get_total(),
            ledger.initial_total() + report.deposited - report.withdrawn
        );
        prop_assert!(ledger.audit().passed());
    }
}

#[test]
fn test_deposit_negative_amount_scenario() {
    let ledger = Ledger::new(1, 1000).unwrap();
    let id = AccountId::new(0);

    assert!(matches!(ledger.deposit(id, -5), Err(Error::Validation(_))));
    assert_eq!(ledger.get_balance(id).unwrap(), 1000);
}

#[test]
fn test_five_concurrent_withdrawals_scenario() {
    let ledger = Ledger::new(1, 100).unwrap();
    let id = AccountId::new(0);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..5).map(|_| s.spawn(|| ledger.withdraw(id, 100))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::InsufficientFunds { .. })))
            .count(),
        4
    );
    assert_eq!(ledger.get_balance(id).unwrap(), 0);
}

#[test]
fn test_twenty_concurrent_withdrawals_never_overdraw() {
    let ledger = Ledger::new(1, 1000).unwrap();
    let id = AccountId::new(0);

    let successes: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..20)
            .map(|_| s.spawn(|| ledger.withdraw(id, 100).is_ok()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum()
    });

    assert_eq!(successes, 10);
    assert_eq!(ledger.get_balance(id).unwrap(), 0);
    assert_eq!(ledger.metrics().failed_withdrawals_total.get(), 10);
}

#[test]
fn test_three_atm_scenario_conserves_total() {
    let ledger = Arc::new(Ledger::new(10, 1000).unwrap());
    assert_eq!(ledger.get_total(), 10_000);

    let config = WorkloadConfig {
        operations_per_actor: 100,
        ..WorkloadConfig::default()
    };

    let reports: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..3u64)
            .map(|atm| {
                let ledger = Arc::clone(&ledger);
                let config = &config;
                s.spawn(move || {
                    let rng = StdRng::seed_from_u64(atm);
                    run_actor(&ledger, atm as usize, rng, config, thread::yield_now)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let (deposited, withdrawn) = log_flows(&ledger);
    assert_eq!(ledger.get_total(), 10_000 + deposited - withdrawn);

    let ops: u64 = reports.iter().map(|r| r.total_ops()).sum();
    assert_eq!(ops, 300);
    let actor_net: Total = reports.iter().map(|r| r.deposited - r.withdrawn).sum();
    assert_eq!(deposited - withdrawn, actor_net);

    for account in ledger.accounts() {
        assert!(account.get_balance() >= 0);
    }
    assert!(ledger.audit().passed());
}

#[test]
fn test_logs_are_linearizable_under_contention() {
    let ledger = Ledger::new(2, 0).unwrap();

    thread::scope(|s| {
        for worker in 0..8u32 {
            let ledger = &ledger;
            s.spawn(move || {
                for i in 0..250i64 {
                    let id = AccountId::new((worker + i as u32) % 2);
                    if i % 3 == 0 {
                        let _ = ledger.withdraw(id, 7);
                    } else {
                        ledger.deposit(id, 5).unwrap();
                    }
                }
            });
        }
    });

    for account in ledger.accounts() {
        let log = account.transactions();
        let mut previous_close = account.initial_balance();
        for (index, record) in log.iter().enumerate() {
            assert_eq!(record.seq, index as u64);
            assert_eq!(record.balance_before, previous_close);
            assert!(record.balance_after >= 0);
            previous_close = record.balance_after;
        }
        assert_eq!(previous_close, account.get_balance());
    }
}

#[test]
fn test_consistent_total_during_transfers() {
    let ledger = Ledger::new(2, 1000).unwrap();
    let (a, b) = (AccountId::new(0), AccountId::new(1));

    thread::scope(|s| {
        // Each round deposits into one account and withdraws the same
        // amount from the other, so between rounds the total is 2000.
        let mover = s.spawn(|| {
            for _ in 0..500 {
                if ledger.withdraw(a, 10).is_ok() {
                    ledger.deposit(b, 10).unwrap();
                }
                if ledger.withdraw(b, 10).is_ok() {
                    ledger.deposit(a, 10).unwrap();
                }
            }
        });

        for _ in 0..200 {
            let total = ledger.get_total_consistent();
            assert!(total == 2000 || total == 1990, "torn total {}", total);
        }
        mover.join().unwrap();
    });

    assert_eq!(ledger.get_total_consistent(), 2000);
}

#[test]
fn test_audit_reentry_while_mutating() {
    let ledger = Ledger::new(3, 300).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..300 {
                let _ = ledger.withdraw(AccountId::new(i % 3), 40);
                ledger.deposit(AccountId::new((i + 1) % 3), 25).unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..50 {
                assert!(ledger.audit().passed());
            }
        });
    });

    assert!(ledger.audit().passed());
}

#[test]
fn test_simulation_from_config() {
    let mut config = Config::default();
    config.ledger.num_accounts = 6;
    config.workload.actors = 4;
    config.workload.operations_per_actor = 75;
    config.workload.pace_ms = 0;
    config.workload.seed = Some(11);

    let sim = Simulation::new(config).unwrap();
    let report = sim.run().unwrap();

    assert!(report.passed());
    assert_eq!(report.successful_ops() + report.failed_ops(), 300);
    assert_eq!(
        report.final_total,
        report.initial_total + report.audit.deposited - report.audit.withdrawn
    );
    assert_eq!(sim.ledger().get_total(), report.final_total);
}
