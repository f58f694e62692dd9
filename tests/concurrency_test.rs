// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Concurrent settlement tests with parking_lot's deadlock detector.
//!
//! Every engine entry point takes `&self`, so an `Arc<Engine>` is shared
//! across threads directly. The detector thread watches for cycles in the
//! lock graph while settlements, submissions, and reads race.

use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_rs::{
    AccountId, Engine, Profile, SettlementDecision, SettlementError, TransactionId,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

fn engine_with_accounts(count: u32) -> Arc<Engine> {
    let engine = Engine::new();
    for id in 1..=count {
        engine
            .open_account(AccountId(id), Profile::default())
            .unwrap();
    }
    Arc::new(engine)
}

// === Tests ===

/// All threads race to settle the same pending deposit; exactly one wins.
#[test]
fn concurrent_settlement_single_winner() {
    let detector = start_deadlock_detector();
    let engine = engine_with_accounts(1);

    engine
        .submit_deposit(TransactionId(1), AccountId(1), dec!(100.00), None)
        .unwrap();

    const NUM_THREADS: usize = 20;
    let mut handles = Vec::with_capacity(NUM_THREADS);

    for i in 0..NUM_THREADS {
        let engine = engine.clone();
        let decision = if i % 2 == 0 {
            SettlementDecision::Approve
        } else {
            SettlementDecision::Reject
        };

        handles.push(thread::spawn(move || {
            engine.settle(TransactionId(1), decision)
        }));
    }

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();

    stop_deadlock_detector(detector);

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one settlement should commit");
    for result in &results {
        if let Err(e) = result {
            assert_eq!(*e, SettlementError::AlreadySettled);
        }
    }

    // The balance reflects the winner's verdict exactly once.
    let balance = engine.ledger().balance(AccountId(1)).unwrap();
    let winner = results.iter().flatten().next().unwrap();
    match winner.status {
        settlement_rs::TransactionStatus::Completed => assert_eq!(balance, dec!(100.00)),
        _ => assert_eq!(balance, Decimal::ZERO),
    }
}

/// Concurrent commissions to a shared referrer are not lost.
#[test]
fn concurrent_commissions_accumulate_exactly() {
    let detector = start_deadlock_detector();

    const NUM_REFERRED: u32 = 30;
    // Account 1 is the referrer; accounts 2..=31 are referred.
    let engine = engine_with_accounts(NUM_REFERRED + 1);
    for id in 2..=NUM_REFERRED + 1 {
        engine.refer(AccountId(1), AccountId(id), dec!(5)).unwrap();
        engine
            .submit_deposit(TransactionId(id), AccountId(id), dec!(200.00), None)
            .unwrap();
    }

    let mut handles = Vec::with_capacity(NUM_REFERRED as usize);
    for id in 2..=NUM_REFERRED + 1 {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            engine
                .settle(TransactionId(id), SettlementDecision::Approve)
                .expect("settlement should commit")
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // 5% of 200.00, thirty times over.
    let expected = dec!(10.00) * Decimal::from(NUM_REFERRED);
    assert_eq!(engine.ledger().balance(AccountId(1)), Ok(expected));
}

/// Mixed submissions, settlements, and reads under high contention.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();

    const NUM_ACCOUNTS: u32 = 20;
    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 40;

    let engine = engine_with_accounts(NUM_ACCOUNTS);
    let tx_counter = Arc::new(AtomicU32::new(1));

    // Seed every account so withdrawals have funds to escrow.
    for id in 1..=NUM_ACCOUNTS {
        let tx = tx_counter.fetch_add(1, Ordering::SeqCst);
        engine
            .submit_deposit(TransactionId(tx), AccountId(id), dec!(10000.00), None)
            .unwrap();
        engine
            .settle(TransactionId(tx), SettlementDecision::Approve)
            .unwrap();
    }

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let engine = engine.clone();
        let tx_counter = tx_counter.clone();

        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let account = AccountId(((thread_id + i) % NUM_ACCOUNTS as usize) as u32 + 1);
                let tx = TransactionId(tx_counter.fetch_add(1, Ordering::SeqCst));

                match i % 5 {
                    0 => {
                        let _ = engine.submit_deposit(tx, account, dec!(1.00), None);
                        let _ = engine.settle(tx, SettlementDecision::Approve);
                    }
                    1 => {
                        if engine
                            .submit_withdrawal(tx, account, dec!(0.50), None)
                            .is_ok()
                        {
                            let _ = engine.settle(tx, SettlementDecision::Reject);
                        }
                    }
                    2 => {
                        let _ = engine.submit_deposit(tx, account, dec!(2.00), None);
                        let _ = engine.settle(tx, SettlementDecision::Reject);
                    }
                    3 => {
                        let _ = engine.ledger().balance(account);
                    }
                    _ => {
                        // Iterate while others mutate.
                        let mut total = Decimal::ZERO;
                        for entry in engine.ledger().accounts() {
                            total += entry.value().balance();
                        }
                        std::hint::black_box(total);
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    for id in 1..=NUM_ACCOUNTS {
        assert!(engine.ledger().balance(AccountId(id)).unwrap() >= Decimal::ZERO);
    }
}

/// Approve and reject race on the same withdrawal; the final balance
/// matches whichever verdict won.
#[test]
fn withdrawal_verdict_race_is_consistent() {
    let detector = start_deadlock_detector();

    const ROUNDS: u32 = 20;
    let engine = engine_with_accounts(1);

    engine
        .submit_deposit(TransactionId(1000), AccountId(1), dec!(1000.00), None)
        .unwrap();
    engine
        .settle(TransactionId(1000), SettlementDecision::Approve)
        .unwrap();

    let mut withdrawn = Decimal::ZERO;

    for round in 1..=ROUNDS {
        let tx = TransactionId(round);
        engine
            .submit_withdrawal(tx, AccountId(1), dec!(10.00), None)
            .unwrap();

        let approver = {
            let engine = engine.clone();
            thread::spawn(move || engine.settle(tx, SettlementDecision::Approve))
        };
        let rejecter = {
            let engine = engine.clone();
            thread::spawn(move || engine.settle(tx, SettlementDecision::Reject))
        };

        let a = approver.join().expect("Thread panicked");
        let r = rejecter.join().expect("Thread panicked");
        assert!(a.is_ok() ^ r.is_ok(), "exactly one verdict must commit");

        if a.is_ok() {
            withdrawn += dec!(10.00);
        }

        let expected = dec!(1000.00) - withdrawn;
        assert_eq!(engine.ledger().balance(AccountId(1)), Ok(expected));
    }

    stop_deadlock_detector(detector);
}

/// Concurrent submissions with the same transaction ID escrow at most once.
#[test]
fn duplicate_withdrawal_submissions_escrow_once() {
    let detector = start_deadlock_detector();
    let engine = engine_with_accounts(1);

    engine
        .submit_deposit(TransactionId(100), AccountId(1), dec!(100.00), None)
        .unwrap();
    engine
        .settle(TransactionId(100), SettlementDecision::Approve)
        .unwrap();

    const NUM_THREADS: usize = 20;
    let mut handles = Vec::with_capacity(NUM_THREADS);

    for _ in 0..NUM_THREADS {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            engine.submit_withdrawal(TransactionId(1), AccountId(1), dec!(40.00), None)
        }));
    }

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|r| r.is_ok())
        .count();

    stop_deadlock_detector(detector);

    assert_eq!(successes, 1, "only one submission should take the ID");
    assert_eq!(engine.ledger().balance(AccountId(1)), Ok(dec!(60.00)));
}
