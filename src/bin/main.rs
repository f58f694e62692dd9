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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use settlement_rs::{AccountId, Engine, Profile, SettlementDecision, TransactionId};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Settlement Engine - Replay platform operations from a CSV file
///
/// Reads account registrations, referrals, deposit/withdrawal requests,
/// and settlement verdicts from a CSV file, then writes the final account
/// statement to stdout.
#[derive(Parser, Debug)]
#[command(name = "settlement-rs")]
#[command(about = "A settlement engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,account,tx,amount,arg
    /// Example: cargo run -- operations.csv > statement.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Replay operations from CSV
    let engine = match replay_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    // Write results to stdout
    if let Err(e) = write_statement(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, account, tx, amount, arg`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    account: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    tx: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    arg: Option<String>,
}

impl CsvRecord {
    /// Applies the record to the engine.
    ///
    /// Returns `None` for unknown operations or missing required fields,
    /// `Some(result)` otherwise.
    fn apply(self, engine: &Engine) -> Option<Result<(), settlement_rs::SettlementError>> {
        let result = match self.op.to_lowercase().as_str() {
            "open" => {
                let account = AccountId(self.account?);
                let profile = match self.arg.filter(|s| !s.is_empty()) {
                    Some(email) => Profile::with_email(email),
                    None => Profile::default(),
                };
                engine.open_account(account, profile)
            }
            "code" => {
                let account = AccountId(self.account?);
                let code = self.arg.filter(|s| !s.is_empty())?;
                engine.ledger().set_referral_code(account, code)
            }
            "refer" => {
                let referred = AccountId(self.account?);
                let rate = self.amount?;
                let code = self.arg.filter(|s| !s.is_empty())?;
                engine.refer_by_code(&code, referred, rate).map(|_| ())
            }
            "deposit" => {
                let account = AccountId(self.account?);
                let tx = TransactionId(self.tx?);
                engine.submit_deposit(tx, account, self.amount?, None)
            }
            "withdrawal" => {
                let account = AccountId(self.account?);
                let tx = TransactionId(self.tx?);
                engine
                    .submit_withdrawal(tx, account, self.amount?, None)
                    .map(|_| ())
            }
            "invest" => {
                let account = AccountId(self.account?);
                let tx = TransactionId(self.tx?);
                engine
                    .record_investment(tx, account, self.amount?, "Investment")
                    .map(|_| ())
            }
            "gain" => {
                let account = AccountId(self.account?);
                let tx = TransactionId(self.tx?);
                engine
                    .record_gain(tx, account, self.amount?, "Investment gain")
                    .map(|_| ())
            }
            "approve" => {
                let tx = TransactionId(self.tx?);
                engine.settle(tx, SettlementDecision::Approve).map(|_| ())
            }
            "reject" => {
                let tx = TransactionId(self.tx?);
                engine.settle(tx, SettlementDecision::Reject).map(|_| ())
            }
            _ => return None,
        };
        Some(result)
    }
}

/// Replay operations from a CSV reader.
///
/// Uses streaming parsing to handle arbitrarily large files. Malformed rows
/// and failed operations are logged and skipped; processing continues.
///
/// # CSV Format
///
/// Expected columns: `op, account, tx, amount, arg`
/// - `op`: open, code, refer, deposit, withdrawal, invest, gain, approve, reject
/// - `account`: Account ID (u32); for `refer` the referred account
/// - `tx`: Transaction ID (u32) for requests and verdicts
/// - `amount`: Decimal amount; for `refer` the commission rate (percent)
/// - `arg`: email for `open`, referral code for `code` and `refer`
///
/// # Example
///
/// ```csv
/// op,account,tx,amount,arg
/// open,1,,,alice@example.com
/// deposit,1,1,100.0,
/// approve,,1,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_operations<R: Read>(reader: R) -> Result<Engine, csv::Error> {
    let engine = Engine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " deposit "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let op = record.op.clone();
                match record.apply(&engine) {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%op, error = %e, "skipping failed operation");
                    }
                    None => {
                        tracing::debug!(%op, "skipping invalid operation record");
                    }
                }
            }
            Err(e) => {
                // Skip malformed rows
                tracing::debug!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(engine)
}

/// Write the account statement to a CSV writer.
///
/// Outputs all accounts ordered by ID, balances rounded to 2 decimal
/// precision.
///
/// # CSV Format
///
/// Columns: `account, balance, email`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_statement<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut accounts: Vec<_> = engine.ledger().accounts().collect();
    accounts.sort_by_key(|account| account.key().0);

    for account in accounts {
        wtr.serialize(account.value())?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
