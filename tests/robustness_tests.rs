use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;
use common::write_ops_csv;

#[test]
fn test_malformed_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.csv");
    write_ops_csv(
        &path,
        &[
            ["onboard", "alice", "consumer", "", ""],
            // Unknown operation
            ["withdraw", "alice", "", "1.00", ""],
            // Text in amount field
            ["cashback", "alice", "", "not_a_number", ""],
            // Missing amount (required)
            ["cashback", "alice", "", "", "promo"],
            ["cashback", "alice", "", "5.00", "promo"],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("wallet-ledger"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading operation"))
        .stderr(predicate::str::contains("Error processing operation cashback"))
        // 50.00 onboarding bonus + 5.00
        .stdout(predicate::str::contains("alice,CONSUMER,55.00"));
}

#[test]
fn test_rejected_operations_do_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.csv");
    write_ops_csv(
        &path,
        &[
            ["onboard", "alice", "consumer", "", ""],
            ["onboard", "bob", "consumer", "", ""],
            // Exceeds the 50.00 bonus once the fee is added
            ["send", "alice", "bob", "50.00", ""],
            ["send", "alice", "alice", "1.00", ""],
            ["send", "alice", "bob", "1.001", ""],
            ["complete_cash_out", "bob", "", "", "missing"],
            ["send", "alice", "bob", "45.00", ""],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("wallet-ledger"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing operation send"))
        .stderr(predicate::str::contains("Error processing operation complete_cash_out"))
        .stdout(predicate::str::contains("alice,CONSUMER,0.00"))
        .stdout(predicate::str::contains("bob,CONSUMER,95.00"))
        .stderr(predicate::str::contains("Reconciliation: OK"));
}
