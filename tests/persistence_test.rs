#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: onboard and fund alice
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "op,user,counterparty,amount,reference").unwrap();
    writeln!(csv1, "onboard,alice,consumer,,").unwrap();
    writeln!(csv1, "onboard,bob,consumer,,").unwrap();
    writeln!(csv1, "cashback,alice,,100.00,promo").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("wallet-ledger"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("alice,CONSUMER,150.00"));

    // 2. Second run: spend from the recovered balance using the same DB path
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "op,user,counterparty,amount,reference").unwrap();
    writeln!(csv2, "send,alice,bob,50.00,").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("wallet-ledger"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    let stderr2 = String::from_utf8_lossy(&output2.stderr);

    // 150 recovered, minus 50 sent and the 5.00 fee
    assert!(stdout2.contains("alice,CONSUMER,95.00"));
    assert!(stdout2.contains("bob,CONSUMER,100.00"));
    // The reserve was not re-seeded on the second run.
    assert!(stderr2.contains("Reconciliation: OK"));
}
