use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use wallet_ledger::application::engine::WalletEngine;
use wallet_ledger::application::receipt::Outcome;
use wallet_ledger::config::AppConfig;
use wallet_ledger::domain::ports::StorageBackendBox;
use wallet_ledger::infrastructure::in_memory::InMemoryBackend;
use wallet_ledger::infrastructure::rates::StaticRates;
use wallet_ledger::infrastructure::simulated_bank::SimulatedBank;
use wallet_ledger::interfaces::batch::BatchRunner;
use wallet_ledger::interfaces::csv::command_reader::CommandReader;
use wallet_ledger::interfaces::csv::wallet_writer::WalletWriter;
use wallet_ledger::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// YAML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Write one JSON outcome per operation to this file.
    #[arg(long)]
    receipts: Option<PathBuf>,
}

fn open_backend(db_path: Option<PathBuf>) -> Result<StorageBackendBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let backend =
                wallet_ledger::infrastructure::rocksdb::RocksDBBackend::open(path).into_diagnostic()?;
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryBackend::new()))
        }
        None => Ok(Box::new(InMemoryBackend::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).into_diagnostic()?,
        None => AppConfig::default(),
    };
    let _log_guard = init_logging(&config).into_diagnostic()?;

    let bank = SimulatedBank::new(config.bank_accounts.clone());
    let engine = WalletEngine::new(
        open_backend(cli.db_path)?,
        Box::new(StaticRates::new(config.rates.clone())),
        Box::new(bank.clone()),
        Box::new(bank),
        config.engine_settings().into_diagnostic()?,
    );
    engine
        .initialize_reserve(config.reserve.opening_balance)
        .await
        .into_diagnostic()?;

    let mut receipts = match &cli.receipts {
        Some(path) => Some(BufWriter::new(File::create(path).into_diagnostic()?)),
        None => None,
    };

    // Process operations
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let mut runner = BatchRunner::new(&engine);
    for row in reader.commands() {
        match row {
            Ok(record) => {
                let result = runner.apply(&record).await;
                if let Err(e) = &result {
                    eprintln!("Error processing operation {}: {}", record.op, e);
                }
                if let Some(out) = receipts.as_mut() {
                    serde_json::to_writer(&mut *out, &Outcome::from(result)).into_diagnostic()?;
                    writeln!(out).into_diagnostic()?;
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }
    if let Some(mut out) = receipts {
        out.flush().into_diagnostic()?;
    }

    let relayed = engine.relay_outbox().await.into_diagnostic()?;
    let expired = engine.expire_stale_cash_outs().await.into_diagnostic()?;
    info!(?relayed, expired, "batch finished");

    // Output final state
    let wallets = engine.wallets().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = WalletWriter::new(stdout.lock());
    writer.write_wallets(&wallets).into_diagnostic()?;

    let stats = engine.reserve_statistics().await.into_diagnostic()?;
    let report = engine.reconcile_reserve().await.into_diagnostic()?;
    eprintln!(
        "Platform reserve: balance {}, fees collected {}, commissions paid {}, bonuses given {}, net revenue {}",
        stats.balance,
        stats.total_fees_collected,
        stats.total_commissions_paid,
        stats.total_bonuses_given,
        stats.net_revenue
    );
    eprintln!(
        "Reconciliation: {} ({})",
        if report.success { "OK" } else { "MISMATCH" },
        report.message
    );

    Ok(())
}
