use cardpay::application::engine::TransferEngine;
use cardpay::domain::card::CardNumber;
use cardpay::domain::commission::CommissionConfig;
use cardpay::domain::ports::LedgerStoreBox;
use cardpay::infrastructure::in_memory::InMemoryLedger;
#[cfg(feature = "storage-rocksdb")]
use cardpay::infrastructure::rocksdb::RocksDbLedger;
use cardpay::interfaces::csv::card_reader::CardReader;
use cardpay::interfaces::csv::report_writer::ReportWriter;
use cardpay::interfaces::csv::request_reader::RequestReader;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cards CSV file used to seed the ledger
    cards: PathBuf,

    /// Transfer requests CSV file
    transfers: PathBuf,

    /// Commission rate as a decimal fraction (e.g. 0.05)
    #[arg(long, default_value = "0")]
    commission_rate: Decimal,

    /// 16-digit card number receiving the commission
    #[arg(long)]
    commission_card: Option<String>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn build_ledger(cli: &Cli) -> Result<LedgerStoreBox> {
    if let Some(db_path) = &cli.db_path {
        let store = RocksDbLedger::open(db_path).into_diagnostic()?;
        return Ok(Box::new(store));
    }
    Ok(Box::new(InMemoryLedger::new()))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_ledger(_cli: &Cli) -> Result<LedgerStoreBox> {
    Ok(Box::new(InMemoryLedger::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let beneficiary = cli
        .commission_card
        .as_deref()
        .map(CardNumber::parse)
        .transpose()
        .into_diagnostic()?;
    let commission = CommissionConfig::new(cli.commission_rate, beneficiary).into_diagnostic()?;

    let ledger = build_ledger(&cli)?;

    // Seed the ledger before processing any transfer.
    let cards_file = File::open(&cli.cards).into_diagnostic()?;
    for card in CardReader::new(cards_file).cards() {
        let card = card.into_diagnostic()?;
        ledger.insert_card(card).await.into_diagnostic()?;
    }

    let engine = TransferEngine::new(ledger, commission);

    let transfers_file = File::open(&cli.transfers).into_diagnostic()?;
    for submitted in RequestReader::new(transfers_file).requests() {
        match submitted {
            Ok(submitted) => {
                if let Err(e) = engine.transfer(submitted.initiator, submitted.request).await {
                    eprintln!("Error processing transfer: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading transfer request: {}", e);
            }
        }
    }

    let cards = engine.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_cards(cards).into_diagnostic()?;

    Ok(())
}
