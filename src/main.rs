use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use paygate::application::batch::{self, BatchOptions};
use paygate::application::orchestrator::PaymentOrchestrator;
use paygate::config::{
    DEFAULT_BANK_URL, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY,
    SettlementConfig,
};
use paygate::domain::ports::{IdempotencyGuardBox, PaymentStoreBox};
use paygate::error::PaymentError;
use paygate::infrastructure::in_memory::{InMemoryIdempotencyGuard, InMemoryPaymentStore};
#[cfg(feature = "storage-rocksdb")]
use paygate::infrastructure::rocksdb::RocksDBStore;
use paygate::infrastructure::settlement_client::HttpSettlementClient;
use paygate::interfaces::csv::outcome_writer::OutcomeWriter;
use paygate::interfaces::csv::payment_reader::PaymentReader;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(flatten)]
    settlement: SettlementArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a CSV file of payment submissions and print the outcomes as CSV
    Process {
        /// Input submissions CSV file
        input: PathBuf,

        /// Number of submissions processed concurrently
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        concurrency: u32,

        /// Cancel a settlement call still running after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Print a previously processed payment as JSON. Requires --db-path, since
    /// payments only outlive a run in a persistent store.
    Get {
        /// Payment identifier
        id: Uuid,
    },
}

#[derive(Args)]
struct SettlementArgs {
    /// Base URL of the settlement authority
    #[arg(long, global = true, env = "BANK_API_URL", default_value = DEFAULT_BANK_URL)]
    bank_url: String,

    /// Retries after the first settlement attempt
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Fixed delay between settlement attempts, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    retry_delay_ms: u64,

    /// Timeout for a single settlement attempt, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    request_timeout_ms: u64,
}

impl SettlementArgs {
    fn to_config(&self) -> Result<SettlementConfig> {
        SettlementConfig::new(
            &self.bank_url,
            self.max_retries,
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.request_timeout_ms),
        )
        .into_diagnostic()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Command::Get { .. }) && cli.db_path.is_none() {
        return Err(PaymentError::ConfigError(
            "get requires --db-path: payments only outlive a run in a persistent store"
                .to_string(),
        ))
        .into_diagnostic();
    }

    let config = cli.settlement.to_config()?;
    let (guard, store) = open_storage(cli.db_path)?;
    let settlement = HttpSettlementClient::new(&config).into_diagnostic()?;
    let orchestrator = Arc::new(PaymentOrchestrator::new(guard, store, Box::new(settlement)));

    match cli.command {
        Command::Process {
            input,
            concurrency,
            deadline_ms,
        } => {
            let file = File::open(input).into_diagnostic()?;
            let options = BatchOptions {
                concurrency: concurrency as usize,
                deadline: deadline_ms.map(Duration::from_millis),
            };
            let submissions = PaymentReader::new(file).submissions();
            let outcomes = batch::process_batch(orchestrator, submissions, options).await;

            let stdout = io::stdout();
            let mut writer = OutcomeWriter::new(stdout.lock());
            writer.write_outcomes(&outcomes).into_diagnostic()?;
        }
        Command::Get { id } => match orchestrator.get_payment(id).await.into_diagnostic()? {
            Some(payment) => {
                let json = serde_json::to_string_pretty(&payment).into_diagnostic()?;
                println!("{}", json);
            }
            None => return Err(PaymentError::NotFound(id)).into_diagnostic(),
        },
    }

    Ok(())
}

fn open_storage(db_path: Option<PathBuf>) -> Result<(IdempotencyGuardBox, PaymentStoreBox)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(path) = db_path {
        let store = RocksDBStore::open(path).into_diagnostic()?;
        return Ok((Box::new(store.clone()), Box::new(store)));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }

    Ok((
        Box::new(InMemoryIdempotencyGuard::new()),
        Box::new(InMemoryPaymentStore::new()),
    ))
}
