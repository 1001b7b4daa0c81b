use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use votehub::application::payments::{PaymentRequest, PaymentService};
use votehub::application::settlement::{ManualVote, SettlementEngine};
use votehub::application::sweeper::Sweeper;
use votehub::application::ussd::UssdService;
use votehub::config::Settings;
use votehub::domain::ports::SharedPaymentGateway;
use votehub::infrastructure::Stores;
use votehub::infrastructure::paystack::PaystackGateway;
use votehub::interfaces::catalog::Catalog;
use votehub::interfaces::csv::response_writer::ResponseWriter;
use votehub::interfaces::csv::turn_reader::TurnReader;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay USSD turns from a CSV file and print each response
    Ussd {
        /// Input turns CSV file
        input: PathBuf,
    },
    /// Start a gateway payment for votes
    Pay {
        #[arg(long)]
        nominee_id: u64,
        #[arg(long)]
        votes: u32,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
    },
    /// Verify a payment by reference and credit its votes
    Verify { reference: String },
    /// Record votes directly for a nominee
    Record {
        #[arg(long)]
        nominee_id: u64,
        #[arg(long)]
        votes: u32,
        #[arg(long)]
        phone_number: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Remove sessions older than the session TTL
    Cleanup,
    /// Print session and payment statistics as JSON
    Stats {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Periodically expire sessions and poll pending payments until Ctrl-C
    Watch {
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    use votehub::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Stores::rocksdb(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Stores::in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    if db_path.is_some() {
        tracing::warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Stores::in_memory())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;
    settings.validate().into_diagnostic()?;

    let stores = open_stores(settings.db_path.as_deref())?;
    if let Some(path) = &settings.catalog {
        let catalog = Catalog::from_reader(File::open(path).into_diagnostic()?).into_diagnostic()?;
        let loaded = catalog.seed(stores.ledger.as_ref()).await.into_diagnostic()?;
        info!(nominees = loaded, "catalog loaded");
    }

    let gateway: SharedPaymentGateway =
        Arc::new(PaystackGateway::new(settings.gateway_config()).into_diagnostic()?);
    let payments = PaymentService::new(&stores, gateway.clone(), settings.callback_url.clone());
    let engine = SettlementEngine::new(&stores, gateway);

    match cli.command {
        Command::Ussd { input } => {
            let ussd = UssdService::new(&stores, payments, settings.ussd_email_domain.clone());
            let reader = TurnReader::new(File::open(input).into_diagnostic()?);
            let stdout = io::stdout();
            let mut writer = ResponseWriter::new(stdout.lock());
            for turn in reader.turns() {
                match turn {
                    Ok(turn) => {
                        let session_id = turn.session_id.clone();
                        let response = ussd.handle_turn(turn).await;
                        writer.write(&session_id, &response).into_diagnostic()?;
                    }
                    Err(e) => eprintln!("Error reading turn: {}", e),
                }
            }
            writer.flush().into_diagnostic()?;
        }
        Command::Pay {
            nominee_id,
            votes,
            email,
            phone,
        } => {
            let initiation = payments
                .initiate(PaymentRequest {
                    nominee_id,
                    votes,
                    email,
                    phone,
                })
                .await
                .into_diagnostic()?;
            println!("{},{}", initiation.reference, initiation.authorization_url);
        }
        Command::Verify { reference } => {
            let outcome = engine.settle_by_payment(&reference).await.into_diagnostic()?;
            println!("{},{}", outcome.is_success(), outcome.message());
        }
        Command::Record {
            nominee_id,
            votes,
            phone_number,
            email,
        } => {
            let record = engine
                .settle_manually(ManualVote {
                    nominee_id,
                    votes,
                    phone_number,
                    email,
                })
                .await
                .into_diagnostic()?;
            println!("{}", record.id);
        }
        Command::Cleanup => {
            let sweeper = Sweeper::new(
                stores.sessions.clone(),
                engine,
                settings.session_ttl().into_diagnostic()?,
            );
            println!("{}", sweeper.expire_sessions().await.into_diagnostic()?);
        }
        Command::Stats { days } => {
            let ussd = UssdService::new(&stores, payments, settings.ussd_email_domain.clone());
            let sessions = ussd.statistics(days).await.into_diagnostic()?;
            let payments = stores.payments.statistics().await.into_diagnostic()?;
            let report = serde_json::json!({
                "sessions": sessions,
                "payments": payments,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).into_diagnostic()?
            );
        }
        Command::Watch { interval_secs } => {
            let sweeper = Sweeper::new(
                stores.sessions.clone(),
                engine,
                settings.session_ttl().into_diagnostic()?,
            );
            sweeper
                .run(
                    Duration::from_secs(interval_secs.max(1)),
                    tokio::signal::ctrl_c(),
                )
                .await
                .into_diagnostic()?;
        }
    }

    Ok(())
}
