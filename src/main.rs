use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use disbursement_tracker::{
    config::{
        AppConfig, database,
        settings::{load_config, load_default_config},
    },
    core::{
        batch::get_batch_by_id,
        batch_item::get_batch_item_by_id,
        ledger::{sync_all_batches, sync_batch},
        notify::{AmountDetails, clean_phone, notification_message},
        proof::FsProofStore,
        recipient::get_recipient_by_id,
        render::{format_allocation, format_batch_checklist, format_cashflow, format_monthly_summary},
        report::{
            AllocationType, GroupBy, allocation_summary, batch_checklist, cashflow, monthly_summary,
            parse_date,
        },
        startup::run_startup_tasks,
    },
    errors::{Error, Result},
};
use dotenvy::dotenv;
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Recipient payment batches and the finance ledger they feed.
#[derive(Parser, Debug)]
#[command(name = "disbursement-tracker", version, about, long_about = None)]
struct Cli {
    /// Path to config.toml; defaults to $DISBURSEMENT_CONFIG or ./config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-derive the ledger rows of one batch, or of every batch.
    Sync {
        #[arg(long)]
        batch: Option<i64>,
    },
    /// Income, expense and pending approvals for one month.
    Summary {
        /// Month as YYYY-MM; defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
    /// Income and expense per day, week or month.
    Cashflow {
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
        #[arg(long, default_value_t = GroupBy::Day)]
        group_by: GroupBy,
    },
    /// Totals per destination label.
    Allocation {
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
        #[arg(long = "type", default_value_t = AllocationType::Income)]
        allocation_type: AllocationType,
    },
    /// Transfer checklist of one batch.
    BatchReport {
        #[arg(long)]
        batch: i64,
    },
    /// Notification message and WhatsApp number for one batch item.
    Message {
        #[arg(long)]
        item: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path),
        None => load_default_config(),
    }
    .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    let db = database::open(&config.database)
        .await
        .inspect_err(|e| error!("Failed to open database: {e}"))?;

    let result = run(&db, &config, cli.command).await;
    database::close(db).await?;

    let output = result.inspect_err(|e| error!("{e}"))?;
    println!("{output}");
    Ok(())
}

async fn run(db: &DatabaseConnection, config: &AppConfig, command: Command) -> Result<String> {
    let store = FsProofStore::new(&config.storage.proofs_dir);
    run_startup_tasks(db, config, &store).await?;

    match command {
        Command::Sync { batch: Some(batch_id) } => {
            let outcome = sync_batch(db, batch_id).await?.ok_or_else(|| not_found("Batch", batch_id))?;
            Ok(format!(
                "Batch {}: amount {:?}, fee {:?}, {} transfers done",
                outcome.batch_id, outcome.amount_row, outcome.fee_row, outcome.totals.done_count
            ))
        }
        Command::Sync { batch: None } => {
            let outcomes = sync_all_batches(db).await?;
            Ok(format!("Synced {} batches", outcomes.len()))
        }
        Command::Summary { month } => {
            let month = month.unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());
            Ok(format_monthly_summary(&monthly_summary(db, &month).await?))
        }
        Command::Cashflow { from, to, group_by } => {
            Ok(format_cashflow(&cashflow(db, from, to, group_by).await?))
        }
        Command::Allocation {
            from,
            to,
            allocation_type,
        } => Ok(format_allocation(
            &allocation_summary(db, from, to, allocation_type).await?,
        )),
        Command::BatchReport { batch } => {
            let checklist = batch_checklist(db, batch).await?.ok_or_else(|| not_found("Batch", batch))?;
            info!(batch, items = checklist.items.len(), "Rendering checklist");
            Ok(format_batch_checklist(&checklist))
        }
        Command::Message { item } => item_message(db, item).await,
    }
}

async fn item_message(db: &DatabaseConnection, item_id: i64) -> Result<String> {
    let item = get_batch_item_by_id(db, item_id)
        .await?
        .ok_or_else(|| not_found("Batch item", item_id))?;
    let batch = get_batch_by_id(db, item.batch_id)
        .await?
        .ok_or_else(|| not_found("Batch", item.batch_id))?;
    let recipient = get_recipient_by_id(db, item.recipient_id)
        .await?
        .ok_or_else(|| not_found("Recipient", item.recipient_id))?;

    let details = AmountDetails::for_item(&batch, &item);
    let message = notification_message(&recipient.name, item.amount, Some(&details), None);
    let phone = recipient.whatsapp.as_deref().map(clean_phone).unwrap_or_default();
    Ok(format!("WhatsApp: {phone}\n\n{message}"))
}

fn not_found(what: &str, id: i64) -> Error {
    Error::Validation {
        message: format!("{what} {id} not found"),
    }
}
