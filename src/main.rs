use expense_buddy::{
    config::{self, database},
    core::aggregation::{ExpenseFilter, aggregate},
    errors::Result,
    models::{InvoiceStatus, format_usd},
    store::{RecordStore, SeaOrmStore, SortDirection},
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = config::load_app_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!(
        "Reports are labelled '{}' and written to {}",
        app_config.report.label,
        app_config.report.output_dir.display()
    );

    // 4. Open the database and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;
    let store = SeaOrmStore::new(db).await?;

    // 5. Follow the expenses collection until Ctrl-C
    let mut subscription = store.subscribe_expenses(SortDirection::Descending).await?;
    let filter = ExpenseFilter::default();
    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(records) = snapshot else {
                    info!("Expense store closed");
                    break;
                };
                let grouped = aggregate(&records, &filter);
                info!(
                    "{} open expenses, total {} (with receipt {}, without receipt {})",
                    grouped.record_count(),
                    format_usd(grouped.total),
                    format_usd(grouped.subtotal(InvoiceStatus::WithReceipt)),
                    format_usd(grouped.subtotal(InvoiceStatus::WithoutReceipt)),
                );
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Shutting down");
                break;
            }
        }
    }
    subscription.unsubscribe();

    Ok(())
}
