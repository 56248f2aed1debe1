use anyhow::{bail, Context};
use chrono::Utc;
use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use pledgeflow::config::Config;
use pledgeflow::jobs::expire_pledges;
use pledgeflow::store::{self, CampaignStore, SqlStore};
use std::env;
use tokio::time::interval;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

async fn run_sweep(store: &dyn CampaignStore) {
    match expire_pledges(store, Utc::now()).await {
        Ok(report) => info!(
            expired = report.expired_count,
            pledges_cancelled = report.pledges_cancelled,
            "expiration sweep finished"
        ),
        Err(e) => error!(%e, "expiration sweep failed"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing (INFO level)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load .env (if present) so DATABASE_URL from file is visible
    let _ = dotenv();

    // Command‑line flags
    let args: Vec<String> = env::args().collect();
    let run_once = args.iter().any(|a| a == "--expire-once");
    let migrate = args.iter().any(|a| a == "--migrate");

    let config = Config::from_env().context("invalid configuration")?;
    config.log_summary();

    if migrate {
        let Some(url) = config.database_url.as_deref() else {
            bail!("--migrate needs DATABASE_URL");
        };
        let sql = SqlStore::connect(url).await?;
        Migrator::up(sql.connection(), None).await.context("migration failed")?;
        info!("Migrations applied.");
        return Ok(());
    }

    let Some(store) = store::connect(&config).await? else {
        bail!("no database configured (set DATABASE_URL or SUPABASE_URL + SUPABASE_SERVICE_KEY)");
    };

    if run_once {
        run_sweep(store.as_ref()).await;
        return Ok(());
    }

    info!("Worker starting; sweeping every {}s", config.sweep_interval.as_secs());

    let mut ticker = interval(config.sweep_interval);
    loop {
        ticker.tick().await;
        info!("Running expiration sweep...");
        run_sweep(store.as_ref()).await;
    }
}
