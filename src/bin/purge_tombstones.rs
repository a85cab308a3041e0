//! Hard-deletes Apollo profiles that have been tombstoned longer than the retention period.

use anyhow::Context;
use quest_intel_api::db::Database;
use quest_intel_api::db_storage::PgEnrichmentStore;
use std::env;

const DEFAULT_RETENTION_DAYS: i64 = 180;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .context("DATABASE_URL must be set")?;

    let retention_days = match env::var("TOMBSTONE_RETENTION_DAYS") {
        Ok(value) => value
            .parse::<i64>()
            .ok()
            .filter(|days| *days >= 0)
            .context("TOMBSTONE_RETENTION_DAYS must be a non-negative number of days")?,
        Err(_) => DEFAULT_RETENTION_DAYS,
    };

    let db = Database::new(&database_url).await?;
    tracing::info!(
        "Connected to database. Purging profiles tombstoned more than {} days ago...",
        retention_days
    );

    let store = PgEnrichmentStore::new(db.pool);
    let purged = store.purge_tombstones(retention_days).await?;

    tracing::info!("Purge complete. Deleted {} tombstoned profiles.", purged);

    Ok(())
}
