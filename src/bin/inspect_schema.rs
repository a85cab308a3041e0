//! Utility to print the structure of the enrichment tables.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::env;

const TABLES: [&str; 2] = ["company_enrichments", "apollo_profiles"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new().connect(&database_url).await?;

    for table in TABLES {
        let columns: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position"
        )
        .bind(table)
        .fetch_all(&pool)
        .await?;

        if columns.is_empty() {
            println!("{}: missing (start the API once to create it)", table);
            continue;
        }

        println!("{}:", table);
        for (column, data_type, nullable) in columns {
            let null = if nullable == "YES" { "" } else { " not null" };
            println!("  - {}: {}{}", column, data_type, null);
        }
        println!();
    }

    Ok(())
}
