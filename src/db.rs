use sqlx::{postgres::PgPoolOptions, PgPool};

/// Tables owned by this service. Applied idempotently on startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS company_enrichments (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        normalized_name TEXT NOT NULL UNIQUE,
        apollo_org_id TEXT,
        linkedin_url TEXT,
        domain TEXT,
        industry TEXT,
        estimated_employees BIGINT,
        profile_count BIGINT NOT NULL DEFAULT 0,
        last_crawled_at TIMESTAMPTZ NOT NULL,
        crawled_by TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS apollo_profiles (
        id UUID PRIMARY KEY,
        company_id UUID NOT NULL REFERENCES company_enrichments(id) ON DELETE CASCADE,
        profile_key TEXT NOT NULL,
        apollo_id TEXT,
        name TEXT NOT NULL,
        title TEXT,
        seniority TEXT,
        departments TEXT[] NOT NULL DEFAULT '{}',
        email TEXT,
        phone TEXT,
        linkedin_url TEXT,
        raw_payload JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        removed_at TIMESTAMPTZ,
        UNIQUE (company_id, profile_key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS apollo_profiles_active_idx ON apollo_profiles (company_id) WHERE removed_at IS NULL",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the enrichment tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Enrichment schema verified");
        Ok(())
    }
}
