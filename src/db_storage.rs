use crate::apollo_storage::EnrichmentStore;
use crate::errors::{AppError, ResultExt};
use crate::models::{ApolloProfile, CompanyEnrichment, CompanyUpsert, NewProfile, StoreOutcome};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed enrichment storage (`company_enrichments`, `apollo_profiles`).
pub struct PgEnrichmentStore {
    pool: PgPool,
}

impl PgEnrichmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hard-deletes profiles tombstoned more than `retention_days` ago.
    pub async fn purge_tombstones(&self, retention_days: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM apollo_profiles
            WHERE removed_at IS NOT NULL
              AND removed_at < now() - make_interval(days => $1::int)
            "#,
        )
        .bind(retention_days)
        .execute(&self.pool)
        .await
        .context("purging tombstoned profiles")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EnrichmentStore for PgEnrichmentStore {
    async fn find_company(
        &self,
        normalized_name: &str,
    ) -> Result<Option<CompanyEnrichment>, AppError> {
        let company = sqlx::query_as::<_, CompanyEnrichment>(
            "SELECT * FROM company_enrichments WHERE normalized_name = $1",
        )
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company)
    }

    /// Runs the whole refresh in one transaction.
    ///
    /// The company upsert locks its row until commit, so concurrent refreshes
    /// of the same company are serialized and the last commit wins.
    async fn replace_company_data(
        &self,
        company: CompanyUpsert,
        profiles: Vec<NewProfile>,
    ) -> Result<StoreOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        let now = company.crawled_at;

        // Step 1: Upsert company row, keeping known identifiers when the new payload lacks them
        let (company_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO company_enrichments (
                id, name, normalized_name, apollo_org_id, linkedin_url, domain,
                industry, estimated_employees, profile_count, last_crawled_at,
                crawled_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $9, $9)
            ON CONFLICT (normalized_name) DO UPDATE
            SET name = EXCLUDED.name,
                apollo_org_id = COALESCE(EXCLUDED.apollo_org_id, company_enrichments.apollo_org_id),
                linkedin_url = COALESCE(EXCLUDED.linkedin_url, company_enrichments.linkedin_url),
                domain = COALESCE(EXCLUDED.domain, company_enrichments.domain),
                industry = COALESCE(EXCLUDED.industry, company_enrichments.industry),
                estimated_employees = COALESCE(EXCLUDED.estimated_employees, company_enrichments.estimated_employees),
                last_crawled_at = EXCLUDED.last_crawled_at,
                crawled_by = EXCLUDED.crawled_by,
                updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&company.name)
        .bind(&company.normalized_name)
        .bind(&company.details.apollo_org_id)
        .bind(&company.details.linkedin_url)
        .bind(&company.details.domain)
        .bind(&company.details.industry)
        .bind(company.details.estimated_employees)
        .bind(now)
        .bind(&company.crawled_by)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("upserting company '{}'", company.normalized_name))?;

        // Step 2: Tombstone active profiles that the new payload no longer contains
        let keys: Vec<String> = profiles.iter().map(|p| p.profile_key.clone()).collect();
        let tombstoned = sqlx::query(
            r#"
            UPDATE apollo_profiles
            SET removed_at = $2, updated_at = $2
            WHERE company_id = $1
              AND removed_at IS NULL
              AND NOT (profile_key = ANY($3))
            "#,
        )
        .bind(company_id)
        .bind(now)
        .bind(&keys)
        .execute(&mut *tx)
        .await
        .context("tombstoning removed profiles")?
        .rows_affected() as usize;

        // Step 3: Upsert every incoming profile by natural key
        let (mut inserted, mut updated) = (0, 0);
        for profile in &profiles {
            let (was_inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO apollo_profiles (
                    id, company_id, profile_key, apollo_id, name, title, seniority,
                    departments, email, phone, linkedin_url, raw_payload,
                    created_at, updated_at, removed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13, NULL)
                ON CONFLICT (company_id, profile_key) DO UPDATE
                SET apollo_id = EXCLUDED.apollo_id,
                    name = EXCLUDED.name,
                    title = EXCLUDED.title,
                    seniority = EXCLUDED.seniority,
                    departments = EXCLUDED.departments,
                    email = EXCLUDED.email,
                    phone = EXCLUDED.phone,
                    linkedin_url = EXCLUDED.linkedin_url,
                    raw_payload = EXCLUDED.raw_payload,
                    updated_at = EXCLUDED.updated_at,
                    removed_at = NULL
                RETURNING (xmax = 0)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(company_id)
            .bind(&profile.profile_key)
            .bind(&profile.apollo_id)
            .bind(&profile.name)
            .bind(&profile.title)
            .bind(&profile.seniority)
            .bind(&profile.departments)
            .bind(&profile.email)
            .bind(&profile.phone)
            .bind(&profile.linkedin_url)
            .bind(&profile.raw_payload)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("upserting profile '{}'", profile.profile_key))?;

            if was_inserted {
                inserted += 1;
            } else {
                updated += 1;
            }
        }

        // Step 4: Record the active profile count on the company row
        let stored = sqlx::query_as::<_, CompanyEnrichment>(
            r#"
            UPDATE company_enrichments
            SET profile_count = (
                SELECT COUNT(*) FROM apollo_profiles
                WHERE company_id = $1 AND removed_at IS NULL
            )
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await
        .context("updating profile count")?;

        tx.commit().await?;

        Ok(StoreOutcome {
            company: stored,
            inserted,
            updated,
            tombstoned,
        })
    }

    async fn company_profiles(
        &self,
        normalized_name: &str,
        include_removed: bool,
    ) -> Result<Vec<ApolloProfile>, AppError> {
        let profiles = sqlx::query_as::<_, ApolloProfile>(
            r#"
            SELECT p.*
            FROM apollo_profiles p
            JOIN company_enrichments c ON c.id = p.company_id
            WHERE c.normalized_name = $1
              AND ($2 OR p.removed_at IS NULL)
            ORDER BY p.created_at ASC, p.name ASC
            "#,
        )
        .bind(normalized_name)
        .bind(include_removed)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn delete_company(&self, normalized_name: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM company_enrichments WHERE normalized_name = $1")
            .bind(normalized_name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn company_names(&self) -> Result<Vec<String>, AppError> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM company_enrichments ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(names.into_iter().map(|(name,)| name).collect())
    }
}
