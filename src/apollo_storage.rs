//! Freshness gate and persistence for Apollo company enrichment.

use crate::company_search::normalize_company_name;
use crate::errors::AppError;
use crate::models::{
    ApolloProfile, CompanyEnrichment, CompanyUpsert, EnrichmentPayload, EnrichmentStatus,
    NewProfile, StoreOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Enrichment older than this many days is stale. Not configurable per caller.
pub const STALE_AFTER_DAYS: i64 = 30;

/// Persistence for companies and their profiles.
///
/// `replace_company_data` must be atomic: readers never observe a company
/// whose profiles are half-refreshed.
#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    async fn find_company(&self, normalized_name: &str)
        -> Result<Option<CompanyEnrichment>, AppError>;

    /// Upserts the company row and reconciles its profiles by `profile_key`.
    ///
    /// Profiles present in `profiles` are inserted or updated (and revived if
    /// tombstoned); active profiles missing from it are tombstoned.
    async fn replace_company_data(
        &self,
        company: CompanyUpsert,
        profiles: Vec<NewProfile>,
    ) -> Result<StoreOutcome, AppError>;

    async fn company_profiles(
        &self,
        normalized_name: &str,
        include_removed: bool,
    ) -> Result<Vec<ApolloProfile>, AppError>;

    /// Deletes the company and all of its profiles. Returns whether a row existed.
    async fn delete_company(&self, normalized_name: &str) -> Result<bool, AppError>;

    async fn company_names(&self) -> Result<Vec<String>, AppError>;
}

impl EnrichmentStatus {
    /// Status of an optional stored row as seen at `now`.
    pub fn evaluate(company: Option<&CompanyEnrichment>, now: DateTime<Utc>) -> Self {
        match company {
            None => Self {
                exists: false,
                is_stale: true,
                days_since_crawl: None,
                profile_count: 0,
                last_crawled_at: None,
            },
            Some(company) => {
                let days = (now - company.last_crawled_at).num_days().max(0);
                Self {
                    exists: true,
                    is_stale: days > STALE_AFTER_DAYS,
                    days_since_crawl: Some(days),
                    profile_count: company.profile_count,
                    last_crawled_at: Some(company.last_crawled_at),
                }
            }
        }
    }
}

/// Drops repeated profile keys, keeping the last occurrence at the position
/// of the first.
pub fn dedupe_profiles(profiles: Vec<NewProfile>) -> Vec<NewProfile> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<NewProfile> = Vec::with_capacity(profiles.len());
    for profile in profiles {
        match positions.get(&profile.profile_key) {
            Some(&idx) => unique[idx] = profile,
            None => {
                positions.insert(profile.profile_key.clone(), unique.len());
                unique.push(profile);
            }
        }
    }
    unique
}

/// Cache-status checks and write-back for company enrichment.
pub struct ApolloStorageService {
    store: Arc<dyn EnrichmentStore>,
}

impl ApolloStorageService {
    pub fn new(store: Arc<dyn EnrichmentStore>) -> Self {
        Self { store }
    }

    fn key_for(name: &str) -> Result<String, AppError> {
        let normalized = normalize_company_name(name);
        if normalized.is_empty() {
            return Err(AppError::BadRequest(
                "companyName must contain at least one letter or digit".to_string(),
            ));
        }
        Ok(normalized)
    }

    /// Look up the stored company row.
    ///
    /// # Arguments
    ///
    /// * `name` - Company name in any casing or suffix form; normalized before lookup.
    ///
    /// # Returns
    ///
    /// * `Result<Option<CompanyEnrichment>, AppError>` - `None` when nothing is stored,
    ///   `BadRequest` when the name normalizes to nothing.
    pub async fn get_company(&self, name: &str) -> Result<Option<CompanyEnrichment>, AppError> {
        let normalized = Self::key_for(name)?;
        self.store.find_company(&normalized).await
    }

    /// Freshness of the stored data for `name` (stale after 30 days).
    ///
    /// # Arguments
    ///
    /// * `name` - Company name; normalized before lookup.
    pub async fn get_company_enrichment_status(
        &self,
        name: &str,
    ) -> Result<EnrichmentStatus, AppError> {
        let company = self.get_company(name).await?;
        let status = EnrichmentStatus::evaluate(company.as_ref(), Utc::now());

        tracing::debug!(
            "Enrichment status for '{}': exists={}, stale={}, days={:?}, profiles={}",
            name,
            status.exists,
            status.is_stale,
            status.days_since_crawl,
            status.profile_count
        );
        Ok(status)
    }

    /// Writes one refresh of `name`: company upsert plus profile reconciliation.
    ///
    /// # Arguments
    ///
    /// * `name` - Company display name; its normalized form is the storage key.
    /// * `payload` - Company details and profiles from the refresh.
    /// * `actor` - Stored as `crawled_by`.
    ///
    /// # Returns
    ///
    /// * `Result<StoreOutcome, AppError>` - The updated company row with insert,
    ///   update and tombstone counts.
    pub async fn store_enrichment_data(
        &self,
        name: &str,
        payload: EnrichmentPayload,
        actor: &str,
    ) -> Result<StoreOutcome, AppError> {
        let normalized_name = Self::key_for(name)?;
        let profiles = dedupe_profiles(payload.profiles);

        let upsert = CompanyUpsert {
            name: name.trim().to_string(),
            normalized_name,
            details: payload.company,
            crawled_at: Utc::now(),
            crawled_by: actor.to_string(),
        };

        let outcome = self.store.replace_company_data(upsert, profiles).await?;

        tracing::info!(
            "✓ Stored enrichment for '{}' (company_id: {}, inserted: {}, updated: {}, tombstoned: {}, active: {})",
            outcome.company.name,
            outcome.company.id,
            outcome.inserted,
            outcome.updated,
            outcome.tombstoned,
            outcome.company.profile_count
        );
        Ok(outcome)
    }

    /// Active profiles of `name`, plus tombstoned ones when `include_removed`.
    pub async fn get_company_profiles(
        &self,
        name: &str,
        include_removed: bool,
    ) -> Result<Vec<ApolloProfile>, AppError> {
        let normalized = Self::key_for(name)?;
        self.store
            .company_profiles(&normalized, include_removed)
            .await
    }

    /// Delete the company and all of its profiles.
    ///
    /// # Arguments
    ///
    /// * `name` - Company name; normalized before lookup.
    ///
    /// # Returns
    ///
    /// * `Result<bool, AppError>` - Whether a company row existed.
    pub async fn delete_company(&self, name: &str) -> Result<bool, AppError> {
        let normalized = Self::key_for(name)?;
        let deleted = self.store.delete_company(&normalized).await?;
        if deleted {
            tracing::warn!("Deleted company enrichment for '{}'", normalized);
        }
        Ok(deleted)
    }

    /// Display names of every stored company.
    pub async fn known_company_names(&self) -> Result<Vec<String>, AppError> {
        self.store.company_names().await
    }
}
