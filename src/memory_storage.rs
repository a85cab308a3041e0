use crate::apollo_storage::EnrichmentStore;
use crate::errors::AppError;
use crate::models::{ApolloProfile, CompanyEnrichment, CompanyUpsert, NewProfile, StoreOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    /// Keyed by normalized name.
    companies: HashMap<String, CompanyEnrichment>,
    /// Keyed by company id, in insertion order.
    profiles: HashMap<Uuid, Vec<ApolloProfile>>,
}

/// In-process store used when no database is configured.
///
/// A single write lock covers each refresh, so refreshes are atomic and
/// serialized exactly like the Postgres transaction.
#[derive(Default)]
pub struct MemoryEnrichmentStore {
    tables: RwLock<Tables>,
}

impl MemoryEnrichmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnrichmentStore for MemoryEnrichmentStore {
    async fn find_company(
        &self,
        normalized_name: &str,
    ) -> Result<Option<CompanyEnrichment>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.companies.get(normalized_name).cloned())
    }

    async fn replace_company_data(
        &self,
        company: CompanyUpsert,
        profiles: Vec<NewProfile>,
    ) -> Result<StoreOutcome, AppError> {
        let mut tables = self.tables.write().await;
        let now = company.crawled_at;

        let stored = match tables.companies.get(&company.normalized_name) {
            Some(existing) => CompanyEnrichment {
                name: company.name,
                apollo_org_id: company.details.apollo_org_id.or(existing.apollo_org_id.clone()),
                linkedin_url: company.details.linkedin_url.or(existing.linkedin_url.clone()),
                domain: company.details.domain.or(existing.domain.clone()),
                industry: company.details.industry.or(existing.industry.clone()),
                estimated_employees: company
                    .details
                    .estimated_employees
                    .or(existing.estimated_employees),
                last_crawled_at: now,
                crawled_by: company.crawled_by,
                updated_at: now,
                ..existing.clone()
            },
            None => CompanyEnrichment {
                id: Uuid::new_v4(),
                name: company.name,
                normalized_name: company.normalized_name.clone(),
                apollo_org_id: company.details.apollo_org_id,
                linkedin_url: company.details.linkedin_url,
                domain: company.details.domain,
                industry: company.details.industry,
                estimated_employees: company.details.estimated_employees,
                profile_count: 0,
                last_crawled_at: now,
                crawled_by: company.crawled_by,
                created_at: now,
                updated_at: now,
            },
        };
        let company_id = stored.id;

        let rows = tables.profiles.entry(company_id).or_default();
        let mut tombstoned = 0;
        {
            let incoming: HashSet<&str> =
                profiles.iter().map(|p| p.profile_key.as_str()).collect();
            for row in rows.iter_mut() {
                if row.removed_at.is_none() && !incoming.contains(row.profile_key.as_str()) {
                    row.removed_at = Some(now);
                    row.updated_at = now;
                    tombstoned += 1;
                }
            }
        }

        let (mut inserted, mut updated) = (0, 0);
        for profile in profiles {
            match rows.iter_mut().find(|row| row.profile_key == profile.profile_key) {
                Some(row) => {
                    row.apollo_id = profile.apollo_id;
                    row.name = profile.name;
                    row.title = profile.title;
                    row.seniority = profile.seniority;
                    row.departments = profile.departments;
                    row.email = profile.email;
                    row.phone = profile.phone;
                    row.linkedin_url = profile.linkedin_url;
                    row.raw_payload = profile.raw_payload;
                    row.updated_at = now;
                    row.removed_at = None;
                    updated += 1;
                }
                None => {
                    rows.push(ApolloProfile {
                        id: Uuid::new_v4(),
                        company_id,
                        profile_key: profile.profile_key,
                        apollo_id: profile.apollo_id,
                        name: profile.name,
                        title: profile.title,
                        seniority: profile.seniority,
                        departments: profile.departments,
                        email: profile.email,
                        phone: profile.phone,
                        linkedin_url: profile.linkedin_url,
                        raw_payload: profile.raw_payload,
                        created_at: now,
                        updated_at: now,
                        removed_at: None,
                    });
                    inserted += 1;
                }
            }
        }

        let active = rows.iter().filter(|row| row.is_active()).count();
        let stored = CompanyEnrichment {
            profile_count: active as i64,
            ..stored
        };
        tables
            .companies
            .insert(stored.normalized_name.clone(), stored.clone());

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
        let tables = self.tables.read().await;
        let Some(company) = tables.companies.get(normalized_name) else {
            return Ok(Vec::new());
        };
        Ok(tables
            .profiles
            .get(&company.id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| include_removed || row.is_active())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_company(&self, normalized_name: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.companies.remove(normalized_name) {
            Some(company) => {
                tables.profiles.remove(&company.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn company_names(&self) -> Result<Vec<String>, AppError> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.companies.values().map(|c| c.name.clone()).collect();
        names.sort();
        Ok(names)
    }
}
