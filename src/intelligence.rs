//! Unified company intelligence: per-source cache checks, refresh, merge and scoring.

use crate::apollo_storage::ApolloStorageService;
use crate::classification::Seniority;
use crate::company_search::normalize_company_name;
use crate::errors::AppError;
use crate::models::*;
use crate::scoring::{self, IntelligenceSignals};
use crate::services::{ApolloService, CompanyProfileProvider, WebSearchProvider};
use chrono::Utc;
use moka::future::Cache;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

impl ApolloIntelligence {
    /// Builds the Apollo view from a stored company and its active profiles.
    pub fn from_profiles(company: CompanyEnrichment, employees: Vec<ApolloProfile>) -> Self {
        let mut departments: BTreeMap<String, usize> = BTreeMap::new();
        let mut seniority_levels: BTreeMap<String, usize> = BTreeMap::new();

        for employee in &employees {
            for department in &employee.departments {
                *departments.entry(department.clone()).or_default() += 1;
            }
            let level = employee
                .seniority
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            *seniority_levels.entry(level).or_default() += 1;
        }

        let decision_makers = employees
            .iter()
            .filter(|e| {
                e.seniority
                    .as_deref()
                    .and_then(Seniority::parse)
                    .is_some_and(|s| s.is_decision_maker())
            })
            .cloned()
            .collect();

        Self {
            last_updated: company.last_crawled_at,
            company,
            employees,
            decision_makers,
            departments,
            seniority_levels,
        }
    }
}

type SourceResult<T> = (Option<T>, IntelligenceSource);

fn source_summary(source: SourceKind, status: SourceStatus) -> IntelligenceSource {
    IntelligenceSource {
        source,
        status,
        is_stale: false,
        days_since_crawl: None,
        cost: 0,
        item_count: 0,
        error: None,
    }
}

/// Failure summary carrying only the client-facing message of `error`.
fn failed_source(source: SourceKind, error: &AppError) -> IntelligenceSource {
    let (_, message) = error.status_and_message();
    IntelligenceSource {
        error: Some(message),
        ..source_summary(source, SourceStatus::Failed)
    }
}

/// In-flight marker for one company's Apollo refresh.
///
/// Dropping the guard releases the marker, so a cancelled request (timeout,
/// client disconnect) cannot block refreshes until the TTL expires.
struct RefreshGuard {
    cache: Cache<String, i64>,
    key: Option<String>,
}

impl RefreshGuard {
    async fn release(mut self) {
        if let Some(key) = self.key.take() {
            self.cache.invalidate(&key).await;
        }
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let cache = self.cache.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Apollo refresh for '{}' abandoned, releasing marker", key);
                handle.spawn(async move {
                    cache.invalidate(&key).await;
                });
            }
            Err(_) => tracing::warn!("No runtime to release refresh marker for '{}'", key),
        }
    }
}

/// Orchestrates Apollo, web and company-profile sources for one company.
pub struct UnifiedIntelligenceService {
    storage: Arc<ApolloStorageService>,
    apollo: Option<Arc<ApolloService>>,
    web: Arc<dyn WebSearchProvider>,
    profile: Arc<dyn CompanyProfileProvider>,
    /// Companies with an Apollo refresh running in this process.
    /// Key: normalized name, Value: refresh start (unix seconds).
    refreshes_in_flight: Cache<String, i64>,
}

impl UnifiedIntelligenceService {
    pub fn new(
        storage: Arc<ApolloStorageService>,
        apollo: Option<Arc<ApolloService>>,
        web: Arc<dyn WebSearchProvider>,
        profile: Arc<dyn CompanyProfileProvider>,
    ) -> Self {
        // 5 minute TTL outlives any refresh; guards are also removed when a refresh ends
        let refreshes_in_flight = Cache::builder()
            .time_to_live(Duration::from_secs(300))
            .max_capacity(10_000)
            .build();

        Self {
            storage,
            apollo,
            web,
            profile,
            refreshes_in_flight,
        }
    }

    pub fn storage(&self) -> &Arc<ApolloStorageService> {
        &self.storage
    }

    /// Merged intelligence for `name`.
    ///
    /// Requested sources run concurrently. A failing source is logged and its
    /// field omitted; the per-source summary records the failure.
    pub async fn get_company_intelligence(
        &self,
        name: &str,
        options: &IntelligenceOptions,
        actor: &str,
    ) -> Result<CompanyIntelligence, AppError> {
        let normalized_name = normalize_company_name(name);
        if normalized_name.is_empty() {
            return Err(AppError::BadRequest(
                "companyName must contain at least one letter or digit".to_string(),
            ));
        }

        let requested = options.requested_sources();
        let wants = |kind: SourceKind| requested.contains(&kind);

        tracing::info!(
            "Building intelligence for '{}' (sources: {:?}, force_refresh: {})",
            name,
            requested,
            options.force_refresh
        );

        let (apollo, web, profile) = tokio::join!(
            async {
                if wants(SourceKind::Apollo) {
                    Some(self.apollo_source(name, options, actor).await)
                } else {
                    None
                }
            },
            async {
                if wants(SourceKind::Web) {
                    Some(self.web_source(name).await)
                } else {
                    None
                }
            },
            async {
                if wants(SourceKind::Profile) {
                    Some(self.profile_source(name).await)
                } else {
                    None
                }
            },
        );

        let mut sources = Vec::with_capacity(requested.len());
        let apollo = apollo.and_then(|(data, summary)| {
            sources.push(summary);
            data
        });
        let web = web.and_then(|(data, summary)| {
            sources.push(summary);
            data
        });
        let profile = profile.and_then(|(data, summary)| {
            sources.push(summary);
            data
        });

        let signals =
            IntelligenceSignals::collect(apollo.as_ref(), web.as_ref(), profile.as_ref(), &sources);
        let enrichment_score = scoring::enrichment_score(&signals);

        tracing::info!(
            "✓ Intelligence for '{}': score {}, sources {:?}",
            name,
            enrichment_score,
            sources
                .iter()
                .map(|s| (s.source.as_str(), s.status))
                .collect::<Vec<_>>()
        );

        Ok(CompanyIntelligence {
            company_name: name.trim().to_string(),
            normalized_name,
            apollo,
            web,
            profile,
            sources,
            enrichment_score,
            insights: scoring::insights(&signals),
            recommendations: scoring::recommendations(&signals),
            generated_at: Utc::now(),
        })
    }

    /// Forces an Apollo refresh of `name` and writes it back.
    ///
    /// # Arguments
    ///
    /// * `name` - Company name as typed by the caller.
    /// * `actor` - Recorded as `crawled_by`.
    ///
    /// # Returns
    ///
    /// * `Result<StoreOutcome, AppError>` - Counts of inserted, updated and
    ///   tombstoned profiles; `ExternalApiError` without an Apollo key,
    ///   `Conflict` while another refresh of the same company runs.
    pub async fn refresh_apollo(&self, name: &str, actor: &str) -> Result<StoreOutcome, AppError> {
        let apollo = self.apollo.as_ref().ok_or_else(|| {
            AppError::ExternalApiError("Apollo API key is not configured".to_string())
        })?;
        match self.guarded_refresh(apollo, name, actor).await? {
            Some((outcome, _pages)) => Ok(outcome),
            None => Err(AppError::Conflict(format!(
                "A refresh of '{}' is already in progress",
                name.trim()
            ))),
        }
    }

    /// Runs one Apollo refresh unless another is in flight for the same company.
    ///
    /// Returns `None` when another refresh holds the guard.
    async fn guarded_refresh(
        &self,
        apollo: &ApolloService,
        name: &str,
        actor: &str,
    ) -> Result<Option<(StoreOutcome, u32)>, AppError> {
        let key = normalize_company_name(name);
        let entry = self
            .refreshes_in_flight
            .entry(key.clone())
            .or_insert(Utc::now().timestamp())
            .await;
        if !entry.is_fresh() {
            tracing::info!("Apollo refresh for '{}' already in flight, skipping", key);
            return Ok(None);
        }
        let guard = RefreshGuard {
            cache: self.refreshes_in_flight.clone(),
            key: Some(key),
        };

        let result = async {
            let fetch = apollo.search_people(name).await?;
            let pages = fetch.pages_fetched;
            let outcome = self
                .storage
                .store_enrichment_data(name, fetch.into_payload(), actor)
                .await?;
            Ok::<_, AppError>((outcome, pages))
        }
        .await;

        guard.release().await;
        result.map(Some)
    }

    async fn apollo_source(
        &self,
        name: &str,
        options: &IntelligenceOptions,
        actor: &str,
    ) -> SourceResult<ApolloIntelligence> {
        match self.load_apollo(name, options, actor).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Apollo source failed for '{}': {}", name, e);
                (None, failed_source(SourceKind::Apollo, &e))
            }
        }
    }

    async fn load_apollo(
        &self,
        name: &str,
        options: &IntelligenceOptions,
        actor: &str,
    ) -> Result<SourceResult<ApolloIntelligence>, AppError> {
        let company = self.storage.get_company(name).await?;
        let status = EnrichmentStatus::evaluate(company.as_ref(), Utc::now());

        let exceeds_max_age = matches!(
            (options.max_age_days, status.days_since_crawl),
            (Some(max_age), Some(days)) if days > max_age
        );
        let needs_refresh = options.force_refresh || status.is_stale || exceeds_max_age;

        if needs_refresh {
            match self.apollo.as_deref() {
                Some(apollo) => {
                    if let Some((outcome, pages)) = self.guarded_refresh(apollo, name, actor).await? {
                        let profiles = self.storage.get_company_profiles(name, false).await?;
                        let intelligence = ApolloIntelligence::from_profiles(outcome.company, profiles);
                        let summary = IntelligenceSource {
                            days_since_crawl: Some(0),
                            cost: pages,
                            item_count: intelligence.employees.len(),
                            ..source_summary(SourceKind::Apollo, SourceStatus::Fetched)
                        };
                        return Ok((Some(intelligence), summary));
                    }
                    if company.is_none() {
                        return Ok((None, source_summary(SourceKind::Apollo, SourceStatus::Skipped)));
                    }
                }
                None => {
                    tracing::debug!("Apollo not configured, serving cached rows for '{}'", name);
                    if company.is_none() {
                        return Ok((
                            None,
                            source_summary(SourceKind::Apollo, SourceStatus::NotConfigured),
                        ));
                    }
                }
            }
        }

        let Some(company) = company else {
            return Ok((None, source_summary(SourceKind::Apollo, SourceStatus::Skipped)));
        };
        let profiles = self.storage.get_company_profiles(name, false).await?;
        let intelligence = ApolloIntelligence::from_profiles(company, profiles);
        let summary = IntelligenceSource {
            is_stale: status.is_stale,
            days_since_crawl: status.days_since_crawl,
            item_count: intelligence.employees.len(),
            ..source_summary(SourceKind::Apollo, SourceStatus::Cached)
        };
        Ok((Some(intelligence), summary))
    }

    async fn web_source(&self, name: &str) -> SourceResult<WebIntelligence> {
        if !self.web.is_configured() {
            return (
                Some(WebIntelligence::default()),
                source_summary(SourceKind::Web, SourceStatus::NotConfigured),
            );
        }
        match self.web.search_company(name).await {
            Ok(web) => {
                let summary = IntelligenceSource {
                    cost: 1,
                    item_count: web.mentions.len(),
                    ..source_summary(SourceKind::Web, SourceStatus::Fetched)
                };
                (Some(web), summary)
            }
            Err(e) => {
                tracing::warn!("Web source failed for '{}': {}", name, e);
                (None, failed_source(SourceKind::Web, &e))
            }
        }
    }

    async fn profile_source(&self, name: &str) -> SourceResult<CompanyProfileIntelligence> {
        if !self.profile.is_configured() {
            return (
                Some(CompanyProfileIntelligence::default()),
                source_summary(SourceKind::Profile, SourceStatus::NotConfigured),
            );
        }
        match self.profile.fetch_profile(name).await {
            Ok(profile) => {
                let summary = IntelligenceSource {
                    cost: 1,
                    item_count: profile.field_count(),
                    ..source_summary(SourceKind::Profile, SourceStatus::Fetched)
                };
                (Some(profile), summary)
            }
            Err(e) => {
                tracing::warn!("Company profile source failed for '{}': {}", name, e);
                (None, failed_source(SourceKind::Profile, &e))
            }
        }
    }
}
