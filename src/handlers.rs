use crate::apollo_storage::ApolloStorageService;
use crate::company_search::CompanySearchService;
use crate::config::Config;
use crate::errors::AppError;
use crate::intelligence::UnifiedIntelligenceService;
use crate::models::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const KNOWN_NAMES_KEY: &str = "known_company_names";
const DEFAULT_ACTOR: &str = "admin-api";

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    pub storage: Arc<ApolloStorageService>,
    pub intelligence: Arc<UnifiedIntelligenceService>,
    pub search: CompanySearchService,
    /// Stored company display names used for search suggestions (5 minute TTL).
    pub known_names_cache: Cache<String, Arc<Vec<String>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        storage: Arc<ApolloStorageService>,
        intelligence: Arc<UnifiedIntelligenceService>,
    ) -> Self {
        let known_names_cache = Cache::builder()
            .time_to_live(Duration::from_secs(300))
            .max_capacity(1)
            .build();

        Self {
            config,
            storage,
            intelligence,
            search: CompanySearchService::new(),
            known_names_cache,
        }
    }

    async fn known_company_names(&self) -> Result<Arc<Vec<String>>, AppError> {
        if let Some(names) = self.known_names_cache.get(KNOWN_NAMES_KEY).await {
            tracing::debug!("Known company names cache HIT ({} names)", names.len());
            return Ok(names);
        }

        let names = Arc::new(self.storage.known_company_names().await?);
        self.known_names_cache
            .insert(KNOWN_NAMES_KEY.to_string(), names.clone())
            .await;
        Ok(names)
    }

    async fn forget_known_names(&self) {
        self.known_names_cache.invalidate(KNOWN_NAMES_KEY).await;
    }
}

fn require_company_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("companyName is required".to_string()));
    }
    Ok(name)
}

fn actor_or_default(actor: Option<&str>) -> &str {
    actor
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
}

/// Admin routes plus `/health`. Transport layers are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/admin/company-intelligence",
            post(get_company_intelligence),
        )
        .route("/api/admin/company-search", post(search_company))
        .route(
            "/api/admin/company-enrichment",
            delete(delete_company_enrichment),
        )
        .route(
            "/api/admin/company-enrichment/status",
            get(get_enrichment_status),
        )
        .route(
            "/api/admin/company-enrichment/refresh",
            post(refresh_company_enrichment),
        )
        .route(
            "/api/admin/company-enrichment/profiles",
            get(get_company_profiles),
        )
        .with_state(state)
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let storage = match state.config.database_url {
        Some(_) => "postgres",
        None => "memory",
    };
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "quest-intel-api",
            "version": env!("CARGO_PKG_VERSION"),
            "storage": storage,
            "apolloConfigured": state.config.apollo_api_key.is_some(),
        })),
    )
}

/// POST /api/admin/company-intelligence
///
/// Builds the merged intelligence view, refreshing Apollo data when it is
/// missing, stale, older than `maxAge` or `forceRefresh` is set.
///
/// # Arguments
///
/// * `state` - Application state holding the intelligence service.
/// * `request` - `companyName`, optional `options` and `actor`.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `{success, data}`; 400 for a blank name.
pub async fn get_company_intelligence(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompanyIntelligenceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let company_name = require_company_name(&request.company_name)?;
    tracing::info!(
        "POST /company-intelligence - company: {}, options: {:?}",
        company_name,
        request.options
    );

    let actor = actor_or_default(request.actor.as_deref());
    let intelligence = state
        .intelligence
        .get_company_intelligence(company_name, &request.options, actor)
        .await?;

    if intelligence
        .sources
        .iter()
        .any(|s| s.status == SourceStatus::Fetched && s.source == SourceKind::Apollo)
    {
        state.forget_known_names().await;
    }

    Ok(Json(json!({
        "success": true,
        "data": intelligence,
    })))
}

/// POST /api/admin/company-search
///
/// Normalizes the query, detects intent and suggests matching known companies.
///
/// # Arguments
///
/// * `state` - Application state; stored company names are merged into `knownNames`.
/// * `request` - `query` plus optional caller-supplied `knownNames`.
pub async fn search_company(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompanySearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("query is required".to_string()));
    }
    tracing::info!("POST /company-search - query: {}", request.query);

    let stored = state.known_company_names().await?;
    let mut known_names: Vec<String> = request.known_names;
    known_names.extend(stored.iter().cloned());

    let result = state.search.search_company(&request.query, &known_names);

    Ok(Json(json!({
        "success": true,
        "normalizedName": result.normalized_name,
        "suggestions": result.suggestions,
        "intent": result.intent,
    })))
}

/// GET /api/admin/company-enrichment/status?companyName=
pub async fn get_enrichment_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompanyNameQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let company_name = require_company_name(&params.company_name)?;
    let status = state
        .storage
        .get_company_enrichment_status(company_name)
        .await?;

    Ok(Json(json!({
        "success": true,
        "companyName": company_name,
        "status": status,
    })))
}

/// POST /api/admin/company-enrichment/refresh
///
/// Unconditional Apollo refresh. 502 without an Apollo key, 409 when a
/// refresh of the same company is already running.
pub async fn refresh_company_enrichment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let company_name = require_company_name(&request.company_name)?;
    let actor = actor_or_default(request.actor.as_deref());
    tracing::info!("POST /company-enrichment/refresh - company: {}", company_name);

    let outcome = state.intelligence.refresh_apollo(company_name, actor).await?;
    state.forget_known_names().await;

    Ok(Json(json!({
        "success": true,
        "outcome": outcome,
    })))
}

/// GET /api/admin/company-enrichment/profiles?companyName=&includeRemoved=
pub async fn get_company_profiles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompanyNameQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let company_name = require_company_name(&params.company_name)?;
    if state.storage.get_company(company_name).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "No enrichment stored for '{}'",
            company_name
        )));
    }

    let profiles = state
        .storage
        .get_company_profiles(company_name, params.include_removed)
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": profiles.len(),
        "profiles": profiles,
    })))
}

/// DELETE /api/admin/company-enrichment?companyName=
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `{success, deleted}`, or 404 when nothing was stored.
pub async fn delete_company_enrichment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompanyNameQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let company_name = require_company_name(&params.company_name)?;
    let deleted = state.storage.delete_company(company_name).await?;
    if !deleted {
        return Err(AppError::NotFound(format!(
            "No enrichment stored for '{}'",
            company_name
        )));
    }
    state.forget_known_names().await;

    Ok(Json(json!({
        "success": true,
        "deleted": true,
    })))
}
