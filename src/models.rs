use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

// ============ Database Models ============

/// One enriched company. At most one row per `normalized_name`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyEnrichment {
    pub id: Uuid,
    /// Display name as last supplied by a caller.
    pub name: String,
    /// Upsert key, see `company_search::normalize_company_name`.
    pub normalized_name: String,
    pub apollo_org_id: Option<String>,
    pub linkedin_url: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    /// Organisation headcount as reported by Apollo.
    pub estimated_employees: Option<i64>,
    /// Active (non-tombstoned) profiles after the last refresh.
    pub profile_count: i64,
    pub last_crawled_at: DateTime<Utc>,
    pub crawled_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One employee record belonging to a `CompanyEnrichment`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApolloProfile {
    pub id: Uuid,
    pub company_id: Uuid,
    /// Natural key within the company, see [`profile_key`].
    pub profile_key: String,
    pub apollo_id: Option<String>,
    pub name: String,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub departments: Vec<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when a refresh no longer returned this profile.
    pub removed_at: Option<DateTime<Utc>>,
}

impl ApolloProfile {
    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }
}

// ============ Write Models ============

/// Company-level attributes coming from an enrichment source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub apollo_org_id: Option<String>,
    pub linkedin_url: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub estimated_employees: Option<i64>,
}

/// A profile ready to be written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub profile_key: String,
    pub apollo_id: Option<String>,
    pub name: String,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub departments: Vec<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub raw_payload: serde_json::Value,
}

impl NewProfile {
    /// Builds a profile with only a name and title; the key is derived from them.
    pub fn named(name: impl Into<String>, title: Option<&str>) -> Self {
        let name = name.into();
        Self {
            profile_key: profile_key(None, None, &name, title),
            apollo_id: None,
            name,
            title: title.map(String::from),
            seniority: None,
            departments: Vec::new(),
            email: None,
            phone: None,
            linkedin_url: None,
            raw_payload: serde_json::Value::Null,
        }
    }
}

/// Everything one refresh writes for a company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentPayload {
    pub company: CompanyDetails,
    pub profiles: Vec<NewProfile>,
}

/// Company row upsert as handed to a store.
#[derive(Debug, Clone)]
pub struct CompanyUpsert {
    pub name: String,
    pub normalized_name: String,
    pub details: CompanyDetails,
    pub crawled_at: DateTime<Utc>,
    pub crawled_by: String,
}

/// Result of a profile refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOutcome {
    pub company: CompanyEnrichment,
    pub inserted: usize,
    pub updated: usize,
    pub tombstoned: usize,
}

/// Natural key of a profile within its company.
///
/// Apollo person id first, then LinkedIn URL, then a digest of name and title.
pub fn profile_key(
    apollo_id: Option<&str>,
    linkedin_url: Option<&str>,
    name: &str,
    title: Option<&str>,
) -> String {
    if let Some(id) = apollo_id.map(str::trim).filter(|id| !id.is_empty()) {
        return format!("apollo:{}", id);
    }
    if let Some(url) = linkedin_url.map(str::trim).filter(|u| !u.is_empty()) {
        let url = url.to_lowercase();
        let url = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
            .trim_end_matches('/');
        return format!("linkedin:{}", url);
    }

    let mut hasher = Sha256::new();
    hasher.update(name.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(title.unwrap_or("").trim().to_lowercase().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("hash:{}", &digest[..32])
}

// ============ Cache Status ============

/// Freshness of a company's stored enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentStatus {
    pub exists: bool,
    pub is_stale: bool,
    pub days_since_crawl: Option<i64>,
    pub profile_count: i64,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

// ============ Intelligence (derived, never persisted) ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Apollo,
    Web,
    Profile,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Apollo, SourceKind::Web, SourceKind::Profile];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Apollo => "apollo",
            SourceKind::Web => "web",
            SourceKind::Profile => "profile",
        }
    }
}

/// How a source's data was obtained for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Served from stored rows.
    Cached,
    /// Fetched from the external API during this request.
    Fetched,
    /// Fetch attempted and failed; the field is omitted.
    Failed,
    /// Another refresh of the same company was in flight and nothing was cached.
    Skipped,
    /// No client is configured for this source.
    NotConfigured,
}

/// Per-request summary of one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceSource {
    pub source: SourceKind,
    pub status: SourceStatus,
    pub is_stale: bool,
    pub days_since_crawl: Option<i64>,
    /// External API credits spent by this request.
    pub cost: u32,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApolloIntelligence {
    pub company: CompanyEnrichment,
    pub employees: Vec<ApolloProfile>,
    pub decision_makers: Vec<ApolloProfile>,
    pub departments: BTreeMap<String, usize>,
    pub seniority_levels: BTreeMap<String, usize>,
    pub last_updated: DateTime<Utc>,
}

impl ApolloIntelligence {
    /// Best known headcount: Apollo's organisation estimate or the profiles we hold.
    pub fn employee_count(&self) -> u64 {
        let estimated = self.company.estimated_employees.unwrap_or(0).max(0) as u64;
        estimated.max(self.employees.len() as u64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebMention {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_news: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebIntelligence {
    pub mentions: Vec<WebMention>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfileIntelligence {
    pub description: Option<String>,
    pub industry: Option<String>,
    pub headquarters: Option<String>,
    pub founded_year: Option<i32>,
    pub specialties: Vec<String>,
}

impl CompanyProfileIntelligence {
    pub fn field_count(&self) -> usize {
        [
            self.description.is_some(),
            self.industry.is_some(),
            self.headquarters.is_some(),
            self.founded_year.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
            + self.specialties.len()
    }
}

/// Merged view returned to callers. Recomputed on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyIntelligence {
    pub company_name: String,
    pub normalized_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apollo: Option<ApolloIntelligence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebIntelligence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CompanyProfileIntelligence>,
    pub sources: Vec<IntelligenceSource>,
    pub enrichment_score: u32,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceOptions {
    #[serde(default)]
    pub force_refresh: bool,
    /// Sources to consult; empty means all.
    #[serde(default)]
    pub sources: Vec<SourceKind>,
    /// Refresh Apollo data older than this many days even when not yet stale.
    #[serde(default, rename = "maxAge")]
    pub max_age_days: Option<i64>,
}

impl IntelligenceOptions {
    pub fn requested_sources(&self) -> Vec<SourceKind> {
        if self.sources.is_empty() {
            return SourceKind::ALL.to_vec();
        }
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.sources.contains(kind))
            .collect()
    }
}

// ============ API Request Models ============

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyIntelligenceRequest {
    pub company_name: String,
    #[serde(flatten)]
    pub options: IntelligenceOptions,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySearchRequest {
    pub query: String,
    #[serde(default)]
    pub known_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyNameQuery {
    pub company_name: String,
    #[serde(default)]
    pub include_removed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub company_name: String,
    pub actor: Option<String>,
}
