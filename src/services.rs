use crate::circuit_breaker::{create_api_circuit_breaker, ApiCircuitBreaker};
use crate::classification::{classify_departments, classify_seniority};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

// ============ Apollo.io API Integration ============

#[derive(Debug, Clone, Deserialize)]
pub struct ApolloOrganization {
    pub id: Option<String>,
    pub name: Option<String>,
    pub website_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub primary_domain: Option<String>,
    pub industry: Option<String>,
    pub estimated_num_employees: Option<i64>,
}

impl ApolloOrganization {
    /// `primary_domain`, else the host of `website_url` without `www.`.
    pub fn domain(&self) -> Option<String> {
        if let Some(domain) = self.primary_domain.as_deref().filter(|d| !d.trim().is_empty()) {
            return Some(domain.trim().to_lowercase());
        }
        let website = self.website_url.as_deref()?;
        let parsed = url::Url::parse(website)
            .or_else(|_| url::Url::parse(&format!("https://{}", website)))
            .ok()?;
        parsed
            .host_str()
            .map(|host| host.trim_start_matches("www.").to_lowercase())
    }

    fn details(&self) -> CompanyDetails {
        CompanyDetails {
            apollo_org_id: self.id.clone(),
            linkedin_url: self.linkedin_url.clone(),
            domain: self.domain(),
            industry: self.industry.clone(),
            estimated_employees: self.estimated_num_employees,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApolloPhoneNumber {
    pub raw_number: Option<String>,
    pub sanitized_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApolloPerson {
    pub id: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    #[serde(default)]
    pub departments: Vec<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<ApolloPhoneNumber>,
    pub organization: Option<ApolloOrganization>,
}

impl ApolloPerson {
    fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("").trim(),
            self.last_name.as_deref().unwrap_or("").trim()
        );
        let full = full.trim();
        (!full.is_empty()).then(|| full.to_string())
    }

    /// Apollo masks locked emails with a placeholder address.
    fn usable_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && e.contains('@') && !e.contains("not_unlocked"))
            .map(str::to_lowercase)
    }

    fn phone(&self) -> Option<String> {
        self.phone_numbers.iter().find_map(|p| {
            p.sanitized_number
                .clone()
                .or_else(|| p.raw_number.clone())
                .filter(|n| !n.trim().is_empty())
        })
    }

    /// Maps the person to a storable profile, keeping `raw` verbatim.
    pub fn into_profile(self, raw: Value) -> Option<NewProfile> {
        let name = self.display_name()?;
        let seniority = classify_seniority(self.seniority.as_deref(), self.title.as_deref())
            .map(|s| s.as_str().to_string());
        let departments = classify_departments(&self.departments, self.title.as_deref());

        Some(NewProfile {
            profile_key: profile_key(
                self.id.as_deref(),
                self.linkedin_url.as_deref(),
                &name,
                self.title.as_deref(),
            ),
            email: self.usable_email(),
            phone: self.phone(),
            apollo_id: self.id,
            name,
            title: self.title,
            seniority,
            departments,
            linkedin_url: self.linkedin_url,
            raw_payload: raw,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApolloPagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub total_entries: Option<u64>,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApolloPeopleResponse {
    #[serde(default)]
    people: Vec<Value>,
    #[serde(default)]
    contacts: Vec<Value>,
    pagination: Option<ApolloPagination>,
}

/// Result of an Apollo employee search for one company.
#[derive(Debug, Clone, Default)]
pub struct ApolloFetch {
    pub organization: CompanyDetails,
    pub profiles: Vec<NewProfile>,
    /// Apollo bills one credit per page.
    pub pages_fetched: u32,
    pub total_entries: Option<u64>,
}

impl ApolloFetch {
    pub fn into_payload(self) -> EnrichmentPayload {
        EnrichmentPayload {
            company: self.organization,
            profiles: self.profiles,
        }
    }
}

pub struct ApolloService {
    client: Client,
    base_url: String,
    api_key: String,
    per_page: u32,
    max_pages: u32,
    breaker: ApiCircuitBreaker,
}

impl ApolloService {
    /// Create a new Apollo client.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the API key, base URL, paging limits and HTTP timeout.
    ///
    /// Fails with `InternalError` when no API key is configured.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .apollo_api_key
            .clone()
            .ok_or_else(|| AppError::InternalError("APOLLO_API_KEY is not configured".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Apollo client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.apollo_base_url.trim_end_matches('/').to_string(),
            api_key,
            per_page: config.apollo_per_page,
            max_pages: config.apollo_max_pages,
            breaker: create_api_circuit_breaker(),
        })
    }

    /// Searches Apollo for people at `company_name`, paging sequentially.
    ///
    /// # Arguments
    ///
    /// * `company_name` - Sent as `q_organization_name`.
    ///
    /// # Returns
    ///
    /// * `Result<ApolloFetch, AppError>` - Mapped profiles, organization details
    ///   and the number of pages fetched (at most `apollo_max_pages`).
    pub async fn search_people(&self, company_name: &str) -> Result<ApolloFetch, AppError> {
        tracing::info!("Fetching Apollo employees for company: {}", company_name);

        let mut fetch = ApolloFetch::default();
        let mut page = 1;
        loop {
            let response = self.fetch_page_guarded(company_name, page).await?;
            fetch.pages_fetched += 1;

            let total_pages = response
                .pagination
                .as_ref()
                .and_then(|p| p.total_pages)
                .unwrap_or(1);
            if fetch.total_entries.is_none() {
                fetch.total_entries = response.pagination.as_ref().and_then(|p| p.total_entries);
            }

            let people: Vec<Value> = response
                .people
                .into_iter()
                .chain(response.contacts)
                .collect();
            let page_was_empty = people.is_empty();

            for raw in people {
                let person: ApolloPerson = match serde_json::from_value(raw.clone()) {
                    Ok(person) => person,
                    Err(e) => {
                        tracing::warn!("Skipping unparseable Apollo person: {}", e);
                        continue;
                    }
                };
                if fetch.organization.apollo_org_id.is_none() {
                    if let Some(org) = person.organization.as_ref() {
                        fetch.organization = org.details();
                    }
                }
                if let Some(profile) = person.into_profile(raw) {
                    fetch.profiles.push(profile);
                }
            }

            if page_was_empty || page >= total_pages || page >= self.max_pages {
                break;
            }
            page += 1;
        }

        tracing::info!(
            "✓ Apollo returned {} profiles for '{}' ({} page(s), {:?} total entries)",
            fetch.profiles.len(),
            company_name,
            fetch.pages_fetched,
            fetch.total_entries
        );
        Ok(fetch)
    }

    async fn fetch_page_guarded(
        &self,
        company_name: &str,
        page: u32,
    ) -> Result<ApolloPeopleResponse, AppError> {
        match self.breaker.call(self.fetch_page(company_name, page)).await {
            Ok(response) => Ok(response),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Apollo circuit breaker open, rejecting request");
                Err(AppError::ExternalApiError(
                    "Apollo circuit breaker is open".to_string(),
                ))
            }
        }
    }

    async fn fetch_page(
        &self,
        company_name: &str,
        page: u32,
    ) -> Result<ApolloPeopleResponse, AppError> {
        let url = format!("{}/v1/mixed_people/search", self.base_url);
        let body = json!({
            "q_organization_name": company_name,
            "page": page,
            "per_page": self.per_page,
        });

        // Key goes in a header, never in the logged URL
        tracing::debug!("Apollo people search: {} page {}", url, page);

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Cache-Control", "no-cache")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Apollo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Apollo returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Apollo returned status {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Apollo response: {}", e))
        })
    }
}

// ============ Supplemental Intelligence Sources ============

/// Web mentions and news about a company.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    async fn search_company(&self, company_name: &str) -> Result<WebIntelligence, AppError>;
}

/// Firmographic profile of a company (description, industry, headquarters...).
#[async_trait]
pub trait CompanyProfileProvider: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch_profile(
        &self,
        company_name: &str,
    ) -> Result<CompanyProfileIntelligence, AppError>;
}

/// Placeholder web source: no provider is wired up yet, returns an empty result.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredWebSearch;

#[async_trait]
impl WebSearchProvider for UnconfiguredWebSearch {
    fn is_configured(&self) -> bool {
        false
    }

    async fn search_company(&self, _company_name: &str) -> Result<WebIntelligence, AppError> {
        Ok(WebIntelligence::default())
    }
}

/// Placeholder profile source: no provider is wired up yet, returns an empty result.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCompanyProfile;

#[async_trait]
impl CompanyProfileProvider for UnconfiguredCompanyProfile {
    fn is_configured(&self) -> bool {
        false
    }

    async fn fetch_profile(
        &self,
        _company_name: &str,
    ) -> Result<CompanyProfileIntelligence, AppError> {
        Ok(CompanyProfileIntelligence::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(raw: Value) -> ApolloPerson {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn maps_person_to_profile() {
        let raw = json!({
            "id": "p-1",
            "first_name": "Jane",
            "last_name": "Doe",
            "title": "VP Engineering",
            "seniority": "vp",
            "departments": ["master_engineering_technical"],
            "email": "Jane@CKDelta.com",
            "linkedin_url": "https://linkedin.com/in/janedoe",
            "phone_numbers": [{"raw_number": "+44 20 7946 0000", "sanitized_number": "+442079460000"}]
        });

        let profile = person(raw.clone()).into_profile(raw.clone()).unwrap();
        assert_eq!(profile.profile_key, "apollo:p-1");
        assert_eq!(profile.name, "Jane Doe");
        assert_eq!(profile.seniority.as_deref(), Some("vp"));
        assert_eq!(profile.departments, vec!["engineering_technical".to_string()]);
        assert_eq!(profile.email.as_deref(), Some("jane@ckdelta.com"));
        assert_eq!(profile.phone.as_deref(), Some("+442079460000"));
        assert_eq!(profile.raw_payload, raw);
    }

    #[test]
    fn locked_email_and_missing_seniority_fall_back() {
        let raw = json!({
            "name": "John Roe",
            "title": "Senior Data Scientist",
            "email": "email_not_unlocked@domain.com"
        });

        let profile = person(raw.clone()).into_profile(raw).unwrap();
        assert_eq!(profile.email, None);
        assert_eq!(profile.seniority.as_deref(), Some("senior"));
        assert_eq!(profile.departments, vec!["data".to_string()]);
        assert!(profile.profile_key.starts_with("hash:"));
    }

    #[test]
    fn nameless_person_is_skipped() {
        let raw = json!({"id": "p-2", "title": "Engineer"});
        assert!(person(raw.clone()).into_profile(raw).is_none());
    }

    #[test]
    fn organization_domain_falls_back_to_website_host() {
        let org = ApolloOrganization {
            id: Some("org-1".into()),
            name: Some("CK Delta".into()),
            website_url: Some("http://www.ckdelta.ie".into()),
            linkedin_url: None,
            primary_domain: None,
            industry: Some("information technology & services".into()),
            estimated_num_employees: Some(60),
        };
        assert_eq!(org.domain().as_deref(), Some("ckdelta.ie"));

        let details = org.details();
        assert_eq!(details.apollo_org_id.as_deref(), Some("org-1"));
        assert_eq!(details.estimated_employees, Some(60));
    }

    #[test]
    fn service_requires_api_key() {
        let config = Config::for_local("https://api.apollo.io");
        assert!(ApolloService::new(&config).is_err());

        let config = Config {
            apollo_api_key: Some("key".into()),
            ..config
        };
        assert!(ApolloService::new(&config).is_ok());
    }
}
