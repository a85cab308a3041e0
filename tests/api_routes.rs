//! HTTP-level tests of the admin router backed by the in-memory store.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use quest_intel_api::apollo_storage::ApolloStorageService;
use quest_intel_api::config::Config;
use quest_intel_api::handlers::{router, AppState};
use quest_intel_api::intelligence::UnifiedIntelligenceService;
use quest_intel_api::memory_storage::MemoryEnrichmentStore;
use quest_intel_api::models::{CompanyDetails, EnrichmentPayload, NewProfile};
use quest_intel_api::services::{UnconfiguredCompanyProfile, UnconfiguredWebSearch};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<ApolloStorageService>) {
    let config = Config::for_local("http://127.0.0.1:9");
    let storage = Arc::new(ApolloStorageService::new(Arc::new(
        MemoryEnrichmentStore::new(),
    )));
    let intelligence = Arc::new(UnifiedIntelligenceService::new(
        storage.clone(),
        None,
        Arc::new(UnconfiguredWebSearch),
        Arc::new(UnconfiguredCompanyProfile),
    ));
    let state = Arc::new(AppState::new(config, storage.clone(), intelligence));
    (router(state), storage)
}

async fn seed(storage: &ApolloStorageService, company: &str, titles: &[(&str, &str)]) {
    let profiles = titles
        .iter()
        .map(|&(name, title)| NewProfile {
            seniority: quest_intel_api::classification::classify_seniority(None, Some(title))
                .map(|s| s.as_str().to_string()),
            ..NewProfile::named(name, Some(title))
        })
        .collect();
    storage
        .store_enrichment_data(
            company,
            EnrichmentPayload {
                company: CompanyDetails {
                    estimated_employees: Some(60),
                    ..Default::default()
                },
                profiles,
            },
            "seed",
        )
        .await
        .unwrap();
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_memory_storage() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["apolloConfigured"], false);
}

#[tokio::test]
async fn intelligence_serves_cached_company() {
    let (app, storage) = test_app();
    seed(
        &storage,
        "CK Delta",
        &[("Ada", "Chief Executive Officer"), ("Bob", "Software Engineer")],
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/company-intelligence",
        Some(json!({"companyName": "CK Delta Ltd", "sources": ["apollo"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["normalizedName"], "ck delta");
    assert_eq!(data["sources"][0]["status"], "cached");
    assert_eq!(data["apollo"]["employees"].as_array().unwrap().len(), 2);
    assert_eq!(data["apollo"]["decisionMakers"].as_array().unwrap().len(), 1);
    assert!(data.get("web").is_none());
    assert!(data["enrichmentScore"].as_u64().unwrap() >= 25);
}

#[tokio::test]
async fn intelligence_rejects_blank_company_name() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/company-intelligence",
        Some(json!({"companyName": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "companyName is required");
}

#[tokio::test]
async fn search_merges_stored_and_supplied_names() {
    let (app, storage) = test_app();
    seed(&storage, "CK Delta", &[("Ada", "CEO")]).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/company-search",
        Some(json!({"query": "ck employees", "knownNames": ["CKD Holdings", "Acme"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["normalizedName"], "ck");
    assert_eq!(body["intent"], "employees");
    let suggestions: Vec<&str> = body["suggestions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(suggestions, vec!["CK Delta", "CKD Holdings"]);
}

#[tokio::test]
async fn status_profiles_and_delete_round_trip() {
    let (app, storage) = test_app();
    seed(&storage, "Acme", &[("Ada", "CTO"), ("Bob", "Designer")]).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/admin/company-enrichment/status?companyName=Acme%20Inc",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["exists"], true);
    assert_eq!(body["status"]["isStale"], false);
    assert_eq!(body["status"]["profileCount"], 2);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/admin/company-enrichment/profiles?companyName=Acme&includeRemoved=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/admin/company-enrichment?companyName=Acme",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/admin/company-enrichment?companyName=Acme",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/company-enrichment/profiles?companyName=Acme",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refresh_without_apollo_key_is_bad_gateway() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/company-enrichment/refresh",
        Some(json!({"companyName": "CK Delta"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "External service error");
}
