//! Storage behaviour against the in-memory store: freshness, write-back and
//! tombstoning, plus concurrent refreshes of the same company.

use chrono::{Duration, Utc};
use quest_intel_api::apollo_storage::{ApolloStorageService, EnrichmentStore};
use quest_intel_api::company_search::normalize_company_name;
use quest_intel_api::memory_storage::MemoryEnrichmentStore;
use quest_intel_api::models::{CompanyDetails, CompanyUpsert, EnrichmentPayload, NewProfile};
use std::sync::Arc;

fn profiles(prefix: &str, count: usize) -> Vec<NewProfile> {
    (0..count)
        .map(|i| NewProfile::named(format!("{} {}", prefix, i), Some("Analyst")))
        .collect()
}

fn payload(profiles: Vec<NewProfile>) -> EnrichmentPayload {
    EnrichmentPayload {
        company: CompanyDetails {
            domain: Some("ckdelta.ai".to_string()),
            estimated_employees: Some(60),
            ..Default::default()
        },
        profiles,
    }
}

fn service() -> (Arc<MemoryEnrichmentStore>, ApolloStorageService) {
    let store = Arc::new(MemoryEnrichmentStore::new());
    let service = ApolloStorageService::new(store.clone());
    (store, service)
}

#[tokio::test]
async fn unknown_company_has_no_status() {
    let (_, storage) = service();

    let status = storage
        .get_company_enrichment_status("Nobody Ltd")
        .await
        .unwrap();

    assert!(!status.exists);
    assert!(status.is_stale);
    assert_eq!(status.days_since_crawl, None);
    assert_eq!(status.profile_count, 0);
}

#[tokio::test]
async fn ck_delta_stores_twenty_five_profiles() {
    let (_, storage) = service();

    let outcome = storage
        .store_enrichment_data("CK Delta", payload(profiles("Employee", 25)), "tester")
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 25);
    assert_eq!(outcome.company.profile_count, 25);

    let status = storage
        .get_company_enrichment_status("ck delta")
        .await
        .unwrap();
    assert!(status.exists);
    assert!(!status.is_stale);
    assert_eq!(status.days_since_crawl, Some(0));
    assert_eq!(status.profile_count, 25);

    let stored = storage.get_company_profiles("CK DELTA Ltd", false).await.unwrap();
    assert_eq!(stored.len(), 25);
}

#[tokio::test]
async fn stored_profiles_read_back_exactly() {
    let (_, storage) = service();
    let written = profiles("Person", 7);

    storage
        .store_enrichment_data("Acme", payload(written.clone()), "tester")
        .await
        .unwrap();

    let mut read: Vec<String> = storage
        .get_company_profiles("Acme", false)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.profile_key)
        .collect();
    let mut expected: Vec<String> = written.into_iter().map(|p| p.profile_key).collect();
    read.sort();
    expected.sort();
    assert_eq!(read, expected);
}

#[tokio::test]
async fn refresh_tombstones_missing_profiles() {
    let (_, storage) = service();

    storage
        .store_enrichment_data("CK Delta", payload(profiles("Employee", 25)), "tester")
        .await
        .unwrap();
    let outcome = storage
        .store_enrichment_data("CK Delta", payload(profiles("Employee", 20)), "tester")
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.updated, 20);
    assert_eq!(outcome.tombstoned, 5);
    assert_eq!(outcome.company.profile_count, 20);

    let active = storage.get_company_profiles("CK Delta", false).await.unwrap();
    let all = storage.get_company_profiles("CK Delta", true).await.unwrap();
    assert_eq!(active.len(), 20);
    assert_eq!(all.len(), 25);
    assert_eq!(all.iter().filter(|p| !p.is_active()).count(), 5);
}

#[tokio::test]
async fn returning_profile_is_revived() {
    let (_, storage) = service();

    storage
        .store_enrichment_data("Acme", payload(profiles("Person", 3)), "tester")
        .await
        .unwrap();
    storage
        .store_enrichment_data("Acme", payload(profiles("Person", 2)), "tester")
        .await
        .unwrap();
    let outcome = storage
        .store_enrichment_data("Acme", payload(profiles("Person", 3)), "tester")
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.updated, 3);
    assert_eq!(outcome.company.profile_count, 3);
    assert_eq!(
        storage.get_company_profiles("Acme", true).await.unwrap().len(),
        3
    );
}

#[tokio::test]
async fn concurrent_refreshes_never_double_count() {
    let (_, storage) = service();
    let storage = Arc::new(storage);

    let first = {
        let storage = storage.clone();
        tokio::spawn(async move {
            storage
                .store_enrichment_data("CK Delta", payload(profiles("First", 10)), "a")
                .await
        })
    };
    let second = {
        let storage = storage.clone();
        tokio::spawn(async move {
            storage
                .store_enrichment_data("CK Delta", payload(profiles("Second", 15)), "b")
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let active = storage.get_company_profiles("CK Delta", false).await.unwrap();
    let status = storage
        .get_company_enrichment_status("CK Delta")
        .await
        .unwrap();

    assert!(active.len() == 10 || active.len() == 15, "got {}", active.len());
    assert_eq!(status.profile_count, active.len() as i64);
}

#[tokio::test]
async fn data_older_than_thirty_days_is_stale() {
    let (store, storage) = service();

    for (name, age, stale) in [("Fresh Co", 30, false), ("Old Co", 31, true)] {
        store
            .replace_company_data(
                CompanyUpsert {
                    name: name.to_string(),
                    normalized_name: normalize_company_name(name),
                    details: CompanyDetails::default(),
                    crawled_at: Utc::now() - Duration::days(age),
                    crawled_by: "tester".to_string(),
                },
                profiles("Person", 2),
            )
            .await
            .unwrap();

        let status = storage.get_company_enrichment_status(name).await.unwrap();
        assert_eq!(status.days_since_crawl, Some(age));
        assert_eq!(status.is_stale, stale, "{} at {} days", name, age);
    }
}

#[tokio::test]
async fn delete_removes_company_and_profiles() {
    let (_, storage) = service();
    storage
        .store_enrichment_data("Acme", payload(profiles("Person", 3)), "tester")
        .await
        .unwrap();

    assert!(storage.delete_company("Acme Inc.").await.unwrap());
    assert!(!storage.delete_company("Acme").await.unwrap());
    assert!(storage.get_company("Acme").await.unwrap().is_none());
    assert!(storage
        .get_company_profiles("Acme", true)
        .await
        .unwrap()
        .is_empty());
    assert!(storage.known_company_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_company_name_is_rejected() {
    let (_, storage) = service();
    let err = storage
        .store_enrichment_data("  ---  ", payload(profiles("Person", 1)), "tester")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("companyName"));
}
