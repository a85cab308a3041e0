//! Property-based tests using proptest
//! Tests invariants of name normalization, search and scoring for arbitrary inputs

use proptest::prelude::*;
use quest_intel_api::company_search::{normalize_company_name, CompanySearchService};
use quest_intel_api::scoring::{enrichment_score, IntelligenceSignals, MAX_SCORE};

fn signals() -> impl Strategy<Value = IntelligenceSignals> {
    (
        (any::<bool>(), 0u64..20_000, 0usize..50, 0usize..10, 0usize..8),
        (any::<bool>(), 0usize..12, 0usize..6),
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()),
    )
        .prop_map(
            |(
                (has_apollo, employee_count, profile_count, decision_makers, department_count),
                (has_web, web_mentions, news_items),
                (has_profile, has_description, has_industry, has_firmographics),
            )| IntelligenceSignals {
                has_apollo,
                employee_count,
                profile_count,
                decision_makers,
                department_count,
                has_web,
                web_mentions,
                news_items,
                has_profile,
                has_description,
                has_industry,
                has_firmographics,
                ..Default::default()
            },
        )
}

/// `base` with extra data added to every signal.
fn with_more_data(
    base: &IntelligenceSignals,
    extra: (u64, usize, usize, usize, usize, usize),
    flags: (bool, bool, bool),
) -> IntelligenceSignals {
    IntelligenceSignals {
        has_apollo: base.has_apollo || extra.1 > 0,
        employee_count: base.employee_count + extra.0,
        profile_count: base.profile_count + extra.1,
        decision_makers: base.decision_makers + extra.2,
        department_count: base.department_count + extra.3,
        has_web: base.has_web || extra.4 > 0,
        web_mentions: base.web_mentions + extra.4,
        news_items: base.news_items + extra.5,
        has_description: base.has_description || flags.0,
        has_industry: base.has_industry || flags.1,
        has_firmographics: base.has_firmographics || flags.2,
        ..base.clone()
    }
}

// Property: normalization is idempotent and never panics
proptest! {
    #[test]
    fn normalization_never_panics(name in "\\PC*") {
        let _ = normalize_company_name(&name);
    }

    #[test]
    fn normalization_is_idempotent(name in "[A-Za-z0-9&.,'() -]{0,40}") {
        let once = normalize_company_name(&name);
        prop_assert_eq!(normalize_company_name(&once), once);
    }

    #[test]
    fn suffixed_names_share_a_key(
        base in "[A-Za-z][A-Za-z0-9]{1,12}( [A-Za-z0-9]{2,8}){0,2}",
        suffix in prop::sample::select(vec!["Inc", "Ltd.", "LLC", "GmbH", "plc", "Corp"]),
    ) {
        let plain = normalize_company_name(&base);
        let suffixed = normalize_company_name(&format!("  {}, {} ", base.to_uppercase(), suffix));
        prop_assert_eq!(normalize_company_name(&plain), suffixed.clone());
        prop_assert!(!suffixed.is_empty());
    }

    #[test]
    fn search_never_exceeds_suggestion_limit(
        query in "[a-z ]{0,12}",
        names in prop::collection::vec("[A-Za-z ]{1,16}", 0..30),
    ) {
        let result = CompanySearchService::new().search_company(&query, &names);
        prop_assert!(result.suggestions.len() <= 8);
        for suggestion in &result.suggestions {
            prop_assert!(names.iter().any(|n| n.trim() == suggestion));
        }
    }
}

// Property: adding data never lowers the score
proptest! {
    #[test]
    fn score_is_bounded(signals in signals()) {
        prop_assert!(enrichment_score(&signals) <= MAX_SCORE);
    }

    #[test]
    fn score_is_monotonic_in_data(
        base in signals(),
        extra in (0u64..5_000, 0usize..20, 0usize..5, 0usize..5, 0usize..8, 0usize..4),
        flags in (any::<bool>(), any::<bool>(), any::<bool>()),
    ) {
        let richer = with_more_data(&base, extra, flags);
        prop_assert!(enrichment_score(&richer) >= enrichment_score(&base));
    }
}
