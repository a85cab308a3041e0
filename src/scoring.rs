//! Enrichment score, insights and recommendations for merged company intelligence.
//!
//! All three are fixed rule lists over [`IntelligenceSignals`]. Every score
//! award depends on a predicate that can only become true as data is added,
//! so the score never decreases when a source gains data.

use crate::models::{
    ApolloIntelligence, CompanyProfileIntelligence, IntelligenceSource, SourceKind, WebIntelligence,
};

pub const MAX_SCORE: u32 = 100;

/// Facts about the merged data that the rules look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntelligenceSignals {
    pub has_apollo: bool,
    pub employee_count: u64,
    pub profile_count: usize,
    pub decision_makers: usize,
    pub department_count: usize,
    pub largest_department: Option<(String, usize)>,
    pub apollo_days_since_crawl: Option<i64>,
    pub apollo_is_stale: bool,
    pub has_web: bool,
    pub web_mentions: usize,
    pub news_items: usize,
    pub has_profile: bool,
    pub has_description: bool,
    pub has_industry: bool,
    pub has_firmographics: bool,
}

impl IntelligenceSignals {
    pub fn collect(
        apollo: Option<&ApolloIntelligence>,
        web: Option<&WebIntelligence>,
        profile: Option<&CompanyProfileIntelligence>,
        sources: &[IntelligenceSource],
    ) -> Self {
        let mut signals = Self::default();

        if let Some(apollo) = apollo {
            signals.has_apollo = true;
            signals.employee_count = apollo.employee_count();
            signals.profile_count = apollo.employees.len();
            signals.decision_makers = apollo.decision_makers.len();
            signals.department_count = apollo.departments.len();
            // Ties go to the alphabetically first department
            signals.largest_department = apollo
                .departments
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(name, count)| (name.clone(), *count));
        }
        if let Some(source) = sources.iter().find(|s| s.source == SourceKind::Apollo) {
            signals.apollo_days_since_crawl = source.days_since_crawl;
            signals.apollo_is_stale = source.is_stale;
        }

        if let Some(web) = web {
            signals.has_web = true;
            signals.web_mentions = web.mentions.len();
            signals.news_items = web.mentions.iter().filter(|m| m.is_news).count();
        }

        if let Some(profile) = profile {
            signals.has_profile = true;
            signals.has_description = profile
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty());
            signals.has_industry = profile
                .industry
                .as_deref()
                .is_some_and(|i| !i.trim().is_empty());
            signals.has_firmographics = profile.headquarters.is_some()
                || profile.founded_year.is_some()
                || !profile.specialties.is_empty();
        }

        signals
    }
}

/// One weighted award of the score rubric.
struct Award {
    points: u32,
    earned: fn(&IntelligenceSignals) -> bool,
}

/// Apollo 40, web 30, profile 30.
const AWARDS: &[Award] = &[
    // Apollo
    Award { points: 15, earned: |s| s.profile_count > 0 },
    Award { points: 10, earned: |s| s.employee_count > 100 },
    Award { points: 10, earned: |s| s.decision_makers > 0 },
    Award { points: 5, earned: |s| s.department_count >= 3 },
    // Web
    Award { points: 10, earned: |s| s.web_mentions > 0 },
    Award { points: 10, earned: |s| s.web_mentions >= 5 },
    Award { points: 10, earned: |s| s.news_items > 0 },
    // Company profile
    Award { points: 10, earned: |s| s.has_description },
    Award { points: 10, earned: |s| s.has_industry },
    Award { points: 10, earned: |s| s.has_firmographics },
];

pub fn enrichment_score(signals: &IntelligenceSignals) -> u32 {
    AWARDS
        .iter()
        .filter(|award| (award.earned)(signals))
        .map(|award| award.points)
        .sum::<u32>()
        .min(MAX_SCORE)
}

/// A `{predicate, template}` rule producing one line of text.
pub struct TextRule {
    pub id: &'static str,
    applies: fn(&IntelligenceSignals) -> bool,
    render: fn(&IntelligenceSignals) -> String,
}

pub const INSIGHT_RULES: &[TextRule] = &[
    TextRule {
        id: "size_large_enterprise",
        applies: |s| s.employee_count > 10_000,
        render: |s| format!("Large enterprise with {}+ employees", s.employee_count),
    },
    TextRule {
        id: "size_mid_market",
        applies: |s| (1_001..=10_000).contains(&s.employee_count),
        render: |s| format!("Mid-to-large company with around {} employees", s.employee_count),
    },
    TextRule {
        id: "size_growing",
        applies: |s| (101..=1_000).contains(&s.employee_count),
        render: |s| format!("Growing company with around {} employees", s.employee_count),
    },
    TextRule {
        id: "size_small",
        applies: |s| s.has_apollo && (1..=100).contains(&s.employee_count),
        render: |s| format!("Small team of about {} employees", s.employee_count),
    },
    TextRule {
        id: "decision_makers",
        applies: |s| s.decision_makers > 0,
        render: |s| {
            format!(
                "{} decision maker{} identified (director level and above)",
                s.decision_makers,
                if s.decision_makers == 1 { "" } else { "s" }
            )
        },
    },
    TextRule {
        id: "largest_department",
        applies: |s| s.largest_department.is_some(),
        render: |s| match &s.largest_department {
            Some((name, count)) => format!(
                "Largest visible team: {} ({} profile{})",
                name.replace('_', " "),
                count,
                if *count == 1 { "" } else { "s" }
            ),
            None => String::new(),
        },
    },
    TextRule {
        id: "department_spread",
        applies: |s| s.department_count >= 3,
        render: |s| format!("Profiles span {} departments", s.department_count),
    },
    TextRule {
        id: "stale_employee_data",
        applies: |s| s.has_apollo && s.apollo_is_stale,
        render: |s| {
            format!(
                "Employee data is {} days old",
                s.apollo_days_since_crawl.unwrap_or_default()
            )
        },
    },
    TextRule {
        id: "web_mentions",
        applies: |s| s.web_mentions > 0,
        render: |s| format!("{} recent web mentions found", s.web_mentions),
    },
    TextRule {
        id: "news",
        applies: |s| s.news_items > 0,
        render: |s| format!("{} news items in recent coverage", s.news_items),
    },
];

pub const RECOMMENDATION_RULES: &[TextRule] = &[
    TextRule {
        id: "run_apollo",
        applies: |s| !s.has_apollo || s.profile_count == 0,
        render: |_| "Run an Apollo enrichment to discover employees".to_string(),
    },
    TextRule {
        id: "refresh_apollo",
        applies: |s| s.has_apollo && s.apollo_is_stale,
        render: |s| {
            format!(
                "Refresh employee data; the last crawl was {} days ago",
                s.apollo_days_since_crawl.unwrap_or_default()
            )
        },
    },
    TextRule {
        id: "target_decision_makers",
        applies: |s| s.decision_makers > 0,
        render: |s| {
            format!(
                "Prioritise outreach to the {} identified decision maker{}",
                s.decision_makers,
                if s.decision_makers == 1 { "" } else { "s" }
            )
        },
    },
    TextRule {
        id: "find_senior_contacts",
        applies: |s| s.profile_count > 0 && s.decision_makers == 0,
        render: |_| "Look for senior contacts beyond the current employee sample".to_string(),
    },
    TextRule {
        id: "add_web_coverage",
        applies: |s| s.web_mentions == 0,
        render: |_| "Add web search coverage for recent company news".to_string(),
    },
    TextRule {
        id: "add_company_profile",
        applies: |s| !s.has_description && !s.has_industry && !s.has_firmographics,
        render: |_| "Add a company profile source for firmographic detail".to_string(),
    },
    TextRule {
        id: "thin_enrichment",
        applies: |s| enrichment_score(s) < 50,
        render: |_| {
            "Enrichment is thin; combine additional sources before relying on this profile"
                .to_string()
        },
    },
];

/// Renders every rule whose predicate holds, in table order.
pub fn apply_rules(rules: &[TextRule], signals: &IntelligenceSignals) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| (rule.applies)(signals))
        .map(|rule| (rule.render)(signals))
        .collect()
}

pub fn insights(signals: &IntelligenceSignals) -> Vec<String> {
    apply_rules(INSIGHT_RULES, signals)
}

pub fn recommendations(signals: &IntelligenceSignals) -> Vec<String> {
    apply_rules(RECOMMENDATION_RULES, signals)
}
