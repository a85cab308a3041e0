//! Keyword rule tables for seniority, department and search-intent classification.
//!
//! Every table is an ordered list of `{pattern, label}` rules. Patterns are
//! whole-word, case-insensitive alternations; the first matching rule wins
//! unless the caller asks for every match.

use regex::Regex;
use std::sync::OnceLock;

/// A single `{pattern, label}` rule.
pub struct Rule<L> {
    pub label: L,
    pattern: Regex,
}

/// Ordered rule list.
pub struct RuleTable<L> {
    rules: Vec<Rule<L>>,
}

impl<L: Copy + PartialEq> RuleTable<L> {
    /// Builds a table from `(label, keywords)` pairs, in priority order.
    ///
    /// Keywords are matched as whole words; spaces inside a keyword match any
    /// run of whitespace.
    pub fn new(entries: &[(L, &[&str])]) -> Self {
        let rules = entries
            .iter()
            .map(|(label, keywords)| {
                let alternatives = keywords
                    .iter()
                    .map(|k| regex::escape(k).replace(' ', r"\s+"))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives))
                    .expect("rule keywords always form a valid pattern");
                Rule {
                    label: *label,
                    pattern,
                }
            })
            .collect();
        Self { rules }
    }

    /// Label of the first matching rule.
    pub fn classify(&self, text: &str) -> Option<L> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.label)
    }

    /// Labels of every matching rule, in table order, without duplicates.
    pub fn classify_all(&self, text: &str) -> Vec<L> {
        let mut labels = Vec::new();
        for rule in &self.rules {
            if rule.pattern.is_match(text) && !labels.contains(&rule.label) {
                labels.push(rule.label);
            }
        }
        labels
    }

    /// Removes keyword matches at the start or end of `text`, repeatedly.
    ///
    /// Matches in the middle of the text are kept, so "Acme News Network"
    /// keeps its "News".
    pub fn strip_edges(&self, text: &str) -> String {
        let mut remaining = text.trim();
        loop {
            let before = remaining.len();
            for rule in &self.rules {
                if let Some(m) = rule.pattern.find(remaining) {
                    if m.start() == 0 {
                        remaining = remaining[m.end()..].trim_start();
                    }
                }
                if let Some(m) = rule.pattern.find_iter(remaining).last() {
                    if m.end() == remaining.len() {
                        remaining = remaining[..m.start()].trim_end();
                    }
                }
            }
            if remaining.len() == before {
                break;
            }
        }
        remaining.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// ============ Seniority ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Seniority {
    Intern,
    Entry,
    Senior,
    Manager,
    Director,
    Head,
    Vp,
    Partner,
    Owner,
    CSuite,
    Founder,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Intern => "intern",
            Seniority::Entry => "entry",
            Seniority::Senior => "senior",
            Seniority::Manager => "manager",
            Seniority::Director => "director",
            Seniority::Head => "head",
            Seniority::Vp => "vp",
            Seniority::Partner => "partner",
            Seniority::Owner => "owner",
            Seniority::CSuite => "c_suite",
            Seniority::Founder => "founder",
        }
    }

    /// Parses Apollo's `seniority` values (and our own labels).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "intern" => Some(Seniority::Intern),
            "entry" => Some(Seniority::Entry),
            "senior" => Some(Seniority::Senior),
            "manager" => Some(Seniority::Manager),
            "director" => Some(Seniority::Director),
            "head" => Some(Seniority::Head),
            "vp" => Some(Seniority::Vp),
            "partner" => Some(Seniority::Partner),
            "owner" => Some(Seniority::Owner),
            "c_suite" | "c-suite" | "csuite" => Some(Seniority::CSuite),
            "founder" => Some(Seniority::Founder),
            _ => None,
        }
    }

    /// Director and above.
    pub fn is_decision_maker(&self) -> bool {
        *self >= Seniority::Director
    }
}

pub fn seniority_rules() -> &'static RuleTable<Seniority> {
    static TABLE: OnceLock<RuleTable<Seniority>> = OnceLock::new();
    TABLE.get_or_init(|| {
        RuleTable::new(&[
            (Seniority::Founder, &["founder", "co-founder", "cofounder"]),
            (
                Seniority::CSuite,
                &[
                    "ceo", "cto", "cfo", "coo", "cmo", "cio", "cpo", "ciso", "chief",
                    "president",
                ],
            ),
            (Seniority::Owner, &["owner"]),
            (Seniority::Partner, &["partner"]),
            (
                Seniority::Vp,
                &["vp", "vice president", "svp", "evp"],
            ),
            (Seniority::Head, &["head of", "head"]),
            (Seniority::Director, &["director"]),
            (
                Seniority::Manager,
                &["manager", "lead", "team lead", "supervisor"],
            ),
            (
                Seniority::Senior,
                &["senior", "sr", "principal", "staff"],
            ),
            (Seniority::Intern, &["intern", "internship", "trainee"]),
            (
                Seniority::Entry,
                &["junior", "jr", "associate", "graduate", "assistant"],
            ),
        ])
    })
}

/// Apollo's seniority when recognised, otherwise a title-based guess.
pub fn classify_seniority(apollo_seniority: Option<&str>, title: Option<&str>) -> Option<Seniority> {
    apollo_seniority
        .and_then(Seniority::parse)
        .or_else(|| title.and_then(|t| seniority_rules().classify(t)))
}

// ============ Department ============

pub fn department_rules() -> &'static RuleTable<&'static str> {
    static TABLE: OnceLock<RuleTable<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        RuleTable::new(&[
            (
                "executive",
                &["ceo", "founder", "co-founder", "chief executive", "managing director", "president"],
            ),
            (
                "data",
                &["data", "analytics", "machine learning", "ml", "ai", "data scientist", "bi"],
            ),
            (
                "engineering",
                &[
                    "engineer", "engineering", "developer", "software", "devops", "sre",
                    "cto", "architect", "technical", "programmer", "qa",
                ],
            ),
            ("product", &["product", "cpo"]),
            ("design", &["design", "designer", "ux", "ui"]),
            (
                "sales",
                &[
                    "sales", "account executive", "business development", "bdr", "sdr",
                    "account manager", "commercial",
                ],
            ),
            (
                "marketing",
                &["marketing", "brand", "growth", "content", "seo", "cmo", "communications"],
            ),
            (
                "customer_success",
                &["customer success", "support", "customer service", "client services"],
            ),
            (
                "finance",
                &["finance", "financial", "accountant", "accounting", "cfo", "controller"],
            ),
            (
                "people",
                &["hr", "human resources", "people", "talent", "recruiter", "recruiting", "recruitment"],
            ),
            ("legal", &["legal", "counsel", "lawyer", "compliance", "solicitor"]),
            ("operations", &["operations", "coo", "office manager", "logistics"]),
        ])
    })
}

/// Apollo's own departments (without the `master_` prefix) when present,
/// otherwise every department whose rule matches the title.
pub fn classify_departments(apollo_departments: &[String], title: Option<&str>) -> Vec<String> {
    let from_apollo: Vec<String> = apollo_departments
        .iter()
        .map(|d| d.trim().trim_start_matches("master_").to_string())
        .filter(|d| !d.is_empty())
        .collect();
    if !from_apollo.is_empty() {
        return from_apollo;
    }

    title
        .map(|t| {
            department_rules()
                .classify_all(t)
                .into_iter()
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

// ============ Search intent ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    DecisionMakers,
    Employees,
    News,
    Overview,
}

pub fn intent_rules() -> &'static RuleTable<SearchIntent> {
    static TABLE: OnceLock<RuleTable<SearchIntent>> = OnceLock::new();
    TABLE.get_or_init(|| {
        RuleTable::new(&[
            (
                SearchIntent::DecisionMakers,
                &["decision makers", "decision maker", "executives", "leadership", "hiring manager", "hiring managers"],
            ),
            (
                SearchIntent::Employees,
                &["employees", "staff", "team", "people", "who works at", "works at", "org chart"],
            ),
            (SearchIntent::News, &["news", "press", "announcements", "latest"]),
        ])
    })
}

/// Intent of a free-text company query; `Overview` when nothing matches.
pub fn classify_intent(query: &str) -> SearchIntent {
    intent_rules()
        .classify(query)
        .unwrap_or(SearchIntent::Overview)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seniority_first_match_wins() {
        let rules = seniority_rules();
        assert_eq!(rules.classify("Co-Founder & CEO"), Some(Seniority::Founder));
        assert_eq!(rules.classify("Chief Technology Officer"), Some(Seniority::CSuite));
        assert_eq!(rules.classify("VP of Sales"), Some(Seniority::Vp));
        assert_eq!(rules.classify("Head of Data"), Some(Seniority::Head));
        assert_eq!(rules.classify("Engineering Director"), Some(Seniority::Director));
        assert_eq!(rules.classify("Senior Product Manager"), Some(Seniority::Manager));
        assert_eq!(rules.classify("Sr. Data Engineer"), Some(Seniority::Senior));
        assert_eq!(rules.classify("Marketing Intern"), Some(Seniority::Intern));
        assert_eq!(rules.classify("Junior Analyst"), Some(Seniority::Entry));
        assert_eq!(rules.classify("Data Engineer"), None);
    }

    #[test]
    fn seniority_matches_whole_words_only() {
        // "directory" and "leadership" must not hit "director" / "lead"
        assert_eq!(seniority_rules().classify("Directory Services Analyst"), None);
        assert_eq!(seniority_rules().classify("Leadership Coach"), None);
    }

    #[test]
    fn apollo_seniority_overrides_title() {
        assert_eq!(
            classify_seniority(Some("c_suite"), Some("Software Engineer")),
            Some(Seniority::CSuite)
        );
        assert_eq!(
            classify_seniority(Some("unknown"), Some("Director of Finance")),
            Some(Seniority::Director)
        );
        assert_eq!(classify_seniority(None, None), None);
    }

    #[test]
    fn decision_makers_are_director_and_above() {
        assert!(Seniority::Director.is_decision_maker());
        assert!(Seniority::Founder.is_decision_maker());
        assert!(Seniority::Vp.is_decision_maker());
        assert!(!Seniority::Manager.is_decision_maker());
        assert!(!Seniority::Intern.is_decision_maker());
    }

    #[test]
    fn departments_from_title_collect_every_match() {
        assert_eq!(
            classify_departments(&[], Some("Senior Data Engineer")),
            vec!["data".to_string(), "engineering".to_string()]
        );
        assert_eq!(
            classify_departments(&[], Some("Talent Acquisition Partner")),
            vec!["people".to_string()]
        );
        assert!(classify_departments(&[], Some("Office Dog")).is_empty());
        assert!(classify_departments(&[], None).is_empty());
    }

    #[test]
    fn apollo_departments_take_precedence() {
        let apollo = vec![
            "master_engineering_technical".to_string(),
            "master_information_technology".to_string(),
        ];
        assert_eq!(
            classify_departments(&apollo, Some("Head of Sales")),
            vec![
                "engineering_technical".to_string(),
                "information_technology".to_string()
            ]
        );
    }

    #[test]
    fn intent_defaults_to_overview() {
        assert_eq!(classify_intent("CK Delta"), SearchIntent::Overview);
        assert_eq!(classify_intent("CK Delta employees"), SearchIntent::Employees);
        assert_eq!(
            classify_intent("decision makers at Monzo"),
            SearchIntent::DecisionMakers
        );
        assert_eq!(classify_intent("Monzo latest news"), SearchIntent::News);
    }

    #[test]
    fn strip_edges_removes_leading_and_trailing_intent() {
        assert_eq!(intent_rules().strip_edges("who works at CK Delta"), "CK Delta");
        assert_eq!(intent_rules().strip_edges("Monzo  latest news"), "Monzo");
        assert_eq!(
            intent_rules().strip_edges("decision makers at Monzo"),
            "at Monzo"
        );
    }

    #[test]
    fn strip_edges_keeps_keywords_inside_the_name() {
        assert_eq!(
            intent_rules().strip_edges("Acme News Network"),
            "Acme News Network"
        );
        assert_eq!(intent_rules().strip_edges("news"), "");
    }
}
