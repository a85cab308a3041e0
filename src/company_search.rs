//! Company name normalization and suggestion ranking.

use crate::classification::{classify_intent, intent_rules, SearchIntent};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum number of suggestions returned by a search.
pub const MAX_SUGGESTIONS: usize = 8;

/// Joining words left at the edges of a query once intent phrases are removed,
/// as in "decision makers at Monzo".
const CONNECTORS: &[&str] = &["at", "of", "for", "in", "about"];

/// Trailing words removed from company names. Matched as whole words.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "ltd",
    "limited",
    "plc",
    "corp",
    "corporation",
    "co",
    "company",
    "gmbh",
    "ag",
    "sa",
    "srl",
    "bv",
    "nv",
    "pty",
    "llp",
    "lp",
];

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid character class"))
}

/// Canonical key for a company name.
///
/// Lowercases, turns `&` into `and`, replaces punctuation with spaces, collapses
/// whitespace and strips trailing legal suffixes. The last remaining word is
/// never stripped. Idempotent.
pub fn normalize_company_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace('&', " and ");
    let spaced = non_alphanumeric().replace_all(&lowered, " ");

    let mut words: Vec<&str> = spaced.split_whitespace().collect();
    while words.len() > 1 {
        match words.last() {
            Some(last) if LEGAL_SUFFIXES.contains(last) => {
                words.pop();
            }
            _ => break,
        }
    }
    words.join(" ")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanySearchResult {
    pub normalized_name: String,
    pub suggestions: Vec<String>,
    pub intent: SearchIntent,
}

/// How well a known name matches a query; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchRank {
    Exact,
    Prefix,
    WordPrefix,
    Substring,
}

fn rank_match(query: &str, candidate: &str) -> Option<MatchRank> {
    if candidate == query {
        Some(MatchRank::Exact)
    } else if candidate.starts_with(query) {
        Some(MatchRank::Prefix)
    } else if candidate.split(' ').any(|word| word.starts_with(query)) {
        Some(MatchRank::WordPrefix)
    } else if candidate.contains(query) {
        Some(MatchRank::Substring)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompanySearchService;

impl CompanySearchService {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes `query` and ranks `known_names` against it.
    ///
    /// # Arguments
    ///
    /// * `query` - Free text such as "CK Delta" or "decision makers at Monzo".
    /// * `known_names` - Display names to suggest from.
    ///
    /// # Returns
    ///
    /// The normalized company name, up to [`MAX_SUGGESTIONS`] suggestions and
    /// the detected intent. An intent phrase at the start or end of the query
    /// (plus joining words such as "at") is dropped from the name only when the
    /// shortened name matches a known company and the full query does not
    /// match one exactly. Otherwise the name is the normalized query, so
    /// "News Corp" stays "news".
    pub fn search_company(&self, query: &str, known_names: &[String]) -> CompanySearchResult {
        let intent = classify_intent(query);
        let full_name = normalize_company_name(query);
        let stripped_name = normalize_company_name(&strip_connectors(
            &intent_rules().strip_edges(query),
        ));

        let full_ranked = rank_known_names(&full_name, known_names);
        let exact_full = full_ranked
            .first()
            .is_some_and(|(rank, _, _)| *rank == MatchRank::Exact);

        let (normalized_name, ranked) = if exact_full || stripped_name == full_name {
            (full_name, full_ranked)
        } else {
            let stripped_ranked = rank_known_names(&stripped_name, known_names);
            if stripped_ranked.is_empty() {
                (full_name, full_ranked)
            } else {
                (stripped_name, stripped_ranked)
            }
        };

        let mut seen = std::collections::HashSet::new();
        let suggestions = ranked
            .into_iter()
            .filter(|(_, candidate, _)| seen.insert(candidate.clone()))
            .take(MAX_SUGGESTIONS)
            .map(|(_, _, name)| name.trim().to_string())
            .collect();

        tracing::debug!(
            "Company search '{}' -> '{}' ({:?})",
            query,
            normalized_name,
            intent
        );

        CompanySearchResult {
            normalized_name,
            suggestions,
            intent,
        }
    }
}

/// Drops joining words left at either end of `text`.
fn strip_connectors(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    while words
        .first()
        .is_some_and(|w| CONNECTORS.contains(&w.to_lowercase().as_str()))
    {
        words.remove(0);
    }
    while words
        .last()
        .is_some_and(|w| CONNECTORS.contains(&w.to_lowercase().as_str()))
    {
        words.pop();
    }
    words.join(" ")
}

/// Known names matching `normalized`, best first. Empty for an empty query.
fn rank_known_names<'a>(
    normalized: &str,
    known_names: &'a [String],
) -> Vec<(MatchRank, String, &'a String)> {
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(MatchRank, String, &String)> = known_names
        .iter()
        .filter_map(|name| {
            let candidate = normalize_company_name(name);
            rank_match(normalized, &candidate).map(|rank| (rank, candidate, name))
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(&b.1))
    });
    ranked
}
