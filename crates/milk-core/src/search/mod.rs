//! Product search aggregation.
//!
//! Attribute columns of the `product_search` view hold underscore-joined keys,
//! and a single PostgREST request cannot rank matches across names,
//! attributes and the barista flag. Search therefore runs a sequence of
//! narrow queries and merges them: specific-intent matches (property, barista,
//! flavor) first, then, only when none of those matched, a generic fallback
//! over names, a small vocabulary of common terms and fat percentages.
//!
//! Results are deduplicated by product id with first-seen-wins ordering.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::Result;
use crate::models::{ProductId, ProductSearchRow, SearchResult};
use crate::rest::{sanitize_term, Query, RemoteStore};

/// Shortest trimmed term that triggers a request.
pub const MIN_QUERY_LEN: usize = 2;
/// Rows requested per individual query.
pub const PAGE_SIZE: usize = 20;
/// Denormalised view the search runs against.
pub const SEARCH_VIEW: &str = "product_search";

const SEARCH_COLUMNS: &str = "id,product_name,brand_name,property_names,flavor_names,is_barista";
const NAME_COLUMNS: [&str; 2] = ["product_name", "brand_name"];
const PROPERTY_TEXT_COLUMN: &str = "property_names_text";
const FLAVOR_TEXT_COLUMN: &str = "flavor_names_text";
const BARISTA_KEYWORD: &str = "barista";

/// Base ingredients people type, with the spellings found on packaging.
const COMMON_TERMS: &[(&str, &[&str])] = &[
    ("oat", &["oat", "hafer", "avena", "havre"]),
    ("soy", &["soy", "soja"]),
    ("almond", &["almond", "mandel", "mandorla"]),
    ("rice", &["rice", "reis", "riso"]),
    ("coconut", &["coconut", "kokos"]),
    ("pea", &["pea", "erbse"]),
    ("hazelnut", &["hazelnut", "haselnuss"]),
    ("cashew", &["cashew"]),
    ("spelt", &["spelt", "dinkel"]),
];

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:[.,](\d+))?\s*%").expect("valid percentage regex"));

/// When the generic name fallback runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FallbackPolicy {
    /// Only when property, barista and flavor matching found nothing.
    #[default]
    WhenEmpty,
    /// Always, appended after the specific matches.
    Always,
}

/// Which part of the search produced a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep {
    Property,
    Barista,
    Flavor,
    Basic,
    CommonTerm(&'static str),
    /// Fat percentage spelled without the `%` sign, e.g. `3.5` or `3,5`.
    Percentage(String),
}

impl fmt::Display for SearchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property => f.write_str("property"),
            Self::Barista => f.write_str("barista"),
            Self::Flavor => f.write_str("flavor"),
            Self::Basic => f.write_str("basic"),
            Self::CommonTerm(term) => write!(f, "common term '{term}'"),
            Self::Percentage(value) => write!(f, "percentage {value}"),
        }
    }
}

/// A search term in the two spellings the backing view needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTerm {
    /// Trimmed, lowercase, inner whitespace collapsed
    pub lowercase: String,
    /// `lowercase` with spaces turned into underscores
    pub underscored: String,
}

impl NormalizedTerm {
    /// Returns `None` when fewer than [`MIN_QUERY_LEN`] characters remain
    /// once wildcard and quote characters are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowercase = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if sanitize_term(&lowercase).chars().count() < MIN_QUERY_LEN {
            return None;
        }
        let underscored = lowercase.replace(' ', "_");
        Some(Self {
            lowercase,
            underscored,
        })
    }

    pub fn mentions_barista(&self) -> bool {
        self.lowercase.contains(BARISTA_KEYWORD)
    }

    /// The term with the barista keyword removed, if anything is left.
    fn without_barista(&self) -> Option<String> {
        let rest = self
            .lowercase
            .replace(BARISTA_KEYWORD, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        (!rest.is_empty()).then_some(rest)
    }
}

/// Queries for the specific-intent steps, in execution order.
pub fn specific_queries(term: &NormalizedTerm) -> Vec<(SearchStep, Query)> {
    let mut queries = vec![(
        SearchStep::Property,
        base_query().contains(PROPERTY_TEXT_COLUMN, &term.underscored),
    )];

    if term.mentions_barista() {
        let mut query = base_query().is_true("is_barista");
        if let Some(rest) = term.without_barista() {
            query = query.any_contains(&NAME_COLUMNS, &rest);
        }
        queries.push((SearchStep::Barista, query));
    }

    queries.push((
        SearchStep::Flavor,
        base_query().contains(FLAVOR_TEXT_COLUMN, &term.underscored),
    ));
    queries
}

/// Queries for the generic fallback, in execution order.
pub fn fallback_queries(term: &NormalizedTerm) -> Vec<(SearchStep, Query)> {
    let mut queries = vec![(
        SearchStep::Basic,
        base_query().any_contains(&NAME_COLUMNS, &term.lowercase),
    )];

    for (canonical, spellings) in common_terms_in(&term.lowercase) {
        for spelling in spellings {
            if *spelling == term.lowercase {
                continue;
            }
            queries.push((
                SearchStep::CommonTerm(canonical),
                base_query().any_contains(&NAME_COLUMNS, spelling),
            ));
        }
    }

    for variant in percentage_variants(&term.lowercase) {
        queries.push((
            SearchStep::Percentage(variant.clone()),
            base_query().contains("product_name", &variant),
        ));
    }
    queries
}

fn base_query() -> Query {
    Query::new().select(SEARCH_COLUMNS).limit(PAGE_SIZE)
}

/// Vocabulary entries whose spellings appear as a word in `term`.
fn common_terms_in(term: &str) -> Vec<(&'static str, &'static [&'static str])> {
    let words = term.split_whitespace().collect::<Vec<_>>();
    COMMON_TERMS
        .iter()
        .filter(|(_, spellings)| spellings.iter().any(|spelling| words.contains(spelling)))
        .copied()
        .collect()
}

/// "3.5%" or "3,5 %" -> ["3.5", "3,5"]; "1%" -> ["1"].
fn percentage_variants(term: &str) -> Vec<String> {
    let mut variants = Vec::new();
    for captures in PERCENTAGE.captures_iter(term) {
        let whole = &captures[1];
        let candidates = match captures.get(2) {
            Some(fraction) => vec![
                format!("{whole}.{}", fraction.as_str()),
                format!("{whole},{}", fraction.as_str()),
            ],
            None => vec![whole.to_string()],
        };
        for candidate in candidates {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

/// Accumulates results, keeping only the first occurrence of each id.
#[derive(Debug, Default)]
pub struct ResultMerger {
    seen: HashSet<ProductId>,
    results: Vec<SearchResult>,
}

impl ResultMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unseen results and return how many were added.
    pub fn extend(&mut self, results: impl IntoIterator<Item = SearchResult>) -> usize {
        let before = self.results.len();
        for result in results {
            if self.seen.insert(result.id) {
                self.results.push(result);
            }
        }
        self.results.len() - before
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn into_results(self) -> Vec<SearchResult> {
        self.results
    }
}

/// Runs the layered product search against a [`RemoteStore`].
#[derive(Debug)]
pub struct ProductSearch<S> {
    store: Arc<S>,
    policy: FallbackPolicy,
}

impl<S> Clone for ProductSearch<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: RemoteStore> ProductSearch<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self {
            store,
            policy: FallbackPolicy::WhenEmpty,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Search for products; failures are logged and yield an empty list.
    pub async fn search(&self, raw: &str) -> Vec<SearchResult> {
        match self.try_search(raw).await {
            Ok(results) => results,
            Err(error) => {
                tracing::error!("Product search for '{}' failed: {}", raw.trim(), error);
                Vec::new()
            }
        }
    }

    /// Search for products, aborting on the first failed query.
    pub async fn try_search(&self, raw: &str) -> Result<Vec<SearchResult>> {
        let Some(term) = NormalizedTerm::parse(raw) else {
            return Ok(Vec::new());
        };

        let mut merger = ResultMerger::new();
        for (step, query) in specific_queries(&term) {
            self.run_step(&step, &query, &mut merger).await?;
        }

        let run_fallback = match self.policy {
            FallbackPolicy::WhenEmpty => merger.is_empty(),
            FallbackPolicy::Always => true,
        };
        if run_fallback {
            for (step, query) in fallback_queries(&term) {
                self.run_step(&step, &query, &mut merger).await?;
            }
        }

        tracing::debug!(
            "Product search for '{}' returned {} results",
            term.lowercase,
            merger.len()
        );
        Ok(merger.into_results())
    }

    async fn run_step(
        &self,
        step: &SearchStep,
        query: &Query,
        merger: &mut ResultMerger,
    ) -> Result<()> {
        let rows: Vec<ProductSearchRow> = self.store.select(SEARCH_VIEW, query).await?;
        let fetched = rows.len();
        let added = merger.extend(rows.into_iter().map(SearchResult::from));
        tracing::debug!("Search step {}: {} rows, {} new", step, fetched, added);
        Ok(())
    }
}
