//! Lexical candidate generation: a heuristic stand-in for embedding retrieval.
//!
//! This module is:
//! - **offline**: no network calls
//! - **deterministic**: a pure function of (query, snapshot, synonym table)
//!
//! The weights below are fixed; changing them changes which products reach the reranker.

use crate::catalog::{CatalogSnapshot, SearchFields};
use crate::synonyms::SynonymTable;
use cartmatch_core::MatchCandidate;

pub const DEFAULT_CANDIDATE_LIMIT: usize = 50;

const W_TOKEN_ANY: f64 = 2.0;
const W_TOKEN_NAME: f64 = 1.0;
const W_EXPANDED_ANY: f64 = 0.8;
const W_EXPANDED_NAME: f64 = 0.5;
const W_CATEGORY_SYNONYM: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct LexicalGenerator {
    synonyms: SynonymTable,
    limit: usize,
}

/// Tokens derived once per query.
struct QueryTerms<'s> {
    original: Vec<String>,
    // originals ∪ synonyms, first-seen order, only terms longer than two chars
    expanded: Vec<String>,
    // synonyms of each original token, with repeats
    token_synonyms: Vec<&'s str>,
}

impl LexicalGenerator {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self {
            synonyms,
            limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    fn terms(&self, query: &str) -> QueryTerms<'_> {
        let original: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut expanded: Vec<String> = Vec::new();
        let mut token_synonyms: Vec<&str> = Vec::new();
        for t in &original {
            if !expanded.contains(t) {
                expanded.push(t.clone());
            }
            for s in self.synonyms.synonyms(t) {
                token_synonyms.push(s.as_str());
                if !expanded.contains(s) {
                    expanded.push(s.clone());
                }
            }
        }
        expanded.retain(|t| t.chars().count() > 2);

        QueryTerms {
            original,
            expanded,
            token_synonyms,
        }
    }

    fn score(terms: &QueryTerms<'_>, f: &SearchFields) -> f64 {
        let combined = format!("{} {} {}", f.name, f.brand, f.category);
        let mut score = 0.0;
        for t in &terms.original {
            if combined.contains(t.as_str()) {
                score += W_TOKEN_ANY;
            }
            if f.name.contains(t.as_str()) {
                score += W_TOKEN_NAME;
            }
        }
        for t in &terms.expanded {
            if combined.contains(t.as_str()) {
                score += W_EXPANDED_ANY;
            }
            if f.name.contains(t.as_str()) {
                score += W_EXPANDED_NAME;
            }
        }
        if !f.category.is_empty() {
            for s in &terms.token_synonyms {
                if f.category.contains(s) {
                    score += W_CATEGORY_SYNONYM;
                }
            }
        }
        score
    }

    /// Top-`limit` products by lexical score, best first. Ties keep catalog order.
    pub fn candidates<'a>(
        &self,
        snapshot: &'a CatalogSnapshot,
        query: &str,
    ) -> Vec<MatchCandidate<'a>> {
        if snapshot.is_empty() {
            return Vec::new();
        }
        let terms = self.terms(query);
        if terms.original.is_empty() {
            return Vec::new();
        }

        let mut out: Vec<MatchCandidate<'a>> = snapshot
            .scan()
            .filter_map(|(product, fields)| {
                let score = Self::score(&terms, fields);
                (score > 0.0).then_some(MatchCandidate { product, score })
            })
            .collect();

        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out.truncate(self.limit);
        out
    }
}
