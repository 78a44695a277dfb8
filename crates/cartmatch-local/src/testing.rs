//! Shared fixtures for unit tests.

use crate::catalog::CatalogSnapshot;
use cartmatch_core::{
    CatalogProduct, Error, MatchingModel, RerankCandidate, Result, SemanticScore,
    StructuredQuery,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn product(
    id: &str,
    name: &str,
    brand: Option<&str>,
    category: Option<&str>,
) -> CatalogProduct {
    CatalogProduct {
        id: id.to_string(),
        name: name.to_string(),
        brand: brand.map(str::to_string),
        category: category.map(str::to_string),
        price: None,
        available: true,
        product_url: None,
        image_url: None,
        sales_description: None,
    }
}

pub(crate) fn snapshot_of(products: Vec<CatalogProduct>) -> CatalogSnapshot {
    CatalogSnapshot::from_parts(products, HashMap::new())
}

/// Scripted model. `None`/empty fields make the corresponding call fail.
#[derive(Default)]
pub(crate) struct StubModel {
    pub(crate) analysis: Option<StructuredQuery>,
    pub(crate) ranked: Vec<String>,
    pub(crate) semantic: Option<f64>,
    pub(crate) calls: AtomicUsize,
    pub(crate) last_max_results: AtomicUsize,
    pub(crate) seen_candidates: Mutex<Vec<String>>,
}

impl StubModel {
    pub(crate) fn understanding(subject: &str) -> Self {
        Self {
            analysis: Some(StructuredQuery {
                subject: subject.to_string(),
                modifiers: Vec::new(),
            }),
            ..Self::default()
        }
    }

    pub(crate) fn ranking(mut self, ids: &[&str]) -> Self {
        self.ranked = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub(crate) fn semantic(mut self, confidence: f64) -> Self {
        self.semantic = Some(confidence);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MatchingModel for StubModel {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn analyze(&self, _text: &str) -> Result<StructuredQuery> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.analysis
            .clone()
            .ok_or_else(|| Error::Llm("stub: analysis unavailable".to_string()))
    }

    async fn rerank(
        &self,
        _query: &StructuredQuery,
        candidates: &[RerankCandidate],
        max_results: usize,
    ) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_max_results.store(max_results, Ordering::SeqCst);
        if let Ok(mut g) = self.seen_candidates.lock() {
            *g = candidates.iter().map(|c| c.id.clone()).collect();
        }
        if self.ranked.is_empty() {
            return Err(Error::Llm("stub: rerank unavailable".to_string()));
        }
        Ok(self.ranked.iter().take(max_results).cloned().collect())
    }

    async fn score_semantic(
        &self,
        _query: &str,
        _product: &CatalogProduct,
    ) -> Result<SemanticScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.semantic
            .map(|confidence| SemanticScore {
                confidence,
                reasoning: "stub".to_string(),
            })
            .ok_or_else(|| Error::Llm("stub: scoring unavailable".to_string()))
    }
}
