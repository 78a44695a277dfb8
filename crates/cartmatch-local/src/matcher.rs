//! End-to-end matching of shopping-list items to catalog products.
//!
//! Per item, strictly in order:
//! catalog check → analyze → lexical retrieve → rerank (over-fetch) → paginate → hydrate + score.
//!
//! Every stage fails soft: the item yields an empty (or shorter) list and the reason is logged.
//! Nothing here returns an error to the caller. The matcher keeps no state between calls;
//! "load more" is the same call with a larger `skip`.

use crate::analyzer::{analyze_query, retrieval_text};
use crate::catalog::CatalogStore;
use crate::hydrate;
use crate::lexical::LexicalGenerator;
use crate::provider::ProviderRegistry;
use crate::reranker::rerank_candidates;
use crate::scoring::ConfidenceScorer;
use cartmatch_core::{
    CatalogProduct, CatalogStats, EcommerceMatch, MatchFailure, RerankCandidate, SettingsHandle,
};
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 3;
/// Extra reranked ids requested past the page window.
pub const RERANK_BUFFER: usize = 5;

#[derive(Debug)]
pub struct Matcher {
    catalog: Arc<CatalogStore>,
    lexical: LexicalGenerator,
    models: ProviderRegistry,
    settings: SettingsHandle,
    scorer: ConfidenceScorer,
}

impl Matcher {
    pub fn new(
        catalog: Arc<CatalogStore>,
        lexical: LexicalGenerator,
        models: ProviderRegistry,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            catalog,
            lexical,
            models,
            scorer: ConfidenceScorer::new(settings.clone()),
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Exact lookup (e.g. a scanned barcode); bypasses the matching pipeline.
    pub fn find_product_by_id(&self, id: &str) -> Option<CatalogProduct> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        self.catalog.find_by_id(id)
    }

    pub fn catalog_stats(&self) -> CatalogStats {
        self.catalog.stats()
    }

    /// Match each item in turn (no fan-out) with the default page size.
    pub async fn match_items<S: AsRef<str>>(
        &self,
        items: &[S],
        platform: &str,
        skip: usize,
    ) -> Vec<EcommerceMatch> {
        self.match_items_paged(items, platform, skip, DEFAULT_PAGE_SIZE)
            .await
    }

    /// Like [`Matcher::match_items`] with an explicit page size per item.
    pub async fn match_items_paged<S: AsRef<str>>(
        &self,
        items: &[S],
        platform: &str,
        skip: usize,
        page_size: usize,
    ) -> Vec<EcommerceMatch> {
        let mut out = Vec::new();
        for item in items {
            out.extend(
                self.match_item(item.as_ref(), platform, skip, page_size)
                    .await,
            );
        }
        out
    }

    pub async fn match_item(
        &self,
        item_name: &str,
        platform: &str,
        skip: usize,
        page_size: usize,
    ) -> Vec<EcommerceMatch> {
        match self.try_match_item(item_name, platform, skip, page_size).await {
            Ok(matches) => {
                tracing::info!(
                    item = item_name,
                    platform,
                    skip,
                    page_size,
                    returned = matches.len(),
                    "item matched"
                );
                matches
            }
            Err(failure) => {
                tracing::warn!(item = item_name, platform, skip, %failure, "no matches for item");
                Vec::new()
            }
        }
    }

    async fn try_match_item(
        &self,
        item_name: &str,
        platform: &str,
        skip: usize,
        page_size: usize,
    ) -> Result<Vec<EcommerceMatch>, MatchFailure> {
        let item = item_name.trim();
        if item.is_empty() {
            return Err(MatchFailure::EmptyItem);
        }
        if page_size == 0 {
            return Ok(Vec::new());
        }

        let snapshot = self.catalog.snapshot();
        if snapshot.is_empty() {
            return Err(MatchFailure::CatalogUnavailable);
        }

        let settings = self.settings.current();
        let model = self
            .models
            .get(settings.provider)
            .ok_or(MatchFailure::ProviderUnavailable(settings.provider))?;

        let query = analyze_query(model.as_ref(), item)
            .await
            .ok_or(MatchFailure::AnalysisFailure)?;

        let rerank_input: Vec<RerankCandidate> = self
            .lexical
            .candidates(&snapshot, &retrieval_text(&query))
            .iter()
            .map(RerankCandidate::from)
            .collect();
        if rerank_input.is_empty() {
            return Err(MatchFailure::RetrievalEmpty);
        }
        tracing::debug!(item, candidates = rerank_input.len(), "lexical candidates");

        let max_results = skip.saturating_add(page_size).saturating_add(RERANK_BUFFER);
        let ranked = rerank_candidates(model.as_ref(), &query, &rerank_input, max_results).await;
        if ranked.is_empty() {
            return Err(MatchFailure::RerankFailure);
        }

        let total = ranked.len();
        let mut out = Vec::new();
        for (position, id) in ranked.iter().enumerate().skip(skip).take(page_size) {
            // Hydrate from the snapshot retrieval ran against, not whatever is live now.
            let Some(product) = snapshot.get(id) else {
                let miss = MatchFailure::HydrationMiss(id.clone());
                tracing::warn!(item, %miss, "skipping reranked id");
                continue;
            };
            let confidence = self
                .scorer
                .score(model.as_ref(), item, product, position, total)
                .await;
            out.push(hydrate::to_match(item_name, platform, product, confidence));
        }
        Ok(out)
    }
}
