//! Confidence scoring for (query, product) pairs.
//!
//! Two strategies, chosen per call from the shared settings:
//! - heuristic (default): rank position + token overlap + metadata completeness, in [0.70, 0.95]
//! - semantic (opt-in): the model's 0-100 judgement rescaled to [0.30, 0.95], with the heuristic
//!   as the fallback whenever the model call fails

use crate::reply::parse_json_reply;
use cartmatch_core::{
    CatalogProduct, MatchFailure, MatchingModel, Result, SemanticScore, SettingsHandle,
};
use serde::Serialize;

pub const HEURISTIC_MIN: f64 = 0.70;
pub const HEURISTIC_MAX: f64 = 0.95;
pub const SEMANTIC_MIN: f64 = 0.30;
pub const SEMANTIC_MAX: f64 = 0.95;

const BASE: f64 = 0.85;
const POSITION_WEIGHT: f64 = 0.10;
const OVERLAP_WEIGHT: f64 = 0.10;
const BRAND_BONUS: f64 = 0.03;
const PRICE_BONUS: f64 = 0.02;

/// `position` is zero-based within a ranked list of `total` products.
pub fn heuristic_confidence(
    query: &str,
    product: &CatalogProduct,
    position: usize,
    total: usize,
) -> f64 {
    let mut c = BASE;

    if total > 0 {
        let remaining = total.saturating_sub(position) as f64;
        c += remaining / total as f64 * POSITION_WEIGHT;
    }

    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    if !words.is_empty() {
        let name = product.name.to_lowercase();
        let matching = words
            .iter()
            .filter(|w| w.chars().count() > 2 && name.contains(*w))
            .count();
        c += matching as f64 / words.len() as f64 * OVERLAP_WEIGHT;
    }

    if product.brand_str().is_some() {
        c += BRAND_BONUS;
    }
    if product.price.is_some_and(|p| p > 0.0) {
        c += PRICE_BONUS;
    }

    c.clamp(HEURISTIC_MIN, HEURISTIC_MAX)
}

/// Model score (0-100) → confidence. `None` when the score is not a finite number.
pub fn rescale_semantic(score: &SemanticScore) -> Option<f64> {
    score
        .confidence
        .is_finite()
        .then(|| (score.confidence / 100.0).clamp(SEMANTIC_MIN, SEMANTIC_MAX))
}

pub const SEMANTIC_SYSTEM_PROMPT: &str = "You judge how well a supermarket product satisfies a \
shopping-list entry. Consider the product type first, then brand, size, flavour and dietary \
requirements named in the entry. Reply with a single JSON object and nothing else: \
{\"confidence\": integer 0-100, \"reasoning\": short string}. \
100 means exactly what was asked for; 0 means an unrelated product.";

#[derive(Debug, Serialize)]
struct SemanticRequest<'a> {
    query: &'a str,
    product: SemanticProduct<'a>,
}

#[derive(Debug, Serialize)]
struct SemanticProduct<'a> {
    name: &'a str,
    brand: Option<&'a str>,
    category: Option<&'a str>,
    description: Option<&'a str>,
    price: Option<f64>,
}

pub fn semantic_user_prompt(query: &str, product: &CatalogProduct) -> String {
    let req = SemanticRequest {
        query: query.trim(),
        product: SemanticProduct {
            name: &product.name,
            brand: product.brand_str(),
            category: product.category_str(),
            description: product.sales_description.as_deref(),
            price: product.price,
        },
    };
    serde_json::to_string(&req).unwrap_or_else(|_| format!("{query} / {}", product.name))
}

pub fn parse_semantic(raw: &str) -> Result<SemanticScore> {
    parse_json_reply("semantic score", raw)
}

/// Scorer bound to the shared settings; the strategy flag is read on every call.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    settings: SettingsHandle,
}

impl ConfidenceScorer {
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }

    pub async fn score(
        &self,
        model: &dyn MatchingModel,
        query: &str,
        product: &CatalogProduct,
        position: usize,
        total: usize,
    ) -> f64 {
        if !self.settings.current().semantic_scoring {
            return heuristic_confidence(query, product, position, total);
        }
        semantic_confidence(model, query, product, position, total).await
    }
}

pub async fn semantic_confidence(
    model: &dyn MatchingModel,
    query: &str,
    product: &CatalogProduct,
    position: usize,
    total: usize,
) -> f64 {
    let failure = match model.score_semantic(query, product).await {
        Ok(s) => match rescale_semantic(&s) {
            Some(c) => {
                tracing::debug!(
                    provider = model.name(),
                    product = %product.id,
                    confidence = c,
                    reasoning = %s.reasoning,
                    "semantic score"
                );
                return c;
            }
            None => MatchFailure::ScoringFailure(format!("non-finite confidence {}", s.confidence)),
        },
        Err(e) => MatchFailure::ScoringFailure(e.to_string()),
    };
    tracing::warn!(
        provider = model.name(),
        product = %product.id,
        %failure,
        "falling back to heuristic confidence"
    );
    heuristic_confidence(query, product, position, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{product, StubModel};
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn heuristic_components_add_up() {
        let p = product("1", "Latte intero", None, None);
        // 0.85 + (4-2)/4*0.10 + (1/2)*0.10 = 0.95 exactly, then clamped to 0.95.
        assert!(approx(heuristic_confidence("latte fresco", &p, 2, 4), 0.95));
        // Last of ten, no overlap: 0.85 + 0.01
        assert!(approx(heuristic_confidence("ananas", &p, 9, 10), 0.86));
    }

    #[test]
    fn brand_and_price_bonuses() {
        let mut p = product("1", "Yogurt bianco", Some("Muller"), None);
        let without_price = heuristic_confidence("kefir", &p, 9, 10);
        assert!(approx(without_price, 0.89));
        p.price = Some(0.0);
        assert!(approx(heuristic_confidence("kefir", &p, 9, 10), 0.89));
        p.price = Some(1.99);
        assert!(approx(heuristic_confidence("kefir", &p, 9, 10), 0.91));
    }

    #[test]
    fn short_query_words_never_overlap() {
        let p = product("1", "Tè al limone", None, None);
        // "tè" and "al" are too short; only the position bonus applies.
        assert!(approx(heuristic_confidence("tè al", &p, 0, 1), 0.95));
        assert!(approx(heuristic_confidence("tè al", &p, 1, 2), 0.90));
    }

    #[test]
    fn degenerate_inputs_stay_in_range() {
        let p = product("1", "Pane", None, None);
        assert!(approx(heuristic_confidence("", &p, 0, 0), 0.85));
        assert!(approx(heuristic_confidence("pane", &p, 5, 3), 0.95));
    }

    #[test]
    fn semantic_rescaling_clamps() {
        let s = |c: f64| SemanticScore {
            confidence: c,
            reasoning: String::new(),
        };
        assert_eq!(rescale_semantic(&s(80.0)), Some(0.8));
        assert_eq!(rescale_semantic(&s(100.0)), Some(0.95));
        assert_eq!(rescale_semantic(&s(5.0)), Some(0.30));
        assert_eq!(rescale_semantic(&s(-20.0)), Some(0.30));
        assert_eq!(rescale_semantic(&s(f64::NAN)), None);
    }

    #[test]
    fn semantic_prompt_includes_product_detail() {
        let mut p = product("1", "Passata di pomodoro", Some("Mutti"), Some("Conserve"));
        p.sales_description = Some("Passata 700g".to_string());
        p.price = Some(1.59);
        let v: serde_json::Value =
            serde_json::from_str(&semantic_user_prompt(" passata ", &p)).unwrap();
        assert_eq!(v["query"], "passata");
        assert_eq!(v["product"]["brand"], "Mutti");
        assert_eq!(v["product"]["description"], "Passata 700g");
        assert_eq!(v["product"]["price"], 1.59);
    }

    #[test]
    fn parse_semantic_reads_integer_confidence() {
        let s = parse_semantic(r#"{"confidence": 72, "reasoning": "brand differs"}"#).unwrap();
        assert!(approx(s.confidence, 72.0));
        assert_eq!(s.reasoning, "brand differs");
        assert!(parse_semantic(r#"{"reasoning": "no score"}"#).is_err());
    }

    #[tokio::test]
    async fn scorer_reads_the_toggle_on_every_call() {
        let settings = SettingsHandle::default();
        let scorer = ConfidenceScorer::new(settings.clone());
        let model = StubModel::default().semantic(40.0);
        let p = product("1", "Latte intero", None, None);

        let h = scorer.score(&model, "latte", &p, 0, 1).await;
        assert!(h >= HEURISTIC_MIN);
        assert_eq!(model.calls(), 0);

        settings.set_semantic_scoring(true);
        let s = scorer.score(&model, "latte", &p, 0, 1).await;
        assert!(approx(s, 0.40));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn semantic_failure_falls_back_to_heuristic() {
        let model = StubModel::default();
        let p = product("1", "Latte intero", Some("Granarolo"), None);
        let c = semantic_confidence(&model, "latte", &p, 0, 3).await;
        assert!(approx(c, heuristic_confidence("latte", &p, 0, 3)));

        let nan = StubModel::default().semantic(f64::NAN);
        let c = semantic_confidence(&nan, "latte", &p, 2, 3).await;
        assert!(approx(c, heuristic_confidence("latte", &p, 2, 3)));
    }

    proptest! {
        #[test]
        fn heuristic_is_always_in_range(
            query in "[a-z ]{0,40}",
            name in "[A-Za-z ]{1,40}",
            brand in proptest::option::of("[A-Za-z]{0,10}"),
            price in proptest::option::of(-5.0f64..50.0),
            position in 0usize..60,
            total in 0usize..60,
        ) {
            let mut p = product("x", &name, brand.as_deref(), None);
            p.price = price;
            let c = heuristic_confidence(&query, &p, position, total);
            prop_assert!((HEURISTIC_MIN..=HEURISTIC_MAX).contains(&c));
        }

        #[test]
        fn semantic_rescale_is_always_in_range(raw in -1.0e6f64..1.0e6) {
            let c = rescale_semantic(&SemanticScore { confidence: raw, reasoning: String::new() })
                .unwrap();
            prop_assert!((SEMANTIC_MIN..=SEMANTIC_MAX).contains(&c));
        }
    }
}
