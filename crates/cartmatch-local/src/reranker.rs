//! Model-backed reranking of lexical candidates.
//!
//! The model's order is final. This module only cleans the reply (trim, dedupe, cap).

use crate::reply::parse_json_reply;
use cartmatch_core::{MatchingModel, RerankCandidate, Result, StructuredQuery};
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "You rank supermarket products for a shopping-list entry. \
You receive the analyzed entry (subject + modifiers) and a list of candidate products. \
Pick the products that are the entry's subject and satisfy its modifiers, best first. \
Prefer the most direct, natural interpretation of the subject: for \"latte\" a carton of milk \
beats milk chocolate or biscuits made with milk. \
Only use ids from the candidate list, return at most `max_results` of them, \
and reply with a single JSON object and nothing else: {\"product_ids\": [string]}. \
Return an empty list if nothing fits.";

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    subject: &'a str,
    modifiers: &'a [String],
    max_results: usize,
    candidates: &'a [RerankCandidate],
}

pub fn user_prompt(
    query: &StructuredQuery,
    candidates: &[RerankCandidate],
    max_results: usize,
) -> String {
    let req = RerankRequest {
        subject: &query.subject,
        modifiers: &query.modifiers,
        max_results,
        candidates,
    };
    // Serializing plain strings/numbers cannot fail; keep a readable fallback anyway.
    serde_json::to_string(&req).unwrap_or_else(|_| format!("subject: {}", query.subject))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
struct RerankReply {
    #[serde(default)]
    product_ids: Vec<IdValue>,
}

pub fn parse_rerank(raw: &str, max_results: usize) -> Result<Vec<String>> {
    let r: RerankReply = parse_json_reply("rerank", raw)?;
    Ok(clean_ids(
        r.product_ids.into_iter().map(|v| match v {
            IdValue::Text(s) => s,
            IdValue::Number(n) => n.to_string(),
        }),
        max_results,
    ))
}

fn clean_ids(ids: impl IntoIterator<Item = String>, max_results: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        if out.len() >= max_results {
            break;
        }
        let id = id.trim();
        if id.is_empty() || out.iter().any(|x| x == id) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}

/// One rerank attempt. Failures are logged and yield an empty list ("no recommendation").
pub async fn rerank_candidates(
    model: &dyn MatchingModel,
    query: &StructuredQuery,
    candidates: &[RerankCandidate],
    max_results: usize,
) -> Vec<String> {
    if candidates.is_empty() || max_results == 0 {
        return Vec::new();
    }
    match model.rerank(query, candidates, max_results).await {
        Ok(ids) => {
            let ids = clean_ids(ids, max_results);
            tracing::debug!(
                provider = model.name(),
                candidates = candidates.len(),
                returned = ids.len(),
                max_results,
                "rerank complete"
            );
            ids
        }
        Err(e) => {
            tracing::warn!(
                provider = model.name(),
                subject = %query.subject,
                error = %e,
                "rerank failed"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubModel;
    use std::sync::atomic::Ordering;

    fn query() -> StructuredQuery {
        StructuredQuery {
            subject: "latte".to_string(),
            modifiers: vec!["intero".to_string()],
        }
    }

    fn candidates(ids: &[&str]) -> Vec<RerankCandidate> {
        ids.iter()
            .map(|id| RerankCandidate {
                id: id.to_string(),
                name: format!("Prodotto {id}"),
                brand: None,
                category: None,
            })
            .collect()
    }

    #[test]
    fn parse_dedupes_trims_and_caps() {
        let ids = parse_rerank(r#"{"product_ids": [" 3 ", "1", "3", "", 7, "9"]}"#, 3).unwrap();
        assert_eq!(ids, vec!["3", "1", "7"]);
    }

    #[test]
    fn parse_accepts_an_empty_recommendation() {
        assert!(parse_rerank(r#"{"product_ids": []}"#, 5).unwrap().is_empty());
        assert!(parse_rerank(r#"{}"#, 5).unwrap().is_empty());
        assert!(parse_rerank(r#"["1","2"]"#, 5).is_err());
    }

    #[test]
    fn user_prompt_carries_the_window_and_slim_candidates() {
        let p = user_prompt(&query(), &candidates(&["1", "2"]), 8);
        let v: serde_json::Value = serde_json::from_str(&p).unwrap();
        assert_eq!(v["subject"], "latte");
        assert_eq!(v["modifiers"][0], "intero");
        assert_eq!(v["max_results"], 8);
        assert_eq!(v["candidates"].as_array().unwrap().len(), 2);
        assert!(v["candidates"][0].get("brand").is_none());
    }

    #[tokio::test]
    async fn failures_become_an_empty_list() {
        let m = StubModel::understanding("latte");
        let ids = rerank_candidates(&m, &query(), &candidates(&["1"]), 8).await;
        assert!(ids.is_empty());
        assert_eq!(m.calls(), 1);
    }

    #[tokio::test]
    async fn model_order_is_preserved() {
        let m = StubModel::understanding("latte").ranking(&["2", "1", "2", "3"]);
        let ids = rerank_candidates(&m, &query(), &candidates(&["1", "2", "3"]), 8).await;
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(m.last_max_results.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn no_candidates_means_no_call() {
        let m = StubModel::understanding("latte").ranking(&["1"]);
        assert!(rerank_candidates(&m, &query(), &[], 8).await.is_empty());
        assert_eq!(m.calls(), 0);
    }
}
