//! Query analysis: free text → `{subject, modifiers}` via the active model.

use crate::reply::parse_json_reply;
use cartmatch_core::{Error, MatchingModel, Result, StructuredQuery};
use serde::Deserialize;

pub const SYSTEM_PROMPT: &str = "You analyze grocery shopping-list entries. \
Reply with a single JSON object and nothing else: \
{\"subject\": string, \"modifiers\": [string]}. \
`subject` is the core product noun phrase, lower-case, singular where natural \
(e.g. \"latte\", \"patatine\", \"passata di pomodoro\"). \
`modifiers` are the qualifiers the shopper asked for, in the order given \
(brand, size, flavour, dietary needs such as \"senza lattosio\"). \
Use an empty list when there are none. Never invent qualifiers.";

pub fn user_prompt(text: &str) -> String {
    format!("Shopping-list entry: {}", serde_json::json!(text.trim()))
}

#[derive(Debug, Deserialize)]
struct AnalysisReply {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    modifiers: Vec<String>,
}

/// Parse and normalize an analysis reply. A missing or blank subject is an error.
pub fn parse_analysis(raw: &str) -> Result<StructuredQuery> {
    let r: AnalysisReply = parse_json_reply("analysis", raw)?;
    let subject = r
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::ModelOutput("analysis: missing subject".to_string()))?;
    let modifiers = r
        .modifiers
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    Ok(StructuredQuery { subject, modifiers })
}

/// One analysis attempt. Any failure is logged and reported as `None`.
pub async fn analyze_query(model: &dyn MatchingModel, text: &str) -> Option<StructuredQuery> {
    match model.analyze(text).await {
        Ok(q) if !q.subject.trim().is_empty() => {
            tracing::debug!(
                provider = model.name(),
                subject = %q.subject,
                modifiers = ?q.modifiers,
                "query analyzed"
            );
            Some(q)
        }
        Ok(_) => {
            tracing::warn!(provider = model.name(), item = text, "analysis returned a blank subject");
            None
        }
        Err(e) => {
            tracing::warn!(provider = model.name(), item = text, error = %e, "analysis failed");
            None
        }
    }
}

/// The text handed to lexical retrieval: subject followed by modifiers.
pub fn retrieval_text(q: &StructuredQuery) -> String {
    let mut parts = vec![q.subject.as_str()];
    parts.extend(q.modifiers.iter().map(String::as_str));
    parts.join(" ")
}
