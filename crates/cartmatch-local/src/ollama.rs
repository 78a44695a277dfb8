use crate::env::{env, env_bool};
use crate::{analyzer, reranker, scoring};
use cartmatch_core::{
    CatalogProduct, Error, MatchingModel, RerankCandidate, Result, SemanticScore,
    StructuredQuery,
};
use serde::{Deserialize, Serialize};

pub fn is_configured_in_env() -> bool {
    env_bool("CARTMATCH_OLLAMA_ENABLE")
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_ms: u64,
}

impl OllamaClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            timeout_ms: crate::provider::DEFAULT_LLM_TIMEOUT_MS,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        // Opt-in: don't start calling localhost unless asked to.
        if !is_configured_in_env() {
            return Err(Error::NotConfigured(
                "CARTMATCH_OLLAMA_ENABLE is not set (or false)".to_string(),
            ));
        }
        let base_url = env("CARTMATCH_OLLAMA_BASE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:11434".to_string());
        // Small instruction-tuned default; override with what is installed locally.
        let model =
            env("CARTMATCH_OLLAMA_MODEL").unwrap_or_else(|| "qwen2.5:3b-instruct".to_string());
        Ok(Self::new(client, base_url, model)
            .with_timeout_ms(crate::provider::llm_timeout_ms_from_env()))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint_chat(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One non-streaming chat call with `format: "json"`.
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            format: Some("json".to_string()),
            options: Some(ChatOptions { temperature: 0.0 }),
            stream: Some(false),
        };

        let resp = self
            .client
            .post(self.endpoint_chat())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("ollama chat HTTP {status}")));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

#[async_trait::async_trait]
impl MatchingModel for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn analyze(&self, text: &str) -> Result<StructuredQuery> {
        let raw = self
            .chat_json(analyzer::SYSTEM_PROMPT, &analyzer::user_prompt(text))
            .await?;
        analyzer::parse_analysis(&raw)
    }

    async fn rerank(
        &self,
        query: &StructuredQuery,
        candidates: &[RerankCandidate],
        max_results: usize,
    ) -> Result<Vec<String>> {
        let user = reranker::user_prompt(query, candidates, max_results);
        let raw = self.chat_json(reranker::SYSTEM_PROMPT, &user).await?;
        reranker::parse_rerank(&raw, max_results)
    }

    async fn score_semantic(
        &self,
        query: &str,
        product: &CatalogProduct,
    ) -> Result<SemanticScore> {
        let user = scoring::semantic_user_prompt(query, product);
        let raw = self
            .chat_json(scoring::SEMANTIC_SYSTEM_PROMPT, &user)
            .await?;
        scoring::parse_semantic(&raw)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}
