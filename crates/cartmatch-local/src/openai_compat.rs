use crate::env::env;
use crate::{analyzer, reranker, scoring};
use cartmatch_core::{
    CatalogProduct, Error, MatchingModel, RerankCandidate, Result, SemanticScore,
    StructuredQuery,
};
use serde::{Deserialize, Serialize};

fn openai_compat_base_url_from_env() -> Option<String> {
    env("CARTMATCH_OPENAI_COMPAT_BASE_URL")
}

fn openai_compat_api_key_from_env() -> Option<String> {
    env("CARTMATCH_OPENAI_COMPAT_API_KEY")
}

fn openai_compat_model_from_env() -> Option<String> {
    env("CARTMATCH_OPENAI_COMPAT_MODEL")
}

pub fn is_configured_in_env() -> bool {
    openai_compat_base_url_from_env().is_some() && openai_compat_model_from_env().is_some()
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            timeout_ms: crate::provider::DEFAULT_LLM_TIMEOUT_MS,
        }
    }

    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let base_url = openai_compat_base_url_from_env().ok_or_else(|| {
            Error::NotConfigured("missing CARTMATCH_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        let api_key = openai_compat_api_key_from_env();

        let model = model_override
            .or_else(openai_compat_model_from_env)
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing model for openai_compat (set CARTMATCH_OPENAI_COMPAT_MODEL)"
                        .to_string(),
                )
            })?;

        Ok(Self::new(client, base_url, api_key, model)
            .with_timeout_ms(crate::provider::llm_timeout_ms_from_env()))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    /// One chat completion in JSON mode; returns the assistant message text.
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(0.0),
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "openai_compat chat.completions HTTP {status}"
            )));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ModelOutput("openai_compat: no message content".to_string()))
    }
}

#[async_trait::async_trait]
impl MatchingModel for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
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
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
