use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("malformed model output: {0}")]
    ModelOutput(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single item produced no (or fewer) matches.
///
/// None of these cross the matcher boundary: they are logged and the item degrades to an
/// empty result. They exist so each stage reports one typed reason.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    #[error("item name is empty")]
    EmptyItem,
    #[error("catalog unavailable")]
    CatalogUnavailable,
    #[error("no model configured for provider {0}")]
    ProviderUnavailable(ProviderKind),
    #[error("could not understand the query")]
    AnalysisFailure,
    #[error("no lexical candidates")]
    RetrievalEmpty,
    #[error("reranker returned no products")]
    RerankFailure,
    #[error("semantic scoring failed: {0}")]
    ScoringFailure(String),
    #[error("product {0} no longer in catalog")]
    HydrationMiss(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub available: bool,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub sales_description: Option<String>,
}

impl CatalogProduct {
    /// Brand, if present and not blank.
    pub fn brand_str(&self) -> Option<&str> {
        self.brand.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn category_str(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Analyzer output: the core noun phrase plus its qualifiers, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub subject: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// A lexical hit. Borrowed from the snapshot it was scored against.
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate<'a> {
    pub product: &'a CatalogProduct,
    pub score: f64,
}

/// The reduced product shape sent to the reranker (keeps prompts small).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RerankCandidate {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl From<&MatchCandidate<'_>> for RerankCandidate {
    fn from(c: &MatchCandidate<'_>) -> Self {
        Self {
            id: c.product.id.clone(),
            name: c.product.name.clone(),
            brand: c.product.brand_str().map(str::to_string),
            category: c.product.category_str().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcommerceMatch {
    pub original_item: String,
    pub matched_product: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub description: Option<String>,
    pub image_url: String,
    pub product_url: String,
    pub confidence: f64,
    pub product_id: Option<String>,
    pub platform: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub product_count: usize,
    pub index_count: usize,
    pub is_available: bool,
}

/// Semantic scorer reply. `confidence` is on the model's 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticScore {
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai_compat")]
    OpenAiCompat,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAiCompat => "openai_compat",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai_compat" | "openai-compat" | "openai" => Ok(Self::OpenAiCompat),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::Config(format!("unknown ai provider: {other:?}"))),
        }
    }
}

/// Process-wide knobs that an admin surface may flip at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Use the model-backed confidence scorer instead of the positional heuristic.
    pub semantic_scoring: bool,
    /// Which registered model answers analyze/rerank/score calls.
    pub provider: ProviderKind,
}

/// Shared, mutable settings. Clones observe each other's writes; readers take a copy per call,
/// so a change applies to the next call and never to one already running.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<MatchSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: MatchSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn current(&self) -> MatchSettings {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update(&self, f: impl FnOnce(&mut MatchSettings)) {
        let mut g = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut g);
    }

    pub fn set_semantic_scoring(&self, enabled: bool) {
        self.update(|s| s.semantic_scoring = enabled);
    }

    pub fn set_provider(&self, provider: ProviderKind) {
        self.update(|s| s.provider = provider);
    }
}

/// The one capability contract every AI provider implements.
///
/// Implementations make a single attempt per call and surface failures as `Err`; deciding what a
/// failure means for the match is the caller's job.
#[async_trait::async_trait]
pub trait MatchingModel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, text: &str) -> Result<StructuredQuery>;

    async fn rerank(
        &self,
        query: &StructuredQuery,
        candidates: &[RerankCandidate],
        max_results: usize,
    ) -> Result<Vec<String>>;

    async fn score_semantic(&self, query: &str, product: &CatalogProduct)
        -> Result<SemanticScore>;
}
