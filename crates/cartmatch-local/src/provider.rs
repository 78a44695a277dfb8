//! Provider selection: which `MatchingModel` answers a call, and the env-driven settings that
//! pick it.

use crate::env::{env, env_bool, env_u64};
use crate::ollama::OllamaClient;
use crate::openai_compat::OpenAiCompatClient;
use cartmatch_core::{MatchSettings, MatchingModel, ProviderKind, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 20_000;

/// Per-request model timeout. Unbounded requests can hang a whole batch, so keep a cap even
/// when the configured value is huge.
pub fn llm_timeout_ms_from_env() -> u64 {
    env_u64("CARTMATCH_LLM_TIMEOUT_MS")
        .unwrap_or(DEFAULT_LLM_TIMEOUT_MS)
        .clamp(1_000, 120_000)
}

pub fn settings_from_env() -> Result<MatchSettings> {
    let provider = match env("CARTMATCH_AI_PROVIDER") {
        Some(s) => s.parse::<ProviderKind>()?,
        None => ProviderKind::default(),
    };
    Ok(MatchSettings {
        semantic_scoring: env_bool("CARTMATCH_SEMANTIC_SCORING"),
        provider,
    })
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    models: BTreeMap<ProviderKind, Arc<dyn MatchingModel>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("configured", &self.configured())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ProviderKind, model: Arc<dyn MatchingModel>) -> Self {
        self.insert(kind, model);
        self
    }

    pub fn insert(&mut self, kind: ProviderKind, model: Arc<dyn MatchingModel>) {
        self.models.insert(kind, model);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn MatchingModel>> {
        self.models.get(&kind).cloned()
    }

    pub fn configured(&self) -> Vec<ProviderKind> {
        self.models.keys().copied().collect()
    }

    /// Register every provider whose env configuration is complete. Missing configuration is
    /// not an error here; the matcher reports it when that provider is selected.
    pub fn from_env(client: reqwest::Client) -> Self {
        let mut reg = Self::new();
        match OpenAiCompatClient::from_env(client.clone(), None) {
            Ok(c) => reg.insert(ProviderKind::OpenAiCompat, Arc::new(c)),
            Err(e) => tracing::debug!(error = %e, "openai_compat provider not registered"),
        }
        match OllamaClient::from_env(client) {
            Ok(c) => reg.insert(ProviderKind::Ollama, Arc::new(c)),
            Err(e) => tracing::debug!(error = %e, "ollama provider not registered"),
        }
        reg
    }
}
