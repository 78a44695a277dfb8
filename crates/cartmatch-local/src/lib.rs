//! Local implementations of the matching pipeline: snapshot-backed catalog, synonym-expanded
//! lexical retrieval, and the model-backed analyze/rerank/score stages.

pub mod analyzer;
pub mod catalog;
pub mod hydrate;
pub mod lexical;
pub mod matcher;
pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod reranker;
pub mod scoring;
pub mod synonyms;

mod env;
mod reply;
#[cfg(test)]
mod testing;

pub use catalog::{CatalogSnapshot, CatalogStore};
pub use lexical::LexicalGenerator;
pub use matcher::{Matcher, DEFAULT_PAGE_SIZE};
pub use provider::{settings_from_env, ProviderRegistry};
pub use scoring::ConfidenceScorer;
pub use synonyms::SynonymTable;
