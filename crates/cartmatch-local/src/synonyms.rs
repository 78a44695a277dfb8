//! Static synonym table used to widen lexical matching.
//!
//! The table is data, not code: a JSON file of synonym groups, where every term in a group is a
//! synonym of every other term. A default file is embedded at build time; deployments can point
//! at their own.

use cartmatch_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN: &str = include_str!("../data/synonyms.json");

#[derive(Debug, Deserialize)]
struct SynonymFile {
    groups: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    map: HashMap<String, Vec<String>>,
}

impl SynonymTable {
    pub fn from_groups<I, G, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for group in groups {
            let mut terms: Vec<String> = Vec::new();
            for t in group {
                let t = t.as_ref().trim().to_lowercase();
                if !t.is_empty() && !terms.contains(&t) {
                    terms.push(t);
                }
            }
            if terms.len() < 2 {
                continue;
            }
            for t in &terms {
                let entry = map.entry(t.clone()).or_default();
                for other in terms.iter().filter(|o| *o != t) {
                    if !entry.contains(other) {
                        entry.push(other.clone());
                    }
                }
            }
        }
        Self { map }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let f: SynonymFile = serde_json::from_str(s)
            .map_err(|e| Error::Config(format!("synonym table: {e}")))?;
        Ok(Self::from_groups(f.groups))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    /// The table shipped in `data/synonyms.json`.
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "embedded synonym table is invalid; using an empty one");
            Self::default()
        })
    }

    /// Synonyms of `term` (lower-cased lookup); empty when it has none.
    pub fn synonyms(&self, term: &str) -> &[String] {
        self.map
            .get(&term.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
