//! In-memory catalog snapshot, loaded from two JSON files written by the indexing job:
//!
//! - `products_by_id.json`: `{ "<id>": { "product_details": { "nome", "marca", ... } } }`
//! - `id_to_index.json`: `{ "<id>": <position> }`
//!
//! Readers take an `Arc<CatalogSnapshot>` and never see a half-built map: a reload builds the
//! next snapshot off to the side and publishes it with one pointer swap.

use cartmatch_core::{CatalogProduct, CatalogStats, Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const PRODUCTS_FILE: &str = "products_by_id.json";
pub const INDEX_FILE: &str = "id_to_index.json";

/// Lower-cased text the lexical scan matches against, computed once per snapshot.
#[derive(Debug, Clone, Default)]
pub(crate) struct SearchFields {
    pub(crate) name: String,
    pub(crate) brand: String,
    pub(crate) category: String,
}

impl SearchFields {
    fn of(p: &CatalogProduct) -> Self {
        Self {
            name: p.name.to_lowercase(),
            brand: p.brand.as_deref().unwrap_or("").to_lowercase(),
            category: p.category.as_deref().unwrap_or("").to_lowercase(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    // Scan order: ascending position, then products without one, by id.
    products: Vec<CatalogProduct>,
    fields: Vec<SearchFields>,
    by_id: HashMap<String, usize>,
    positions: HashMap<String, u64>,
}

impl CatalogSnapshot {
    pub fn from_parts(products: Vec<CatalogProduct>, positions: HashMap<String, u64>) -> Self {
        let mut products = products;
        products.sort_by(|a, b| {
            let pa = positions.get(&a.id);
            let pb = positions.get(&b.id);
            pa.is_none()
                .cmp(&pb.is_none())
                .then_with(|| pa.cmp(&pb))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut kept: Vec<CatalogProduct> = Vec::with_capacity(products.len());
        let mut by_id = HashMap::with_capacity(products.len());
        for p in products {
            if by_id.contains_key(&p.id) {
                tracing::debug!(id = %p.id, "duplicate product id in snapshot; keeping first");
                continue;
            }
            by_id.insert(p.id.clone(), kept.len());
            kept.push(p);
        }
        let fields = kept.iter().map(SearchFields::of).collect();

        Self {
            products: kept,
            fields,
            by_id,
            positions,
        }
    }

    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    pub(crate) fn scan(&self) -> impl Iterator<Item = (&CatalogProduct, &SearchFields)> {
        self.products.iter().zip(self.fields.iter())
    }

    pub fn get(&self, id: &str) -> Option<&CatalogProduct> {
        self.by_id.get(id).map(|&i| &self.products[i])
    }

    pub fn position(&self, id: &str) -> Option<u64> {
        self.positions.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn index_count(&self) -> usize {
        self.positions.len()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            product_count: self.len(),
            index_count: self.index_count(),
            is_available: !self.is_empty(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    product_details: RawDetails,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    marca: Option<String>,
    #[serde(default)]
    categoria: Option<String>,
    #[serde(default)]
    prezzo: Option<serde_json::Value>,
    #[serde(default)]
    disponibile: Option<serde_json::Value>,
    #[serde(default)]
    product_url: Option<String>,
    #[serde(default)]
    immagine_url: Option<String>,
    #[serde(default)]
    denom_vendita: Option<String>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn id_from_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => non_blank(Some(s.clone())),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers or numeric strings (a decimal comma is accepted). Non-positive means "no price".
pub(crate) fn parse_price(v: &serde_json::Value) -> Option<f64> {
    let p = match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }?;
    (p.is_finite() && p > 0.0).then_some(p)
}

fn parse_available(v: Option<&serde_json::Value>) -> bool {
    match v {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|x| x != 0.0).unwrap_or(true),
        Some(serde_json::Value::String(s)) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "false" | "no" | "0" | "n"
        ),
        _ => true,
    }
}

fn product_from_entry(key: &str, v: serde_json::Value) -> Option<CatalogProduct> {
    let entry: RawEntry = match serde_json::from_value(v) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(key, error = %e, "skipping malformed catalog entry");
            return None;
        }
    };
    let d = entry.product_details;
    let Some(name) = non_blank(d.nome) else {
        tracing::debug!(key, "skipping catalog entry without a name");
        return None;
    };
    let id = d
        .id
        .as_ref()
        .and_then(id_from_value)
        .or_else(|| non_blank(Some(key.to_string())))?;
    Some(CatalogProduct {
        id,
        name,
        brand: non_blank(d.marca),
        category: non_blank(d.categoria),
        price: d.prezzo.as_ref().and_then(parse_price),
        available: parse_available(d.disponibile.as_ref()),
        product_url: non_blank(d.product_url),
        image_url: non_blank(d.immagine_url),
        sales_description: non_blank(d.denom_vendita),
    })
}

fn read_json_map(path: &Path) -> Result<Option<BTreeMap<String, serde_json::Value>>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "catalog file not present");
        return Ok(None);
    }
    let bytes =
        fs::read(path).map_err(|e| Error::Catalog(format!("{}: {e}", path.display())))?;
    let map = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Catalog(format!("{}: {e}", path.display())))?;
    Ok(Some(map))
}

/// Parse both snapshot files. Missing files contribute nothing; unreadable ones are an error.
pub fn read_snapshot(products_path: &Path, index_path: &Path) -> Result<CatalogSnapshot> {
    let mut products = Vec::new();
    if let Some(raw) = read_json_map(products_path)? {
        products.reserve(raw.len());
        for (key, v) in raw {
            if let Some(p) = product_from_entry(&key, v) {
                products.push(p);
            }
        }
    }

    let mut positions = HashMap::new();
    if let Some(raw) = read_json_map(index_path)? {
        for (key, v) in raw {
            if let Some(pos) = v.as_u64() {
                positions.insert(key, pos);
            }
        }
    }

    Ok(CatalogSnapshot::from_parts(products, positions))
}

#[derive(Debug)]
pub struct CatalogStore {
    products_path: PathBuf,
    index_path: PathBuf,
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogStore {
    /// Store over `<dir>/products_by_id.json` and `<dir>/id_to_index.json`. Starts empty.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::with_paths(dir.join(PRODUCTS_FILE), dir.join(INDEX_FILE))
    }

    pub fn with_paths(products_path: PathBuf, index_path: PathBuf) -> Self {
        Self {
            products_path,
            index_path,
            current: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    /// A store pre-populated with `snapshot` (no backing files).
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let store = Self::with_paths(PathBuf::new(), PathBuf::new());
        store.publish(snapshot);
        store
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn publish(&self, next: CatalogSnapshot) {
        let mut g = self.current.write().unwrap_or_else(|e| e.into_inner());
        *g = Arc::new(next);
    }

    /// Read both files and publish the result. On a read/parse error the previous snapshot
    /// stays in place. Returns whether the store is available afterwards.
    pub fn load(&self) -> bool {
        match read_snapshot(&self.products_path, &self.index_path) {
            Ok(next) => {
                tracing::info!(
                    products = next.len(),
                    index = next.index_count(),
                    "catalog snapshot loaded"
                );
                self.publish(next);
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog load failed; keeping previous snapshot");
            }
        }
        self.is_available()
    }

    /// No-op when already populated; otherwise `load()`.
    pub fn reload(&self) -> bool {
        if self.is_available() {
            return true;
        }
        self.load()
    }

    /// Forced rebuild. The new snapshot replaces the current one only if it holds products.
    pub fn refresh(&self) -> bool {
        match read_snapshot(&self.products_path, &self.index_path) {
            Ok(next) if !next.is_empty() => {
                tracing::info!(products = next.len(), "catalog snapshot refreshed");
                self.publish(next);
            }
            Ok(_) => {
                tracing::warn!("catalog refresh produced no products; keeping previous snapshot");
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog refresh failed; keeping previous snapshot");
            }
        }
        self.is_available()
    }

    pub fn is_available(&self) -> bool {
        !self.snapshot().is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<CatalogProduct> {
        self.snapshot().get(id.trim()).cloned()
    }

    pub fn stats(&self) -> CatalogStats {
        self.snapshot().stats()
    }
}
