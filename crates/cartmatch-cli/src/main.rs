use anyhow::{Context, Result};
use cartmatch_core::{ProviderKind, SettingsHandle};
use cartmatch_local::lexical::LexicalGenerator;
use cartmatch_local::synonyms::SynonymTable;
use cartmatch_local::{CatalogStore, Matcher, ProviderRegistry, DEFAULT_PAGE_SIZE};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cartmatch")]
#[command(about = "Match shopping-list items to catalog products", long_about = None)]
struct Cli {
    /// Directory holding `products_by_id.json` and `id_to_index.json`.
    #[arg(long, global = true, env = "CARTMATCH_CATALOG_DIR")]
    catalog_dir: Option<PathBuf>,
    /// Synonym groups file (json); the built-in table is used when unset.
    #[arg(long, global = true, env = "CARTMATCH_SYNONYMS_PATH")]
    synonyms: Option<PathBuf>,
    /// AI provider. Allowed: openai_compat, ollama
    #[arg(long, global = true, env = "CARTMATCH_AI_PROVIDER")]
    provider: Option<String>,
    /// Use model-backed confidence scoring (falls back to the heuristic per product).
    #[arg(long, global = true, env = "CARTMATCH_SEMANTIC_SCORING", value_parser = parse_flag)]
    semantic_scoring: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match one or more items (json array of matches on stdout).
    Match(MatchCmd),
    /// Look up a single product by id (json, `null` when unknown).
    Lookup(LookupCmd),
    /// Print catalog stats (json).
    Stats,
    /// Diagnose configuration (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct MatchCmd {
    /// Storefront the URLs are built for.
    #[arg(long, default_value = "carrefour")]
    platform: String,
    /// Ranked matches to skip per item ("load more").
    #[arg(long, default_value_t = 0)]
    skip: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Shopping-list entries, e.g. "latte parzialmente scremato".
    #[arg(required = true)]
    items: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct LookupCmd {
    id: String,
}

fn parse_flag(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got {other:?}")),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Opt-in `KEY=VALUE` loader (CARTMATCH_ENV_FILE). Never overrides the process env and never
/// logs values.
fn load_env_file() {
    let Some(p) = std::env::var("CARTMATCH_ENV_FILE")
        .ok()
        .filter(|p| !p.trim().is_empty())
    else {
        return;
    };
    let Ok(txt) = std::fs::read_to_string(p.trim()) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

fn default_catalog_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cartmatch")
        .join("catalog")
}

fn load_synonyms(path: Option<&Path>) -> Result<SynonymTable> {
    match path {
        Some(p) => SynonymTable::from_path(p)
            .with_context(|| format!("loading synonyms from {}", p.display())),
        None => Ok(SynonymTable::builtin()),
    }
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();
    init_tracing();

    if matches!(cli.command, Commands::Version) {
        let v = serde_json::json!({
            "schema_version": 1,
            "name": "cartmatch",
            "version": env!("CARGO_PKG_VERSION"),
        });
        println!("{v}");
        return Ok(());
    }

    let mut settings = cartmatch_local::settings_from_env().context("reading settings")?;
    if let Some(p) = &cli.provider {
        settings.provider = p.parse::<ProviderKind>()?;
    }
    if let Some(on) = cli.semantic_scoring {
        settings.semantic_scoring = on;
    }

    let catalog_dir = cli.catalog_dir.clone().unwrap_or_else(default_catalog_dir);
    let catalog = Arc::new(CatalogStore::new(&catalog_dir));
    if !catalog.load() {
        tracing::warn!(dir = %catalog_dir.display(), "catalog unavailable; matches will be empty");
    }

    match cli.command {
        Commands::Version => {}
        Commands::Stats => {
            println!("{}", serde_json::to_string(&catalog.stats())?);
        }
        Commands::Lookup(args) => {
            let id = args.id.trim();
            let product = if id.is_empty() {
                None
            } else {
                catalog.find_by_id(id)
            };
            println!("{}", serde_json::to_string(&product)?);
        }
        Commands::Doctor => {
            let models = ProviderRegistry::from_env(reqwest::Client::new());
            let configured = models.configured();
            let synonyms_ok = load_synonyms(cli.synonyms.as_deref()).is_ok();
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "name": "cartmatch",
                "version": env!("CARGO_PKG_VERSION"),
                "ok": catalog.is_available() && configured.contains(&settings.provider) && synonyms_ok,
                "configured": {
                    "catalog_dir": catalog_dir.to_string_lossy().to_string(),
                    "synonyms_custom": cli.synonyms.is_some(),
                    "synonyms_ok": synonyms_ok,
                    "provider": settings.provider,
                    "semantic_scoring": settings.semantic_scoring,
                    "llm": {
                        "openai_compat": configured.contains(&ProviderKind::OpenAiCompat),
                        "openai_compat_api_key": has_env("CARTMATCH_OPENAI_COMPAT_API_KEY"),
                        "ollama": configured.contains(&ProviderKind::Ollama),
                    },
                },
                "catalog": catalog.stats(),
            });
            println!("{payload}");
        }
        Commands::Match(args) => {
            let synonyms = load_synonyms(cli.synonyms.as_deref())?;
            let client = reqwest::Client::builder()
                .build()
                .context("building http client")?;
            let matcher = Matcher::new(
                catalog,
                LexicalGenerator::new(synonyms),
                ProviderRegistry::from_env(client),
                SettingsHandle::new(settings),
            );

            tracing::debug!(
                items = args.items.len(),
                provider = %settings.provider,
                semantic_scoring = settings.semantic_scoring,
                "matching"
            );
            let out = matcher
                .match_items_paged(&args.items, &args.platform, args.skip, args.page_size)
                .await;
            println!("{}", serde_json::to_string(&out)?);
        }
    }
    Ok(())
}
