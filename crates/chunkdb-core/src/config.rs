//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nesting levels, e.g.
//! `APP_SEARCH__DEFAULT_LIMIT=10`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::DEFAULT_FIXED_SIZE;
use crate::error::{Error, Result};
use crate::types::{ChunkingMethod, DistanceMetric, FusionWeights, SearchMethod};

pub struct Config {
    figment: Figment,
    env: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env: env_name };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment, env: "custom".to_string() } }

    pub fn env(&self) -> &str { &self.env }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Like [`Config::get`], but a key that is absent yields `default`.
    /// A present value of the wrong type is still an error.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(default) }
    }

    pub fn engine(&self) -> Result<EngineConfig> {
        let engine: EngineConfig = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        engine.validate()?;
        Ok(engine)
    }

    /// The declared table layout, or [`TableConfig::default`] when none is configured.
    /// A declared layout is taken as written: omitted optional columns are absent.
    pub fn table(&self) -> Result<TableConfig> {
        if self.figment.contains("table") { self.get("table") } else { Ok(TableConfig::default()) }
    }

    fn validate_for_env(&self) -> Result<()> {
        self.engine()?;
        let table = self.table()?;
        if table.table_name.trim().is_empty() {
            return Err(Error::InvalidConfig("table.table_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Engine-wide defaults; every search and ingestion option can override them per call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub timeouts: TimeoutConfig,
    pub ingest: IngestConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.embedding.model.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.model must not be empty".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(Error::InvalidConfig("embedding.dimensions must be positive".into()));
        }
        if self.chunking.fixed_size == 0 {
            return Err(Error::InvalidConfig("chunking.fixed_size must be positive".into()));
        }
        if self.search.default_limit == 0 {
            return Err(Error::InvalidConfig("search.default_limit must be positive".into()));
        }
        self.search.weights.validate().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if self.timeouts.embedding_ms == 0 || self.timeouts.store_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be positive".into()));
        }
        if self.ingest.concurrency == 0 {
            return Err(Error::InvalidConfig("ingest.concurrency must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
    pub distance: DistanceMetric,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: "text-embedding-3-small".to_string(), dimensions: 1536, distance: DistanceMetric::Cosine }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub default_method: ChunkingMethod,
    pub fixed_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self { Self { default_method: ChunkingMethod::Sentence, fixed_size: DEFAULT_FIXED_SIZE } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_method: SearchMethod,
    pub default_limit: usize,
    pub weights: FusionWeights,
}

impl Default for SearchConfig {
    fn default() -> Self { Self { default_method: SearchMethod::Hybrid, default_limit: 5, weights: FusionWeights::default() } }
}

/// Bounds applied around every external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub embedding_ms: u64,
    pub store_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self { Self { embedding_ms: 30_000, store_ms: 10_000 } }
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Duration { Duration::from_millis(self.embedding_ms) }
    pub fn store(&self) -> Duration { Duration::from_millis(self.store_ms) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum single-row inserts in flight for one ingestion call.
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self { Self { concurrency: 4 } }
}

/// Physical layout of the chunk table an engine is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub table_name: String,
    pub columns: ColumnConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub vector: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self { Self::new("chunks") }
}

impl TableConfig {
    /// A table with every optional column present under its conventional name.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: ColumnConfig {
                id: "id".to_string(),
                vector: "embedding".to_string(),
                content: Some("content".to_string()),
                metadata: Some("metadata".to_string()),
                created_at: Some("created_at".to_string()),
            },
        }
    }

    /// Lexical scoring needs text to score against.
    pub fn content_column(&self) -> Result<&str> {
        self.columns.content.as_deref().ok_or_else(|| Error::ContentColumnMissing(self.table_name.clone()))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.embedding.model, "text-embedding-3-small");
        assert_eq!(cfg.embedding.dimensions, 1536);
        assert_eq!(cfg.embedding.distance, DistanceMetric::Cosine);
        assert_eq!(cfg.chunking.default_method, ChunkingMethod::Sentence);
        assert_eq!(cfg.chunking.fixed_size, 500);
        assert_eq!(cfg.search.default_limit, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn files_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [chunking]
                default_method = "paragraph"

                [search]
                default_limit = 7

                [table]
                table_name = "oai"

                [table.columns]
                id = "id"
                vector = "embedding"
                content = "chunk"
                "#,
            )?;
            jail.create_file("config.test.toml", "[embedding]\ndistance = \"euclidean\"\n")?;
            jail.set_env("RUST_ENV", "test");
            jail.set_env("APP_SEARCH__DEFAULT_LIMIT", "9");

            let config = Config::load().map_err(|e| e.to_string())?;
            let engine = config.engine().map_err(|e| e.to_string())?;
            assert_eq!(engine.chunking.default_method, ChunkingMethod::Paragraph);
            assert_eq!(engine.search.default_limit, 9);
            assert_eq!(engine.embedding.distance, DistanceMetric::Euclidean);
            assert_eq!(engine.embedding.dimensions, 1536);

            let table = config.table().map_err(|e| e.to_string())?;
            assert_eq!(table.table_name, "oai");
            assert_eq!(table.columns.content.as_deref(), Some("chunk"));
            assert_eq!(table.columns.metadata, None);
            Ok(())
        });
    }

    #[test]
    fn unknown_chunking_method_in_config_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[chunking]\ndefault_method = \"words\"\n")?;
            assert!(matches!(Config::load(), Err(Error::InvalidConfig(_))));
            Ok(())
        });
    }

    #[test]
    fn optional_keys_fall_back_only_when_absent() {
        Jail::expect_with(|jail| {
            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.get_or("store.path", "data/lance".to_string()).map_err(|e| e.to_string())?, "data/lance");

            jail.create_file("config.toml", "[store]\npath = [1, 2]\n")?;
            let config = Config::load().map_err(|e| e.to_string())?;
            let typed: Result<String> = config.get_or("store.path", "data/lance".to_string());
            assert!(matches!(typed, Err(Error::InvalidConfig(_))));

            jail.create_file("config.toml", "[store]\npath = \"/srv/lance\"\n")?;
            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.get_or("store.path", "data/lance".to_string()).map_err(|e| e.to_string())?, "/srv/lance");
            Ok(())
        });
    }

    #[test]
    fn missing_content_column_is_reported() {
        let mut table = TableConfig::new("items");
        table.columns.content = None;
        assert!(matches!(table.content_column(), Err(Error::ContentColumnMissing(name)) if name == "items"));
        assert_eq!(TableConfig::new("oai").content_column().unwrap(), "content");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/chunkdb");
        assert_eq!(resolve_with_base(base, "data/lance"), PathBuf::from("/srv/chunkdb/data/lance"));
        assert_eq!(resolve_with_base(base, "/var/lib/lance"), PathBuf::from("/var/lib/lance"));
    }
}
