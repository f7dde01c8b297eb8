//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__ALPHA=0.7`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::text::DEFAULT_STOPWORDS;
use crate::types::{FusionStrategy, Intent, WeightingHint};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalConfig,
    pub refiner: RefinerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub answer: AnswerConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.alpha) {
            return Err(Error::InvalidConfig(format!("retrieval.alpha must be in [0,1], got {}", r.alpha)));
        }
        if r.rrf_k <= 0.0 {
            return Err(Error::InvalidConfig(format!("retrieval.rrf_k must be positive, got {}", r.rrf_k)));
        }
        if r.top_k == 0 || r.candidates_per_retriever == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k and candidates_per_retriever must be positive".into()));
        }
        for (intent, hint) in &self.refiner.intent_weights {
            if hint.dense < 0.0 || hint.sparse < 0.0 {
                return Err(Error::InvalidConfig(format!("refiner.intent_weights.{intent} must be non-negative")));
            }
        }
        if self.chunking.overlap_words >= self.chunking.words_per_chunk {
            return Err(Error::InvalidConfig("chunking.overlap_words must be smaller than words_per_chunk".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// How many candidates each retriever returns per query variant before fusion.
    pub candidates_per_retriever: usize,
    /// Dense share in the weighted blend when no hint overrides it.
    pub alpha: f32,
    /// RRF damping constant.
    pub rrf_k: f32,
    pub strategy: FusionStrategy,
    /// Added to a chunk's lexical score per distinct keyword it contains.
    pub keyword_bonus: f32,
    pub max_rounds: usize,
    /// When set, a round is accepted only if its average fused score reaches this.
    pub min_average_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            candidates_per_retriever: 20,
            alpha: 0.6,
            rrf_k: 60.0,
            strategy: FusionStrategy::Auto,
            keyword_bonus: 0.1,
            max_rounds: 2,
            min_average_score: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    pub use_model: bool,
    pub timeout_ms: u64,
    pub max_tokens: usize,
    pub temperature: f32,
    pub max_keywords: usize,
    pub max_sub_queries: usize,
    pub stopwords: Vec<String>,
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Keyed by intent tag (`fact`, `summary`, ...).
    pub intent_weights: BTreeMap<String, WeightingHint>,
}

impl RefinerConfig {
    pub fn weights_for(&self, intent: Intent) -> WeightingHint {
        self.intent_weights
            .get(intent.as_str())
            .or_else(|| self.intent_weights.get(Intent::Generic.as_str()))
            .copied()
            .unwrap_or_default()
    }
}

impl Default for RefinerConfig {
    fn default() -> Self {
        let synonyms = [
            ("price", &["cost", "pricing"][..]),
            ("error", &["issue", "problem", "fault"][..]),
            ("summary", &["overview", "abstract"][..]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect();

        let intent_weights = Intent::ALL
            .into_iter()
            .map(|intent| {
                let hint = match intent {
                    Intent::Fact | Intent::Compare | Intent::Meta => WeightingHint::new(0.4, 0.6),
                    Intent::Summary | Intent::Howto => WeightingHint::new(0.6, 0.4),
                    Intent::Error | Intent::Generic => WeightingHint::new(0.5, 0.5),
                };
                (intent.as_str().to_string(), hint)
            })
            .collect();

        Self {
            use_model: true,
            timeout_ms: 8_000,
            max_tokens: 256,
            temperature: 0.2,
            max_keywords: 10,
            max_sub_queries: 3,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            synonyms,
            intent_weights,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub lexical_dir: String,
    pub vector_dir: String,
    pub table_name: String,
    /// Maximum number of lexical indexes held in memory at once.
    pub cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lexical_dir: "data/indexes/lexical".to_string(),
            vector_dir: "data/indexes/lancedb".to_string(),
            table_name: "chunks".to_string(),
            cache_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_dir: String,
    pub use_fake: bool,
    pub dim: usize,
    pub max_len: usize,
    /// `auto`, `cpu` or `metal`.
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            use_fake: false,
            dim: 384,
            max_len: 256,
            device: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:11434".to_string(), model: "qwen2.5:3b-instruct".to_string(), timeout_secs: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub words_per_chunk: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { words_per_chunk: 200, overlap_words: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Fused chunks used as answer context.
    pub context_chunks: usize,
    pub sentences_per_chunk: usize,
    pub max_context_tokens: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Word budget of each merged source block returned with an answer.
    pub block_words: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self { context_chunks: 5, sentences_per_chunk: 2, max_context_tokens: 300, max_tokens: 120, temperature: 0.7, block_words: 500 }
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
