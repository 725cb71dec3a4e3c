use crate::normalize::{SynonymGroup, SynonymTable};
use crate::ProblabelError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct ProblabelConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub fallback_endpoint: Option<String>,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_classify_max_tokens")]
    pub classify_max_tokens: u32,
    #[serde(default = "default_translate_max_tokens")]
    pub translate_max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            fallback_endpoint: None,
            model: default_oracle_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_oracle_timeout(),
            temperature: 0.0,
            classify_max_tokens: default_classify_max_tokens(),
            translate_max_tokens: default_translate_max_tokens(),
        }
    }
}

fn default_oracle_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_oracle_model() -> String {
    "gpt-4.1-mini".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_oracle_timeout() -> u64 {
    60
}

fn default_classify_max_tokens() -> u32 {
    800
}

fn default_translate_max_tokens() -> u32 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifyConfig {
    #[serde(default = "default_max_labels")]
    pub max_labels: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            max_labels: default_max_labels(),
            concurrency: default_concurrency(),
            cache_path: default_cache_path(),
        }
    }
}

fn default_max_labels() -> usize {
    3
}

fn default_concurrency() -> usize {
    1
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache").join("classify_cache.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct MergeConfig {
    /// Category meaning "no identified problem"; excluded from aggregation.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Drop the built-in synonym groups and use only `groups`.
    #[serde(default)]
    pub replace_default_groups: bool,
    /// Extra groups, matched after the built-in ones.
    #[serde(default)]
    pub groups: Vec<SynonymGroup>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            replace_default_groups: false,
            groups: Vec::new(),
        }
    }
}

fn default_sentinel() -> String {
    "нет".into()
}

impl MergeConfig {
    pub fn synonym_table(&self) -> SynonymTable {
        let mut table = if self.replace_default_groups {
            SynonymTable::empty()
        } else {
            SynonymTable::default()
        };
        for group in &self.groups {
            table.push(group.clone());
        }
        table
    }
}

/// Load config from PROBLABEL_CONFIG env var, ~/.problabel/config.toml, or defaults.
/// OPENAI_MODEL_CLASSIFY (then OPENAI_MODEL) overrides the oracle model.
pub fn load_config() -> Result<ProblabelConfig, ProblabelError> {
    let mut config = match config_path() {
        Some(p) if p.exists() => load_config_from(&p)?,
        _ => ProblabelConfig::default(),
    };

    if let Some(model) = env_non_empty("OPENAI_MODEL_CLASSIFY").or_else(|| env_non_empty("OPENAI_MODEL")) {
        config.oracle.model = model;
    }

    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<ProblabelConfig, ProblabelError> {
    let content = std::fs::read_to_string(path)?;
    let config: ProblabelConfig = toml::from_str(&content)
        .map_err(|e| ProblabelError::Config(format!("{}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("PROBLABEL_CONFIG") {
        return Some(PathBuf::from(p));
    }
    let home = std::env::var("HOME").ok()?;
    Some(Path::new(&home).join(".problabel").join("config.toml"))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn validate_config(config: &ProblabelConfig) -> Result<(), ProblabelError> {
    if config.classify.max_labels == 0 {
        return Err(ProblabelError::Config("classify.max_labels must be at least 1".into()));
    }
    if config.classify.concurrency == 0 {
        return Err(ProblabelError::Config("classify.concurrency must be at least 1".into()));
    }
    if config.oracle.timeout_secs == 0 {
        return Err(ProblabelError::Config("oracle.timeout_secs must be at least 1".into()));
    }
    for (i, group) in config.merge.groups.iter().enumerate() {
        if group.category.trim().is_empty() {
            return Err(ProblabelError::Config(format!("merge.groups[{i}] has an empty category")));
        }
        if group.synonyms.iter().all(|s| s.trim().is_empty()) {
            return Err(ProblabelError::Config(format!(
                "merge.groups[{i}] ({}) has no synonyms",
                group.category
            )));
        }
    }
    Ok(())
}

/// Resolve the oracle bearer token: explicit value first, then the configured env var.
pub fn resolve_api_key(config: &OracleConfig, explicit: Option<&str>) -> Result<String, ProblabelError> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    env_non_empty(&config.api_key_env).ok_or_else(|| {
        ProblabelError::Config(format!(
            "{} is required; set it in the environment or pass --api-key",
            config.api_key_env
        ))
    })
}
