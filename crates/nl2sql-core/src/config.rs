//! Configuration schema (nl2sql.toml)
//!
//! Every field has a default so an empty file is valid. Secrets and
//! deployment-specific values are usually supplied through the environment
//! and applied with [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "nl2sql.toml";

const DEFAULT_CACHE_PATH: &str = "./data/schema_cache.json";
const DEFAULT_MODEL: &str = "gpt-5.2-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Root statement keywords that are never allowed
pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "DROP", "ALTER", "CREATE", "GRANT",
    "REVOKE", "COPY", "CALL", "DO", "VACUUM", "EXPLAIN", "SET", "LOCK", "COMMENT",
];

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL (`postgres://` or `postgresql://`)
    #[serde(default)]
    pub dsn: Option<String>,

    /// Schemas to introspect; empty means the default schema only
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Connect with TLS
    #[serde(default)]
    pub tls: bool,
}

/// On-disk schema cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Upper bound on tables shown to the generator
    #[serde(default = "default_max_tables")]
    pub max_tables: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_tables: default_max_tables(),
        }
    }
}

/// Allow/deny rules for tables (glob patterns over `schema.name`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableRules {
    /// Tables that may be referenced; empty allows every table
    #[serde(default)]
    pub allow: Vec<String>,

    /// Tables that may never be referenced, even when allowed above
    #[serde(default)]
    pub deny: Vec<String>,
}

impl TableRules {
    fn matches_pattern(name: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| glob_match(pattern, name))
    }

    /// Check if a qualified table name passes both lists
    pub fn is_allowed(&self, qualified_name: &str) -> bool {
        let allowed = self.allow.is_empty() || Self::matches_pattern(qualified_name, &self.allow);
        allowed && !Self::matches_pattern(qualified_name, &self.deny)
    }
}

/// Guardrail settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// LIMIT injected into unbounded non-aggregate selects
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Statement keywords reported as forbidden
    #[serde(default = "default_forbidden_keywords")]
    pub forbidden_keywords: Vec<String>,

    #[serde(default)]
    pub tables: TableRules,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            forbidden_keywords: default_forbidden_keywords(),
            tables: TableRules::default(),
        }
    }
}

/// SQL generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    OpenAi,

    /// Canned responses, for tests and offline demos
    Mock,
}

/// SQL generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Schema used to resolve unqualified table names
    #[serde(default = "default_schema")]
    pub default_schema: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub guardrail: GuardrailConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_schema: default_schema(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            guardrail: GuardrailConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Load from an explicit path, or `nl2sql.toml` when present, or defaults;
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from process environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Recognised: `POSTGRES_DSN`, `OPENAI_API_KEY`, `OPENAI_MODEL`,
    /// `OPENAI_BASE_URL`, `SCHEMA_CACHE_PATH`, `DEFAULT_SCHEMA`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dsn) = get("POSTGRES_DSN") {
            self.database.dsn = Some(dsn);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(path) = get("SCHEMA_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }
        if let Some(schema) = get("DEFAULT_SCHEMA") {
            self.default_schema = schema;
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dsn) = &self.database.dsn {
            if !(dsn.starts_with("postgres://") || dsn.starts_with("postgresql://")) {
                return Err(ConfigError::Invalid(
                    "POSTGRES_DSN must start with postgres:// or postgresql://".to_string(),
                ));
            }
        }

        if self.default_schema.trim().is_empty() {
            return Err(ConfigError::Invalid("default_schema cannot be empty".to_string()));
        }

        if self.retrieval.max_tables == 0 {
            return Err(ConfigError::Invalid("retrieval.max_tables must be at least 1".to_string()));
        }

        if self.guardrail.default_limit == 0 {
            return Err(ConfigError::Invalid("guardrail.default_limit must be at least 1".to_string()));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid("llm.timeout_secs must be at least 1".to_string()));
        }

        Ok(())
    }

    /// DSN, or an error naming the missing variable
    pub fn require_dsn(&self) -> Result<&str, ConfigError> {
        self.database
            .dsn
            .as_deref()
            .ok_or(ConfigError::Missing("POSTGRES_DSN"))
    }

    /// Fail when the configured provider needs credentials that are absent
    pub fn require_llm(&self) -> Result<&LlmConfig, ConfigError> {
        match self.llm.provider {
            LlmProvider::OpenAi if self.llm.api_key.is_none() => {
                Err(ConfigError::Missing("OPENAI_API_KEY"))
            }
            _ => Ok(&self.llm),
        }
    }

    /// Schemas to introspect
    pub fn target_schemas(&self) -> Vec<String> {
        if self.database.schemas.is_empty() {
            vec![self.default_schema.clone()]
        } else {
            self.database.schemas.clone()
        }
    }
}

/// Glob matching over `schema.name` (`*` matches any run of characters)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };

    if !text.starts_with(first) {
        return false;
    }
    let mut remaining = &text[first.len()..];

    for (i, part) in rest.iter().enumerate() {
        let is_last = i == rest.len() - 1;
        if is_last {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_max_tables() -> usize {
    6
}

fn default_limit() -> u64 {
    100
}

fn default_forbidden_keywords() -> Vec<String> {
    DEFAULT_FORBIDDEN_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_schema, "public");
        assert_eq!(config.retrieval.max_tables, 6);
        assert_eq!(config.guardrail.default_limit, 100);
        assert_eq!(config.llm.model, "gpt-5.2-mini");
        assert_eq!(config.cache.path, PathBuf::from("./data/schema_cache.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_valid() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            default_schema = "sales"

            [retrieval]
            max_tables = 3

            [guardrail.tables]
            allow = ["sales.*"]
            deny = ["sales.secrets"]
            "#,
        )
        .unwrap();

        assert_eq!(config.default_schema, "sales");
        assert_eq!(config.retrieval.max_tables, 3);
        assert_eq!(config.guardrail.default_limit, 100);
        assert!(config.guardrail.tables.is_allowed("sales.orders"));
        assert!(!config.guardrail.tables.is_allowed("sales.secrets"));
        assert!(!config.guardrail.tables.is_allowed("public.orders"));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("POSTGRES_DSN", "postgresql://ro@localhost/shop"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-test"),
            ("SCHEMA_CACHE_PATH", "/tmp/cache.json"),
            ("DEFAULT_SCHEMA", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.dsn.as_deref(), Some("postgresql://ro@localhost/shop"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-test");
        assert_eq!(config.cache.path, PathBuf::from("/tmp/cache.json"));
        // Blank values are ignored
        assert_eq!(config.default_schema, "public");
        assert!(config.validate().is_ok());
        assert!(config.require_llm().is_ok());
    }

    #[test]
    fn dsn_scheme_is_validated() {
        let mut config = Config::default();
        config.database.dsn = Some("mysql://localhost/shop".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = Config::default();
        assert!(matches!(config.require_llm(), Err(ConfigError::Missing("OPENAI_API_KEY"))));

        let mut config = Config::default();
        config.llm.provider = LlmProvider::Mock;
        assert!(config.require_llm().is_ok());
    }

    #[test]
    fn api_key_is_never_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("sk-secret"));
    }

    #[test]
    fn target_schemas_fall_back_to_default() {
        let mut config = Config::default();
        assert_eq!(config.target_schemas(), vec!["public".to_string()]);

        config.database.schemas = vec!["sales".into(), "crm".into()];
        assert_eq!(config.target_schemas(), vec!["sales".to_string(), "crm".to_string()]);
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nl2sql.toml");

        let mut config = Config::default();
        config.retrieval.max_tables = 4;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.retrieval.max_tables, 4);
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("public.*", "public.orders"));
        assert!(glob_match("*.orders", "sales.orders"));
        assert!(glob_match("sales.*_audit", "sales.orders_audit"));
        assert!(!glob_match("public.*", "sales.orders"));
        assert!(!glob_match("sales.*_audit", "sales.orders"));
        assert!(glob_match("public.orders", "public.orders"));
    }
}
