//! Configuration for the request router
//!
//! Loaded from TOML. Every field has a default so a minimal (or empty) file
//! yields a working local setup; `validate()` runs at load time and rejects
//! anything the pipeline cannot start with. Configuration problems are fatal
//! at startup, never per-request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main router configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RouterConfig {
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub guardrail: GuardrailSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub semantic: SemanticSection,
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
    #[serde(default)]
    pub shadow: ShadowSection,
    #[serde(default)]
    pub trace: TraceSection,
}

/// Top-level router settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterSection {
    /// Directory holding persisted state (example corpus, version marker)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

/// Guardrail pattern groups, compiled once at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardrailSection {
    /// Privacy unlock phrases (regex, matched case-insensitively)
    #[serde(default = "default_unlock_patterns")]
    pub unlock_patterns: Vec<String>,
    /// Clearly dangerous content that is refused outright
    #[serde(default = "default_blocked_patterns")]
    pub blocked_patterns: Vec<String>,
}

impl Default for GuardrailSection {
    fn default() -> Self {
        Self {
            unlock_patterns: default_unlock_patterns(),
            blocked_patterns: default_blocked_patterns(),
        }
    }
}

fn default_unlock_patterns() -> Vec<String> {
    vec![
        r"^\s*привет[,!.\s]*малыш[,!.\s]*$".to_string(),
        r"^\s*hey[,!.\s]*little\s+one[,!.\s]*$".to_string(),
    ]
}

fn default_blocked_patterns() -> Vec<String> {
    vec![
        r"rm\s+-rf\s+/\S*".to_string(),
        r"mkfs\.\w+\s+/dev/".to_string(),
        r"(?:dd\s+if=.*of=/dev/[sh]d|:\(\)\{\s*:\|:&\s*\};:)".to_string(),
        r"отформатируй\s+(?:весь\s+)?диск".to_string(),
    ]
}

/// Decision cache sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSection {
    /// Maximum number of live entries; least-recently-used beyond this
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1024
}

/// Semantic matcher thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticSection {
    /// Acceptance threshold for intents without an explicit override
    #[serde(default = "default_semantic_threshold")]
    pub default_threshold: f32,
    /// Per-intent overrides, keyed by intent label
    #[serde(default = "default_intent_thresholds")]
    pub thresholds: HashMap<String, f32>,
}

impl Default for SemanticSection {
    fn default() -> Self {
        Self {
            default_threshold: default_semantic_threshold(),
            thresholds: default_intent_thresholds(),
        }
    }
}

fn default_semantic_threshold() -> f32 {
    0.82
}

fn default_intent_thresholds() -> HashMap<String, f32> {
    // Misclassifying a destructive request costs far more than missing a
    // greeting, so high-stakes labels demand near-certain similarity.
    HashMap::from([
        ("greeting".to_string(), 0.75),
        ("privacy_unlock".to_string(), 0.92),
        ("system_command".to_string(), 0.92),
        ("delete_request".to_string(), 0.92),
    ])
}

/// External classifier settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierSection {
    /// Disable to skip straight from the matcher to the lexical fallback
    #[serde(default = "default_classifier_enabled")]
    pub enabled: bool,
    /// Local model server base URL
    #[serde(default = "default_local_endpoint")]
    pub endpoint: String,
    /// Model identifier
    #[serde(default = "default_classifier_model")]
    pub model: String,
    /// Hard budget for the single classification call (no retry)
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
    /// Sampling temperature for classification (kept low for determinism)
    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,
    /// Completion cap; a classification is a small JSON object
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            enabled: default_classifier_enabled(),
            endpoint: default_local_endpoint(),
            model: default_classifier_model(),
            timeout_ms: default_classifier_timeout_ms(),
            temperature: default_classifier_temperature(),
            max_tokens: default_classifier_max_tokens(),
        }
    }
}

fn default_classifier_enabled() -> bool {
    true
}

fn default_local_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_classifier_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    2500
}

fn default_classifier_temperature() -> f32 {
    0.1
}

fn default_classifier_max_tokens() -> u32 {
    256
}

/// Embedding service settings for the semantic matcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSection {
    /// Local model server base URL
    #[serde(default = "default_local_endpoint")]
    pub endpoint: String,
    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Budget for one embedding call
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            endpoint: default_local_endpoint(),
            model: default_embedding_model(),
            timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_timeout_ms() -> u64 {
    1000
}

/// Shadow evaluator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ShadowSection {
    /// Run a candidate classifier out-of-band and log disagreements
    #[serde(default)]
    pub enabled: bool,
    /// Candidate model; falls back to the primary classifier model
    #[serde(default)]
    pub model: Option<String>,
}

/// Trace recorder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TraceSection {
    /// Trace file path; defaults to `<state_dir>/traces.jsonl`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid guardrail pattern: {0}")]
    InvalidPattern(String),
    #[error("Failed to load persisted state: {0}")]
    StateLoad(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RouterConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges and endpoint URLs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "cache.capacity must be at least 1".to_string(),
            ));
        }

        validate_threshold("semantic.default_threshold", self.semantic.default_threshold)?;
        for (intent, threshold) in &self.semantic.thresholds {
            validate_threshold(&format!("semantic.thresholds.{intent}"), *threshold)?;
        }

        if self.classifier.timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "classifier.timeout_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(ConfigError::InvalidConfig(format!(
                "classifier.temperature must be between 0.0 and 2.0, got {}",
                self.classifier.temperature
            )));
        }

        validate_endpoint("classifier.endpoint", &self.classifier.endpoint)?;
        validate_endpoint("embedding.endpoint", &self.embedding.endpoint)?;

        Ok(())
    }

    /// Path of the persisted example corpus
    pub fn corpus_path(&self) -> PathBuf {
        self.router.state_dir.join("corpus.jsonl")
    }

    /// Path of the persisted system version marker
    pub fn version_path(&self) -> PathBuf {
        self.router.state_dir.join("version")
    }

    /// Path of the routing trace log
    pub fn trace_path(&self) -> PathBuf {
        self.trace
            .path
            .clone()
            .unwrap_or_else(|| self.router.state_dir.join("traces.jsonl"))
    }
}

fn validate_threshold(field: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidConfig(format!(
            "{field} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

fn validate_endpoint(field: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidConfig(format!("{field} is not a valid URL: {e}")))?;
    Ok(())
}
