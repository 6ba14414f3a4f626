//! Routing decision vocabulary
//!
//! The types every stage speaks: intent labels, complexity tiers, confidence
//! scores, and the `RoutingDecision` value object handed to the orchestrator.
//! A decision is immutable once synthesized; downstream code reads it, never
//! edits it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Intent label set: closed for policy purposes, extensible at runtime
///
/// The learning path may introduce labels the policy tables have never seen;
/// those arrive as `Custom` and receive the default policy. Labels are never
/// removed implicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntentLabel {
    Greeting,
    Conversation,
    Coding,
    Search,
    Research,
    PrivacyUnlock,
    SystemCommand,
    DeleteRequest,
    Blocked,
    Custom(String),
}

impl IntentLabel {
    /// Labels the external classifier is allowed to emit
    ///
    /// `blocked` is excluded: only the guardrail produces it.
    pub const CLASSIFIABLE: [IntentLabel; 8] = [
        IntentLabel::Greeting,
        IntentLabel::Conversation,
        IntentLabel::Coding,
        IntentLabel::Search,
        IntentLabel::Research,
        IntentLabel::PrivacyUnlock,
        IntentLabel::SystemCommand,
        IntentLabel::DeleteRequest,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            IntentLabel::Greeting => "greeting",
            IntentLabel::Conversation => "conversation",
            IntentLabel::Coding => "coding",
            IntentLabel::Search => "search",
            IntentLabel::Research => "research",
            IntentLabel::PrivacyUnlock => "privacy_unlock",
            IntentLabel::SystemCommand => "system_command",
            IntentLabel::DeleteRequest => "delete_request",
            IntentLabel::Blocked => "blocked",
            IntentLabel::Custom(name) => name,
        }
    }

    /// Intents that can trigger destructive or system-level actions
    pub fn is_dangerous(&self) -> bool {
        matches!(self, IntentLabel::SystemCommand | IntentLabel::DeleteRequest)
    }
}

impl From<String> for IntentLabel {
    fn from(value: String) -> Self {
        match value.as_str() {
            "greeting" => IntentLabel::Greeting,
            "conversation" => IntentLabel::Conversation,
            "coding" => IntentLabel::Coding,
            "search" => IntentLabel::Search,
            "research" => IntentLabel::Research,
            "privacy_unlock" => IntentLabel::PrivacyUnlock,
            "system_command" => IntentLabel::SystemCommand,
            "delete_request" => IntentLabel::DeleteRequest,
            "blocked" => IntentLabel::Blocked,
            _ => IntentLabel::Custom(value),
        }
    }
}

impl From<IntentLabel> for String {
    fn from(value: IntentLabel) -> Self {
        value.as_str().to_string()
    }
}

impl std::str::FromStr for IntentLabel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(IntentLabel::from(s.to_string()))
    }
}

impl std::fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much reasoning and context a request is expected to need
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    Medium,
    Complex,
}

impl ComplexityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Simple => "simple",
            ComplexityTier::Medium => "medium",
            ComplexityTier::Complex => "complex",
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Confidence in a classification, clamped to [0, 1] at construction
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidenceScore(f32);

impl ConfidenceScore {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Tool families the orchestrator may enable for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    FileSystem,
    Shell,
    WebSearch,
    Scheduler,
}

/// Context window size class; the orchestrator maps it to model settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextWindowClass {
    Compact,
    Standard,
    Extended,
}

impl ContextWindowClass {
    /// Token budget the class stands for
    pub fn token_budget(&self) -> u32 {
        match self {
            ContextWindowClass::Compact => 2048,
            ContextWindowClass::Standard => 8192,
            ContextWindowClass::Extended => 32768,
        }
    }
}

/// When the orchestrator should start streaming the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingMode {
    Immediate,
    Delayed,
}

/// Which pipeline stage produced the final classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverStage {
    Guardrail,
    Cache,
    Semantic,
    Classifier,
    Fallback,
}

impl ResolverStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverStage::Guardrail => "guardrail",
            ResolverStage::Cache => "cache",
            ResolverStage::Semantic => "semantic",
            ResolverStage::Classifier => "classifier",
            ResolverStage::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ResolverStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Intermediate classification before policy synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: IntentLabel,
    pub complexity: ComplexityTier,
    pub confidence: ConfidenceScore,
    pub resolved_by: ResolverStage,
}

/// Final routing decision handed to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub intent: IntentLabel,
    pub complexity: ComplexityTier,
    pub confidence: ConfidenceScore,
    /// Sampling temperature for the reply model
    pub temperature: f32,
    pub context_window: ContextWindowClass,
    /// Tool families to enable; empty means no tools
    pub tools: BTreeSet<ToolCategory>,
    pub use_rag: bool,
    /// How long this decision may be served from the cache
    pub cache_ttl_secs: u64,
    pub streaming: StreamingMode,
    /// Orchestrator must ask the user before acting
    pub requires_confirmation: bool,
    pub resolved_by: ResolverStage,
}

impl RoutingDecision {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn allows_tool(&self, category: ToolCategory) -> bool {
        self.tools.contains(&category)
    }

    /// Guardrail verdicts bypass the cache and the classifier stages
    pub fn is_guardrail_terminal(&self) -> bool {
        self.resolved_by == ResolverStage::Guardrail
    }
}
