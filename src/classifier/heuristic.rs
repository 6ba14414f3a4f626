//! Lexical fallback classifier
//!
//! Last resort of the pipeline: keyword stems, message length, and
//! punctuation. No I/O, no model, no clock; total over every input. When
//! the matcher is undecided and the external classifier is down, slow, or
//! spouting garbage, this still produces a decision in microseconds.
//!
//! Confidence never exceeds [`FALLBACK_CONFIDENCE_CEILING`]: a fallback
//! decision is deliberately easy to outrank once the real classifier is
//! healthy again and the version bumps.
//!
//! ```
//! use switchboard::classifier::{HeuristicClassifier, IntentClassifier};
//! use switchboard::decision::IntentLabel;
//! use switchboard::request::RouteRequest;
//!
//! # tokio_test::block_on(async {
//! let fallback = HeuristicClassifier::new();
//! let result = fallback
//!     .classify(&RouteRequest::new("удали старые логи"))
//!     .await
//!     .unwrap();
//! assert_eq!(result.intent, IntentLabel::DeleteRequest);
//! # });
//! ```

use super::{ClassifyError, IntentClassifier, FALLBACK_CONFIDENCE_CEILING};
use crate::decision::{Classification, ComplexityTier, ConfidenceScore, IntentLabel, ResolverStage};
use crate::request::RouteRequest;
use async_trait::async_trait;

// Word stems matched by prefix against whitespace-split words
const DELETE_STEMS: &[&str] = &[
    "удали", "сотри", "очисти", "delete", "remove", "erase", "wipe",
];
const SYSTEM_STEMS: &[&str] = &[
    "перезагрузи",
    "перезапусти",
    "выключи",
    "включи",
    "запусти",
    "установи",
    "restart",
    "reboot",
    "shutdown",
    "install",
    "launch",
];
const CODING_STEMS: &[&str] = &[
    "код", "функци", "скрипт", "программ", "баг", "ошибк", "компил", "рефактор", "code",
    "function", "script", "debug", "compile", "refactor", "implement", "python", "rust",
];
const RESEARCH_STEMS: &[&str] = &[
    "исследуй",
    "проанализируй",
    "сравни",
    "изучи",
    "research",
    "analyze",
    "analyse",
    "compare",
    "investigate",
    "summarize",
];
const SEARCH_STEMS: &[&str] = &["найди", "поищи", "погугли", "search", "find", "google"];

// Greeting words are matched exactly; they are too short for prefix matching
const GREETING_WORDS: &[&str] = &[
    "привет",
    "здравствуй",
    "здравствуйте",
    "здорово",
    "салют",
    "hi",
    "hello",
    "hey",
];
const GREETING_PHRASES: &[&str] = &[
    "добрый день",
    "добрый вечер",
    "доброе утро",
    "good morning",
    "good evening",
];

const MULTI_STEP_MARKERS: &[&str] = &[
    "затем",
    "после этого",
    "сначала",
    "шаг за шагом",
    "поэтапно",
    "step by step",
    "first,",
];

const SYSTEM_PHRASES: &[&str] = &["shut down", "turn off", "turn on"];
const SEARCH_PHRASES: &[&str] = &["look up", "что такое"];

const DELETE_CONFIDENCE: f32 = 0.58;
const SYSTEM_CONFIDENCE: f32 = 0.58;
const GREETING_CONFIDENCE: f32 = 0.58;
const CODING_CONFIDENCE: f32 = 0.55;
const RESEARCH_CONFIDENCE: f32 = 0.52;
const SEARCH_CONFIDENCE: f32 = 0.52;
const DEFAULT_CONFIDENCE: f32 = 0.40;

/// Keyword and length based classifier; stateless and total
#[derive(Debug, Default, Clone)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a normalized message; always succeeds
    pub fn classify_text(&self, normalized_message: &str) -> Classification {
        let (intent, confidence) = self.pick_intent(normalized_message);
        Classification {
            intent,
            complexity: estimate_complexity(normalized_message),
            confidence: ConfidenceScore::new(confidence.min(FALLBACK_CONFIDENCE_CEILING)),
            resolved_by: ResolverStage::Fallback,
        }
    }

    // Ordered by stakes: destructive and system intents are checked before
    // anything chatty so they cannot be shadowed by a polite prefix
    fn pick_intent(&self, message: &str) -> (IntentLabel, f32) {
        if has_stem(message, DELETE_STEMS) {
            return (IntentLabel::DeleteRequest, DELETE_CONFIDENCE);
        }
        if has_stem(message, SYSTEM_STEMS) || has_phrase(message, SYSTEM_PHRASES) {
            return (IntentLabel::SystemCommand, SYSTEM_CONFIDENCE);
        }
        if has_stem(message, CODING_STEMS) {
            return (IntentLabel::Coding, CODING_CONFIDENCE);
        }
        if has_stem(message, RESEARCH_STEMS) {
            return (IntentLabel::Research, RESEARCH_CONFIDENCE);
        }
        if has_stem(message, SEARCH_STEMS) || has_phrase(message, SEARCH_PHRASES) {
            return (IntentLabel::Search, SEARCH_CONFIDENCE);
        }
        if is_greeting(message) {
            return (IntentLabel::Greeting, GREETING_CONFIDENCE);
        }
        (IntentLabel::Conversation, DEFAULT_CONFIDENCE)
    }
}

#[async_trait]
impl IntentClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(&self, request: &RouteRequest) -> Result<Classification, ClassifyError> {
        Ok(self.classify_text(&request.normalized()))
    }
}

/// Complexity from length and structure signals
///
/// Shared with the semantic stage, which resolves an intent but has no
/// complexity signal of its own.
pub fn estimate_complexity(normalized_message: &str) -> ComplexityTier {
    let word_count = normalized_message.split_whitespace().count();
    let base = if word_count <= 5 {
        ComplexityTier::Simple
    } else if word_count <= 30 {
        ComplexityTier::Medium
    } else {
        ComplexityTier::Complex
    };

    let has_code_block = normalized_message.contains("```");
    let multi_step = MULTI_STEP_MARKERS
        .iter()
        .any(|marker| normalized_message.contains(marker));
    let comma_heavy = normalized_message
        .chars()
        .filter(|c| *c == ',' || *c == ';')
        .count()
        >= 4;

    if has_code_block || multi_step || comma_heavy {
        bump(base)
    } else {
        base
    }
}

fn bump(tier: ComplexityTier) -> ComplexityTier {
    match tier {
        ComplexityTier::Simple => ComplexityTier::Medium,
        ComplexityTier::Medium | ComplexityTier::Complex => ComplexityTier::Complex,
    }
}

fn words(message: &str) -> impl Iterator<Item = &str> {
    message
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
}

fn has_stem(message: &str, stems: &[&str]) -> bool {
    words(message).any(|word| stems.iter().any(|stem| word.starts_with(stem)))
}

fn has_phrase(message: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| message.contains(phrase))
}

fn is_greeting(message: &str) -> bool {
    // Only short messages count: a greeting prefix on a real request must
    // not hide the request
    if message.split_whitespace().count() > 4 {
        return false;
    }
    words(message).any(|word| GREETING_WORDS.contains(&word))
        || has_phrase(message, GREETING_PHRASES)
}
