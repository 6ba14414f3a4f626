//! Semantic matcher
//!
//! Stage 3 of the pipeline: embed the normalized message and compare it to
//! the labeled corpus. A match only counts when the nearest item's score
//! clears the threshold for that item's intent; thresholds are asymmetric
//! because waving through a destructive request costs far more than missing
//! a greeting.
//!
//! Every failure here (embedding call, empty corpus) degrades to
//! `Undecided`. The matcher can lose a request to the later stages but can
//! never fail one.

use crate::config::SemanticSection;
use crate::corpus::{CorpusItem, ExampleCorpus};
use crate::decision::IntentLabel;
use crate::embedding::{EmbedError, Embedder};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Per-intent acceptance thresholds with a default for unlisted labels
#[derive(Debug, Clone)]
pub struct SemanticThresholds {
    default_threshold: f32,
    per_intent: HashMap<IntentLabel, f32>,
}

impl SemanticThresholds {
    pub fn from_config(section: &SemanticSection) -> Self {
        let per_intent = section
            .thresholds
            .iter()
            .map(|(label, threshold)| (IntentLabel::from(label.clone()), *threshold))
            .collect();
        Self {
            default_threshold: section.default_threshold,
            per_intent,
        }
    }

    pub fn for_intent(&self, intent: &IntentLabel) -> f32 {
        self.per_intent
            .get(intent)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// Lowest configured threshold; fallback confidence must stay below it
    pub fn floor(&self) -> f32 {
        self.per_intent
            .values()
            .copied()
            .fold(self.default_threshold, f32::min)
    }
}

/// Outcome of the matching stage
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticOutcome {
    Match { intent: IntentLabel, score: f32 },
    Undecided,
}

/// Errors from the learning path; logged by the caller, never user-facing
#[derive(Debug, Error)]
pub enum LearnError {
    #[error("Embedding failed: {0}")]
    Embed(#[from] EmbedError),
    #[error("Corpus persistence failed: {0}")]
    Persist(#[from] std::io::Error),
}

/// Embedding-similarity matcher over the example corpus
pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
    corpus: Arc<ExampleCorpus>,
    thresholds: SemanticThresholds,
}

impl SemanticMatcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        corpus: Arc<ExampleCorpus>,
        thresholds: SemanticThresholds,
    ) -> Self {
        Self {
            embedder,
            corpus,
            thresholds,
        }
    }

    /// Try to resolve the message against the corpus
    pub async fn resolve(&self, normalized_message: &str) -> SemanticOutcome {
        if self.corpus.is_empty() {
            debug!("semantic matcher skipped: corpus has no active items");
            return SemanticOutcome::Undecided;
        }

        let embedding = match self.embedder.embed(normalized_message).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(embedder = self.embedder.name(), error = %e, "embedding failed, matcher undecided");
                return SemanticOutcome::Undecided;
            }
        };

        let Some(found) = self.corpus.nearest(&embedding) else {
            return SemanticOutcome::Undecided;
        };

        let threshold = self.thresholds.for_intent(&found.intent);
        if found.score >= threshold {
            debug!(
                intent = %found.intent,
                score = found.score,
                threshold,
                "semantic match accepted"
            );
            SemanticOutcome::Match {
                intent: found.intent,
                score: found.score,
            }
        } else {
            debug!(
                intent = %found.intent,
                score = found.score,
                threshold,
                "nearest item below threshold, undecided"
            );
            SemanticOutcome::Undecided
        }
    }

    /// Append a confirmed (text, intent) pair as a learned example
    pub async fn learn(&self, text: &str, intent: IntentLabel) -> Result<(), LearnError> {
        let embedding = self.embedder.embed(text).await?;
        self.corpus
            .append(CorpusItem::learned(text, embedding, intent.clone()))
            .await?;
        debug!(intent = %intent, "learned corpus item appended");
        Ok(())
    }

    /// Retire any active items with this text, then append under the
    /// corrected label
    pub async fn relabel(&self, text: &str, intent: IntentLabel) -> Result<(), LearnError> {
        let retired = self.corpus.deactivate_matching(text).await?;
        if retired > 0 {
            debug!(retired, "deactivated corpus items before relabel");
        }
        self.learn(text, intent).await
    }

    /// Populate an empty corpus with the built-in bilingual seed set
    ///
    /// A corpus that already has items is left alone; seeding twice would
    /// only duplicate vectors.
    pub async fn seed_defaults(&self) -> Result<usize, LearnError> {
        if !self.corpus.is_empty() {
            debug!(
                items = self.corpus.len_active(),
                "corpus already populated, skipping seed"
            );
            return Ok(0);
        }

        let mut added = 0;
        for (text, intent) in crate::corpus::seed_examples() {
            let normalized = crate::request::normalize(text);
            let embedding = self.embedder.embed(&normalized).await?;
            self.corpus
                .append(CorpusItem::seed(normalized, embedding, intent))
                .await?;
            added += 1;
        }
        Ok(added)
    }
}
