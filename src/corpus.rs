//! Labeled example corpus for the semantic matcher
//!
//! Grow-only store of (text, embedding, intent) examples. Curated items are
//! seeded at install time; the learning path appends items confirmed by user
//! feedback. Items are never deleted, only deactivated, so a bad learned
//! example can be retired without rewriting history.
//!
//! Persistence is a JSONL file: one item per line, appended on learn. The
//! whole file is rewritten only on deactivation, which is rare and
//! operator-adjacent. A missing or corrupt file at startup is fatal; an
//! empty corpus is valid and simply never matches.

use crate::config::ConfigError;
use crate::decision::IntentLabel;
use crate::embedding::similarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Where a corpus item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusSource {
    /// Shipped with the assistant or added by an operator
    Seed,
    /// Appended by the learning path after confirmed feedback
    Learned,
}

/// One labeled example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusItem {
    pub text: String,
    pub embedding: Vec<f32>,
    pub intent: IntentLabel,
    pub source: CorpusSource,
    #[serde(default = "default_active")]
    pub active: bool,
    pub added_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl CorpusItem {
    pub fn learned<S: Into<String>>(text: S, embedding: Vec<f32>, intent: IntentLabel) -> Self {
        Self {
            text: text.into(),
            embedding,
            intent,
            source: CorpusSource::Learned,
            active: true,
            added_at: Utc::now(),
        }
    }

    pub fn seed<S: Into<String>>(text: S, embedding: Vec<f32>, intent: IntentLabel) -> Self {
        Self {
            text: text.into(),
            embedding,
            intent,
            source: CorpusSource::Seed,
            active: true,
            added_at: Utc::now(),
        }
    }
}

/// Nearest-neighbor result
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusMatch {
    pub intent: IntentLabel,
    pub score: f32,
}

/// Concurrent example store; reads are shared, appends exclusive and short
#[derive(Debug)]
pub struct ExampleCorpus {
    items: RwLock<Vec<CorpusItem>>,
    path: Option<PathBuf>,
    // Serializes file writes; the in-memory vector has its own lock
    persist_lock: tokio::sync::Mutex<()>,
}

impl ExampleCorpus {
    /// Load the corpus from a JSONL file; missing or corrupt files are fatal
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::StateLoad(format!(
                "corpus file {} does not exist; initialize the state directory first",
                path.display()
            )),
            _ => ConfigError::StateLoad(format!("corpus file {}: {e}", path.display())),
        })?;

        let mut items = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let item: CorpusItem = serde_json::from_str(line).map_err(|e| {
                ConfigError::StateLoad(format!(
                    "corpus file {} line {}: {e}",
                    path.display(),
                    index + 1
                ))
            })?;
            items.push(item);
        }

        Ok(Self {
            items: RwLock::new(items),
            path: Some(path.to_path_buf()),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Create the corpus file, and its parent directory, if missing
    ///
    /// [`load`](Self::load) refuses to start without the file; `init` calls
    /// this before anything else. Existing content is left untouched.
    pub fn bootstrap(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(())
    }

    /// Build a corpus that lives only in memory (tests, embedded use)
    pub fn in_memory(items: Vec<CorpusItem>) -> Self {
        Self {
            items: RwLock::new(items),
            path: None,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Nearest active item by cosine similarity, if any
    pub fn nearest(&self, embedding: &[f32]) -> Option<CorpusMatch> {
        let items = self.items.read().unwrap();
        let mut best: Option<CorpusMatch> = None;
        for item in items.iter().filter(|item| item.active) {
            let score = similarity(embedding, &item.embedding);
            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(CorpusMatch {
                    intent: item.intent.clone(),
                    score,
                });
            }
        }
        best
    }

    /// Append an item and persist it; the in-memory item survives a failed
    /// file write so the caller can just log the error
    pub async fn append(&self, item: CorpusItem) -> Result<(), std::io::Error> {
        let _guard = self.persist_lock.lock().await;

        let line = serde_json::to_string(&item).map_err(std::io::Error::other)?;
        self.items.write().unwrap().push(item);

        if let Some(path) = &self.path {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
        }
        Ok(())
    }

    /// Deactivate every active item with the given normalized text
    ///
    /// Used when feedback corrects a learned example: the old label is
    /// retired before the corrected pair is appended. Rewrites the file.
    pub async fn deactivate_matching(&self, text: &str) -> Result<usize, std::io::Error> {
        let _guard = self.persist_lock.lock().await;

        let retired = {
            let mut items = self.items.write().unwrap();
            let mut retired = 0;
            for item in items.iter_mut() {
                if item.active && item.text == text {
                    item.active = false;
                    retired += 1;
                }
            }
            retired
        };

        if retired > 0 {
            if let Some(path) = &self.path {
                let lines = {
                    let items = self.items.read().unwrap();
                    items
                        .iter()
                        .map(serde_json::to_string)
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(std::io::Error::other)?
                };
                tokio::fs::write(path, format!("{}\n", lines.join("\n"))).await?;
            }
        }
        Ok(retired)
    }

    /// Number of active items
    pub fn len_active(&self) -> usize {
        self.items
            .read()
            .unwrap()
            .iter()
            .filter(|item| item.active)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len_active() == 0
    }

    /// Total items including deactivated ones
    pub fn len_total(&self) -> usize {
        self.items.read().unwrap().len()
    }
}

/// Curated starter examples; embedded by `switchboard init`
pub fn seed_examples() -> Vec<(&'static str, IntentLabel)> {
    vec![
        ("привет", IntentLabel::Greeting),
        ("добрый день", IntentLabel::Greeting),
        ("hello there", IntentLabel::Greeting),
        ("как дела", IntentLabel::Conversation),
        ("расскажи что-нибудь интересное", IntentLabel::Conversation),
        ("напиши функцию сортировки", IntentLabel::Coding),
        ("исправь баг в этом коде", IntentLabel::Coding),
        ("write a python script that parses csv", IntentLabel::Coding),
        ("найди рецепт борща", IntentLabel::Search),
        ("find the nearest pharmacy", IntentLabel::Search),
        ("сравни эти два подхода и сделай выводы", IntentLabel::Research),
        ("проанализируй эту статью подробно", IntentLabel::Research),
        ("включи приватный режим", IntentLabel::PrivacyUnlock),
        ("switch to private mode", IntentLabel::PrivacyUnlock),
        ("перезагрузи компьютер", IntentLabel::SystemCommand),
        ("выключи музыку", IntentLabel::SystemCommand),
        ("удали старые логи", IntentLabel::DeleteRequest),
        ("очисти корзину", IntentLabel::DeleteRequest),
    ]
}
