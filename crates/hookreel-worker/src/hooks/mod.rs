//! Hook text generation.
//!
//! A [`HookProvider`] hands out exactly the requested number of hook texts,
//! none of which was used by an earlier batch or repeats within the call.
//! Candidates come from a [`HookSource`]; every candidate is normalized,
//! validated and compared in canonical form against the persisted history.
//! The history is only extended once a request fully succeeds.

pub mod model;
pub mod template;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use hookreel_storage::HookHistory;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics::{names, record_counter};

pub use model::{CandidateModel, ModelHookSource};
pub use template::TemplateHookSource;

pub const MIN_HOOK_CHARS: usize = 30;
pub const MAX_HOOK_CHARS: usize = 180;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Form used for duplicate detection: lowercase, no punctuation, single spaces.
pub fn canonicalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    normalize(&stripped)
}

/// Shape check for a normalized candidate.
pub fn is_valid_hook(text: &str) -> bool {
    let len = text.chars().count();
    (MIN_HOOK_CHARS..=MAX_HOOK_CHARS).contains(&len)
        && text.contains(':')
        && text.ends_with(['.', '!', '?'])
}

/// Accepts candidates until enough unique, valid hooks are collected.
#[derive(Debug)]
pub struct HookCollector<'a> {
    history: &'a BTreeSet<String>,
    seen: HashSet<String>,
    accepted: Vec<String>,
    target: usize,
}

impl<'a> HookCollector<'a> {
    pub fn new(target: usize, history: &'a BTreeSet<String>) -> Self {
        Self {
            history,
            seen: HashSet::new(),
            accepted: Vec::with_capacity(target),
            target,
        }
    }

    /// Offer a raw candidate. Invalid and duplicate candidates are dropped.
    ///
    /// Returns whether the candidate was accepted.
    pub fn offer(&mut self, candidate: &str) -> bool {
        if self.is_full() {
            return false;
        }

        let text = normalize(candidate);
        if !is_valid_hook(&text) {
            return false;
        }

        let canonical = canonicalize(&text);
        if self.history.contains(&canonical) || !self.seen.insert(canonical) {
            return false;
        }

        self.accepted.push(text);
        true
    }

    pub fn is_full(&self) -> bool {
        self.accepted.len() >= self.target
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn into_accepted(self) -> Vec<String> {
        self.accepted
    }
}

/// A strategy producing candidate hook texts.
///
/// Implementations return exactly `count` texts accepted by a
/// [`HookCollector`] over `history`, or [`WorkerError::HookGenerationExhausted`].
#[async_trait]
pub trait HookSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, count: usize, history: &BTreeSet<String>)
        -> WorkerResult<Vec<String>>;
}

/// What the orchestrator asks for hook texts.
#[async_trait]
pub trait HookTextProvider: Send + Sync {
    async fn generate(&self, count: usize) -> WorkerResult<Vec<String>>;
}

/// [`HookTextProvider`] backed by a [`HookSource`] and the persisted history.
pub struct HookProvider {
    history: HookHistory,
    source: Arc<dyn HookSource>,
    /// Serializes load-generate-save cycles on the history file.
    lock: Mutex<()>,
}

impl HookProvider {
    pub fn new(history: HookHistory, source: Arc<dyn HookSource>) -> Self {
        Self {
            history,
            source,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl HookTextProvider for HookProvider {
    async fn generate(&self, count: usize) -> WorkerResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let _guard = self.lock.lock().await;

        let history = self.history.load().await?;
        debug!(
            source = self.source.name(),
            count,
            history = history.len(),
            "Generating hooks"
        );

        let hooks = self.source.generate(count, &history).await?;
        if hooks.len() != count {
            return Err(WorkerError::HookGenerationExhausted {
                requested: count,
                produced: hooks.len(),
                attempts: 0,
            });
        }

        let added = self
            .history
            .extend(hooks.iter().map(|h| canonicalize(h)))
            .await?;
        record_counter(names::HOOKS_GENERATED_TOTAL, added as u64);
        info!(source = self.source.name(), count, added, "Hooks generated");

        Ok(hooks)
    }
}
