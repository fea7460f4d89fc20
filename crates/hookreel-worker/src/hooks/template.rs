//! Hooks composed locally from fragment lists.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::debug;

use super::{HookCollector, HookSource};
use crate::error::{WorkerError, WorkerResult};

/// Attempts allowed per requested hook.
pub const ATTEMPTS_PER_HOOK: usize = 200;

const OPENERS: &[&str] = &[
    "I tried",
    "We tested",
    "I committed to",
    "My team tried",
    "I finally tried",
    "I secretly tested",
    "I went all in on",
    "I quietly started",
    "My roommate and I tried",
    "I challenged myself to",
    "I stuck with",
    "I doubled down on",
];

const TOPICS: &[&str] = &[
    "cold showers",
    "posting daily",
    "waking up at 5am",
    "phone-free mornings",
    "meal prepping",
    "journaling",
    "walking 10k steps",
    "reading before bed",
    "saying no to meetings",
    "learning Spanish",
    "running every evening",
    "cooking at home",
];

const WINDOWS: &[&str] = &[
    "for 7 days",
    "for 30 days",
    "for two weeks",
    "for a month",
    "for 100 days",
    "every day this year",
    "for one weekend",
    "for 21 days",
    "all summer",
    "for 90 days",
];

const REVEALS: &[&str] = &[
    "the results shocked",
    "this finally convinced",
    "the numbers stunned",
    "it changed everything for",
    "I can't stop telling",
    "the before and after surprised",
    "the outcome still confuses",
    "it quietly amazed",
    "nobody saw it coming, especially",
    "the last day made me call",
    "the difference was obvious to",
    "I owe an apology to",
];

const NAMES: &[&str] = &[
    "my coach",
    "my mom",
    "my boss",
    "my followers",
    "everyone at work",
    "my best friend",
    "my landlord",
    "my dentist",
    "my sister",
    "the whole team",
];

const ENDINGS: &[&str] = &[".", "!", "..."];

/// [`HookSource`] that composes
/// `"{opener} {topic} {window}: {reveal} {name}{ending}"` at random.
pub struct TemplateHookSource {
    rng: Mutex<StdRng>,
}

impl TemplateHookSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic source for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn compose(rng: &mut StdRng) -> Option<String> {
        Some(format!(
            "{} {} {}: {} {}{}",
            OPENERS.choose(rng)?,
            TOPICS.choose(rng)?,
            WINDOWS.choose(rng)?,
            REVEALS.choose(rng)?,
            NAMES.choose(rng)?,
            ENDINGS.choose(rng)?,
        ))
    }
}

impl Default for TemplateHookSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HookSource for TemplateHookSource {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn generate(
        &self,
        count: usize,
        history: &BTreeSet<String>,
    ) -> WorkerResult<Vec<String>> {
        let max_attempts = count.saturating_mul(ATTEMPTS_PER_HOOK);
        let mut collector = HookCollector::new(count, history);
        let mut attempts = 0;

        {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            while !collector.is_full() && attempts < max_attempts {
                attempts += 1;
                if let Some(candidate) = Self::compose(&mut rng) {
                    collector.offer(&candidate);
                }
            }
        }

        debug!(count, attempts, accepted = collector.accepted_count(), "Template composition finished");

        if !collector.is_full() {
            return Err(WorkerError::HookGenerationExhausted {
                requested: count,
                produced: collector.accepted_count(),
                attempts,
            });
        }

        Ok(collector.into_accepted())
    }
}
