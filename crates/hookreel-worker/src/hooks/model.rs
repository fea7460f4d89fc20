//! Hooks requested from a remote text-generation model.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use hookreel_remote::{GeminiClient, RemoteError, RemoteResult};

use super::{HookCollector, HookSource, MAX_HOOK_CHARS, MIN_HOOK_CHARS};
use crate::error::{WorkerError, WorkerResult};

pub const MAX_ROUNDS: usize = 4;

/// How many used hooks are quoted in the prompt as examples to avoid.
const AVOID_SAMPLE: usize = 40;

/// Anything that turns a prompt into a list of candidate strings.
#[async_trait]
pub trait CandidateModel: Send + Sync {
    async fn candidates(&self, prompt: &str) -> RemoteResult<Vec<String>>;
}

#[async_trait]
impl CandidateModel for GeminiClient {
    async fn candidates(&self, prompt: &str) -> RemoteResult<Vec<String>> {
        self.generate_json(prompt).await
    }
}

/// Candidates requested per round for `count` hooks.
pub fn batch_size(count: usize) -> usize {
    (count * 2).max(count + 4)
}

/// [`HookSource`] asking a model for batches of candidates.
pub struct ModelHookSource {
    model: Arc<dyn CandidateModel>,
}

impl ModelHookSource {
    pub fn new(model: Arc<dyn CandidateModel>) -> Self {
        Self { model }
    }

    fn prompt(request: usize, avoid: &[&str]) -> String {
        let mut prompt = format!(
            "Write {request} short, punchy first-person marketing hooks for vertical videos.\n\
             Rules for every hook:\n\
             - between {MIN_HOOK_CHARS} and {MAX_HOOK_CHARS} characters\n\
             - a setup, then a colon, then the reveal\n\
             - ends with '.', '!' or '?'\n\
             - every hook is different from the others\n\
             Return only a JSON array of strings."
        );

        if !avoid.is_empty() {
            prompt.push_str("\nDo not reuse or paraphrase any of these:\n");
            for hook in avoid {
                prompt.push_str("- ");
                prompt.push_str(hook);
                prompt.push('\n');
            }
        }

        prompt
    }
}

#[async_trait]
impl HookSource for ModelHookSource {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn generate(
        &self,
        count: usize,
        history: &BTreeSet<String>,
    ) -> WorkerResult<Vec<String>> {
        let request = batch_size(count);
        let mut collector = HookCollector::new(count, history);
        let mut offered = 0;

        for round in 1..=MAX_ROUNDS {
            if collector.is_full() {
                break;
            }

            let avoid: Vec<&str> = collector
                .accepted()
                .iter()
                .map(String::as_str)
                .chain(history.iter().rev().map(String::as_str))
                .take(AVOID_SAMPLE)
                .collect();

            let candidates = match self.model.candidates(&Self::prompt(request, &avoid)).await {
                Ok(candidates) => candidates,
                Err(e) if is_round_recoverable(&e) => {
                    warn!(round, "Hook model round failed: {}", e);
                    continue;
                }
                Err(e) => return Err(WorkerError::HookGenerationFailed(e)),
            };

            offered += candidates.len();
            let before = collector.accepted_count();
            for candidate in &candidates {
                collector.offer(candidate);
            }
            debug!(
                round,
                received = candidates.len(),
                accepted = collector.accepted_count() - before,
                "Hook model round finished"
            );
        }

        if !collector.is_full() {
            return Err(WorkerError::HookGenerationExhausted {
                requested: count,
                produced: collector.accepted_count(),
                attempts: offered,
            });
        }

        Ok(collector.into_accepted())
    }
}

/// A round whose reply was unusable costs the round, not the request.
fn is_round_recoverable(error: &RemoteError) -> bool {
    error.is_retryable()
        || matches!(
            error,
            RemoteError::Json(_) | RemoteError::EmptyResponse(_) | RemoteError::InvalidResponse(_)
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays one scripted reply per call.
    struct ScriptedModel {
        replies: Mutex<Vec<RemoteResult<Vec<String>>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<RemoteResult<Vec<String>>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CandidateModel for ScriptedModel {
        async fn candidates(&self, prompt: &str) -> RemoteResult<Vec<String>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn hooks(texts: &[&str]) -> RemoteResult<Vec<String>> {
        Ok(texts.iter().map(|t| t.to_string()).collect())
    }

    const A: &str = "I tried cold showers for 30 days: the results shocked my coach!";
    const B: &str = "We tested journaling for 7 days: it quietly amazed my mom.";
    const C: &str = "I stuck with running for 90 days: my boss noticed first.";

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(1), 5);
        assert_eq!(batch_size(4), 8);
        assert_eq!(batch_size(10), 20);
    }

    #[tokio::test]
    async fn test_collects_across_rounds_and_filters() {
        let model = Arc::new(ScriptedModel::new(vec![
            hooks(&[A, "bad hook", A]),
            Err(RemoteError::EmptyResponse("Gemini")),
            hooks(&[B, C]),
        ]));
        let source = ModelHookSource::new(model.clone());

        let result = source.generate(2, &BTreeSet::new()).await.unwrap();
        assert_eq!(result, vec![A.to_string(), B.to_string()]);

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].starts_with("Write 6 short"));
        assert!(prompts[2].contains(A));
    }

    #[tokio::test]
    async fn test_exhausts_after_max_rounds() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let source = ModelHookSource::new(model.clone());

        let err = source.generate(1, &BTreeSet::new()).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::HookGenerationExhausted { requested: 1, produced: 0, .. }
        ));
        assert_eq!(model.prompts.lock().unwrap().len(), MAX_ROUNDS);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_immediately() {
        let model = Arc::new(ScriptedModel::new(vec![Err(RemoteError::MissingCredential(
            "GEMINI_API_KEY",
        ))]));
        let source = ModelHookSource::new(model.clone());

        let err = source.generate(1, &BTreeSet::new()).await.unwrap_err();
        assert!(matches!(err, WorkerError::HookGenerationFailed(_)));
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }
}
