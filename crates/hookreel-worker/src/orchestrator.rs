//! Batch job lifecycle.
//!
//! `create` records a queued job, persists it and appends its execution to
//! the process-wide [`SequentialQueue`], so at most one batch runs at a time.
//! Execution persists a full snapshot after every job or item transition.
//! Whatever goes wrong inside an execution, including a panic, ends as a
//! durable `failed` job; nothing escapes into the queue.
//!
//! Reads prefer the in-process record. A snapshot found only on disk that is
//! still `queued` or `running` belongs to a process that died mid-run; it is
//! marked failed, persisted and cached on first read.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, warn, Instrument};

use hookreel_models::{ItemStatus, Job, JobId, Manifest, MAX_BATCH_SIZE};
use hookreel_storage::{JobStore, OutputLayout};

use crate::error::{WorkerError, WorkerResult};
use crate::hooks::HookTextProvider;
use crate::logging::JobLogger;
use crate::metrics;
use crate::processor::{ItemProcessor, ItemSpec};
use crate::queue::{panic_message, SequentialQueue};
use crate::repository::JobRepository;

/// Where a record returned by [`BatchOrchestrator::get`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// Live record of this process
    Memory,
    /// Terminal snapshot loaded from disk
    Disk,
    /// Stale in-flight snapshot, now marked failed
    Reconciled,
    /// No record anywhere; a synthesized placeholder
    NotFound,
}

#[derive(Debug, Clone)]
pub struct ResolvedJob {
    pub job: Job,
    pub origin: JobOrigin,
}

impl ResolvedJob {
    pub fn is_placeholder(&self) -> bool {
        self.origin == JobOrigin::NotFound
    }
}

/// Collaborators of the orchestrator.
pub struct OrchestratorDeps {
    pub store: Arc<dyn JobStore>,
    pub repository: Arc<dyn JobRepository>,
    pub hooks: Arc<dyn HookTextProvider>,
    pub processor: Arc<dyn ItemProcessor>,
    pub layout: OutputLayout,
}

/// Shared orchestrator state.
///
/// Nothing here is ever evicted: every job this process created or read
/// stays in `repository` and `created` until the process exits. That bound
/// is the number of batches one service instance handles between restarts.
struct Inner {
    store: Arc<dyn JobStore>,
    repository: Arc<dyn JobRepository>,
    hooks: Arc<dyn HookTextProvider>,
    processor: Arc<dyn ItemProcessor>,
    layout: OutputLayout,
    queue: SequentialQueue,
    /// Ids created by this process
    created: StdMutex<HashSet<JobId>>,
    /// Serializes reconciliation so concurrent reads agree on one record.
    reconcile: Mutex<()>,
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    inner: Arc<Inner>,
}

impl BatchOrchestrator {
    /// Build the orchestrator and start its queue worker.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: deps.store,
                repository: deps.repository,
                hooks: deps.hooks,
                processor: deps.processor,
                layout: deps.layout,
                queue: SequentialQueue::start(),
                created: StdMutex::new(HashSet::new()),
                reconcile: Mutex::new(()),
            }),
        }
    }

    /// Create a job of `total` items and queue its execution.
    ///
    /// Returns as soon as the queued job is persisted.
    pub async fn create(&self, total: u32) -> WorkerResult<Job> {
        if total == 0 || total > MAX_BATCH_SIZE {
            return Err(WorkerError::InvalidBatchSize(total));
        }

        let job = Job::new(total);
        let id = job.id.clone();

        self.inner.repository.set(job.clone());
        if let Err(e) = self.inner.store.persist(&job).await {
            self.inner.repository.remove(&id);
            return Err(e.into());
        }
        self.created_ids().insert(id.clone());

        let this = self.clone();
        let queued_id = id.clone();
        if let Err(e) = self
            .inner
            .queue
            .enqueue(async move { this.run(queued_id).await })
        {
            self.record_failure(&id, e.to_string()).await;
            return Err(e);
        }

        metrics::record_job_created(total);
        debug!(job_id = %id, total, queue_depth = self.inner.queue.depth(), "Batch queued");
        Ok(job)
    }

    /// Look up a job, reconciling stale snapshots.
    pub async fn get(&self, id: &JobId) -> WorkerResult<ResolvedJob> {
        if let Some(job) = self.inner.repository.get(id) {
            return Ok(ResolvedJob {
                job,
                origin: JobOrigin::Memory,
            });
        }

        let _guard = self.inner.reconcile.lock().await;

        // Another reader may have reconciled while we waited.
        if let Some(job) = self.inner.repository.get(id) {
            return Ok(ResolvedJob {
                job,
                origin: JobOrigin::Memory,
            });
        }

        match self.inner.store.load(id).await? {
            Some(job) => {
                let (job, reconciled) = self.reconcile_loaded(job).await?;
                Ok(ResolvedJob {
                    job,
                    origin: if reconciled {
                        JobOrigin::Reconciled
                    } else {
                        JobOrigin::Disk
                    },
                })
            }
            None => Ok(ResolvedJob {
                job: Job::not_found_placeholder(id.clone()),
                origin: JobOrigin::NotFound,
            }),
        }
    }

    /// Every known job, newest first. In-process records win over snapshots.
    pub async fn list_all(&self) -> WorkerResult<Vec<Job>> {
        let mut jobs: HashMap<JobId, Job> = self
            .inner
            .repository
            .list()
            .into_iter()
            .map(|job| (job.id.clone(), job))
            .collect();

        let stored = self.inner.store.list_all().await?;

        let _guard = self.inner.reconcile.lock().await;
        for job in stored {
            if jobs.contains_key(&job.id) {
                continue;
            }
            // Reconciled by a concurrent read after the listing above.
            if let Some(live) = self.inner.repository.get(&job.id) {
                jobs.insert(live.id.clone(), live);
                continue;
            }
            let (job, _) = self.reconcile_loaded(job).await?;
            jobs.insert(job.id.clone(), job);
        }

        let mut jobs: Vec<Job> = jobs.into_values().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Whether `id` was created by this process.
    pub fn was_created(&self, id: &JobId) -> bool {
        self.created_ids().contains(id)
    }

    /// Jobs queued or running in this process.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.depth()
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.inner.layout
    }

    fn created_ids(&self) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
        self.inner
            .created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Fail a disk-only record left in flight, persist and cache it.
    ///
    /// Caller holds the reconcile lock.
    async fn reconcile_loaded(&self, mut job: Job) -> WorkerResult<(Job, bool)> {
        if !job.reconcile_interrupted() {
            return Ok((job, false));
        }

        warn!(job_id = %job.id, "Marking job interrupted by restart as failed");
        self.inner.store.persist(&job).await?;
        self.inner.repository.set(job.clone());
        metrics::record_job_reconciled();
        Ok((job, true))
    }

    /// Queue entry point: execute and convert every failure into job state.
    async fn run(&self, id: JobId) {
        let logger = JobLogger::new(&id, "execute");
        let span = logger.create_span();

        let outcome = AssertUnwindSafe(self.execute(&id, &logger).instrument(span))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => WorkerError::Panicked(panic_message(panic.as_ref())).to_string(),
        };

        logger.log_error(&message);
        self.record_failure(&id, message).await;
    }

    async fn execute(&self, id: &JobId, logger: &JobLogger) -> WorkerResult<()> {
        let mut job = self
            .inner
            .repository
            .get(id)
            .ok_or_else(|| WorkerError::UnknownJob(id.to_string()))?;

        job.start()?;
        self.save(&job).await?;
        logger.log_start(&format!("{} items", job.total));

        let texts = self.inner.hooks.generate(job.total as usize).await?;
        if texts.len() != job.total as usize {
            return Err(WorkerError::HookGenerationExhausted {
                requested: job.total as usize,
                produced: texts.len(),
                attempts: 0,
            });
        }

        let item_logger = logger.for_stage("item");
        for (index, text) in (1..=job.total).zip(texts) {
            job.begin_item(index, text.clone(), OutputLayout::item_url(&job.id, index))?;
            self.save(&job).await?;
            item_logger.log_item(index, "running");

            let spec = ItemSpec {
                job_id: job.id.clone(),
                index,
                text,
                output_path: self.inner.layout.item_path(&job.id, index),
                work_dir: self.inner.layout.work_dir(&job.id, index),
            };

            let started = Instant::now();
            match self.inner.processor.process(&spec).await {
                Ok(_) => {
                    metrics::record_item("done", started.elapsed().as_secs_f64());
                    job.complete_item(index)?;
                    self.save(&job).await?;
                    item_logger.log_item(index, "done");
                }
                Err(e) => {
                    metrics::record_item("failed", started.elapsed().as_secs_f64());
                    job.fail_item(index)?;
                    self.save(&job).await?;
                    item_logger.log_item(index, &format!("failed: {}", e));
                    return Err(e);
                }
            }
            logger.log_progress(&format!("{}/{}", job.progress, job.total));
        }

        let finished_at = Utc::now();
        let manifest_url = self
            .inner
            .store
            .write_manifest(&Manifest::from_job(&job, finished_at))
            .await?;
        job.complete(manifest_url, finished_at)?;
        self.save(&job).await?;

        metrics::record_job_completed();
        logger.log_completion(&format!("{} clips", job.progress));
        Ok(())
    }

    /// Persist the snapshot, then publish the in-process record.
    async fn save(&self, job: &Job) -> WorkerResult<()> {
        self.inner.store.persist(job).await?;
        self.inner.repository.set(job.clone());
        Ok(())
    }

    async fn record_failure(&self, id: &JobId, message: String) {
        let Some(mut job) = self.inner.repository.get(id) else {
            warn!(job_id = %id, "Cannot record failure of unknown job: {}", message);
            return;
        };

        if !job.fail(message) {
            return;
        }

        metrics::record_job_failed(if job.items.iter().any(|i| i.status.is_terminal()) {
            "item"
        } else {
            "setup"
        });

        if let Err(e) = self.inner.store.persist(&job).await {
            warn!(job_id = %id, "Failed to persist job failure: {}", e);
        }
        self.inner.repository.set(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;
    use hookreel_models::{JobStatus, RESTART_INTERRUPTED_MESSAGE};
    use tokio::sync::Notify;
    use hookreel_remote::RemoteError;
    use hookreel_storage::{FileJobStore, HookHistory};

    use crate::hooks::{HookProvider, TemplateHookSource};
    use crate::repository::MemoryJobRepository;

    /// Writes a small file per item; fails on configured indexes.
    #[derive(Default)]
    struct FakeProcessor {
        fail_on: Vec<u32>,
        panic_on: Vec<u32>,
        delay: Duration,
        /// Index that signals `reached` and waits for `release`
        hold_on: Option<u32>,
        reached: Notify,
        release: Notify,
        /// (job, index, event) in the order they happened
        events: StdMutex<Vec<(JobId, u32, &'static str)>>,
    }

    #[async_trait]
    impl ItemProcessor for FakeProcessor {
        async fn process(&self, spec: &ItemSpec) -> WorkerResult<PathBuf> {
            self.events
                .lock()
                .unwrap()
                .push((spec.job_id.clone(), spec.index, "start"));
            tokio::time::sleep(self.delay).await;

            if self.hold_on == Some(spec.index) {
                self.reached.notify_one();
                self.release.notified().await;
            }

            if self.panic_on.contains(&spec.index) {
                panic!("renderer crashed");
            }

            let result = if self.fail_on.contains(&spec.index) {
                Err(WorkerError::LipsyncRender(RemoteError::PredictionFailed {
                    id: "p1".to_string(),
                    status: "failed".to_string(),
                    message: "face not detected".to_string(),
                }))
            } else {
                tokio::fs::create_dir_all(spec.output_path.parent().unwrap())
                    .await
                    .unwrap();
                tokio::fs::write(&spec.output_path, spec.text.as_bytes())
                    .await
                    .unwrap();
                Ok(spec.output_path.clone())
            };

            self.events
                .lock()
                .unwrap()
                .push((spec.job_id.clone(), spec.index, "end"));
            result
        }
    }

    struct FailingHooks;

    #[async_trait]
    impl HookTextProvider for FailingHooks {
        async fn generate(&self, count: usize) -> WorkerResult<Vec<String>> {
            Err(WorkerError::HookGenerationExhausted {
                requested: count,
                produced: 0,
                attempts: count * 200,
            })
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        orchestrator: BatchOrchestrator,
        processor: Arc<FakeProcessor>,
        store: Arc<FileJobStore>,
    }

    fn harness_with(
        dir: tempfile::TempDir,
        processor: FakeProcessor,
        hooks: Option<Arc<dyn HookTextProvider>>,
    ) -> Harness {
        let layout = OutputLayout::new(dir.path());
        let store = Arc::new(FileJobStore::new(layout.clone()));
        let processor = Arc::new(processor);
        let hooks = hooks.unwrap_or_else(|| {
            Arc::new(HookProvider::new(
                HookHistory::new(layout.hook_history_path()),
                Arc::new(TemplateHookSource::with_seed(3)),
            ))
        });

        let orchestrator = BatchOrchestrator::new(OrchestratorDeps {
            store: store.clone(),
            repository: Arc::new(MemoryJobRepository::new()),
            hooks,
            processor: processor.clone(),
            layout,
        });

        Harness {
            dir,
            orchestrator,
            processor,
            store,
        }
    }

    fn harness(processor: FakeProcessor) -> Harness {
        harness_with(tempfile::tempdir().unwrap(), processor, None)
    }

    async fn wait_terminal(orchestrator: &BatchOrchestrator, id: &JobId) -> Job {
        for _ in 0..500 {
            let job = orchestrator.get(id).await.unwrap().job;
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn test_create_returns_queued_job_with_all_items() {
        let h = harness(FakeProcessor {
            delay: Duration::from_millis(50),
            ..Default::default()
        });

        let job = h.orchestrator.create(4).await.unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.items.len(), 4);
        assert!(job.items.iter().all(|i| i.status == ItemStatus::Queued));
        assert_eq!(job.progress, 0);
        assert!(h.orchestrator.was_created(&job.id));

        let stored = h.store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.id, job.id);
    }

    #[tokio::test]
    async fn test_rejects_invalid_batch_size() {
        let h = harness(FakeProcessor::default());
        tokio_test::assert_err!(h.orchestrator.create(0).await);
        assert!(matches!(
            h.orchestrator.create(0).await,
            Err(WorkerError::InvalidBatchSize(0))
        ));
        assert!(matches!(
            h.orchestrator.create(MAX_BATCH_SIZE + 1).await,
            Err(WorkerError::InvalidBatchSize(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_batch_completes_with_manifest() {
        let h = harness(FakeProcessor::default());

        let job = h.orchestrator.create(3).await.unwrap();
        let done = wait_terminal(&h.orchestrator, &job.id).await;

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 3);
        assert!(done.error.is_none());
        assert!(done.started_at.is_some());
        assert!(done.finished_at.is_some());
        assert!(done.items.iter().all(|i| i.status == ItemStatus::Done));
        assert_eq!(
            done.items[1].file.as_deref(),
            Some(format!("/outputs/{}/hook_02.mp4", job.id).as_str())
        );
        assert_eq!(
            done.manifest_url.as_deref(),
            Some(format!("/outputs/{}/manifest.json", job.id).as_str())
        );

        let manifest_path = h.orchestrator.layout().manifest_path(&job.id);
        let manifest: Manifest =
            serde_json::from_slice(&std::fs::read(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest.total, 3);
        assert_eq!(manifest.finished_at, done.finished_at);

        let stored = h.store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(stored, done);

        // Every item got a distinct hook.
        let texts: HashSet<_> = done.items.iter().map(|i| i.text.clone().unwrap()).collect();
        assert_eq!(texts.len(), 3);
    }

    #[tokio::test]
    async fn test_item_failure_stops_the_batch() {
        let h = harness(FakeProcessor {
            fail_on: vec![2],
            ..Default::default()
        });

        let job = h.orchestrator.create(3).await.unwrap();
        let done = wait_terminal(&h.orchestrator, &job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.progress, 1);
        let statuses: Vec<_> = done.items.iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            vec![ItemStatus::Done, ItemStatus::Failed, ItemStatus::Queued]
        );
        assert_eq!(
            done.error.as_deref(),
            Some("Lip-sync rendering failed: Prediction p1 failed: face not detected")
        );
        assert!(done.items[1].file.is_none());
        assert!(done.items[2].text.is_none());
        assert!(done.manifest_url.is_none());

        let stored = h.store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(stored, done);

        let started: Vec<u32> = h
            .processor
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, e)| *e == "start")
            .map(|(_, i, _)| *i)
            .collect();
        assert_eq!(started, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_hook_failure_fails_job_before_any_item() {
        let h = harness_with(
            tempfile::tempdir().unwrap(),
            FakeProcessor::default(),
            Some(Arc::new(FailingHooks)),
        );

        let job = h.orchestrator.create(2).await.unwrap();
        let done = wait_terminal(&h.orchestrator, &job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done
            .error
            .as_deref()
            .unwrap()
            .starts_with("Hook generation exhausted"));
        assert!(done.items.iter().all(|i| i.status == ItemStatus::Queued));
        assert!(h.processor.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panic_in_item_fails_job_and_queue_continues() {
        let h = harness(FakeProcessor {
            panic_on: vec![1],
            ..Default::default()
        });

        let first = h.orchestrator.create(1).await.unwrap();
        let done = wait_terminal(&h.orchestrator, &first.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(
            done.error.as_deref(),
            Some("Job execution panicked: renderer crashed")
        );

        let second = h.orchestrator.create(2).await.unwrap();
        let done = wait_terminal(&h.orchestrator, &second.id).await;
        // Item 1 panics again; what matters is that the queue still ran it.
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.items[0].status, ItemStatus::Failed);
        assert!(done.started_at.is_some());
    }

    #[tokio::test]
    async fn test_back_to_back_jobs_run_sequentially() {
        let h = harness(FakeProcessor {
            delay: Duration::from_millis(20),
            ..Default::default()
        });

        let (a, b) = tokio::join!(h.orchestrator.create(2), h.orchestrator.create(2));
        let (a, b) = (a.unwrap(), b.unwrap());

        let a_done = wait_terminal(&h.orchestrator, &a.id).await;
        let b_done = wait_terminal(&h.orchestrator, &b.id).await;
        assert_eq!(a_done.status, JobStatus::Completed);
        assert_eq!(b_done.status, JobStatus::Completed);

        // Events of one job never interleave with the other's.
        let events = h.processor.events.lock().unwrap().clone();
        assert_eq!(events.len(), 8);
        let first_job = events[0].0.clone();
        assert!(events[..4].iter().all(|(id, _, _)| *id == first_job));
        assert!(events[4..].iter().all(|(id, _, _)| *id != first_job));

        // The later job started only after the earlier one finished.
        let (earlier, later) = if first_job == a.id {
            (a_done, b_done)
        } else {
            (b_done, a_done)
        };
        assert!(later.started_at.unwrap() >= earlier.finished_at.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_is_current_while_item_renders() {
        let h = harness(FakeProcessor {
            hold_on: Some(2),
            ..Default::default()
        });

        let job = h.orchestrator.create(3).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), h.processor.reached.notified())
            .await
            .unwrap();

        let snapshot = h.store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.finished_at.is_none());
        assert_eq!(snapshot.progress, 1);

        let done = &snapshot.items[0];
        assert_eq!(done.status, ItemStatus::Done);
        assert_eq!(
            done.file.as_deref(),
            Some(format!("/outputs/{}/hook_01.mp4", job.id).as_str())
        );

        let current = &snapshot.items[1];
        assert_eq!(current.status, ItemStatus::Running);
        assert!(current.text.is_some());
        assert_eq!(
            current.file.as_deref(),
            Some(format!("/outputs/{}/hook_02.mp4", job.id).as_str())
        );

        let pending = &snapshot.items[2];
        assert_eq!(pending.status, ItemStatus::Queued);
        assert!(pending.text.is_none());

        // The in-process view matches what is on disk.
        assert_eq!(h.orchestrator.get(&job.id).await.unwrap().job, snapshot);

        h.processor.release.notify_one();
        let finished = wait_terminal(&h.orchestrator, &job.id).await;
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.progress, 3);
    }

    #[tokio::test]
    async fn test_get_never_created_id_returns_placeholder() {
        let h = harness(FakeProcessor::default());
        let id = JobId::from("never-created-id");

        let resolved = h.orchestrator.get(&id).await.unwrap();

        assert!(resolved.is_placeholder());
        assert!(!h.orchestrator.was_created(&id));
        assert_eq!(resolved.job.status, JobStatus::Failed);
        assert_eq!(resolved.job.items.len(), 10);
        assert!(resolved.job.items.iter().all(|i| i.status == ItemStatus::Failed));
        assert_eq!(resolved.job.error.as_deref(), Some(RESTART_INTERRUPTED_MESSAGE));

        // Placeholders are neither persisted nor cached.
        assert!(h.store.load(&id).await.unwrap().is_none());
        let again = h.orchestrator.get(&id).await.unwrap();
        assert_eq!(again.job, resolved.job);
    }

    #[tokio::test]
    async fn test_restart_reconciliation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();

        // A previous process left a job mid-run.
        let mut stale = Job::new(3);
        stale.start().unwrap();
        stale
            .begin_item(1, "Old hook: still running.", "/outputs/x/hook_01.mp4")
            .unwrap();
        FileJobStore::new(OutputLayout::new(dir.path()))
            .persist(&stale)
            .await
            .unwrap();

        let h = harness_with(dir, FakeProcessor::default(), None);

        let first = h.orchestrator.get(&stale.id).await.unwrap();
        assert_eq!(first.origin, JobOrigin::Reconciled);
        assert_eq!(first.job.status, JobStatus::Failed);
        assert_eq!(first.job.error.as_deref(), Some(RESTART_INTERRUPTED_MESSAGE));
        assert!(first.job.finished_at.is_some());
        assert_eq!(first.job.items.len(), 3);

        // The item the dead process was rendering fails with the job.
        let interrupted = &first.job.items[0];
        assert_eq!(interrupted.status, ItemStatus::Failed);
        assert!(interrupted.file.is_none());
        assert_eq!(interrupted.text.as_deref(), Some("Old hook: still running."));
        assert_eq!(first.job.items[1].status, ItemStatus::Queued);

        let second = h.orchestrator.get(&stale.id).await.unwrap();
        assert_eq!(second.origin, JobOrigin::Memory);
        assert_eq!(second.job, first.job);

        let stored = h.store.load(&stale.id).await.unwrap().unwrap();
        assert_eq!(stored, first.job);
        assert!(h.dir.path().join("outputs").exists());
    }

    #[tokio::test]
    async fn test_terminal_snapshot_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let mut old = Job::new(1);
        old.start().unwrap();
        old.fail("Speech synthesis failed: quota");
        FileJobStore::new(OutputLayout::new(dir.path()))
            .persist(&old)
            .await
            .unwrap();

        let h = harness_with(dir, FakeProcessor::default(), None);
        let resolved = h.orchestrator.get(&old.id).await.unwrap();

        assert_eq!(resolved.origin, JobOrigin::Disk);
        assert_eq!(resolved.job, old);
    }

    #[tokio::test]
    async fn test_list_all_merges_reconciles_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(OutputLayout::new(dir.path()));

        let mut stale = Job::new(2);
        stale.created_at = Some(Utc::now() - chrono::Duration::hours(2));
        store.persist(&stale).await.unwrap();

        let mut finished = Job::new(1);
        finished.created_at = Some(Utc::now() - chrono::Duration::hours(1));
        finished.start().unwrap();
        finished.fail("boom");
        store.persist(&finished).await.unwrap();

        let h = harness_with(dir, FakeProcessor::default(), None);
        let fresh = h.orchestrator.create(1).await.unwrap();
        wait_terminal(&h.orchestrator, &fresh.id).await;

        let jobs = h.orchestrator.list_all().await.unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![fresh.id.clone(), finished.id.clone(), stale.id.clone()]);

        assert_eq!(jobs[0].status, JobStatus::Completed);
        assert_eq!(jobs[2].status, JobStatus::Failed);
        assert_eq!(jobs[2].error.as_deref(), Some(RESTART_INTERRUPTED_MESSAGE));

        let stored = h.store.load(&stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_hooks_unique_across_batches() {
        let h = harness(FakeProcessor::default());

        let a = h.orchestrator.create(5).await.unwrap();
        let b = h.orchestrator.create(5).await.unwrap();
        let a = wait_terminal(&h.orchestrator, &a.id).await;
        let b = wait_terminal(&h.orchestrator, &b.id).await;

        let canon = |job: &Job| -> HashSet<String> {
            job.items
                .iter()
                .map(|i| crate::hooks::canonicalize(i.text.as_deref().unwrap()))
                .collect()
        };
        assert_eq!(canon(&a).len(), 5);
        assert!(canon(&a).is_disjoint(&canon(&b)));
    }
}
