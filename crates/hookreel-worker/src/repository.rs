//! In-process job records.
//!
//! The orchestrator keeps the live copy of every job it touched here. The
//! durable snapshots in the job store are only consulted for ids this
//! repository does not know.

use std::collections::HashMap;
use std::sync::RwLock;

use hookreel_models::{Job, JobId};

/// Keyed job records with whole-value replacement.
pub trait JobRepository: Send + Sync {
    fn get(&self, id: &JobId) -> Option<Job>;

    /// Insert or replace the record for `job.id`.
    fn set(&self, job: Job);

    fn remove(&self, id: &JobId) -> Option<Job>;

    fn list(&self) -> Vec<Job>;
}

/// [`JobRepository`] held in a map.
#[derive(Debug, Default)]
pub struct MemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRepository for MemoryJobRepository {
    fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn set(&self, job: Job) {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id.clone(), job);
    }

    fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    fn list(&self) -> Vec<Job> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}
