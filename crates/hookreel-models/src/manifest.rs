//! Summary written once a batch completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::job::{Job, JobId};

/// Run summary stored next to the rendered clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: JobId,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total: u32,
    pub items: Vec<Item>,
}

impl Manifest {
    /// Summarize a job, stamping `finished_at` with `finished_at`.
    ///
    /// The manifest is written before the job is marked completed, so the
    /// caller passes the completion time it is about to record.
    pub fn from_job(job: &Job, finished_at: DateTime<Utc>) -> Self {
        Self {
            id: job.id.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: Some(finished_at),
            total: job.total,
            items: job.items.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_from_job() {
        let mut job = Job::new(2);
        job.start().unwrap();
        let now = Utc::now();

        let manifest = Manifest::from_job(&job, now);
        assert_eq!(manifest.id, job.id);
        assert_eq!(manifest.total, 2);
        assert_eq!(manifest.items.len(), 2);
        assert_eq!(manifest.finished_at, Some(now));

        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("finishedAt").is_some());
    }
}
