//! Batch pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_CREATED_TOTAL: &str = "hookreel_jobs_created_total";
    pub const JOB_SIZE: &str = "hookreel_job_size";
    pub const JOBS_COMPLETED_TOTAL: &str = "hookreel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "hookreel_jobs_failed_total";
    pub const JOBS_RECONCILED_TOTAL: &str = "hookreel_jobs_reconciled_total";
    pub const QUEUE_DEPTH: &str = "hookreel_queue_depth";

    pub const ITEMS_PROCESSED_TOTAL: &str = "hookreel_items_processed_total";
    pub const ITEM_DURATION_SECONDS: &str = "hookreel_item_duration_seconds";

    pub const HOOKS_GENERATED_TOTAL: &str = "hookreel_hooks_generated_total";
}

pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

pub fn record_job_created(total: u32) {
    counter!(names::JOBS_CREATED_TOTAL).increment(1);
    histogram!(names::JOB_SIZE).record(total as f64);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_reconciled() {
    counter!(names::JOBS_RECONCILED_TOTAL).increment(1);
}

pub fn set_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}

/// Record one finished item; `outcome` is `done` or `failed`.
pub fn record_item(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ITEMS_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::ITEM_DURATION_SECONDS, &labels).record(duration_secs);
}
