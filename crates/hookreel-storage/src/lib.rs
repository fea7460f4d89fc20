//! File-backed persistence for HookReel.
//!
//! This crate provides:
//! - The job state store (one JSON snapshot per job directory)
//! - Manifest writing for completed jobs
//! - The persisted history of used hook texts
//! - The on-disk/public path layout of job artifacts

pub mod error;
pub mod fs_utils;
pub mod history;
pub mod job_store;
pub mod layout;

pub use error::{StorageError, StorageResult};
pub use history::HookHistory;
pub use job_store::{FileJobStore, JobStore};
pub use layout::OutputLayout;
