//! Shared data models for the HookReel batch service.
//!
//! This crate provides Serde-serializable types for:
//! - Batch jobs and their per-clip items
//! - Job and item status state machines
//! - The manifest written when a batch completes

pub mod item;
pub mod job;
pub mod manifest;

pub use item::{Item, ItemStatus};
pub use job::{
    Job, JobId, JobStatus, TransitionError, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE,
    RESTART_INTERRUPTED_MESSAGE,
};
pub use manifest::Manifest;
