//! # Ember ECS
//!
//! Update-side scheduling for the Ember renderer.
//!
//! - [`JobSystem`] - fixed worker pool running `'static` jobs with dependencies
//! - [`JobSpawner`] / [`JobHandle`] - schedule from any thread, wait while helping
//! - [`SystemScheduler`] - named callbacks grouped into ordered [`Phase`]s, with a
//!   barrier between phases that also joins every job a callback spawned
//! - [`JobContext`] - what a scheduled callback receives
//! - [`PhaseJobs`] - the callback's job system handle, joined at the phase barrier

mod job_system;
mod schedule;

pub use job_system::{JobHandle, JobSpawner, JobSystem};
pub use schedule::{JobContext, Phase, PhaseJobs, SystemScheduler, TaskId};
