//! Background job system
//!
//! Periodic maintenance jobs with a registry that admins can inspect and trigger

mod jobs;
mod manager;

pub use jobs::{run, JobContext, JobKind};
pub use manager::{JobInfo, JobManager, JobStatus};
