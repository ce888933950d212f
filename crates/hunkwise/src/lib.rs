//! Hunkwise - review proposed edits hunk by hunk
//!
//! Keeps editor surfaces in step with the diff engine in `hunkwise-core`
//! and owns the accept/reject decisions made on them.

pub mod app;
pub mod config;
pub mod report;
pub mod review;
pub mod views;
pub mod zone;
