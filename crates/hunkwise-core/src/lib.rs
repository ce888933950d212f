//! Hunkwise Core - diff engine for proposed edits
//!
//! This library tracks proposed edits to files as diff areas: per-file sets
//! of hunks with a baseline they can be re-diffed against while the buffer
//! keeps changing under them.

pub mod baseline;
pub mod buffer;
pub mod debounce;
pub mod event;
pub mod oracle;
pub mod realign;
pub mod reconcile;
pub mod service;
pub mod text;
pub mod types;

pub use buffer::{
    BufferError, ChangeSink, ContentChange, MemoryBuffers, SystemWriteFlag, SystemWriteGuard,
    TextBuffers,
};
pub use debounce::Debouncer;
pub use event::{DiffAreaEvent, UpdateReason};
pub use oracle::{LineDiff, LineDiffOracle, LineRangeMapping, OracleError, SimilarOracle};
pub use realign::{EditPlacement, EditRange};
pub use reconcile::{reconcile, ComputedDiff, DiffKey, Reconciliation};
pub use service::{ComputeResult, DiffAreaStore, DiffService, StreamingUpdate};
pub use types::{
    Diff, DiffArea, DiffAreaId, DiffId, DiffKind, DiffOptions, DiffState, InvalidArea, LineRange,
    Uri,
};
