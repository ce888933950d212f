//! Records tracked by the diff engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Identity of a file (or any text buffer) the engine tracks diffs for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for Uri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

/// Opaque identifier of a single hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffId(pub u64);

impl fmt::Display for DiffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "diff#{}", self.0)
    }
}

/// Opaque identifier of a diff area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffAreaId(pub u64);

impl fmt::Display for DiffAreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "area#{}", self.0)
    }
}

/// Half-open range of 1-based line numbers. `start == end` is an empty
/// range anchored before line `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "line range {start}..{end} is inverted");
        Self { start, end }
    }

    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Last line covered by the range, if any
    pub fn last_line(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.end - 1)
        }
    }

    /// Move both ends by `delta` lines, never below line 1
    pub fn shifted(self, delta: isize) -> Self {
        let len = self.len();
        let start = offset_line(self.start, delta);
        Self {
            start,
            end: start + len,
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

/// Apply a signed line delta to a 1-based line number, clamping at line 1
pub fn offset_line(line: usize, delta: isize) -> usize {
    (line as isize + delta).max(1) as usize
}

/// Lifecycle of a single hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffState {
    /// Waiting for the user to accept or reject
    Pending,
    /// The owning area is still receiving generated content
    Streaming,
    Accepted,
    Rejected,
}

impl DiffState {
    /// Pending and streaming hunks are still on screen; resolved ones are not
    pub fn is_active(self) -> bool {
        matches!(self, DiffState::Pending | DiffState::Streaming)
    }
}

/// Shape of a hunk, derived from which of its ranges are empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Insertion,
    Deletion,
    Edit,
}

/// One contiguous hunk of change within a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub diff_id: DiffId,
    pub diff_area_id: DiffAreaId,
    pub uri: Uri,
    pub original_range: LineRange,
    pub modified_range: LineRange,
    /// Text of `original_range`, empty for an insertion
    pub original_code: String,
    /// Text of `modified_range`, empty for a deletion
    pub modified_code: String,
    pub state: DiffState,
}

impl Diff {
    pub fn kind(&self) -> DiffKind {
        if self.original_range.is_empty() {
            DiffKind::Insertion
        } else if self.modified_range.is_empty() {
            DiffKind::Deletion
        } else {
            DiffKind::Edit
        }
    }

    /// Lines gained (positive) or lost (negative) by applying this hunk
    pub fn line_delta(&self) -> isize {
        self.modified_range.len() as isize - self.original_range.len() as isize
    }
}

/// All tracked diffs of one file plus the baseline used to re-diff them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffArea {
    pub diff_area_id: DiffAreaId,
    pub uri: Uri,
    pub diffs: BTreeMap<DiffId, Diff>,
    /// Full original file text at creation time
    pub original_snapshot: String,
    /// Region baseline: the left-hand side for every re-diff of this area
    pub original_code: String,
    /// Number of lines in `original_code`; zero when the region holds only
    /// inserted lines
    pub original_line_count: usize,
    /// First line of the region in the live buffer (inclusive)
    pub start_line: usize,
    /// Last line of the region in the live buffer (inclusive)
    pub end_line: usize,
    pub is_streaming: bool,
    pub stream_request_id: Option<String>,
}

/// Why an externally supplied area cannot be tracked
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidArea {
    #[error("area has no diffs")]
    NoDiffs,
    #[error("region {start}..={end} is not a valid line span")]
    Bounds { start: usize, end: usize },
    #[error("baseline holds {actual} lines but claims {claimed}")]
    Baseline { claimed: usize, actual: usize },
    #[error("{0} belongs to another area or file")]
    Foreign(DiffId),
    #[error("{diff_id} has malformed ranges {original} / {modified}")]
    Ranges {
        diff_id: DiffId,
        original: LineRange,
        modified: LineRange,
    },
}

impl DiffArea {
    /// Check the structural invariants the engine relies on
    pub fn validate(&self) -> Result<(), InvalidArea> {
        if self.diffs.is_empty() {
            return Err(InvalidArea::NoDiffs);
        }
        if self.start_line == 0 || self.start_line > self.end_line {
            return Err(InvalidArea::Bounds {
                start: self.start_line,
                end: self.end_line,
            });
        }
        let actual = crate::text::line_count(&self.original_code);
        let consistent = match self.original_line_count {
            0 => self.original_code.is_empty(),
            claimed => claimed == actual,
        };
        if !consistent {
            return Err(InvalidArea::Baseline {
                claimed: self.original_line_count,
                actual,
            });
        }

        for (key, diff) in &self.diffs {
            if *key != diff.diff_id
                || diff.diff_area_id != self.diff_area_id
                || diff.uri != self.uri
            {
                return Err(InvalidArea::Foreign(*key));
            }
            let malformed = |r: LineRange| r.start == 0 || r.start > r.end;
            if malformed(diff.original_range)
                || malformed(diff.modified_range)
                || (diff.original_range.is_empty() && diff.modified_range.is_empty())
            {
                return Err(InvalidArea::Ranges {
                    diff_id: diff.diff_id,
                    original: diff.original_range,
                    modified: diff.modified_range,
                });
            }
        }
        Ok(())
    }

    /// Diffs ordered top to bottom by their modified-side position
    pub fn sorted_diffs(&self) -> Vec<&Diff> {
        let mut diffs: Vec<&Diff> = self.diffs.values().collect();
        diffs.sort_by_key(|d| (d.modified_range.start, d.original_range.start));
        diffs
    }

    /// Sum of every hunk's line delta
    pub fn net_line_delta(&self) -> isize {
        self.diffs.values().map(Diff::line_delta).sum()
    }

    /// Number of live lines covered by the region
    pub fn region_len(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    /// Inclusive last line of the region translated to the original side.
    ///
    /// Everything above `start_line` is unchanged, so the original side
    /// starts at the same line and is shorter or longer by the net delta.
    pub(crate) fn baseline_end_line(&self) -> isize {
        self.end_line as isize - self.net_line_delta()
    }

    /// Re-slice `original_code` from `original_snapshot` for the current region
    pub(crate) fn refresh_baseline_from_snapshot(&mut self) {
        let end = self.baseline_end_line();
        if end < self.start_line as isize {
            self.original_code = String::new();
            self.original_line_count = 0;
        } else {
            let lines = crate::text::slice_lines(
                &self.original_snapshot,
                self.start_line,
                end as usize,
            );
            self.original_line_count = lines.len();
            self.original_code = lines.join("\n");
        }
    }
}

/// Knobs passed to the line-diff oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    /// Compare lines with leading/trailing whitespace trimmed
    pub ignore_whitespace: bool,
    /// Budget after which a computation counts as failed
    pub max_computation_time: Duration,
    /// Ask the oracle to detect moved blocks
    pub compute_moves: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore_whitespace: false,
            max_computation_time: Duration::from_millis(3000),
            compute_moves: false,
        }
    }
}

impl DiffOptions {
    pub fn with_ignore_whitespace(mut self, enabled: bool) -> Self {
        self.ignore_whitespace = enabled;
        self
    }

    pub fn with_max_computation_time(mut self, budget: Duration) -> Self {
        self.max_computation_time = budget;
        self
    }

    pub fn with_compute_moves(mut self, enabled: bool) -> Self {
        self.compute_moves = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(original: LineRange, modified: LineRange) -> Diff {
        Diff {
            diff_id: DiffId(1),
            diff_area_id: DiffAreaId(1),
            uri: Uri::from("file:///a.rs"),
            original_range: original,
            modified_range: modified,
            original_code: String::new(),
            modified_code: String::new(),
            state: DiffState::Pending,
        }
    }

    #[test]
    fn test_diff_kind() {
        assert_eq!(
            diff(LineRange::empty(3), LineRange::new(3, 5)).kind(),
            DiffKind::Insertion
        );
        assert_eq!(
            diff(LineRange::new(3, 4), LineRange::empty(3)).kind(),
            DiffKind::Deletion
        );
        assert_eq!(
            diff(LineRange::new(3, 4), LineRange::new(3, 6)).kind(),
            DiffKind::Edit
        );
    }

    #[test]
    fn test_line_delta() {
        assert_eq!(diff(LineRange::new(2, 3), LineRange::new(2, 5)).line_delta(), 2);
        assert_eq!(diff(LineRange::new(2, 6), LineRange::empty(2)).line_delta(), -4);
    }

    #[test]
    fn test_shifted_clamps_at_first_line() {
        let range = LineRange::new(2, 5).shifted(-4);
        assert_eq!(range, LineRange::new(1, 4));
        assert_eq!(LineRange::new(2, 5).shifted(3), LineRange::new(5, 8));
    }

    #[test]
    fn test_last_line() {
        assert_eq!(LineRange::new(4, 6).last_line(), Some(5));
        assert_eq!(LineRange::empty(4).last_line(), None);
    }

    fn area() -> DiffArea {
        let edit = diff(LineRange::new(2, 3), LineRange::new(2, 3));
        DiffArea {
            diff_area_id: DiffAreaId(1),
            uri: Uri::from("file:///a.rs"),
            diffs: BTreeMap::from([(edit.diff_id, edit)]),
            original_snapshot: "a\nb\nc".to_string(),
            original_code: "b".to_string(),
            original_line_count: 1,
            start_line: 2,
            end_line: 2,
            is_streaming: false,
            stream_request_id: None,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_area() {
        assert_eq!(area().validate(), Ok(()));

        let mut inserted_only = area();
        inserted_only.original_code = String::new();
        inserted_only.original_line_count = 0;
        assert_eq!(inserted_only.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut area = area();
        area.start_line = 0;
        assert_eq!(
            area.validate(),
            Err(InvalidArea::Bounds { start: 0, end: 2 })
        );
        area.start_line = 3;
        area.end_line = 1;
        assert!(matches!(area.validate(), Err(InvalidArea::Bounds { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_diffs() {
        let mut area = area();
        let empty = diff(LineRange::empty(2), LineRange::empty(2));
        area.diffs.insert(DiffId(1), empty);
        assert!(matches!(area.validate(), Err(InvalidArea::Ranges { .. })));

        let mut area = self::area();
        area.diffs.get_mut(&DiffId(1)).unwrap().diff_area_id = DiffAreaId(9);
        assert_eq!(area.validate(), Err(InvalidArea::Foreign(DiffId(1))));

        let mut area = self::area();
        area.original_line_count = 3;
        assert_eq!(
            area.validate(),
            Err(InvalidArea::Baseline {
                claimed: 3,
                actual: 1
            })
        );

        let mut area = self::area();
        area.diffs.clear();
        assert_eq!(area.validate(), Err(InvalidArea::NoDiffs));
    }

    #[test]
    fn test_state_activity() {
        assert!(DiffState::Pending.is_active());
        assert!(DiffState::Streaming.is_active());
        assert!(!DiffState::Accepted.is_active());
        assert!(!DiffState::Rejected.is_active());
    }
}
