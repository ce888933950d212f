//! Line-diff oracle: the opaque service that matches line ranges between
//! two snapshots

use crate::types::{DiffOptions, LineRange};
use similar::{capture_diff_slices_deadline, Algorithm, DiffOp, DiffTag};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Line diff exceeded its budget of {0:?}")]
    Timeout(Duration),
    #[error("Line diff failed: {0}")]
    Failed(String),
}

/// One changed region: `original` lines were replaced by `modified` lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRangeMapping {
    pub original: LineRange,
    pub modified: LineRange,
}

/// Outcome of a line diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineDiff {
    Identical,
    Changes(Vec<LineRangeMapping>),
}

pub trait LineDiffOracle {
    /// Match the two line sequences. Ranges in the result are 1-based.
    fn compute(
        &self,
        original: &[&str],
        modified: &[&str],
        options: &DiffOptions,
    ) -> Result<LineDiff, OracleError>;
}

/// Oracle backed by `similar`'s deadline-bounded diff
#[derive(Debug, Clone, Copy)]
pub struct SimilarOracle {
    algorithm: Algorithm,
}

impl Default for SimilarOracle {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Myers,
        }
    }
}

impl SimilarOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

impl LineDiffOracle for SimilarOracle {
    fn compute(
        &self,
        original: &[&str],
        modified: &[&str],
        options: &DiffOptions,
    ) -> Result<LineDiff, OracleError> {
        if options.compute_moves {
            log::debug!("move detection is not supported by the similar oracle, ignoring");
        }

        let started = Instant::now();
        let deadline = started + options.max_computation_time;

        let ops = if options.ignore_whitespace {
            let original: Vec<&str> = original.iter().map(|l| l.trim()).collect();
            let modified: Vec<&str> = modified.iter().map(|l| l.trim()).collect();
            capture_diff_slices_deadline(self.algorithm, &original, &modified, Some(deadline))
        } else {
            capture_diff_slices_deadline(self.algorithm, original, modified, Some(deadline))
        };

        // Past the deadline similar falls back to a coarse result; treat it
        // as a failed computation instead of surfacing a bogus hunk.
        if Instant::now() > deadline {
            return Err(OracleError::Timeout(options.max_computation_time));
        }

        let mappings = group_changes(&ops);
        if mappings.is_empty() {
            Ok(LineDiff::Identical)
        } else {
            Ok(LineDiff::Changes(mappings))
        }
    }
}

/// Fold runs of adjacent non-equal ops into single range mappings
fn group_changes(ops: &[DiffOp]) -> Vec<LineRangeMapping> {
    let mut mappings = Vec::new();
    let mut pending: Option<(std::ops::Range<usize>, std::ops::Range<usize>)> = None;

    for op in ops {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            if let Some((old, new)) = pending.take() {
                mappings.push(to_mapping(old, new));
            }
            continue;
        }
        pending = Some(match pending.take() {
            Some((pending_old, pending_new)) => {
                (pending_old.start..old.end, pending_new.start..new.end)
            }
            None => (old, new),
        });
    }

    if let Some((old, new)) = pending {
        mappings.push(to_mapping(old, new));
    }

    mappings
}

fn to_mapping(old: std::ops::Range<usize>, new: std::ops::Range<usize>) -> LineRangeMapping {
    LineRangeMapping {
        original: LineRange::new(old.start + 1, old.end + 1),
        modified: LineRange::new(new.start + 1, new.end + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::split_lines;

    fn compute(old: &str, new: &str) -> LineDiff {
        SimilarOracle::new()
            .compute(&split_lines(old), &split_lines(new), &DiffOptions::default())
            .unwrap()
    }

    #[test]
    fn test_identical() {
        assert_eq!(compute("a\nb\n", "a\nb\n"), LineDiff::Identical);
    }

    #[test]
    fn test_single_edit() {
        let LineDiff::Changes(mappings) = compute("a\nb\nc\n", "a\nX\nc\n") else {
            panic!("expected changes");
        };
        assert_eq!(
            mappings,
            vec![LineRangeMapping {
                original: LineRange::new(2, 3),
                modified: LineRange::new(2, 3),
            }]
        );
    }

    #[test]
    fn test_separate_changes_stay_separate() {
        let LineDiff::Changes(mappings) = compute("a\nb\nc\nd\ne", "a\nB\nc\nd\nE\nF") else {
            panic!("expected changes");
        };
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[1].original, LineRange::new(5, 6));
        assert_eq!(mappings[1].modified, LineRange::new(5, 7));
    }

    #[test]
    fn test_pure_insertion_and_deletion() {
        let LineDiff::Changes(mappings) = compute("a\nc", "a\nb\nc") else {
            panic!("expected changes");
        };
        assert_eq!(mappings[0].original, LineRange::empty(2));
        assert_eq!(mappings[0].modified, LineRange::new(2, 3));

        let LineDiff::Changes(mappings) = compute("a\nb\nc", "a\nc") else {
            panic!("expected changes");
        };
        assert_eq!(mappings[0].original, LineRange::new(2, 3));
        assert_eq!(mappings[0].modified, LineRange::empty(2));
    }

    #[test]
    fn test_ignore_whitespace() {
        let options = DiffOptions::default().with_ignore_whitespace(true);
        let result = SimilarOracle::new()
            .compute(&["fn a() {", "    x"], &["fn a() {", "\tx  "], &options)
            .unwrap();
        assert_eq!(result, LineDiff::Identical);
    }

    #[test]
    fn test_zero_budget_times_out() {
        let options = DiffOptions::default().with_max_computation_time(Duration::ZERO);
        let old: Vec<String> = (0..2000).map(|i| format!("line {i}")).collect();
        let new: Vec<String> = (0..2000).map(|i| format!("line {}", i * 7)).collect();
        let old: Vec<&str> = old.iter().map(String::as_str).collect();
        let new: Vec<&str> = new.iter().map(String::as_str).collect();
        let result = SimilarOracle::new().compute(&old, &new, &options);
        assert!(matches!(result, Err(OracleError::Timeout(_))));
    }
}
