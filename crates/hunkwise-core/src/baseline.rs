//! Folding accepted hunks into a region baseline

use crate::types::{Diff, DiffKind};

/// Splice an accepted hunk into the baseline lines.
///
/// `offset` is the index within `baseline` of the hunk's first original
/// line. Applying the same hunk twice corrupts the baseline; callers delete
/// the hunk right after merging it.
pub fn merge_into_baseline(baseline: &[&str], offset: usize, diff: &Diff) -> Vec<String> {
    let mut lines: Vec<String> = baseline.iter().map(|l| l.to_string()).collect();
    let at = offset.min(lines.len());
    let original_end = (at + diff.original_range.len()).min(lines.len());

    match diff.kind() {
        DiffKind::Deletion => {
            lines.drain(at..original_end);
        }
        DiffKind::Insertion => {
            lines.splice(at..at, modified_lines(diff));
        }
        DiffKind::Edit => {
            lines.splice(at..original_end, modified_lines(diff));
        }
    }

    lines
}

fn modified_lines(diff: &Diff) -> Vec<String> {
    crate::text::fragment_lines(&diff.modified_code, diff.modified_range.len())
        .into_iter()
        .map(str::to_string)
        .collect()
}
