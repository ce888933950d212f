//! Set reconciliation between a stored diff set and a fresh computation.
//!
//! Recomputation always yields hunks without identity, so they are matched
//! to stored hunks by position. A stored hunk keeps its id when a fresh hunk
//! covers exactly the same original and modified ranges.

use crate::types::{Diff, DiffId, LineRange};
use std::collections::HashMap;

/// Structural identity of a hunk: `(original_start, original_end, modified_start, modified_end)`
pub type DiffKey = (usize, usize, usize, usize);

pub fn diff_key(original: LineRange, modified: LineRange) -> DiffKey {
    (original.start, original.end, modified.start, modified.end)
}

/// A freshly computed hunk that has not been given an id yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedDiff {
    pub original_range: LineRange,
    pub modified_range: LineRange,
    pub original_code: String,
    pub modified_code: String,
}

impl ComputedDiff {
    pub fn key(&self) -> DiffKey {
        diff_key(self.original_range, self.modified_range)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Hunks with no stored counterpart
    pub added: Vec<ComputedDiff>,
    /// Stored hunks whose text changed, with their new content
    pub updated: Vec<(DiffId, ComputedDiff)>,
    /// Stored hunks that came back identical
    pub unchanged: Vec<DiffId>,
    /// Stored hunks with no fresh counterpart
    pub removed: Vec<DiffId>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

pub fn reconcile<'a>(
    existing: impl IntoIterator<Item = &'a Diff>,
    computed: Vec<ComputedDiff>,
) -> Reconciliation {
    let mut by_key: HashMap<DiffKey, &Diff> = existing
        .into_iter()
        .map(|d| (diff_key(d.original_range, d.modified_range), d))
        .collect();

    let mut result = Reconciliation::default();
    for fresh in computed {
        match by_key.remove(&fresh.key()) {
            None => result.added.push(fresh),
            Some(old)
                if old.modified_code != fresh.modified_code
                    || old.original_code != fresh.original_code =>
            {
                result.updated.push((old.diff_id, fresh))
            }
            Some(old) => result.unchanged.push(old.diff_id),
        }
    }

    result.removed = by_key.into_values().map(|d| d.diff_id).collect();
    result.removed.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffAreaId, DiffState, Uri};

    fn stored(id: u64, original: (usize, usize), modified: (usize, usize), text: &str) -> Diff {
        Diff {
            diff_id: DiffId(id),
            diff_area_id: DiffAreaId(1),
            uri: Uri::from("file:///x"),
            original_range: LineRange::new(original.0, original.1),
            modified_range: LineRange::new(modified.0, modified.1),
            original_code: "old".to_string(),
            modified_code: text.to_string(),
            state: DiffState::Streaming,
        }
    }

    fn fresh(original: (usize, usize), modified: (usize, usize), text: &str) -> ComputedDiff {
        ComputedDiff {
            original_range: LineRange::new(original.0, original.1),
            modified_range: LineRange::new(modified.0, modified.1),
            original_code: "old".to_string(),
            modified_code: text.to_string(),
        }
    }

    #[test]
    fn test_matching_key_keeps_identity() {
        let existing = [stored(7, (2, 3), (2, 3), "x")];
        let result = reconcile(&existing, vec![fresh((2, 3), (2, 3), "xy")]);

        assert!(result.added.is_empty());
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.updated[0].0, DiffId(7));
        assert_eq!(result.updated[0].1.modified_code, "xy");
    }

    #[test]
    fn test_identical_text_is_unchanged() {
        let existing = [stored(7, (2, 3), (2, 3), "x")];
        let result = reconcile(&existing, vec![fresh((2, 3), (2, 3), "x")]);

        assert_eq!(result.unchanged, vec![DiffId(7)]);
        assert!(result.is_noop());
    }

    #[test]
    fn test_moved_hunk_is_removed_and_added() {
        // Growing modified range changes the key, so identity is lost
        let existing = [stored(1, (2, 3), (2, 3), "x"), stored(2, (8, 9), (8, 9), "z")];
        let result = reconcile(
            &existing,
            vec![fresh((2, 3), (2, 4), "x\ny"), fresh((8, 9), (8, 9), "z")],
        );

        assert_eq!(result.added.len(), 1);
        assert_eq!(result.removed, vec![DiffId(1)]);
        assert_eq!(result.unchanged, vec![DiffId(2)]);
    }
}
