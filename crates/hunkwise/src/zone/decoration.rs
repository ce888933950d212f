//! Decorations derived from a diff area

use hunkwise_core::{Diff, DiffArea, DiffId, DiffKind, DiffState};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DecorationStyle {
    Insertion,
    Deletion,
    Edit,
}

impl DecorationStyle {
    pub fn class_name(self) -> &'static str {
        match self {
            DecorationStyle::Insertion => "hunkwise-inserted",
            DecorationStyle::Deletion => "hunkwise-deleted",
            DecorationStyle::Edit => "hunkwise-edited",
        }
    }
}

impl From<DiffKind> for DecorationStyle {
    fn from(kind: DiffKind) -> Self {
        match kind {
            DiffKind::Insertion => DecorationStyle::Insertion,
            DiffKind::Deletion => DecorationStyle::Deletion,
            DiffKind::Edit => DecorationStyle::Edit,
        }
    }
}

/// Whole-line decoration over `start_line..=end_line` of the buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub diff_id: DiffId,
    pub style: DecorationStyle,
    pub start_line: usize,
    pub end_line: usize,
}

impl Decoration {
    pub fn contains(&self, line: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }
}

/// Authoritative accept/reject state, kept by whoever handles user actions
pub trait DiffStateSource {
    fn diff_state(&self, diff_id: DiffId) -> Option<DiffState>;
}

/// Trust the state recorded on the diff itself
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineState;

impl DiffStateSource for EngineState {
    fn diff_state(&self, _diff_id: DiffId) -> Option<DiffState> {
        None
    }
}

pub fn effective_state(diff: &Diff, states: &dyn DiffStateSource) -> DiffState {
    states.diff_state(diff.diff_id).unwrap_or(diff.state)
}

/// Output of one decoration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationPass {
    pub decorations: Vec<Decoration>,
    /// The decoration each hunk actually produced
    pub by_diff: BTreeMap<DiffId, Decoration>,
}

pub fn compute_decorations_from_diff_area(
    area: &DiffArea,
    line_count: usize,
    states: &dyn DiffStateSource,
) -> DecorationPass {
    let mut pass = DecorationPass::default();

    for diff in area.sorted_diffs() {
        if !effective_state(diff, states).is_active() {
            continue;
        }

        let kind = diff.kind();
        let range = diff.modified_range;
        let (start_line, end_line) = match kind {
            // A deletion at the very end of the buffer anchors on its last line
            DiffKind::Deletion if range.start == line_count + 1 => (line_count, line_count),
            DiffKind::Deletion => (range.start, range.start),
            DiffKind::Insertion | DiffKind::Edit => (range.start, range.end - 1),
        };

        if line_count == 0 || start_line == 0 || start_line > line_count {
            log::warn!(
                "{} at {} is outside {} ({} lines), skipping",
                diff.diff_id,
                range,
                area.uri,
                line_count
            );
            continue;
        }

        let decoration = Decoration {
            diff_id: diff.diff_id,
            style: kind.into(),
            start_line,
            end_line: end_line.min(line_count),
        };
        pass.by_diff.insert(diff.diff_id, decoration.clone());
        pass.decorations.push(decoration);
    }

    pass
}
