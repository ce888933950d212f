//! Realignment of a region's bounds after an unrelated buffer edit

use serde::{Deserialize, Serialize};

/// Inclusive 1-based lines replaced by a buffer edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRange {
    pub start_line: usize,
    pub end_line: usize,
}

impl EditRange {
    /// Lines are 1-based; a start of 0 is read as line 1
    pub fn new(start_line: usize, end_line: usize) -> Self {
        let start_line = start_line.max(1);
        Self {
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    pub fn line(line: usize) -> Self {
        Self::new(line, line)
    }

    pub fn height(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Where an edit falls relative to a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPlacement {
    Below,
    Above,
    Inside,
    Contains,
    OverlapsTop,
    OverlapsBottom,
}

/// A region's bounds after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Realigned {
    pub placement: EditPlacement,
    pub start_line: usize,
    pub end_line: usize,
    /// Line count change of the buffer caused by the edit
    pub delta: isize,
}

pub fn classify(start_line: usize, end_line: usize, edit: EditRange) -> EditPlacement {
    if edit.start_line > end_line {
        EditPlacement::Below
    } else if edit.end_line < start_line {
        EditPlacement::Above
    } else if edit.start_line >= start_line && edit.end_line <= end_line {
        EditPlacement::Inside
    } else if edit.start_line <= start_line && edit.end_line >= end_line {
        EditPlacement::Contains
    } else if edit.start_line < start_line {
        EditPlacement::OverlapsTop
    } else {
        EditPlacement::OverlapsBottom
    }
}

/// Bounds of the region `start_line..=end_line` after `edit` was replaced by
/// `new_height` lines of text
pub fn realign(start_line: usize, end_line: usize, edit: EditRange, new_height: usize) -> Realigned {
    let new_height = new_height.max(1);
    let delta = new_height as isize - edit.height() as isize;
    let placement = classify(start_line, end_line, edit);

    let (start, end) = match placement {
        EditPlacement::Below => (start_line, end_line),
        EditPlacement::Above => (shift(start_line, delta), shift(end_line, delta)),
        EditPlacement::Inside => (start_line, shift(end_line, delta)),
        EditPlacement::Contains => (edit.start_line, edit.start_line + new_height - 1),
        EditPlacement::OverlapsTop => {
            let remainder = end_line - edit.end_line;
            (edit.start_line, edit.start_line + new_height - 1 + remainder)
        }
        EditPlacement::OverlapsBottom => {
            let overlap = end_line - edit.start_line + 1;
            (start_line, shift(end_line, new_height as isize - overlap as isize))
        }
    };

    Realigned {
        placement,
        start_line: start,
        end_line: end.max(start),
        delta,
    }
}

fn shift(line: usize, delta: isize) -> usize {
    crate::types::offset_line(line, delta)
}
