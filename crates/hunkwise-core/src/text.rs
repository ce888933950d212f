//! Line helpers shared by the engine.
//!
//! Text is split on `'\n'` only, the way an editor model counts lines: an
//! empty string is one empty line and a trailing newline opens a last empty
//! line.

use crate::types::LineRange;

pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Lines of a code fragment whose line count is known. A fragment of zero
/// lines and a fragment of one empty line both serialize to `""`.
pub fn fragment_lines(code: &str, line_count: usize) -> Vec<&str> {
    if line_count == 0 {
        Vec::new()
    } else {
        split_lines(code)
    }
}

/// Lines `start..=end` (1-based), clamped to the text
pub fn slice_lines(text: &str, start: usize, end: usize) -> Vec<&str> {
    let lines = split_lines(text);
    let from = start.saturating_sub(1).min(lines.len());
    let to = end.min(lines.len()).max(from);
    lines[from..to].to_vec()
}

/// Text covered by `range` within `lines`, empty for an empty range
pub fn materialize(lines: &[&str], range: LineRange) -> String {
    if range.is_empty() {
        return String::new();
    }
    let from = (range.start - 1).min(lines.len());
    let to = (range.end - 1).min(lines.len()).max(from);
    lines[from..to].join("\n")
}

/// Replace the lines of `range` in `text` with `replacement`
pub fn splice_lines(text: &str, range: LineRange, replacement: &[&str]) -> String {
    let mut lines = split_lines(text);
    let from = (range.start.max(1) - 1).min(lines.len());
    let to = (range.end.max(1) - 1).min(lines.len()).max(from);
    lines.splice(from..to, replacement.iter().copied());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count_follows_editor_model() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\nb\nc\n"), 4);
    }

    #[test]
    fn test_slice_lines_clamps() {
        let text = "a\nb\nc";
        assert_eq!(slice_lines(text, 2, 3), vec!["b", "c"]);
        assert_eq!(slice_lines(text, 3, 10), vec!["c"]);
        assert!(slice_lines(text, 5, 6).is_empty());
        assert!(slice_lines(text, 3, 2).is_empty());
    }

    #[test]
    fn test_materialize() {
        let lines = split_lines("a\nb\nc");
        assert_eq!(materialize(&lines, LineRange::new(2, 4)), "b\nc");
        assert_eq!(materialize(&lines, LineRange::empty(2)), "");
    }

    #[test]
    fn test_fragment_lines_distinguishes_empty_fragment() {
        assert!(fragment_lines("", 0).is_empty());
        assert_eq!(fragment_lines("", 1), vec![""]);
    }

    #[test]
    fn test_splice_lines() {
        assert_eq!(splice_lines("a\nX\nc", LineRange::new(2, 3), &["b"]), "a\nb\nc");
        assert_eq!(splice_lines("a\nc", LineRange::empty(2), &["b"]), "a\nb\nc");
        assert_eq!(splice_lines("a\nb\nc", LineRange::new(2, 3), &[]), "a\nc");
    }
}
