//! Single pane view - the live buffer with proposed hunks laid inline

use crate::app::App;
use crate::zone::{DecorationStyle, HunkWidget};
use hunkwise_core::text::{fragment_lines, split_lines};
use hunkwise_core::{Diff, DiffKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

const INSERT_COLOR: Color = Color::Green;
const EDIT_COLOR: Color = Color::Yellow;
const DELETE_COLOR: Color = Color::Red;
const CONTEXT_COLOR: Color = Color::Gray;
const WIDGET_COLOR: Color = Color::Cyan;

pub fn render_single_pane(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    let (lines, selected_row) = build_lines(app);
    let total = lines.len();
    keep_row_visible(app, selected_row, chunks[0].height);

    let paragraph = Paragraph::new(lines).scroll((app.scroll, 0));
    frame.render_widget(paragraph, chunks[0]);

    if total > chunks[0].height as usize {
        let mut state = ScrollbarState::new(total).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            chunks[0],
            &mut state,
        );
    }

    render_status_bar(frame, app, chunks[1]);
}

/// Scroll just enough that the selected widget stays on screen
fn keep_row_visible(app: &mut App, row: Option<usize>, height: u16) {
    let Some(row) = row else {
        return;
    };
    let row = row as u16;
    if row < app.scroll {
        app.scroll = row;
    } else if height > 0 && row >= app.scroll + height {
        app.scroll = row + 1 - height;
    }
}

/// Buffer lines interleaved with hunk widgets and the original text of
/// removed lines. Returns the row of the selected widget.
fn build_lines(app: &App) -> (Vec<Line<'static>>, Option<usize>) {
    let text = app.text();
    let buffer = split_lines(&text);
    let line_count = buffer.len();
    let decorations = app.decorations();
    let widgets = app.widgets();
    let selected = app.selected_widget().map(|w| w.diff_id);

    let mut out = Vec::new();
    let mut selected_row = None;

    for (idx, content) in buffer.iter().enumerate() {
        let number = idx + 1;
        let mut trailing = Vec::new();

        for widget in widgets.iter().filter(|w| w.line == number) {
            let is_selected = selected == Some(widget.diff_id);
            if is_selected {
                selected_row = Some(out.len());
            }
            out.push(widget_line(widget, is_selected));

            let Some(diff) = app.diff_for(widget) else {
                continue;
            };
            if diff.kind() == DiffKind::Insertion {
                continue;
            }
            // Deleted past the end of the buffer: show it under the last line
            if diff.kind() == DiffKind::Deletion && diff.modified_range.start > line_count {
                trailing.push(diff);
            } else {
                out.extend(removed_lines(diff));
            }
        }

        let style = decorations
            .iter()
            .find(|d| d.contains(number) && d.style != DecorationStyle::Deletion)
            .map(|d| d.style);
        out.push(buffer_line(number, content, style));

        for diff in trailing {
            out.extend(removed_lines(diff));
        }
    }

    (out, selected_row)
}

fn widget_line(widget: &HunkWidget, selected: bool) -> Line<'static> {
    let marker = if selected { "▶" } else { " " };
    let style = if selected {
        Style::default()
            .fg(WIDGET_COLOR)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    } else {
        Style::default().fg(WIDGET_COLOR)
    };
    let kind = match widget.kind {
        DiffKind::Insertion => "insertion",
        DiffKind::Deletion => "deletion",
        DiffKind::Edit => "edit",
    };
    Line::from(vec![
        Span::styled(marker.to_string(), Style::default().fg(WIDGET_COLOR)),
        Span::raw("       "),
        Span::styled(
            format!(" [a]ccept [r]eject  {} {} ", widget.diff_id, kind),
            style,
        ),
    ])
}

fn removed_lines(diff: &Diff) -> Vec<Line<'static>> {
    let style = Style::default().fg(DELETE_COLOR);
    fragment_lines(&diff.original_code, diff.original_range.len())
        .into_iter()
        .map(|line| {
            Line::from(vec![
                Span::raw("      "),
                Span::styled("- ".to_string(), style),
                Span::styled(line.to_string(), style.add_modifier(Modifier::CROSSED_OUT)),
            ])
        })
        .collect()
}

fn buffer_line(number: usize, content: &str, style: Option<DecorationStyle>) -> Line<'static> {
    let (sign, color) = match style {
        Some(DecorationStyle::Insertion) => ("+", INSERT_COLOR),
        Some(DecorationStyle::Edit) => ("~", EDIT_COLOR),
        _ => (" ", CONTEXT_COLOR),
    };
    let text_style = Style::default().fg(color);
    Line::from(vec![
        Span::raw(" "),
        Span::styled(format!("{number:>4}"), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(sign.to_string(), text_style),
        Span::raw(" "),
        Span::styled(content.to_string(), text_style),
    ])
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hints = "j/k move  a/r hunk  A/R file  w write  q quit";
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.output.display()),
            Style::default().fg(Color::Black).bg(WIDGET_COLOR),
        ),
        Span::raw(" "),
        Span::styled(app.status.clone(), Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_edit_shows_original_under_its_widget() {
        let app = App::new(
            "a\nb\nc",
            "a\nB\nc",
            PathBuf::from("/tmp/view.txt"),
            &Config::default(),
        )
        .unwrap();

        let (lines, selected) = build_lines(&app);
        let rendered: Vec<String> = lines.iter().map(plain).collect();

        assert_eq!(selected, Some(1));
        assert!(rendered[1].contains("[a]ccept [r]eject"));
        assert!(rendered[2].ends_with("- b"));
        assert!(rendered[3].ends_with("~ B"));
        assert_eq!(rendered.len(), 5);
    }

    #[test]
    fn test_trailing_deletion_renders_after_last_line() {
        let app = App::new(
            "a\nb\nc",
            "a",
            PathBuf::from("/tmp/view.txt"),
            &Config::default(),
        )
        .unwrap();

        let (lines, _) = build_lines(&app);
        let rendered: Vec<String> = lines.iter().map(plain).collect();

        assert!(rendered[0].contains("deletion"));
        assert!(rendered[1].ends_with("  a"));
        assert!(rendered[2].ends_with("- b"));
        assert!(rendered[3].ends_with("- c"));
    }
}
