//! Non-interactive runs of the engine, shaped for printing

use crate::zone::{compute_decorations_from_diff_area, Decoration, EngineState};
use hunkwise_core::text::{line_count, split_lines};
use hunkwise_core::{
    DiffAreaId, DiffId, DiffKind, DiffOptions, DiffService, LineRange, TextBuffers, Uri,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HunkReport {
    pub diff_id: DiffId,
    pub kind: DiffKind,
    pub original_range: LineRange,
    pub modified_range: LineRange,
    pub original_code: String,
    pub modified_code: String,
    pub decoration: Option<Decoration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub uri: Uri,
    pub diff_area_id: Option<DiffAreaId>,
    pub start_line: usize,
    pub end_line: usize,
    pub hunks: Vec<HunkReport>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// Diff two texts once and describe the resulting area
pub fn diff_report(uri: &Uri, original: &str, modified: &str, options: DiffOptions) -> DiffReport {
    let mut service = DiffService::in_memory().with_options(options);
    service.buffers_mut().open(uri.clone(), original);
    let result = service.compute_diffs(uri, original, modified);

    let Some(area) = result.diff_area else {
        return DiffReport {
            uri: uri.clone(),
            diff_area_id: None,
            start_line: 0,
            end_line: 0,
            hunks: Vec::new(),
        };
    };

    let mut pass = compute_decorations_from_diff_area(&area, line_count(modified), &EngineState);
    let hunks = result
        .diffs
        .into_iter()
        .map(|diff| HunkReport {
            diff_id: diff.diff_id,
            kind: diff.kind(),
            original_range: diff.original_range,
            modified_range: diff.modified_range,
            decoration: pass.by_diff.remove(&diff.diff_id),
            original_code: diff.original_code,
            modified_code: diff.modified_code,
        })
        .collect();

    DiffReport {
        uri: uri.clone(),
        diff_area_id: Some(area.diff_area_id),
        start_line: area.start_line,
        end_line: area.end_line,
        hunks,
    }
}

/// One write of a simulated generation
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStep {
    pub lines_written: usize,
    pub diff_area_id: Option<DiffAreaId>,
    pub new: Vec<DiffId>,
    pub updated: Vec<DiffId>,
    pub removed: Vec<DiffId>,
    /// Hunks tracked once the step was applied
    pub hunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub steps: Vec<StreamStep>,
    pub final_text: String,
    /// Pending hunks left after streaming finished
    pub pending: usize,
}

const STREAM_REQUEST: &str = "hunkwise-stream";

/// Feed `modified` over `original` `chunk_lines` at a time through the
/// streaming path, then finish the stream
pub fn stream_report(
    uri: &Uri,
    original: &str,
    modified: &str,
    chunk_lines: usize,
    options: DiffOptions,
) -> StreamReport {
    let original_lines = split_lines(original);
    let modified_lines = split_lines(modified);
    let chunk = chunk_lines.max(1);

    let mut service = DiffService::in_memory().with_options(options);
    service.buffers_mut().open(uri.clone(), original);

    let mut area_id: Option<DiffAreaId> = None;
    let mut steps = Vec::new();
    let mut written = 0;

    while written < modified_lines.len() {
        written = (written + chunk).min(modified_lines.len());
        let content = partial_content(&original_lines, &modified_lines, written);

        let mut step = StreamStep {
            lines_written: written,
            ..StreamStep::default()
        };
        match area_id.filter(|id| service.diff_area_by_id(*id).is_some()) {
            Some(id) => {
                let update = service.update_diffs_for_streaming(id, &content, Some(STREAM_REQUEST));
                step.new = update.new;
                step.updated = update.updated;
                step.removed = update.removed;
            }
            None => {
                let result = service.compute_diffs(uri, original, &content);
                area_id = result.diff_area.as_ref().map(|a| a.diff_area_id);
                if let Some(id) = area_id {
                    step.new = result.diffs.iter().map(|d| d.diff_id).collect();
                    service.update_diffs_for_streaming(id, &content, Some(STREAM_REQUEST));
                }
            }
        }

        step.diff_area_id = area_id.filter(|id| service.diff_area_by_id(*id).is_some());
        step.hunks = step
            .diff_area_id
            .and_then(|id| service.diff_area_by_id(id))
            .map_or(0, |area| area.diffs.len());
        log::debug!(
            "streamed {written} lines: {} new, {} updated, {} removed",
            step.new.len(),
            step.updated.len(),
            step.removed.len()
        );
        steps.push(step);
    }

    let mut pending = 0;
    if let Some(id) = area_id {
        if service.abort_streaming(id) {
            pending = service.diff_area_by_id(id).map_or(0, |area| area.diffs.len());
        }
    }

    StreamReport {
        steps,
        final_text: service.buffers().text(uri).unwrap_or_default(),
        pending,
    }
}

/// The first `written` lines of the generation laid over the rest of the
/// original file
fn partial_content(original: &[&str], modified: &[&str], written: usize) -> String {
    let mut lines: Vec<&str> = modified[..written].to_vec();
    if written < modified.len() {
        lines.extend(original.iter().skip(written));
    }
    lines.join("\n")
}
