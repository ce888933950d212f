//! The diff engine: owns every diff area and keeps them in step with the
//! live buffers

use crate::baseline::merge_into_baseline;
use crate::buffer::{ChangeSink, MemoryBuffers, SystemWriteFlag, TextBuffers};
use crate::debounce::Debouncer;
use crate::event::{DiffAreaEvent, EventBus, UpdateReason};
use crate::oracle::{LineDiff, LineDiffOracle, LineRangeMapping, SimilarOracle};
use crate::realign::{realign, EditPlacement, EditRange};
use crate::reconcile::{reconcile, ComputedDiff};
use crate::text::{fragment_lines, line_count, materialize, splice_lines, split_lines};
use crate::types::{
    offset_line, Diff, DiffArea, DiffAreaId, DiffId, DiffOptions, DiffState, LineRange, Uri,
};
use crossbeam_channel::Receiver;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Read access to diff areas, for consumers that render them
pub trait DiffAreaStore {
    fn diff_area(&self, uri: &Uri, id: DiffAreaId) -> Option<&DiffArea>;
    fn diff_areas_for_uri(&self, uri: &Uri) -> Vec<&DiffArea>;
}

/// Result of [`DiffService::compute_diffs`]; empty when nothing changed or
/// the computation failed
#[derive(Debug, Clone, Default)]
pub struct ComputeResult {
    pub diffs: Vec<Diff>,
    pub diff_area: Option<DiffArea>,
}

impl ComputeResult {
    pub fn is_empty(&self) -> bool {
        self.diff_area.is_none()
    }
}

/// What a streaming update did to an area's hunks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingUpdate {
    pub new: Vec<DiffId>,
    pub updated: Vec<DiffId>,
    pub removed: Vec<DiffId>,
}

pub struct DiffService<B, O = SimilarOracle> {
    buffers: B,
    oracle: O,
    options: DiffOptions,
    areas: HashMap<DiffAreaId, DiffArea>,
    areas_by_uri: HashMap<Uri, Vec<DiffAreaId>>,
    next_diff_id: u64,
    next_area_id: u64,
    write_flag: SystemWriteFlag,
    changes: ChangeSink,
    debouncer: Debouncer,
    events: EventBus,
}

impl DiffService<MemoryBuffers> {
    /// Engine over in-memory buffers whose edits are already wired to it
    pub fn in_memory() -> Self {
        let mut service = Self::new(MemoryBuffers::new());
        let sink = service.change_sink();
        service.buffers.connect(sink);
        service
    }
}

impl<B: TextBuffers> DiffService<B> {
    pub fn new(buffers: B) -> Self {
        Self::with_oracle(buffers, SimilarOracle::default())
    }
}

impl<B: TextBuffers, O: LineDiffOracle> DiffService<B, O> {
    pub fn with_oracle(buffers: B, oracle: O) -> Self {
        let write_flag = SystemWriteFlag::default();
        Self {
            buffers,
            oracle,
            options: DiffOptions::default(),
            areas: HashMap::new(),
            areas_by_uri: HashMap::new(),
            next_diff_id: 1,
            next_area_id: 1,
            changes: ChangeSink::new(write_flag.clone()),
            write_flag,
            debouncer: Debouncer::default(),
            events: EventBus::default(),
        }
    }

    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    /// Quiet period between the last human edit and recomputation
    pub fn with_recompute_delay(mut self, delay: Duration) -> Self {
        self.debouncer = Debouncer::new(delay);
        self
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    pub fn buffers(&self) -> &B {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut B {
        &mut self.buffers
    }

    /// Where the host reports buffer edits
    pub fn change_sink(&self) -> ChangeSink {
        self.changes.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<DiffAreaEvent> {
        self.events.subscribe()
    }

    pub fn is_system_write(&self) -> bool {
        self.write_flag.is_set()
    }

    pub fn diff_area_by_id(&self, id: DiffAreaId) -> Option<&DiffArea> {
        self.areas.get(&id)
    }

    /// Files that currently have tracked diffs
    pub fn uris(&self) -> Vec<Uri> {
        let mut uris: Vec<Uri> = self.areas_by_uri.keys().cloned().collect();
        uris.sort();
        uris
    }

    pub fn compute_diffs(&mut self, uri: &Uri, original: &str, modified: &str) -> ComputeResult {
        let options = self.options.clone();
        self.compute_diffs_with(uri, original, modified, &options)
    }

    /// Diff `original` against `modified`, track the result as the file's
    /// area and write `modified` into the live buffer
    pub fn compute_diffs_with(
        &mut self,
        uri: &Uri,
        original: &str,
        modified: &str,
        options: &DiffOptions,
    ) -> ComputeResult {
        let original_lines = split_lines(original);
        let modified_lines = split_lines(modified);
        let Some(mappings) = self.line_diff(&original_lines, &modified_lines, options) else {
            return ComputeResult::default();
        };

        let computed = materialize_mappings(&original_lines, &modified_lines, &mappings, 0);
        let (start_line, end_line) = region_bounds(
            computed.iter().map(|c| c.modified_range),
            modified_lines.len(),
        );

        // Decorations read the live buffer, so it has to hold the modified
        // text before anyone hears about the new area.
        if !self.write_buffer(uri, modified) {
            return ComputeResult::default();
        }

        self.delete_diff_areas_for_uri(uri);

        let diff_area_id = self.allocate_area_id();
        let mut area = DiffArea {
            diff_area_id,
            uri: uri.clone(),
            diffs: BTreeMap::new(),
            original_snapshot: original.to_string(),
            original_code: String::new(),
            original_line_count: 0,
            start_line,
            end_line,
            is_streaming: false,
            stream_request_id: None,
        };
        for fresh in computed {
            let diff = self.new_diff(diff_area_id, uri, fresh, DiffState::Pending);
            area.diffs.insert(diff.diff_id, diff);
        }
        area.refresh_baseline_from_snapshot();

        let diffs = area.sorted_diffs().into_iter().cloned().collect();
        self.insert_area(area.clone());
        self.emit(uri, diff_area_id, UpdateReason::Recompute);

        ComputeResult {
            diffs,
            diff_area: Some(area),
        }
    }

    /// Re-diff a streaming area against its snapshot, keeping the identity of
    /// hunks whose position did not change
    pub fn update_diffs_for_streaming(
        &mut self,
        diff_area_id: DiffAreaId,
        new_modified_content: &str,
        stream_request_id: Option<&str>,
    ) -> StreamingUpdate {
        let Some(area) = self.areas.get(&diff_area_id) else {
            log::warn!("streaming update for unknown {diff_area_id}");
            return StreamingUpdate::default();
        };
        let uri = area.uri.clone();

        let original_lines = split_lines(&area.original_snapshot);
        let modified_lines = split_lines(new_modified_content);
        let computed = self
            .line_diff(&original_lines, &modified_lines, &self.options)
            .map(|m| materialize_mappings(&original_lines, &modified_lines, &m, 0))
            .unwrap_or_default();
        let reconciliation = reconcile(area.diffs.values(), computed);

        if !self.write_buffer(&uri, new_modified_content) {
            return StreamingUpdate::default();
        }

        let new_ids: Vec<DiffId> = reconciliation
            .added
            .iter()
            .map(|_| self.allocate_diff_id())
            .collect();
        let update = StreamingUpdate {
            new: new_ids.clone(),
            updated: reconciliation.updated.iter().map(|(id, _)| *id).collect(),
            removed: reconciliation.removed.clone(),
        };

        let Some(area) = self.areas.get_mut(&diff_area_id) else {
            return StreamingUpdate::default();
        };
        for id in &reconciliation.removed {
            area.diffs.remove(id);
        }
        for (id, fresh) in reconciliation.updated {
            if let Some(diff) = area.diffs.get_mut(&id) {
                diff.original_range = fresh.original_range;
                diff.modified_range = fresh.modified_range;
                diff.original_code = fresh.original_code;
                diff.modified_code = fresh.modified_code;
            }
        }
        for (diff_id, fresh) in new_ids.into_iter().zip(reconciliation.added) {
            area.diffs.insert(
                diff_id,
                build_diff(diff_id, diff_area_id, &uri, fresh, DiffState::Streaming),
            );
        }
        for diff in area.diffs.values_mut() {
            diff.state = DiffState::Streaming;
        }
        area.is_streaming = true;
        if let Some(request) = stream_request_id {
            area.stream_request_id = Some(request.to_string());
        }

        if area.diffs.is_empty() {
            log::debug!("{diff_area_id} streamed back to its original text");
            self.remove_area(diff_area_id);
            return update;
        }

        let (start_line, end_line) = region_bounds(
            area.diffs.values().map(|d| d.modified_range),
            modified_lines.len(),
        );
        area.start_line = start_line;
        area.end_line = end_line;
        area.refresh_baseline_from_snapshot();

        self.emit(&uri, diff_area_id, UpdateReason::Streaming);
        update
    }

    /// Stop streaming into an area; its hunks go back to pending
    pub fn abort_streaming(&mut self, diff_area_id: DiffAreaId) -> bool {
        let Some(area) = self.areas.get_mut(&diff_area_id) else {
            log::warn!("cannot stop streaming into unknown {diff_area_id}");
            return false;
        };
        area.is_streaming = false;
        area.stream_request_id = None;
        for diff in area.diffs.values_mut() {
            if diff.state == DiffState::Streaming {
                diff.state = DiffState::Pending;
            }
        }
        let uri = area.uri.clone();
        self.emit(&uri, diff_area_id, UpdateReason::Recompute);
        true
    }

    /// Replace an area's full-file snapshot, e.g. after everything in it
    /// was accepted, and re-slice its baseline from it
    pub fn update_diff_area_snapshot(&mut self, diff_area_id: DiffAreaId, snapshot: &str) -> bool {
        let Some(area) = self.areas.get_mut(&diff_area_id) else {
            log::warn!("cannot update snapshot of unknown {diff_area_id}");
            return false;
        };
        area.original_snapshot = snapshot.to_string();
        area.refresh_baseline_from_snapshot();
        true
    }

    /// Fold one accepted hunk into the area's baseline. Must run at most
    /// once per hunk; the caller deletes the hunk right after.
    pub fn merge_accepted_diff_into_baseline(&mut self, diff_area_id: DiffAreaId, diff: &Diff) -> bool {
        let Some(area) = self.areas.get_mut(&diff_area_id) else {
            log::warn!("cannot merge {} into unknown {diff_area_id}", diff.diff_id);
            return false;
        };

        let offset = diff.original_range.start.saturating_sub(area.start_line);
        let baseline = fragment_lines(&area.original_code, area.original_line_count);
        let merged = merge_into_baseline(&baseline, offset, diff);
        area.original_line_count = merged.len();
        area.original_code = merged.join("\n");

        // Hunks further down now sit at a different offset in the baseline
        let delta = diff.line_delta();
        if delta != 0 {
            for sibling in area.diffs.values_mut() {
                if sibling.diff_id != diff.diff_id
                    && sibling.original_range.start >= diff.original_range.end
                {
                    sibling.original_range = sibling.original_range.shifted(delta);
                }
            }
        }
        true
    }

    /// Adjust every area on `uri` for a human edit that replaced
    /// `change_range` with `change_text`
    pub fn realign_diff_area_ranges(&mut self, uri: &Uri, change_text: &str, change_range: EditRange) {
        if change_range.start_line == 0 {
            log::warn!("ignoring edit at line 0 of {uri}");
            return;
        }
        let new_height = line_count(change_text);
        let mut overlapped = false;
        for id in self.area_ids(uri) {
            let Some(area) = self.areas.get_mut(&id) else {
                continue;
            };
            let realigned = realign(area.start_line, area.end_line, change_range, new_height);

            match realigned.placement {
                EditPlacement::Above => {
                    for diff in area.diffs.values_mut() {
                        diff.original_range = diff.original_range.shifted(realigned.delta);
                        diff.modified_range = diff.modified_range.shifted(realigned.delta);
                    }
                }
                EditPlacement::Inside => {
                    for diff in area.diffs.values_mut() {
                        if diff.modified_range.start > change_range.end_line {
                            diff.modified_range = diff.modified_range.shifted(realigned.delta);
                        }
                    }
                }
                EditPlacement::Below => {}
                // Hunk ranges no longer line up with the baseline; rebuild
                // them before anything merges against the stale offsets
                EditPlacement::Contains
                | EditPlacement::OverlapsTop
                | EditPlacement::OverlapsBottom => overlapped = true,
            }

            log::debug!(
                "{id} realigned {:?}: {}..={} -> {}..={}",
                realigned.placement,
                area.start_line,
                area.end_line,
                realigned.start_line,
                realigned.end_line
            );
            area.start_line = realigned.start_line;
            area.end_line = realigned.end_line;
        }

        if overlapped {
            self.recompute_diffs_for_file(uri);
        }
    }

    /// Rebuild the hunks of every settled area on `uri` by diffing the live
    /// region against its baseline
    pub fn recompute_diffs_for_file(&mut self, uri: &Uri) {
        if self.write_flag.is_set() {
            log::debug!("skipping recompute of {uri} during a system write");
            return;
        }
        let Some(text) = self.buffers.text(uri) else {
            log::warn!("cannot recompute {uri}: buffer is not open");
            return;
        };
        let live = split_lines(&text);

        for id in self.area_ids(uri) {
            let Some(area) = self.areas.get(&id) else {
                continue;
            };
            if area.is_streaming {
                log::debug!("skipping recompute of streaming {id}");
                continue;
            }

            let offset = area.start_line.saturating_sub(1);
            let from = offset.min(live.len());
            let to = area.end_line.min(live.len()).max(from);
            let region = &live[from..to];
            let baseline = fragment_lines(&area.original_code, area.original_line_count);
            let computed = self
                .line_diff(&baseline, region, &self.options)
                .map(|m| materialize_mappings(&baseline, region, &m, offset))
                .unwrap_or_default();

            let fresh: BTreeMap<DiffId, Diff> = computed
                .into_iter()
                .map(|c| {
                    let diff = self.new_diff(id, uri, c, DiffState::Pending);
                    (diff.diff_id, diff)
                })
                .collect();

            if fresh.is_empty() {
                log::debug!("{id} no longer differs from its baseline");
                self.remove_area(id);
                continue;
            }
            if let Some(area) = self.areas.get_mut(&id) {
                area.diffs = fresh;
            }
            self.emit(uri, id, UpdateReason::Recompute);
        }
    }

    /// Remove one hunk; the area goes with its last hunk
    pub fn delete_diff(&mut self, diff_area_id: DiffAreaId, diff_id: DiffId) -> Option<Diff> {
        let Some(area) = self.areas.get_mut(&diff_area_id) else {
            log::warn!("cannot delete {diff_id}: unknown {diff_area_id}");
            return None;
        };
        let Some(removed) = area.diffs.remove(&diff_id) else {
            log::warn!("cannot delete {diff_id}: not in {diff_area_id}");
            return None;
        };

        if area.diffs.is_empty() {
            self.remove_area(diff_area_id);
        } else {
            let uri = area.uri.clone();
            self.emit(&uri, diff_area_id, UpdateReason::Deleted);
        }
        Some(removed)
    }

    /// Put a hunk's original text back into the live buffer and drop it
    pub fn revert_diff(&mut self, diff_area_id: DiffAreaId, diff_id: DiffId) -> bool {
        let Some(area) = self.areas.get(&diff_area_id) else {
            log::warn!("cannot revert {diff_id}: unknown {diff_area_id}");
            return false;
        };
        let Some(diff) = area.diffs.get(&diff_id).cloned() else {
            log::warn!("cannot revert {diff_id}: not in {diff_area_id}");
            return false;
        };
        let uri = area.uri.clone();
        let Some(text) = self.buffers.text(&uri) else {
            log::warn!("cannot revert {diff_id}: {uri} is not open");
            return false;
        };

        let original = fragment_lines(&diff.original_code, diff.original_range.len());
        let restored = splice_lines(&text, diff.modified_range, &original);
        if !self.write_buffer(&uri, &restored) {
            return false;
        }

        let delta = -diff.line_delta();
        if let Some(area) = self.areas.get_mut(&diff_area_id) {
            if delta != 0 {
                for sibling in area.diffs.values_mut() {
                    if sibling.diff_id != diff_id
                        && sibling.modified_range.start >= diff.modified_range.end
                    {
                        sibling.modified_range = sibling.modified_range.shifted(delta);
                    }
                }
            }
            area.end_line = offset_line(area.end_line, delta).max(area.start_line);
        }

        self.delete_diff(diff_area_id, diff_id).is_some()
    }

    /// Drop every area on a file, returning how many were removed
    pub fn delete_diff_areas_for_uri(&mut self, uri: &Uri) -> usize {
        let ids = self.area_ids(uri);
        for id in &ids {
            self.remove_area(*id);
        }
        ids.len()
    }

    /// Re-inject a previously captured area verbatim, replacing whatever is
    /// tracked for its file
    pub fn restore_diff_area(&mut self, area: DiffArea) -> bool {
        if let Err(err) = area.validate() {
            log::warn!("refusing to restore {}: {err}", area.diff_area_id);
            return false;
        }
        let uri = area.uri.clone();
        let id = area.diff_area_id;
        for existing in self.area_ids(&uri) {
            if existing != id {
                self.remove_area(existing);
            }
        }

        self.next_area_id = self.next_area_id.max(id.0 + 1);
        if let Some(max_diff) = area.diffs.keys().max() {
            self.next_diff_id = self.next_diff_id.max(max_diff.0 + 1);
        }
        self.insert_area(area);
        self.emit(&uri, id, UpdateReason::Recompute);
        true
    }

    /// Realign for every human edit reported since the last call and
    /// schedule the affected files for recomputation
    pub fn handle_pending_changes(&mut self, now: Instant) -> usize {
        let changes = self.changes.drain();
        for change in &changes {
            self.realign_diff_area_ranges(&change.uri, &change.text, change.range);
            if self.areas_by_uri.contains_key(&change.uri) {
                self.debouncer.schedule(&change.uri, now);
            }
        }
        changes.len()
    }

    /// Recompute every file whose quiet period has elapsed
    pub fn tick(&mut self, now: Instant) -> Vec<Uri> {
        let due = self.debouncer.take_due(now);
        for uri in &due {
            self.recompute_diffs_for_file(uri);
        }
        due
    }

    pub fn next_recompute_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    fn line_diff(
        &self,
        original: &[&str],
        modified: &[&str],
        options: &DiffOptions,
    ) -> Option<Vec<LineRangeMapping>> {
        match self.oracle.compute(original, modified, options) {
            Ok(LineDiff::Changes(mappings)) if !mappings.is_empty() => Some(mappings),
            Ok(_) => None,
            Err(err) => {
                log::warn!("{err}; treating the file as unchanged");
                None
            }
        }
    }

    /// Write into a live buffer with the system-write flag raised
    fn write_buffer(&mut self, uri: &Uri, text: &str) -> bool {
        let _guard = self.write_flag.begin();
        match self.buffers.set_text(uri, text) {
            Ok(()) => true,
            Err(err) => {
                log::error!("failed to write {uri}: {err}");
                false
            }
        }
    }

    fn area_ids(&self, uri: &Uri) -> Vec<DiffAreaId> {
        self.areas_by_uri.get(uri).cloned().unwrap_or_default()
    }

    fn insert_area(&mut self, area: DiffArea) {
        let ids = self.areas_by_uri.entry(area.uri.clone()).or_default();
        if !ids.contains(&area.diff_area_id) {
            ids.push(area.diff_area_id);
        }
        self.areas.insert(area.diff_area_id, area);
    }

    fn remove_area(&mut self, id: DiffAreaId) -> Option<DiffArea> {
        let area = self.areas.remove(&id)?;
        if let Some(ids) = self.areas_by_uri.get_mut(&area.uri) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.areas_by_uri.remove(&area.uri);
                self.debouncer.cancel(&area.uri);
            }
        }
        self.emit(&area.uri, id, UpdateReason::Deleted);
        Some(area)
    }

    fn emit(&mut self, uri: &Uri, diff_area_id: DiffAreaId, reason: UpdateReason) {
        self.events.emit(DiffAreaEvent {
            uri: uri.clone(),
            diff_area_id,
            reason,
        });
    }

    fn allocate_area_id(&mut self) -> DiffAreaId {
        let id = DiffAreaId(self.next_area_id);
        self.next_area_id += 1;
        id
    }

    fn allocate_diff_id(&mut self) -> DiffId {
        let id = DiffId(self.next_diff_id);
        self.next_diff_id += 1;
        id
    }

    fn new_diff(&mut self, area: DiffAreaId, uri: &Uri, fresh: ComputedDiff, state: DiffState) -> Diff {
        let diff_id = self.allocate_diff_id();
        build_diff(diff_id, area, uri, fresh, state)
    }
}

impl<B: TextBuffers, O: LineDiffOracle> DiffAreaStore for DiffService<B, O> {
    fn diff_area(&self, uri: &Uri, id: DiffAreaId) -> Option<&DiffArea> {
        self.areas.get(&id).filter(|area| &area.uri == uri)
    }

    fn diff_areas_for_uri(&self, uri: &Uri) -> Vec<&DiffArea> {
        self.areas_by_uri
            .get(uri)
            .map(|ids| ids.iter().filter_map(|id| self.areas.get(id)).collect())
            .unwrap_or_default()
    }
}

fn build_diff(
    diff_id: DiffId,
    diff_area_id: DiffAreaId,
    uri: &Uri,
    fresh: ComputedDiff,
    state: DiffState,
) -> Diff {
    Diff {
        diff_id,
        diff_area_id,
        uri: uri.clone(),
        original_range: fresh.original_range,
        modified_range: fresh.modified_range,
        original_code: fresh.original_code,
        modified_code: fresh.modified_code,
        state,
    }
}

/// Turn oracle mappings over two fragments into hunks with text, moving the
/// ranges down by `offset` lines into file coordinates
fn materialize_mappings(
    original: &[&str],
    modified: &[&str],
    mappings: &[LineRangeMapping],
    offset: usize,
) -> Vec<ComputedDiff> {
    mappings
        .iter()
        .map(|m| ComputedDiff {
            original_range: LineRange::new(m.original.start + offset, m.original.end + offset),
            modified_range: LineRange::new(m.modified.start + offset, m.modified.end + offset),
            original_code: materialize(original, m.original),
            modified_code: materialize(modified, m.modified),
        })
        .collect()
}

/// Live region covered by a set of hunks: the span of their modified lines,
/// with deletions anchored at the line after the removed text. A set made
/// only of deletions covers the whole file.
fn region_bounds(
    modified_ranges: impl IntoIterator<Item = LineRange>,
    modified_line_count: usize,
) -> (usize, usize) {
    let last = modified_line_count.max(1);
    let mut bounds: Option<(usize, usize)> = None;
    let mut anchors = Vec::new();

    for range in modified_ranges {
        match range.last_line() {
            Some(end) => bounds = Some(widen(bounds, range.start, end)),
            None => anchors.push(range.start.clamp(1, last)),
        }
    }

    match bounds {
        None => (1, last),
        Some(bounds) => anchors
            .into_iter()
            .fold(bounds, |b, anchor| widen(Some(b), anchor, anchor)),
    }
}

fn widen(bounds: Option<(usize, usize)>, start: usize, end: usize) -> (usize, usize) {
    match bounds {
        Some((s, e)) => (s.min(start), e.max(end)),
        None => (start, end),
    }
}
