use hunkwise::review::ReviewSession;
use hunkwise::zone::{
    Decoration, DecorationSetId, DiffZoneManager, HunkWidget, SurfaceHost, SurfaceId, WidgetId,
};
use hunkwise_core::{
    DiffAreaStore, DiffService, DiffState, EditRange, MemoryBuffers, TextBuffers, Uri,
};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

const ORIGINAL: &str = "a\nb\nc\nd\ne\nf\ng";
const MODIFIED: &str = "a\nB\nc\nnew\nd\nf\ng";

/// Surface host that records everything drawn on it
#[derive(Default)]
struct RecordingHost {
    attached: BTreeMap<SurfaceId, Uri>,
    line_counts: HashMap<Uri, usize>,
    decorations: BTreeMap<DecorationSetId, (SurfaceId, Vec<Decoration>)>,
    widgets: BTreeMap<WidgetId, (SurfaceId, HunkWidget)>,
    next: u64,
    detached: Vec<SurfaceId>,
}

impl RecordingHost {
    fn decorations_on(&self, surface: SurfaceId) -> Vec<&Decoration> {
        self.decorations
            .values()
            .filter(|(s, _)| *s == surface)
            .flat_map(|(_, set)| set.iter())
            .collect()
    }

    fn widgets_on(&self, surface: SurfaceId) -> Vec<&HunkWidget> {
        let mut widgets: Vec<&HunkWidget> = self
            .widgets
            .values()
            .filter(|(s, _)| *s == surface)
            .map(|(_, w)| w)
            .collect();
        widgets.sort_by_key(|w| w.line);
        widgets
    }

    fn widget_lines(&self, surface: SurfaceId) -> Vec<usize> {
        self.widgets_on(surface).iter().map(|w| w.line).collect()
    }

    /// Every widget sits inside the decoration its own hunk produced
    fn assert_aligned(&self, surface: SurfaceId) {
        let decorations = self.decorations_on(surface);
        for widget in self.widgets_on(surface) {
            let decoration = decorations
                .iter()
                .find(|d| d.diff_id == widget.diff_id)
                .unwrap_or_else(|| panic!("{} has a widget but no decoration", widget.diff_id));
            assert!(decoration.contains(widget.line));
        }
    }

    fn is_blank(&self) -> bool {
        self.decorations.is_empty() && self.widgets.is_empty()
    }

    fn allocate(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

impl SurfaceHost for RecordingHost {
    fn attach(&mut self, surface: SurfaceId, uri: &Uri) {
        self.attached.insert(surface, uri.clone());
    }

    fn detach(&mut self, surface: SurfaceId) {
        self.attached.remove(&surface);
        self.detached.push(surface);
    }

    fn line_count(&self, surface: SurfaceId) -> Option<usize> {
        let uri = self.attached.get(&surface)?;
        self.line_counts.get(uri).copied()
    }

    fn set_decorations(&mut self, surface: SurfaceId, decorations: &[Decoration]) -> DecorationSetId {
        let id = DecorationSetId(self.allocate());
        self.decorations.insert(id, (surface, decorations.to_vec()));
        id
    }

    fn clear_decorations(&mut self, _surface: SurfaceId, set: DecorationSetId) {
        assert!(self.decorations.remove(&set).is_some(), "cleared twice");
    }

    fn add_widget(&mut self, surface: SurfaceId, widget: &HunkWidget) -> WidgetId {
        let id = WidgetId(self.allocate());
        self.widgets.insert(id, (surface, widget.clone()));
        id
    }

    fn remove_widget(&mut self, _surface: SurfaceId, widget: WidgetId) {
        assert!(self.widgets.remove(&widget).is_some(), "removed twice");
    }
}

struct Harness {
    uri: Uri,
    service: DiffService<MemoryBuffers>,
    zones: DiffZoneManager<RecordingHost>,
}

impl Harness {
    fn new() -> Self {
        let uri = Uri::from("file:///src/lib.rs");
        let mut service = DiffService::in_memory();
        service.buffers_mut().open(uri.clone(), ORIGINAL);
        let mut zones = DiffZoneManager::new(RecordingHost::default());
        zones.listen(service.subscribe());
        Self { uri, service, zones }
    }

    fn with_states(review: &ReviewSession) -> Self {
        let mut harness = Self::new();
        let mut zones =
            DiffZoneManager::new(RecordingHost::default()).with_state_source(review.states());
        zones.listen(harness.service.subscribe());
        harness.zones = zones;
        harness
    }

    fn propose(&mut self) {
        let result = self.service.compute_diffs(&self.uri, ORIGINAL, MODIFIED);
        assert_eq!(result.diffs.len(), 3);
        self.sync_line_count();
    }

    fn open(&mut self) -> SurfaceId {
        self.sync_line_count();
        self.zones.surface_opened(self.uri.clone(), &self.service)
    }

    fn sync_line_count(&mut self) {
        let text = self.service.buffers().text(&self.uri).unwrap_or_default();
        let count = text.split('\n').count();
        self.zones
            .host_mut()
            .line_counts
            .insert(self.uri.clone(), count);
    }

    fn pump(&mut self) -> usize {
        self.sync_line_count();
        self.zones.pump(&self.service)
    }

    fn area_id(&self) -> hunkwise_core::DiffAreaId {
        self.service.diff_areas_for_uri(&self.uri)[0].diff_area_id
    }
}

#[test]
fn test_surface_opened_builds_zones_for_existing_areas() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();

    let zone = h.zones.zone(surface, h.area_id()).expect("zone created");
    assert!(zone.decorations.is_some());
    assert_eq!(zone.widgets.len(), 3);
    assert_eq!(h.zones.host().widget_lines(surface), vec![2, 4, 6]);
    h.zones.host().assert_aligned(surface);
}

#[test]
fn test_recompute_event_creates_zone_on_visible_surface() {
    let mut h = Harness::new();
    let surface = h.open();
    assert_eq!(h.zones.zones().count(), 0);

    h.propose();
    assert_eq!(h.pump(), 1);

    assert!(h.zones.zone(surface, h.area_id()).is_some());
    assert_eq!(h.zones.host().widgets_on(surface).len(), 3);
    h.zones.host().assert_aligned(surface);
}

#[test]
fn test_refresh_replaces_previous_decorations() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();
    h.pump();
    h.zones.surface_content_changed(surface, &h.service);

    // One live decoration set and one widget per hunk, however often it redraws
    assert_eq!(h.zones.host().decorations.len(), 1);
    assert_eq!(h.zones.host().widgets.len(), 3);
}

#[test]
fn test_accepting_every_hunk_disposes_zone() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();
    let mut review = ReviewSession::new();
    let area_id = h.area_id();

    let ids: Vec<_> = h.service.diff_areas_for_uri(&h.uri)[0]
        .diffs
        .keys()
        .copied()
        .collect();
    for (done, id) in ids.into_iter().enumerate() {
        assert!(review.accept_diff(&mut h.service, area_id, id));
        h.pump();
        h.zones.host().assert_aligned(surface);
        assert_eq!(h.zones.host().widgets_on(surface).len(), 2 - done);
    }

    assert!(h.zones.zone(surface, area_id).is_none());
    assert!(h.zones.host().is_blank());
    assert_eq!(h.service.buffers().text(&h.uri).unwrap(), MODIFIED);
}

#[test]
fn test_rejecting_a_hunk_moves_widgets_below_it() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();
    let mut review = ReviewSession::new();

    // Reject the insertion: everything after it moves up a line
    let area = h.service.diff_areas_for_uri(&h.uri)[0];
    let insertion = area.sorted_diffs()[1].diff_id;
    let area_id = area.diff_area_id;
    assert!(review.reject_diff(&mut h.service, area_id, insertion));
    h.pump();

    assert_eq!(h.zones.host().widget_lines(surface), vec![2, 5]);
    h.zones.host().assert_aligned(surface);
}

#[test]
fn test_file_level_edit_event_disposes_zones() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();
    let mut review = ReviewSession::new();

    let event = review.accept_file(&mut h.service, &h.uri);
    h.zones.handle_edit_event(&event);
    assert!(h.zones.host().is_blank());

    // The trailing deleted notification finds nothing left to refresh
    h.pump();
    assert_eq!(h.zones.zones().count(), 0);
    assert!(h.zones.surface_uri(surface).is_some());
}

#[test]
fn test_surface_close_disposes_and_detaches() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();

    h.zones.surface_closed(surface);

    assert!(h.zones.host().is_blank());
    assert_eq!(h.zones.host().detached, vec![surface]);
    assert!(h.zones.surface_uri(surface).is_none());

    // Later events for the file have no surface to draw on
    h.service.recompute_diffs_for_file(&h.uri);
    h.pump();
    assert!(h.zones.host().is_blank());
}

#[test]
fn test_streaming_updates_redraw_and_finish() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();
    let area_id = h.area_id();

    let update = h
        .service
        .update_diffs_for_streaming(area_id, &format!("{MODIFIED}\nh"), Some("gen"));
    assert_eq!(update.new.len(), 1);
    h.pump();

    let zone = h.zones.zone(surface, area_id).unwrap();
    assert!(zone.is_streaming);
    assert_eq!(zone.widgets.len(), 4);
    h.zones.host().assert_aligned(surface);

    assert!(h.service.abort_streaming(area_id));
    h.pump();
    assert!(!h.zones.zone(surface, area_id).unwrap().is_streaming);
}

#[test]
fn test_human_edit_above_area_shifts_widgets() {
    let mut h = Harness::new();
    h.propose();
    let surface = h.open();
    h.pump();

    h.service
        .buffers_mut()
        .edit(&h.uri, EditRange::line(1), "x\ny")
        .unwrap();
    let now = Instant::now();
    assert_eq!(h.service.handle_pending_changes(now), 1);
    h.sync_line_count();
    h.zones.surface_content_changed(surface, &h.service);
    assert_eq!(h.zones.host().widget_lines(surface), vec![3, 5, 7]);
    h.zones.host().assert_aligned(surface);

    // After the quiet period the hunks are rebuilt in place
    assert_eq!(h.service.tick(now + Duration::from_secs(1)), vec![h.uri.clone()]);
    assert_eq!(h.pump(), 1);
    assert_eq!(h.zones.host().widget_lines(surface), vec![3, 5, 7]);
    h.zones.host().assert_aligned(surface);
}

#[test]
fn test_authoritative_state_hides_resolved_hunks() {
    let review = ReviewSession::new();
    let mut h = Harness::with_states(&review);
    h.propose();
    let surface = h.open();

    let first = h.service.diff_areas_for_uri(&h.uri)[0].sorted_diffs()[0].diff_id;
    review.states().set(first, DiffState::Rejected);
    h.zones.surface_content_changed(surface, &h.service);

    assert_eq!(h.zones.host().widget_lines(surface), vec![4, 6]);
    assert!(h
        .zones
        .host()
        .decorations_on(surface)
        .iter()
        .all(|d| d.diff_id != first));
    h.zones.host().assert_aligned(surface);
}
