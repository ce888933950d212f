//! Zone synchronizer: binds diff areas to visible editor surfaces and keeps
//! their decorations and hunk widgets in step with the engine

pub mod decoration;
pub mod surface;

pub use decoration::{
    compute_decorations_from_diff_area, Decoration, DecorationPass, DecorationStyle,
    DiffStateSource, EngineState,
};
pub use surface::{DecorationSetId, HunkWidget, SurfaceHost, SurfaceId, WidgetId};

use crossbeam_channel::Receiver;
use hunkwise_core::{DiffArea, DiffAreaEvent, DiffAreaId, DiffAreaStore, DiffId, UpdateReason, Uri};
use std::collections::BTreeMap;

/// File-level resolutions from the edit layer; each tears zones down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEvent {
    AcceptFile(Uri),
    RejectFile(Uri),
    AcceptAll,
    RejectAll,
}

/// One diff area rendered on one surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffZone {
    pub diff_area_id: DiffAreaId,
    pub surface: SurfaceId,
    pub decorations: Option<DecorationSetId>,
    pub widgets: Vec<(DiffId, WidgetId)>,
    pub is_streaming: bool,
}

type ZoneKey = (SurfaceId, DiffAreaId);

pub struct DiffZoneManager<H> {
    host: H,
    surfaces: BTreeMap<SurfaceId, Uri>,
    next_surface: u32,
    zones: BTreeMap<ZoneKey, DiffZone>,
    events: Option<Receiver<DiffAreaEvent>>,
    states: Box<dyn DiffStateSource>,
}

impl<H: SurfaceHost> DiffZoneManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            surfaces: BTreeMap::new(),
            next_surface: 1,
            zones: BTreeMap::new(),
            events: None,
            states: Box::new(EngineState),
        }
    }

    /// Consult `states` instead of the engine for accept/reject state
    pub fn with_state_source(mut self, states: impl DiffStateSource + 'static) -> Self {
        self.states = Box::new(states);
        self
    }

    /// Take engine notifications from `events` on every [`pump`](Self::pump)
    pub fn listen(&mut self, events: Receiver<DiffAreaEvent>) {
        self.events = Some(events);
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn surface_uri(&self, surface: SurfaceId) -> Option<&Uri> {
        self.surfaces.get(&surface)
    }

    pub fn zone(&self, surface: SurfaceId, diff_area_id: DiffAreaId) -> Option<&DiffZone> {
        self.zones.get(&(surface, diff_area_id))
    }

    pub fn zones(&self) -> impl Iterator<Item = &DiffZone> {
        self.zones.values()
    }

    /// A surface showing `uri` became visible; zones are built for every
    /// area the file already has
    pub fn surface_opened(&mut self, uri: Uri, store: &impl DiffAreaStore) -> SurfaceId {
        let surface = SurfaceId(self.next_surface);
        self.next_surface += 1;
        log::debug!("{surface} opened for {uri}");

        self.host.attach(surface, &uri);
        for area in store.diff_areas_for_uri(&uri) {
            self.refresh(surface, area);
        }
        self.surfaces.insert(surface, uri);
        surface
    }

    pub fn surface_closed(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_none() {
            log::warn!("closing unknown {surface}");
            return;
        }
        let keys: Vec<ZoneKey> = self
            .zones
            .keys()
            .filter(|(s, _)| *s == surface)
            .copied()
            .collect();
        for key in keys {
            self.dispose(key);
        }
        self.host.detach(surface);
    }

    /// The surface's buffer changed; redraw everything on it
    pub fn surface_content_changed(&mut self, surface: SurfaceId, store: &impl DiffAreaStore) {
        let Some(uri) = self.surfaces.get(&surface).cloned() else {
            log::warn!("content change on unknown {surface}");
            return;
        };
        for area in store.diff_areas_for_uri(&uri) {
            self.refresh(surface, area);
        }
    }

    /// Drain pending engine notifications, returning how many were handled
    pub fn pump(&mut self, store: &impl DiffAreaStore) -> usize {
        let Some(events) = self.events.clone() else {
            return 0;
        };
        let mut handled = 0;
        for event in events.try_iter() {
            self.handle_area_event(&event, store);
            handled += 1;
        }
        handled
    }

    pub fn handle_area_event(&mut self, event: &DiffAreaEvent, store: &impl DiffAreaStore) {
        let surfaces = self.surfaces_for(&event.uri);
        let area = store.diff_area(&event.uri, event.diff_area_id);

        for surface in surfaces {
            let key = (surface, event.diff_area_id);
            match (area, event.reason) {
                (Some(area), _) => self.refresh(surface, area),
                (None, UpdateReason::Deleted) => self.dispose(key),
                (None, reason) => {
                    log::warn!(
                        "{:?} update for missing {} on {}",
                        reason,
                        event.diff_area_id,
                        event.uri
                    );
                    self.dispose(key);
                }
            }
        }
    }

    pub fn handle_edit_event(&mut self, event: &EditEvent) {
        let keys: Vec<ZoneKey> = match event {
            EditEvent::AcceptFile(uri) | EditEvent::RejectFile(uri) => {
                let surfaces = self.surfaces_for(uri);
                self.zones
                    .keys()
                    .filter(|(surface, _)| surfaces.contains(surface))
                    .copied()
                    .collect()
            }
            EditEvent::AcceptAll | EditEvent::RejectAll => self.zones.keys().copied().collect(),
        };
        for key in keys {
            self.dispose(key);
        }
    }

    fn surfaces_for(&self, uri: &Uri) -> Vec<SurfaceId> {
        self.surfaces
            .iter()
            .filter(|(_, u)| *u == uri)
            .map(|(surface, _)| *surface)
            .collect()
    }

    /// Recompute decorations for one zone, creating it on first use, then
    /// rebuild its widgets from scratch
    fn refresh(&mut self, surface: SurfaceId, area: &DiffArea) {
        let Some(line_count) = self.host.line_count(surface) else {
            log::warn!("{surface} has no buffer, skipping {}", area.diff_area_id);
            return;
        };
        let pass = compute_decorations_from_diff_area(area, line_count, self.states.as_ref());

        let zone = self
            .zones
            .entry((surface, area.diff_area_id))
            .or_insert_with(|| DiffZone {
                diff_area_id: area.diff_area_id,
                surface,
                decorations: None,
                widgets: Vec::new(),
                is_streaming: area.is_streaming,
            });

        if let Some(previous) = zone.decorations.take() {
            self.host.clear_decorations(surface, previous);
        }
        zone.decorations = Some(self.host.set_decorations(surface, &pass.decorations));

        for (_, widget) in zone.widgets.drain(..) {
            self.host.remove_widget(surface, widget);
        }
        for diff in area.sorted_diffs() {
            if !decoration::effective_state(diff, self.states.as_ref()).is_active() {
                continue;
            }
            let Some(decoration) = pass.by_diff.get(&diff.diff_id) else {
                continue;
            };
            let widget = HunkWidget {
                diff_id: diff.diff_id,
                diff_area_id: area.diff_area_id,
                uri: area.uri.clone(),
                line: decoration.start_line,
                kind: diff.kind(),
            };
            let id = self.host.add_widget(surface, &widget);
            zone.widgets.push((diff.diff_id, id));
        }
        zone.is_streaming = area.is_streaming;
    }

    fn dispose(&mut self, key: ZoneKey) {
        let Some(mut zone) = self.zones.remove(&key) else {
            return;
        };
        if let Some(set) = zone.decorations.take() {
            self.host.clear_decorations(zone.surface, set);
        }
        for (_, widget) in zone.widgets.drain(..) {
            self.host.remove_widget(zone.surface, widget);
        }
        log::debug!("disposed zone for {} on {}", zone.diff_area_id, zone.surface);
    }
}
