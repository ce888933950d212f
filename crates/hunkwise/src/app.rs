//! Review TUI state: one file, its diff area, and the widgets drawn for it

use crate::config::Config;
use crate::review::ReviewSession;
use crate::zone::{
    Decoration, DecorationSetId, DiffZoneManager, EditEvent, HunkWidget, SurfaceHost, SurfaceId,
    WidgetId,
};
use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hunkwise_core::text::line_count;
use hunkwise_core::{Diff, DiffService, MemoryBuffers, TextBuffers, Uri};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Instant;

/// Terminal-side surface host: keeps whatever the synchronizer asked it to
/// draw so the view can render it
#[derive(Debug, Default)]
pub struct TerminalSurface {
    surfaces: BTreeMap<SurfaceId, Uri>,
    line_counts: HashMap<Uri, usize>,
    decorations: BTreeMap<DecorationSetId, (SurfaceId, Vec<Decoration>)>,
    widgets: BTreeMap<WidgetId, (SurfaceId, HunkWidget)>,
    next_id: u64,
}

impl TerminalSurface {
    pub fn set_line_count(&mut self, uri: &Uri, count: usize) {
        self.line_counts.insert(uri.clone(), count);
    }

    pub fn decorations(&self, surface: SurfaceId) -> impl Iterator<Item = &Decoration> {
        self.decorations
            .values()
            .filter(move |(s, _)| *s == surface)
            .flat_map(|(_, set)| set.iter())
    }

    /// Widgets on `surface` in buffer order
    pub fn widgets(&self, surface: SurfaceId) -> Vec<&HunkWidget> {
        let mut widgets: Vec<&HunkWidget> = self
            .widgets
            .values()
            .filter(|(s, _)| *s == surface)
            .map(|(_, w)| w)
            .collect();
        widgets.sort_by_key(|w| (w.line, w.diff_id));
        widgets
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl SurfaceHost for TerminalSurface {
    fn attach(&mut self, surface: SurfaceId, uri: &Uri) {
        self.surfaces.insert(surface, uri.clone());
    }

    fn detach(&mut self, surface: SurfaceId) {
        self.surfaces.remove(&surface);
    }

    fn line_count(&self, surface: SurfaceId) -> Option<usize> {
        let uri = self.surfaces.get(&surface)?;
        self.line_counts.get(uri).copied()
    }

    fn set_decorations(&mut self, surface: SurfaceId, decorations: &[Decoration]) -> DecorationSetId {
        let id = DecorationSetId(self.allocate());
        self.decorations.insert(id, (surface, decorations.to_vec()));
        id
    }

    fn clear_decorations(&mut self, _surface: SurfaceId, set: DecorationSetId) {
        self.decorations.remove(&set);
    }

    fn add_widget(&mut self, surface: SurfaceId, widget: &HunkWidget) -> WidgetId {
        let id = WidgetId(self.allocate());
        self.widgets.insert(id, (surface, widget.clone()));
        id
    }

    fn remove_widget(&mut self, _surface: SurfaceId, widget: WidgetId) {
        self.widgets.remove(&widget);
    }
}

pub struct App {
    pub uri: Uri,
    pub output: PathBuf,
    pub selected: usize,
    pub scroll: u16,
    pub status: String,
    pub should_quit: bool,
    service: DiffService<MemoryBuffers>,
    zones: DiffZoneManager<TerminalSurface>,
    review: ReviewSession,
    surface: SurfaceId,
}

impl App {
    pub fn new(
        original: &str,
        modified: &str,
        output: PathBuf,
        config: &Config,
    ) -> Result<Self> {
        let uri = Uri::new(format!("file://{}", output.display()));
        let mut service = DiffService::in_memory()
            .with_options(config.diff_options())
            .with_recompute_delay(config.recompute_delay());
        service.buffers_mut().open(uri.clone(), original);
        let events = service.subscribe();

        let result = service.compute_diffs(&uri, original, modified);
        // Nothing differs, or the diff failed; show the proposal as is
        if result.is_empty() {
            service
                .buffers_mut()
                .set_text(&uri, modified)
                .context("Failed to load proposed text")?;
        }

        let review = ReviewSession::new();
        let mut zones =
            DiffZoneManager::new(TerminalSurface::default()).with_state_source(review.states());
        zones.listen(events);
        zones
            .host_mut()
            .set_line_count(&uri, line_count(modified));
        let surface = zones.surface_opened(uri.clone(), &service);
        zones.pump(&service);

        let status = format!("{} hunks proposed", result.diffs.len());
        Ok(Self {
            uri,
            output,
            selected: 0,
            scroll: 0,
            status,
            should_quit: false,
            service,
            zones,
            review,
            surface,
        })
    }

    pub fn text(&self) -> String {
        self.service.buffers().text(&self.uri).unwrap_or_default()
    }

    pub fn widgets(&self) -> Vec<&HunkWidget> {
        self.zones.host().widgets(self.surface)
    }

    pub fn decorations(&self) -> Vec<&Decoration> {
        self.zones.host().decorations(self.surface).collect()
    }

    pub fn selected_widget(&self) -> Option<&HunkWidget> {
        self.widgets().get(self.selected).copied()
    }

    /// The hunk a widget stands for, as the engine currently tracks it
    pub fn diff_for(&self, widget: &HunkWidget) -> Option<&Diff> {
        self.service
            .diff_area_by_id(widget.diff_area_id)
            .and_then(|area| area.diffs.get(&widget.diff_id))
    }

    pub fn is_resolved(&self) -> bool {
        self.service.uris().is_empty()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_prev(),
            KeyCode::Char('a') => self.resolve_selected(true),
            KeyCode::Char('r') => self.resolve_selected(false),
            KeyCode::Char('A') => {
                let event = self.review.accept_file(&mut self.service, &self.uri);
                self.finish_file(event, "Accepted all hunks");
            }
            KeyCode::Char('R') => {
                let event = self.review.reject_file(&mut self.service, &self.uri);
                self.finish_file(event, "Rejected all hunks");
            }
            KeyCode::Char('w') => self.write()?,
            _ => {}
        }
        Ok(())
    }

    /// Run recomputations whose quiet period has elapsed
    pub fn tick(&mut self) {
        if !self.service.tick(Instant::now()).is_empty() {
            self.sync();
        }
    }

    fn select_next(&mut self) {
        let count = self.widgets().len();
        if count > 0 {
            self.selected = (self.selected + 1).min(count - 1);
        }
    }

    fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn resolve_selected(&mut self, accept: bool) {
        let Some(widget) = self.selected_widget().cloned() else {
            self.status = "No hunk selected".to_string();
            return;
        };
        let done = if accept {
            self.review
                .accept_diff(&mut self.service, widget.diff_area_id, widget.diff_id)
        } else {
            self.review
                .reject_diff(&mut self.service, widget.diff_area_id, widget.diff_id)
        };
        self.status = match (done, accept) {
            (true, true) => format!("Accepted {}", widget.diff_id),
            (true, false) => format!("Rejected {}", widget.diff_id),
            (false, _) => format!("Could not resolve {}", widget.diff_id),
        };
        self.sync();
    }

    fn finish_file(&mut self, event: EditEvent, status: &str) {
        self.zones.handle_edit_event(&event);
        self.status = status.to_string();
        self.sync();
    }

    fn write(&mut self) -> Result<()> {
        let text = self.text();
        std::fs::write(&self.output, &text)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        self.status = format!("Wrote {}", self.output.display());
        Ok(())
    }

    /// Bring the surface up to date with the engine after anything changed
    fn sync(&mut self) {
        let lines = line_count(&self.text());
        self.zones.host_mut().set_line_count(&self.uri, lines);
        self.service.handle_pending_changes(Instant::now());
        self.zones.pump(&self.service);
        self.zones
            .surface_content_changed(self.surface, &self.service);

        let count = self.widgets().len();
        self.selected = self.selected.min(count.saturating_sub(1));
        if self.is_resolved() {
            let accepted = self.review.states().resolved(hunkwise_core::DiffState::Accepted);
            let rejected = self.review.states().resolved(hunkwise_core::DiffState::Rejected);
            self.status = format!(
                "All hunks resolved ({accepted} accepted, {rejected} rejected), w to write"
            );
        }
    }
}
