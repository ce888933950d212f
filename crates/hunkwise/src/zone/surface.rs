//! Editor surfaces as seen by the zone synchronizer

use super::decoration::Decoration;
use hunkwise_core::{DiffAreaId, DiffId, DiffKind, Uri};
use serde::Serialize;
use std::fmt;

/// Stable handle given to an editor surface when it is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Handle to a decoration set applied to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DecorationSetId(pub u64);

/// Handle to a widget mounted on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WidgetId(pub u64);

/// Accept/reject affordance for one hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HunkWidget {
    pub diff_id: DiffId,
    pub diff_area_id: DiffAreaId,
    pub uri: Uri,
    /// Buffer line the widget is laid out against
    pub line: usize,
    pub kind: DiffKind,
}

/// What the synchronizer needs from an editor to draw on its surfaces
pub trait SurfaceHost {
    /// A surface showing `uri` was given `surface` as its handle
    fn attach(&mut self, surface: SurfaceId, uri: &Uri);
    /// The surface closed; its handle is never reused
    fn detach(&mut self, surface: SurfaceId);
    /// Current line count of the surface's buffer, `None` once it is gone
    fn line_count(&self, surface: SurfaceId) -> Option<usize>;
    fn set_decorations(&mut self, surface: SurfaceId, decorations: &[Decoration]) -> DecorationSetId;
    fn clear_decorations(&mut self, surface: SurfaceId, set: DecorationSetId);
    fn add_widget(&mut self, surface: SurfaceId, widget: &HunkWidget) -> WidgetId;
    fn remove_widget(&mut self, surface: SurfaceId, widget: WidgetId);
}
