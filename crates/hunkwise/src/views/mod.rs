//! View rendering modules

mod single_pane;

pub use single_pane::render_single_pane;
