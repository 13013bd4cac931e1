//! Selection tracking: cached anchors, change detection and debouncing.

mod debounce;
mod state;
mod tracker;

pub use debounce::Debouncer;
pub use state::SelectionState;
pub use tracker::{SelectionNotice, SelectionTracker, TrackerState};
