//! Document processing with live progress tracking

mod lifecycle;
mod progress;

pub use lifecycle::DocumentManager;
pub use progress::{IngestStage, ProgressHub, StageEvent};
