pub mod tracker;

pub use tracker::{ProgressTracker, SaveTrigger, compute_progress, compute_progress_with_threshold};
