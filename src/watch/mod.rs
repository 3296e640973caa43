pub mod orchestrator;
pub mod preview;

pub use orchestrator::{SurfaceHost, WatchPageOrchestrator, WatchState, watch_url_for};
pub use preview::AmbientPreview;
