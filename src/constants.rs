// Playback and progress tuning constants
// Values mirror the behaviour of the web client so resume state stays compatible

// === Streaming ===
/// MIME type probed on surfaces that may play HLS without a managed decoder
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Pseudo level index meaning "let the decoder pick the tier"
pub const AUTO_LEVEL_INDEX: i32 = -1;
pub const AUTO_LEVEL_LABEL: &str = "Auto";

// === Volume presets ===
pub const WATCH_VOLUME: f64 = 0.3;
pub const AMBIENT_PREVIEW_VOLUME: f64 = 0.0;
pub const DETAIL_PREVIEW_VOLUME: f64 = 0.05;

// === Progress ===
/// Less than this many seconds left counts as finished
pub const FINISH_THRESHOLD_SECS: f64 = 5.0;

// === Backend ===
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";
pub const MOVIE_PROGRESS_ENDPOINT: &str = "movie/progress/";

// === Routing ===
/// Client route of the dedicated watch page, followed by the title slug
pub const WATCH_ROUTE_PREFIX: &str = "/browse/watch/";
