mod identifiers;

pub use identifiers::{MovieSlug, SurfaceId};

use serde::{Deserialize, Serialize};

use crate::constants::{AUTO_LEVEL_INDEX, AUTO_LEVEL_LABEL};

/// Catalog entry as embedded in the resume record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(default)]
    pub id: Option<u64>,
    pub title: String,
    pub slug: MovieSlug,
    pub hls_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Server-held resume state returned by `GET movie/progress/{slug}/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub movie: Movie,
    #[serde(default)]
    pub progress_seconds: f64,
}

impl ResumeRecord {
    /// Start offset for playback. Negative or non-finite values seed from zero.
    pub fn start_position(&self) -> f64 {
        if self.progress_seconds.is_finite() && self.progress_seconds > 0.0 {
            self.progress_seconds
        } else {
            0.0
        }
    }
}

/// Resumable watch state for one title, sent as the PATCH body.
///
/// The title slug is the path parameter of the request, so the body only
/// carries the `(position, finished)` pair. A finished record always has a
/// zero position so the next session restarts from the beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(rename = "progress_seconds")]
    position_seconds: u64,
    finished: bool,
}

impl ProgressRecord {
    /// In-progress record at the given position
    pub fn at(position_seconds: u64) -> Self {
        Self {
            position_seconds,
            finished: false,
        }
    }

    /// Completed record, reset to the start
    pub fn finished() -> Self {
        Self {
            position_seconds: 0,
            finished: true,
        }
    }

    pub fn position_seconds(&self) -> u64 {
        self.position_seconds
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// One selectable resolution tier exposed to the quality menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLevel {
    pub label: String,
    pub level_index: i32,
}

impl QualityLevel {
    pub fn auto() -> Self {
        Self {
            label: AUTO_LEVEL_LABEL.to_string(),
            level_index: AUTO_LEVEL_INDEX,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.level_index == AUTO_LEVEL_INDEX
    }
}

/// Live `(current_time, duration)` observation taken from a surface.
///
/// Only constructed once media metadata is known. `duration` may be infinite
/// for live playlists without an end tag; `current_time` is clamped into
/// `0..=duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    current_time: f64,
    duration: f64,
}

impl PlaybackClock {
    pub fn new(current_time: f64, duration: Option<f64>) -> Option<Self> {
        let duration = duration.filter(|d| !d.is_nan() && *d >= 0.0)?;
        let current_time = if current_time.is_finite() {
            current_time.clamp(0.0, duration)
        } else {
            0.0
        };
        Some(Self {
            current_time,
            duration,
        })
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn remaining(&self) -> f64 {
        self.duration - self.current_time
    }
}
