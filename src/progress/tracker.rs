use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::ProgressApi;
use crate::config::ProgressConfig;
use crate::constants::FINISH_THRESHOLD_SECS;
use crate::models::{MovieSlug, PlaybackClock, ProgressRecord};
use crate::player::{SharedSurface, VideoSurface};

/// Why a save was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    NavigationAway,
    Unload,
    Autosave,
}

impl std::fmt::Display for SaveTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveTrigger::NavigationAway => write!(f, "navigation"),
            SaveTrigger::Unload => write!(f, "unload"),
            SaveTrigger::Autosave => write!(f, "autosave"),
        }
    }
}

/// Progress for a position with `remaining` seconds left, using the default threshold
pub fn compute_progress(current_time: f64, remaining: f64) -> ProgressRecord {
    compute_progress_with_threshold(current_time, remaining, FINISH_THRESHOLD_SECS)
}

/// Less than `threshold` seconds left counts as finished and resets to zero.
/// Otherwise the position is floored to whole seconds.
pub fn compute_progress_with_threshold(
    current_time: f64,
    remaining: f64,
    threshold: f64,
) -> ProgressRecord {
    if remaining < threshold {
        ProgressRecord::finished()
    } else if current_time.is_finite() && current_time > 0.0 {
        ProgressRecord::at(current_time.floor() as u64)
    } else {
        ProgressRecord::at(0)
    }
}

/// Pushes the watch position of one title to the backend
#[derive(Clone)]
pub struct ProgressTracker {
    api: Arc<dyn ProgressApi>,
    slug: MovieSlug,
    finish_threshold: f64,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("slug", &self.slug)
            .field("finish_threshold", &self.finish_threshold)
            .finish()
    }
}

impl ProgressTracker {
    pub fn new(api: Arc<dyn ProgressApi>, slug: MovieSlug, config: &ProgressConfig) -> Self {
        Self {
            api,
            slug,
            finish_threshold: config.finish_threshold_secs,
        }
    }

    pub fn slug(&self) -> &MovieSlug {
        &self.slug
    }

    pub fn record_for(&self, clock: &PlaybackClock) -> ProgressRecord {
        compute_progress_with_threshold(
            clock.current_time(),
            clock.remaining(),
            self.finish_threshold,
        )
    }

    /// Read the surface clock and persist it without waiting for the request.
    ///
    /// Returns `None` when the media duration is not known yet.
    pub fn save(&self, surface: &dyn VideoSurface, trigger: SaveTrigger) -> Option<JoinHandle<()>> {
        self.save_clock(surface.clock(), trigger)
    }

    pub fn save_clock(
        &self,
        clock: Option<PlaybackClock>,
        trigger: SaveTrigger,
    ) -> Option<JoinHandle<()>> {
        let Some(clock) = clock else {
            debug!("Skipping {} save for {}: duration unknown", trigger, self.slug);
            return None;
        };
        let record = self.record_for(&clock);
        Some(self.persist(record, trigger))
    }

    /// Fire-and-forget PATCH. Failures are logged, never returned.
    pub fn persist(&self, record: ProgressRecord, trigger: SaveTrigger) -> JoinHandle<()> {
        let api = self.api.clone();
        let slug = self.slug.clone();
        trace!(
            "Saving progress for {} on {}: {}s finished={}",
            slug,
            trigger,
            record.position_seconds(),
            record.is_finished()
        );

        tokio::spawn(async move {
            match api.update_progress(&slug, record).await {
                Ok(()) => debug!("Progress saved for {} ({})", slug, trigger),
                Err(e) => warn!("Failed to save progress for {} ({}): {}", slug, trigger, e),
            }
        })
    }

    /// Save every `interval` until `cancel` fires. The first save happens one
    /// interval after start.
    pub fn spawn_autosave(
        &self,
        surface: SharedSurface,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        debug!("Starting autosave for {} every {:?}", tracker.slug, interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Autosave stopped for {}", tracker.slug);
                        break;
                    }
                    _ = ticker.tick() => {
                        tracker.save(surface.as_ref(), SaveTrigger::Autosave);
                    }
                }
            }
        })
    }
}
