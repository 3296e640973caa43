use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::api::ProgressApi;
use crate::config::Config;
use crate::constants::WATCH_ROUTE_PREFIX;
use crate::models::{MovieSlug, QualityLevel, ResumeRecord};
use crate::player::{
    CapabilityMode, ControlLayerFactory, PlaybackController, PlaybackHandle, PlayerConfig,
    PlayerEventSubscriber, SharedAttachment, SharedSurface, SurfaceKind, VolumePreset,
    lock_attachment,
};
use crate::progress::{ProgressTracker, SaveTrigger};
use crate::utils::WatchError;

/// Lifecycle of the dedicated watch page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Loading,
    Ready,
    NotFound,
    Closed,
}

/// The view that renders the video element
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Render a surface of `kind` and resolve once it is mounted
    async fn surface_ready(&self, kind: SurfaceKind) -> Result<SharedSurface>;
}

pub fn watch_url_for(slug: &MovieSlug) -> String {
    format!("{}{}", WATCH_ROUTE_PREFIX, slug)
}

struct WatchSession {
    surface: SharedSurface,
    kind: SurfaceKind,
    mode: CapabilityMode,
    tracker: ProgressTracker,
    player: Option<PlaybackHandle>,
    autosave: Option<(CancellationToken, JoinHandle<()>)>,
}

/// Drives one watch page: resume fetch, attach, progress saves and teardown
pub struct WatchPageOrchestrator {
    api: Arc<dyn ProgressApi>,
    attachment: SharedAttachment,
    layers: Arc<dyn ControlLayerFactory>,
    config: Config,
    state: WatchState,
    watch_url: Option<String>,
    resume: Option<ResumeRecord>,
    session: Option<WatchSession>,
    last_error: Option<WatchError>,
}

impl WatchPageOrchestrator {
    pub fn new(
        api: Arc<dyn ProgressApi>,
        attachment: SharedAttachment,
        layers: Arc<dyn ControlLayerFactory>,
        config: Config,
    ) -> Self {
        Self {
            api,
            attachment,
            layers,
            config,
            state: WatchState::Loading,
            watch_url: None,
            resume: None,
            session: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn resume(&self) -> Option<&ResumeRecord> {
        self.resume.as_ref()
    }

    pub fn watch_url(&self) -> Option<&str> {
        self.watch_url.as_deref()
    }

    /// Most recent failure, if any. Only `NotFound` is meant for the user.
    pub fn last_error(&self) -> Option<&WatchError> {
        self.last_error.as_ref()
    }

    pub fn surface_kind(&self) -> Option<SurfaceKind> {
        self.session.as_ref().map(|s| s.kind)
    }

    pub fn capability_mode(&self) -> Option<CapabilityMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn player(&self) -> Option<&PlaybackHandle> {
        self.session.as_ref().and_then(|s| s.player.as_ref())
    }

    /// Fetch the resume record and bring playback up on the host's surface
    pub async fn start(&mut self, slug: MovieSlug, host: &dyn SurfaceHost) -> WatchState {
        if self.state != WatchState::Loading || self.watch_url.is_some() {
            debug!("Watch page already started ({:?})", self.state);
            return self.state;
        }

        let (context, decoder_supported) = {
            let attachment = lock_attachment(&self.attachment);
            (attachment.context(), attachment.adaptive_supported())
        };
        if !context.is_browser() {
            trace!("Not in an interactive browser, watch page stays loading");
            return self.state;
        }

        self.watch_url = Some(watch_url_for(&slug));

        let resume = match self.api.fetch_progress(&slug).await {
            Ok(resume) => resume,
            Err(e) => {
                warn!("Resume fetch for {} failed: {}", slug, e);
                self.last_error = Some(WatchError::NotFound(slug.to_string()));
                self.state = WatchState::NotFound;
                return self.state;
            }
        };

        info!(
            "Resuming {} at {}s",
            resume.movie.title,
            resume.start_position()
        );
        self.state = WatchState::Ready;

        let kind = if decoder_supported {
            SurfaceKind::Enhanced
        } else {
            SurfaceKind::Native
        };

        let timeout = self.config.playback.surface_ready_timeout();
        let surface = match tokio::time::timeout(timeout, host.surface_ready(kind)).await {
            Ok(Ok(surface)) => surface,
            Ok(Err(e)) => {
                warn!("Surface for {} never became ready: {:#}", slug, e);
                self.last_error = Some(WatchError::Attachment(e.to_string()));
                self.resume = Some(resume);
                return self.state;
            }
            Err(_) => {
                warn!("Timed out after {:?} waiting for the {:?} surface", timeout, kind);
                self.last_error = Some(WatchError::Attachment(format!(
                    "surface not ready after {:?}",
                    timeout
                )));
                self.resume = Some(resume);
                return self.state;
            }
        };

        let tracker = ProgressTracker::new(self.api.clone(), slug, &self.config.progress);
        let start_position = resume.start_position();
        let source_url = resume.movie.hls_url.clone();

        let (player, mode) = match kind {
            SurfaceKind::Enhanced => {
                let player = self.start_enhanced(&surface, start_position).await;
                let mode = lock_attachment(&self.attachment).attach(&surface, &source_url, false);
                (player, mode)
            }
            SurfaceKind::Native => {
                let mode = lock_attachment(&self.attachment).attach(&surface, &source_url, false);
                surface.set_current_time(start_position);
                (None, mode)
            }
        };

        let autosave = self.config.progress.autosave_interval().map(|interval| {
            let cancel = CancellationToken::new();
            let task = tracker.spawn_autosave(surface.clone(), interval, cancel.clone());
            (cancel, task)
        });

        self.session = Some(WatchSession {
            surface,
            kind,
            mode,
            tracker,
            player,
            autosave,
        });
        self.resume = Some(resume);
        self.state
    }

    async fn start_enhanced(
        &mut self,
        surface: &SharedSurface,
        start_position: f64,
    ) -> Option<PlaybackHandle> {
        let player = match PlaybackController::initialize(
            self.layers.as_ref(),
            surface.clone(),
            &PlayerConfig::watch(),
        ) {
            Ok(player) => player,
            Err(e) => {
                warn!("Control layer unavailable, playing without it: {:#}", e);
                self.last_error = Some(WatchError::Playback(e.to_string()));
                return None;
            }
        };

        let configured = async {
            player.seed_position(start_position).await?;
            player.set_volume_and_mute(VolumePreset::Watch).await
        };
        if let Err(e) = configured.await {
            warn!("Failed to configure playback: {:#}", e);
            self.last_error = Some(WatchError::Playback(e.to_string()));
        }
        Some(player)
    }

    fn save(&self, trigger: SaveTrigger) -> Option<JoinHandle<()>> {
        if self.state != WatchState::Ready {
            return None;
        }
        let session = self.session.as_ref()?;
        session.tracker.save(session.surface.as_ref(), trigger)
    }

    /// Router navigation. Saves progress when leaving the watch URL.
    pub fn navigate(&self, url: &str) -> Option<JoinHandle<()>> {
        let watch_url = self.watch_url.as_deref()?;
        if url == watch_url {
            trace!("Navigation to the current watch URL, not saving");
            return None;
        }
        debug!("Navigating away from {} to {}", watch_url, url);
        self.save(SaveTrigger::NavigationAway)
    }

    /// Page unload. The save is not awaited.
    pub fn before_unload(&self) -> Option<JoinHandle<()>> {
        self.save(SaveTrigger::Unload)
    }

    /// Player events for UI chrome (fullscreen, inactivity)
    pub fn events(&self) -> Result<PlayerEventSubscriber, WatchError> {
        let player = self
            .player()
            .ok_or_else(|| WatchError::Playback("no control layer on this page".to_string()))?;
        player
            .subscribe(None)
            .map_err(|e| WatchError::Playback(e.to_string()))
    }

    pub fn quality_levels(&self) -> Vec<QualityLevel> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let mut attachment = lock_attachment(&self.attachment);
        attachment.poll_events();
        attachment.quality_levels(&session.surface.id())
    }

    pub fn set_quality_level(&self, level_index: i32) -> Result<(), WatchError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| WatchError::Attachment("nothing attached".to_string()))?;
        lock_attachment(&self.attachment)
            .set_quality_level(&session.surface.id(), level_index)
            .map_err(|e| WatchError::Attachment(e.to_string()))
    }

    /// Stop autosave, dispose the player and release the stream. Safe to call repeatedly.
    pub async fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            if self.state == WatchState::Ready {
                self.state = WatchState::Closed;
            }
            return;
        };
        debug!("Tearing down watch page for {}", session.tracker.slug());

        if let Some((cancel, task)) = session.autosave {
            cancel.cancel();
            if let Err(e) = task.await {
                debug!("Autosave task ended abnormally: {}", e);
            }
        }
        if let Some(player) = session.player {
            if let Err(e) = player.dispose().await {
                debug!("Ignoring dispose error: {:#}", e);
            }
        }
        lock_attachment(&self.attachment).detach(&session.surface.id());

        self.state = WatchState::Closed;
    }
}
