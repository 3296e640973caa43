use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::traits::{AdaptiveDecoder, DecoderEvent, DecoderFactory, LevelInfo, SharedSurface};
use super::types::{CapabilityMode, ExecutionContext, choose_mode};
use crate::constants::{AUTO_LEVEL_INDEX, HLS_MIME_TYPE};
use crate::models::{QualityLevel, SurfaceId};

type SharedLevels = Arc<Mutex<Vec<QualityLevel>>>;

/// One live decoder bound to one surface
pub struct StreamSession {
    surface_id: SurfaceId,
    source_url: String,
    mode: CapabilityMode,
    quality_levels: SharedLevels,
    active_level: i32,
    decoder: Box<dyn AdaptiveDecoder>,
    /// Set when no runtime was available to drain events in the background
    events: Option<mpsc::UnboundedReceiver<DecoderEvent>>,
    event_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("surface_id", &self.surface_id)
            .field("source_url", &self.source_url)
            .field("mode", &self.mode)
            .field("quality_levels", &self.quality_levels())
            .field("active_level", &self.active_level)
            .finish()
    }
}

impl StreamSession {
    pub fn surface_id(&self) -> &SurfaceId {
        &self.surface_id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn capability_mode(&self) -> CapabilityMode {
        self.mode
    }

    /// Empty until the decoder reports the manifest as parsed
    pub fn quality_levels(&self) -> Vec<QualityLevel> {
        lock_levels(&self.quality_levels).clone()
    }

    pub fn active_level(&self) -> i32 {
        self.active_level
    }

    fn has_level(&self, level_index: i32) -> bool {
        lock_levels(&self.quality_levels)
            .iter()
            .any(|level| level.level_index == level_index)
    }

    /// Apply queued events when no background task is draining them
    fn drain_events(&mut self) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        while let Ok(event) = events.try_recv() {
            apply_event(&self.surface_id, &self.quality_levels, event);
        }
    }

    /// Best-effort: destroy errors are logged and dropped
    fn teardown(mut self) {
        trace!("Destroying decoder session for {}", self.surface_id);
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        if let Err(e) = self.decoder.destroy() {
            debug!("Ignoring decoder destroy error on {}: {}", self.surface_id, e);
        }
    }
}

fn lock_levels(levels: &SharedLevels) -> MutexGuard<'_, Vec<QualityLevel>> {
    levels.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_event(surface_id: &SurfaceId, levels: &SharedLevels, event: DecoderEvent) {
    match event {
        DecoderEvent::ManifestParsed { levels: parsed } => {
            *lock_levels(levels) = quality_levels_from(&parsed);
            debug!(
                "Manifest parsed for {}: {} quality levels",
                surface_id,
                parsed.len()
            );
        }
        DecoderEvent::LevelSwitched { level_index } => {
            trace!("Decoder on {} switched to level {}", surface_id, level_index);
        }
        DecoderEvent::Error { fatal, details } => {
            if fatal {
                warn!("Fatal decoder error on {}: {}", surface_id, details);
            } else {
                debug!("Decoder error on {}: {}", surface_id, details);
            }
        }
    }
}

/// Apply decoder events to `levels` as they arrive, until the decoder goes away
fn spawn_event_task(
    runtime: &Handle,
    surface_id: SurfaceId,
    levels: SharedLevels,
    mut events: mpsc::UnboundedReceiver<DecoderEvent>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        while let Some(event) = events.recv().await {
            apply_event(&surface_id, &levels, event);
        }
        trace!("Decoder event stream closed for {}", surface_id);
    })
}

/// Build the quality menu: automatic first, then the decoder's tiers in order
pub fn quality_levels_from(levels: &[LevelInfo]) -> Vec<QualityLevel> {
    let mut result = Vec::with_capacity(levels.len() + 1);
    result.push(QualityLevel::auto());
    result.extend(levels.iter().enumerate().map(|(index, level)| QualityLevel {
        label: level_label(level),
        level_index: index as i32,
    }));
    result
}

fn level_label(level: &LevelInfo) -> String {
    if level.height > 0 {
        format!("{}p", level.height)
    } else {
        format!("{} kbps", level.bitrate / 1000)
    }
}

/// Registry shared between the watch page and the browse preview
pub type SharedAttachment = Arc<Mutex<StreamAttachment>>;

/// Lock the shared registry. Never hold the guard across an `.await`.
pub fn lock_attachment(shared: &SharedAttachment) -> MutexGuard<'_, StreamAttachment> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of decoder sessions keyed by surface.
///
/// Holds at most one session per surface. A new attach on a surface always
/// destroys the previous session before a new decoder is created.
pub struct StreamAttachment {
    decoders: Arc<dyn DecoderFactory>,
    context: ExecutionContext,
    sessions: HashMap<SurfaceId, StreamSession>,
}

impl StreamAttachment {
    pub fn new(decoders: Arc<dyn DecoderFactory>, context: ExecutionContext) -> Self {
        Self {
            decoders,
            context,
            sessions: HashMap::new(),
        }
    }

    pub fn shared(self) -> SharedAttachment {
        Arc::new(Mutex::new(self))
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Whether a managed decoder can be used in this runtime
    pub fn adaptive_supported(&self) -> bool {
        self.context.is_browser() && self.decoders.is_supported()
    }

    /// Bind `source_url` to `surface`, replacing any existing session.
    ///
    /// Never fails: missing capability, an empty URL or an unmounted surface
    /// leave the surface without a source and return `Unavailable`.
    pub fn attach(
        &mut self,
        surface: &SharedSurface,
        source_url: &str,
        muted: bool,
    ) -> CapabilityMode {
        if !self.context.is_browser() {
            trace!("Skipping attach outside an interactive browser");
            return CapabilityMode::Unavailable;
        }

        surface.set_muted(muted);
        self.detach(&surface.id());

        if source_url.is_empty() {
            debug!("No source URL for {}, leaving surface empty", surface.id());
            return CapabilityMode::Unavailable;
        }
        if !surface.is_mounted() {
            debug!("Surface {} is no longer mounted, skipping attach", surface.id());
            return CapabilityMode::Unavailable;
        }

        self.select_capability_and_load(surface, source_url)
    }

    pub fn select_capability_and_load(
        &mut self,
        surface: &SharedSurface,
        source_url: &str,
    ) -> CapabilityMode {
        if !self.context.is_browser() {
            trace!("Skipping capability selection outside an interactive browser");
            return CapabilityMode::Unavailable;
        }

        let surface_id = surface.id();
        if let Some(previous) = self.sessions.remove(&surface_id) {
            previous.teardown();
        }

        let decoder_supported = self.adaptive_supported();
        let can_play_natively =
            !decoder_supported && !surface.can_play_type(HLS_MIME_TYPE).is_empty();

        match choose_mode(decoder_supported, can_play_natively) {
            CapabilityMode::AdaptiveDecoder => match self.create_session(surface, source_url) {
                Ok(session) => {
                    info!("Attached adaptive stream {} to {}", source_url, surface_id);
                    self.sessions.insert(surface_id, session);
                    CapabilityMode::AdaptiveDecoder
                }
                Err(e) => {
                    warn!("Adaptive attach failed for {}: {:#}", surface_id, e);
                    CapabilityMode::Unavailable
                }
            },
            CapabilityMode::NativeFallback => {
                info!("Using native HLS playback on {}", surface_id);
                surface.set_src(source_url);
                CapabilityMode::NativeFallback
            }
            CapabilityMode::Unavailable => {
                warn!("No HLS playback capability for {}", surface_id);
                CapabilityMode::Unavailable
            }
        }
    }

    fn create_session(&self, surface: &SharedSurface, source_url: &str) -> Result<StreamSession> {
        let (mut decoder, events) = self
            .decoders
            .create()
            .context("Failed to construct decoder")?;

        if let Err(e) = Self::bind(decoder.as_mut(), surface, source_url) {
            if let Err(destroy_err) = decoder.destroy() {
                debug!("Ignoring destroy error after failed bind: {}", destroy_err);
            }
            return Err(e);
        }

        let surface_id = surface.id();
        let quality_levels = SharedLevels::default();
        let (events, event_task) = match Handle::try_current() {
            Ok(runtime) => {
                let task =
                    spawn_event_task(&runtime, surface_id.clone(), quality_levels.clone(), events);
                (None, Some(task))
            }
            Err(_) => (Some(events), None),
        };

        Ok(StreamSession {
            surface_id,
            source_url: source_url.to_string(),
            mode: CapabilityMode::AdaptiveDecoder,
            quality_levels,
            active_level: AUTO_LEVEL_INDEX,
            decoder,
            events,
            event_task,
        })
    }

    fn bind(
        decoder: &mut dyn AdaptiveDecoder,
        surface: &SharedSurface,
        source_url: &str,
    ) -> Result<()> {
        decoder
            .load_source(source_url)
            .context("Failed to load manifest")?;
        decoder
            .attach_media(surface)
            .context("Failed to attach decoder to surface")?;
        Ok(())
    }

    /// Destroy and forget the session for `surface_id`. No-op when there is none.
    pub fn detach(&mut self, surface_id: &SurfaceId) {
        if let Some(session) = self.sessions.remove(surface_id) {
            debug!("Detaching stream from {}", surface_id);
            session.teardown();
        }
    }

    /// Destroy every session
    pub fn clear(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        debug!("Clearing {} stream sessions", self.sessions.len());
        for (_, session) in self.sessions.drain() {
            session.teardown();
        }
    }

    /// Apply queued decoder events for sessions created outside a runtime
    pub fn poll_events(&mut self) {
        for session in self.sessions.values_mut() {
            session.drain_events();
        }
    }

    pub fn session(&self, surface_id: &SurfaceId) -> Option<&StreamSession> {
        self.sessions.get(surface_id)
    }

    pub fn has_session(&self, surface_id: &SurfaceId) -> bool {
        self.sessions.contains_key(surface_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn quality_levels(&self, surface_id: &SurfaceId) -> Vec<QualityLevel> {
        self.sessions
            .get(surface_id)
            .map(StreamSession::quality_levels)
            .unwrap_or_default()
    }

    /// Switch the session on `surface_id` to a listed tier (`-1` = automatic)
    pub fn set_quality_level(&mut self, surface_id: &SurfaceId, level_index: i32) -> Result<()> {
        let session = self
            .sessions
            .get_mut(surface_id)
            .ok_or_else(|| anyhow!("No stream session for {}", surface_id))?;

        session.drain_events();
        if !session.has_level(level_index) {
            return Err(anyhow!(
                "Quality level {} is not available on {}",
                level_index,
                surface_id
            ));
        }

        session.decoder.set_current_level(level_index)?;
        session.active_level = level_index;
        debug!("Quality level on {} set to {}", surface_id, level_index);
        Ok(())
    }
}

impl Drop for StreamAttachment {
    fn drop(&mut self) {
        self.clear();
    }
}
