use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::PlaybackConfig;
use crate::player::{
    CapabilityMode, ControlLayerFactory, PlaybackController, PlaybackHandle, PlayerConfig,
    SharedAttachment, SharedSurface, VolumePreset, lock_attachment,
};

struct PreviewSession {
    surface: SharedSurface,
    player: Option<PlaybackHandle>,
}

/// Trailer preview on the browse page that stops by itself.
///
/// The hero banner plays it silently, the detail dialog quietly with sound.
pub struct AmbientPreview {
    attachment: SharedAttachment,
    layers: Arc<dyn ControlLayerFactory>,
    config: PlaybackConfig,
    active: Option<PreviewSession>,
}

impl AmbientPreview {
    pub fn new(
        attachment: SharedAttachment,
        layers: Arc<dyn ControlLayerFactory>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            attachment,
            layers,
            config,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn player(&self) -> Option<&PlaybackHandle> {
        self.active.as_ref().and_then(|s| s.player.as_ref())
    }

    /// Play `source_url` on `surface` at `preset`, replacing any running preview
    pub async fn start(
        &mut self,
        surface: SharedSurface,
        source_url: &str,
        preset: VolumePreset,
    ) -> CapabilityMode {
        self.stop().await;

        let (_, muted) = preset.levels();
        let mode = lock_attachment(&self.attachment).attach(&surface, source_url, muted);
        if mode == CapabilityMode::Unavailable {
            debug!("Preview on {} has nothing to play", surface.id());
            self.active = Some(PreviewSession {
                surface,
                player: None,
            });
            return mode;
        }

        let player = match PlaybackController::initialize(
            self.layers.as_ref(),
            surface.clone(),
            &PlayerConfig::ambient_preview(),
        ) {
            Ok(player) => Some(player),
            Err(e) => {
                warn!("Preview runs without a control layer: {:#}", e);
                None
            }
        };

        if let Some(player) = &player {
            let cutoff = self.config.preview_cutoff().as_secs_f64();
            let configured = async {
                player.set_volume_and_mute(preset).await?;
                player.pause_at(cutoff).await
            };
            if let Err(e) = configured.await {
                warn!("Failed to configure preview playback: {:#}", e);
            }
        }

        self.active = Some(PreviewSession { surface, player });
        mode
    }

    /// Flip the hero's mute state (the mute button on the browse page)
    pub fn toggle_mute(&self) -> Option<bool> {
        let session = self.active.as_ref()?;
        let muted = !session.surface.is_muted();
        session.surface.set_muted(muted);
        Some(muted)
    }

    /// Dispose the player and release the stream. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };
        debug!("Stopping preview on {}", session.surface.id());
        if let Some(player) = session.player {
            if let Err(e) = player.dispose().await {
                debug!("Ignoring dispose error: {:#}", e);
            }
        }
        lock_attachment(&self.attachment).detach(&session.surface.id());
    }
}
