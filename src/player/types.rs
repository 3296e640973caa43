//! Common types used by the attachment layer and the playback controller

use crate::constants::{AMBIENT_PREVIEW_VOLUME, DETAIL_PREVIEW_VOLUME, WATCH_VOLUME};

/// Strategy chosen for a surface on each attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityMode {
    /// Managed decoder session feeding the surface
    AdaptiveDecoder,
    /// Surface plays the stream URL by itself
    NativeFallback,
    /// Nothing can play the stream; surface is left without a source
    Unavailable,
}

/// Pure decision rule: managed decoder first, then native playback, else nothing
pub fn choose_mode(decoder_supported: bool, can_play_natively: bool) -> CapabilityMode {
    if decoder_supported {
        CapabilityMode::AdaptiveDecoder
    } else if can_play_natively {
        CapabilityMode::NativeFallback
    } else {
        CapabilityMode::Unavailable
    }
}

/// Where the crate is running. Nothing is attached outside an interactive browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Browser,
    Prerender,
}

impl ExecutionContext {
    pub fn is_browser(&self) -> bool {
        matches!(self, ExecutionContext::Browser)
    }
}

/// Which markup the watch page renders for the video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Surface wrapped by the control layer and fed by a managed decoder
    Enhanced,
    /// Bare element relying on built-in HLS playback
    Native,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub controls: bool,
    pub autoplay: bool,
    pub muted_at_start: bool,
    pub responsive: bool,
    pub fluid: bool,
    pub language: String,
}

impl PlayerConfig {
    /// Dedicated watch page
    pub fn watch() -> Self {
        Self {
            controls: true,
            autoplay: true,
            muted_at_start: true,
            responsive: true,
            fluid: true,
            language: "en".to_string(),
        }
    }

    /// Browse-page background hero
    pub fn ambient_preview() -> Self {
        Self {
            controls: false,
            autoplay: true,
            muted_at_start: true,
            responsive: true,
            fluid: false,
            language: "en".to_string(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::watch()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumePreset {
    /// Resumed playback on the watch page
    Watch,
    /// Silent background preview
    AmbientPreview,
    /// Quiet trailer in the movie detail dialog
    DetailPreview,
    Custom { volume: f64, muted: bool },
}

impl VolumePreset {
    /// `(volume, muted)` with the volume clamped into `0.0..=1.0`
    pub fn levels(&self) -> (f64, bool) {
        match *self {
            VolumePreset::Watch => (WATCH_VOLUME, false),
            VolumePreset::AmbientPreview => (AMBIENT_PREVIEW_VOLUME, true),
            VolumePreset::DetailPreview => (DETAIL_PREVIEW_VOLUME, false),
            VolumePreset::Custom { volume, muted } => (volume.clamp(0.0, 1.0), muted),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserActivity {
    Active,
    Inactive,
}

/// Raw events emitted by a control layer
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    Ready,
    FullscreenChange { fullscreen: bool },
    UserActive,
    UserInactive,
    TimeUpdate { current_time: f64 },
}

/// Typed events published to observers of a playback handle
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    FullscreenChanged { fullscreen: bool },
    ActivityChanged(UserActivity),
    TimeUpdate { current_time: f64 },
    PausedAtCutoff { position: f64 },
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventKind {
    Ready,
    Fullscreen,
    Activity,
    TimeUpdate,
    PausedAtCutoff,
    Disposed,
}

impl PlayerEvent {
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            PlayerEvent::Ready => PlayerEventKind::Ready,
            PlayerEvent::FullscreenChanged { .. } => PlayerEventKind::Fullscreen,
            PlayerEvent::ActivityChanged(_) => PlayerEventKind::Activity,
            PlayerEvent::TimeUpdate { .. } => PlayerEventKind::TimeUpdate,
            PlayerEvent::PausedAtCutoff { .. } => PlayerEventKind::PausedAtCutoff,
            PlayerEvent::Disposed => PlayerEventKind::Disposed,
        }
    }
}

impl From<LayerEvent> for PlayerEvent {
    fn from(event: LayerEvent) -> Self {
        match event {
            LayerEvent::Ready => PlayerEvent::Ready,
            LayerEvent::FullscreenChange { fullscreen } => {
                PlayerEvent::FullscreenChanged { fullscreen }
            }
            LayerEvent::UserActive => PlayerEvent::ActivityChanged(UserActivity::Active),
            LayerEvent::UserInactive => PlayerEvent::ActivityChanged(UserActivity::Inactive),
            LayerEvent::TimeUpdate { current_time } => PlayerEvent::TimeUpdate { current_time },
        }
    }
}
