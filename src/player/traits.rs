//! Capability contracts for the host's media stack.
//!
//! The decoding library, the video element and the control-UI toolkit live
//! outside this crate. Hosts implement these traits over their concrete
//! types; everything else in the crate only talks to the traits.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::types::{LayerEvent, PlayerConfig};
use crate::models::{PlaybackClock, SurfaceId};

pub type SharedSurface = Arc<dyn VideoSurface>;

/// A video output element. Methods take `&self` because surfaces are handles
/// onto host-owned elements.
pub trait VideoSurface: Send + Sync {
    fn id(&self) -> SurfaceId;
    /// False once the element has been removed from the view
    fn is_mounted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    fn is_muted(&self) -> bool;
    /// Empty string means "cannot play", any other answer is a yes
    fn can_play_type(&self, mime_type: &str) -> String;
    fn set_src(&self, url: &str);
    fn src(&self) -> Option<String>;
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// `None` (or NaN) until metadata has loaded
    fn duration(&self) -> Option<f64>;

    fn clock(&self) -> Option<PlaybackClock> {
        PlaybackClock::new(self.current_time(), self.duration())
    }
}

/// One resolution tier reported by the decoder after manifest parsing
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInfo {
    pub height: u32,
    pub bitrate: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    ManifestParsed { levels: Vec<LevelInfo> },
    LevelSwitched { level_index: i32 },
    Error { fatal: bool, details: String },
}

/// A managed adaptive-stream decoder instance
pub trait AdaptiveDecoder: Send {
    fn load_source(&mut self, url: &str) -> Result<()>;
    fn attach_media(&mut self, surface: &SharedSurface) -> Result<()>;
    /// `-1` hands tier selection back to the decoder
    fn set_current_level(&mut self, level_index: i32) -> Result<()>;
    fn destroy(&mut self) -> Result<()>;
}

pub trait DecoderFactory: Send + Sync {
    fn is_supported(&self) -> bool;
    fn create(&self) -> Result<(Box<dyn AdaptiveDecoder>, mpsc::UnboundedReceiver<DecoderEvent>)>;
}

/// The control UI wrapped around a surface (controls, fullscreen, idle tracking)
pub trait ControlLayer: Send {
    fn set_current_time(&mut self, seconds: f64);
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    fn pause(&mut self);
    fn is_fullscreen(&self) -> bool;
    fn dispose(&mut self);
}

pub trait ControlLayerFactory: Send + Sync {
    fn create(
        &self,
        surface: SharedSurface,
        config: &PlayerConfig,
    ) -> Result<(Box<dyn ControlLayer>, mpsc::UnboundedReceiver<LayerEvent>)>;
}
