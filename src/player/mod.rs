pub mod attachment;
pub mod controller;
pub mod traits;
pub mod types;

pub use attachment::{SharedAttachment, StreamAttachment, StreamSession, lock_attachment};
pub use controller::{
    PlaybackController, PlaybackHandle, PlayerCommand, PlayerEventFilter, PlayerEventSubscriber,
};
pub use traits::{
    AdaptiveDecoder, ControlLayer, ControlLayerFactory, DecoderEvent, DecoderFactory, LevelInfo,
    SharedSurface, VideoSurface,
};
pub use types::{
    CapabilityMode, ExecutionContext, LayerEvent, PlayerConfig, PlayerEvent, PlayerEventKind,
    SurfaceKind, UserActivity, VolumePreset, choose_mode,
};
