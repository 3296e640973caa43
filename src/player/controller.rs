use anyhow::{Context, Result, anyhow};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::traits::{ControlLayer, ControlLayerFactory, SharedSurface};
use super::types::{
    LayerEvent, PlayerConfig, PlayerEvent, PlayerEventKind, UserActivity, VolumePreset,
};
use crate::models::PlaybackClock;

const EVENT_CHANNEL_CAPACITY: usize = 64;

type EventSender = Arc<Mutex<Option<broadcast::Sender<PlayerEvent>>>>;

/// Commands that can be sent to the playback controller
#[derive(Debug)]
pub enum PlayerCommand {
    /// Seek once the layer is ready (immediately if it already is)
    SeedPosition {
        seconds: f64,
        respond_to: oneshot::Sender<()>,
    },
    SetVolumeAndMute {
        preset: VolumePreset,
        respond_to: oneshot::Sender<()>,
    },
    /// Pause the first time playback reaches `cutoff` seconds
    PauseAt {
        cutoff: f64,
        respond_to: oneshot::Sender<()>,
    },
    GetClock {
        respond_to: oneshot::Sender<Option<PlaybackClock>>,
    },
    IsReady {
        respond_to: oneshot::Sender<bool>,
    },
    IsFullscreen {
        respond_to: oneshot::Sender<bool>,
    },
    Dispose {
        respond_to: oneshot::Sender<()>,
    },
}

/// Owns one control layer and processes commands and layer events in order
pub struct PlaybackController {
    layer: Box<dyn ControlLayer>,
    receiver: mpsc::UnboundedReceiver<PlayerCommand>,
    layer_events: mpsc::UnboundedReceiver<LayerEvent>,
    events: EventSender,
    ready: bool,
    pending_seed: Option<f64>,
    cutoff: Option<f64>,
    disposed: bool,
}

impl PlaybackController {
    /// Wrap a surface in a control layer and spawn its controller loop.
    ///
    /// Must be called inside a tokio runtime.
    pub fn initialize(
        factory: &dyn ControlLayerFactory,
        surface: SharedSurface,
        config: &PlayerConfig,
    ) -> Result<PlaybackHandle> {
        let surface_id = surface.id();
        let (layer, layer_events) = factory
            .create(surface, config)
            .context("Failed to create control layer")?;
        let (handle, controller) = Self::new(layer, layer_events);

        tokio::spawn(controller.run());
        info!("Playback controller started for {}", surface_id);
        Ok(handle)
    }

    pub fn new(
        layer: Box<dyn ControlLayer>,
        layer_events: mpsc::UnboundedReceiver<LayerEvent>,
    ) -> (PlaybackHandle, PlaybackController) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let events: EventSender = Arc::new(Mutex::new(Some(event_tx)));

        let controller = PlaybackController {
            layer,
            receiver,
            layer_events,
            events: events.clone(),
            ready: false,
            pending_seed: None,
            cutoff: None,
            disposed: false,
        };
        let handle = PlaybackHandle {
            sender,
            events,
            disposed: Arc::new(AtomicBool::new(false)),
        };

        (handle, controller)
    }

    fn publish(&self, event: PlayerEvent) {
        let guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            // No receivers is fine
            let _ = sender.send(event);
        }
    }

    fn seed(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if self.ready {
            trace!("Seeding position to {}s", seconds);
            self.layer.set_current_time(seconds);
        } else {
            trace!("Deferring seed to {}s until the layer is ready", seconds);
            self.pending_seed = Some(seconds);
        }
    }

    fn apply_volume(&mut self, preset: VolumePreset) {
        let (volume, muted) = preset.levels();
        debug!("Applying volume {} (muted: {})", volume, muted);
        self.layer.set_muted(muted);
        self.layer.set_volume(volume);
    }

    fn check_cutoff(&mut self, current_time: f64) {
        let Some(cutoff) = self.cutoff else {
            return;
        };
        if current_time >= cutoff {
            debug!("Pausing at cut-off {}s (position {}s)", cutoff, current_time);
            self.cutoff = None;
            self.layer.pause();
            self.publish(PlayerEvent::PausedAtCutoff {
                position: current_time,
            });
        }
    }

    fn handle_layer_event(&mut self, event: LayerEvent) {
        match &event {
            LayerEvent::Ready => {
                self.ready = true;
                if let Some(seconds) = self.pending_seed.take() {
                    trace!("Layer ready, applying seed of {}s", seconds);
                    self.layer.set_current_time(seconds);
                }
            }
            LayerEvent::TimeUpdate { current_time } => self.check_cutoff(*current_time),
            LayerEvent::FullscreenChange { fullscreen } => {
                trace!("Fullscreen changed: {}", fullscreen);
            }
            LayerEvent::UserActive | LayerEvent::UserInactive => {}
        }
        self.publish(event.into());
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        debug!("Disposing control layer");
        self.layer.dispose();
        self.publish(PlayerEvent::Disposed);
        // Dropping the sender ends every subscriber
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Run the controller event loop until disposed or every handle is dropped
    pub async fn run(mut self) {
        debug!("PlaybackController event loop started");
        let mut layer_open = true;

        loop {
            tokio::select! {
                // Layer events first so commands observe every event emitted before them
                biased;

                event = self.layer_events.recv(), if layer_open => {
                    match event {
                        Some(event) => self.handle_layer_event(event),
                        None => {
                            warn!("Control layer event stream closed");
                            layer_open = false;
                        }
                    }
                }
                command = self.receiver.recv() => {
                    let Some(command) = command else {
                        debug!("All playback handles dropped");
                        break;
                    };
                    match command {
                        PlayerCommand::SeedPosition { seconds, respond_to } => {
                            self.seed(seconds);
                            let _ = respond_to.send(());
                        }
                        PlayerCommand::SetVolumeAndMute { preset, respond_to } => {
                            self.apply_volume(preset);
                            let _ = respond_to.send(());
                        }
                        PlayerCommand::PauseAt { cutoff, respond_to } => {
                            self.cutoff = Some(cutoff);
                            let position = self.layer.current_time();
                            self.check_cutoff(position);
                            let _ = respond_to.send(());
                        }
                        PlayerCommand::GetClock { respond_to } => {
                            let clock =
                                PlaybackClock::new(self.layer.current_time(), self.layer.duration());
                            let _ = respond_to.send(clock);
                        }
                        PlayerCommand::IsReady { respond_to } => {
                            let _ = respond_to.send(self.ready);
                        }
                        PlayerCommand::IsFullscreen { respond_to } => {
                            let _ = respond_to.send(self.layer.is_fullscreen());
                        }
                        PlayerCommand::Dispose { respond_to } => {
                            self.dispose();
                            let _ = respond_to.send(());
                            break;
                        }
                    }
                }
            }
        }

        self.dispose();
        debug!("PlaybackController event loop terminated");
    }
}

/// Selects which player events a subscriber sees
#[derive(Debug, Clone, Default)]
pub struct PlayerEventFilter {
    kinds: Option<Vec<PlayerEventKind>>,
}

impl PlayerEventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: Vec<PlayerEventKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn matches(&self, event: &PlayerEvent) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind()),
            None => true,
        }
    }
}

/// Receiving end of a playback handle's event stream
pub struct PlayerEventSubscriber {
    receiver: broadcast::Receiver<PlayerEvent>,
    filter: Option<PlayerEventFilter>,
}

impl PlayerEventSubscriber {
    /// Next matching event, or `None` once the controller has been disposed
    pub async fn recv(&mut self) -> Option<PlayerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Player event subscriber lagged by {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive without blocking
    pub fn try_recv(&mut self) -> Option<PlayerEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Handle to send commands to the playback controller
#[derive(Clone)]
pub struct PlaybackHandle {
    sender: mpsc::UnboundedSender<PlayerCommand>,
    events: EventSender,
    disposed: Arc<AtomicBool>,
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("sender", &"<UnboundedSender>")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .map_err(|_| anyhow!("Playback controller disconnected"))?;
        response
            .await
            .map_err(|_| anyhow!("Failed to receive response from playback controller"))
    }

    /// Set the start position. Takes effect when the layer reports ready.
    pub async fn seed_position(&self, seconds: f64) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SeedPosition {
            seconds,
            respond_to,
        })
        .await
    }

    pub async fn set_volume_and_mute(&self, preset: VolumePreset) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SetVolumeAndMute { preset, respond_to })
            .await
    }

    pub async fn pause_at(&self, cutoff: f64) -> Result<()> {
        self.request(|respond_to| PlayerCommand::PauseAt { cutoff, respond_to })
            .await
    }

    /// `None` until the layer knows the media duration
    pub async fn clock(&self) -> Result<Option<PlaybackClock>> {
        self.request(|respond_to| PlayerCommand::GetClock { respond_to })
            .await
    }

    pub async fn is_ready(&self) -> Result<bool> {
        self.request(|respond_to| PlayerCommand::IsReady { respond_to })
            .await
    }

    pub async fn is_fullscreen(&self) -> Result<bool> {
        self.request(|respond_to| PlayerCommand::IsFullscreen { respond_to })
            .await
    }

    pub fn subscribe(&self, filter: Option<PlayerEventFilter>) -> Result<PlayerEventSubscriber> {
        let guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Playback controller already disposed"))?;
        Ok(PlayerEventSubscriber {
            receiver: sender.subscribe(),
            filter,
        })
    }

    /// Invoke `callback` on every fullscreen transition until disposal
    pub fn on_fullscreen_change<F>(&self, callback: F) -> Result<JoinHandle<()>>
    where
        F: Fn(bool) + Send + 'static,
    {
        let mut subscriber = self.subscribe(Some(
            PlayerEventFilter::new().with_kinds(vec![PlayerEventKind::Fullscreen]),
        ))?;
        Ok(tokio::spawn(async move {
            while let Some(event) = subscriber.recv().await {
                if let PlayerEvent::FullscreenChanged { fullscreen } = event {
                    callback(fullscreen);
                }
            }
        }))
    }

    /// Invoke `callback` on every active/inactive transition until disposal
    pub fn on_activity_change<F>(&self, callback: F) -> Result<JoinHandle<()>>
    where
        F: Fn(UserActivity) + Send + 'static,
    {
        let mut subscriber = self.subscribe(Some(
            PlayerEventFilter::new().with_kinds(vec![PlayerEventKind::Activity]),
        ))?;
        Ok(tokio::spawn(async move {
            while let Some(event) = subscriber.recv().await {
                if let PlayerEvent::ActivityChanged(activity) = event {
                    callback(activity);
                }
            }
        }))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Tear down the control layer. Only the first call on any clone does work.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            trace!("Playback handle already disposed");
            return Ok(());
        }
        match self
            .request(|respond_to| PlayerCommand::Dispose { respond_to })
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                // Controller loop already gone, layer was disposed on exit
                debug!("Dispose after controller exit: {}", e);
                Ok(())
            }
        }
    }
}
