#![cfg(test)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc};

use crate::api::{ApiError, ProgressApi};
use crate::models::{Movie, MovieSlug, ProgressRecord, ResumeRecord, SurfaceId};
use crate::player::{
    AdaptiveDecoder, ControlLayer, ControlLayerFactory, DecoderEvent, DecoderFactory, LayerEvent,
    PlayerConfig, SharedSurface, SurfaceKind, VideoSurface,
};
use crate::watch::SurfaceHost;

struct SurfaceState {
    mounted: bool,
    muted: bool,
    can_play: String,
    src: Option<String>,
    current_time: f64,
    duration: Option<f64>,
}

/// In-memory video element
pub struct FakeSurface {
    id: SurfaceId,
    state: Mutex<SurfaceState>,
}

impl FakeSurface {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: SurfaceId::new(id),
            state: Mutex::new(SurfaceState {
                mounted: true,
                muted: false,
                can_play: String::new(),
                src: None,
                current_time: 0.0,
                duration: None,
            }),
        })
    }

    pub fn shared(id: &str) -> SharedSurface {
        Self::new(id)
    }

    pub fn set_can_play(&self, answer: &str) {
        self.state.lock().unwrap().can_play = answer.to_string();
    }

    pub fn unmount(&self) {
        self.state.lock().unwrap().mounted = false;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn set_time(&self, seconds: f64) {
        self.state.lock().unwrap().current_time = seconds;
    }
}

impl VideoSurface for FakeSurface {
    fn id(&self) -> SurfaceId {
        self.id.clone()
    }

    fn is_mounted(&self) -> bool {
        self.state.lock().unwrap().mounted
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    fn can_play_type(&self, _mime_type: &str) -> String {
        self.state.lock().unwrap().can_play.clone()
    }

    fn set_src(&self, url: &str) {
        self.state.lock().unwrap().src = Some(url.to_string());
    }

    fn src(&self) -> Option<String> {
        self.state.lock().unwrap().src.clone()
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().unwrap().current_time = seconds;
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().unwrap().duration
    }
}

#[derive(Default)]
struct DecoderState {
    log: Vec<String>,
    created: usize,
    live: HashSet<usize>,
    destroys: HashMap<usize, usize>,
    senders: HashMap<usize, mpsc::UnboundedSender<DecoderEvent>>,
    fail_next_create: bool,
    fail_next_load: bool,
    fail_destroy: bool,
}

/// Decoder factory that numbers its decoders from 1 and logs every call
pub struct FakeDecoderFactory {
    supported: bool,
    state: Arc<Mutex<DecoderState>>,
}

impl FakeDecoderFactory {
    pub fn supported() -> Self {
        Self {
            supported: true,
            state: Arc::default(),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            state: Arc::default(),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn live_decoders(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn destroy_count(&self, decoder: usize) -> usize {
        self.state
            .lock()
            .unwrap()
            .destroys
            .get(&decoder)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_next_create(&self) {
        self.state.lock().unwrap().fail_next_create = true;
    }

    pub fn fail_next_load(&self) {
        self.state.lock().unwrap().fail_next_load = true;
    }

    pub fn fail_destroy(&self) {
        self.state.lock().unwrap().fail_destroy = true;
    }

    pub fn emit(&self, decoder: usize, event: DecoderEvent) {
        let state = self.state.lock().unwrap();
        state.senders[&decoder].send(event).unwrap();
    }
}

impl DecoderFactory for FakeDecoderFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self) -> Result<(Box<dyn AdaptiveDecoder>, mpsc::UnboundedReceiver<DecoderEvent>)> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_create {
            state.fail_next_create = false;
            return Err(anyhow!("decoder construction failed"));
        }
        state.created += 1;
        let number = state.created;
        state.log.push(format!("create#{}", number));
        state.live.insert(number);

        let (tx, rx) = mpsc::unbounded_channel();
        state.senders.insert(number, tx);

        let decoder = FakeDecoder {
            number,
            state: self.state.clone(),
        };
        Ok((Box::new(decoder), rx))
    }
}

struct FakeDecoder {
    number: usize,
    state: Arc<Mutex<DecoderState>>,
}

impl AdaptiveDecoder for FakeDecoder {
    fn load_source(&mut self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_load {
            state.fail_next_load = false;
            return Err(anyhow!("manifest unreachable"));
        }
        state.log.push(format!("load#{} {}", self.number, url));
        Ok(())
    }

    fn attach_media(&mut self, surface: &SharedSurface) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .log
            .push(format!("attach#{} {}", self.number, surface.id()));
        Ok(())
    }

    fn set_current_level(&mut self, level_index: i32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .log
            .push(format!("level#{} {}", self.number, level_index));
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("destroy#{}", self.number));
        state.live.remove(&self.number);
        *state.destroys.entry(self.number).or_insert(0) += 1;
        if state.fail_destroy {
            return Err(anyhow!("destroy failed"));
        }
        Ok(())
    }
}

struct LayerState {
    log: Vec<String>,
    config: Option<PlayerConfig>,
    sender: Option<mpsc::UnboundedSender<LayerEvent>>,
    surface: Option<SharedSurface>,
    current_time: f64,
    duration: Option<f64>,
    volume: f64,
    muted: bool,
    paused: bool,
    fullscreen: bool,
    disposed: usize,
    fail_next_create: bool,
}

/// Control layer factory. Events go to, and accessors read, the latest layer.
pub struct FakeLayerFactory {
    state: Arc<Mutex<LayerState>>,
}

impl FakeLayerFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LayerState {
                log: Vec::new(),
                config: None,
                sender: None,
                surface: None,
                current_time: 0.0,
                duration: None,
                volume: 1.0,
                muted: false,
                paused: false,
                fullscreen: false,
                disposed: 0,
                fail_next_create: false,
            })),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn last_config(&self) -> Option<PlayerConfig> {
        self.state.lock().unwrap().config.clone()
    }

    pub fn fail_next_create(&self) {
        self.state.lock().unwrap().fail_next_create = true;
    }

    pub fn emit(&self, event: LayerEvent) {
        let state = self.state.lock().unwrap();
        state.sender.as_ref().unwrap().send(event).unwrap();
    }

    pub fn layer_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    pub fn set_layer_time(&self, seconds: f64) {
        self.state.lock().unwrap().current_time = seconds;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().unwrap().volume
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn dispose_count(&self) -> usize {
        self.state.lock().unwrap().disposed
    }
}

impl ControlLayerFactory for FakeLayerFactory {
    fn create(
        &self,
        surface: SharedSurface,
        config: &PlayerConfig,
    ) -> Result<(Box<dyn ControlLayer>, mpsc::UnboundedReceiver<LayerEvent>)> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_create {
            state.fail_next_create = false;
            return Err(anyhow!("control layer failed to mount"));
        }
        state.log.push(format!("create {}", surface.id()));
        state.config = Some(config.clone());
        state.muted = config.muted_at_start;
        state.paused = false;
        state.current_time = 0.0;
        state.surface = Some(surface);

        let (tx, rx) = mpsc::unbounded_channel();
        state.sender = Some(tx);

        Ok((
            Box::new(FakeLayer {
                state: self.state.clone(),
            }),
            rx,
        ))
    }
}

struct FakeLayer {
    state: Arc<Mutex<LayerState>>,
}

impl ControlLayer for FakeLayer {
    fn set_current_time(&mut self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("seek {}", seconds));
        state.current_time = seconds;
        if let Some(surface) = &state.surface {
            surface.set_current_time(seconds);
        }
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().unwrap().duration
    }

    fn set_volume(&mut self, volume: f64) {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("volume {}", volume));
        state.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("muted {}", muted));
        state.muted = muted;
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.push("pause".to_string());
        state.paused = true;
    }

    fn is_fullscreen(&self) -> bool {
        self.state.lock().unwrap().fullscreen
    }

    fn dispose(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.push("dispose".to_string());
        state.disposed += 1;
    }
}

#[derive(Default)]
struct ApiState {
    fetches: usize,
    started: usize,
    updates: Vec<(MovieSlug, ProgressRecord)>,
}

/// Backend double. PATCHes can be held until released to observe fire-and-forget saves.
pub struct FakeProgressApi {
    record: Option<ResumeRecord>,
    gate: Option<Arc<Semaphore>>,
    fail_updates: bool,
    state: Mutex<ApiState>,
}

pub fn resume_record(slug: &str, hls_url: &str, progress_seconds: f64) -> ResumeRecord {
    ResumeRecord {
        movie: Movie {
            id: Some(1),
            title: "Big Buck Bunny".to_string(),
            slug: MovieSlug::new(slug),
            hls_url: hls_url.to_string(),
            description: None,
            genre: None,
            thumbnail_url: None,
        },
        progress_seconds,
    }
}

impl FakeProgressApi {
    pub fn with_record(slug: &str, hls_url: &str, progress_seconds: f64) -> Self {
        Self {
            record: Some(resume_record(slug, hls_url, progress_seconds)),
            gate: None,
            fail_updates: false,
            state: Mutex::default(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            record: None,
            gate: None,
            fail_updates: false,
            state: Mutex::default(),
        }
    }

    pub fn blocked(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn release_updates(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    /// PATCHes issued, finished or not
    pub fn started(&self) -> usize {
        self.state.lock().unwrap().started
    }

    /// PATCHes that completed
    pub fn updates(&self) -> Vec<(MovieSlug, ProgressRecord)> {
        self.state.lock().unwrap().updates.clone()
    }
}

#[async_trait]
impl ProgressApi for FakeProgressApi {
    async fn fetch_progress(&self, slug: &MovieSlug) -> Result<ResumeRecord, ApiError> {
        self.state.lock().unwrap().fetches += 1;
        match &self.record {
            Some(record) if record.movie.slug == *slug => Ok(record.clone()),
            _ => Err(ApiError::NotFound(slug.to_string())),
        }
    }

    async fn update_progress(
        &self,
        slug: &MovieSlug,
        record: ProgressRecord,
    ) -> Result<(), ApiError> {
        self.state.lock().unwrap().started += 1;
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }
        if self.fail_updates {
            return Err(ApiError::Server {
                status: 500,
                message: "boom".to_string(),
            });
        }
        self.state
            .lock()
            .unwrap()
            .updates
            .push((slug.clone(), record));
        Ok(())
    }
}

/// Surface host that hands out one prepared surface
pub struct FakeSurfaceHost {
    surface: Option<SharedSurface>,
    requested: Mutex<Vec<SurfaceKind>>,
}

impl FakeSurfaceHost {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            surface: Some(surface),
            requested: Mutex::default(),
        }
    }

    /// Host whose surface never mounts
    pub fn never_ready() -> Self {
        Self {
            surface: None,
            requested: Mutex::default(),
        }
    }

    pub fn requested(&self) -> Vec<SurfaceKind> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SurfaceHost for FakeSurfaceHost {
    async fn surface_ready(&self, kind: SurfaceKind) -> Result<SharedSurface> {
        self.requested.lock().unwrap().push(kind);
        match &self.surface {
            Some(surface) => Ok(surface.clone()),
            None => std::future::pending().await,
        }
    }
}
