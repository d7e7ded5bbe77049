//! Studio task — owns every piece of studio state.
//!
//! One tokio task multiplexes control requests, render ticks, capture ticks
//! and capture completions. Callers talk to it through a cloneable
//! [`StudioHandle`]; landmarks bypass the task and land in a `watch` channel.

use crate::backend::CaptureBackend;
use crate::config::Config;
use crate::render_loop::{RenderLoop, RenderState};
use crate::scheduler::{
    CaptureCounters, CaptureMessage, CaptureScheduler, SchedulerState, TriggerOutcome,
};
use facepaint_core::{
    presets, CaptureResult, Category, LandmarkSet, LayerSettings, Preset, SettingsError,
    SettingsIntent,
};
use facepaint_hw::{
    CameraBackend, CameraError, CameraErrorKind, CameraSession, DeviceInfo, PermissionState,
    SessionState,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
    #[error("nothing rendered yet")]
    NoComposite,
    #[error("failed to save composite: {0}")]
    Save(#[from] image::ImageError),
    #[error("studio task exited")]
    ChannelClosed,
}

/// Notifications for anyone watching the studio.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum StudioEvent {
    CaptureSucceeded { result: CaptureResult },
    CaptureFailed { error: String },
    CameraFailed { kind: CameraErrorKind, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub state: SessionState,
    pub permission: PermissionState,
    pub device: Option<DeviceInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatus {
    pub state: RenderState,
    pub rendered: u64,
    pub skipped: u64,
    pub last_sequence: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub state: SchedulerState,
    pub mode: crate::config::CaptureMode,
    pub auto_capture: bool,
    pub auto_apply: bool,
    #[serde(flatten)]
    pub counters: CaptureCounters,
    pub last_captured_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Snapshot of the whole studio.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioStatus {
    pub version: &'static str,
    pub camera: CameraStatus,
    pub render: RenderStatus,
    pub capture: CaptureStatus,
    pub landmarks: bool,
    pub enabled: Vec<Category>,
    pub look: Option<String>,
}

type Reply<T> = oneshot::Sender<Result<T, StudioError>>;

/// Messages sent from callers to the studio task.
enum StudioRequest {
    StartCamera {
        device: Option<String>,
        reply: Reply<CameraStatus>,
    },
    StopCamera {
        reply: oneshot::Sender<()>,
    },
    Settings {
        intent: SettingsIntent,
        reply: Reply<LayerSettings>,
    },
    CaptureNow {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<StudioStatus>,
    },
    GetSettings {
        reply: oneshot::Sender<LayerSettings>,
    },
    LastResult {
        reply: oneshot::Sender<Option<CaptureResult>>,
    },
    SaveComposite {
        path: PathBuf,
        reply: Reply<()>,
    },
}

/// Clone-safe handle to the studio task.
#[derive(Clone)]
pub struct StudioHandle {
    tx: mpsc::Sender<StudioRequest>,
    landmarks: Arc<watch::Sender<Option<Arc<LandmarkSet>>>>,
    events: broadcast::Sender<StudioEvent>,
}

impl StudioHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StudioRequest) -> Result<T, StudioError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StudioError::ChannelClosed)?;
        reply_rx.await.map_err(|_| StudioError::ChannelClosed)
    }

    /// Open the camera and start rendering. No-op while already active.
    pub async fn start_camera(&self, device: Option<String>) -> Result<CameraStatus, StudioError> {
        self.request(|reply| StudioRequest::StartCamera { device, reply }).await?
    }

    /// Stop rendering and release the camera. In-flight captures are discarded.
    pub async fn stop_camera(&self) -> Result<(), StudioError> {
        self.request(|reply| StudioRequest::StopCamera { reply }).await
    }

    pub async fn dispatch(&self, intent: SettingsIntent) -> Result<LayerSettings, StudioError> {
        self.request(|reply| StudioRequest::Settings { intent, reply }).await?
    }

    /// Apply a built-in preset by name.
    pub async fn apply_preset(&self, name: &str) -> Result<LayerSettings, StudioError> {
        let preset = presets::builtin(name).ok_or_else(|| StudioError::UnknownPreset(name.to_string()))?;
        self.dispatch(SettingsIntent::ApplyPreset(preset)).await
    }

    pub async fn apply_custom_preset(&self, preset: Preset) -> Result<LayerSettings, StudioError> {
        self.dispatch(SettingsIntent::ApplyPreset(preset)).await
    }

    /// Manual capture. Returns false when dropped (busy, inactive or no frame).
    pub async fn capture_now(&self) -> Result<bool, StudioError> {
        self.request(|reply| StudioRequest::CaptureNow { reply }).await
    }

    pub async fn status(&self) -> Result<StudioStatus, StudioError> {
        self.request(|reply| StudioRequest::Status { reply }).await
    }

    pub async fn settings(&self) -> Result<LayerSettings, StudioError> {
        self.request(|reply| StudioRequest::GetSettings { reply }).await
    }

    pub async fn last_result(&self) -> Result<Option<CaptureResult>, StudioError> {
        self.request(|reply| StudioRequest::LastResult { reply }).await
    }

    /// Write the most recent composite to `path` (format from the extension).
    pub async fn save_composite(&self, path: PathBuf) -> Result<(), StudioError> {
        self.request(|reply| StudioRequest::SaveComposite { path, reply }).await?
    }

    /// Replace the current landmark set. An empty set clears it.
    pub fn submit_landmarks(&self, landmarks: LandmarkSet) {
        let latest = (!landmarks.is_empty()).then(|| Arc::new(landmarks));
        self.landmarks.send_replace(latest);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }
}

struct Studio {
    config: Config,
    settings: LayerSettings,
    look: Option<String>,
    camera: CameraSession,
    frames: watch::Receiver<facepaint_hw::LatestFrame>,
    landmarks: watch::Receiver<Option<Arc<LandmarkSet>>>,
    render: RenderLoop,
    scheduler: CaptureScheduler,
    /// Bumped on every camera start and stop.
    generation: u64,
    last_result: Option<CaptureResult>,
    events: broadcast::Sender<StudioEvent>,
}

/// Spawn the studio task on the current tokio runtime.
pub fn spawn_studio(
    config: Config,
    camera_backend: Arc<dyn CameraBackend>,
    capture_backend: Arc<dyn CaptureBackend>,
) -> StudioHandle {
    let (tx, rx) = mpsc::channel(16);
    let (events, _) = broadcast::channel(32);
    let (landmarks_tx, landmarks_rx) = watch::channel(None);
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let camera = CameraSession::new(camera_backend);
    let studio = Studio {
        frames: camera.subscribe(),
        render: RenderLoop::new(camera.active_flag()),
        scheduler: CaptureScheduler::new(&config, capture_backend, done_tx),
        camera,
        config,
        settings: LayerSettings::default(),
        look: None,
        landmarks: landmarks_rx,
        generation: 0,
        last_result: None,
        events: events.clone(),
    };

    tokio::spawn(run_studio(studio, rx, done_rx));

    StudioHandle {
        tx,
        landmarks: Arc::new(landmarks_tx),
        events,
    }
}

async fn run_studio(
    mut studio: Studio,
    mut rx: mpsc::Receiver<StudioRequest>,
    mut done_rx: mpsc::UnboundedReceiver<CaptureMessage>,
) {
    let render_period = studio.config.render_interval();
    let capture_period = studio.config.capture_interval();
    let mut render_tick = tokio::time::interval(render_period);
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut capture_tick =
        tokio::time::interval_at(tokio::time::Instant::now() + capture_period, capture_period);
    capture_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        render_ms = render_period.as_millis() as u64,
        capture_ms = capture_period.as_millis() as u64,
        mode = ?studio.config.capture_mode,
        "studio task started"
    );

    loop {
        tokio::select! {
            req = rx.recv() => match req {
                Some(req) => studio.handle(req),
                None => break,
            },
            _ = render_tick.tick() => studio.on_render_tick(),
            _ = capture_tick.tick() => studio.on_capture_tick(),
            Some(done) = done_rx.recv() => studio.on_capture_done(done),
        }
    }

    studio.camera.stop();
    tracing::info!("studio task exiting");
}

impl Studio {
    fn handle(&mut self, req: StudioRequest) {
        match req {
            StudioRequest::StartCamera { device, reply } => {
                let _ = reply.send(self.start_camera(device.as_deref()));
            }
            StudioRequest::StopCamera { reply } => {
                self.stop_camera();
                let _ = reply.send(());
            }
            StudioRequest::Settings { intent, reply } => {
                let _ = reply.send(self.apply_intent(intent));
            }
            StudioRequest::CaptureNow { reply } => {
                let _ = reply.send(self.capture(false));
            }
            StudioRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            StudioRequest::GetSettings { reply } => {
                let _ = reply.send(self.settings);
            }
            StudioRequest::LastResult { reply } => {
                let _ = reply.send(self.last_result.clone());
            }
            StudioRequest::SaveComposite { path, reply } => {
                let _ = reply.send(self.save_composite(&path));
            }
        }
    }

    fn start_camera(&mut self, device: Option<&str>) -> Result<CameraStatus, StudioError> {
        if self.camera.is_active() {
            return Ok(self.camera_status());
        }
        let preferred = device.or(self.config.camera_device.as_deref());
        if let Err(e) = self.camera.start(preferred) {
            self.emit(StudioEvent::CameraFailed {
                kind: e.kind(),
                message: e.to_string(),
            });
            return Err(e.into());
        }
        self.generation += 1;
        // The session is active, so this cannot fail.
        let _ = self.render.start();
        Ok(self.camera_status())
    }

    fn stop_camera(&mut self) {
        self.render.stop();
        self.camera.stop();
        self.generation += 1;
    }

    fn apply_intent(&mut self, intent: SettingsIntent) -> Result<LayerSettings, StudioError> {
        let preset_name = match &intent {
            SettingsIntent::ApplyPreset(p) if !p.name.is_empty() => Some(p.name.clone()),
            _ => None,
        };
        self.settings.dispatch(intent)?;
        if preset_name.is_some() {
            self.look = preset_name;
        }

        if self.config.auto_apply
            && self.camera.is_active()
            && self.scheduler.auto_apply_due(Instant::now())
        {
            self.capture(true);
        }
        Ok(self.settings)
    }

    /// Snapshot the latest frame and submit it. False when dropped.
    fn capture(&mut self, automatic: bool) -> bool {
        if !self.camera.is_active() {
            tracing::debug!("camera inactive; capture skipped");
            return false;
        }
        let frame = self.frames.borrow().clone();
        let outcome = self
            .scheduler
            .trigger(frame, &self.settings, self.look.as_deref(), self.generation);
        if automatic {
            tracing::debug!(?outcome, "auto-applied capture");
        }
        outcome == TriggerOutcome::Submitted
    }

    fn on_render_tick(&mut self) {
        if let Some(fault) = self.camera.check_health() {
            self.render.stop();
            self.generation += 1;
            self.emit(StudioEvent::CameraFailed {
                kind: fault.kind(),
                message: fault.to_string(),
            });
            return;
        }
        let frame = self.frames.borrow().clone();
        let landmarks = self.landmarks.borrow().clone();
        self.render
            .tick(frame.as_deref(), landmarks.as_deref(), &self.settings);
    }

    fn on_capture_tick(&mut self) {
        if self.config.auto_capture && self.camera.is_active() {
            self.capture(false);
        }
    }

    fn on_capture_done(&mut self, done: CaptureMessage) {
        match self.scheduler.complete(done, self.generation) {
            Some(Ok(result)) => {
                tracing::info!(sequence = result.frame_sequence, "capture succeeded");
                self.last_result = Some(result.clone());
                self.emit(StudioEvent::CaptureSucceeded { result });
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "capture failed");
                self.emit(StudioEvent::CaptureFailed { error: e.to_string() });
            }
            None => {}
        }
    }

    fn save_composite(&self, path: &std::path::Path) -> Result<(), StudioError> {
        let surface = self.render.surface();
        if surface.width() == 0 || surface.height() == 0 {
            return Err(StudioError::NoComposite);
        }
        surface.save(path)?;
        tracing::info!(path = %path.display(), "composite saved");
        Ok(())
    }

    fn emit(&self, event: StudioEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn camera_status(&self) -> CameraStatus {
        CameraStatus {
            state: self.camera.state(),
            permission: self.camera.permission(),
            device: self.camera.device().cloned(),
        }
    }

    fn status(&self) -> StudioStatus {
        StudioStatus {
            version: env!("CARGO_PKG_VERSION"),
            camera: self.camera_status(),
            render: RenderStatus {
                state: self.render.state(),
                rendered: self.render.rendered(),
                skipped: self.render.skipped(),
                last_sequence: self.render.last_sequence(),
            },
            capture: CaptureStatus {
                state: self.scheduler.state(),
                mode: self.scheduler.mode(),
                auto_capture: self.config.auto_capture,
                auto_apply: self.config.auto_apply,
                counters: self.scheduler.counters(),
                last_captured_at: self.last_result.as_ref().map(|r| r.captured_at),
            },
            landmarks: self.landmarks.borrow().is_some(),
            enabled: self.settings.enabled().collect(),
            look: self.look.clone(),
        }
    }
}
