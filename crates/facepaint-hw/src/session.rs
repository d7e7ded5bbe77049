//! Camera session lifecycle — device selection, capture thread, release.
//!
//! The session owns the capture thread. The thread publishes the latest frame
//! into a `watch` channel and exits as soon as the shared active flag clears.
//! Readers never queue frames; they only ever see the newest one.
//!
//! Stopping never waits on the thread. A stopped thread is retired and
//! joined on the next start or when the session is dropped, so the device is
//! free again before it is reopened.

use crate::camera::{CameraError, CameraErrorKind};
use crate::device::{self, CameraBackend, DeviceInfo, FrameStream};
use crate::frame::Frame;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use tokio::sync::watch;

/// Consecutive dequeue failures tolerated before the session faults.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

pub type LatestFrame = Option<Arc<Frame>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    RequestingPermission,
    Active,
    Error(CameraErrorKind),
}

/// Device permission as observed by the last open attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Prompt,
    Granted,
    Denied,
}

struct Worker {
    handle: JoinHandle<()>,
    faults: mpsc::Receiver<CameraError>,
}

pub struct CameraSession {
    backend: Arc<dyn CameraBackend>,
    state: SessionState,
    permission: PermissionState,
    active: Arc<AtomicBool>,
    frames: Arc<watch::Sender<LatestFrame>>,
    worker: Option<Worker>,
    retired: Option<JoinHandle<()>>,
    device: Option<DeviceInfo>,
}

impl CameraSession {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        let (frames, _) = watch::channel(None);
        Self {
            backend,
            state: SessionState::Idle,
            permission: PermissionState::Prompt,
            active: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(frames),
            worker: None,
            retired: None,
            device: None,
        }
    }

    /// Receiver for the latest captured frame. `None` while no session is active.
    pub fn subscribe(&self) -> watch::Receiver<LatestFrame> {
        self.frames.subscribe()
    }

    /// Shared flag that is true exactly while a stream is live.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.backend.list_devices()
    }

    /// Open a device and start the capture thread. No-op while active.
    pub fn start(&mut self, preferred: Option<&str>) -> Result<(), CameraError> {
        if self.state == SessionState::Active && self.is_active() {
            return Ok(());
        }
        // Reap a thread left behind by a faulted or stopped session.
        self.release();
        self.reap();

        self.state = SessionState::RequestingPermission;
        match self.open(preferred) {
            Ok((info, stream)) => {
                self.permission = PermissionState::Granted;
                self.spawn_worker(stream);
                tracing::info!(device = %info.path, name = %info.name, "camera session active");
                self.device = Some(info);
                self.state = SessionState::Active;
                Ok(())
            }
            Err(e) => {
                if e.kind() == CameraErrorKind::PermissionDenied {
                    self.permission = PermissionState::Denied;
                }
                tracing::warn!(error = %e, "camera session failed to start");
                self.state = SessionState::Error(e.kind());
                Err(e)
            }
        }
    }

    fn open(&self, preferred: Option<&str>) -> Result<(DeviceInfo, Box<dyn FrameStream>), CameraError> {
        let devices = self.backend.list_devices();
        let info = device::select_device(&devices, preferred)?;
        let stream = self.backend.open(&info.path)?;
        Ok((info, stream))
    }

    fn spawn_worker(&mut self, mut stream: Box<dyn FrameStream>) {
        let (fault_tx, faults) = mpsc::channel();
        let active = Arc::clone(&self.active);
        let frames = Arc::clone(&self.frames);
        active.store(true, Ordering::Release);

        let handle = std::thread::Builder::new()
            .name("facepaint-camera".into())
            .spawn(move || {
                let mut failures = 0;
                let mut fault = None;
                while active.load(Ordering::Acquire) {
                    match stream.next_frame() {
                        Ok(frame) => {
                            failures = 0;
                            // Checked under the channel lock, so nothing
                            // lands after release has cleared the slot.
                            frames.send_if_modified(|slot| {
                                let live = active.load(Ordering::Acquire);
                                if live {
                                    *slot = Some(Arc::new(frame));
                                }
                                live
                            });
                        }
                        // Quiet device; loop to re-check the flag.
                        Err(CameraError::Timeout(after)) => {
                            tracing::trace!(?after, "no frame yet");
                        }
                        Err(e) => {
                            failures += 1;
                            tracing::debug!(error = %e, failures, "frame dequeue failed");
                            if failures >= MAX_CONSECUTIVE_FAILURES {
                                active.store(false, Ordering::Release);
                                fault = Some(e);
                                break;
                            }
                        }
                    }
                }
                // Close the device before anyone hears about the fault.
                drop(stream);
                if let Some(e) = fault {
                    let _ = fault_tx.send(e);
                }
            })
            .expect("failed to spawn camera thread");

        self.worker = Some(Worker { handle, faults });
    }

    /// Pick up a fault raised by the capture thread. Returns it once and moves
    /// the session into the error state.
    pub fn check_health(&mut self) -> Option<CameraError> {
        let fault = self.worker.as_ref()?.faults.try_recv().ok()?;
        tracing::warn!(error = %fault, "camera stream failed");
        self.release();
        self.state = SessionState::Error(fault.kind());
        Some(fault)
    }

    /// Stop streaming and release the device. Idempotent.
    pub fn stop(&mut self) {
        let was_live = self.worker.is_some();
        self.release();
        self.state = SessionState::Idle;
        if was_live {
            tracing::info!("camera session stopped");
        }
    }

    /// Clear the active flag and the latest frame, and retire the capture
    /// thread without waiting for it. The thread drops the stream once its
    /// current dequeue returns. Runs at most once per started stream.
    fn release(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            self.reap();
            self.retired = Some(worker.handle);
        }
        self.frames.send_replace(None);
        self.device = None;
    }

    /// Join a retired capture thread. Bounded by one frame dequeue.
    fn reap(&mut self) {
        if let Some(handle) = self.retired.take() {
            if handle.join().is_err() {
                tracing::error!("camera thread panicked");
            }
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
        self.reap();
    }
}
