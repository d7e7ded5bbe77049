//! Capture scheduler — at most one collaborator round trip in flight.
//!
//! Ticks and manual triggers that arrive while a request is outstanding are
//! dropped, not queued. A timed-out request is reported right away, but the
//! scheduler stays busy until its blocking worker actually returns. Each
//! submission carries the camera-session generation it was taken in;
//! completions from an older generation are discarded.

use crate::backend::{BackendError, CaptureBackend, CaptureRequest};
use crate::config::{CaptureMode, Config};
use facepaint_core::{CapturePayload, CaptureResult, LayerSettings};
use facepaint_hw::{Frame, FrameError};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] FrameError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),
    #[error("capture worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerState {
    Idle,
    AwaitingResult,
    /// The request timed out and its worker has not returned yet.
    Draining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Submitted,
    /// A request is already in flight.
    Busy,
    /// No frame has been captured yet.
    NoFrame,
}

/// Result of one round trip.
#[derive(Debug)]
pub struct CaptureCompletion {
    pub generation: u64,
    pub frame_sequence: u32,
    pub outcome: Result<CapturePayload, CaptureError>,
}

/// Sent back to the studio task by a capture worker.
#[derive(Debug)]
pub enum CaptureMessage {
    Completed(CaptureCompletion),
    /// A worker that outlived its timeout has returned.
    WorkerReleased,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CaptureCounters {
    pub submitted: u64,
    pub dropped: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub discarded: u64,
}

pub struct CaptureScheduler {
    backend: Arc<dyn CaptureBackend>,
    done_tx: mpsc::UnboundedSender<CaptureMessage>,
    mode: CaptureMode,
    timeout: Duration,
    jpeg_quality: u8,
    throttle: Duration,
    state: SchedulerState,
    last_auto_apply: Option<Instant>,
    counters: CaptureCounters,
}

impl CaptureScheduler {
    pub fn new(
        config: &Config,
        backend: Arc<dyn CaptureBackend>,
        done_tx: mpsc::UnboundedSender<CaptureMessage>,
    ) -> Self {
        Self {
            backend,
            done_tx,
            mode: config.capture_mode,
            timeout: config.request_timeout(),
            jpeg_quality: config.jpeg_quality,
            throttle: config.auto_apply_throttle(),
            state: SchedulerState::Idle,
            last_auto_apply: None,
            counters: CaptureCounters::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn counters(&self) -> CaptureCounters {
        self.counters
    }

    /// Submit the latest frame unless a request or its worker is still in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(
        &mut self,
        frame: Option<Arc<Frame>>,
        settings: &LayerSettings,
        look_id: Option<&str>,
        generation: u64,
    ) -> TriggerOutcome {
        if self.state != SchedulerState::Idle {
            self.counters.dropped += 1;
            tracing::debug!(state = ?self.state, "capture already in flight; dropping trigger");
            return TriggerOutcome::Busy;
        }
        let Some(frame) = frame else {
            tracing::debug!("no frame yet; skipping capture");
            return TriggerOutcome::NoFrame;
        };

        self.state = SchedulerState::AwaitingResult;
        self.counters.submitted += 1;

        let backend = Arc::clone(&self.backend);
        let done_tx = self.done_tx.clone();
        let (mode, quality, timeout) = (self.mode, self.jpeg_quality, self.timeout);
        let settings = *settings;
        let look_id = look_id.map(str::to_string);
        let frame_sequence = frame.sequence;

        tracing::info!(?mode, sequence = frame_sequence, generation, "capture submitted");

        tokio::spawn(async move {
            let mut work =
                tokio::task::spawn_blocking(move || -> Result<CapturePayload, CaptureError> {
                    let request = CaptureRequest {
                        mode,
                        image_data: frame.to_jpeg_data_url(quality)?,
                        settings,
                        look_id,
                    };
                    Ok(backend.submit(&request)?)
                });
            let (outcome, timed_out) = match tokio::time::timeout(timeout, &mut work).await {
                Ok(Ok(result)) => (result, false),
                Ok(Err(join)) => (Err(CaptureError::Worker(join.to_string())), false),
                Err(_) => (Err(CaptureError::Timeout(timeout)), true),
            };
            let _ = done_tx.send(CaptureMessage::Completed(CaptureCompletion {
                generation,
                frame_sequence,
                outcome,
            }));
            if timed_out {
                // Blocking work cannot be cancelled; hold the slot until it ends.
                let _ = work.await;
                tracing::debug!(sequence = frame_sequence, "timed-out capture worker returned");
                let _ = done_tx.send(CaptureMessage::WorkerReleased);
            }
        });

        TriggerOutcome::Submitted
    }

    /// Settle a worker message.
    ///
    /// A completion returns the scheduler to idle, except after a timeout,
    /// where it drains until [`CaptureMessage::WorkerReleased`] arrives.
    /// Returns `None` for a release or for a completion that belongs to an
    /// older camera session.
    pub fn complete(
        &mut self,
        message: CaptureMessage,
        current_generation: u64,
    ) -> Option<Result<CaptureResult, CaptureError>> {
        let completion = match message {
            CaptureMessage::Completed(completion) => completion,
            CaptureMessage::WorkerReleased => {
                self.state = SchedulerState::Idle;
                return None;
            }
        };
        self.state = match completion.outcome {
            Err(CaptureError::Timeout(_)) => SchedulerState::Draining,
            _ => SchedulerState::Idle,
        };

        if completion.generation != current_generation {
            self.counters.discarded += 1;
            tracing::debug!(
                generation = completion.generation,
                current = current_generation,
                "discarding capture from a previous session"
            );
            return None;
        }

        match completion.outcome {
            Ok(payload) => {
                self.counters.succeeded += 1;
                Some(Ok(CaptureResult {
                    payload,
                    captured_at: chrono::Utc::now(),
                    frame_sequence: completion.frame_sequence,
                }))
            }
            Err(e) => {
                self.counters.failed += 1;
                Some(Err(e))
            }
        }
    }

    /// True when an auto-applied capture may fire at `now`; records it if so.
    pub fn auto_apply_due(&mut self, now: Instant) -> bool {
        let due = self
            .last_auto_apply
            .map_or(true, |last| now.saturating_duration_since(last) >= self.throttle);
        if due {
            self.last_auto_apply = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facepaint_core::AnalysisResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingBackend {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(delay_ms),
                fail: false,
            })
        }
    }

    impl CaptureBackend for CountingBackend {
        fn submit(&self, request: &CaptureRequest) -> Result<CapturePayload, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.image_data.starts_with("data:image/jpeg;base64,"));
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(BackendError::Transport("connection refused".into()));
            }
            Ok(CapturePayload::Analysis(AnalysisResult {
                skin_tone: "medium".into(),
                undertone: None,
                concerns: vec![],
                recommendations: serde_json::Value::Null,
                confidence: 0.9,
            }))
        }
    }

    fn frame() -> Option<Arc<Frame>> {
        Some(Arc::new(Frame::new(image::RgbImage::new(16, 16), 42)))
    }

    fn scheduler(
        backend: Arc<dyn CaptureBackend>,
        config: Config,
    ) -> (CaptureScheduler, mpsc::UnboundedReceiver<CaptureMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CaptureScheduler::new(&config, backend, tx), rx)
    }

    #[tokio::test]
    async fn test_trigger_while_awaiting_is_dropped() {
        let backend = CountingBackend::new(50);
        let (mut s, mut rx) = scheduler(backend.clone(), Config::default());
        let settings = LayerSettings::default();

        assert_eq!(s.trigger(frame(), &settings, None, 1), TriggerOutcome::Submitted);
        assert_eq!(s.state(), SchedulerState::AwaitingResult);
        assert_eq!(s.trigger(frame(), &settings, None, 1), TriggerOutcome::Busy);
        assert_eq!(s.trigger(frame(), &settings, None, 1), TriggerOutcome::Busy);

        let done = rx.recv().await.unwrap();
        let result = s.complete(done, 1).unwrap().unwrap();
        assert_eq!(result.frame_sequence, 42);
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.counters().dropped, 2);
    }

    #[tokio::test]
    async fn test_no_frame_does_not_submit() {
        let backend = CountingBackend::new(0);
        let (mut s, _rx) = scheduler(backend.clone(), Config::default());
        assert_eq!(
            s.trigger(None, &LayerSettings::default(), None, 1),
            TriggerOutcome::NoFrame
        );
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_generation_is_discarded() {
        let backend = CountingBackend::new(5);
        let (mut s, mut rx) = scheduler(backend, Config::default());
        s.trigger(frame(), &LayerSettings::default(), None, 3);
        let done = rx.recv().await.unwrap();
        assert!(s.complete(done, 4).is_none());
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.counters().discarded, 1);
    }

    #[tokio::test]
    async fn test_failure_reported_once_and_not_retried() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: true,
        });
        let (mut s, mut rx) = scheduler(backend.clone(), Config::default());
        s.trigger(frame(), &LayerSettings::default(), None, 1);
        let done = rx.recv().await.unwrap();
        let err = s.complete(done, 1).unwrap().unwrap_err();
        assert!(matches!(err, CaptureError::Backend(BackendError::Transport(_))));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.counters().failed, 1);
    }

    /// Sleeps in the backend while tracking how many calls overlap.
    struct SlowBackend {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CaptureBackend for SlowBackend {
        fn submit(&self, _request: &CaptureRequest) -> Result<CapturePayload, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Err(BackendError::Transport("too slow".into()))
        }
    }

    #[tokio::test]
    async fn test_timeout_holds_slot_until_worker_returns() {
        let backend = Arc::new(SlowBackend {
            delay: Duration::from_millis(400),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let (mut s, mut rx) = scheduler(backend.clone(), Config::default());
        // Shorten the bound below the one-second config floor.
        s.timeout = Duration::from_millis(50);
        let settings = LayerSettings::default();

        assert_eq!(s.trigger(frame(), &settings, None, 1), TriggerOutcome::Submitted);
        let timed_out = rx.recv().await.unwrap();
        assert!(matches!(s.complete(timed_out, 1), Some(Err(CaptureError::Timeout(_)))));
        assert_eq!(s.state(), SchedulerState::Draining);

        // The first worker is still sleeping; nothing new may start.
        assert_eq!(s.trigger(frame(), &settings, None, 1), TriggerOutcome::Busy);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let released = rx.recv().await.unwrap();
        assert!(matches!(released, CaptureMessage::WorkerReleased));
        assert!(s.complete(released, 1).is_none());
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);

        assert_eq!(s.trigger(frame(), &settings, None, 1), TriggerOutcome::Submitted);
        let _ = rx.recv().await.unwrap();
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(s.counters().dropped, 1);
    }

    #[test]
    fn test_auto_apply_throttle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut s = CaptureScheduler::new(&Config::default(), CountingBackend::new(0), tx);
        let t0 = Instant::now();
        assert!(s.auto_apply_due(t0));
        assert!(!s.auto_apply_due(t0 + Duration::from_millis(400)));
        assert!(!s.auto_apply_due(t0 + Duration::from_millis(999)));
        assert!(s.auto_apply_due(t0 + Duration::from_millis(1000)));
        assert!(!s.auto_apply_due(t0 + Duration::from_millis(1500)));
    }
}
