//! Render loop — composites the latest frame once per tick.
//!
//! Only the newest frame and landmark set are ever read, so a slow tick never
//! builds a backlog. After `stop` the surface is left untouched.

use facepaint_core::{LandmarkSet, LayerSettings};
use facepaint_hw::Frame;
use image::RgbImage;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RenderError {
    #[error("camera session is not active")]
    SessionInactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Overlay painted with this many layers.
    Rendered(usize),
    /// Nothing to draw this tick.
    Skipped,
    Stopped,
}

pub struct RenderLoop {
    state: RenderState,
    session_active: Arc<AtomicBool>,
    surface: RgbImage,
    rendered: u64,
    skipped: u64,
    last_sequence: Option<u32>,
}

impl RenderLoop {
    pub fn new(session_active: Arc<AtomicBool>) -> Self {
        Self {
            state: RenderState::Stopped,
            session_active,
            surface: RgbImage::new(0, 0),
            rendered: 0,
            skipped: 0,
            last_sequence: None,
        }
    }

    /// Start ticking. Only allowed while the camera session is active.
    pub fn start(&mut self) -> Result<(), RenderError> {
        if !self.session_active.load(Ordering::Acquire) {
            return Err(RenderError::SessionInactive);
        }
        if self.state == RenderState::Stopped {
            tracing::debug!("render loop started");
        }
        self.state = RenderState::Running;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == RenderState::Running {
            tracing::debug!(rendered = self.rendered, skipped = self.skipped, "render loop stopped");
        }
        self.state = RenderState::Stopped;
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Run one tick against the latest inputs.
    pub fn tick(
        &mut self,
        frame: Option<&Frame>,
        landmarks: Option<&LandmarkSet>,
        settings: &LayerSettings,
    ) -> TickOutcome {
        if self.state != RenderState::Running {
            return TickOutcome::Stopped;
        }
        if !self.session_active.load(Ordering::Acquire) {
            self.skipped += 1;
            return TickOutcome::Skipped;
        }
        let (Some(frame), Some(landmarks)) = (frame, landmarks.filter(|l| !l.is_empty())) else {
            self.skipped += 1;
            tracing::trace!("frame or landmarks unavailable; skipping tick");
            return TickOutcome::Skipped;
        };

        let painted = facepaint_core::render(&mut self.surface, &frame.image, landmarks, settings);
        self.rendered += 1;
        self.last_sequence = Some(frame.sequence);
        TickOutcome::Rendered(painted)
    }

    /// The most recent composite. Empty until the first rendered tick.
    pub fn surface(&self) -> &RgbImage {
        &self.surface
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facepaint_core::Category;

    fn inputs() -> (Frame, LandmarkSet) {
        let frame = Frame::new(RgbImage::from_pixel(32, 32, image::Rgb([90, 90, 90])), 5);
        let landmarks = LandmarkSet::from_dense(vec![[0.5, 0.5]; facepaint_core::landmarks::MESH_POINTS]);
        (frame, landmarks)
    }

    #[test]
    fn test_start_requires_active_session() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut r = RenderLoop::new(flag.clone());
        assert_eq!(r.start(), Err(RenderError::SessionInactive));
        flag.store(true, Ordering::Release);
        assert_eq!(r.start(), Ok(()));
        assert_eq!(r.state(), RenderState::Running);
    }

    #[test]
    fn test_skips_without_inputs() {
        let mut r = RenderLoop::new(Arc::new(AtomicBool::new(true)));
        r.start().unwrap();
        let (frame, landmarks) = inputs();
        let s = LayerSettings::default();
        assert_eq!(r.tick(None, Some(&landmarks), &s), TickOutcome::Skipped);
        assert_eq!(r.tick(Some(&frame), None, &s), TickOutcome::Skipped);
        assert_eq!(r.tick(Some(&frame), Some(&LandmarkSet::default()), &s), TickOutcome::Skipped);
        assert_eq!(r.skipped(), 3);
        assert_eq!(r.rendered(), 0);
        assert_eq!(r.surface().dimensions(), (0, 0));
    }

    #[test]
    fn test_renders_base_frame() {
        let mut r = RenderLoop::new(Arc::new(AtomicBool::new(true)));
        r.start().unwrap();
        let (frame, landmarks) = inputs();
        let outcome = r.tick(Some(&frame), Some(&landmarks), &LayerSettings::default());
        assert_eq!(outcome, TickOutcome::Rendered(0));
        assert_eq!(r.surface(), &frame.image);
        assert_eq!(r.last_sequence(), Some(5));
    }

    #[test]
    fn test_stop_freezes_surface() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut r = RenderLoop::new(flag.clone());
        r.start().unwrap();
        let (frame, landmarks) = inputs();
        let mut settings = LayerSettings::default();
        r.tick(Some(&frame), Some(&landmarks), &settings);
        let before = r.surface().clone();

        r.stop();
        settings.toggle(Category::Foundation);
        let other = Frame::new(RgbImage::from_pixel(32, 32, image::Rgb([1, 2, 3])), 6);
        assert_eq!(r.tick(Some(&other), Some(&landmarks), &settings), TickOutcome::Stopped);
        assert_eq!(r.surface(), &before);
    }

    #[test]
    fn test_inactive_session_skips_even_when_running() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut r = RenderLoop::new(flag.clone());
        r.start().unwrap();
        flag.store(false, Ordering::Release);
        let (frame, landmarks) = inputs();
        assert_eq!(
            r.tick(Some(&frame), Some(&landmarks), &LayerSettings::default()),
            TickOutcome::Skipped
        );
    }
}
