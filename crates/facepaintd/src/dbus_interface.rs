use crate::studio::{StudioError, StudioEvent, StudioHandle};
use facepaint_core::{Category, Color, LandmarkSet, LayerPatch, Preset, SettingsIntent};
use zbus::interface;
use zbus::object_server::SignalEmitter;

pub const BUS_NAME: &str = "org.facepaint.Studio1";
pub const OBJECT_PATH: &str = "/org/facepaint/Studio1";

/// D-Bus interface for the facepaint studio daemon.
///
/// Bus name: org.facepaint.Studio1
/// Object path: /org/facepaint/Studio1
pub struct StudioService {
    pub studio: StudioHandle,
}

fn failed(e: StudioError) -> zbus::fdo::Error {
    match e {
        StudioError::Settings(_) | StudioError::UnknownPreset(_) => {
            zbus::fdo::Error::InvalidArgs(e.to_string())
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

fn category(name: &str) -> zbus::fdo::Result<Category> {
    name.parse()
        .map_err(|e: facepaint_core::types::UnknownCategory| zbus::fdo::Error::InvalidArgs(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

/// Points with a non-finite coordinate mark slots the detector left empty.
/// Finiteness is checked after narrowing, since large doubles overflow `f32`.
fn landmarks_from_wire(points: Vec<(f64, f64)>) -> LandmarkSet {
    LandmarkSet::from_indexed(
        points
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| (i, [x as f32, y as f32]))
            .filter(|(_, [x, y])| x.is_finite() && y.is_finite()),
    )
}

#[interface(name = "org.facepaint.Studio1")]
impl StudioService {
    /// Open the camera (empty string picks a device) and start rendering.
    async fn start_camera(&self, device: &str) -> zbus::fdo::Result<String> {
        tracing::info!(device, "start_camera requested");
        let device = (!device.is_empty()).then(|| device.to_string());
        let status = self.studio.start_camera(device).await.map_err(failed)?;
        to_json(&status)
    }

    async fn stop_camera(&self) -> zbus::fdo::Result<()> {
        tracing::info!("stop_camera requested");
        self.studio.stop_camera().await.map_err(failed)
    }

    /// Flip one category on or off. Returns the new enabled state.
    async fn toggle(&self, category_name: &str) -> zbus::fdo::Result<bool> {
        let c = category(category_name)?;
        let settings = self
            .studio
            .dispatch(SettingsIntent::Toggle(c))
            .await
            .map_err(failed)?;
        Ok(settings.layer(c).enabled)
    }

    async fn set_color(&self, category_name: &str, color: &str) -> zbus::fdo::Result<()> {
        let c = category(category_name)?;
        let color: Color = color
            .parse()
            .map_err(|e: facepaint_core::types::ColorParseError| zbus::fdo::Error::InvalidArgs(e.to_string()))?;
        self.studio
            .dispatch(SettingsIntent::SetColor(c, color))
            .await
            .map_err(failed)?;
        Ok(())
    }

    async fn set_intensity(&self, category_name: &str, intensity: u8) -> zbus::fdo::Result<()> {
        let c = category(category_name)?;
        self.studio
            .dispatch(SettingsIntent::SetIntensity(c, intensity))
            .await
            .map_err(failed)?;
        Ok(())
    }

    /// Merge a JSON `LayerPatch` into one category.
    async fn set_params(&self, category_name: &str, patch_json: &str) -> zbus::fdo::Result<()> {
        let c = category(category_name)?;
        let patch: LayerPatch =
            serde_json::from_str(patch_json).map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?;
        self.studio
            .dispatch(SettingsIntent::SetParams(c, patch))
            .await
            .map_err(failed)?;
        Ok(())
    }

    async fn apply_preset(&self, name: &str) -> zbus::fdo::Result<()> {
        tracing::info!(name, "apply_preset requested");
        self.studio.apply_preset(name).await.map_err(failed)?;
        Ok(())
    }

    /// Apply a preset given as JSON (`{"name": ..., "layers": {...}}`).
    async fn apply_preset_json(&self, preset_json: &str) -> zbus::fdo::Result<()> {
        let preset: Preset =
            serde_json::from_str(preset_json).map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?;
        self.studio.apply_custom_preset(preset).await.map_err(failed)?;
        Ok(())
    }

    async fn clear_all(&self) -> zbus::fdo::Result<()> {
        self.studio
            .dispatch(SettingsIntent::ClearAll)
            .await
            .map_err(failed)?;
        Ok(())
    }

    /// Request a capture now. False when one is already in flight.
    async fn capture_now(&self) -> zbus::fdo::Result<bool> {
        self.studio.capture_now().await.map_err(failed)
    }

    /// Replace the current landmarks with normalized `(x, y)` pairs.
    async fn submit_landmarks(&self, points: Vec<(f64, f64)>) -> zbus::fdo::Result<()> {
        tracing::trace!(count = points.len(), "landmarks submitted");
        self.studio.submit_landmarks(landmarks_from_wire(points));
        Ok(())
    }

    /// Write the latest composite to an image file on the daemon's host.
    async fn save_composite(&self, path: &str) -> zbus::fdo::Result<()> {
        self.studio.save_composite(path.into()).await.map_err(failed)
    }

    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.studio.status().await.map_err(failed)?;
        to_json(&status)
    }

    async fn settings(&self) -> zbus::fdo::Result<String> {
        let settings = self.studio.settings().await.map_err(failed)?;
        to_json(&settings)
    }

    /// Latest successful capture as JSON, or `null`.
    async fn last_result(&self) -> zbus::fdo::Result<String> {
        let result = self.studio.last_result().await.map_err(failed)?;
        to_json(&result)
    }

    /// Studio notification, as JSON.
    #[zbus(signal)]
    async fn studio_event(emitter: &SignalEmitter<'_>, event_json: &str) -> zbus::Result<()>;
}

/// Forward studio events to the `StudioEvent` signal until the studio exits.
pub async fn forward_events(
    connection: zbus::Connection,
    events: tokio::sync::broadcast::Receiver<StudioEvent>,
) -> zbus::Result<()> {
    let emitter = SignalEmitter::new(&connection, OBJECT_PATH)?;
    let emitter = &emitter;
    relay_events(events, move |json| async move {
        StudioService::studio_event(emitter, &json).await
    })
    .await;
    Ok(())
}

/// Hand each event to `emit` as JSON until the channel closes. A failed
/// emit is logged and the relay moves on to the next event.
async fn relay_events<F, Fut>(mut events: tokio::sync::broadcast::Receiver<StudioEvent>, mut emit: F)
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = zbus::Result<()>>,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                if let StudioEvent::CameraFailed { .. } = event {
                    tracing::warn!(event = %json, "camera failure");
                }
                if let Err(e) = emit(json).await {
                    tracing::warn!(error = %e, "failed to emit studio event");
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event forwarder lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmarks_from_wire_skips_missing() {
        let set = landmarks_from_wire(vec![(0.1, 0.2), (f64::NAN, f64::NAN), (0.5, 0.5)]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(1), None);
        assert_eq!(set.get(2), Some([0.5, 0.5]));
    }

    #[test]
    fn test_landmarks_from_wire_rejects_f32_overflow() {
        let set = landmarks_from_wire(vec![(0.1, 0.2), (1e300, 0.5), (0.5, -1e39)]);
        assert_eq!(set.get(0), Some([0.1, 0.2]));
        assert_eq!(set.get(1), None);
        assert_eq!(set.get(2), None);
    }

    #[tokio::test]
    async fn test_relay_continues_after_emit_failure() {
        let (tx, rx) = tokio::sync::broadcast::channel(8);
        for error in ["first", "second"] {
            tx.send(StudioEvent::CaptureFailed { error: error.into() }).unwrap();
        }
        drop(tx);

        let mut delivered = Vec::new();
        let mut attempts = 0;
        relay_events(rx, |json| {
            attempts += 1;
            let outcome = if attempts == 1 {
                Err(zbus::Error::Failure("bus went away".into()))
            } else {
                delivered.push(json);
                Ok(())
            };
            async move { outcome }
        })
        .await;

        assert_eq!(attempts, 2);
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("second"));
    }

    #[test]
    fn test_category_argument() {
        assert_eq!(category("Blush").unwrap(), Category::Blush);
        assert!(category("mascara").is_err());
    }
}
