//! Camera backend seam and device selection.

use crate::camera::CameraError;
use crate::frame::Frame;
use serde::Serialize;

/// Info about a discovered video capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Source of camera devices and frame streams.
pub trait CameraBackend: Send + Sync {
    fn list_devices(&self) -> Vec<DeviceInfo>;

    /// Open `path` and start streaming.
    fn open(&self, path: &str) -> Result<Box<dyn FrameStream>, CameraError>;
}

/// An open, streaming device. Dropping it releases the device.
pub trait FrameStream: Send {
    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Labels that mark a user-facing camera.
const FRONT_FACING_HINTS: [&str; 3] = ["front", "user", "facing"];

/// Pick the device to open.
///
/// An explicit `preferred` path or name wins when present. Otherwise the first
/// device labelled as front-facing, otherwise the first device.
pub fn select_device(devices: &[DeviceInfo], preferred: Option<&str>) -> Result<DeviceInfo, CameraError> {
    if let Some(wanted) = preferred.filter(|p| !p.is_empty()) {
        return devices
            .iter()
            .find(|d| d.path == wanted || d.name == wanted)
            .cloned()
            .ok_or_else(|| CameraError::DeviceNotFound(wanted.to_string()));
    }

    devices
        .iter()
        .find(|d| {
            let label = d.name.to_ascii_lowercase();
            FRONT_FACING_HINTS.iter().any(|hint| label.contains(hint))
        })
        .or_else(|| devices.first())
        .cloned()
        .ok_or_else(|| CameraError::DeviceNotFound("no video capture devices".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(path: &str, name: &str) -> DeviceInfo {
        DeviceInfo {
            path: path.into(),
            name: name.into(),
            driver: "uvcvideo".into(),
            bus: "usb-0000:00:14.0-1".into(),
        }
    }

    #[test]
    fn test_prefers_front_facing_label() {
        let devices = [dev("/dev/video0", "Rear Camera"), dev("/dev/video2", "Integrated Front Camera")];
        assert_eq!(select_device(&devices, None).unwrap().path, "/dev/video2");
    }

    #[test]
    fn test_falls_back_to_first() {
        let devices = [dev("/dev/video0", "HD Webcam"), dev("/dev/video2", "Capture Card")];
        assert_eq!(select_device(&devices, None).unwrap().path, "/dev/video0");
    }

    #[test]
    fn test_explicit_device() {
        let devices = [dev("/dev/video0", "User Facing"), dev("/dev/video2", "HD Webcam")];
        assert_eq!(select_device(&devices, Some("/dev/video2")).unwrap().path, "/dev/video2");
        assert!(matches!(
            select_device(&devices, Some("/dev/video9")),
            Err(CameraError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_no_devices() {
        assert!(matches!(select_device(&[], None), Err(CameraError::DeviceNotFound(_))));
    }
}
