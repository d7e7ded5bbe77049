//! V4L2 camera capture via the `v4l` crate.

use crate::device::{CameraBackend, DeviceInfo, FrameStream};
use crate::frame::{self, Frame};
use serde::Serialize;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Requested capture size; the driver may negotiate something else.
const IDEAL_WIDTH: u32 = 1280;
const IDEAL_HEIGHT: u32 = 720;
const STREAM_BUFFERS: u32 = 4;
/// Upper bound on one dequeue, so the capture thread notices a stop promptly.
const FRAME_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera access denied: {0}. Grant access to the video device and start again")]
    PermissionDenied(String),
    #[error("no camera found: {0}. Connect a camera and start again")]
    DeviceNotFound(String),
    #[error("camera is in use by another application: {0}")]
    DeviceBusy(String),
    #[error("camera does not support the requested format: {0}")]
    ConstraintsUnsupported(String),
    #[error("camera does not support streaming capture: {0}")]
    StreamingNotSupported(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    /// No frame arrived within the dequeue bound. Not a fault on its own.
    #[error("no frame within {0:?}")]
    Timeout(Duration),
}

/// Failure category, carried by the session's error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraErrorKind {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    ConstraintsUnsupported,
    StreamingNotSupported,
    CaptureFailed,
}

impl CameraError {
    pub fn kind(&self) -> CameraErrorKind {
        match self {
            CameraError::PermissionDenied(_) => CameraErrorKind::PermissionDenied,
            CameraError::DeviceNotFound(_) => CameraErrorKind::DeviceNotFound,
            CameraError::DeviceBusy(_) => CameraErrorKind::DeviceBusy,
            CameraError::ConstraintsUnsupported(_) => CameraErrorKind::ConstraintsUnsupported,
            CameraError::StreamingNotSupported(_) => CameraErrorKind::StreamingNotSupported,
            CameraError::CaptureFailed(_) | CameraError::Timeout(_) => CameraErrorKind::CaptureFailed,
        }
    }

    /// Map an OS error from opening or streaming `path`.
    fn from_io(path: &str, err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => CameraError::PermissionDenied(path.to_string()),
            Some(libc::EBUSY) => CameraError::DeviceBusy(path.to_string()),
            Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => {
                CameraError::DeviceNotFound(path.to_string())
            }
            _ => CameraError::CaptureFailed(format!("{path}: {err}")),
        }
    }
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// 8-bit grayscale, replicated into RGB.
    Grey,
    /// Packed RGB24.
    Rgb3,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"GREY" => Some(PixelFormat::Grey),
            b"RGB3" => Some(PixelFormat::Rgb3),
            _ => None,
        }
    }
}

/// V4L2 device enumeration and streaming.
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Backend;

impl CameraBackend for V4l2Backend {
    fn list_devices(&self) -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }

    fn open(&self, path: &str) -> Result<Box<dyn FrameStream>, CameraError> {
        Ok(Box::new(V4l2Stream::open(path)?))
    }
}

/// An mmap-streaming V4L2 device. The stream holds the device handle, so
/// dropping this closes the device.
pub struct V4l2Stream {
    stream: MmapStream<'static>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl V4l2Stream {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| CameraError::from_io(device_path, &e))?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::from_io(device_path, &e))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let cap_flags = caps.capabilities;
        if !cap_flags.contains(v4l::capability::Flags::VIDEO_CAPTURE)
            || !cap_flags.contains(v4l::capability::Flags::STREAMING)
        {
            return Err(CameraError::StreamingNotSupported(device_path.to_string()));
        }

        // Ask for YUYV at the ideal size; drivers may answer with GREY or RGB3.
        let mut fmt = device
            .format()
            .map_err(|e| CameraError::ConstraintsUnsupported(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = IDEAL_WIDTH;
        fmt.height = IDEAL_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::ConstraintsUnsupported(format!("failed to set format: {e}")))?;

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::ConstraintsUnsupported(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, GREY, or RGB3)"
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        let mut stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS).map_err(|e| {
            match e.raw_os_error() {
                Some(libc::EBUSY) => CameraError::DeviceBusy(device_path.to_string()),
                _ => CameraError::StreamingNotSupported(format!("{device_path}: {e}")),
            }
        })?;
        stream.set_timeout(FRAME_TIMEOUT);

        Ok(Self {
            stream,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// Convert a raw buffer to RGB based on the negotiated format.
    fn buf_to_rgb(&self, buf: &[u8]) -> Result<image::RgbImage, CameraError> {
        let converted = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height),
            PixelFormat::Grey => frame::grey_to_rgb(buf, self.width, self.height),
            PixelFormat::Rgb3 => frame::rgb3_to_rgb(buf, self.width, self.height),
        };
        converted.map_err(|e| CameraError::CaptureFailed(format!("{:?} conversion failed: {e}", self.pixel_format)))
    }
}

impl FrameStream for V4l2Stream {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self.stream.next().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => CameraError::Timeout(FRAME_TIMEOUT),
            _ => CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")),
        })?;
        let sequence = meta.sequence;
        let image = self.buf_to_rgb(buf)?;
        Ok(Frame::new(image, sequence))
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        tracing::info!(device = %self.device_path, "camera released");
    }
}
