//! facepaint-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access, RGB frame conversion and the camera
//! session that feeds the studio's render and capture loops.

pub mod camera;
pub mod device;
pub mod frame;
pub mod session;

pub use camera::{CameraError, CameraErrorKind, PixelFormat, V4l2Backend};
pub use device::{select_device, CameraBackend, DeviceInfo, FrameStream};
pub use frame::{Frame, FrameError};
pub use session::{CameraSession, LatestFrame, PermissionState, SessionState};
