//! facepaint-core — Makeup layer model and overlay compositing.
//!
//! Holds the per-category layer settings, maps facial landmarks to paint
//! regions, and composites enabled layers over a camera frame.

pub mod compositor;
pub mod landmarks;
pub mod layers;
pub mod presets;
pub mod raster;
pub mod regions;
pub mod types;

pub use compositor::{render, Z_ORDER};
pub use layers::{LayerPatch, LayerSettings, MakeupLayer, Preset, SettingsError, SettingsIntent};
pub use regions::{region_for, Region};
pub use types::{
    AnalysisResult, Category, CapturePayload, CaptureResult, Color, LandmarkSet, Point,
    TransformationResult,
};
