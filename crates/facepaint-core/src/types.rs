use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detector tick worth of facial landmarks.
///
/// Coordinates are normalized to [0, 1] relative to the frame. Slots are
/// addressed by the detector's landmark index; a slot may be empty when the
/// detector did not produce that point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Option<[f32; 2]>>,
}

impl LandmarkSet {
    /// Build a fully populated set from a dense list of `[x, y]` pairs.
    pub fn from_dense(points: Vec<[f32; 2]>) -> Self {
        Self {
            points: points.into_iter().map(Some).collect(),
        }
    }

    /// Build a sparse set from `(index, [x, y])` pairs. Unlisted slots stay empty.
    pub fn from_indexed<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (usize, [f32; 2])>,
    {
        let mut set = Self::default();
        for (idx, xy) in points {
            set.insert(idx, xy);
        }
        set
    }

    pub fn insert(&mut self, idx: usize, xy: [f32; 2]) {
        if idx >= self.points.len() {
            self.points.resize(idx + 1, None);
        }
        self.points[idx] = Some(xy);
    }

    /// Normalized coordinates of landmark `idx`, if present.
    pub fn get(&self, idx: usize) -> Option<[f32; 2]> {
        self.points.get(idx).copied().flatten()
    }

    /// Number of index slots (populated or not).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no slot holds a point.
    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    /// Landmark `idx` scaled to pixel coordinates.
    pub fn pixel(&self, idx: usize, width: u32, height: u32) -> Option<Point> {
        self.get(idx)
            .map(|[x, y]| Point::new(x * width as f32, y * height as f32))
    }
}

/// 8-bit sRGB color, written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}: expected #RRGGBB")]
pub struct ColorParseError(pub String);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a `0xRRGGBB` literal.
    pub const fn from_u32(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| ColorParseError(s.to_string()))?;
        Ok(Self::from_u32(value))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Makeup category. Each category owns exactly one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Foundation,
    Lipstick,
    Eyeshadow,
    Blush,
    Eyeliner,
    Eyebrow,
    Highlighter,
    Contour,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown makeup category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Foundation,
        Category::Lipstick,
        Category::Eyeshadow,
        Category::Blush,
        Category::Eyeliner,
        Category::Eyebrow,
        Category::Highlighter,
        Category::Contour,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Foundation => "foundation",
            Category::Lipstick => "lipstick",
            Category::Eyeshadow => "eyeshadow",
            Category::Blush => "blush",
            Category::Eyeliner => "eyeliner",
            Category::Eyebrow => "eyebrow",
            Category::Highlighter => "highlighter",
            Category::Contour => "contour",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Skin analysis returned by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub skin_tone: String,
    #[serde(default)]
    pub undertone: Option<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub recommendations: serde_json::Value,
    #[serde(default)]
    pub confidence: f32,
}

/// Server-side composited image returned by the transformation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationResult {
    /// Data URL of the frame that was submitted.
    pub original: String,
    /// Data URL of the transformed frame.
    pub transformed: String,
}

/// Payload of a successful capture round trip, tagged by producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CapturePayload {
    Analysis(AnalysisResult),
    Transformation(TransformationResult),
}

/// Latest successful capture. Replaced wholesale by the next success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub payload: CapturePayload,
    pub captured_at: chrono::DateTime<chrono::Utc>,
    /// Camera frame sequence number of the snapshot.
    pub frame_sequence: u32,
}
