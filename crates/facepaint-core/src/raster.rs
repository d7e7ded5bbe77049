//! Layer rasterization on tiny-skia.
//!
//! Each makeup layer is drawn at full strength into its own [`LayerMask`],
//! then composited onto the [`Canvas`] once at the layer's alpha. Regions of
//! the same layer that overlap therefore never compound their opacity.

use crate::types::{Color, Point};
use image::RgbImage;
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, GradientStop, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, RadialGradient, SpreadMode, Stroke, Transform,
};

/// Stops used to approximate the `(1 − t)^falloff` radial curve.
const RADIAL_STOPS: usize = 8;

fn skia_color(color: Color, alpha: u8) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, alpha)
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color, 255));
    paint.anti_alias = true;
    paint
}

fn polygon_path(points: &[Point], close: bool) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

/// The frame being composited, held as an opaque premultiplied pixmap.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Returns `None` for a zero-sized frame.
    pub fn from_image(frame: &RgbImage) -> Option<Self> {
        let mut pixmap = Pixmap::new(frame.width(), frame.height())?;
        for (dst, src) in pixmap
            .data_mut()
            .chunks_exact_mut(4)
            .zip(frame.as_raw().chunks_exact(3))
        {
            dst[..3].copy_from_slice(src);
            dst[3] = 255;
        }
        Some(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Blend `mask` over the canvas once at `alpha`.
    pub fn composite(&mut self, mask: &LayerMask, alpha: f32) {
        let paint = PixmapPaint {
            opacity: alpha.clamp(0.0, 1.0),
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Nearest,
        };
        self.pixmap
            .draw_pixmap(0, 0, mask.pixmap.as_ref(), &paint, Transform::identity(), None);
    }

    /// Write the canvas back into `surface`, resizing it if needed.
    ///
    /// The canvas stays opaque, so premultiplied channels are the plain RGB.
    pub fn write_to(&self, surface: &mut RgbImage) {
        if surface.dimensions() != (self.width(), self.height()) {
            *surface = RgbImage::new(self.width(), self.height());
        }
        for (dst, src) in surface
            .chunks_exact_mut(3)
            .zip(self.pixmap.data().chunks_exact(4))
        {
            dst.copy_from_slice(&src[..3]);
        }
    }
}

/// Coverage of one layer in its own color, before the layer alpha is applied.
pub struct LayerMask {
    pixmap: Pixmap,
    scratch: Option<Pixmap>,
    color: Color,
}

impl LayerMask {
    pub fn new(width: u32, height: u32, color: Color) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            scratch: None,
            color,
        })
    }

    /// Fill a closed polygon using the even-odd rule.
    pub fn fill_polygon(&mut self, points: &[Point]) {
        if points.len() < 3 {
            return;
        }
        let Some(path) = polygon_path(points, true) else {
            return;
        };
        self.pixmap.fill_path(
            &path,
            &solid_paint(self.color),
            FillRule::EvenOdd,
            Transform::identity(),
            None,
        );
    }

    /// Stroke an open polyline with round caps and joins.
    pub fn stroke_polyline(&mut self, points: &[Point], width: f32) {
        if points.len() < 2 || width <= 0.0 {
            return;
        }
        let Some(path) = polygon_path(points, false) else {
            return;
        };
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        self.pixmap
            .stroke_path(&path, &solid_paint(self.color), &stroke, Transform::identity(), None);
    }

    /// Fill a disc with a gradient from full strength at `center` to nothing
    /// at `radius`, shaped as `(1 − d/r)^falloff`.
    ///
    /// Overlapping discs keep the stronger coverage instead of stacking.
    pub fn fill_radial(&mut self, center: Point, radius: f32, falloff: f32) {
        if radius <= 0.0 || !radius.is_finite() || !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let stops = (0..=RADIAL_STOPS)
            .map(|i| {
                let t = i as f32 / RADIAL_STOPS as f32;
                let a = (1.0 - t).powf(falloff).clamp(0.0, 1.0);
                GradientStop::new(t, skia_color(self.color, (a * 255.0).round() as u8))
            })
            .collect();
        let origin = tiny_skia::Point::from_xy(center.x, center.y);
        let Some(shader) = RadialGradient::new(
            origin,
            origin,
            radius,
            stops,
            SpreadMode::Pad,
            Transform::identity(),
        ) else {
            return;
        };
        let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) else {
            return;
        };

        if self.scratch.is_none() {
            self.scratch = Pixmap::new(self.pixmap.width(), self.pixmap.height());
        }
        let Some(scratch) = self.scratch.as_mut() else {
            return;
        };
        scratch.fill(tiny_skia::Color::TRANSPARENT);
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = true;
        scratch.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

        // One color per mask, so the channel-wise max is the max coverage.
        for (dst, src) in self.pixmap.data_mut().iter_mut().zip(scratch.data()) {
            *dst = (*dst).max(*src);
        }
    }
}
