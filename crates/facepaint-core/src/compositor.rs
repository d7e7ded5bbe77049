//! Overlay compositor — paints enabled makeup layers over a video frame.

use crate::layers::{BlushStyle, LayerParams, LayerSettings, LinerStyle, MakeupLayer};
use crate::raster;
use crate::regions::{self, Region};
use crate::types::{Category, LandmarkSet, Point};
use image::RgbImage;

/// Fixed paint order, base to detail. Not data-driven.
pub const Z_ORDER: [Category; 8] = [
    Category::Foundation,
    Category::Contour,
    Category::Highlighter,
    Category::Blush,
    Category::Eyeshadow,
    Category::Eyeliner,
    Category::Eyebrow,
    Category::Lipstick,
];

/// Wing offset for winged eyeliner, pointing away from the face midline.
const WING_DX: f32 = 15.0;
const WING_DY: f32 = -8.0;

/// Render one overlay tick into `surface`.
///
/// Copies `frame` into `surface` (resizing it if needed), then paints every
/// enabled category in [`Z_ORDER`]. Categories whose regions cannot be
/// computed are skipped. Returns the number of layers painted. A frame with
/// a zero dimension leaves `surface` untouched.
pub fn render(
    surface: &mut RgbImage,
    frame: &RgbImage,
    landmarks: &LandmarkSet,
    settings: &LayerSettings,
) -> usize {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return 0;
    }

    let Some(mut canvas) = raster::Canvas::from_image(frame) else {
        tracing::warn!(width, height, "frame too large to composite");
        return 0;
    };

    let mut painted = 0;
    for category in Z_ORDER {
        let layer = settings.layer(category);
        if !layer.enabled {
            continue;
        }
        let Some(regions) = regions::region_for(category, landmarks, width, height) else {
            tracing::trace!(%category, "regions unavailable; skipping layer");
            continue;
        };
        paint_layer(&mut canvas, layer, &regions);
        painted += 1;
    }
    canvas.write_to(surface);
    painted
}

/// Alpha for a layer: intensity/100, scaled by foundation coverage.
fn layer_alpha(layer: &MakeupLayer) -> f32 {
    let scale = match layer.params {
        LayerParams::Foundation { coverage } => coverage.alpha_scale(),
        _ => 1.0,
    };
    (layer.alpha() * scale).clamp(0.0, 1.0)
}

/// Rasterize every region of `layer` into one mask, then blend it once.
fn paint_layer(canvas: &mut raster::Canvas, layer: &MakeupLayer, regions: &[Region]) {
    let alpha = layer_alpha(layer);
    if alpha <= 0.0 {
        return;
    }
    let Some(mut mask) = raster::LayerMask::new(canvas.width(), canvas.height(), layer.color) else {
        return;
    };

    let falloff = match layer.params {
        LayerParams::Blush { style } => style.falloff(),
        _ => BlushStyle::default().falloff(),
    };
    let (liner_width, liner_style) = match layer.params {
        LayerParams::Eyeliner { thickness, style } => {
            let w = f32::from(thickness);
            (if style == LinerStyle::Dramatic { w * 2.0 } else { w }, style)
        }
        _ => (2.0, LinerStyle::Classic),
    };
    let midline = liner_midline(regions);

    for region in regions {
        match region {
            Region::Polygon(points) => mask.fill_polygon(points),
            Region::Radial { center, radius } => mask.fill_radial(*center, *radius, falloff),
            Region::Polyline(points) if liner_style == LinerStyle::Winged => {
                mask.stroke_polyline(&with_wing(points, midline), liner_width)
            }
            Region::Polyline(points) => mask.stroke_polyline(points, liner_width),
        }
    }
    canvas.composite(&mask, alpha);
}

/// Mean x of every polyline point; separates the two eyes.
fn liner_midline(regions: &[Region]) -> f32 {
    let (sum, n) = regions
        .iter()
        .filter_map(|r| match r {
            Region::Polyline(p) => Some(p),
            _ => None,
        })
        .flatten()
        .fold((0.0f32, 0usize), |(s, n), p| (s + p.x, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f32
    }
}

/// Extend a lid line with a wing from its outer corner.
fn with_wing(points: &[Point], midline: f32) -> Vec<Point> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return points.to_vec();
    };
    let mut out = points.to_vec();
    if (first.x - midline).abs() > (last.x - midline).abs() {
        let dir = (first.x - midline).signum();
        out.insert(0, Point::new(first.x + dir * WING_DX, first.y + WING_DY));
    } else {
        let dir = (last.x - midline).signum();
        out.push(Point::new(last.x + dir * WING_DX, last.y + WING_DY));
    }
    out
}
