//! Region mapping — landmarks to per-category paint geometry.
//!
//! Geometry depends only on the landmark set and the frame size. Color,
//! intensity and style live in `LayerSettings` and are never consulted here.

use crate::landmarks::*;
use crate::types::{Category, LandmarkSet, Point};

/// Blush radius in pixels. Fixed, not derived from landmarks.
pub const BLUSH_RADIUS_PX: f32 = 40.0;

/// Paint geometry in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Closed polygon, filled.
    Polygon(Vec<Point>),
    /// Radial gradient disc.
    Radial { center: Point, radius: f32 },
    /// Open polyline, stroked.
    Polyline(Vec<Point>),
}

/// Landmark index groups a category needs. Every listed index must be present.
pub fn required_indices(category: Category) -> &'static [&'static [usize]] {
    match category {
        Category::Foundation => &[FACE_OVAL],
        Category::Lipstick => &[UPPER_LIP, LOWER_LIP],
        Category::Eyeshadow => &[RIGHT_UPPER_LID, RIGHT_SOCKET, LEFT_UPPER_LID, LEFT_SOCKET],
        Category::Blush => &[RIGHT_CHEEK, LEFT_CHEEK],
        Category::Eyeliner => &[RIGHT_UPPER_LID, LEFT_UPPER_LID],
        Category::Eyebrow => &[RIGHT_BROW, LEFT_BROW],
        Category::Highlighter => &[NOSE_BRIDGE, RIGHT_CHEEKBONE, LEFT_CHEEKBONE],
        Category::Contour => &[RIGHT_HOLLOW, LEFT_HOLLOW],
    }
}

/// Compute the regions to paint for `category`.
///
/// Returns `None` when the frame has a zero dimension, the landmark set is
/// empty, or any index the category needs is missing.
pub fn region_for(
    category: Category,
    landmarks: &LandmarkSet,
    frame_width: u32,
    frame_height: u32,
) -> Option<Vec<Region>> {
    if frame_width == 0 || frame_height == 0 || landmarks.is_empty() {
        return None;
    }

    let pts = |indices: &[usize]| -> Option<Vec<Point>> {
        indices
            .iter()
            .map(|&i| landmarks.pixel(i, frame_width, frame_height))
            .collect()
    };
    let chain = |a: &[usize], b: &[usize]| -> Option<Vec<Point>> {
        let mut out = pts(a)?;
        out.extend(pts(b)?);
        Some(out)
    };
    let radial = |indices: &[usize]| -> Option<Region> {
        Some(Region::Radial {
            center: centroid(&pts(indices)?)?,
            radius: BLUSH_RADIUS_PX,
        })
    };

    let regions = match category {
        Category::Foundation => vec![Region::Polygon(pts(FACE_OVAL)?)],
        Category::Lipstick => vec![
            Region::Polygon(pts(UPPER_LIP)?),
            Region::Polygon(pts(LOWER_LIP)?),
        ],
        Category::Eyeshadow => vec![
            Region::Polygon(chain(RIGHT_UPPER_LID, RIGHT_SOCKET)?),
            Region::Polygon(chain(LEFT_UPPER_LID, LEFT_SOCKET)?),
        ],
        Category::Blush => vec![radial(RIGHT_CHEEK)?, radial(LEFT_CHEEK)?],
        Category::Eyeliner => vec![
            Region::Polyline(pts(RIGHT_UPPER_LID)?),
            Region::Polyline(pts(LEFT_UPPER_LID)?),
        ],
        Category::Eyebrow => vec![
            Region::Polygon(pts(RIGHT_BROW)?),
            Region::Polygon(pts(LEFT_BROW)?),
        ],
        Category::Highlighter => vec![
            Region::Polygon(pts(NOSE_BRIDGE)?),
            Region::Polygon(pts(RIGHT_CHEEKBONE)?),
            Region::Polygon(pts(LEFT_CHEEKBONE)?),
        ],
        Category::Contour => vec![
            Region::Polygon(pts(RIGHT_HOLLOW)?),
            Region::Polygon(pts(LEFT_HOLLOW)?),
        ],
    };

    Some(regions)
}

fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every mesh index populated, spread over a grid so points are distinct.
    fn full_mesh() -> LandmarkSet {
        LandmarkSet::from_dense(
            (0..MESH_POINTS)
                .map(|i| {
                    let col = (i % 26) as f32;
                    let row = (i / 26) as f32;
                    [0.1 + col * 0.03, 0.1 + row * 0.04]
                })
                .collect(),
        )
    }

    fn only(indices: &[&[usize]]) -> LandmarkSet {
        let mesh = full_mesh();
        LandmarkSet::from_indexed(
            indices
                .iter()
                .flat_map(|g| g.iter())
                .map(|&i| (i, mesh.get(i).unwrap())),
        )
    }

    #[test]
    fn test_every_category_maps_on_full_mesh() {
        let mesh = full_mesh();
        for category in Category::ALL {
            let regions = region_for(category, &mesh, 640, 480).unwrap();
            assert!(!regions.is_empty(), "{category}");
        }
    }

    #[test]
    fn test_region_shapes() {
        let mesh = full_mesh();
        let lips = region_for(Category::Lipstick, &mesh, 640, 480).unwrap();
        assert_eq!(lips.len(), 2);
        assert!(lips.iter().all(|r| matches!(r, Region::Polygon(_))));

        let liner = region_for(Category::Eyeliner, &mesh, 640, 480).unwrap();
        assert!(liner.iter().all(|r| matches!(r, Region::Polyline(p) if p.len() == RIGHT_UPPER_LID.len())));

        let shadow = region_for(Category::Eyeshadow, &mesh, 640, 480).unwrap();
        match &shadow[0] {
            Region::Polygon(p) => assert_eq!(p.len(), RIGHT_UPPER_LID.len() + RIGHT_SOCKET.len()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blush_is_centroid_with_fixed_radius() {
        let cluster: Vec<(usize, [f32; 2])> = RIGHT_CHEEK
            .iter()
            .enumerate()
            .map(|(n, &i)| (i, if n % 2 == 0 { [0.2, 0.5] } else { [0.4, 0.7] }))
            .chain(LEFT_CHEEK.iter().map(|&i| (i, [0.8, 0.5])))
            .collect();
        let set = LandmarkSet::from_indexed(cluster);
        let regions = region_for(Category::Blush, &set, 100, 100).unwrap();
        match regions[0] {
            Region::Radial { center, radius } => {
                assert!((center.x - 30.0).abs() < 1e-3, "{center:?}");
                assert!((center.y - 60.0).abs() < 1e-3, "{center:?}");
                assert_eq!(radius, BLUSH_RADIUS_PX);
            }
            ref other => panic!("unexpected {other:?}"),
        }
        match regions[1] {
            Region::Radial { center, .. } => {
                assert!((center.x - 80.0).abs() < 1e-3 && (center.y - 50.0).abs() < 1e-3);
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_any_required_index_yields_none() {
        for category in Category::ALL {
            let groups = required_indices(category);
            let needed: Vec<usize> = groups.iter().flat_map(|g| g.iter().copied()).collect();
            // Drop each required index in turn.
            for &missing in &needed {
                let mesh = full_mesh();
                let set = LandmarkSet::from_indexed(
                    needed
                        .iter()
                        .filter(|&&i| i != missing)
                        .map(|&i| (i, mesh.get(i).unwrap())),
                );
                assert!(
                    region_for(category, &set, 640, 480).is_none(),
                    "{category} mapped without index {missing}"
                );
            }
        }
    }

    #[test]
    fn test_required_indices_are_sufficient() {
        for category in Category::ALL {
            let set = only(required_indices(category));
            assert!(region_for(category, &set, 640, 480).is_some(), "{category}");
        }
    }

    #[test]
    fn test_empty_inputs_yield_none() {
        let mesh = full_mesh();
        assert!(region_for(Category::Foundation, &LandmarkSet::default(), 640, 480).is_none());
        assert!(region_for(Category::Foundation, &mesh, 0, 480).is_none());
        assert!(region_for(Category::Foundation, &mesh, 640, 0).is_none());
    }

    #[test]
    fn test_coordinates_scale_with_frame() {
        let set = only(&[FACE_OVAL]);
        let small = region_for(Category::Foundation, &set, 100, 100).unwrap();
        let large = region_for(Category::Foundation, &set, 200, 200).unwrap();
        match (&small[0], &large[0]) {
            (Region::Polygon(a), Region::Polygon(b)) => {
                for (p, q) in a.iter().zip(b) {
                    assert!((q.x - 2.0 * p.x).abs() < 1e-3);
                    assert!((q.y - 2.0 * p.y).abs() < 1e-3);
                }
            }
            _ => panic!("foundation should be a polygon"),
        }
    }
}
