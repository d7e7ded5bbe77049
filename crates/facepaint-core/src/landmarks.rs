//! Landmark index table.
//!
//! Maps each makeup region to the detector indices that outline it. Indices
//! follow the 468-point face mesh topology. If the detector's indexing changes,
//! only this table changes; bump `LANDMARK_SCHEME_VERSION` with it.

pub const LANDMARK_SCHEME_VERSION: u32 = 1;

/// Number of points in the mesh this table indexes into.
pub const MESH_POINTS: usize = 468;

/// Face oval, clockwise from the top of the forehead.
pub const FACE_OVAL: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Upper lip: outer edge left→right, then inner edge right→left.
pub const UPPER_LIP: &[usize] = &[
    61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 308, 415, 310, 311, 312, 13, 82, 81, 80, 191,
    78,
];

/// Lower lip: outer edge left→right, then inner edge right→left.
pub const LOWER_LIP: &[usize] = &[
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 308, 324, 318, 402, 317, 14, 87, 178, 88,
    95, 78,
];

/// Upper eyelid arcs, outer corner → inner corner for the right eye and
/// inner → outer for the left eye (image-space left/right).
pub const RIGHT_UPPER_LID: &[usize] = &[33, 246, 161, 160, 159, 158, 157, 173, 133];
pub const LEFT_UPPER_LID: &[usize] = &[362, 398, 384, 385, 386, 387, 388, 466, 263];

/// Eye socket boundary below the brow, ordered to close the lid arc.
pub const RIGHT_SOCKET: &[usize] = &[189, 221, 222, 223, 224, 225, 113];
pub const LEFT_SOCKET: &[usize] = &[342, 445, 444, 443, 442, 441, 413];

/// Brow outline: upper edge then lower edge reversed.
pub const RIGHT_BROW: &[usize] = &[156, 70, 63, 105, 66, 107, 55, 193, 65, 52, 53, 46, 124, 35];
pub const LEFT_BROW: &[usize] = &[383, 300, 293, 334, 296, 336, 285, 417, 295, 282, 283, 276, 353, 265];

/// Cheek clusters; blush is centered on their centroids.
pub const RIGHT_CHEEK: &[usize] = &[
    116, 117, 118, 119, 120, 121, 126, 142, 36, 205, 206, 207, 213, 192, 147, 187,
];
pub const LEFT_CHEEK: &[usize] = &[
    345, 346, 347, 348, 349, 350, 355, 371, 266, 425, 426, 427, 436, 416, 376, 411,
];

/// Highlighter: nose bridge strip and cheekbone ridges.
pub const NOSE_BRIDGE: &[usize] = &[168, 417, 351, 419, 197, 196, 122, 193];
pub const RIGHT_CHEEKBONE: &[usize] = &[116, 117, 118, 101, 50, 123];
pub const LEFT_CHEEKBONE: &[usize] = &[345, 346, 347, 330, 280, 352];

/// Contour: hollows below the cheekbones.
pub const RIGHT_HOLLOW: &[usize] = &[234, 227, 116, 123, 147, 213, 138, 215, 177, 93];
pub const LEFT_HOLLOW: &[usize] = &[454, 447, 345, 352, 376, 433, 367, 435, 401, 323];

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TABLES: &[&[usize]] = &[
        FACE_OVAL,
        UPPER_LIP,
        LOWER_LIP,
        RIGHT_UPPER_LID,
        LEFT_UPPER_LID,
        RIGHT_SOCKET,
        LEFT_SOCKET,
        RIGHT_BROW,
        LEFT_BROW,
        RIGHT_CHEEK,
        LEFT_CHEEK,
        NOSE_BRIDGE,
        RIGHT_CHEEKBONE,
        LEFT_CHEEKBONE,
        RIGHT_HOLLOW,
        LEFT_HOLLOW,
    ];

    #[test]
    fn test_indices_within_mesh() {
        for table in ALL_TABLES {
            assert!(table.iter().all(|&i| i < MESH_POINTS), "{table:?}");
        }
    }

    #[test]
    fn test_polygons_have_area() {
        for table in ALL_TABLES {
            assert!(table.len() >= 3);
        }
    }
}
