//! Built-in looks and named shade palettes.

use crate::layers::{LayerPatch, Preset};
use crate::types::{Category, Color};
use std::collections::BTreeMap;

pub const PRESET_NAMES: [&str; 4] = ["natural", "glamorous", "professional", "evening"];

fn on(intensity: u8) -> LayerPatch {
    LayerPatch {
        enabled: Some(true),
        intensity: Some(intensity),
        ..Default::default()
    }
}

fn on_with(intensity: u8, color: u32) -> LayerPatch {
    LayerPatch {
        color: Some(Color::from_u32(color)),
        ..on(intensity)
    }
}

/// Look up a built-in preset by (case-insensitive) name.
pub fn builtin(name: &str) -> Option<Preset> {
    let name = name.trim().to_ascii_lowercase();
    let layers: Vec<(Category, LayerPatch)> = match name.as_str() {
        "natural" => vec![
            (Category::Foundation, on(25)),
            (Category::Blush, on(20)),
            (Category::Lipstick, on_with(30, 0xF8BBD9)),
            (Category::Eyebrow, on(30)),
        ],
        "glamorous" => vec![
            (Category::Foundation, on(40)),
            (Category::Eyeshadow, on_with(70, 0x663399)),
            (Category::Eyeliner, on(90)),
            (Category::Blush, on(50)),
            (Category::Lipstick, on_with(85, 0xDC143C)),
        ],
        "professional" => vec![
            (Category::Foundation, on(35)),
            (Category::Eyeshadow, on_with(45, 0x8B7355)),
            (Category::Blush, on(30)),
            (Category::Lipstick, on_with(50, 0xD2691E)),
            (Category::Eyebrow, on(40)),
        ],
        "evening" => vec![
            (Category::Foundation, on(45)),
            (Category::Eyeshadow, on_with(80, 0x2F2F2F)),
            (
                Category::Eyeliner,
                LayerPatch {
                    thickness: Some(3),
                    ..on(95)
                },
            ),
            (Category::Blush, on(45)),
            (Category::Lipstick, on_with(90, 0x8B008B)),
        ],
        _ => return None,
    };

    Some(Preset {
        name,
        layers: layers.into_iter().collect::<BTreeMap<_, _>>(),
    })
}

/// Named shades offered for a category.
pub fn palette(category: Category) -> &'static [(&'static str, Color)] {
    const fn c(hex: u32) -> Color {
        Color::from_u32(hex)
    }

    const LIPSTICK: &[(&str, Color)] = &[
        ("Classic Red", c(0xDC143C)),
        ("Cherry Red", c(0xB22222)),
        ("Wine Red", c(0x722F37)),
        ("Rose Pink", c(0xFF69B4)),
        ("Coral Pink", c(0xFF7F50)),
        ("Nude Pink", c(0xF8BBD9)),
        ("Deep Berry", c(0x8B008B)),
        ("Plum Berry", c(0xDDA0DD)),
        ("Coral Orange", c(0xFF6347)),
        ("Nude Brown", c(0xD2691E)),
        ("Purple Mauve", c(0x9370DB)),
        ("Matte Red", c(0x8B0000)),
    ];
    const EYESHADOW: &[(&str, Color)] = &[
        ("Neutral Brown", c(0x8B7355)),
        ("Chocolate", c(0x7B3F00)),
        ("Gold Shimmer", c(0xFFD700)),
        ("Bronze", c(0xCD7F32)),
        ("Silver", c(0xC0C0C0)),
        ("Purple Smoky", c(0x663399)),
        ("Navy Blue", c(0x000080)),
        ("Emerald", c(0x50C878)),
        ("Rose Pink", c(0xFF69B4)),
        ("Black Smoky", c(0x2F2F2F)),
        ("Copper", c(0xB87333)),
        ("Champagne", c(0xF7E7CE)),
    ];
    const BLUSH: &[(&str, Color)] = &[
        ("Natural Pink", c(0xFFB6C1)),
        ("Coral Warm", c(0xFF7F50)),
        ("Peach Soft", c(0xFFCCCB)),
        ("Rose Classic", c(0xFF69B4)),
        ("Berry Bold", c(0xDC143C)),
        ("Apricot Glow", c(0xFBCEB1)),
        ("Mauve Subtle", c(0xE0B0FF)),
        ("Bronze Sun", c(0xCD7F32)),
    ];
    const FOUNDATION: &[(&str, Color)] = &[
        ("Porcelain", c(0xF5E6D3)),
        ("Ivory", c(0xFFFFF0)),
        ("Light Beige", c(0xF5F5DC)),
        ("Medium Beige", c(0xE8C5A0)),
        ("Light Tan", c(0xD2B48C)),
        ("Medium Tan", c(0xD4A574)),
        ("Light Bronze", c(0xCD853F)),
        ("Deep Bronze", c(0x8B4513)),
        ("Espresso", c(0x6F4E37)),
        ("Ebony", c(0x555D50)),
    ];
    const EYELINER: &[(&str, Color)] = &[
        ("Classic Black", c(0x000000)),
        ("Soft Brown", c(0x8B4513)),
        ("Electric Blue", c(0x0080FF)),
        ("Emerald Green", c(0x50C878)),
        ("Purple Plum", c(0x8B008B)),
        ("Gold Metallic", c(0xFFD700)),
        ("Silver Metallic", c(0xC0C0C0)),
        ("Deep Navy", c(0x000080)),
    ];
    const EYEBROW: &[(&str, Color)] = &[
        ("Light Brown", c(0xA0522D)),
        ("Medium Brown", c(0x8B4513)),
        ("Dark Brown", c(0x654321)),
        ("Soft Black", c(0x2F2F2F)),
        ("Auburn", c(0xA52A2A)),
        ("Blonde", c(0xD2B48C)),
        ("Ash Gray", c(0x708090)),
    ];
    const HIGHLIGHTER: &[(&str, Color)] = &[
        ("Champagne", c(0xF7E7CE)),
        ("Gold Shimmer", c(0xFFD700)),
        ("Pearl", c(0xFDEEF4)),
        ("Silver", c(0xC0C0C0)),
    ];
    const CONTOUR: &[(&str, Color)] = &[
        ("Sienna", c(0xA0522D)),
        ("Bronze", c(0xCD7F32)),
        ("Taupe", c(0x8B7355)),
        ("Espresso", c(0x6F4E37)),
    ];

    match category {
        Category::Lipstick => LIPSTICK,
        Category::Eyeshadow => EYESHADOW,
        Category::Blush => BLUSH,
        Category::Foundation => FOUNDATION,
        Category::Eyeliner => EYELINER,
        Category::Eyebrow => EYEBROW,
        Category::Highlighter => HIGHLIGHTER,
        Category::Contour => CONTOUR,
    }
}
