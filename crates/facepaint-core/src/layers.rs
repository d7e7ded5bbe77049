//! Makeup layer settings — one layer per category, mutated through intents.
//!
//! `LayerSettings` is the single source of truth the compositor reads on every
//! tick. Every mutation is synchronous; there is no batching at this level.

use crate::types::{Category, Color};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const MAX_INTENSITY: u8 = 100;
pub const MIN_LINER_THICKNESS: u8 = 1;
pub const MAX_LINER_THICKNESS: u8 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{category} has no {field} parameter")]
    NotApplicable {
        category: Category,
        field: &'static str,
    },
    #[error("invalid {category} style: {value}")]
    InvalidStyle { category: Category, value: String },
    #[error("{category} layer cannot carry {kind} parameters")]
    ParamsMismatch { category: Category, kind: &'static str },
}

/// Foundation coverage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    Light,
    #[default]
    Medium,
    Full,
    Heavy,
}

impl Coverage {
    /// Multiplier applied to the layer alpha.
    pub fn alpha_scale(self) -> f32 {
        match self {
            Coverage::Light => 0.5,
            Coverage::Medium => 1.0,
            Coverage::Full => 1.5,
            Coverage::Heavy => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LipFinish {
    #[default]
    Matte,
    Glossy,
    Metallic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeshadowBlend {
    #[default]
    Gradient,
    Smoky,
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlushStyle {
    #[default]
    Natural,
    Dramatic,
    Subtle,
}

impl BlushStyle {
    /// Exponent of the radial falloff `(1 - d/r)^k`.
    pub fn falloff(self) -> f32 {
        match self {
            BlushStyle::Natural => 0.8,
            BlushStyle::Dramatic => 0.6,
            BlushStyle::Subtle => 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinerStyle {
    #[default]
    Classic,
    Winged,
    Dramatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowStyle {
    #[default]
    Natural,
    Defined,
    Bold,
}

/// Category-specific layer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerParams {
    Plain,
    Foundation { coverage: Coverage },
    Lipstick { finish: LipFinish },
    Eyeshadow { blend_mode: EyeshadowBlend },
    Blush { style: BlushStyle },
    Eyeliner { thickness: u8, style: LinerStyle },
    Eyebrow { style: BrowStyle },
}

impl LayerParams {
    /// Default parameters for a category.
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Foundation => LayerParams::Foundation {
                coverage: Coverage::default(),
            },
            Category::Lipstick => LayerParams::Lipstick {
                finish: LipFinish::default(),
            },
            Category::Eyeshadow => LayerParams::Eyeshadow {
                blend_mode: EyeshadowBlend::default(),
            },
            Category::Blush => LayerParams::Blush {
                style: BlushStyle::default(),
            },
            Category::Eyeliner => LayerParams::Eyeliner {
                thickness: 2,
                style: LinerStyle::default(),
            },
            Category::Eyebrow => LayerParams::Eyebrow {
                style: BrowStyle::default(),
            },
            Category::Highlighter | Category::Contour => LayerParams::Plain,
        }
    }

    /// The `kind` tag as it appears in JSON.
    pub fn kind(&self) -> &'static str {
        match self {
            LayerParams::Plain => "plain",
            LayerParams::Foundation { .. } => "foundation",
            LayerParams::Lipstick { .. } => "lipstick",
            LayerParams::Eyeshadow { .. } => "eyeshadow",
            LayerParams::Blush { .. } => "blush",
            LayerParams::Eyeliner { .. } => "eyeliner",
            LayerParams::Eyebrow { .. } => "eyebrow",
        }
    }

    /// True when these parameters belong to `category`.
    pub fn fits(&self, category: Category) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&LayerParams::default_for(category))
    }
}

/// One category's makeup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeupLayer {
    pub enabled: bool,
    pub color: Color,
    /// 0–100.
    pub intensity: u8,
    #[serde(flatten)]
    pub params: LayerParams,
}

impl MakeupLayer {
    fn new(category: Category, color: u32, intensity: u8) -> Self {
        Self {
            enabled: false,
            color: Color::from_u32(color),
            intensity,
            params: LayerParams::default_for(category),
        }
    }

    /// Drawing alpha derived from intensity, in [0, 1].
    pub fn alpha(&self) -> f32 {
        f32::from(self.intensity.min(MAX_INTENSITY)) / f32::from(MAX_INTENSITY)
    }
}

/// Partial layer update. Only the fields that are `Some` are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<LipFinish>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blend_mode: Option<EyeshadowBlend>,
    /// Style name, interpreted per category (blush, eyeliner, eyebrow).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl LayerPatch {
    /// Merge this patch into `layer`, returning the updated copy.
    ///
    /// Validation happens before anything is written, so a failed patch
    /// leaves the caller's layer untouched.
    fn merged_into(&self, category: Category, layer: &MakeupLayer) -> Result<MakeupLayer, SettingsError> {
        let mut out = *layer;
        if let Some(enabled) = self.enabled {
            out.enabled = enabled;
        }
        if let Some(color) = self.color {
            out.color = color;
        }
        if let Some(intensity) = self.intensity {
            out.intensity = intensity.min(MAX_INTENSITY);
        }

        let not_applicable = |field| SettingsError::NotApplicable { category, field };

        match &mut out.params {
            LayerParams::Foundation { coverage } => {
                if let Some(c) = self.coverage {
                    *coverage = c;
                }
            }
            LayerParams::Lipstick { finish } => {
                if let Some(f) = self.finish {
                    *finish = f;
                }
            }
            LayerParams::Eyeshadow { blend_mode } => {
                if let Some(b) = self.blend_mode {
                    *blend_mode = b;
                }
            }
            LayerParams::Blush { style } => {
                if let Some(s) = &self.style {
                    *style = parse_style(category, s)?;
                }
            }
            LayerParams::Eyeliner { thickness, style } => {
                if let Some(t) = self.thickness {
                    *thickness = t.clamp(MIN_LINER_THICKNESS, MAX_LINER_THICKNESS);
                }
                if let Some(s) = &self.style {
                    *style = parse_style(category, s)?;
                }
            }
            LayerParams::Eyebrow { style } => {
                if let Some(s) = &self.style {
                    *style = parse_style(category, s)?;
                }
            }
            LayerParams::Plain => {}
        }

        // Reject fields the category does not carry.
        let params = out.params;
        if self.coverage.is_some() && !matches!(params, LayerParams::Foundation { .. }) {
            return Err(not_applicable("coverage"));
        }
        if self.finish.is_some() && !matches!(params, LayerParams::Lipstick { .. }) {
            return Err(not_applicable("finish"));
        }
        if self.blend_mode.is_some() && !matches!(params, LayerParams::Eyeshadow { .. }) {
            return Err(not_applicable("blend_mode"));
        }
        if self.thickness.is_some() && !matches!(params, LayerParams::Eyeliner { .. }) {
            return Err(not_applicable("thickness"));
        }
        if self.style.is_some()
            && !matches!(
                params,
                LayerParams::Blush { .. } | LayerParams::Eyeliner { .. } | LayerParams::Eyebrow { .. }
            )
        {
            return Err(not_applicable("style"));
        }

        Ok(out)
    }
}

fn parse_style<T: serde::de::DeserializeOwned>(category: Category, value: &str) -> Result<T, SettingsError> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase())).map_err(|_| {
        SettingsError::InvalidStyle {
            category,
            value: value.to_string(),
        }
    })
}

/// A named partial settings object. Only the listed categories are touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub name: String,
    pub layers: BTreeMap<Category, LayerPatch>,
}

/// A UI intent against the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsIntent {
    Toggle(Category),
    SetColor(Category, Color),
    SetIntensity(Category, u8),
    SetParams(Category, LayerPatch),
    ApplyPreset(Preset),
    ClearAll,
}

/// Complete makeup configuration: exactly one layer per category.
///
/// Deserialization rejects a layer whose params belong to another category
/// and clamps intensity and liner thickness into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayerSettingsRepr")]
pub struct LayerSettings {
    pub foundation: MakeupLayer,
    pub lipstick: MakeupLayer,
    pub eyeshadow: MakeupLayer,
    pub blush: MakeupLayer,
    pub eyeliner: MakeupLayer,
    pub eyebrow: MakeupLayer,
    pub highlighter: MakeupLayer,
    pub contour: MakeupLayer,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            foundation: MakeupLayer::new(Category::Foundation, 0xE8C5A0, 30),
            lipstick: MakeupLayer::new(Category::Lipstick, 0xDC143C, 80),
            eyeshadow: MakeupLayer::new(Category::Eyeshadow, 0x8B7355, 60),
            blush: MakeupLayer::new(Category::Blush, 0xFFB6C1, 40),
            eyeliner: MakeupLayer::new(Category::Eyeliner, 0x000000, 90),
            eyebrow: MakeupLayer::new(Category::Eyebrow, 0x8B4513, 50),
            highlighter: MakeupLayer::new(Category::Highlighter, 0xF7E7CE, 40),
            contour: MakeupLayer::new(Category::Contour, 0xA0522D, 30),
        }
    }
}

#[derive(Deserialize)]
struct LayerSettingsRepr {
    foundation: MakeupLayer,
    lipstick: MakeupLayer,
    eyeshadow: MakeupLayer,
    blush: MakeupLayer,
    eyeliner: MakeupLayer,
    eyebrow: MakeupLayer,
    highlighter: MakeupLayer,
    contour: MakeupLayer,
}

impl TryFrom<LayerSettingsRepr> for LayerSettings {
    type Error = SettingsError;

    fn try_from(raw: LayerSettingsRepr) -> Result<Self, Self::Error> {
        let mut settings = LayerSettings {
            foundation: raw.foundation,
            lipstick: raw.lipstick,
            eyeshadow: raw.eyeshadow,
            blush: raw.blush,
            eyeliner: raw.eyeliner,
            eyebrow: raw.eyebrow,
            highlighter: raw.highlighter,
            contour: raw.contour,
        };
        settings.validate()?;
        for category in Category::ALL {
            let layer = settings.layer_mut(category);
            layer.intensity = layer.intensity.min(MAX_INTENSITY);
            if let LayerParams::Eyeliner { thickness, .. } = &mut layer.params {
                *thickness = (*thickness).clamp(MIN_LINER_THICKNESS, MAX_LINER_THICKNESS);
            }
        }
        Ok(settings)
    }
}

impl LayerSettings {
    /// Check that every layer carries its own category's params.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for category in Category::ALL {
            let params = &self.layer(category).params;
            if !params.fits(category) {
                return Err(SettingsError::ParamsMismatch {
                    category,
                    kind: params.kind(),
                });
            }
        }
        Ok(())
    }

    pub fn layer(&self, category: Category) -> &MakeupLayer {
        match category {
            Category::Foundation => &self.foundation,
            Category::Lipstick => &self.lipstick,
            Category::Eyeshadow => &self.eyeshadow,
            Category::Blush => &self.blush,
            Category::Eyeliner => &self.eyeliner,
            Category::Eyebrow => &self.eyebrow,
            Category::Highlighter => &self.highlighter,
            Category::Contour => &self.contour,
        }
    }

    fn layer_mut(&mut self, category: Category) -> &mut MakeupLayer {
        match category {
            Category::Foundation => &mut self.foundation,
            Category::Lipstick => &mut self.lipstick,
            Category::Eyeshadow => &mut self.eyeshadow,
            Category::Blush => &mut self.blush,
            Category::Eyeliner => &mut self.eyeliner,
            Category::Eyebrow => &mut self.eyebrow,
            Category::Highlighter => &mut self.highlighter,
            Category::Contour => &mut self.contour,
        }
    }

    /// Flip `enabled` for one category. Returns the new state.
    pub fn toggle(&mut self, category: Category) -> bool {
        let layer = self.layer_mut(category);
        layer.enabled = !layer.enabled;
        layer.enabled
    }

    pub fn set_color(&mut self, category: Category, color: Color) {
        self.layer_mut(category).color = color;
    }

    /// Set intensity, clamped to 0–100.
    pub fn set_intensity(&mut self, category: Category, value: u8) {
        self.layer_mut(category).intensity = value.min(MAX_INTENSITY);
    }

    /// Merge a partial update into one category.
    pub fn set_params(&mut self, category: Category, patch: &LayerPatch) -> Result<(), SettingsError> {
        let merged = patch.merged_into(category, self.layer(category))?;
        *self.layer_mut(category) = merged;
        Ok(())
    }

    /// Shallow per-category merge of a preset.
    ///
    /// Categories absent from the preset are left exactly as they were. The
    /// preset is validated in full before any category is written.
    pub fn apply_preset(&mut self, preset: &Preset) -> Result<(), SettingsError> {
        let mut staged = Vec::with_capacity(preset.layers.len());
        for (&category, patch) in &preset.layers {
            staged.push((category, patch.merged_into(category, self.layer(category))?));
        }
        for (category, layer) in staged {
            *self.layer_mut(category) = layer;
        }
        Ok(())
    }

    /// Disable every category, keeping colors, intensities and params.
    pub fn clear_all(&mut self) {
        for category in Category::ALL {
            self.layer_mut(category).enabled = false;
        }
    }

    /// Apply one UI intent.
    pub fn dispatch(&mut self, intent: SettingsIntent) -> Result<(), SettingsError> {
        match intent {
            SettingsIntent::Toggle(c) => {
                self.toggle(c);
            }
            SettingsIntent::SetColor(c, color) => self.set_color(c, color),
            SettingsIntent::SetIntensity(c, v) => self.set_intensity(c, v),
            SettingsIntent::SetParams(c, patch) => self.set_params(c, &patch)?,
            SettingsIntent::ApplyPreset(preset) => self.apply_preset(&preset)?,
            SettingsIntent::ClearAll => self.clear_all(),
        }
        Ok(())
    }

    /// Categories currently enabled, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(move |&c| self.layer(c).enabled)
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lipstick_preset() -> Preset {
        let mut layers = BTreeMap::new();
        layers.insert(
            Category::Lipstick,
            LayerPatch {
                enabled: Some(true),
                color: Some(Color::from_u32(0x8B008B)),
                intensity: Some(90),
                ..Default::default()
            },
        );
        Preset {
            name: "lips".into(),
            layers,
        }
    }

    #[test]
    fn test_defaults_all_disabled() {
        let s = LayerSettings::default();
        assert!(!s.any_enabled());
        assert_eq!(s.lipstick.color, Color::from_u32(0xDC143C));
        assert_eq!(s.lipstick.intensity, 80);
        assert_eq!(
            s.eyeliner.params,
            LayerParams::Eyeliner {
                thickness: 2,
                style: LinerStyle::Classic
            }
        );
    }

    #[test]
    fn test_toggle_flips() {
        let mut s = LayerSettings::default();
        assert!(s.toggle(Category::Blush));
        assert!(s.blush.enabled);
        assert!(!s.toggle(Category::Blush));
        assert!(!s.blush.enabled);
    }

    #[test]
    fn test_intensity_clamped() {
        let mut s = LayerSettings::default();
        s.set_intensity(Category::Contour, 250);
        assert_eq!(s.contour.intensity, 100);
        assert_eq!(s.contour.alpha(), 1.0);
        s.set_intensity(Category::Contour, 0);
        assert_eq!(s.contour.alpha(), 0.0);
    }

    #[test]
    fn test_apply_preset_leaves_other_categories_unchanged() {
        let mut s = LayerSettings::default();
        s.set_color(Category::Blush, Color::from_u32(0x123456));
        s.toggle(Category::Eyeliner);
        let before = s;

        s.apply_preset(&lipstick_preset()).unwrap();

        for category in Category::ALL {
            if category == Category::Lipstick {
                continue;
            }
            assert_eq!(s.layer(category), before.layer(category), "{category} changed");
        }
        assert!(s.lipstick.enabled);
        assert_eq!(s.lipstick.color, Color::from_u32(0x8B008B));
        assert_eq!(s.lipstick.intensity, 90);
        // Fields not named by the preset survive the merge.
        assert_eq!(s.lipstick.params, before.lipstick.params);
    }

    #[test]
    fn test_apply_preset_is_all_or_nothing() {
        let mut s = LayerSettings::default();
        let mut preset = lipstick_preset();
        preset.layers.insert(
            Category::Blush,
            LayerPatch {
                thickness: Some(3),
                ..Default::default()
            },
        );
        let before = s;
        let err = s.apply_preset(&preset).unwrap_err();
        assert_eq!(
            err,
            SettingsError::NotApplicable {
                category: Category::Blush,
                field: "thickness"
            }
        );
        assert_eq!(s, before);
    }

    #[test]
    fn test_clear_all_then_toggle_restores_previous_look() {
        let mut s = LayerSettings::default();
        s.set_color(Category::Blush, Color::from_u32(0xFF7F50));
        s.set_intensity(Category::Blush, 65);
        s.toggle(Category::Blush);
        s.toggle(Category::Lipstick);

        s.clear_all();
        assert!(!s.any_enabled());

        s.toggle(Category::Blush);
        assert!(s.blush.enabled);
        assert_eq!(s.blush.color, Color::from_u32(0xFF7F50));
        assert_eq!(s.blush.intensity, 65);
        assert!(!s.lipstick.enabled);
    }

    #[test]
    fn test_set_params_styles() {
        let mut s = LayerSettings::default();
        s.set_params(
            Category::Eyeliner,
            &LayerPatch {
                thickness: Some(9),
                style: Some("Winged".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            s.eyeliner.params,
            LayerParams::Eyeliner {
                thickness: MAX_LINER_THICKNESS,
                style: LinerStyle::Winged
            }
        );

        let err = s
            .set_params(
                Category::Eyebrow,
                &LayerPatch {
                    style: Some("spiky".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidStyle { .. }));
    }

    #[test]
    fn test_dispatch_intents() {
        let mut s = LayerSettings::default();
        s.dispatch(SettingsIntent::Toggle(Category::Eyebrow)).unwrap();
        s.dispatch(SettingsIntent::SetColor(Category::Eyebrow, Color::from_u32(0x2F2F2F)))
            .unwrap();
        s.dispatch(SettingsIntent::SetIntensity(Category::Eyebrow, 70)).unwrap();
        assert!(s.eyebrow.enabled);
        assert_eq!(s.eyebrow.color, Color::from_u32(0x2F2F2F));
        assert_eq!(s.eyebrow.intensity, 70);
        s.dispatch(SettingsIntent::ClearAll).unwrap();
        assert!(!s.eyebrow.enabled);
    }

    #[test]
    fn test_settings_json_shape() {
        let s = LayerSettings::default();
        let v = serde_json::to_value(s).unwrap();
        assert_eq!(v["eyeliner"]["thickness"], 2);
        assert_eq!(v["eyeliner"]["style"], "classic");
        assert_eq!(v["lipstick"]["color"], "#DC143C");
        let back: LayerSettings = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_settings_json_rejects_foreign_params() {
        let mut v = serde_json::to_value(LayerSettings::default()).unwrap();
        v["lipstick"]["kind"] = "eyeliner".into();
        v["lipstick"]["thickness"] = 3.into();
        v["lipstick"]["style"] = "winged".into();
        let err = serde_json::from_value::<LayerSettings>(v).unwrap_err();
        assert!(err.to_string().contains("lipstick layer cannot carry eyeliner"), "{err}");

        let mut v = serde_json::to_value(LayerSettings::default()).unwrap();
        v["contour"]["kind"] = "foundation".into();
        v["contour"]["coverage"] = "full".into();
        assert!(serde_json::from_value::<LayerSettings>(v).is_err());
    }

    #[test]
    fn test_settings_json_clamps_ranges() {
        let mut v = serde_json::to_value(LayerSettings::default()).unwrap();
        v["blush"]["intensity"] = 250.into();
        v["eyeliner"]["thickness"] = 9.into();
        let s: LayerSettings = serde_json::from_value(v).unwrap();
        assert_eq!(s.blush.intensity, 100);
        assert!(matches!(s.eyeliner.params, LayerParams::Eyeliner { thickness: 5, .. }));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_preset_json_parses_category_keys() {
        let json = r##"{"name":"x","layers":{"eyeliner":{"enabled":true,"thickness":3}}}"##;
        let preset: Preset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.layers.len(), 1);
        assert_eq!(preset.layers[&Category::Eyeliner].thickness, Some(3));
    }
}
