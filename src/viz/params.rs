// Visual parameter model: the resolved per-blob record, the strongly typed
// override set read from segment files / config / live pushes, and the named
// presets (home regions, spacing distances, growth patterns).
//
// Every override field is optional and parsed leniently: a value of the wrong
// type is dropped field-by-field so the compiled-in default wins instead of
// the whole record failing.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Size scales at or below this are treated as degenerate.
pub const MIN_SIZE_SCALE: f64 = 0.1;

// ── Growth pattern ──────────────────────────────────────────────────────────

/// Monotonic family mapping audio level to a strength gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthPattern {
    #[default]
    Linear,
    Exponential,
    Logarithmic,
    Sine,
}

impl GrowthPattern {
    /// Parse a pattern tag. `"steady"` is the legacy name for linear growth.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "linear" | "steady" => Some(Self::Linear),
            "exponential" | "exp" => Some(Self::Exponential),
            "logarithmic" | "log" => Some(Self::Logarithmic),
            "sine" | "sin" | "wave" => Some(Self::Sine),
            _ => None,
        }
    }

    /// Gain multiplier for `level` in [0, 1]; `gain` is the volume-impact
    /// factor. Every branch returns 1.0 at silence and grows with level.
    pub fn response(self, level: f64, gain: f64) -> f64 {
        let l = level.clamp(0.0, 1.0);
        let shaped = match self {
            Self::Linear => l,
            Self::Exponential => ((3.0 * l).exp() - 1.0) / (3.0f64.exp() - 1.0),
            Self::Logarithmic => (1.0 + 9.0 * l).ln() / 10.0f64.ln(),
            Self::Sine => (l * std::f64::consts::FRAC_PI_2).sin(),
        };
        1.0 + shaped * gain.max(0.0)
    }
}

// ── Home regions ────────────────────────────────────────────────────────────

/// Named canvas zone a blob is tethered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HomeRegion {
    #[default]
    Center,
    CenterLeft,
    CenterRight,
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl HomeRegion {
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['_', ' '], "-");
        let region = match normalized.as_str() {
            "center" | "centre" | "middle" | "מרכז" => Self::Center,
            "center-left" | "left-center" | "מרכז-שמאל" => Self::CenterLeft,
            "center-right" | "right-center" | "מרכז-ימין" => Self::CenterRight,
            "left" | "שמאל" => Self::Left,
            "right" | "ימין" => Self::Right,
            "top" | "top-center" | "למעלה" => Self::Top,
            "bottom" | "bottom-center" | "למטה" => Self::Bottom,
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            _ => return None,
        };
        Some(region)
    }

    /// Default zone for a speaker slot: first speaker left, second right.
    pub fn for_slot(slot: usize) -> Self {
        match slot {
            0 => Self::CenterLeft,
            1 => Self::CenterRight,
            _ => Self::Center,
        }
    }

    /// Anchor point as fractions of canvas width/height.
    pub fn fraction(self) -> (f64, f64) {
        match self {
            Self::Center => (0.5, 0.5),
            Self::CenterLeft => (0.33, 0.5),
            Self::CenterRight => (0.67, 0.5),
            Self::Left => (0.2, 0.5),
            Self::Right => (0.8, 0.5),
            Self::Top => (0.5, 0.25),
            Self::Bottom => (0.5, 0.75),
            Self::TopLeft => (0.25, 0.25),
            Self::TopRight => (0.75, 0.25),
            Self::BottomLeft => (0.25, 0.75),
            Self::BottomRight => (0.75, 0.75),
        }
    }

    pub fn anchor(self, width: f64, height: f64) -> (f64, f64) {
        let (fx, fy) = self.fraction();
        (fx * width, fy * height)
    }
}

// ── Spacing ─────────────────────────────────────────────────────────────────

/// Minimum inter-blob spacing: a named preset or a raw pixel distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SpacingSetting {
    Preset(String),
    Pixels(f64),
}

impl SpacingSetting {
    pub const DEFAULT_PIXELS: f64 = 200.0;

    /// Pixel distance for a preset name, `None` when the name is unknown.
    pub fn preset_pixels(name: &str) -> Option<f64> {
        let px = match name.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "very close" | "veryclose" => 60.0,
            "close" => 120.0,
            "middle" | "medium" => 200.0,
            "far" => 280.0,
            "farest" | "farthest" | "very far" => 360.0,
            _ => return None,
        };
        Some(px)
    }

    /// Resolve to pixels; unknown presets and bad numbers fall back to the
    /// default distance.
    pub fn resolve(&self) -> f64 {
        match self {
            Self::Pixels(px) if px.is_finite() && *px >= 0.0 => *px,
            Self::Pixels(px) => {
                tracing::warn!(value = *px, "invalid minBlobSpacing, using default");
                Self::DEFAULT_PIXELS
            }
            Self::Preset(name) => Self::preset_pixels(name).unwrap_or_else(|| {
                tracing::warn!(preset = %name, "unknown minBlobSpacing preset, using default");
                Self::DEFAULT_PIXELS
            }),
        }
    }
}

// ── Resolved parameters ─────────────────────────────────────────────────────

/// Fully resolved visual parameters of one blob. `Blob` keeps a target and a
/// current copy of this record; the simulator eases current toward target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualParams {
    pub strength: f64,
    pub size_scale: f64,
    pub volume_impact: f64,
    pub spread: f64,
    pub motion_range: f64,
    pub breathing_speed: f64,
    pub gradient_strength: f64,
    pub blobiness: f64,
    pub blur: f64,
    pub humor: f64,
    pub shine: f64,
    pub spacing_distance: f64,
    pub density: f64,
    pub growth_pattern: GrowthPattern,
    pub visible: bool,
}

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            strength: 400.0,
            size_scale: 4.0,
            volume_impact: 800.0,
            spread: 2.0,
            motion_range: 60.0,
            breathing_speed: 1.0,
            gradient_strength: 1.5,
            blobiness: 3.0,
            blur: 0.0,
            humor: 0.0,
            shine: 0.0,
            spacing_distance: SpacingSetting::DEFAULT_PIXELS,
            density: 1.0,
            growth_pattern: GrowthPattern::Linear,
            visible: true,
        }
    }
}

impl VisualParams {
    /// Apply every present override on top of `self`, then sanitize.
    pub fn with_overrides(&self, set: &VisualParameterSet) -> Self {
        let mut out = self.clone();
        let numeric = [
            (&mut out.strength, set.strength),
            (&mut out.size_scale, set.size_scale),
            (&mut out.volume_impact, set.volume_impact),
            (&mut out.spread, set.spread),
            (&mut out.motion_range, set.motion_range),
            (&mut out.breathing_speed, set.breathing_speed),
            (&mut out.gradient_strength, set.gradient_strength),
            (&mut out.blobiness, set.blobiness),
            (&mut out.blur, set.blur),
            (&mut out.humor, set.humor),
            (&mut out.shine, set.shine),
            (&mut out.density, set.density),
        ];
        for (field, value) in numeric {
            if let Some(v) = value {
                *field = v;
            }
        }
        if let Some(ref spacing) = set.min_blob_spacing {
            out.spacing_distance = spacing.resolve();
        }
        if let Some(pattern) = set.growth_pattern {
            out.growth_pattern = pattern;
        }
        if let Some(visible) = set.visible {
            out.visible = visible;
        }
        out.sanitized(self)
    }

    /// Replace non-finite values with `fallback`'s and clamp the fields the
    /// renderer divides by or exponentiates with.
    pub fn sanitized(mut self, fallback: &VisualParams) -> Self {
        let pairs = [
            (&mut self.strength, fallback.strength),
            (&mut self.size_scale, fallback.size_scale),
            (&mut self.volume_impact, fallback.volume_impact),
            (&mut self.spread, fallback.spread),
            (&mut self.motion_range, fallback.motion_range),
            (&mut self.breathing_speed, fallback.breathing_speed),
            (&mut self.gradient_strength, fallback.gradient_strength),
            (&mut self.blobiness, fallback.blobiness),
            (&mut self.blur, fallback.blur),
            (&mut self.humor, fallback.humor),
            (&mut self.shine, fallback.shine),
            (&mut self.spacing_distance, fallback.spacing_distance),
            (&mut self.density, fallback.density),
        ];
        for (field, default) in pairs {
            if !field.is_finite() {
                *field = if default.is_finite() { default } else { 0.0 };
            }
        }
        if self.size_scale <= MIN_SIZE_SCALE {
            self.size_scale = 1.0;
        }
        self.strength = self.strength.max(0.0);
        self.spread = self.spread.max(0.01);
        self.density = self.density.max(0.0);
        self.gradient_strength = self.gradient_strength.clamp(0.2, 6.0);
        self.blur = self.blur.max(0.0);
        self.humor = self.humor.max(0.0);
        self.shine = self.shine.max(0.0);
        self.motion_range = self.motion_range.max(0.0);
        self.spacing_distance = self.spacing_distance.max(0.0);
        self
    }

    /// Reduced visuals for a blob whose speaker is not currently talking.
    pub fn idle(&self) -> Self {
        Self {
            strength: self.strength * 0.35,
            size_scale: (self.size_scale * 0.6).max(1.0),
            motion_range: self.motion_range * 0.5,
            breathing_speed: self.breathing_speed * 0.6,
            blobiness: self.blobiness * 0.5,
            ..self.clone()
        }
    }
}

// ── Override set ────────────────────────────────────────────────────────────

/// Optional overrides for any blob visual field plus segment-level toggles.
/// Field names follow the segment JSON (`blobStrength`, `minBlobSpacing`, ...);
/// segment files also carry unrelated keys such as `strength`, which are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualParameterSet {
    #[serde(default, rename = "blobStrength", deserialize_with = "lenient_f64")]
    pub strength: Option<f64>,
    #[serde(
        default,
        rename = "blobSizeScale",
        alias = "blobSize",
        deserialize_with = "lenient_f64"
    )]
    pub size_scale: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume_impact: Option<f64>,
    #[serde(default, rename = "blobSpreadField", deserialize_with = "lenient_f64")]
    pub spread: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub motion_range: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub breathing_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gradient_strength: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub blobiness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub blur: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humor: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub shine: Option<f64>,
    #[serde(default, rename = "blobDensity", deserialize_with = "lenient_f64")]
    pub density: Option<f64>,
    #[serde(default, deserialize_with = "lenient_spacing")]
    pub min_blob_spacing: Option<SpacingSetting>,
    #[serde(
        default,
        rename = "blobGrowthPattern",
        deserialize_with = "lenient_growth"
    )]
    pub growth_pattern: Option<GrowthPattern>,
    #[serde(default, rename = "blobsVisible", deserialize_with = "lenient_bool")]
    pub visible: Option<bool>,
    #[serde(default, rename = "blobHomeRegion", deserialize_with = "lenient_region")]
    pub home_region: Option<HomeRegion>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub connect_blobs: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub volume_effects: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub grid_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub circles_per_emotion: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub emotion_char_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub colored_circle_char_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub regular_ascii_char_size: Option<f64>,
    #[serde(default, alias = "asciiChars", deserialize_with = "lenient_string")]
    pub density_chars: Option<String>,
}

impl VisualParameterSet {
    /// Overlay `other` on top of `self`: fields present in `other` win.
    pub fn merged(&self, other: &VisualParameterSet) -> Self {
        macro_rules! pick {
            ($($field:ident),* $(,)?) => {
                Self { $($field: other.$field.clone().or_else(|| self.$field.clone()),)* }
            };
        }
        pick!(
            strength,
            size_scale,
            volume_impact,
            spread,
            motion_range,
            breathing_speed,
            gradient_strength,
            blobiness,
            blur,
            humor,
            shine,
            density,
            min_blob_spacing,
            growth_pattern,
            visible,
            home_region,
            connect_blobs,
            volume_effects,
            grid_size,
            circles_per_emotion,
            emotion_char_amount,
            colored_circle_char_size,
            regular_ascii_char_size,
            density_chars,
        )
    }
}

// ── Lenient field parsing ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Num(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = match Loose::deserialize(d)? {
        Loose::Num(v) => Some(v),
        Loose::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Bool(b) => Some(b),
        Loose::Num(v) => Some(v != 0.0),
        Loose::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        Loose::Other(_) => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Text(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_growth<'de, D: Deserializer<'de>>(d: D) -> Result<Option<GrowthPattern>, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Text(s) => {
            let parsed = GrowthPattern::parse(&s);
            if parsed.is_none() {
                tracing::warn!(pattern = %s, "unknown growth pattern, using default");
            }
            parsed
        }
        _ => None,
    })
}

fn lenient_region<'de, D: Deserializer<'de>>(d: D) -> Result<Option<HomeRegion>, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Text(s) => {
            let parsed = HomeRegion::parse(&s);
            if parsed.is_none() {
                tracing::warn!(region = %s, "unknown home region, using default");
            }
            parsed
        }
        _ => None,
    })
}

fn lenient_spacing<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SpacingSetting>, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Num(px) if px.is_finite() => Some(SpacingSetting::Pixels(px)),
        Loose::Text(s) => match s.trim().parse::<f64>() {
            Ok(px) if px.is_finite() => Some(SpacingSetting::Pixels(px)),
            _ => Some(SpacingSetting::Preset(s)),
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_patterns_start_at_one_and_increase() {
        for pattern in [
            GrowthPattern::Linear,
            GrowthPattern::Exponential,
            GrowthPattern::Logarithmic,
            GrowthPattern::Sine,
        ] {
            assert!((pattern.response(0.0, 2.0) - 1.0).abs() < 1e-12);
            let mut prev = 0.0;
            for i in 0..=20 {
                let r = pattern.response(i as f64 / 20.0, 2.0);
                assert!(r >= prev, "{:?} not monotonic", pattern);
                prev = r;
            }
            assert!((pattern.response(1.0, 2.0) - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn steady_is_linear() {
        assert_eq!(GrowthPattern::parse("steady"), Some(GrowthPattern::Linear));
        assert_eq!(GrowthPattern::parse("Sine"), Some(GrowthPattern::Sine));
        assert_eq!(GrowthPattern::parse("zigzag"), None);
    }

    #[test]
    fn hebrew_and_english_regions() {
        assert_eq!(HomeRegion::parse("center-left"), Some(HomeRegion::CenterLeft));
        assert_eq!(HomeRegion::parse("מרכז שמאל"), Some(HomeRegion::CenterLeft));
        assert_eq!(HomeRegion::parse("מרכז ימין"), Some(HomeRegion::CenterRight));
        assert_eq!(HomeRegion::parse("Top Right"), Some(HomeRegion::TopRight));
        assert_eq!(HomeRegion::parse("nowhere"), None);
    }

    #[test]
    fn spacing_presets_resolve() {
        assert_eq!(SpacingSetting::Preset("very close".into()).resolve(), 60.0);
        assert_eq!(SpacingSetting::Preset("farest".into()).resolve(), 360.0);
        assert_eq!(
            SpacingSetting::Preset("galaxy".into()).resolve(),
            SpacingSetting::DEFAULT_PIXELS
        );
        assert_eq!(SpacingSetting::Pixels(42.0).resolve(), 42.0);
    }

    #[test]
    fn tiny_size_scale_is_clamped_to_one() {
        let set = VisualParameterSet {
            size_scale: Some(0.05),
            ..Default::default()
        };
        let params = VisualParams::default().with_overrides(&set);
        assert_eq!(params.size_scale, 1.0);
    }

    #[test]
    fn absent_fields_keep_defaults() {
        let set = VisualParameterSet {
            strength: Some(900.0),
            ..Default::default()
        };
        let params = VisualParams::default().with_overrides(&set);
        assert_eq!(params.strength, 900.0);
        assert_eq!(params.spread, VisualParams::default().spread);
    }

    #[test]
    fn non_finite_values_fall_back() {
        let mut params = VisualParams::default();
        params.spread = f64::NAN;
        params.blobiness = f64::INFINITY;
        let clean = params.sanitized(&VisualParams::default());
        assert_eq!(clean.spread, 2.0);
        assert_eq!(clean.blobiness, 3.0);
    }

    #[test]
    fn lenient_json_fields() {
        let json = r#"{
            "blobStrength": "750",
            "blobSizeScale": 5,
            "blobiness": "lots",
            "blobsVisible": "false",
            "minBlobSpacing": "close",
            "blobGrowthPattern": "steady",
            "blobHomeRegion": "מרכז"
        }"#;
        let set: VisualParameterSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.strength, Some(750.0));
        assert_eq!(set.size_scale, Some(5.0));
        assert_eq!(set.blobiness, None);
        assert_eq!(set.visible, Some(false));
        assert_eq!(
            set.min_blob_spacing,
            Some(SpacingSetting::Preset("close".into()))
        );
        assert_eq!(set.growth_pattern, Some(GrowthPattern::Linear));
        assert_eq!(set.home_region, Some(HomeRegion::Center));
    }

    #[test]
    fn merged_prefers_later_values() {
        let base = VisualParameterSet {
            strength: Some(100.0),
            blur: Some(2.0),
            ..Default::default()
        };
        let top = VisualParameterSet {
            strength: Some(300.0),
            ..Default::default()
        };
        let merged = base.merged(&top);
        assert_eq!(merged.strength, Some(300.0));
        assert_eq!(merged.blur, Some(2.0));
    }
}
