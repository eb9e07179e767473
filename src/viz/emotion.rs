// Emotion → color / character-set lookups.
//
// Labels are matched case-insensitively and through an English↔Hebrew alias
// table, so "Happiness", "happiness" and "שמחה" resolve to the same style.
// Colors pushed by an external config win over per-segment colors, which win
// over the built-in table; anything still unresolved gets a fixed palette
// color keyed by its index in the segment's emotion list.

use std::collections::HashMap;

use serde::Deserialize;

pub type Rgb = [u8; 3];

/// Index-keyed colors for emotions with no mapping anywhere.
pub const FALLBACK_PALETTE: [Rgb; 8] = [
    [255, 107, 107],
    [78, 205, 196],
    [255, 230, 109],
    [155, 89, 182],
    [52, 152, 219],
    [46, 204, 113],
    [241, 148, 138],
    [230, 126, 34],
];

/// Glyphs for emotions without a dedicated character set.
pub const DEFAULT_CHARSET: &[char] = &['●', '◉', '○', '◍', '•'];

const BUILTIN_COLORS: &[(&str, Rgb)] = &[
    ("happiness", [255, 220, 0]),
    ("joy", [255, 200, 40]),
    ("sadness", [70, 110, 220]),
    ("anger", [230, 50, 40]),
    ("fear", [140, 70, 200]),
    ("surprise", [255, 140, 0]),
    ("disgust", [90, 170, 60]),
    ("neutral", [170, 170, 170]),
    ("curiosity", [50, 200, 255]),
    ("love", [255, 100, 170]),
    ("excitement", [255, 90, 60]),
    ("interest", [80, 220, 200]),
    ("frustration", [200, 80, 40]),
    ("anxiety", [180, 120, 220]),
    ("hope", [120, 230, 140]),
    ("pride", [230, 180, 60]),
    ("calm", [120, 200, 230]),
    ("confusion", [200, 160, 220]),
    ("gratitude", [250, 190, 120]),
    ("affection", [255, 150, 190]),
    ("caring", [240, 150, 150]),
    ("admiration", [255, 210, 120]),
];

const BUILTIN_CHARSETS: &[(&str, &[char])] = &[
    ("happiness", &['☀', '✦', '✧', '*', '●']),
    ("joy", &['✦', '✧', '*', '☀']),
    ("sadness", &['·', '∙', '◦', '.']),
    ("anger", &['✶', '✹', '✷', '#', '▲']),
    ("fear", &['░', '▒', '~', '≈']),
    ("surprise", &['!', '✧', '✺', '◎']),
    ("love", &['♥', '❤', '♡', '●']),
    ("curiosity", &['?', '¿', '◌', '○']),
    ("calm", &['~', '∽', '○', '◦']),
];

/// Hebrew labels used by the annotation tooling, mapped to English keys.
const HEBREW_ALIASES: &[(&str, &str)] = &[
    ("שמחה", "happiness"),
    ("עצב", "sadness"),
    ("כעס", "anger"),
    ("פחד", "fear"),
    ("הפתעה", "surprise"),
    ("גועל", "disgust"),
    ("נייטרלי", "neutral"),
    ("ניטרלי", "neutral"),
    ("סקרנות", "curiosity"),
    ("סקרן", "curiosity"),
    ("עניין", "interest"),
    ("תסכול", "frustration"),
    ("התרגשות", "excitement"),
    ("אהבה", "love"),
    ("חרדה", "anxiety"),
    ("תקווה", "hope"),
    ("גאווה", "pride"),
    ("רגוע", "calm"),
    ("בלבול", "confusion"),
    ("הכרת תודה", "gratitude"),
    ("חיבה", "affection"),
    ("דאגה", "caring"),
    ("הערצה", "admiration"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    BuiltIn,
    Configured,
}

#[derive(Debug, Clone)]
struct EmotionStyle {
    color: Option<(Rgb, ColorSource)>,
    charset: Option<Vec<char>>,
}

/// Live emotion styling shared by every blob of a session.
#[derive(Debug, Clone)]
pub struct EmotionPalette {
    styles: HashMap<String, EmotionStyle>,
    aliases: HashMap<String, String>,
}

impl Default for EmotionPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionPalette {
    /// Palette seeded with the built-in colors, charsets and Hebrew aliases.
    pub fn new() -> Self {
        let mut styles: HashMap<String, EmotionStyle> = HashMap::new();
        for &(label, rgb) in BUILTIN_COLORS {
            styles.insert(
                label.to_string(),
                EmotionStyle {
                    color: Some((rgb, ColorSource::BuiltIn)),
                    charset: None,
                },
            );
        }
        for &(label, chars) in BUILTIN_CHARSETS {
            styles
                .entry(label.to_string())
                .or_insert(EmotionStyle {
                    color: None,
                    charset: None,
                })
                .charset = Some(chars.to_vec());
        }
        let aliases = HEBREW_ALIASES
            .iter()
            .map(|&(he, en)| (he.to_string(), en.to_string()))
            .collect();
        Self { styles, aliases }
    }

    /// Palette with no built-in colors: every label goes through the
    /// configured map or the index fallback.
    pub fn empty() -> Self {
        Self {
            styles: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Lowercased, trimmed key with aliases folded onto their English label.
    pub fn canonical(&self, label: &str) -> String {
        let key = label.trim().to_lowercase();
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    pub fn color(&self, label: &str) -> Option<Rgb> {
        self.styles
            .get(&self.canonical(label))
            .and_then(|s| s.color)
            .map(|(rgb, _)| rgb)
    }

    fn configured_color(&self, label: &str) -> Option<Rgb> {
        match self.styles.get(&self.canonical(label)).and_then(|s| s.color) {
            Some((rgb, ColorSource::Configured)) => Some(rgb),
            _ => None,
        }
    }

    /// Character set for `label`, or the generic set.
    pub fn charset(&self, label: &str) -> &[char] {
        self.styles
            .get(&self.canonical(label))
            .and_then(|s| s.charset.as_deref())
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CHARSET)
    }

    pub fn set_color(&mut self, label: &str, rgb: Rgb) {
        let key = self.canonical(label);
        self.style_mut(key).color = Some((rgb, ColorSource::Configured));
    }

    pub fn set_charset(&mut self, label: &str, chars: Vec<char>) {
        let key = self.canonical(label);
        self.style_mut(key).charset = Some(chars);
    }

    fn style_mut(&mut self, key: String) -> &mut EmotionStyle {
        self.styles.entry(key).or_insert(EmotionStyle {
            color: None,
            charset: None,
        })
    }

    /// Colors for `emotions`, index-aligned. `segment_colors` holds colors
    /// carried by the segment record itself.
    pub fn resolve_colors(
        &self,
        emotions: &[String],
        segment_colors: &HashMap<String, Rgb>,
    ) -> Vec<Rgb> {
        emotions
            .iter()
            .enumerate()
            .map(|(i, label)| {
                self.configured_color(label)
                    .or_else(|| lookup_case_insensitive(segment_colors, label, self))
                    .or_else(|| self.color(label))
                    .unwrap_or_else(|| {
                        tracing::warn!(emotion = %label, index = i, "no color mapping for emotion, using fallback palette");
                        fallback_color(i)
                    })
            })
            .collect()
    }

    /// Merge an external color/charset update. Returns how many labels changed.
    pub fn apply_update(&mut self, update: &EmotionConfigUpdate) -> usize {
        let mut changed = 0;
        match update {
            EmotionConfigUpdate::ColorMap { emotion_color_map } => {
                for (label, value) in emotion_color_map {
                    match value.to_rgb() {
                        Some(rgb) => {
                            self.set_color(label, rgb);
                            changed += 1;
                        }
                        None => tracing::warn!(emotion = %label, "unparseable color in emotion color map"),
                    }
                }
            }
            EmotionConfigUpdate::Emotions { emotions } => {
                for (label, entry) in emotions {
                    if let Some(ref hebrew) = entry.hebrew {
                        let alias = hebrew.trim().to_lowercase();
                        let target = label.trim().to_lowercase();
                        if !alias.is_empty() && alias != target {
                            self.aliases.insert(alias, target);
                        }
                    }
                    if entry.active == Some(false) {
                        let key = self.canonical(label);
                        if let Some(style) = self.styles.get_mut(&key) {
                            if matches!(style.color, Some((_, ColorSource::Configured))) {
                                style.color = None;
                            }
                            style.charset = None;
                        }
                        changed += 1;
                        continue;
                    }
                    let mut touched = false;
                    if let Some(rgb) = entry.color.as_ref().and_then(ColorValue::to_rgb) {
                        self.set_color(label, rgb);
                        touched = true;
                    }
                    if let Some(chars) = entry.charset.as_ref().map(CharsetValue::chars) {
                        if !chars.is_empty() {
                            self.set_charset(label, chars);
                            touched = true;
                        }
                    }
                    if touched {
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}

fn lookup_case_insensitive(
    map: &HashMap<String, Rgb>,
    label: &str,
    palette: &EmotionPalette,
) -> Option<Rgb> {
    let wanted = palette.canonical(label);
    map.iter()
        .find(|(k, _)| palette.canonical(k) == wanted)
        .map(|(_, rgb)| *rgb)
}

/// Deterministic fallback color for position `index` in an emotion list.
pub fn fallback_color(index: usize) -> Rgb {
    FALLBACK_PALETTE[index % FALLBACK_PALETTE.len()]
}

/// Parse `#RRGGBB`, `RRGGBB` or `#RGB`.
pub fn parse_hex(hex: &str) -> Option<Rgb> {
    let digits = hex.trim().trim_start_matches('#');
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

// ── External update payloads ────────────────────────────────────────────────

/// A color given either as `[r, g, b]` or as a hex string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Rgb([f64; 3]),
    Hex(String),
}

impl ColorValue {
    pub fn to_rgb(&self) -> Option<Rgb> {
        match self {
            Self::Rgb(c) if c.iter().all(|v| v.is_finite()) => Some([
                c[0].round().clamp(0.0, 255.0) as u8,
                c[1].round().clamp(0.0, 255.0) as u8,
                c[2].round().clamp(0.0, 255.0) as u8,
            ]),
            Self::Rgb(_) => None,
            Self::Hex(s) => parse_hex(s),
        }
    }
}

/// A character set given as a list of strings or as one string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CharsetValue {
    List(Vec<String>),
    Text(String),
}

impl CharsetValue {
    pub fn chars(&self) -> Vec<char> {
        match self {
            Self::List(items) => items.iter().filter_map(|s| s.chars().next()).collect(),
            Self::Text(s) => s.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

/// One emotion entry in the admin config format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmotionEntry {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub color: Option<ColorValue>,
    #[serde(default)]
    pub charset: Option<CharsetValue>,
    #[serde(default)]
    pub hebrew: Option<String>,
}

/// Live emotion styling update pushed by an external config source.
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionConfigUpdate {
    ColorMap {
        emotion_color_map: HashMap<String, ColorValue>,
    },
    Emotions {
        emotions: HashMap<String, EmotionEntry>,
    },
}

impl EmotionConfigUpdate {
    /// Accepts `{"emotionColorMap": {...}}`, `{"emotions": {...}}`, or a bare
    /// `{label: {active, color, charset}}` object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(map) = value.get_mut("emotionColorMap").map(serde_json::Value::take) {
            return Ok(Self::ColorMap {
                emotion_color_map: serde_json::from_value(map)?,
            });
        }
        let emotions = value
            .get_mut("emotions")
            .map(serde_json::Value::take)
            .unwrap_or(value);
        let entries: HashMap<String, serde_json::Value> = serde_json::from_value(emotions)?;
        let emotions = entries
            .into_iter()
            .filter_map(|(label, raw)| match serde_json::from_value::<EmotionEntry>(raw) {
                Ok(entry) => Some((label, entry)),
                Err(e) => {
                    tracing::warn!(emotion = %label, error = %e, "skipping malformed emotion entry");
                    None
                }
            })
            .collect();
        Ok(Self::Emotions { emotions })
    }
}
