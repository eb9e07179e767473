// Segment file model.
//
// The emotions file is a JSON object keyed by segment audio file name
// ("1.mp3", "2.mp3", ...) or an array of records carrying `file`. A record
// that fails to parse degrades to an empty record for that file so the
// segment still plays with default visuals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::viz::emotion::{ColorValue, Rgb};
use crate::viz::params::VisualParameterSet;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "opus", "webm", "aac"];

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid segment JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("segment file must be a JSON object or array, found {0}")]
    Shape(&'static str),
    #[error("segment file contains no audio segments")]
    Empty,
}

/// One annotated conversation segment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SegmentRecord {
    #[serde(default)]
    pub file: String,
    /// Speaking slot; `None` for silence (`-1` in the file).
    #[serde(default = "first_speaker", deserialize_with = "speaker_slot")]
    pub speaker: Option<usize>,
    #[serde(default, deserialize_with = "label_list")]
    pub emotions: Vec<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub transcript: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    pub is_silent: bool,
    #[serde(default, deserialize_with = "loose_millis")]
    pub duration_ms: Option<u64>,
    #[serde(default, rename = "emotionColors", deserialize_with = "color_map")]
    pub emotion_colors: HashMap<String, Rgb>,
    #[serde(default, rename = "emotionDistribution", deserialize_with = "distribution")]
    pub emotion_distribution: Option<HashMap<String, f64>>,
    #[serde(flatten)]
    pub visuals: VisualParameterSet,
}

impl SegmentRecord {
    /// Empty record for `file`: default visuals, no emotions.
    pub fn fallback(file: &str) -> Self {
        Self {
            file: file.to_string(),
            speaker: Some(0),
            ..Default::default()
        }
    }
}

/// Ordered list of segments from one emotions file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSet {
    segments: Vec<SegmentRecord>,
}

impl SegmentSet {
    pub fn new(segments: Vec<SegmentRecord>) -> Self {
        Self { segments }
    }

    pub fn parse(text: &str) -> Result<Self, SegmentError> {
        let root: Value = serde_json::from_str(text)?;
        let segments = match root {
            Value::Object(map) => {
                let mut keyed: Vec<(String, Value)> =
                    map.into_iter().filter(|(k, _)| is_audio_file(k)).collect();
                keyed.sort_by(|(a, _), (b, _)| segment_order(a).cmp(&segment_order(b)));
                keyed
                    .into_iter()
                    .map(|(key, value)| parse_record(value, Some(&key)))
                    .collect::<Vec<_>>()
            }
            Value::Array(items) => items
                .into_iter()
                .map(|value| parse_record(value, None))
                .collect(),
            Value::Null => return Err(SegmentError::Shape("null")),
            Value::Bool(_) => return Err(SegmentError::Shape("a boolean")),
            Value::Number(_) => return Err(SegmentError::Shape("a number")),
            Value::String(_) => return Err(SegmentError::Shape("a string")),
        };
        if segments.is_empty() {
            return Err(SegmentError::Empty);
        }
        Ok(Self { segments })
    }

    pub fn load(path: &Path) -> Result<Self, SegmentError> {
        let text = std::fs::read_to_string(path).map_err(|source| SegmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SegmentRecord> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentRecord> {
        self.segments.iter()
    }
}

/// Audio path for `record` under `audio_dir`; absolute `file` values win.
pub fn audio_path(record: &SegmentRecord, audio_dir: &Path) -> Option<PathBuf> {
    if record.file.is_empty() {
        return None;
    }
    let file = Path::new(&record.file);
    Some(if file.is_absolute() {
        file.to_path_buf()
    } else {
        audio_dir.join(file)
    })
}

fn is_audio_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Sort key: numeric prefix first ("2.mp3" before "10.mp3"), then name.
fn segment_order(name: &str) -> (u64, String) {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    (digits.parse().unwrap_or(u64::MAX), name.to_string())
}

fn parse_record(value: Value, key: Option<&str>) -> SegmentRecord {
    match serde_json::from_value::<SegmentRecord>(value) {
        Ok(mut record) => {
            if let Some(key) = key {
                if record.file.is_empty() {
                    record.file = key.to_string();
                }
            }
            if record.file.is_empty() {
                tracing::warn!("segment record without a file name");
            }
            record
        }
        Err(e) => {
            let file = key.unwrap_or_default();
            tracing::warn!(file, error = %e, "malformed segment record, using defaults");
            SegmentRecord::fallback(file)
        }
    }
}

// ── Lenient fields ──────────────────────────────────────────────────────────

fn first_speaker() -> Option<usize> {
    Some(0)
}

fn speaker_slot<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    let number = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
            digits.parse::<f64>().ok()
        }
        _ => None,
    };
    Ok(match number {
        Some(n) if n < 0.0 => None,
        Some(n) => Some((n as usize).min(1)),
        None => Some(0),
    })
}

fn label_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s
            .split([',', '،'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    })
}

fn optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    })
}

fn loose_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let ms = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(ms.filter(|v| v.is_finite() && *v > 0.0).map(|v| v.round() as u64))
}

fn color_map<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<String, Rgb>, D::Error> {
    let Value::Object(map) = Value::deserialize(d)? else {
        return Ok(HashMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(label, raw)| {
            let rgb = serde_json::from_value::<ColorValue>(raw)
                .ok()
                .and_then(|c| c.to_rgb());
            if rgb.is_none() {
                tracing::warn!(emotion = %label, "ignoring unparseable segment emotion color");
            }
            rgb.map(|rgb| (label, rgb))
        })
        .collect())
}

fn distribution<'de, D: Deserializer<'de>>(d: D) -> Result<Option<HashMap<String, f64>>, D::Error> {
    let Value::Object(map) = Value::deserialize(d)? else {
        return Ok(None);
    };
    let dist: HashMap<String, f64> = map
        .into_iter()
        .filter_map(|(label, v)| {
            let pct = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
                _ => None,
            }?;
            (pct.is_finite() && pct >= 0.0).then_some((label, pct))
        })
        .collect();
    Ok((!dist.is_empty()).then_some(dist))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_is_clamped_and_silence_is_none() {
        let r: SegmentRecord = serde_json::from_str(r#"{"speaker": 3}"#).unwrap();
        assert_eq!(r.speaker, Some(1));
        let r: SegmentRecord = serde_json::from_str(r#"{"speaker": -1}"#).unwrap();
        assert_eq!(r.speaker, None);
        let r: SegmentRecord = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(r.speaker, Some(0));
    }

    #[test]
    fn emotions_accept_comma_separated_text() {
        let r: SegmentRecord = serde_json::from_str(r#"{"emotions": "joy, fear"}"#).unwrap();
        assert_eq!(r.emotions, vec!["joy", "fear"]);
    }

    #[test]
    fn unrelated_keys_do_not_clash_with_visuals() {
        let r: SegmentRecord = serde_json::from_str(
            r#"{"strength": 1, "blobStrength": 250, "words": "", "word_count": 0}"#,
        )
        .unwrap();
        assert_eq!(r.visuals.strength, Some(250.0));
    }
}
