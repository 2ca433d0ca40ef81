//! Detector output parsing.
//!
//! The vision model's replies are untrusted: keys may repeat, records may
//! be malformed and replies may arrive wrapped in Markdown fences. Nothing
//! here fails on a bad record; bad records are counted and dropped.

use crate::DataError;
use serde::Deserialize;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::Value as JsonValue;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, warn};

/// One object reported by the detector, before name normalization and
/// box range checks.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    /// Object key as it appeared in the reply.
    pub key: String,
    /// Reported name, or the key with underscores turned into spaces.
    pub name: String,
    pub materials: Vec<String>,
    /// Box corners `[x, y]`, clockwise from top-left, as reported.
    pub corners: [[f64; 2]; 4],
}

/// All detector records for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDetections {
    /// Image name of the frame.
    pub frame: String,
    pub records: Vec<DetectionRecord>,
    /// Records dropped because they could not be interpreted.
    pub rejected: usize,
}

/// JSON object read as an ordered list of entries, keeping repeated keys.
struct Entries<T>(Vec<(String, T)>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Entries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = Entries<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, T>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// A frame's value in a frame-keyed table: usually an object of records.
#[derive(Deserialize)]
#[serde(untagged)]
enum FrameBody {
    Objects(Entries<JsonValue>),
    Other(IgnoredAny),
}

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_corner(value: &JsonValue) -> Option<[f64; 2]> {
    match value.as_array()?.as_slice() {
        [x, y] => Some([x.as_f64()?, y.as_f64()?]),
        _ => None,
    }
}

/// Accepts four `[x, y]` corners, or a flat `[x_min, y_min, x_max, y_max]`
/// which is expanded clockwise from top-left.
fn parse_box(value: &JsonValue) -> Option<[[f64; 2]; 4]> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }
    if items.iter().all(JsonValue::is_number) {
        let [x0, y0, x1, y1] = [
            items[0].as_f64()?,
            items[1].as_f64()?,
            items[2].as_f64()?,
            items[3].as_f64()?,
        ];
        return Some([[x0, y0], [x1, y0], [x1, y1], [x0, y1]]);
    }
    Some([
        parse_corner(&items[0])?,
        parse_corner(&items[1])?,
        parse_corner(&items[2])?,
        parse_corner(&items[3])?,
    ])
}

fn parse_materials(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        Some(JsonValue::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn parse_record(key: &str, value: &JsonValue) -> Option<DetectionRecord> {
    let object = value.as_object()?;

    let name = object
        .get("name")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| key.replace('_', " "));

    let corners = object
        .get("box")
        .or_else(|| object.get("bbox"))
        .and_then(parse_box)?;

    Some(DetectionRecord {
        key: key.to_string(),
        name,
        materials: parse_materials(object.get("materials")),
        corners,
    })
}

fn frame_from_entries(frame: &str, entries: Vec<(String, JsonValue)>) -> FrameDetections {
    let mut detections = FrameDetections {
        frame: frame.to_string(),
        ..Default::default()
    };
    for (key, value) in entries {
        match parse_record(&key, &value) {
            Some(record) => detections.records.push(record),
            None => {
                warn!("Frame {}: rejected malformed detection '{}'", frame, key);
                detections.rejected += 1;
            }
        }
    }
    detections
}

/// Parse one frame's detector reply.
///
/// Fails only when the reply is not a JSON object at all.
pub fn parse_frame_detections(frame: &str, text: &str) -> Result<FrameDetections, DataError> {
    let Entries(entries) = serde_json::from_str::<Entries<JsonValue>>(strip_code_fence(text))?;
    Ok(frame_from_entries(frame, entries))
}

/// Parse a table mapping frame name to that frame's detector reply.
///
/// A frame listed twice has its records concatenated.
pub fn parse_detection_table(text: &str) -> Result<Vec<FrameDetections>, DataError> {
    let Entries(frames) = serde_json::from_str::<Entries<FrameBody>>(strip_code_fence(text))?;

    let mut table: Vec<FrameDetections> = Vec::with_capacity(frames.len());
    for (frame, body) in frames {
        let parsed = match body {
            FrameBody::Objects(Entries(entries)) => frame_from_entries(&frame, entries),
            FrameBody::Other(_) => {
                warn!("Frame {}: detector output is not an object", frame);
                FrameDetections {
                    frame: frame.clone(),
                    records: Vec::new(),
                    rejected: 1,
                }
            }
        };
        match table.iter_mut().find(|f| f.frame == frame) {
            Some(existing) => {
                existing.records.extend(parsed.records);
                existing.rejected += parsed.rejected;
            }
            None => table.push(parsed),
        }
    }
    Ok(table)
}

fn read_reply(path: &Path) -> Result<String, DataError> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| {
        DataError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Load detector output from a frame-keyed JSON file, or from a directory
/// of per-frame replies named `<frame name>.json`.
///
/// In directory mode an unparseable reply counts as one rejected record
/// for its frame instead of failing the load.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_detections<P: AsRef<Path>>(path: P) -> Result<Vec<FrameDetections>, DataError> {
    let path = path.as_ref();
    if !path.is_dir() {
        return parse_detection_table(&std::fs::read_to_string(path)?);
    }

    let mut files: Vec<_> = std::fs::read_dir(path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut frames = Vec::with_capacity(files.len());
    for file in files {
        let Some(frame) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        match read_reply(&file).and_then(|text| parse_frame_detections(&frame, &text)) {
            Ok(parsed) => frames.push(parsed),
            Err(e) => {
                warn!("Frame {}: unreadable detector reply: {}", frame, e);
                frames.push(FrameDetections {
                    frame,
                    records: Vec::new(),
                    rejected: 1,
                });
            }
        }
    }

    debug!("Loaded detector output for {} frames", frames.len());
    Ok(frames)
}
