//! Content normalizer: raw export records to canonical [`ContentItem`]s.
//!
//! Upstream parsers hand over one JSON object per record, optionally with a
//! declared category. Each canonical attribute is read from the first usable
//! field in a fixed candidate list, and the category (when not declared) comes
//! from an ordered rule list where the first match wins:
//!
//! 1. explicit format markers (`source_type`, `platform`, `type`)
//! 2. structural shape checks on known key sets
//! 3. filename heuristics on the record's origin
//!
//! Rejections are never errors. They land in [`Diagnostics`] and the record is
//! dropped from every later stage.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{ContentItem, SourceCategory};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Outcome};

// ── Candidate field lists ───────────────────────────────────────────────

/// Text-bearing fields, in priority order.
pub const TEXT_FIELDS: &[&str] = &["text", "content", "message", "body", "full_text"];

pub const ID_FIELDS: &[&str] = &["id", "id_str", "message_id", "uuid", "guid"];

pub const TIMESTAMP_FIELDS: &[&str] = &["created_at", "timestamp", "date", "create_time", "time"];

pub const AUTHOR_FIELDS: &[&str] = &[
    "author_id",
    "user_id",
    "sender_id",
    "from_id",
    "author",
    "sender",
    "from",
    "user",
];

pub const CONVERSATION_FIELDS: &[&str] = &["conversation_id", "thread_id", "chat_id", "channel_id"];

pub const REPLY_FIELDS: &[&str] = &[
    "in_reply_to_id",
    "in_reply_to_status_id",
    "reply_to",
    "parent_id",
];

/// Keys inside an author object that identify the author.
const AUTHOR_OBJECT_FIELDS: &[&str] = &["id", "screen_name", "name"];

// ── Detection vocabulary ────────────────────────────────────────────────

const MARKER_FIELDS: &[&str] = &["source_type", "platform", "type"];

const SOCIAL_MARKERS: &[&str] = &["tweet", "post", "status", "social", "social-post"];
const CHAT_MARKERS: &[&str] = &["message", "chat", "dm", "chat-message"];
const NOTE_MARKERS: &[&str] = &["note", "memo", "markdown"];

const SOCIAL_SHAPE_KEYS: &[&str] = &[
    "retweet_count",
    "favorite_count",
    "full_text",
    "in_reply_to_status_id",
];
const CHAT_CONTAINER_KEYS: &[&str] = &["conversation_id", "chat_id", "thread_id"];
const SENDER_KEYS: &[&str] = &["sender", "sender_id", "from", "from_id"];

const SOCIAL_FILENAME_HINTS: &[&str] = &["tweet", "post"];
const CHAT_FILENAME_HINTS: &[&str] = &["chat", "message", "conversation"];
const NOTE_FILENAME_HINTS: &[&str] = &["note", ".md", ".txt"];

// ── Types ───────────────────────────────────────────────────────────────

/// One raw record as handed over by an upstream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Producer-specific shape; normally a JSON object.
    pub data: Value,
    /// Declared category. `None` triggers auto-detection.
    #[serde(default)]
    pub category: Option<SourceCategory>,
    /// File the record came from, used by filename heuristics.
    #[serde(default)]
    pub origin: Option<String>,
}

impl SourceRecord {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            category: None,
            origin: None,
        }
    }

    pub fn with_category(mut self, category: SourceCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A named detection rule. Returns `Some` when it recognizes the record.
struct DetectionRule {
    name: &'static str,
    check: fn(&Map<String, Value>, Option<&str>) -> Option<SourceCategory>,
}

const DETECTION_RULES: &[DetectionRule] = &[
    DetectionRule {
        name: "format-marker",
        check: detect_by_marker,
    },
    DetectionRule {
        name: "structural-shape",
        check: detect_by_shape,
    },
    DetectionRule {
        name: "filename",
        check: detect_by_filename,
    },
];

// ── Detection ───────────────────────────────────────────────────────────

/// Detect the source category of a raw record.
///
/// Returns [`SourceCategory::Unknown`] when no rule matches or the record is
/// not a JSON object and the origin gives no hint.
pub fn detect_category(data: &Value, origin: Option<&str>) -> SourceCategory {
    let empty = Map::new();
    let obj = data.as_object().unwrap_or(&empty);
    for rule in DETECTION_RULES {
        if let Some(category) = (rule.check)(obj, origin) {
            tracing::debug!(rule = rule.name, %category, "source category detected");
            return category;
        }
    }
    SourceCategory::Unknown
}

fn detect_by_marker(obj: &Map<String, Value>, _origin: Option<&str>) -> Option<SourceCategory> {
    for field in MARKER_FIELDS {
        let Some(value) = obj.get(*field).and_then(Value::as_str) else {
            continue;
        };
        let value = value.trim().to_lowercase();
        if SOCIAL_MARKERS.contains(&value.as_str()) {
            return Some(SourceCategory::SocialPost);
        }
        if CHAT_MARKERS.contains(&value.as_str()) {
            return Some(SourceCategory::ChatMessage);
        }
        if NOTE_MARKERS.contains(&value.as_str()) {
            return Some(SourceCategory::Note);
        }
    }
    None
}

fn detect_by_shape(obj: &Map<String, Value>, _origin: Option<&str>) -> Option<SourceCategory> {
    let has_any = |keys: &[&str]| keys.iter().any(|k| obj.contains_key(*k));

    if has_any(SOCIAL_SHAPE_KEYS) {
        return Some(SourceCategory::SocialPost);
    }
    if has_any(CHAT_CONTAINER_KEYS) && has_any(SENDER_KEYS) {
        return Some(SourceCategory::ChatMessage);
    }
    if obj.contains_key("title") && !has_any(SENDER_KEYS) {
        return Some(SourceCategory::Note);
    }
    None
}

fn detect_by_filename(_obj: &Map<String, Value>, origin: Option<&str>) -> Option<SourceCategory> {
    let name = origin?.to_lowercase();
    if SOCIAL_FILENAME_HINTS.iter().any(|h| name.contains(h)) {
        return Some(SourceCategory::SocialPost);
    }
    if CHAT_FILENAME_HINTS.iter().any(|h| name.contains(h)) {
        return Some(SourceCategory::ChatMessage);
    }
    if NOTE_FILENAME_HINTS.iter().any(|h| name.contains(h)) {
        return Some(SourceCategory::Note);
    }
    None
}

// ── Field extraction ────────────────────────────────────────────────────

/// First candidate whose value is a usable text: a non-blank string, or an
/// array of strings that joins to a non-blank string.
fn first_text(obj: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|field| match obj.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n");
            (!joined.trim().is_empty()).then(|| joined.trim().to_string())
        }
        _ => None,
    })
}

/// Render a scalar id-like value as a string.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_scalar(obj: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|field| obj.get(*field).and_then(scalar_string))
}

fn first_author(obj: &Map<String, Value>) -> Option<String> {
    AUTHOR_FIELDS.iter().find_map(|field| match obj.get(*field)? {
        Value::Object(author) => first_scalar(author, AUTHOR_OBJECT_FIELDS),
        other => scalar_string(other),
    })
}

/// Parse a timestamp value in any of the accepted export formats.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_unix(n.as_f64()?),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    // Social export format: "Wed Oct 10 20:19:24 +0000 2018".
    if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<f64>().ok().and_then(from_unix)
}

fn from_unix(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole, nanos)
}

// ── Normalization ───────────────────────────────────────────────────────

/// Normalize one record.
///
/// `index` is the record's position in its batch; it names the record in
/// diagnostics and seeds the synthesized id when none is present. Returns
/// `None` when the record is dropped, with the reason pushed to `diagnostics`.
pub fn normalize_record(
    record: &SourceRecord,
    index: usize,
    diagnostics: &mut Diagnostics,
) -> Option<ContentItem> {
    let subject = format!("record {index}");
    let category = record
        .category
        .unwrap_or_else(|| detect_category(&record.data, record.origin.as_deref()));

    if category == SourceCategory::Unknown {
        diagnostics.push(
            DiagnosticKind::UnrecognizedFormat,
            subject,
            "no detection rule matched; record excluded",
        );
        return None;
    }

    let empty = Map::new();
    let obj = record.data.as_object().unwrap_or(&empty);

    let Some(text) = first_text(obj, TEXT_FIELDS) else {
        diagnostics.push(
            DiagnosticKind::MissingRequiredField,
            subject,
            format!("no usable text in any of [{}]", TEXT_FIELDS.join(", ")),
        );
        return None;
    };

    let id = first_scalar(obj, ID_FIELDS).unwrap_or_else(|| format!("{category}-{index}"));

    let created_at = match TIMESTAMP_FIELDS.iter().find_map(|f| obj.get(*f)) {
        None | Some(Value::Null) => None,
        Some(raw) => {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                diagnostics.push(
                    DiagnosticKind::InvalidTimestamp,
                    id.clone(),
                    format!("unparseable timestamp {raw}; keeping item without created_at"),
                );
            }
            parsed
        }
    };

    Some(ContentItem {
        id,
        text,
        created_at,
        author_id: first_author(obj).unwrap_or_default(),
        conversation_id: first_scalar(obj, CONVERSATION_FIELDS),
        reply_to: first_scalar(obj, REPLY_FIELDS),
        source_type: category,
    })
}

/// Normalize a whole batch, isolating per-record failures.
///
/// Records whose id repeats an earlier accepted record are skipped.
pub fn normalize_batch(records: &[SourceRecord]) -> Outcome<Vec<ContentItem>> {
    let mut diagnostics = Diagnostics::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let Some(item) = normalize_record(record, index, &mut diagnostics) else {
            continue;
        };
        if !seen.insert(item.id.clone()) {
            diagnostics.push(
                DiagnosticKind::DuplicateId,
                item.id.clone(),
                format!("record {index} reuses an id already in this batch; skipped"),
            );
            continue;
        }
        tracing::debug!(id = %item.id, category = %item.source_type, "record normalized");
        items.push(item);
    }

    tracing::info!(
        records = records.len(),
        accepted = items.len(),
        rejected = records.len() - items.len(),
        "normalization complete"
    );

    Outcome::new(items, diagnostics)
}

// ── Export documents ────────────────────────────────────────────────────

/// Split one export document into records.
///
/// A top-level array yields one record per element. An object holding an
/// array field (e.g. `{"messages": [...]}`) yields that array's elements,
/// with the field name appended to the origin so filename hints see it.
/// Anything else is a single record.
pub fn records_from_document(
    doc: Value,
    category: Option<SourceCategory>,
    origin: Option<&str>,
) -> Vec<SourceRecord> {
    let make = |data: Value, origin: Option<String>| SourceRecord {
        data,
        category,
        origin,
    };

    match doc {
        Value::Array(items) => items
            .into_iter()
            .map(|data| make(data, origin.map(str::to_string)))
            .collect(),
        Value::Object(mut obj) => {
            let field = obj
                .iter()
                .find(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone());
            match field.and_then(|f| obj.remove(&f).map(|v| (f, v))) {
                Some((field, Value::Array(items))) => {
                    let origin = match origin {
                        Some(o) => format!("{o}:{field}"),
                        None => field,
                    };
                    items
                        .into_iter()
                        .map(|data| make(data, Some(origin.clone())))
                        .collect()
                }
                _ => vec![make(Value::Object(obj), origin.map(str::to_string))],
            }
        }
        other => vec![make(other, origin.map(str::to_string))],
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
