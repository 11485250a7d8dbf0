//! Normalized diff records and their fingerprints.
//!
//! The diff source hands over `[diff, interactions]` pairs. The fingerprint
//! is an MD5 over canonical JSON (object keys sorted, arrays in order), so it
//! depends only on the diff's content and never on key order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use specreview_protocol::ErrorInfo;

/// Produce canonical JSON bytes: object keys sorted lexicographically
/// (recursive), arrays preserve order, no extra whitespace.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(Value::String(key.clone()).to_string().as_bytes());
                out.push(b':');
                write_canonical(&map[key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}

/// Stable fingerprint of a raw diff value.
pub fn diff_hash(diff: &Value) -> String {
    format!("{:x}", md5::compute(canonical_json_bytes(diff)))
}

/// Where in the spec a diff points, as far as the record says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDiff {
    diff_hash: String,
    raw: Value,
    interaction_pointers: Vec<String>,
}

impl ParsedDiff {
    pub fn new(diff: Value, interactions: &Value) -> Self {
        Self {
            diff_hash: diff_hash(&diff),
            raw: diff,
            interaction_pointers: extract_pointers(interactions),
        }
    }

    /// Parses one `[diff, interactions]` record from the diff source.
    pub fn from_record(record: &Value) -> Result<Self, ErrorInfo> {
        match record.as_array().map(Vec::as_slice) {
            Some([diff, interactions]) => Ok(Self::new(diff.clone(), interactions)),
            Some([diff]) => Ok(Self::new(diff.clone(), &Value::Null)),
            _ => Err(ErrorInfo::new(
                "invalid_diff",
                "diff record must be a [diff, interactions] pair",
            )),
        }
    }

    pub fn diff_hash(&self) -> &str {
        &self.diff_hash
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn interaction_pointers(&self) -> &[String] {
        &self.interaction_pointers
    }

    /// The diff's single top-level key, e.g. `UnmatchedResponseBodyShape`.
    pub fn kind(&self) -> Option<&str> {
        match self.raw.as_object() {
            Some(map) if map.len() == 1 => map.keys().next().map(String::as_str),
            _ => None,
        }
    }

    pub fn location(&self) -> DiffLocation {
        let mut location = DiffLocation::default();
        collect_location(&self.raw, &mut location);
        location
    }
}

fn extract_pointers(interactions: &Value) -> Vec<String> {
    let items: &[Value] = match interactions {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("interactionPointers") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    let mut pointers: Vec<String> = Vec::new();
    for pointer in items.iter().filter_map(Value::as_str) {
        if !pointers.iter().any(|p| p == pointer) {
            pointers.push(pointer.to_string());
        }
    }
    pointers
}

// First occurrence wins, depth-first in key order.
fn collect_location(value: &Value, location: &mut DiffLocation) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                match (key.as_str(), v) {
                    ("pathId", Value::String(s)) if location.path_id.is_none() => {
                        location.path_id = Some(s.clone());
                    }
                    ("method", Value::String(s)) if location.method.is_none() => {
                        location.method = Some(s.clone());
                    }
                    ("statusCode", Value::Number(n)) if location.status_code.is_none() => {
                        location.status_code = n.as_u64().and_then(|n| u16::try_from(n).ok());
                    }
                    ("contentType", Value::String(s)) if location.content_type.is_none() => {
                        location.content_type = Some(s.clone());
                    }
                    _ => collect_location(v, location),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_location(item, location);
            }
        }
        _ => {}
    }
}

/// Collapses diffs sharing a fingerprint into the first one seen, appending
/// the later records' interaction pointers in order.
pub fn merge_diffs(diffs: impl IntoIterator<Item = ParsedDiff>) -> Vec<ParsedDiff> {
    let mut merged: Vec<ParsedDiff> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen: Vec<HashSet<String>> = Vec::new();
    for diff in diffs {
        match index.get(&diff.diff_hash) {
            Some(&slot) => {
                let existing = &mut merged[slot];
                for pointer in diff.interaction_pointers {
                    if seen[slot].insert(pointer.clone()) {
                        existing.interaction_pointers.push(pointer);
                    }
                }
            }
            None => {
                index.insert(diff.diff_hash.clone(), merged.len());
                seen.push(diff.interaction_pointers.iter().cloned().collect());
                merged.push(diff);
            }
        }
    }
    merged
}

/// Parses diff records, merging duplicates by fingerprint.
pub fn parse_diffs(records: &[Value]) -> Vec<ParsedDiff> {
    let parsed = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match ParsedDiff::from_record(record) {
            Ok(diff) => Some(diff),
            Err(err) => {
                tracing::warn!(index, code = %err.code, "Skipping malformed diff record");
                None
            }
        });
    merge_diffs(parsed)
}
