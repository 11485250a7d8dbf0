//! Event types and validation for spec review sessions.
//!
//! This crate is shared by the session core and its clients (UI bindings,
//! the CLI) so the event schema cannot drift. The session machine remains
//! the authority on validation, but clients can reuse the same types to
//! construct valid events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_ID_LEN: usize = 128;

/// HTTP methods accepted on `DOCUMENT_ENDPOINT`.
pub const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

/// A spec-mutation command approved for a diff.
///
/// Commands are produced by the UI and consumed by the command sink; the
/// session only records them, so their shape stays opaque here.
pub type Command = Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum ReviewEvent {
    #[serde(rename = "DOCUMENT_ENDPOINT")]
    DocumentEndpoint {
        pattern: String,
        method: String,
        #[serde(rename = "pendingId")]
        pending_id: String,
    },
    #[serde(rename = "PENDING_ENDPOINT_STAGED")]
    PendingEndpointStaged { id: String },
    #[serde(rename = "PENDING_ENDPOINT_DISCARDED")]
    PendingEndpointDiscarded { id: String },
    #[serde(rename = "ADD_PATH_IGNORE_RULE")]
    AddPathIgnoreRule { rule: String },
    #[serde(rename = "ADD_DIFF_HASH_IGNORE")]
    AddDiffHashIgnore {
        #[serde(rename = "diffHash")]
        diff_hash: String,
    },
    #[serde(rename = "COMMANDS_APPROVED_FOR_DIFF")]
    CommandsApprovedForDiff {
        #[serde(rename = "diffHash")]
        diff_hash: String,
        #[serde(default)]
        commands: Vec<Command>,
    },
}

impl ReviewEvent {
    /// Wire tag of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ReviewEvent::DocumentEndpoint { .. } => "DOCUMENT_ENDPOINT",
            ReviewEvent::PendingEndpointStaged { .. } => "PENDING_ENDPOINT_STAGED",
            ReviewEvent::PendingEndpointDiscarded { .. } => "PENDING_ENDPOINT_DISCARDED",
            ReviewEvent::AddPathIgnoreRule { .. } => "ADD_PATH_IGNORE_RULE",
            ReviewEvent::AddDiffHashIgnore { .. } => "ADD_DIFF_HASH_IGNORE",
            ReviewEvent::CommandsApprovedForDiff { .. } => "COMMANDS_APPROVED_FOR_DIFF",
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            ReviewEvent::DocumentEndpoint {
                pattern,
                method,
                pending_id,
            } => {
                require_string(pattern, "pattern")?;
                if !pattern.trim_start().starts_with('/') {
                    return Err(ErrorInfo::new(
                        "invalid_pattern",
                        "pattern must start with '/'",
                    ));
                }
                require_method(method)?;
                require_id(pending_id, "pendingId")?;
            }
            ReviewEvent::PendingEndpointStaged { id }
            | ReviewEvent::PendingEndpointDiscarded { id } => {
                require_id(id, "id")?;
            }
            ReviewEvent::AddPathIgnoreRule { rule } => {
                require_string(rule, "rule")?;
                require_rule(rule)?;
            }
            ReviewEvent::AddDiffHashIgnore { diff_hash }
            | ReviewEvent::CommandsApprovedForDiff { diff_hash, .. } => {
                require_string(diff_hash, "diffHash")?;
            }
        }

        Ok(())
    }
}

pub fn parse_event(params: Value) -> Result<ReviewEvent, ErrorInfo> {
    let event: ReviewEvent = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid: {}", err),
        )
    })?;
    event.validate()?;
    Ok(event)
}

/// Parses one JSONL line into a validated event.
pub fn parse_event_line(line: &str) -> Result<ReviewEvent, ErrorInfo> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        ErrorInfo::new("invalid_params", format!("event line is invalid JSON: {}", err))
    })?;
    parse_event(value)
}

fn require_string(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}

fn require_id(value: &str, field: &str) -> Result<(), ErrorInfo> {
    require_string(value, field)?;
    if value.len() > MAX_ID_LEN {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be {} characters or fewer", field, MAX_ID_LEN),
        ));
    }
    Ok(())
}

/// Accepts `"/glob"` or `"METHOD /glob"`.
fn require_rule(rule: &str) -> Result<(), ErrorInfo> {
    let trimmed = rule.trim();
    let glob = match trimmed.split_once(char::is_whitespace) {
        Some((method, rest)) if method.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => trimmed,
    };
    if glob.starts_with('/') && !glob.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ErrorInfo::new(
            "invalid_rule",
            format!("{:?} is not a \"[METHOD ]/path\" rule", rule),
        ))
    }
}

fn require_method(method: &str) -> Result<(), ErrorInfo> {
    require_string(method, "method")?;
    let upper = method.trim().to_ascii_uppercase();
    if HTTP_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(ErrorInfo::new(
            "invalid_method",
            format!("{} is not an HTTP method", method),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(pattern: &str, method: &str, pending_id: &str) -> ReviewEvent {
        ReviewEvent::DocumentEndpoint {
            pattern: pattern.to_string(),
            method: method.to_string(),
            pending_id: pending_id.to_string(),
        }
    }

    #[test]
    fn validates_document_endpoint() {
        assert!(document("/widgets/{id}", "GET", "p1").validate().is_ok());
    }

    #[test]
    fn method_is_case_insensitive() {
        assert!(document("/widgets", "patch", "p1").validate().is_ok());
    }

    #[test]
    fn rejects_empty_pattern() {
        let err = document("  ", "GET", "p1").validate().unwrap_err();
        assert_eq!(err.code, "missing_field");
    }

    #[test]
    fn rejects_relative_pattern() {
        let err = document("widgets", "GET", "p1").validate().unwrap_err();
        assert_eq!(err.code, "invalid_pattern");
    }

    #[test]
    fn rejects_empty_method() {
        let err = document("/widgets", "", "p1").validate().unwrap_err();
        assert_eq!(err.code, "missing_field");
    }

    #[test]
    fn rejects_unknown_method() {
        let err = document("/widgets", "FETCH", "p1").validate().unwrap_err();
        assert_eq!(err.code, "invalid_method");
    }

    #[test]
    fn rejects_long_pending_id() {
        let err = document("/widgets", "GET", &"a".repeat(256))
            .validate()
            .unwrap_err();
        assert_eq!(err.code, "invalid_id");
    }

    #[test]
    fn rejects_blank_stage_id() {
        let event = ReviewEvent::PendingEndpointStaged { id: " ".to_string() };
        assert!(event.validate().is_err());
    }

    #[test]
    fn rejects_blank_diff_hash() {
        let event = ReviewEvent::CommandsApprovedForDiff {
            diff_hash: String::new(),
            commands: vec![json!({"AddField": {}})],
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn parses_wire_names() {
        let event = parse_event(json!({
            "type": "DOCUMENT_ENDPOINT",
            "pattern": "/widgets/{id}",
            "method": "GET",
            "pendingId": "p1"
        }))
        .unwrap();
        assert_eq!(event, document("/widgets/{id}", "GET", "p1"));
        assert_eq!(event.name(), "DOCUMENT_ENDPOINT");
    }

    #[test]
    fn approval_without_commands_defaults_to_empty() {
        let event = parse_event(json!({
            "type": "COMMANDS_APPROVED_FOR_DIFF",
            "diffHash": "d1"
        }))
        .unwrap();
        assert_eq!(
            event,
            ReviewEvent::CommandsApprovedForDiff {
                diff_hash: "d1".to_string(),
                commands: vec![],
            }
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let value = serde_json::to_value(ReviewEvent::AddDiffHashIgnore {
            diff_hash: "abc123".to_string(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "ADD_DIFF_HASH_IGNORE", "diffHash": "abc123"})
        );
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse_event(json!({"type": "CLOSE_SESSION"})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_missing_field_in_payload() {
        let err = parse_event(json!({"type": "PENDING_ENDPOINT_STAGED"})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_unknown_field() {
        let err = parse_event(json!({
            "type": "PENDING_ENDPOINT_STAGED",
            "id": "p1",
            "pendingId": "oops"
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn accepts_method_scoped_ignore_rule() {
        let event = ReviewEvent::AddPathIgnoreRule {
            rule: "GET /assets/**".to_string(),
        };
        assert!(event.validate().is_ok());
    }

    #[test]
    fn rejects_ignore_rule_without_leading_slash() {
        for rule in ["health", "GET health", "GET POST /x", "/a b"] {
            let event = ReviewEvent::AddPathIgnoreRule {
                rule: rule.to_string(),
            };
            assert_eq!(event.validate().unwrap_err().code, "invalid_rule", "{rule}");
        }
    }

    #[test]
    fn parse_event_line_reports_bad_json() {
        let err = parse_event_line("{not json").unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }
}
