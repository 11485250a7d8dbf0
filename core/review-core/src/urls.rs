//! Observed URLs with no documented endpoint, and path pattern helpers.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Normalizes a path for consistent comparison.
///
/// Collapses repeated slashes and strips trailing slashes (except for root
/// "/") so that "/widgets//1/" and "/widgets/1" compare equal.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

pub fn normalize_method(method: &str) -> String {
    method.trim().to_ascii_uppercase()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathComponent {
    pub name: String,
    pub is_parameter: bool,
}

fn parameter_name(segment: &str) -> Option<&str> {
    if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        return Some(inner);
    }
    segment.strip_prefix(':')
}

/// Splits a pattern such as `/widgets/{id}` into its components.
/// `:id` is accepted as a parameter as well.
pub fn path_components(pattern: &str) -> Vec<PathComponent> {
    segments(pattern)
        .map(|segment| match parameter_name(segment) {
            Some(name) if !name.is_empty() => PathComponent {
                name: name.to_string(),
                is_parameter: true,
            },
            _ => PathComponent {
                name: segment.to_string(),
                is_parameter: false,
            },
        })
        .collect()
}

/// Segment-wise match; parameter segments match any single segment.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let components = path_components(pattern);
    let parts: Vec<&str> = segments(path).collect();
    components.len() == parts.len()
        && components
            .iter()
            .zip(parts)
            .all(|(component, part)| component.is_parameter || component.name == part)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndocumentedUrl {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub interaction_pointers: Vec<String>,
}

impl UndocumentedUrl {
    pub fn new(path: &str, method: &str, count: u64) -> Self {
        Self {
            path: normalize_path(path),
            method: normalize_method(method),
            count,
            interaction_pointers: Vec::new(),
        }
    }

    fn normalized(mut self) -> Self {
        self.path = normalize_path(&self.path);
        self.method = normalize_method(&self.method);
        self
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.path, &self.method)
    }
}

/// Normalizes and merges seed URLs so each (path, method) appears once.
/// Counts are summed, pointers unioned, and first-seen order is kept.
pub fn merge_urls(urls: impl IntoIterator<Item = UndocumentedUrl>) -> Vec<UndocumentedUrl> {
    let mut merged: Vec<UndocumentedUrl> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut seen: Vec<HashSet<String>> = Vec::new();
    for url in urls.into_iter().map(UndocumentedUrl::normalized) {
        let key = (url.path.clone(), url.method.clone());
        match index.get(&key) {
            Some(&slot) => {
                let existing = &mut merged[slot];
                existing.count += url.count;
                for pointer in url.interaction_pointers {
                    if seen[slot].insert(pointer.clone()) {
                        existing.interaction_pointers.push(pointer);
                    }
                }
            }
            None => {
                index.insert(key, merged.len());
                seen.push(url.interaction_pointers.iter().cloned().collect());
                merged.push(url);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/widgets/"), "/widgets");
        assert_eq!(normalize_path("//widgets//1"), "/widgets/1");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_path_components() {
        let components = path_components("/widgets/{id}/parts/:partId");
        assert_eq!(
            components,
            vec![
                PathComponent {
                    name: "widgets".to_string(),
                    is_parameter: false
                },
                PathComponent {
                    name: "id".to_string(),
                    is_parameter: true
                },
                PathComponent {
                    name: "parts".to_string(),
                    is_parameter: false
                },
                PathComponent {
                    name: "partId".to_string(),
                    is_parameter: true
                },
            ]
        );
    }

    #[test]
    fn empty_braces_stay_literal() {
        let components = path_components("/{}");
        assert!(!components[0].is_parameter);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("/widgets/{id}", "/widgets/42"));
        assert!(pattern_matches("/widgets/{id}", "/widgets/42/"));
        assert!(!pattern_matches("/widgets/{id}", "/widgets"));
        assert!(!pattern_matches("/widgets/{id}", "/widgets/42/parts"));
        assert!(!pattern_matches("/gadgets/{id}", "/widgets/42"));
        assert!(pattern_matches("/", "/"));
    }

    #[test]
    fn test_merge_urls_combines_duplicates() {
        let mut a = UndocumentedUrl::new("/widgets/1/", "get", 2);
        a.interaction_pointers = vec!["i1".to_string()];
        let mut b = UndocumentedUrl::new("/widgets/1", "GET", 3);
        b.interaction_pointers = vec!["i1".to_string(), "i2".to_string()];
        let c = UndocumentedUrl::new("/widgets/1", "POST", 1);

        let merged = merge_urls(vec![a, b, c]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].count, 5);
        assert_eq!(merged[0].interaction_pointers, vec!["i1", "i2"]);
        assert_eq!(merged[1].method, "POST");
    }

    #[test]
    fn merge_normalizes_deserialized_urls() {
        let url: UndocumentedUrl =
            serde_json::from_str(r#"{"path": "/a/", "method": "get"}"#).unwrap();
        let merged = merge_urls(vec![url]);
        assert_eq!(merged[0].key(), ("/a", "GET"));
        assert_eq!(merged[0].count, 0);
    }
}
