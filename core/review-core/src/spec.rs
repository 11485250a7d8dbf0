//! Read-only view of the specification in force when a review session starts.
//!
//! The snapshot is shared behind `Arc` by the registry, the facade, and any
//! rendered views. Nothing in a session mutates its spec data; only the
//! provisional id counter advances.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::urls::{normalize_method, path_components, pattern_matches, PathComponent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub endpoint_id: String,
    pub path_pattern: String,
    pub method: String,
    #[serde(default)]
    pub path_components: Vec<PathComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub request_id: String,
    pub endpoint_id: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub root_shape_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub response_id: String,
    pub endpoint_id: String,
    pub status_code: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub root_shape_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainIdKind {
    Shape,
    Field,
    Request,
    Response,
    Path,
}

impl DomainIdKind {
    fn prefix(self) -> &'static str {
        match self {
            DomainIdKind::Shape => "shape_",
            DomainIdKind::Field => "field_",
            DomainIdKind::Request => "request_",
            DomainIdKind::Response => "response_",
            DomainIdKind::Path => "path_",
        }
    }
}

/// Provisional ids for spec entities authored during a session.
#[derive(Debug, Default)]
pub struct DomainIdGenerator {
    counter: AtomicU64,
}

impl DomainIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, kind: DomainIdKind) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}{}", kind.prefix(), n)
    }

    pub fn shape(&self) -> String {
        self.next(DomainIdKind::Shape)
    }

    pub fn field(&self) -> String {
        self.next(DomainIdKind::Field)
    }

    pub fn path(&self) -> String {
        self.next(DomainIdKind::Path)
    }
}

#[derive(Debug, Default)]
pub struct CurrentSpecSnapshot {
    endpoints: Vec<Endpoint>,
    requests: Vec<RequestBody>,
    responses: Vec<ResponseBody>,
    domain_ids: DomainIdGenerator,
}

impl CurrentSpecSnapshot {
    pub fn new(
        endpoints: Vec<Endpoint>,
        requests: Vec<RequestBody>,
        responses: Vec<ResponseBody>,
    ) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|mut endpoint| {
                endpoint.method = normalize_method(&endpoint.method);
                if endpoint.path_components.is_empty() {
                    endpoint.path_components = path_components(&endpoint.path_pattern);
                }
                endpoint
            })
            .collect();
        Self {
            endpoints,
            requests,
            responses,
            domain_ids: DomainIdGenerator::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn requests(&self) -> &[RequestBody] {
        &self.requests
    }

    pub fn responses(&self) -> &[ResponseBody] {
        &self.responses
    }

    pub fn requests_for<'a>(
        &'a self,
        endpoint_id: &'a str,
    ) -> impl Iterator<Item = &'a RequestBody> {
        self.requests
            .iter()
            .filter(move |r| r.endpoint_id == endpoint_id)
    }

    pub fn responses_for<'a>(
        &'a self,
        endpoint_id: &'a str,
    ) -> impl Iterator<Item = &'a ResponseBody> {
        self.responses
            .iter()
            .filter(move |r| r.endpoint_id == endpoint_id)
    }

    /// Finds the documented endpoint whose pattern matches a concrete path.
    pub fn find_endpoint(&self, path: &str, method: &str) -> Option<&Endpoint> {
        let method = normalize_method(method);
        self.endpoints
            .iter()
            .find(|e| e.method == method && pattern_matches(&e.path_pattern, path))
    }

    pub fn domain_ids(&self) -> &DomainIdGenerator {
        &self.domain_ids
    }
}
