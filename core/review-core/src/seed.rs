//! Session seed files: the spec snapshot plus the diff run to review.
//!
//! ```json
//! {
//!   "endpoints": [{ "endpointId": "e1", "pathPattern": "/widgets/{id}", "method": "GET" }],
//!   "requests": [],
//!   "responses": [],
//!   "diffs": [[{ "UnmatchedResponseBodyShape": {} }, ["interaction-1"]]],
//!   "urls": [{ "path": "/gadgets", "method": "GET", "count": 2 }]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::parse_diffs;
use crate::error::{ReviewError, Result};
use crate::machine::{MachineOptions, SessionMachine};
use crate::spec::{CurrentSpecSnapshot, Endpoint, RequestBody, ResponseBody};
use crate::urls::UndocumentedUrl;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSeed {
    pub endpoints: Vec<Endpoint>,
    pub requests: Vec<RequestBody>,
    pub responses: Vec<ResponseBody>,
    pub diffs: Vec<Value>,
    pub urls: Vec<UndocumentedUrl>,
}

impl SessionSeed {
    pub fn from_json_str(content: &str, context: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| ReviewError::Json {
            context: context.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).map_err(|source| ReviewError::Io {
            context: format!("reading seed {}", path.display()),
            source,
        })?;
        Self::from_json_str(&content, &format!("parsing seed {}", path.display()))
    }

    pub fn into_machine(self, options: MachineOptions) -> SessionMachine {
        let spec = CurrentSpecSnapshot::new(self.endpoints, self.requests, self.responses);
        let diffs = parse_diffs(&self.diffs);
        SessionMachine::with_options(Arc::new(spec), diffs, self.urls, options)
    }
}
