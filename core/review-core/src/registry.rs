//! Review state and the reducer that applies events to it.
//!
//! A registry value is never mutated in place once published: [`ReviewRegistry::reduce`]
//! returns the next value and leaves `self` untouched, so the state after any
//! event sequence is a strict left fold over that sequence.
//!
//! Canonical event → effect mapping:
//!
//! ```text
//! DOCUMENT_ENDPOINT           -> insert pending (Unstaged); same id replaces in place
//! PENDING_ENDPOINT_STAGED     -> Unstaged|Staged -> Staged; unknown id is a no-op
//! PENDING_ENDPOINT_DISCARDED  -> remove pending; unknown id is a no-op
//! ADD_PATH_IGNORE_RULE        -> set insert
//! ADD_DIFF_HASH_IGNORE        -> set insert
//! COMMANDS_APPROVED_FOR_DIFF  -> upsert, latest approval wins
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use specreview_protocol::{Command, ReviewEvent};

use crate::diff::{merge_diffs, ParsedDiff};
use crate::error::{ReviewError, Result};
use crate::ignore::{compile_rules, is_ignored};
use crate::spec::CurrentSpecSnapshot;
use crate::urls::{
    merge_urls, normalize_method, normalize_path, path_components, pattern_matches,
    PathComponent, UndocumentedUrl,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingStatus {
    Unstaged,
    Staged,
    /// Part of the status vocabulary shared with clients. The registry never
    /// stores it: discarding removes the entry outright.
    Discarded,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Unstaged => "Unstaged",
            PendingStatus::Staged => "Staged",
            PendingStatus::Discarded => "Discarded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEndpoint {
    pub id: String,
    pub pattern: String,
    pub method: String,
    pub status: PendingStatus,
    pub path_components: Vec<PathComponent>,
}

impl PendingEndpoint {
    /// True if this endpoint would document the given concrete URL.
    pub fn covers(&self, path: &str, method: &str) -> bool {
        self.method == normalize_method(method) && pattern_matches(&self.pattern, path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedSuggestion {
    pub diff_hash: String,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoOpReason {
    UnknownReference { id: String },
}

/// What applying one event did to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// A `DOCUMENT_ENDPOINT` reused an id that was still pending.
    Replaced { previous_status: PendingStatus },
    NoOp { reason: NoOpReason },
}

impl Outcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, Outcome::NoOp { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReducerPolicy {
    /// Reject re-documenting a staged id instead of overwriting it.
    pub strict_staged_reuse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub version: u64,
    pub diffs_total: usize,
    pub diffs_handled: usize,
    pub urls_total: usize,
    pub urls_visible: usize,
    pub pending_unstaged: usize,
    pub pending_staged: usize,
    pub approvals: usize,
    pub path_ignore_rules: usize,
    pub diff_hash_ignores: usize,
}

/// The mutable part of a registry, in a comparable and serializable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryState {
    pub version: u64,
    pub pending_endpoints: Vec<PendingEndpoint>,
    pub path_ignore_rules: Vec<String>,
    pub diff_hash_ignores: Vec<String>,
    pub approved_suggestions: Vec<ApprovedSuggestion>,
}

#[derive(Debug, Clone)]
pub struct ReviewRegistry {
    spec: Arc<CurrentSpecSnapshot>,
    diffs: Arc<Vec<ParsedDiff>>,
    urls: Arc<Vec<UndocumentedUrl>>,
    pending: Vec<PendingEndpoint>,
    path_ignore_rules: BTreeSet<String>,
    diff_hash_ignores: BTreeSet<String>,
    approved: BTreeMap<String, Vec<Command>>,
    version: u64,
}

impl ReviewRegistry {
    /// Seeds a registry. Diffs are merged by fingerprint and URLs by
    /// (normalized path, method); neither is re-ingested later.
    pub fn new(
        spec: Arc<CurrentSpecSnapshot>,
        diffs: Vec<ParsedDiff>,
        urls: Vec<UndocumentedUrl>,
    ) -> Self {
        Self {
            spec,
            diffs: Arc::new(merge_diffs(diffs)),
            urls: Arc::new(merge_urls(urls)),
            pending: Vec::new(),
            path_ignore_rules: BTreeSet::new(),
            diff_hash_ignores: BTreeSet::new(),
            approved: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(CurrentSpecSnapshot::empty()), Vec::new(), Vec::new())
    }

    /// Applies one event and returns the next registry value.
    ///
    /// Malformed events (and staged-id reuse under a strict policy) are
    /// rejected; `self` is unchanged either way.
    pub fn reduce(
        &self,
        event: &ReviewEvent,
        policy: &ReducerPolicy,
    ) -> Result<(ReviewRegistry, Outcome)> {
        event.validate()?;

        let mut next = self.clone();
        let outcome = match event {
            ReviewEvent::DocumentEndpoint {
                pattern,
                method,
                pending_id,
            } => next.document_endpoint(pattern, method, pending_id, policy)?,
            ReviewEvent::PendingEndpointStaged { id } => next.stage(id),
            ReviewEvent::PendingEndpointDiscarded { id } => next.discard(id),
            ReviewEvent::AddPathIgnoreRule { rule } => {
                next.path_ignore_rules.insert(rule.trim().to_string());
                Outcome::Applied
            }
            ReviewEvent::AddDiffHashIgnore { diff_hash } => {
                next.diff_hash_ignores.insert(diff_hash.trim().to_string());
                Outcome::Applied
            }
            ReviewEvent::CommandsApprovedForDiff {
                diff_hash,
                commands,
            } => {
                let diff_hash = diff_hash.trim();
                if let Some(previous) = next
                    .approved
                    .insert(diff_hash.to_string(), commands.clone())
                {
                    tracing::debug!(
                        diff_hash = %diff_hash,
                        previous = previous.len(),
                        commands = commands.len(),
                        "Approval replaced"
                    );
                }
                Outcome::Applied
            }
        };
        next.version += 1;
        Ok((next, outcome))
    }

    fn document_endpoint(
        &mut self,
        pattern: &str,
        method: &str,
        id: &str,
        policy: &ReducerPolicy,
    ) -> Result<Outcome> {
        let pattern = normalize_path(pattern.trim());
        let entry = PendingEndpoint {
            id: id.to_string(),
            path_components: path_components(&pattern),
            pattern,
            method: normalize_method(method),
            status: PendingStatus::Unstaged,
        };

        match self.pending.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                let previous_status = existing.status;
                if previous_status == PendingStatus::Staged {
                    if policy.strict_staged_reuse {
                        tracing::warn!(id = %id, "Rejected re-documentation of staged endpoint");
                        return Err(ReviewError::DuplicateIdReuse { id: id.to_string() });
                    }
                    tracing::warn!(
                        id = %id,
                        pattern = %entry.pattern,
                        "Staged endpoint re-documented; overwriting"
                    );
                }
                *existing = entry;
                Ok(Outcome::Replaced { previous_status })
            }
            None => {
                self.pending.push(entry);
                Ok(Outcome::Applied)
            }
        }
    }

    fn stage(&mut self, id: &str) -> Outcome {
        match self.pending.iter_mut().find(|p| p.id == id) {
            Some(pending) => {
                pending.status = PendingStatus::Staged;
                Outcome::Applied
            }
            None => unknown_reference("stage", id),
        }
    }

    fn discard(&mut self, id: &str) -> Outcome {
        match self.pending.iter().position(|p| p.id == id) {
            Some(index) => {
                self.pending.remove(index);
                Outcome::Applied
            }
            None => unknown_reference("discard", id),
        }
    }

    // ── Queries ──

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn spec(&self) -> &Arc<CurrentSpecSnapshot> {
        &self.spec
    }

    pub fn diffs(&self) -> &[ParsedDiff] {
        &self.diffs
    }

    pub fn undocumented_urls(&self) -> &[UndocumentedUrl] {
        &self.urls
    }

    pub fn find_pending_endpoint(&self, id: &str) -> Option<&PendingEndpoint> {
        self.pending.iter().find(|p| p.id == id)
    }

    pub fn pending_endpoints(&self) -> &[PendingEndpoint] {
        &self.pending
    }

    pub fn contains_pending_id(&self, id: &str) -> bool {
        self.find_pending_endpoint(id).is_some()
    }

    pub fn staged_endpoints(&self) -> impl Iterator<Item = &PendingEndpoint> {
        self.pending
            .iter()
            .filter(|p| p.status == PendingStatus::Staged)
    }

    pub fn is_diff_handled(&self, diff_hash: &str) -> bool {
        let diff_hash = diff_hash.trim();
        self.approved.contains_key(diff_hash) || self.diff_hash_ignores.contains(diff_hash)
    }

    pub fn approved_commands(&self, diff_hash: &str) -> Option<&[Command]> {
        self.approved.get(diff_hash.trim()).map(Vec::as_slice)
    }

    /// Approvals ordered by diff hash.
    pub fn approved_suggestions(&self) -> Vec<ApprovedSuggestion> {
        self.approved
            .iter()
            .map(|(diff_hash, commands)| ApprovedSuggestion {
                diff_hash: diff_hash.clone(),
                commands: commands.clone(),
            })
            .collect()
    }

    pub fn path_ignore_rules(&self) -> impl Iterator<Item = &str> {
        self.path_ignore_rules.iter().map(String::as_str)
    }

    pub fn diff_hash_ignores(&self) -> impl Iterator<Item = &str> {
        self.diff_hash_ignores.iter().map(String::as_str)
    }

    // ── Derived views ──

    pub fn unhandled_diffs(&self) -> impl Iterator<Item = &ParsedDiff> {
        self.diffs
            .iter()
            .filter(|d| !self.is_diff_handled(d.diff_hash()))
    }

    /// Undocumented URLs not hidden by an ignore rule or a pending endpoint.
    pub fn visible_undocumented_urls(&self) -> Vec<&UndocumentedUrl> {
        let rules = compile_rules(&self.path_ignore_rules);
        self.urls
            .iter()
            .filter(|url| !is_ignored(&rules, &url.path, &url.method))
            .filter(|url| !self.pending.iter().any(|p| p.covers(&url.path, &url.method)))
            .collect()
    }

    /// Approvals in the order the command sink should apply them: seeded
    /// diff order first, then approvals for unknown hashes by hash.
    pub fn suggestions_for_sink(&self) -> Vec<ApprovedSuggestion> {
        let mut ordered: Vec<ApprovedSuggestion> = Vec::with_capacity(self.approved.len());
        for diff in self.diffs.iter() {
            if let Some(commands) = self.approved.get(diff.diff_hash()) {
                ordered.push(ApprovedSuggestion {
                    diff_hash: diff.diff_hash().to_string(),
                    commands: commands.clone(),
                });
            }
        }
        for (diff_hash, commands) in &self.approved {
            if !self.diffs.iter().any(|d| d.diff_hash() == diff_hash) {
                ordered.push(ApprovedSuggestion {
                    diff_hash: diff_hash.clone(),
                    commands: commands.clone(),
                });
            }
        }
        ordered
    }

    pub fn commands_for_sink(&self) -> Vec<Command> {
        self.suggestions_for_sink()
            .into_iter()
            .flat_map(|s| s.commands)
            .collect()
    }

    pub fn summary(&self) -> ReviewSummary {
        ReviewSummary {
            version: self.version,
            diffs_total: self.diffs.len(),
            diffs_handled: self
                .diffs
                .iter()
                .filter(|d| self.is_diff_handled(d.diff_hash()))
                .count(),
            urls_total: self.urls.len(),
            urls_visible: self.visible_undocumented_urls().len(),
            pending_unstaged: self
                .pending
                .iter()
                .filter(|p| p.status == PendingStatus::Unstaged)
                .count(),
            pending_staged: self.staged_endpoints().count(),
            approvals: self.approved.len(),
            path_ignore_rules: self.path_ignore_rules.len(),
            diff_hash_ignores: self.diff_hash_ignores.len(),
        }
    }

    pub fn state(&self) -> RegistryState {
        RegistryState {
            version: self.version,
            pending_endpoints: self.pending.clone(),
            path_ignore_rules: self.path_ignore_rules.iter().cloned().collect(),
            diff_hash_ignores: self.diff_hash_ignores.iter().cloned().collect(),
            approved_suggestions: self.approved_suggestions(),
        }
    }
}

fn unknown_reference(action: &str, id: &str) -> Outcome {
    tracing::debug!(id = %id, action, "Unknown pending endpoint id; ignoring");
    Outcome::NoOp {
        reason: NoOpReason::UnknownReference { id: id.to_string() },
    }
}
