//! The contract the UI and query layer consume.
//!
//! Every mutation becomes one [`ReviewEvent`] sent through the machine; every
//! read goes to the latest published snapshot. The only state kept here is
//! the WIP pattern drafts, which never reach the machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use specreview_protocol::{Command, ReviewEvent};

use crate::diff::ParsedDiff;
use crate::error::Result;
use crate::ids::{IdGenerator, UlidIdGenerator};
use crate::machine::SessionMachine;
use crate::registry::{Outcome, PendingEndpoint, ReviewRegistry, ReviewSummary};
use crate::spec::CurrentSpecSnapshot;
use crate::urls::{normalize_method, normalize_path, PathComponent, UndocumentedUrl};

const MAX_ID_ATTEMPTS: usize = 8;

type WipKey = (String, String);

pub struct SessionFacade {
    machine: Arc<SessionMachine>,
    ids: Box<dyn IdGenerator>,
    wip_patterns: Mutex<HashMap<WipKey, Vec<PathComponent>>>,
}

impl SessionFacade {
    pub fn new(machine: Arc<SessionMachine>) -> Self {
        Self::with_id_generator(machine, Box::new(UlidIdGenerator::new()))
    }

    pub fn with_id_generator(machine: Arc<SessionMachine>, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            machine,
            ids,
            wip_patterns: Mutex::new(HashMap::new()),
        }
    }

    pub fn machine(&self) -> &Arc<SessionMachine> {
        &self.machine
    }

    pub fn snapshot(&self) -> Arc<ReviewRegistry> {
        self.machine.snapshot()
    }

    pub fn current_spec(&self) -> Arc<CurrentSpecSnapshot> {
        Arc::clone(self.snapshot().spec())
    }

    // ── Mutations ──

    /// Records a new pending endpoint and returns its freshly generated id.
    pub fn document_endpoint(&self, pattern: &str, method: &str) -> Result<String> {
        let id = self.fresh_id();
        self.machine.send(ReviewEvent::DocumentEndpoint {
            pattern: pattern.to_string(),
            method: method.to_string(),
            pending_id: id.clone(),
        })?;
        Ok(id)
    }

    pub fn stage_endpoint(&self, id: &str) -> Result<Outcome> {
        self.machine
            .send(ReviewEvent::PendingEndpointStaged { id: id.to_string() })
    }

    pub fn discard_endpoint(&self, id: &str) -> Result<Outcome> {
        self.machine
            .send(ReviewEvent::PendingEndpointDiscarded { id: id.to_string() })
    }

    pub fn add_path_ignore_rule(&self, rule: &str) -> Result<Outcome> {
        self.machine.send(ReviewEvent::AddPathIgnoreRule {
            rule: rule.to_string(),
        })
    }

    pub fn add_diff_hash_ignore(&self, diff_hash: &str) -> Result<Outcome> {
        self.machine.send(ReviewEvent::AddDiffHashIgnore {
            diff_hash: diff_hash.to_string(),
        })
    }

    pub fn approve_commands_for_diff(
        &self,
        diff_hash: &str,
        commands: Vec<Command>,
    ) -> Result<Outcome> {
        self.machine.send(ReviewEvent::CommandsApprovedForDiff {
            diff_hash: diff_hash.to_string(),
            commands,
        })
    }

    // ── Reads ──

    pub fn get_pending_endpoint_by_id(&self, id: &str) -> Option<PendingEndpoint> {
        self.snapshot().find_pending_endpoint(id).cloned()
    }

    pub fn is_diff_handled(&self, diff_hash: &str) -> bool {
        self.snapshot().is_diff_handled(diff_hash)
    }

    pub fn pending_endpoints(&self) -> Vec<PendingEndpoint> {
        self.snapshot().pending_endpoints().to_vec()
    }

    pub fn unhandled_diffs(&self) -> Vec<ParsedDiff> {
        self.snapshot().unhandled_diffs().cloned().collect()
    }

    pub fn visible_undocumented_urls(&self) -> Vec<UndocumentedUrl> {
        self.snapshot()
            .visible_undocumented_urls()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> ReviewSummary {
        self.snapshot().summary()
    }

    // ── WIP drafts ──

    /// Saves an in-progress path authoring form. Drafts are session-local
    /// and never become events.
    pub fn persist_wip_pattern(&self, path: &str, method: &str, components: Vec<PathComponent>) {
        self.wip_patterns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(wip_key(path, method), components);
    }

    pub fn get_wip_pattern(&self, path: &str, method: &str) -> Option<Vec<PathComponent>> {
        self.wip_patterns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&wip_key(path, method))
            .cloned()
    }

    pub fn wip_patterns(&self) -> HashMap<WipKey, Vec<PathComponent>> {
        self.wip_patterns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn fresh_id(&self) -> String {
        let registry = self.snapshot();
        let mut candidate = self.ids.next_id();
        for _ in 1..MAX_ID_ATTEMPTS {
            if !registry.contains_pending_id(&candidate) {
                return candidate;
            }
            tracing::debug!(id = %candidate, "Generated id already pending; retrying");
            candidate = self.ids.next_id();
        }
        // Generator keeps colliding; disambiguate deterministically.
        let base = candidate;
        let mut suffix = 1;
        let mut id = format!("{base}-{suffix}");
        while registry.contains_pending_id(&id) {
            suffix += 1;
            id = format!("{base}-{suffix}");
        }
        id
    }
}

fn wip_key(path: &str, method: &str) -> WipKey {
    (normalize_path(path), normalize_method(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGenerator;
    use crate::registry::PendingStatus;
    use serde_json::json;

    struct FixedIds(&'static str);

    impl IdGenerator for FixedIds {
        fn next_id(&self) -> String {
            self.0.to_string()
        }
    }

    fn facade_with(ids: Box<dyn IdGenerator>) -> SessionFacade {
        let machine = Arc::new(SessionMachine::new(
            Arc::new(CurrentSpecSnapshot::empty()),
            vec![],
            vec![],
        ));
        SessionFacade::with_id_generator(machine, ids)
    }

    fn facade() -> SessionFacade {
        facade_with(Box::new(SequentialIdGenerator::with_prefix("p")))
    }

    #[test]
    fn document_endpoint_returns_generated_id() {
        let facade = facade();
        let id = facade.document_endpoint("/widgets/{id}", "GET").unwrap();
        assert_eq!(id, "p1");
        let pending = facade.get_pending_endpoint_by_id(&id).unwrap();
        assert_eq!(pending.status, PendingStatus::Unstaged);
        assert_eq!(facade.document_endpoint("/gadgets", "GET").unwrap(), "p2");
    }

    #[test]
    fn colliding_generator_gets_suffixed_id() {
        let facade = facade_with(Box::new(FixedIds("same")));
        assert_eq!(facade.document_endpoint("/a", "GET").unwrap(), "same");
        assert_eq!(facade.document_endpoint("/b", "GET").unwrap(), "same-1");
        assert_eq!(facade.document_endpoint("/c", "GET").unwrap(), "same-2");
        assert_eq!(facade.pending_endpoints().len(), 3);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let facade = facade();
        assert!(facade.document_endpoint("", "GET").is_err());
        assert!(facade.pending_endpoints().is_empty());
    }

    #[test]
    fn stage_and_discard_forward_to_machine() {
        let facade = facade();
        let id = facade.document_endpoint("/a", "GET").unwrap();
        assert_eq!(facade.stage_endpoint(&id).unwrap(), Outcome::Applied);
        assert_eq!(
            facade.get_pending_endpoint_by_id(&id).unwrap().status,
            PendingStatus::Staged
        );
        assert_eq!(facade.discard_endpoint(&id).unwrap(), Outcome::Applied);
        assert!(facade.get_pending_endpoint_by_id(&id).is_none());
        assert!(facade.discard_endpoint(&id).unwrap().is_noop());
    }

    #[test]
    fn approvals_and_ignores_mark_handled() {
        let facade = facade();
        facade
            .approve_commands_for_diff("d1", vec![json!({"AddField": {}})])
            .unwrap();
        facade.add_diff_hash_ignore("d2").unwrap();
        facade.add_path_ignore_rule("/health").unwrap();
        assert!(facade.is_diff_handled("d1"));
        assert!(facade.is_diff_handled("d2"));
        assert!(!facade.is_diff_handled("d3"));
        assert_eq!(facade.summary().path_ignore_rules, 1);
    }

    #[test]
    fn wip_patterns_are_keyed_by_normalized_path_and_method() {
        let facade = facade();
        let components = vec![PathComponent {
            name: "id".to_string(),
            is_parameter: true,
        }];
        facade.persist_wip_pattern("/widgets/1/", "get", components.clone());
        assert_eq!(
            facade.get_wip_pattern("/widgets/1", "GET"),
            Some(components.clone())
        );
        assert!(facade.get_wip_pattern("/widgets/1", "POST").is_none());
        assert_eq!(facade.wip_patterns().len(), 1);

        facade.persist_wip_pattern("/widgets/1", "GET", vec![]);
        assert_eq!(facade.get_wip_pattern("/widgets/1", "GET"), Some(vec![]));
    }

    #[test]
    fn wip_patterns_never_touch_the_machine() {
        let facade = facade();
        facade.persist_wip_pattern("/a", "GET", vec![]);
        assert_eq!(facade.snapshot().version(), 0);
        assert!(facade.machine().history().is_empty());
    }
}
