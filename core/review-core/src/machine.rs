//! Single-writer coordinator that owns the current registry value.
//!
//! Readers take an `Arc<ReviewRegistry>` snapshot and never see a partially
//! applied event: `send` builds the next registry off to the side and swaps
//! the `Arc` in one step. Writers are serialized, so events are applied in
//! exactly the order they are sent.
//!
//! Observers run on the sending thread once the writer lock is released, so
//! they may call [`SessionMachine::send`] themselves. With several sending
//! threads, notifications for different events can arrive out of order; each
//! observer call carries the registry its event produced.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use specreview_protocol::ReviewEvent;

use crate::config::{ReviewConfig, DEFAULT_MAX_HISTORY};
use crate::diff::ParsedDiff;
use crate::error::{ReviewError, Result};
use crate::registry::{Outcome, ReducerPolicy, ReviewRegistry};
use crate::spec::CurrentSpecSnapshot;
use crate::urls::UndocumentedUrl;

pub type Observer = dyn Fn(&Arc<ReviewRegistry>, &ReviewEvent, &Outcome) + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineOptions {
    pub policy: ReducerPolicy,
    pub max_history: usize,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            policy: ReducerPolicy::default(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl From<&ReviewConfig> for MachineOptions {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            policy: config.policy(),
            max_history: config.session.max_history,
        }
    }
}

/// An event skipped during [`SessionMachine::replay`].
#[derive(Debug)]
pub struct Rejection {
    pub index: usize,
    pub error: ReviewError,
}

#[derive(Default)]
struct History {
    events: VecDeque<ReviewEvent>,
    truncated: bool,
}

pub struct SessionMachine {
    seed: Arc<ReviewRegistry>,
    writer: Mutex<()>,
    current: RwLock<Arc<ReviewRegistry>>,
    history: Mutex<History>,
    observers: Mutex<Vec<(SubscriptionId, Arc<Observer>)>>,
    next_subscription: AtomicU64,
    options: MachineOptions,
}

impl SessionMachine {
    pub fn new(
        spec: Arc<CurrentSpecSnapshot>,
        diffs: Vec<ParsedDiff>,
        urls: Vec<UndocumentedUrl>,
    ) -> Self {
        Self::with_options(spec, diffs, urls, MachineOptions::default())
    }

    pub fn with_options(
        spec: Arc<CurrentSpecSnapshot>,
        diffs: Vec<ParsedDiff>,
        urls: Vec<UndocumentedUrl>,
        options: MachineOptions,
    ) -> Self {
        Self::from_registry(ReviewRegistry::new(spec, diffs, urls), options)
    }

    pub fn from_registry(registry: ReviewRegistry, options: MachineOptions) -> Self {
        let seed = Arc::new(registry);
        tracing::debug!(
            diffs = seed.diffs().len(),
            urls = seed.undocumented_urls().len(),
            endpoints = seed.spec().endpoints().len(),
            "Review session started"
        );
        Self {
            current: RwLock::new(Arc::clone(&seed)),
            seed,
            writer: Mutex::new(()),
            history: Mutex::new(History::default()),
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            options,
        }
    }

    /// Builds a machine and applies `events` in order. Rejected events are
    /// logged, skipped, and returned alongside the machine.
    pub fn replay(
        spec: Arc<CurrentSpecSnapshot>,
        diffs: Vec<ParsedDiff>,
        urls: Vec<UndocumentedUrl>,
        events: impl IntoIterator<Item = ReviewEvent>,
        options: MachineOptions,
    ) -> (Self, Vec<Rejection>) {
        let machine = Self::with_options(spec, diffs, urls, options);
        let mut rejections = Vec::new();
        for (index, event) in events.into_iter().enumerate() {
            if let Err(error) = machine.send(event) {
                rejections.push(Rejection { index, error });
            }
        }
        (machine, rejections)
    }

    /// Applies one event and publishes the resulting registry.
    pub fn send(&self, event: ReviewEvent) -> Result<Outcome> {
        let (next, outcome) = {
            // Recover from poisoning: published registries are immutable, so a
            // panic mid-send cannot leave one half-written.
            let _writer = self
                .writer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let base = self.snapshot();
            let (next, outcome) = match base.reduce(&event, &self.options.policy) {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(
                        event = event.name(),
                        code = err.code(),
                        error = %err,
                        "Review event rejected"
                    );
                    return Err(err);
                }
            };

            let next = Arc::new(next);
            {
                let mut current = self
                    .current
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *current = Arc::clone(&next);
            }
            tracing::debug!(
                event = event.name(),
                version = next.version(),
                outcome = ?outcome,
                "Review event applied"
            );

            let mut history = self
                .history
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            history.events.push_back(event.clone());
            while history.events.len() > self.options.max_history {
                history.events.pop_front();
                history.truncated = true;
            }
            (next, outcome)
        };

        let observers: Vec<Arc<Observer>> = self
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            (*observer)(&next, &event, &outcome);
        }

        Ok(outcome)
    }

    /// The latest fully-applied registry.
    pub fn snapshot(&self) -> Arc<ReviewRegistry> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// The registry as seeded, before any event.
    pub fn seed(&self) -> &Arc<ReviewRegistry> {
        &self.seed
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Arc<ReviewRegistry>, &ReviewEvent, &Outcome) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        let observer: Arc<Observer> = Arc::new(observer);
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Accepted events, oldest first.
    pub fn history(&self) -> Vec<ReviewEvent> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .events
            .iter()
            .cloned()
            .collect()
    }

    /// True once older events have been dropped to honor `max_history`.
    pub fn history_truncated(&self) -> bool {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .truncated
    }

    /// Re-folds the recorded history over the seed registry.
    /// Returns `None` if the history has been truncated.
    pub fn rebuild_from_history(&self) -> Option<ReviewRegistry> {
        let history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if history.truncated {
            return None;
        }
        let mut registry = (*self.seed).clone();
        for event in &history.events {
            match registry.reduce(event, &self.options.policy) {
                Ok((next, _)) => registry = next,
                Err(err) => {
                    tracing::warn!(error = %err, "Recorded event failed to re-apply");
                    return None;
                }
            }
        }
        Some(registry)
    }

    pub fn options(&self) -> &MachineOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn machine() -> SessionMachine {
        SessionMachine::new(Arc::new(CurrentSpecSnapshot::empty()), vec![], vec![])
    }

    fn document(id: &str) -> ReviewEvent {
        ReviewEvent::DocumentEndpoint {
            pattern: "/widgets/{id}".to_string(),
            method: "GET".to_string(),
            pending_id: id.to_string(),
        }
    }

    #[test]
    fn send_publishes_new_snapshot() {
        let machine = machine();
        let before = machine.snapshot();
        machine.send(document("p1")).unwrap();
        let after = machine.snapshot();
        assert!(before.pending_endpoints().is_empty());
        assert_eq!(after.pending_endpoints().len(), 1);
        assert_eq!(after.version(), 1);
    }

    #[test]
    fn rejected_event_leaves_state_and_history() {
        let machine = machine();
        let err = machine
            .send(ReviewEvent::AddPathIgnoreRule {
                rule: " ".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ReviewError::MalformedEvent(_)));
        assert_eq!(machine.snapshot().version(), 0);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn observers_see_each_applied_event() {
        let machine = machine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        machine.subscribe(move |registry, event, outcome| {
            sink.lock()
                .unwrap()
                .push((registry.version(), event.name(), outcome.is_noop()));
        });

        machine.send(document("p1")).unwrap();
        machine
            .send(ReviewEvent::PendingEndpointStaged {
                id: "nope".to_string(),
            })
            .unwrap();
        let _ = machine.send(ReviewEvent::AddDiffHashIgnore {
            diff_hash: String::new(),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (1, "DOCUMENT_ENDPOINT", false),
                (2, "PENDING_ENDPOINT_STAGED", true)
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let machine = machine();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = machine.subscribe(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        machine.send(document("p1")).unwrap();
        assert!(machine.unsubscribe(id));
        assert!(!machine.unsubscribe(id));
        machine.send(document("p2")).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_reads_fully_applied_state() {
        let machine = Arc::new(machine());
        let reader = Arc::clone(&machine);
        let matched = Arc::new(AtomicUsize::new(0));
        let matched_in = Arc::clone(&matched);
        machine.subscribe(move |registry, _, _| {
            if reader.snapshot().version() == registry.version() {
                matched_in.fetch_add(1, Ordering::SeqCst);
            }
        });
        machine.send(document("p1")).unwrap();
        machine.send(document("p2")).unwrap();
        assert_eq!(matched.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observer_may_send_follow_up_event() {
        let machine = Arc::new(machine());
        let weak = Arc::downgrade(&machine);
        machine.subscribe(move |_, event, _| {
            if let ReviewEvent::PendingEndpointStaged { id } = event {
                if let Some(machine) = weak.upgrade() {
                    machine
                        .send(ReviewEvent::AddDiffHashIgnore {
                            diff_hash: format!("followup-{id}"),
                        })
                        .unwrap();
                }
            }
        });

        machine.send(document("p1")).unwrap();
        machine
            .send(ReviewEvent::PendingEndpointStaged {
                id: "p1".to_string(),
            })
            .unwrap();

        let registry = machine.snapshot();
        assert!(registry.is_diff_handled("followup-p1"));
        assert_eq!(registry.version(), 3);
        assert_eq!(machine.history().len(), 3);
    }

    #[test]
    fn history_is_bounded() {
        let machine = SessionMachine::with_options(
            Arc::new(CurrentSpecSnapshot::empty()),
            vec![],
            vec![],
            MachineOptions {
                max_history: 2,
                ..MachineOptions::default()
            },
        );
        for id in ["p1", "p2", "p3"] {
            machine.send(document(id)).unwrap();
        }
        assert_eq!(machine.history(), vec![document("p2"), document("p3")]);
        assert!(machine.history_truncated());
        assert!(machine.rebuild_from_history().is_none());
    }

    #[test]
    fn rebuild_matches_current_state() {
        let machine = machine();
        machine.send(document("p1")).unwrap();
        machine
            .send(ReviewEvent::CommandsApprovedForDiff {
                diff_hash: "d1".to_string(),
                commands: vec![json!({"AddField": {"fieldId": "f1"}})],
            })
            .unwrap();
        machine
            .send(ReviewEvent::PendingEndpointDiscarded {
                id: "p1".to_string(),
            })
            .unwrap();

        let rebuilt = machine.rebuild_from_history().unwrap();
        assert_eq!(rebuilt.state(), machine.snapshot().state());
    }

    #[test]
    fn replay_skips_rejected_events() {
        let events = vec![
            document("p1"),
            ReviewEvent::PendingEndpointStaged { id: String::new() },
            ReviewEvent::PendingEndpointStaged {
                id: "p1".to_string(),
            },
        ];
        let (machine, rejections) = SessionMachine::replay(
            Arc::new(CurrentSpecSnapshot::empty()),
            vec![],
            vec![],
            events,
            MachineOptions::default(),
        );
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].index, 1);
        assert_eq!(machine.history().len(), 2);
        assert_eq!(machine.snapshot().staged_endpoints().count(), 1);
    }

    #[test]
    fn concurrent_readers_see_whole_versions() {
        let machine = Arc::new(machine());
        let reader = {
            let machine = Arc::clone(&machine);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = machine.snapshot();
                    // Every published version has exactly one pending entry per event.
                    assert_eq!(snapshot.pending_endpoints().len() as u64, snapshot.version());
                }
            })
        };
        for i in 0..50 {
            machine.send(document(&format!("p{i}"))).unwrap();
        }
        reader.join().unwrap();
    }
}
