//! # specreview-core
//!
//! Review session state for discrepancies between observed HTTP traffic and
//! a documented API spec.
//!
//! ## Design Principles
//!
//! - **Pure reducer**: [`ReviewRegistry::reduce`] is a deterministic function of
//!   (registry, event). Replaying the same events over the same seed always
//!   yields the same registry.
//! - **Single writer, many readers**: [`SessionMachine`] serializes events and
//!   publishes each result by swapping an `Arc`; readers never observe a
//!   partially applied event.
//! - **Graceful degradation**: unknown ids are no-ops, not errors. Only
//!   malformed events are rejected.
//! - **Spec is read-only**: the [`CurrentSpecSnapshot`] a session starts with is
//!   never mutated by events. Approved commands are recorded, never applied.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use specreview_core::{CurrentSpecSnapshot, SessionFacade, SessionMachine};
//!
//! let machine = Arc::new(SessionMachine::new(Arc::new(CurrentSpecSnapshot::empty()), vec![], vec![]));
//! let session = SessionFacade::new(machine);
//! let id = session.document_endpoint("/widgets/{id}", "GET")?;
//! session.stage_endpoint(&id)?;
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod facade;
pub mod ids;
pub mod ignore;
pub mod machine;
pub mod registry;
pub mod seed;
pub mod spec;
pub mod urls;

pub use config::{load_config, ReviewConfig};
pub use diff::{diff_hash, ParsedDiff};
pub use error::{Result, ReviewError};
pub use facade::SessionFacade;
pub use ids::{IdGenerator, SequentialIdGenerator, UlidIdGenerator};
pub use ignore::IgnoreRule;
pub use machine::{MachineOptions, Rejection, SessionMachine, SubscriptionId};
pub use registry::{
    ApprovedSuggestion, NoOpReason, Outcome, PendingEndpoint, PendingStatus, ReducerPolicy,
    RegistryState, ReviewRegistry, ReviewSummary,
};
pub use seed::SessionSeed;
pub use spec::{CurrentSpecSnapshot, DomainIdGenerator, Endpoint, RequestBody, ResponseBody};
pub use specreview_protocol::{Command, ReviewEvent};
pub use urls::{PathComponent, UndocumentedUrl};
