//! Pluggable id generation for facade-issued pending endpoint ids.
//!
//! Production sessions use ULIDs; tests and scripted replays use the
//! sequential generator so every run yields the same ids.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Default)]
pub struct UlidIdGenerator {
    prefix: String,
}

impl UlidIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl IdGenerator for UlidIdGenerator {
    fn next_id(&self) -> String {
        format!("{}{}", self.prefix, ulid::Ulid::new().to_string().to_lowercase())
    }
}

/// Deterministic `prefix1`, `prefix2`, ... ids.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}{}", self.prefix, n)
    }
}
