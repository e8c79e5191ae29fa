//! Mutable block: absorbs spans one at a time, answers queries while doing
//! so.

use crate::model::{Span, JOB_LABEL};
use crate::storage::trace::{Query, Trace};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Default number of distinct traces a mutable block holds before the
/// two-tier store promotes it.
pub const DEFAULT_CAPACITY_HINT: usize = 1024;

struct Inner {
    traces: HashMap<u64, Trace>,
    services: BTreeSet<String>,
    span_names: HashMap<String, BTreeSet<String>>,
}

/// Map-backed, write-through block absorbing freshly scraped spans.
pub struct MutableBlock {
    inner: RwLock<Inner>,
}

impl MutableBlock {
    /// Build an empty mutable block.
    pub fn new() -> Self {
        MutableBlock {
            inner: RwLock::new(Inner {
                traces: HashMap::with_capacity(DEFAULT_CAPACITY_HINT),
                services: BTreeSet::new(),
                span_names: HashMap::new(),
            }),
        }
    }

    /// Number of distinct traces currently held. Used by the store to
    /// decide when to promote.
    pub fn size(&self) -> usize {
        self.inner.read().traces.len()
    }

    /// Whether a trace with this id already has a slot here.
    pub fn has_trace(&self, id: u64) -> bool {
        self.inner.read().traces.contains_key(&id)
    }

    /// Absorb one span.
    pub fn append(&self, span: Span) {
        let mut inner = self.inner.write();

        let job = span.job().map(str::to_string);
        let operation_name = span.operation_name.clone();

        match inner.traces.get_mut(&span.trace_id) {
            Some(trace) => trace.add_span(span),
            None => {
                inner.traces.insert(span.trace_id, Trace::new(span));
            },
        }

        if let Some(job) = job {
            inner.services.insert(job.clone());
            inner
                .span_names
                .entry(job)
                .or_default()
                .insert(operation_name);
        }
    }

    /// Sorted, duplicate-free service names.
    pub fn services(&self) -> Vec<String> {
        self.inner.read().services.iter().cloned().collect()
    }

    /// Sorted operation names for `service`, empty if unknown.
    pub fn span_names(&self, service: &str) -> Vec<String> {
        self.inner
            .read()
            .span_names
            .get(service)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Fetch one trace by id.
    pub fn trace(&self, id: u64) -> Option<Trace> {
        self.inner.read().traces.get(&id).cloned()
    }

    /// Every trace whose `[min_timestamp, max_timestamp]` overlaps
    /// `[query.start, query.end]`; the caller applies the remaining
    /// predicate.
    pub fn traces(&self, query: &Query) -> Vec<Trace> {
        self.inner
            .read()
            .traces
            .values()
            .filter(|t| t.max_timestamp >= query.start && t.min_timestamp <= query.end)
            .cloned()
            .collect()
    }
}

impl Default for MutableBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal maps moved out, never copied, when promoting to an immutable
/// block.
pub(crate) type MutableParts = (
    HashMap<u64, Trace>,
    BTreeSet<String>,
    HashMap<String, BTreeSet<String>>,
);

impl MutableBlock {
    /// Consume this block, handing its maps to the immutable block
    /// constructor by move rather than by copy.
    pub(crate) fn into_parts(self) -> MutableParts {
        let inner = self.inner.into_inner();
        (inner.traces, inner.services, inner.span_names)
    }
}
