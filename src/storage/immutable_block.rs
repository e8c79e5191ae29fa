//! Immutable block: a frozen, array-backed snapshot of traces, sorted by
//! `min_timestamp` ascending for efficient range queries.

use crate::storage::mutable_block::MutableBlock;
use crate::storage::trace::{Query, Trace};
use std::collections::HashMap;

/// A snapshot built once from a [`MutableBlock`], never mutated again.
pub struct ImmutableBlock {
    /// `trace_id -> index into traces`.
    trace_ids: HashMap<u64, usize>,
    /// Sorted by `min_timestamp` ascending.
    traces: Vec<Trace>,
    services: Vec<String>,
    span_names: HashMap<String, Vec<String>>,
}

impl ImmutableBlock {
    /// Freeze a mutable block into an immutable one. Moves the mutable block's maps rather than cloning
    /// span payloads.
    pub fn new(mutable: MutableBlock) -> Self {
        let (trace_map, services, span_name_sets) = mutable.into_parts();

        let mut traces: Vec<Trace> = trace_map.into_values().collect();
        traces.sort_by_key(|t| t.min_timestamp);

        let trace_ids = traces
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();

        let services = services.into_iter().collect();

        let span_names = span_name_sets
            .into_iter()
            .map(|(service, names)| (service, names.into_iter().collect()))
            .collect();

        ImmutableBlock {
            trace_ids,
            traces,
            services,
            span_names,
        }
    }

    /// Precomputed, sorted service name snapshot.
    pub fn services(&self) -> Vec<String> {
        self.services.clone()
    }

    /// Precomputed, sorted operation-name snapshot for `service`.
    pub fn span_names(&self, service: &str) -> Vec<String> {
        self.span_names.get(service).cloned().unwrap_or_default()
    }

    /// `trace_id -> index` map lookup.
    pub fn trace(&self, id: u64) -> Option<Trace> {
        self.trace_ids.get(&id).map(|&i| self.traces[i].clone())
    }

    /// Binary-search the `min_timestamp`-sorted slice for the window
    /// `[query.start, query.end]`.
    pub fn traces(&self, query: &Query) -> Vec<Trace> {
        let first = self.traces.partition_point(|t| t.min_timestamp < query.start);
        let last = self.traces.partition_point(|t| t.min_timestamp <= query.end);
        if first >= last {
            return Vec::new();
        }
        self.traces[first..last].to_vec()
    }
}
