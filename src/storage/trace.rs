//! `Trace` — a group of spans sharing one `trace_id`.

use crate::model::{Span, JOB_LABEL};
use std::time::SystemTime;

/// A group of spans sharing one `trace_id`, with cached `min_timestamp`
/// (= min span.start) and `max_timestamp` (= max span.end) so blocks don't
/// rescan every span on each append.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// Shared trace id of every member span.
    pub id: u64,
    /// Min of member spans' `start`.
    pub min_timestamp: SystemTime,
    /// Max of member spans' `end`.
    pub max_timestamp: SystemTime,
    /// Member spans, kept in ascending `start` order regardless of arrival
    /// order.
    pub spans: Vec<Span>,
}

impl Trace {
    /// Start a new trace from its first span.
    pub fn new(span: Span) -> Self {
        Trace {
            id: span.trace_id,
            min_timestamp: span.start,
            max_timestamp: span.end,
            spans: vec![span],
        }
    }

    /// Insert a span in ascending-`start` order and refresh the cached
    /// timestamps.
    pub fn add_span(&mut self, span: Span) {
        debug_assert_eq!(span.trace_id, self.id);
        if span.start < self.min_timestamp {
            self.min_timestamp = span.start;
        }
        if span.end > self.max_timestamp {
            self.max_timestamp = span.end;
        }
        let pos = self
            .spans
            .binary_search_by(|s| s.start.cmp(&span.start))
            .unwrap_or_else(|p| p);
        self.spans.insert(pos, span);
    }

    /// Full trace predicate, used only by the two-tier store's `traces`
    /// query.
    pub fn matches(&self, query: &Query) -> bool {
        let overlaps = self.max_timestamp >= query.start && self.min_timestamp <= query.end;
        if !overlaps {
            return false;
        }

        let duration = self
            .max_timestamp
            .duration_since(self.min_timestamp)
            .unwrap_or_default();
        if duration < query.min_duration {
            return false;
        }

        if !self.has_service(&query.service_name) {
            return false;
        }

        if let Some(op) = &query.operation_name {
            if !op.is_empty() && op != "all" {
                let has_op = self.spans.iter().any(|s| &s.operation_name == op);
                if !has_op {
                    return false;
                }
            }
        }

        true
    }

    /// Whether any span in this trace carries `job == service_name`.
    pub fn has_service(&self, service_name: &str) -> bool {
        self.spans.iter().any(|s| s.job() == Some(service_name))
    }
}

/// Search parameters for `SpanStore::traces`.
#[derive(Debug, Clone)]
pub struct Query {
    /// Required service name filter.
    pub service_name: String,
    /// Optional operation name filter; `None` or `"all"` means unfiltered.
    pub operation_name: Option<String>,
    /// Minimum trace duration (`max_timestamp - min_timestamp`).
    pub min_duration: std::time::Duration,
    /// Maximum trace duration; reserved for callers that want an upper
    /// bound, not currently applied by `Trace::matches`.
    pub max_duration: std::time::Duration,
    /// Inclusive window start.
    pub start: SystemTime,
    /// Inclusive window end.
    pub end: SystemTime,
    /// Max traces to return.
    pub limit: usize,
}
