//! Pairwise sorted-merge and divide-and-conquer merge helpers.
//!
//! The two-tier store iterates the mutable block and every immutable block,
//! then merges their per-block results with these helpers. A
//! divide-and-conquer merge of `B` sorted lists costs `O(N log B)` rather
//! than `O(N*B)` for a naive concatenate-then-sort.

use crate::storage::trace::Trace;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Merge two sorted, duplicate-free string lists into one sorted,
/// duplicate-free list.
pub fn merge_string_lists(a: &[String], b: &[String]) -> Vec<String> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                result.push(a[i].clone());
                i += 1;
            },
            Ordering::Greater => {
                result.push(b[j].clone());
                j += 1;
            },
            Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            },
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Divide-and-conquer merge of `B` pre-sorted string lists, `O(N log B)`.
pub fn merge_string_list_list(lists: &[Vec<String>]) -> Vec<String> {
    match lists.len() {
        0 => Vec::new(),
        1 => lists[0].clone(),
        2 => merge_string_lists(&lists[0], &lists[1]),
        n => {
            let mid = n / 2;
            let left = merge_string_list_list(&lists[..mid]);
            let right = merge_string_list_list(&lists[mid..]);
            merge_string_lists(&left, &right)
        },
    }
}

/// Fold a list of partial traces sharing the same id into one trace: union
/// of spans, min/max of timestamps.
///
/// # Panics
/// Panics if `traces` is empty or the traces don't share an id — both are
/// caller bugs, not recoverable runtime conditions.
pub fn merge_trace_list(traces: Vec<Trace>) -> Trace {
    assert!(!traces.is_empty(), "cannot merge zero-length trace list");
    let id = traces[0].id;
    let mut min_timestamp = traces[0].min_timestamp;
    let mut max_timestamp = traces[0].max_timestamp;
    let mut spans = Vec::new();

    for trace in traces {
        assert_eq!(trace.id, id, "merge_trace_list requires a single trace id");
        if trace.min_timestamp < min_timestamp {
            min_timestamp = trace.min_timestamp;
        }
        if trace.max_timestamp > max_timestamp {
            max_timestamp = trace.max_timestamp;
        }
        spans.extend(trace.spans);
    }

    spans.sort_by_key(|s| s.start);

    Trace {
        id,
        min_timestamp,
        max_timestamp,
        spans,
    }
}

/// Merge a list of per-block trace lists (each internally non-overlapping
/// by id) into one list, sorted by `min_timestamp` ascending.
pub fn merge_trace_list_list(lists: Vec<Vec<Trace>>) -> Vec<Trace> {
    let mut by_id: HashMap<u64, Vec<Trace>> = HashMap::new();
    for list in lists {
        for trace in list {
            by_id.entry(trace.id).or_default().push(trace);
        }
    }

    let mut result: Vec<Trace> = by_id.into_values().map(merge_trace_list).collect();
    result.sort_by_key(|t| t.min_timestamp);
    result
}
