//! Two-tier `SpanStore`: one mutable block (hot) plus a bounded FIFO of
//! immutable blocks (cold).

use crate::model::Span;
use crate::storage::immutable_block::ImmutableBlock;
use crate::storage::merge::{merge_string_list_list, merge_trace_list, merge_trace_list_list};
use crate::storage::mutable_block::MutableBlock;
use crate::storage::trace::{Query, Trace};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// Trace count at which the mutable block is promoted.
pub const MUTABLE_CAPACITY: usize = 1024;
/// Max immutable blocks retained before the oldest is evicted.
pub const MAX_IMMUTABLE_BLOCKS: usize = 1024;

struct Inner {
    mutable: MutableBlock,
    immutable: VecDeque<Arc<ImmutableBlock>>,
}

/// Composes one mutable block and a FIFO of immutable blocks behind a
/// single read-write lock; promotion is the store's only structural
/// mutation and its single linearization point.
pub struct SpanStore {
    inner: RwLock<Inner>,
}

impl SpanStore {
    /// Build an empty store.
    pub fn new() -> Self {
        SpanStore {
            inner: RwLock::new(Inner {
                mutable: MutableBlock::new(),
                immutable: VecDeque::new(),
            }),
        }
    }

    /// Two-phase append: the common case completes under the
    /// store's read lock because the mutable block has its own internal
    /// lock; only promotion escalates to the store's write lock.
    pub fn append(&self, span: Span) {
        {
            let inner = self.inner.read();
            let fits = inner.mutable.size() < MUTABLE_CAPACITY || inner.mutable.has_trace(span.trace_id);
            if fits {
                inner.mutable.append(span);
                return;
            }
        }

        let mut inner = self.inner.write();
        tracing::info!(
            mutable_traces = inner.mutable.size(),
            immutable_blocks = inner.immutable.len(),
            "mutable block full, promoting"
        );
        let old_mutable = std::mem::take(&mut inner.mutable);
        inner.immutable.push_back(Arc::new(ImmutableBlock::new(old_mutable)));
        if inner.immutable.len() > MAX_IMMUTABLE_BLOCKS {
            inner.immutable.pop_front();
        }
        inner.mutable.append(span);
    }

    /// Sorted, duplicate-free union of every block's service names.
    pub fn services(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut lists = vec![inner.mutable.services()];
        lists.extend(inner.immutable.iter().map(|b| b.services()));
        merge_string_list_list(&lists)
    }

    /// Sorted, duplicate-free union of every block's operation names for
    /// `service`.
    pub fn span_names(&self, service: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut lists = vec![inner.mutable.span_names(service)];
        lists.extend(inner.immutable.iter().map(|b| b.span_names(service)));
        merge_string_list_list(&lists)
    }

    /// Fetch one trace, folding partial traces from every block that has a
    /// fragment of it.
    pub fn trace(&self, id: u64) -> Option<Trace> {
        let inner = self.inner.read();
        let mut parts = Vec::new();
        if let Some(t) = inner.mutable.trace(id) {
            parts.push(t);
        }
        for block in &inner.immutable {
            if let Some(t) = block.trace(id) {
                parts.push(t);
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(merge_trace_list(parts))
        }
    }

    /// Search traces by the full predicate. Candidates are collected per-block, folded
    /// by trace id, sorted newest-first by `min_timestamp`, then scanned
    /// applying the full predicate and stopping at `query.limit` matches.
    pub fn traces(&self, query: &Query) -> Vec<Trace> {
        let inner = self.inner.read();
        let mut lists = vec![inner.mutable.traces(query)];
        lists.extend(inner.immutable.iter().map(|b| b.traces(query)));
        drop(inner);

        let merged = merge_trace_list_list(lists);
        let mut result = Vec::with_capacity(query.limit.min(merged.len()));
        for trace in merged.into_iter().rev() {
            if result.len() >= query.limit {
                break;
            }
            if trace.matches(query) {
                result.push(trace);
            }
        }
        result
    }
}

impl Default for SpanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;
    use crate::model::JOB_LABEL;
    use std::time::{Duration, SystemTime};

    fn t(micros: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_micros(micros)
    }

    fn span_with_job(trace_id: u64, span_id: u64, start: u64, end: u64, job: &str) -> Span {
        let mut s = Span::new(trace_id, span_id, 0, "op", t(start), t(end)).unwrap();
        s.tags.push(Tag::string(JOB_LABEL, job));
        s
    }

    #[test]
    fn empty_store_reads_return_empty_without_error() {
        let store = SpanStore::new();
        assert!(store.services().is_empty());
        assert!(store.span_names("svc").is_empty());
        assert!(store.trace(1).is_none());
        let q = Query {
            service_name: "svc".into(),
            operation_name: None,
            min_duration: Duration::ZERO,
            max_duration: Duration::MAX,
            start: t(0),
            end: t(1_000_000),
            limit: 10,
        };
        assert!(store.traces(&q).is_empty());
    }

    #[test]
    fn boundary_promotion_at_exactly_mutable_capacity() {
        let store = SpanStore::new();
        for i in 1..=(MUTABLE_CAPACITY as u64) {
            store.append(span_with_job(i, i, 0, 1, "svc"));
        }
        // The capacity-th distinct trace lands in the mutable block, not an
        // immutable one yet.
        {
            let inner = store.inner.read();
            assert_eq!(inner.mutable.size(), MUTABLE_CAPACITY);
            assert!(inner.immutable.is_empty());
        }
        // One more distinct trace triggers promotion.
        store.append(span_with_job(MUTABLE_CAPACITY as u64 + 1, 999, 0, 1, "svc"));
        let inner = store.inner.read();
        assert_eq!(inner.immutable.len(), 1);
        assert_eq!(inner.mutable.size(), 1);
    }

    #[test]
    fn scenario_d_cross_block_merge_via_store() {
        let store = SpanStore::new();
        // Force mutable_capacity == 1 behavior by driving two distinct
        // traces through a store whose promotion threshold we simulate
        // directly against the block APIs (the store's real constant is
        // 1024; this test exercises the same code path at small scale by
        // promoting manually).
        let mutable = MutableBlock::new();
        mutable.append(span_with_job(7, 1, 100, 110, "svc"));
        let immutable = ImmutableBlock::new(mutable);
        let store_inner = Inner {
            mutable: MutableBlock::new(),
            immutable: VecDeque::from(vec![Arc::new(immutable)]),
        };
        let store = SpanStore {
            inner: RwLock::new(store_inner),
        };
        store.append(span_with_job(7, 2, 50, 60, "svc"));

        let trace = store.trace(7).unwrap();
        assert_eq!(trace.spans.len(), 2);
        assert_eq!(trace.min_timestamp, t(50));
    }

    #[test]
    fn boundary_eviction_at_max_immutable_blocks_plus_one() {
        let mut immutable = VecDeque::new();
        for i in 0..MAX_IMMUTABLE_BLOCKS as u64 {
            let mutable = MutableBlock::new();
            mutable.append(span_with_job(i, i, 0, 1, "svc"));
            immutable.push_back(Arc::new(ImmutableBlock::new(mutable)));
        }
        let store = SpanStore {
            inner: RwLock::new(Inner {
                mutable: MutableBlock::new(),
                immutable,
            }),
        };

        // Fill the mutable block to capacity, then push one more distinct
        // trace to force a promotion that evicts the oldest immutable block.
        for i in 0..MUTABLE_CAPACITY as u64 {
            store.append(span_with_job(1_000_000 + i, 1_000_000 + i, 0, 1, "svc"));
        }
        store.append(span_with_job(2_000_000, 2_000_000, 0, 1, "svc"));

        let inner = store.inner.read();
        assert_eq!(inner.immutable.len(), MAX_IMMUTABLE_BLOCKS);
        drop(inner);

        assert!(store.trace(0).is_none());
        assert!(store.trace(1).is_some());
    }

    #[test]
    fn scenario_e_query_filtering_across_blocks() {
        let store = SpanStore::new();
        store.append(span_with_job(1, 1, 0, 50_000, "frontend"));
        store.append(span_with_job(2, 2, 0, 5_000, "backend"));
        let q = Query {
            service_name: "frontend".into(),
            operation_name: None,
            min_duration: Duration::from_micros(10_000),
            max_duration: Duration::MAX,
            start: t(0),
            end: t(100_000),
            limit: 10,
        };
        let result = store.traces(&q);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 1);
    }

    #[test]
    fn traces_respects_limit() {
        let store = SpanStore::new();
        for i in 1..=5u64 {
            store.append(span_with_job(i, i, i * 10, i * 10 + 5, "svc"));
        }
        let q = Query {
            service_name: "svc".into(),
            operation_name: None,
            min_duration: Duration::ZERO,
            max_duration: Duration::MAX,
            start: t(0),
            end: t(1000),
            limit: 2,
        };
        assert_eq!(store.traces(&q).len(), 2);
    }
}
