//! Bounded trace ring shared by application emitter threads and the
//! drainer (the HTTP scrape handler).
//!
//! `collect` is on the hot span-emit path: it must not allocate when a
//! slot already exists for the trace, and overflow eviction reuses the
//! evicted slot's backing `Vec` rather than dropping and reallocating it.

use crate::model::Span;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Default capacity, sized (per the original) for a service doing 100 QPS
/// with a 15s scrape interval.
pub const DEFAULT_CAPACITY: usize = 15 * 100;

struct Slot {
    trace_id: u64,
    spans: Vec<Span>,
}

struct Inner {
    slots: Vec<Slot>,
    index: HashMap<u64, usize>,
    next: usize,
    length: usize,
}

/// A fixed-capacity ring of trace slots keyed by `trace_id`.
pub struct Collector {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Collector {
    /// Build a collector with room for `capacity` distinct traces.
    ///
    /// # Panics
    /// Panics if `capacity` is zero — a zero-capacity ring cannot hold any
    /// trace and every call to `collect` would have nowhere to put a span.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "collector capacity must be nonzero");
        let slots = (0..capacity)
            .map(|_| Slot {
                trace_id: 0,
                spans: Vec::new(),
            })
            .collect();
        Collector {
            inner: Mutex::new(Inner {
                slots,
                index: HashMap::with_capacity(capacity),
                next: 0,
                length: 0,
            }),
            capacity,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a span to the ring. Infallible:
    /// overflow silently evicts the oldest-arrival trace.
    pub fn collect(&self, span: Span) {
        let mut inner = self.inner.lock();
        let trace_id = span.trace_id;

        if let Some(&idx) = inner.index.get(&trace_id) {
            inner.slots[idx].spans.push(span);
            return;
        }

        let idx = inner.next;
        inner.next = (inner.next + 1) % self.capacity;

        if inner.length == self.capacity {
            let evicted = inner.slots[idx].trace_id;
            inner.index.remove(&evicted);
        } else {
            inner.length += 1;
        }

        inner.index.insert(trace_id, idx);
        inner.slots[idx].trace_id = trace_id;
        inner.slots[idx].spans.clear();
        inner.slots[idx].spans.push(span);
    }

    /// Drain every buffered span in arrival order, coalescing spans of the
    /// same trace. Clears the ring.
    pub fn drain(&self) -> Vec<Span> {
        let mut inner = self.inner.lock();
        let mut start = inner.next as isize - inner.length as isize;
        if start < 0 {
            start += self.capacity as isize;
        }
        let mut start = start as usize;

        let mut spans = Vec::new();
        let mut remaining = inner.length;
        while remaining > 0 {
            start %= self.capacity;
            let slot = &mut inner.slots[start];
            spans.append(&mut slot.spans);
            let trace_id = slot.trace_id;
            inner.index.remove(&trace_id);
            start += 1;
            remaining -= 1;
        }
        inner.length = 0;

        assert!(
            inner.index.is_empty(),
            "drain left entries in the trace index"
        );
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn span(trace_id: u64, span_id: u64) -> Span {
        Span::new(
            trace_id,
            span_id,
            0,
            "op",
            SystemTime::UNIX_EPOCH,
            SystemTime::UNIX_EPOCH + Duration::from_micros(1),
        )
        .unwrap()
    }

    #[test]
    fn scenario_a_ring_fifo_eviction() {
        let c = Collector::new(3);
        c.collect(span(1, 1));
        c.collect(span(2, 2));
        c.collect(span(3, 3));
        c.collect(span(4, 4));
        let drained = c.drain();
        let trace_ids: Vec<u64> = drained.iter().map(|s| s.trace_id).collect();
        assert_eq!(trace_ids, vec![2, 3, 4]);
    }

    #[test]
    fn scenario_b_trace_coalescing() {
        let c = Collector::new(3);
        c.collect(span(1, 0xA));
        c.collect(span(2, 0xB));
        c.collect(span(1, 0xC));
        let drained = c.drain();
        let span_ids: Vec<u64> = drained.iter().map(|s| s.span_id).collect();
        assert_eq!(span_ids, vec![0xA, 0xC, 0xB]);
    }

    #[test]
    fn capacity_one_evicts_unless_same_trace() {
        let c = Collector::new(1);
        c.collect(span(1, 1));
        c.collect(span(1, 2));
        c.collect(span(2, 3));
        let drained = c.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].trace_id, 2);
    }

    #[test]
    fn drain_clears_the_ring() {
        let c = Collector::new(2);
        c.collect(span(1, 1));
        assert_eq!(c.drain().len(), 1);
        assert_eq!(c.drain().len(), 0);
    }

    #[test]
    fn every_span_collected_under_capacity_is_drained_exactly_once() {
        let c = Collector::new(10);
        for i in 1..=5u64 {
            c.collect(span(i, i));
        }
        let drained = c.drain();
        let mut ids: Vec<u64> = drained.iter().map(|s| s.trace_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
