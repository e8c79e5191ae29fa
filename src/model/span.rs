//! Span data model.
//!
//! A `Span` is the atomic unit handed from the tracer to the agent
//! collector, scraped by the collector, and stored server-side. Once
//! finalized it is never mutated again.

use crate::core::error::{LokiError, Result};
use std::time::SystemTime;

/// Reserved tag key the mutable block watches to build its service index.
pub const JOB_LABEL: &str = "job";
/// Reserved tag key carrying `host:port` for the scraped target.
pub const INSTANCE_LABEL: &str = "instance";

/// The closed set of tag value kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// UTF-8 string value.
    String(String),
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    Uint64(u64),
    /// 64-bit float.
    Float64(f64),
}

impl TagValue {
    /// Wire discriminant for this value's kind. Stable across releases.
    pub fn kind(&self) -> u8 {
        match self {
            TagValue::String(_) => 0,
            TagValue::Bool(_) => 1,
            TagValue::Int64(_) => 2,
            TagValue::Uint64(_) => 3,
            TagValue::Float64(_) => 4,
        }
    }

    /// Render the value as a string, used by Zipkin conversion and the
    /// `job`/`instance` index lookups which are always string-typed tags.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            TagValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A single `{key, kind, value}` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value, tagged by kind.
    pub value: TagValue,
}

impl Tag {
    /// Build a tag from a key and value.
    pub fn new(key: impl Into<String>, value: TagValue) -> Self {
        Tag {
            key: key.into(),
            value,
        }
    }

    /// Build a string tag from two plain strings, as the scraper does when
    /// turning target labels into tags. Unknown/unsupported
    /// source types are dropped silently elsewhere; this constructor never
    /// fails because its output kind is always `String`.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: TagValue::String(value.into()),
        }
    }
}

/// One log record attached to a span: a timestamp plus a tag list.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Wall-clock instant of the log event.
    pub timestamp: SystemTime,
    /// Structured fields, reusing the tag encoding.
    pub fields: Vec<Tag>,
}

/// The atomic unit of tracing.
///
/// Invariants enforced by [`Span::new`]: `end >= start`, `trace_id != 0`,
/// `span_id != 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// 64-bit trace identifier, shared by every span in a trace.
    pub trace_id: u64,
    /// 64-bit span identifier, unique within a trace.
    pub span_id: u64,
    /// Parent span id; zero means this span is the trace root.
    pub parent_span_id: u64,
    /// Short human-readable operation name.
    pub operation_name: String,
    /// Wall-clock start instant, microsecond resolution.
    pub start: SystemTime,
    /// Wall-clock end instant, microsecond resolution.
    pub end: SystemTime,
    /// Ordered tag list, in emission order.
    pub tags: Vec<Tag>,
    /// Ordered log record list, in emission order.
    pub log_records: Vec<LogRecord>,
}

impl Span {
    /// Construct a span, validating that ids are non-zero and `end >= start`.
    pub fn new(
        trace_id: u64,
        span_id: u64,
        parent_span_id: u64,
        operation_name: impl Into<String>,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<Self> {
        if trace_id == 0 {
            return Err(LokiError::InvalidSpan("trace_id must be nonzero".into()));
        }
        if span_id == 0 {
            return Err(LokiError::InvalidSpan("span_id must be nonzero".into()));
        }
        if end < start {
            return Err(LokiError::InvalidSpan("end must be >= start".into()));
        }
        Ok(Span {
            trace_id,
            span_id,
            parent_span_id,
            operation_name: operation_name.into(),
            start,
            end,
            tags: Vec::new(),
            log_records: Vec::new(),
        })
    }

    /// Duration, always non-negative.
    pub fn duration(&self) -> std::time::Duration {
        self.end
            .duration_since(self.start)
            .unwrap_or(std::time::Duration::ZERO)
    }

    /// First tag matching `key`, if any.
    pub fn tag(&self, key: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.key == key)
    }

    /// The `job` tag's string value, if present — the reserved service-name
    /// label.
    pub fn job(&self) -> Option<&str> {
        self.tag(JOB_LABEL).and_then(|t| t.value.as_string())
    }

    /// The `instance` tag's string value, if present.
    pub fn instance(&self) -> Option<&str> {
        self.tag(INSTANCE_LABEL).and_then(|t| t.value.as_string())
    }
}
