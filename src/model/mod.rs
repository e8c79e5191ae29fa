//! Span data model and wire codec.

pub mod codec;
pub mod span;

pub use span::{LogRecord, Span, Tag, TagValue, INSTANCE_LABEL, JOB_LABEL};
