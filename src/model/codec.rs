//! Self-delimiting binary codec for `Spans = {Span[]}`.
//!
//! The wire form is a private implementation detail; the only normative
//! property is the round-trip invariant `decode(encode(s)) == s` for any
//! span built from the supported tag kinds. This is a
//! flat, fixed-field encoding built on `bytes::{Buf, BufMut}` rather than a
//! generated protobuf schema, matching the "implementation detail" framing
//! in the spec: no length-prefixed varints, just explicit widths, so decode
//! can bounds-check every read instead of trusting a schema compiler.

use crate::core::error::{LokiError, Result};
use crate::model::span::{LogRecord, Span, Tag, TagValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{Duration, SystemTime};

const KIND_STRING: u8 = 0;
const KIND_BOOL: u8 = 1;
const KIND_INT64: u8 = 2;
const KIND_UINT64: u8 = 3;
const KIND_FLOAT64: u8 = 4;

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_str(buf: &mut Bytes) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(LokiError::Decode("truncated string length".into()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(LokiError::Decode("truncated string body".into()));
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|e| LokiError::Decode(e.to_string()))
}

fn put_time(buf: &mut BytesMut, t: SystemTime) {
    let micros = t
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_micros() as u64;
    buf.put_u64(micros);
}

fn get_time(buf: &mut Bytes) -> Result<SystemTime> {
    if buf.remaining() < 8 {
        return Err(LokiError::Decode("truncated timestamp".into()));
    }
    Ok(SystemTime::UNIX_EPOCH + Duration::from_micros(buf.get_u64()))
}

fn put_tag(buf: &mut BytesMut, tag: &Tag) {
    put_str(buf, &tag.key);
    buf.put_u8(tag.value.kind());
    match &tag.value {
        TagValue::String(s) => put_str(buf, s),
        TagValue::Bool(b) => buf.put_u8(u8::from(*b)),
        TagValue::Int64(v) => buf.put_i64(*v),
        TagValue::Uint64(v) => buf.put_u64(*v),
        TagValue::Float64(v) => buf.put_f64(*v),
    }
}

fn get_tag(buf: &mut Bytes) -> Result<Tag> {
    let key = get_str(buf)?;
    if buf.remaining() < 1 {
        return Err(LokiError::Decode("truncated tag kind".into()));
    }
    let kind = buf.get_u8();
    let value = match kind {
        KIND_STRING => TagValue::String(get_str(buf)?),
        KIND_BOOL => {
            if buf.remaining() < 1 {
                return Err(LokiError::Decode("truncated bool tag".into()));
            }
            TagValue::Bool(buf.get_u8() != 0)
        },
        KIND_INT64 => {
            if buf.remaining() < 8 {
                return Err(LokiError::Decode("truncated int64 tag".into()));
            }
            TagValue::Int64(buf.get_i64())
        },
        KIND_UINT64 => {
            if buf.remaining() < 8 {
                return Err(LokiError::Decode("truncated uint64 tag".into()));
            }
            TagValue::Uint64(buf.get_u64())
        },
        KIND_FLOAT64 => {
            if buf.remaining() < 8 {
                return Err(LokiError::Decode("truncated float64 tag".into()));
            }
            TagValue::Float64(buf.get_f64())
        },
        other => return Err(LokiError::Decode(format!("unknown tag kind {other}"))),
    };
    Ok(Tag { key, value })
}

fn put_log_record(buf: &mut BytesMut, log: &LogRecord) {
    put_time(buf, log.timestamp);
    buf.put_u32(log.fields.len() as u32);
    for field in &log.fields {
        put_tag(buf, field);
    }
}

fn get_log_record(buf: &mut Bytes) -> Result<LogRecord> {
    let timestamp = get_time(buf)?;
    if buf.remaining() < 4 {
        return Err(LokiError::Decode("truncated log field count".into()));
    }
    let count = buf.get_u32();
    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        fields.push(get_tag(buf)?);
    }
    Ok(LogRecord { timestamp, fields })
}

/// Encode one span (without a `Spans` wrapper). Exposed for tests and for
/// composing a larger stream framing if a caller needs one.
pub fn encode_span(buf: &mut BytesMut, span: &Span) {
    buf.put_u64(span.trace_id);
    buf.put_u64(span.span_id);
    buf.put_u64(span.parent_span_id);
    put_str(buf, &span.operation_name);
    put_time(buf, span.start);
    put_time(buf, span.end);
    buf.put_u32(span.tags.len() as u32);
    for tag in &span.tags {
        put_tag(buf, tag);
    }
    buf.put_u32(span.log_records.len() as u32);
    for log in &span.log_records {
        put_log_record(buf, log);
    }
}

/// Decode one span. See [`encode_span`].
pub fn decode_span(buf: &mut Bytes) -> Result<Span> {
    if buf.remaining() < 24 {
        return Err(LokiError::Decode("truncated span header".into()));
    }
    let trace_id = buf.get_u64();
    let span_id = buf.get_u64();
    let parent_span_id = buf.get_u64();
    let operation_name = get_str(buf)?;
    let start = get_time(buf)?;
    let end = get_time(buf)?;

    if buf.remaining() < 4 {
        return Err(LokiError::Decode("truncated tag count".into()));
    }
    let tag_count = buf.get_u32();
    let mut tags = Vec::with_capacity(tag_count as usize);
    for _ in 0..tag_count {
        tags.push(get_tag(buf)?);
    }

    if buf.remaining() < 4 {
        return Err(LokiError::Decode("truncated log count".into()));
    }
    let log_count = buf.get_u32();
    let mut log_records = Vec::with_capacity(log_count as usize);
    for _ in 0..log_count {
        log_records.push(get_log_record(buf)?);
    }

    Ok(Span {
        trace_id,
        span_id,
        parent_span_id,
        operation_name,
        start,
        end,
        tags,
        log_records,
    })
}

/// Encode a `Spans` message: a 4-byte count followed by each encoded span,
/// length-prefixed as a whole when sent over HTTP.
pub fn encode_spans(spans: &[Span]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32(spans.len() as u32);
    for span in spans {
        encode_span(&mut buf, span);
    }
    buf.freeze()
}

/// Decode a `Spans` message produced by [`encode_spans`].
pub fn decode_spans(bytes: &[u8]) -> Result<Vec<Span>> {
    let mut buf = Bytes::copy_from_slice(bytes);
    if buf.remaining() < 4 {
        return Err(LokiError::Decode("truncated spans count".into()));
    }
    let count = buf.get_u32();
    let mut spans = Vec::with_capacity(count as usize);
    for _ in 0..count {
        spans.push(decode_span(&mut buf)?);
    }
    Ok(spans)
}
