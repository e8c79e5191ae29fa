//! Conversion from the internal `Span`/`Trace` model to Zipkin v1 JSON.

use crate::core::error::{LokiError, Result};
use crate::model::{Span, TagValue};
use crate::storage::Trace;
use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

const CLIENT_SEND: &str = "cs";
const CLIENT_RECV: &str = "cr";
const SERVER_SEND: &str = "ss";
const SERVER_RECV: &str = "sr";
const LOCAL_COMPONENT: &str = "lc";
const SPAN_KIND_TAG: &str = "span.kind";

#[derive(Debug, Clone, Serialize)]
pub struct WireEndpoint {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub ipv4: String,
    pub port: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireAnnotation {
    pub endpoint: WireEndpoint,
    pub timestamp: i64,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireBinaryAnnotation {
    pub endpoint: WireEndpoint,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireSpan {
    #[serde(rename = "traceId")]
    pub trace_id: String,
    pub name: String,
    pub id: String,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub timestamp: i64,
    pub duration: i64,
    pub annotations: Vec<WireAnnotation>,
    #[serde(rename = "binaryAnnotations")]
    pub binary_annotations: Vec<WireBinaryAnnotation>,
}

/// Zero-padded, big-endian, lower-hex: the Zipkin v1 id encoding.
pub fn id_str(id: u64) -> String {
    format!("{:016x}", id)
}

/// Parse a Zipkin v1 id. Any non-16-hex-char input is rejected.
pub fn from_id_str(s: &str) -> Result<u64> {
    let bytes = hex::decode(s).map_err(|_| LokiError::bad_request("malformed trace id"))?;
    if bytes.len() != 8 {
        return Err(LokiError::bad_request("malformed trace id"));
    }
    let mut array = [0u8; 8];
    array.copy_from_slice(&bytes);
    Ok(u64::from_be_bytes(array))
}

fn split_host_port(addr: &str) -> (String, i16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(0)),
        None => (addr.to_string(), 0),
    }
}

fn wire_endpoint(job: &str, instance: &str) -> WireEndpoint {
    let (ipv4, port) = split_host_port(instance);
    WireEndpoint {
        service_name: job.to_string(),
        ipv4,
        port,
    }
}

fn tag_value_json(value: &TagValue) -> Value {
    match value {
        TagValue::String(s) => Value::from(s.clone()),
        TagValue::Bool(b) => Value::from(*b),
        TagValue::Int64(i) => Value::from(*i),
        TagValue::Uint64(u) => Value::from(*u),
        TagValue::Float64(f) => Value::from(*f),
    }
}

fn micros_since_epoch(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn calculate_annotations(span: &Span) -> (Vec<WireAnnotation>, Vec<WireBinaryAnnotation>) {
    let job = span.job().unwrap_or_default().to_string();
    let instance = span.instance().unwrap_or_default().to_string();
    let endpoint = wire_endpoint(&job, &instance);

    let mut annotations = Vec::new();
    let mut binary_annotations = Vec::new();

    let kind = span
        .tag(SPAN_KIND_TAG)
        .and_then(|t| t.value.as_string())
        .unwrap_or_default();

    match kind {
        "client" => {
            annotations.push(WireAnnotation {
                endpoint: endpoint.clone(),
                timestamp: micros_since_epoch(span.start),
                value: CLIENT_SEND.to_string(),
            });
            annotations.push(WireAnnotation {
                endpoint: endpoint.clone(),
                timestamp: micros_since_epoch(span.end),
                value: CLIENT_RECV.to_string(),
            });
        }
        "server" => {
            annotations.push(WireAnnotation {
                endpoint: endpoint.clone(),
                timestamp: micros_since_epoch(span.start),
                value: SERVER_RECV.to_string(),
            });
            annotations.push(WireAnnotation {
                endpoint: endpoint.clone(),
                timestamp: micros_since_epoch(span.end),
                value: SERVER_SEND.to_string(),
            });
        }
        _ => {
            binary_annotations.push(WireBinaryAnnotation {
                endpoint: endpoint.clone(),
                key: LOCAL_COMPONENT.to_string(),
                value: Value::from(job.clone()),
            });
        }
    }

    for tag in &span.tags {
        binary_annotations.push(WireBinaryAnnotation {
            endpoint: endpoint.clone(),
            key: tag.key.clone(),
            value: tag_value_json(&tag.value),
        });
    }

    (annotations, binary_annotations)
}

pub fn span_to_wire(span: &Span) -> WireSpan {
    let (annotations, binary_annotations) = calculate_annotations(span);
    let start = micros_since_epoch(span.start);
    let end = micros_since_epoch(span.end);
    WireSpan {
        trace_id: id_str(span.trace_id),
        name: span.operation_name.clone(),
        id: id_str(span.span_id),
        parent_id: (span.parent_span_id != 0).then(|| id_str(span.parent_span_id)),
        timestamp: start,
        duration: end - start,
        annotations,
        binary_annotations,
    }
}

pub fn spans_to_wire(spans: &[Span]) -> Vec<WireSpan> {
    spans.iter().map(span_to_wire).collect()
}

pub fn traces_to_wire(traces: &[Trace]) -> Vec<Vec<WireSpan>> {
    traces.iter().map(|t| spans_to_wire(&t.spans)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn span_with_kind(kind: Option<&str>) -> Span {
        let mut span = Span::new(
            0x0123_4567_89ab_cdef,
            0xdead_beef,
            0,
            "op",
            UNIX_EPOCH + Duration::from_micros(1_000),
            UNIX_EPOCH + Duration::from_micros(1_500),
        )
        .unwrap();
        span.tags.push(crate::model::Tag::string("job", "frontend"));
        span.tags.push(crate::model::Tag::string("instance", "10.0.0.1:8080"));
        if let Some(k) = kind {
            span.tags.push(crate::model::Tag::string(SPAN_KIND_TAG, k));
        }
        span
    }

    #[test]
    fn id_round_trips_and_zero_pads() {
        assert_eq!(id_str(1), "0000000000000001");
        assert_eq!(from_id_str("0000000000000001").unwrap(), 1);
        assert_eq!(id_str(0xdead_beef), "00000000deadbeef");
    }

    #[test]
    fn from_id_str_rejects_malformed_input() {
        assert!(from_id_str("xyz").is_err());
        assert!(from_id_str("01").is_err());
    }

    #[test]
    fn client_kind_emits_cs_cr_pair() {
        let span = span_with_kind(Some("client"));
        let wire = span_to_wire(&span);
        assert_eq!(wire.annotations.len(), 2);
        assert_eq!(wire.annotations[0].value, CLIENT_SEND);
        assert_eq!(wire.annotations[1].value, CLIENT_RECV);
    }

    #[test]
    fn server_kind_emits_sr_ss_pair() {
        let span = span_with_kind(Some("server"));
        let wire = span_to_wire(&span);
        assert_eq!(wire.annotations.len(), 2);
        assert_eq!(wire.annotations[0].value, SERVER_RECV);
        assert_eq!(wire.annotations[1].value, SERVER_SEND);
    }

    #[test]
    fn absent_kind_emits_local_component() {
        let span = span_with_kind(None);
        let wire = span_to_wire(&span);
        assert!(wire.annotations.is_empty());
        assert!(wire
            .binary_annotations
            .iter()
            .any(|a| a.key == LOCAL_COMPONENT));
    }

    #[test]
    fn duration_is_end_minus_start_and_non_negative() {
        let span = span_with_kind(None);
        let wire = span_to_wire(&span);
        assert_eq!(wire.duration, 500);
        assert!(wire.duration >= 0);
    }

    #[test]
    fn root_span_omits_parent_id() {
        let span = span_with_kind(None);
        let wire = span_to_wire(&span);
        assert!(wire.parent_id.is_none());
    }

    #[test]
    fn endpoint_parses_instance_as_host_port() {
        let span = span_with_kind(None);
        let wire = span_to_wire(&span);
        let endpoint = &wire.binary_annotations[0].endpoint;
        assert_eq!(endpoint.service_name, "frontend");
        assert_eq!(endpoint.ipv4, "10.0.0.1");
        assert_eq!(endpoint.port, 8080);
    }
}
