//! Agent-side HTTP endpoint: drains the collector and serves the result
//! either as binary-encoded `Spans` or, for browser debugging, an HTML
//! table.

use crate::agent::collector::Collector;
use crate::model::codec::encode_spans;
use crate::model::Span;
use crate::storage::trace::Trace;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::fmt::Write as _;
use std::sync::Arc;

/// Build the agent's single-handler router at `path`.
pub fn router(path: &str, collector: Arc<Collector>) -> Router {
    Router::new().route(path, get(serve_spans)).with_state(collector)
}

/// `GET` handler: drain the collector, encode per content negotiation.
async fn serve_spans(State(collector): State<Arc<Collector>>, headers: HeaderMap) -> Response {
    let spans = collector.drain();

    if wants_html(&headers) {
        Html(render_html(spans)).into_response()
    } else {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            encode_spans(&spans).to_vec(),
        )
            .into_response()
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}

fn render_html(spans: Vec<Span>) -> String {
    let mut traces: Vec<Trace> = Vec::new();
    for span in spans {
        match traces.iter_mut().find(|t| t.id == span.trace_id) {
            Some(trace) => trace.add_span(span),
            None => traces.push(Trace::new(span)),
        }
    }
    traces.sort_by_key(|t| t.min_timestamp);

    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"><title>Traces</title></head>\n\
         <body>\n<h1>Traces</h1>\n<table width=\"100%\" border=\"1\">\n\
         <thead><tr><th>Time</th><th>Duration</th><th>ID</th><th>Path</th></tr></thead>\n<tbody>\n",
    );
    for trace in &traces {
        let since_epoch = trace
            .min_timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let duration = trace
            .max_timestamp
            .duration_since(trace.min_timestamp)
            .unwrap_or_default();
        let path = trace
            .spans
            .first()
            .map(|s| s.operation_name.as_str())
            .unwrap_or("");
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{:?}</td><td>{:016x}</td><td>{}</td></tr>\n",
            since_epoch.as_micros(),
            duration,
            trace.id,
            html_escape(path),
        );
    }
    out.push_str("</tbody>\n</table>\n</body>\n</html>");
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::collector::Collector;
    use crate::model::codec::decode_spans;
    use axum::http::Request;
    use std::time::{Duration, SystemTime};
    use tower::ServiceExt;

    fn span(trace_id: u64, span_id: u64) -> Span {
        Span::new(
            trace_id,
            span_id,
            0,
            "op",
            SystemTime::UNIX_EPOCH,
            SystemTime::UNIX_EPOCH + Duration::from_micros(10),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn default_response_is_binary_and_round_trips() {
        let collector = Arc::new(Collector::new(10));
        collector.collect(span(1, 1));
        let app = router("/debug/spans", collector);

        let response = app
            .oneshot(Request::get("/debug/spans").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let decoded = decode_spans(&body).unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[tokio::test]
    async fn html_requested_via_accept_encoding() {
        let collector = Arc::new(Collector::new(10));
        collector.collect(span(1, 1));
        let app = router("/debug/spans", collector);

        let response = app
            .oneshot(
                Request::get("/debug/spans")
                    .header("accept-encoding", "gzip, text/html")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("<table"));
    }
}
