//! Zipkin-compatible query API served over the two-tier span store.

pub mod conv;

use crate::core::error::LokiError;
use crate::storage::{Query, SpanStore};
use axum::extract::{Path, Query as QueryExtractor, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tower_http::cors::CorsLayer;

const DEFAULT_LOOKBACK_MS: i64 = 60 * 60 * 1000;
const DEFAULT_QUERY_LIMIT: usize = 10;

#[derive(Clone)]
struct ApiState {
    store: Arc<SpanStore>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for LokiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            LokiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LokiError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !self.is_silent_input_error() {
            tracing::error!(error = %self, "api request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the collector's query API router.
pub fn router(store: Arc<SpanStore>) -> Router {
    Router::new()
        .route("/config.json", get(config_handler))
        .route("/api/v1/dependencies", get(dependencies_handler))
        .route("/api/v1/services", get(services_handler))
        .route("/api/v1/spans", get(spans_handler))
        .route("/api/v1/trace/:id", get(trace_handler))
        .route("/api/v1/traces", get(traces_handler))
        .with_state(ApiState { store })
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct ConfigResponse {
    #[serde(rename = "defaultLookback")]
    default_lookback: i64,
    #[serde(rename = "queryLimit")]
    query_limit: usize,
}

async fn config_handler() -> impl IntoResponse {
    Json(ConfigResponse {
        default_lookback: DEFAULT_LOOKBACK_MS,
        query_limit: DEFAULT_QUERY_LIMIT,
    })
}

async fn dependencies_handler() -> impl IntoResponse {
    Json(serde_json::json!({}))
}

async fn services_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.store.services())
}

#[derive(Deserialize)]
struct SpansParams {
    #[serde(rename = "serviceName")]
    service_name: Option<String>,
}

async fn spans_handler(
    State(state): State<ApiState>,
    QueryExtractor(params): QueryExtractor<SpansParams>,
) -> axum::response::Response {
    match params.service_name {
        Some(name) if !name.is_empty() => {
            Json(state.store.span_names(&name)).into_response()
        }
        _ => LokiError::bad_request("serviceName required").into_response(),
    }
}

async fn trace_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let trace_id = match conv::from_id_str(&id) {
        Ok(id) => id,
        Err(_) => return LokiError::NotFound(format!("malformed trace id {id}")).into_response(),
    };
    match state.store.trace(trace_id) {
        Some(trace) => Json(conv::spans_to_wire(&trace.spans)).into_response(),
        None => Json(Vec::<conv::WireSpan>::new()).into_response(),
    }
}

#[derive(Deserialize)]
struct TracesParams {
    #[serde(rename = "serviceName")]
    service_name: Option<String>,
    #[serde(rename = "spanName")]
    span_name: Option<String>,
    #[serde(rename = "endTs")]
    end_ts: Option<String>,
    lookback: Option<String>,
    #[serde(rename = "minDuration")]
    min_duration: Option<String>,
    limit: Option<String>,
}

fn parse_i64(value: &Option<String>, default: i64, field: &str) -> Result<i64, LokiError> {
    match value {
        None => Ok(default),
        Some(s) if s.is_empty() => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| LokiError::bad_request(format!("invalid {field}"))),
    }
}

async fn traces_handler(
    State(state): State<ApiState>,
    QueryExtractor(params): QueryExtractor<TracesParams>,
) -> axum::response::Response {
    match run_traces_query(&state, params) {
        Ok(traces) => Json(conv::traces_to_wire(&traces)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn run_traces_query(
    state: &ApiState,
    params: TracesParams,
) -> Result<Vec<crate::storage::Trace>, LokiError> {
    let service_name = params
        .service_name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LokiError::bad_request("serviceName required"))?;

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let end_ms = parse_i64(&params.end_ts, now_ms, "endTs")?;
    let lookback_ms = parse_i64(&params.lookback, DEFAULT_LOOKBACK_MS, "lookback")?;
    let min_duration_us = parse_i64(&params.min_duration, 0, "minDuration")?;
    let limit = parse_i64(&params.limit, DEFAULT_QUERY_LIMIT as i64, "limit")?;
    if limit < 0 {
        return Err(LokiError::bad_request("invalid limit"));
    }

    let start = UNIX_EPOCH + Duration::from_millis((end_ms - lookback_ms).max(0) as u64);
    let end = UNIX_EPOCH + Duration::from_millis(end_ms.max(0) as u64);

    let query = Query {
        service_name,
        operation_name: params.span_name.filter(|s| !s.is_empty()),
        min_duration: Duration::from_micros(min_duration_us.max(0) as u64),
        max_duration: Duration::MAX,
        start,
        end,
        limit: limit as usize,
    };

    Ok(state.store.traces(&query))
}
