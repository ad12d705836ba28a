use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use kantoi_core::{Archetype, Signal, SignalFilter, SignalStore, Topic};
use kantoi_sentiment::MetricsReport;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{
    map_store_error, normalize_limit, parse_window, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct MetricsQuery {
    pub window: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SignalsQuery {
    pub window: Option<String>,
    pub topic: Option<String>,
    pub archetype: Option<String>,
    pub limit: Option<i64>,
}

pub(super) async fn get_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<ApiResponse<MetricsReport>>, ApiError> {
    let preset = parse_window(&req_id.0, query.window.as_deref())?;

    let report = kantoi_sentiment::get_metrics_report(&state.store, preset, Utc::now())
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: report,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Evidence log: signals in the window, newest first.
pub(super) async fn list_signals(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<ApiResponse<Vec<Signal>>>, ApiError> {
    let preset = parse_window(&req_id.0, query.window.as_deref())?;
    let topic = parse_label(&req_id.0, "topic", query.topic.as_deref(), Topic::from_label)?;
    let archetype = parse_label(
        &req_id.0,
        "archetype",
        query.archetype.as_deref(),
        Archetype::from_label,
    )?;

    let filter = SignalFilter {
        topic,
        archetype,
        limit: Some(normalize_limit(query.limit)),
    };
    let signals = state
        .store
        .query_signals(&preset.window_ending(Utc::now()), &filter)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: signals,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn parse_label<T>(
    request_id: &str,
    field: &str,
    raw: Option<&str>,
    lookup: fn(&str) -> Option<T>,
) -> Result<Option<T>, ApiError> {
    raw.map(|label| {
        lookup(label).ok_or_else(|| {
            ApiError::new(
                request_id,
                "validation_error",
                format!("unknown {field} '{label}'"),
            )
        })
    })
    .transpose()
}
