use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use kantoi_core::{Signal, SourceRecord};
use kantoi_sentiment::{validator::LabelFallback, RawClassification};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

/// A classification to score without storing it.
#[derive(Debug, Deserialize)]
pub(super) struct ScoreRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Classifier output in any of the accepted shapes.
    pub classification: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct ScoreResponse {
    pub signal: Signal,
    pub fallbacks: Vec<LabelFallback>,
}

pub(super) async fn score_classification(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<ApiResponse<ScoreResponse>>, ApiError> {
    let raw = RawClassification::from_value(body.classification)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let mut record = SourceRecord::new(body.id.unwrap_or_else(|| "adhoc".to_string()), body.caption);
    record.view_count = body.view_count;
    record.created_at = body.created_at;

    let ctx = state.scorer.context_for(&record, Utc::now());
    let scored = state.scorer.score(&raw, &ctx);

    Ok(Json(ApiResponse {
        data: ScoreResponse {
            signal: scored.signal,
            fallbacks: scored.report.fallbacks,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
