use axum::{extract::State, Extension, Json};
use kantoi_core::Brief;

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Latest stored brief, or `null` before the first one is generated.
pub(super) async fn get_latest_brief(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Option<Brief>>>, ApiError> {
    let brief = kantoi_sentiment::get_latest_brief(&state.store)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: brief,
        meta: ResponseMeta::new(req_id.0),
    }))
}
