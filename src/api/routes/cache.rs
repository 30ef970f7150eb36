//! Cache service endpoint used by remote collectors

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::{error::ApiResult, state::ApiState};
use crate::models::{MetricResponse, WireMetric};

/// GET /api/v1/cache/:source/:name
///
/// `{"metric": null}` on a miss
pub async fn get_cached(
    State(state): State<ApiState>,
    Path((source, name)): Path<(String, String)>,
) -> ApiResult<Json<MetricResponse>> {
    let metric = state
        .cache
        .get_metric(&source, &name)
        .await?
        .as_ref()
        .map(WireMetric::try_from)
        .transpose()?;

    Ok(Json(MetricResponse { metric }))
}
