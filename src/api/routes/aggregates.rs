//! Aggregated summaries endpoint

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{AggregatesResponse, LimitQuery},
};

/// GET /api/v1/aggregates/:source/:name?limit=N
///
/// Most recent summaries first
pub async fn get_aggregates(
    State(state): State<ApiState>,
    Path((source, name)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<AggregatesResponse>> {
    let aggregates = state
        .storage
        .query_aggregated(&source, &name, query.resolve())
        .await?;

    Ok(Json(AggregatesResponse { aggregates }))
}
