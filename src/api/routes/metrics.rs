//! Raw metric ingestion and reads

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::{error, warn};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{IngestResponse, LimitQuery, MetricResponse, MetricsResponse},
};
use crate::models::{Metric, WireMetric};
use crate::storage::BatchOutcome;

/// POST /api/v1/metrics
///
/// 202 when every metric was stored, 207 with the tally when some were
/// dropped, 500 when nothing could be committed.
pub async fn ingest_metrics(
    State(state): State<ApiState>,
    body: Result<Json<Vec<Metric>>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let Json(metrics) = body?;
    if metrics.is_empty() {
        return Err(ApiError::InvalidRequest("no metrics provided".to_string()));
    }

    match state.storage.store_batch(&metrics).await {
        Ok(BatchOutcome::AllStored { count }) => Ok((
            StatusCode::ACCEPTED,
            Json(IngestResponse {
                message: "metrics accepted".to_string(),
                successful_count: count,
                failed_count: 0,
            }),
        )),
        Ok(BatchOutcome::Partial(partial)) => {
            warn!("some metrics failed to be stored: {partial}");
            Err(ApiError::PartialFailure(partial))
        }
        Err(e) => {
            error!("failed to store metrics batch: {e}");
            Err(e.into())
        }
    }
}

/// GET /api/v1/metrics/:source/:name?limit=N
///
/// Most recent first
pub async fn get_metrics(
    State(state): State<ApiState>,
    Path((source, name)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<MetricsResponse>> {
    let metrics = state
        .storage
        .read_range(&source, &name, query.resolve())
        .await?
        .iter()
        .map(WireMetric::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(MetricsResponse { metrics }))
}

/// GET /api/v1/metrics/:source/:name/latest
pub async fn get_latest_metric(
    State(state): State<ApiState>,
    Path((source, name)): Path<(String, String)>,
) -> ApiResult<Json<MetricResponse>> {
    let metric = state
        .storage
        .read_latest(&source, &name)
        .await?
        .as_ref()
        .map(WireMetric::try_from)
        .transpose()?;

    Ok(Json(MetricResponse { metric }))
}
