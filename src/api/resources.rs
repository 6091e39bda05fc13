//! GET /r/{resource_id}: a resource from the cache, fetched upstream on miss.

use super::state::ApiState;
use crate::error::Result;
use crate::resources::ResourceSource;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub(super) async fn get_resource(
    State(state): State<Arc<ApiState>>,
    Path(resource_id): Path<String>,
) -> Result<Response> {
    let served = state.resources.serve(&resource_id).await?;

    let cache_status = match served.source {
        ResourceSource::Cache => "hit",
        ResourceSource::Upstream { .. } => "miss",
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, served.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            (header::HeaderName::from_static("x-cache"), cache_status.to_string()),
        ],
        served.bytes,
    )
        .into_response())
}
