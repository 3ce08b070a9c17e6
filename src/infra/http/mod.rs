mod dispatch;
mod middleware;
mod minified;

pub use dispatch::{AssetPipeline, asset_pipeline_layer};
pub use middleware::{log_responses, set_request_context};
pub use minified::{FileMinifier, file_minifier_layer};

pub(crate) use dispatch::{
    METRIC_ASSET_CACHE_BYPASS, METRIC_ASSET_CACHE_HIT, METRIC_ASSET_CACHE_MISS,
    METRIC_ASSET_CACHE_STALE, METRIC_ASSET_RENDER_ERROR, METRIC_ASSET_RENDER_MS,
};

use std::sync::Arc;

use axum::{
    Router,
    http::{StatusCode, Uri},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::error::ErrorReport;

/// Router serving the configured bundles in front of a 404 fallback.
pub fn build_router(pipeline: Arc<AssetPipeline>) -> Router {
    with_bundles(base_routes(), pipeline)
}

/// Like [`build_router`], with single-file minification between the bundles
/// and the fallback. Bundle routes take precedence over files.
pub fn build_router_with_files(pipeline: Arc<AssetPipeline>, files: Arc<FileMinifier>) -> Router {
    let routes = base_routes().layer(from_fn_with_state(files, file_minifier_layer));
    with_bundles(routes, pipeline)
}

fn base_routes() -> Router {
    Router::new()
        .route("/_health", get(health))
        .fallback(not_found)
}

fn with_bundles(routes: Router, pipeline: Arc<AssetPipeline>) -> Router {
    routes
        .layer(from_fn_with_state(pipeline, asset_pipeline_layer))
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found(uri: Uri) -> Response {
    let mut response = (StatusCode::NOT_FOUND, "Not Found").into_response();
    ErrorReport::from_message(
        "infra::http::not_found",
        StatusCode::NOT_FOUND,
        format!("no bundle or route for `{}`", uri.path()),
    )
    .attach(&mut response);
    response
}
