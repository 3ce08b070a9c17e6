//! Bundle-serving middleware.
//!
//! Matches request paths against the registered transforms, serves cached
//! bundles while their sources are unchanged and renders them otherwise.
//! Requests that match no transform are passed on untouched.

use std::{path::PathBuf, sync::Arc, time::Instant, time::SystemTime};

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LAST_MODIFIED},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::{counter, histogram};
use sha2::{Digest, Sha256};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{debug, info, instrument, warn};

use crate::{
    application::error::HttpError,
    cache::{
        AssetCache, CacheConfig, CacheEntry, CacheKey, CacheKeyFragments, DependencySnapshot,
        base_key,
    },
    pipeline::{
        AssetContext, BundleOptions, ConfigurationError, FileProvider, PipelineError, Transform,
        assemble,
    },
};

pub(crate) const METRIC_ASSET_CACHE_HIT: &str = "bundler_asset_cache_hit_total";
pub(crate) const METRIC_ASSET_CACHE_MISS: &str = "bundler_asset_cache_miss_total";
pub(crate) const METRIC_ASSET_CACHE_STALE: &str = "bundler_asset_cache_stale_total";
pub(crate) const METRIC_ASSET_CACHE_BYPASS: &str = "bundler_asset_cache_bypass_total";
pub(crate) const METRIC_ASSET_RENDER_ERROR: &str = "bundler_asset_render_error_total";
pub(crate) const METRIC_ASSET_RENDER_MS: &str = "bundler_asset_render_ms";

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Validated bundle set plus the collaborators needed to render it.
pub struct AssetPipeline {
    transforms: Vec<Transform>,
    files: Arc<dyn FileProvider>,
    store: Arc<dyn AssetCache>,
    config: CacheConfig,
}

impl AssetPipeline {
    /// Validate the bundle declarations; any error here must stop startup.
    pub fn new(
        options: BundleOptions,
        files: Arc<dyn FileProvider>,
        store: Arc<dyn AssetCache>,
        config: CacheConfig,
    ) -> Result<Self, ConfigurationError> {
        options.validate()?;
        info!(
            bundles = options.len(),
            cache_enabled = config.enable_cache,
            "asset pipeline configured"
        );
        Ok(Self {
            transforms: options.into_transforms(),
            files,
            store,
            config,
        })
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// First registered transform whose route matches the path.
    pub fn match_route(&self, path: &str) -> Option<&Transform> {
        self.transforms
            .iter()
            .find(|transform| transform.matches(path))
    }

    /// Serve a bundle from the cache, rendering and storing it on a miss.
    pub async fn serve(
        &self,
        transform: &Transform,
        request: &Parts,
    ) -> Result<Arc<CacheEntry>, PipelineError> {
        let fragments = transform.contribute_fragments(request);
        let base = self
            .config
            .enable_cache
            .then(|| base_key(request.uri.path()))
            .flatten();

        let lookup = base
            .as_deref()
            .map(|base| CacheKey::compute(transform.route(), base, &fragments));

        let mut cacheable = false;
        match lookup.as_ref() {
            Some(key) => match self.store.get(key) {
                Ok(Some(entry)) => {
                    if entry.dependencies.is_current().await {
                        counter!(METRIC_ASSET_CACHE_HIT).increment(1);
                        debug!(cache = "assets", outcome = "hit", key = %key, "serving cached bundle");
                        return Ok(entry);
                    }
                    counter!(METRIC_ASSET_CACHE_STALE).increment(1);
                    debug!(cache = "assets", outcome = "stale", key = %key, "source changed, re-rendering");
                    if let Err(err) = self.store.remove(key) {
                        warn!(cache = "assets", error = %err, "failed to evict stale bundle");
                    }
                    cacheable = true;
                }
                Ok(None) => {
                    counter!(METRIC_ASSET_CACHE_MISS).increment(1);
                    debug!(cache = "assets", outcome = "miss", key = %key, "rendering bundle");
                    cacheable = true;
                }
                Err(err) => {
                    counter!(METRIC_ASSET_CACHE_BYPASS).increment(1);
                    warn!(cache = "assets", outcome = "bypass", error = %err, "cache store unavailable");
                }
            },
            None => {
                counter!(METRIC_ASSET_CACHE_BYPASS).increment(1);
                debug!(cache = "assets", outcome = "bypass", "rendering without cache");
            }
        }

        let (entry, final_fragments) = self.render_with(transform, request, fragments).await?;

        if let (true, Some(base), Some(key)) = (cacheable, base.as_deref(), lookup) {
            // Fragments written by a content step are not part of the lookup key.
            if CacheKey::compute(transform.route(), base, &final_fragments) != key {
                debug!(
                    cache = "assets",
                    route = transform.route(),
                    "fragments changed while processing, not caching"
                );
            } else if let Err(err) = self.store.put(key, Arc::clone(&entry)) {
                warn!(cache = "assets", error = %err, "failed to store rendered bundle");
            }
        }

        Ok(entry)
    }

    /// Render a bundle without consulting or filling the cache.
    pub async fn render(
        &self,
        transform: &Transform,
        request: &Parts,
    ) -> Result<Arc<CacheEntry>, PipelineError> {
        let fragments = transform.contribute_fragments(request);
        let (entry, _) = self.render_with(transform, request, fragments).await?;
        Ok(entry)
    }

    async fn render_with(
        &self,
        transform: &Transform,
        request: &Parts,
        fragments: CacheKeyFragments,
    ) -> Result<(Arc<CacheEntry>, CacheKeyFragments), PipelineError> {
        let started_at = Instant::now();
        let result = self.render_inner(transform, request, fragments).await;
        histogram!(METRIC_ASSET_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        if result.is_err() {
            counter!(METRIC_ASSET_RENDER_ERROR).increment(1);
        }
        result
    }

    async fn render_inner(
        &self,
        transform: &Transform,
        request: &Parts,
        fragments: CacheKeyFragments,
    ) -> Result<(Arc<CacheEntry>, CacheKeyFragments), PipelineError> {
        let sources = transform.resolve_sources(self.files.as_ref()).await?;
        let paths: Vec<PathBuf> = sources.iter().map(|source| source.path.clone()).collect();
        let dependencies = DependencySnapshot::capture(paths).await;
        let content = assemble(&sources).await?;

        let mut ctx = AssetContext::new(request, transform, content).with_fragments(fragments);
        transform.process(&mut ctx)?;
        let (content, fragments) = ctx.finish();

        let body = Bytes::from(content);
        let identity = base_key(request.uri.path()).unwrap_or_else(|| transform.route().to_string());
        let etag = entity_tag(
            &CacheKey::compute(transform.route(), &identity, &fragments),
            &body,
        );

        let entry = CacheEntry {
            body,
            content_type: transform.content_type().to_string(),
            etag,
            last_modified: dependencies.last_modified(),
            dependencies,
        };
        Ok((Arc::new(entry), fragments))
    }
}

/// Middleware serving registered bundles.
///
/// Only GET and HEAD requests are considered; everything else, and every
/// path without a matching transform, goes to the next handler.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn asset_pipeline_layer(
    State(pipeline): State<Arc<AssetPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let Some(transform) = pipeline.match_route(request.uri().path()) else {
        return next.run(request).await;
    };

    let (parts, _body) = request.into_parts();
    match pipeline.serve(transform, &parts).await {
        Ok(entry) => build_response(&entry, &parts, pipeline.config()),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) fn build_response(entry: &CacheEntry, request: &Parts, config: &CacheConfig) -> Response {
    let not_modified = request
        .headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| etag_matches(value, &entry.etag));

    let mut response = if not_modified {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        response
    } else {
        let mut response = Response::new(Body::from(entry.body.clone()));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&entry.content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(entry.body.len()));
        response
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&entry.etag) {
        headers.insert(ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.cache_control()) {
        headers.insert(CACHE_CONTROL, value);
    }
    if let Some(value) = entry
        .last_modified
        .and_then(http_date)
        .and_then(|date| HeaderValue::from_str(&date).ok())
    {
        headers.insert(LAST_MODIFIED, value);
    }

    response
}

/// Strong entity tag derived from the cache key and the rendered body.
pub(super) fn entity_tag(key: &CacheKey, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_str().as_bytes());
    hasher.update(body);
    let digest = hex::encode(hasher.finalize());
    format!("\"{}\"", &digest[..32])
}

fn etag_matches(header: &str, etag: &str) -> bool {
    let strip_weak = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let current = strip_weak(etag);
    header
        .split(',')
        .any(|candidate| candidate.trim() == "*" || strip_weak(candidate) == current)
}

fn http_date(time: SystemTime) -> Option<String> {
    OffsetDateTime::from(time).format(HTTP_DATE).ok()
}
