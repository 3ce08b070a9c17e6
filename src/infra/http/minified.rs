//! Minification of individual web-root files.
//!
//! Requests for a `.js` or `.css` file that exists under the web root are
//! answered with the file's minified contents. Output is cached and
//! invalidated like a bundle. Paths without a configured minifier, already
//! minified `.min.js`/`.min.css` files and files that do not exist go to the
//! next handler.

use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};

use super::dispatch::{
    METRIC_ASSET_CACHE_BYPASS, METRIC_ASSET_CACHE_HIT, METRIC_ASSET_CACHE_MISS,
    METRIC_ASSET_CACHE_STALE, METRIC_ASSET_RENDER_ERROR, METRIC_ASSET_RENDER_MS, build_response,
    entity_tag,
};
use crate::{
    application::error::HttpError,
    cache::{
        AssetCache, CacheConfig, CacheEntry, CacheKey, CacheKeyFragments, DependencySnapshot,
        base_key,
    },
    pipeline::{AssetKind, FileProvider, Minifier, PipelineError},
};

/// Key scope of minified files. Bundle routes always start with `/`, so
/// this never collides with a bundle's scope.
const FILE_SCOPE: &str = "minify:file";

/// Serves single JavaScript and CSS files through their minifier.
pub struct FileMinifier {
    files: Arc<dyn FileProvider>,
    store: Arc<dyn AssetCache>,
    config: CacheConfig,
    javascript: Option<Arc<dyn Minifier>>,
    css: Option<Arc<dyn Minifier>>,
}

impl FileMinifier {
    /// A minifier with no file types enabled; see [`Self::minify_javascript`]
    /// and [`Self::minify_css`].
    pub fn new(files: Arc<dyn FileProvider>, store: Arc<dyn AssetCache>, config: CacheConfig) -> Self {
        Self {
            files,
            store,
            config,
            javascript: None,
            css: None,
        }
    }

    pub fn minify_javascript(mut self, minifier: impl Minifier + 'static) -> Self {
        self.javascript = Some(Arc::new(minifier));
        self
    }

    pub fn minify_css(mut self, minifier: impl Minifier + 'static) -> Self {
        self.css = Some(Arc::new(minifier));
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn minifier_for(&self, path: &str) -> Option<(AssetKind, Arc<dyn Minifier>)> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".min.js") || lower.ends_with(".min.css") {
            return None;
        }
        if lower.ends_with(".js") {
            self.javascript
                .as_ref()
                .map(|minifier| (AssetKind::JavaScript, Arc::clone(minifier)))
        } else if lower.ends_with(".css") {
            self.css
                .as_ref()
                .map(|minifier| (AssetKind::Css, Arc::clone(minifier)))
        } else {
            None
        }
    }

    /// Minified contents of the web-root file at `path`.
    ///
    /// `Ok(None)` means the path is not handled here: no minifier applies or
    /// the file does not exist.
    pub async fn serve(&self, path: &str) -> Result<Option<Arc<CacheEntry>>, PipelineError> {
        let Some((kind, minifier)) = self.minifier_for(path) else {
            return Ok(None);
        };
        let Some(physical) = self.files.resolve(path).await else {
            return Ok(None);
        };

        let base = base_key(path).unwrap_or_else(|| path.to_string());
        let key = CacheKey::compute(FILE_SCOPE, &base, &CacheKeyFragments::new());

        let mut cacheable = false;
        if !self.config.enable_cache {
            counter!(METRIC_ASSET_CACHE_BYPASS).increment(1);
        } else {
            match self.store.get(&key) {
                Ok(Some(entry)) => {
                    if entry.dependencies.is_current().await {
                        counter!(METRIC_ASSET_CACHE_HIT).increment(1);
                        debug!(cache = "files", outcome = "hit", key = %key, "serving cached file");
                        return Ok(Some(entry));
                    }
                    counter!(METRIC_ASSET_CACHE_STALE).increment(1);
                    debug!(cache = "files", outcome = "stale", key = %key, "file changed, re-minifying");
                    if let Err(err) = self.store.remove(&key) {
                        warn!(cache = "files", error = %err, "failed to evict stale file");
                    }
                    cacheable = true;
                }
                Ok(None) => {
                    counter!(METRIC_ASSET_CACHE_MISS).increment(1);
                    debug!(cache = "files", outcome = "miss", key = %key, "minifying file");
                    cacheable = true;
                }
                Err(err) => {
                    counter!(METRIC_ASSET_CACHE_BYPASS).increment(1);
                    warn!(cache = "files", outcome = "bypass", error = %err, "cache store unavailable");
                }
            }
        }

        let started_at = Instant::now();
        let dependencies = DependencySnapshot::capture(vec![physical.clone()]).await;
        let result = match tokio::fs::read_to_string(&physical).await {
            Ok(source) => minifier
                .minify(&kind, &source)
                .map_err(PipelineError::from),
            Err(err) => Err(PipelineError::io(path, err)),
        };
        histogram!(METRIC_ASSET_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        let minified = match result {
            Ok(minified) => minified,
            Err(err) => {
                counter!(METRIC_ASSET_RENDER_ERROR).increment(1);
                return Err(err);
            }
        };

        let body = Bytes::from(minified);
        let entry = Arc::new(CacheEntry {
            etag: entity_tag(&key, &body),
            body,
            content_type: kind.content_type().to_string(),
            last_modified: dependencies.last_modified(),
            dependencies,
        });

        if cacheable {
            if let Err(err) = self.store.put(key, Arc::clone(&entry)) {
                warn!(cache = "files", error = %err, "failed to store minified file");
            }
        }

        Ok(Some(entry))
    }
}

/// Middleware minifying individual JavaScript and CSS files.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn file_minifier_layer(
    State(minifier): State<Arc<FileMinifier>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    match minifier.serve(&path).await {
        Ok(Some(entry)) => {
            let (parts, _body) = request.into_parts();
            build_response(&entry, &parts, minifier.config())
        }
        Ok(None) => next.run(request).await,
        Err(err) => HttpError::from(err).into_response(),
    }
}
