use std::{fmt, path::Component, path::Path, sync::Arc};

use axum::http::request::Parts;

use crate::cache::CacheKeyFragments;

use super::{
    assemble::{ResolvedSource, resolve_sources},
    chain::{KeyContributor, PostProcessor, run_chain},
    context::AssetContext,
    error::{ConfigurationError, PipelineError, ProcessorError},
    files::FileProvider,
    localize::{self, CultureResolver, StringProvider},
    minify::Minifier,
};

const JAVASCRIPT_CONTENT_TYPE: &str = "text/javascript";
const CSS_CONTENT_TYPE: &str = "text/css";

/// The kind of bundle a transform produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    JavaScript,
    Css,
    Generic { content_type: String },
}

impl AssetKind {
    /// Guess a generic kind from the route's file extension.
    pub fn generic_for(route: &str) -> Self {
        let mime = mime_guess::from_path(route).first_or_octet_stream();
        Self::Generic {
            content_type: mime.essence_str().to_string(),
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::JavaScript => JAVASCRIPT_CONTENT_TYPE,
            Self::Css => CSS_CONTENT_TYPE,
            Self::Generic { content_type } => content_type,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Css => "css",
            Self::Generic { .. } => "generic",
        }
    }
}

/// One bundle definition.
///
/// Builder methods only ever append; there is no way to remove a source
/// file or a step once it has been registered.
pub struct Transform {
    route: String,
    kind: AssetKind,
    source_files: Vec<String>,
    key_contributors: Vec<KeyContributor>,
    post_processors: Vec<PostProcessor>,
    minifier: Option<Arc<dyn Minifier>>,
}

impl Transform {
    pub fn new(route: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            route: route.into(),
            kind,
            source_files: Vec::new(),
            key_contributors: Vec::new(),
            post_processors: Vec::new(),
            minifier: None,
        }
    }

    pub fn javascript(route: impl Into<String>) -> Self {
        Self::new(route, AssetKind::JavaScript)
    }

    pub fn css(route: impl Into<String>) -> Self {
        Self::new(route, AssetKind::Css)
    }

    /// A bundle whose content type is guessed from the route extension.
    pub fn generic(route: impl Into<String>) -> Self {
        let route = route.into();
        let kind = AssetKind::generic_for(&route);
        Self::new(route, kind)
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }

    pub fn content_type(&self) -> &str {
        self.kind.content_type()
    }

    pub fn source_files(&self) -> &[String] {
        &self.source_files
    }

    pub fn post_processors(&self) -> &[PostProcessor] {
        &self.post_processors
    }

    /// Append web-root relative source files, concatenated in the given order.
    pub fn include<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_files.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Append a content step; steps run in registration order.
    pub fn add_post_processor<F>(&mut self, name: &'static str, step: F) -> &mut Self
    where
        F: Fn(&mut AssetContext<'_>) -> Result<String, ProcessorError> + Send + Sync + 'static,
    {
        self.post_processors.push(PostProcessor::new(name, step));
        self
    }

    /// Append a step that derives a cache-key fragment from the request
    /// before the cache is consulted.
    pub fn add_key_contributor<F>(&mut self, name: &'static str, contribute: F) -> &mut Self
    where
        F: Fn(&Parts, &mut CacheKeyFragments) + Send + Sync + 'static,
    {
        self.key_contributors
            .push(KeyContributor::new(name, contribute));
        self
    }

    /// Run the given minifier after every post-processor.
    pub fn minify_with(&mut self, minifier: Arc<dyn Minifier>) -> &mut Self {
        self.minifier = Some(minifier);
        self
    }

    /// Replace `{{key}}` tokens with strings for the request's culture.
    ///
    /// The resolved culture is recorded as the `culture` cache-key fragment,
    /// so each culture is cached separately.
    pub fn localize(
        &mut self,
        provider: Arc<dyn StringProvider>,
        resolver: Arc<dyn CultureResolver>,
    ) -> &mut Self {
        localize::attach(self, provider, resolver);
        self
    }

    /// Check the declaration invariants that must hold before serving.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_route(&self.route)?;
        if self.source_files.is_empty() {
            return Err(ConfigurationError::EmptySources(self.route.clone()));
        }
        Ok(())
    }

    /// Whether a request path is served by this transform.
    ///
    /// Matches the route exactly or as a whole-segment prefix.
    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.route.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Collect the request-derived cache-key fragments.
    pub fn contribute_fragments(&self, request: &Parts) -> CacheKeyFragments {
        let mut fragments = CacheKeyFragments::new();
        for contributor in &self.key_contributors {
            contributor.contribute(request, &mut fragments);
        }
        fragments
    }

    pub async fn resolve_sources(
        &self,
        files: &dyn FileProvider,
    ) -> Result<Vec<ResolvedSource>, PipelineError> {
        resolve_sources(files, &self.source_files).await
    }

    /// Run the post-processor chain, then the minifier, over the context's content.
    pub fn process(&self, ctx: &mut AssetContext<'_>) -> Result<(), ProcessorError> {
        run_chain(&self.post_processors, ctx)?;
        if let Some(minifier) = &self.minifier {
            let minified = minifier.minify(&self.kind, ctx.content())?;
            ctx.set_content(minified);
        }
        Ok(())
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("route", &self.route)
            .field("kind", &self.kind)
            .field("source_files", &self.source_files)
            .field("key_contributors", &self.key_contributors.len())
            .field("post_processors", &self.post_processors.len())
            .field("minifier", &self.minifier.is_some())
            .finish()
    }
}

fn validate_route(route: &str) -> Result<(), ConfigurationError> {
    let invalid = |reason| ConfigurationError::InvalidRoute {
        route: route.to_string(),
        reason,
    };

    if !route.starts_with('/') {
        return Err(invalid("route must start with `/`"));
    }
    if route.len() == 1 {
        return Err(invalid("route must name a bundle"));
    }
    if route.ends_with('/') {
        return Err(invalid("route must not end with `/`"));
    }
    if route.contains(['?', '#']) || route.chars().any(char::is_whitespace) {
        return Err(invalid("route must be a plain path"));
    }
    if Path::new(route)
        .components()
        .any(|component| matches!(component, Component::ParentDir | Component::CurDir))
    {
        return Err(invalid("route must not contain relative segments"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_appends_in_order() {
        let mut transform = Transform::javascript("/app.js");
        transform.include(["a.js", "b.js"]).include(["c.js"]);
        assert_eq!(transform.source_files(), ["a.js", "b.js", "c.js"]);
    }

    #[test]
    fn content_types_follow_kind() {
        assert_eq!(Transform::javascript("/a.js").content_type(), "text/javascript");
        assert_eq!(Transform::css("/a.css").content_type(), "text/css");
        assert_eq!(Transform::generic("/a.json").content_type(), "application/json");
        assert_eq!(
            Transform::generic("/a.unknownext").content_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn empty_sources_are_rejected() {
        let transform = Transform::javascript("/app.js");
        assert!(matches!(
            transform.validate(),
            Err(ConfigurationError::EmptySources(route)) if route == "/app.js"
        ));
    }

    #[test]
    fn invalid_routes_are_rejected() {
        for route in ["app.js", "/", "/dir/", "/a.js?v=1", "/a b.js", "/x/../a.js"] {
            let mut transform = Transform::javascript(route);
            transform.include(["a.js"]);
            assert!(
                matches!(
                    transform.validate(),
                    Err(ConfigurationError::InvalidRoute { .. })
                ),
                "route {route} should be rejected"
            );
        }
    }

    #[test]
    fn matches_whole_segments_only() {
        let transform = Transform::javascript("/bundles/app.js");
        assert!(transform.matches("/bundles/app.js"));
        assert!(transform.matches("/bundles/app.js/v2"));
        assert!(!transform.matches("/bundles/app.jsx"));
        assert!(!transform.matches("/bundles"));
    }
}
