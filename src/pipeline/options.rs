use std::{collections::HashSet, sync::Arc};

use crate::config::{BundleSettings, LocalizationSettings};

use super::{
    error::ConfigurationError,
    localize::{AcceptLanguageResolver, CultureResolver, StaticStrings, StringProvider},
    minify::Minifier,
    transform::Transform,
};

/// The set of bundles an application serves, built once at startup.
#[derive(Debug, Default)]
pub struct BundleOptions {
    transforms: Vec<Transform>,
}

impl BundleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the bundle set declared in configuration.
    ///
    /// Bundles marked `localize` share one string table and resolve their
    /// culture from `Accept-Language`, falling back to the default culture.
    pub fn from_settings(bundles: &[BundleSettings], localization: &LocalizationSettings) -> Self {
        let strings = StaticStrings::from(localization.strings.clone());
        let mut supported: Vec<String> = strings.cultures().map(str::to_string).collect();
        if !supported.contains(&localization.default_culture) {
            supported.push(localization.default_culture.clone());
        }
        let provider: Arc<dyn StringProvider> = Arc::new(strings);
        let resolver: Arc<dyn CultureResolver> = Arc::new(AcceptLanguageResolver::new(
            localization.default_culture.clone(),
            supported,
        ));

        let mut options = Self::new();
        for bundle in bundles {
            let mut transform = Transform::new(bundle.route.clone(), bundle.kind.clone());
            transform.include(bundle.files.iter().cloned());
            if bundle.localize {
                transform.localize(Arc::clone(&provider), Arc::clone(&resolver));
            }
            options.add(transform);
        }
        options
    }

    /// Register a JavaScript bundle served from `route`.
    pub fn add_js<I, S>(&mut self, route: &str, source_files: I) -> &mut Transform
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut transform = Transform::javascript(route);
        transform.include(source_files);
        self.add(transform)
    }

    /// Register a JavaScript bundle minified by `minifier`.
    pub fn add_js_with<I, S>(
        &mut self,
        minifier: Arc<dyn Minifier>,
        route: &str,
        source_files: I,
    ) -> &mut Transform
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_js(route, source_files).minify_with(minifier)
    }

    /// Register a CSS bundle served from `route`.
    pub fn add_css<I, S>(&mut self, route: &str, source_files: I) -> &mut Transform
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut transform = Transform::css(route);
        transform.include(source_files);
        self.add(transform)
    }

    /// Register a CSS bundle minified by `minifier`.
    pub fn add_css_with<I, S>(
        &mut self,
        minifier: Arc<dyn Minifier>,
        route: &str,
        source_files: I,
    ) -> &mut Transform
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_css(route, source_files).minify_with(minifier)
    }

    /// Register an already-built transform.
    pub fn add(&mut self, transform: Transform) -> &mut Transform {
        self.transforms.push(transform);
        let last = self.transforms.len() - 1;
        &mut self.transforms[last]
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Validate every transform and reject duplicate routes.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut routes = HashSet::with_capacity(self.transforms.len());
        for transform in &self.transforms {
            transform.validate()?;
            if !routes.insert(transform.route()) {
                return Err(ConfigurationError::DuplicateRoute(
                    transform.route().to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn into_transforms(self) -> Vec<Transform> {
        self.transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AssetKind, ProcessorError};

    #[test]
    fn registers_bundles_in_order() {
        let mut options = BundleOptions::new();
        options.add_js("/app.js", ["a.js", "b.js"]);
        options.add_css("/site.css", ["site.css"]);

        let routes: Vec<_> = options.transforms().iter().map(Transform::route).collect();
        assert_eq!(routes, ["/app.js", "/site.css"]);
        assert_eq!(options.transforms()[1].kind(), &AssetKind::Css);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn registration_returns_the_transform_for_chaining() {
        let mut options = BundleOptions::new();
        options
            .add_js("/app.js", ["a.js"])
            .include(["b.js"])
            .add_post_processor("noop", |ctx| Ok(ctx.content().to_string()));

        let transform = &options.transforms()[0];
        assert_eq!(transform.source_files(), ["a.js", "b.js"]);
        assert_eq!(transform.post_processors().len(), 1);
    }

    #[test]
    fn minified_registration_attaches_minifier() {
        let minifier: Arc<dyn Minifier> =
            Arc::new(|_: &AssetKind, source: &str| -> Result<String, ProcessorError> {
                Ok(source.replace(' ', ""))
            });
        let mut options = BundleOptions::new();
        options.add_css_with(minifier, "/site.css", ["site.css"]);

        assert!(format!("{:?}", options.transforms()[0]).contains("minifier: true"));
    }

    #[test]
    fn settings_become_transforms() {
        let bundles = vec![
            BundleSettings {
                route: "/app.js".to_string(),
                kind: AssetKind::JavaScript,
                files: vec!["js/a.js".to_string(), "js/b.js".to_string()],
                localize: true,
            },
            BundleSettings {
                route: "/site.css".to_string(),
                kind: AssetKind::Css,
                files: vec!["css/site.css".to_string()],
                localize: false,
            },
        ];
        let localization = LocalizationSettings {
            default_culture: "en".to_string(),
            strings: Default::default(),
        };

        let options = BundleOptions::from_settings(&bundles, &localization);
        assert!(options.validate().is_ok());

        let transforms = options.transforms();
        assert_eq!(transforms[0].source_files(), ["js/a.js", "js/b.js"]);
        assert_eq!(transforms[0].post_processors().len(), 1);
        assert_eq!(transforms[1].kind(), &AssetKind::Css);
        assert!(transforms[1].post_processors().is_empty());
    }

    #[test]
    fn duplicate_routes_fail_fast() {
        let mut options = BundleOptions::new();
        options.add_js("/app.js", ["a.js"]);
        options.add_js("/app.js", ["b.js"]);

        assert!(matches!(
            options.validate(),
            Err(ConfigurationError::DuplicateRoute(route)) if route == "/app.js"
        ));
    }

    #[test]
    fn empty_bundles_fail_fast() {
        let mut options = BundleOptions::new();
        options.add_css("/site.css", Vec::<String>::new());

        assert!(matches!(
            options.validate(),
            Err(ConfigurationError::EmptySources(_))
        ));
    }
}
